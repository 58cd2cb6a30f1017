use chrono::Utc;
use outbound_core::domain::icp::{IcpConfigId, IcpTemplate};
use serde_json::{json, Value};

use super::CommandResult;

/// Without a key every template is listed by key and name. With a key the full
/// profile is printed as JSON that `score --icp` accepts.
pub fn run(key: Option<&str>) -> CommandResult {
    let Some(key) = key else {
        let listing = IcpTemplate::all()
            .into_iter()
            .map(|template| json!({ "key": template.key, "name": template.name }))
            .collect::<Vec<_>>();
        return render(&Value::Array(listing));
    };

    let Some(template) = IcpTemplate::find(key) else {
        let known =
            IcpTemplate::all().iter().map(|template| template.key).collect::<Vec<_>>().join(", ");
        return CommandResult::failure(
            "icp-templates",
            "input",
            format!("unknown ICP template `{key}` (known: {known})"),
            2,
        );
    };

    let config = template.instantiate(IcpConfigId(template.key.to_string()), Utc::now());
    match serde_json::to_value(&config) {
        Ok(value) => render(&value),
        Err(error) => CommandResult::failure("icp-templates", "serialization", error.to_string(), 1),
    }
}

fn render(value: &Value) -> CommandResult {
    match serde_json::to_string_pretty(value) {
        Ok(output) => CommandResult::output(output),
        Err(error) => CommandResult::failure("icp-templates", "serialization", error.to_string(), 1),
    }
}

use outbound_core::sequence::SequenceTemplate;

use super::CommandResult;

pub fn run() -> CommandResult {
    match serde_json::to_string_pretty(&SequenceTemplate::all()) {
        Ok(output) => CommandResult::output(output),
        Err(error) => CommandResult::failure("templates", "serialization", error.to_string(), 1),
    }
}

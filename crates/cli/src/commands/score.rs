use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use outbound_core::domain::icp::IcpConfig;
use outbound_core::scoring::{ActiveConfigStore, ScoredProspect, ScoringInput};
use tracing::info;

use super::CommandResult;

pub fn run(icp_path: &Path, prospects_path: &Path, json_output: bool) -> CommandResult {
    let ranking = match rank(icp_path, prospects_path) {
        Ok(ranking) => ranking,
        Err(error) => return CommandResult::failure("score", "input", format!("{error:#}"), 2),
    };

    info!(
        event_name = "scoring.bulk.completed",
        correlation_id = "cli",
        prospects = ranking.len(),
        "bulk scoring finished"
    );

    if json_output {
        return match serde_json::to_string_pretty(&ranking) {
            Ok(output) => CommandResult::output(output),
            Err(error) => CommandResult::failure("score", "serialization", error.to_string(), 1),
        };
    }
    CommandResult::output(render_human(&ranking))
}

fn rank(icp_path: &Path, prospects_path: &Path) -> Result<Vec<ScoredProspect>> {
    let icp = load_icp(icp_path)?;
    let store = ActiveConfigStore::with_config(icp).context("ICP file was rejected")?;

    let raw = fs::read_to_string(prospects_path)
        .with_context(|| format!("could not read `{}`", prospects_path.display()))?;
    let batch: Vec<ScoringInput> = serde_json::from_str(&raw)
        .with_context(|| format!("`{}` is not a JSON array of prospects", prospects_path.display()))?;

    Ok(store.scorer().bulk_score(batch))
}

/// `.toml` files are read as TOML, everything else as JSON.
pub fn load_icp(path: &Path) -> Result<IcpConfig> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("could not read `{}`", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("toml"));

    let config: IcpConfig = if is_toml {
        toml::from_str(&raw).with_context(|| format!("`{}` is not a valid ICP", path.display()))?
    } else {
        serde_json::from_str(&raw)
            .with_context(|| format!("`{}` is not a valid ICP", path.display()))?
    };
    if config.name.trim().is_empty() {
        bail!("`{}` must give the ICP a name", path.display());
    }
    Ok(config)
}

fn render_human(ranking: &[ScoredProspect]) -> String {
    if ranking.is_empty() {
        return "no prospects to score".to_string();
    }

    let mut lines = Vec::with_capacity(ranking.len() + 1);
    lines.push(format!("ranked {} prospect(s):", ranking.len()));
    for (rank, scored) in ranking.iter().enumerate() {
        let label = scored
            .input
            .name
            .as_deref()
            .or(scored.input.id.as_deref())
            .unwrap_or("<unnamed>");
        lines.push(format!(
            "{:>3}. {label} = {} ({})",
            rank + 1,
            scored.breakdown.total_score,
            scored.breakdown.recommendation.as_str()
        ));
        for reason in &scored.breakdown.match_reasons {
            lines.push(format!("       + {reason}"));
        }
        for concern in &scored.breakdown.concerns {
            lines.push(format!("       - {concern}"));
        }
    }
    lines.join("\n")
}

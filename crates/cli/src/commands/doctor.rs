use outbound_agent::llm::client_from_config;
use outbound_agent::prompts::PromptRenderer;
use outbound_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exit code 0 when every check passes, 1 otherwise.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = vec![check_prompt_templates()];

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            let credentials = check_llm_credentials(&config);
            let credentials_ok = credentials.status == CheckStatus::Pass;
            checks.push(credentials);
            checks.push(if credentials_ok {
                check_llm_client(&config)
            } else {
                skipped("llm_client", "skipped because LLM credentials are not ready")
            });
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped(
                "llm_credentials",
                "skipped because configuration did not load",
            ));
            checks.push(skipped("llm_client", "skipped because configuration did not load"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn skipped(name: &'static str, details: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: details.to_string() }
}

fn check_prompt_templates() -> DoctorCheck {
    match PromptRenderer::new() {
        Ok(_) => DoctorCheck {
            name: "prompt_templates",
            status: CheckStatus::Pass,
            details: "research and message templates compiled".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "prompt_templates",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    match config.llm.ensure_credentials() {
        Ok(()) => DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!("credentials present for provider `{}`", config.llm.provider.as_str()),
        },
        Err(details) => DoctorCheck { name: "llm_credentials", status: CheckStatus::Fail, details },
    }
}

/// Builds the HTTP client without calling the provider.
fn check_llm_client(config: &AppConfig) -> DoctorCheck {
    match client_from_config(&config.llm) {
        Ok(_) => DoctorCheck {
            name: "llm_client",
            status: CheckStatus::Pass,
            details: format!(
                "`{}` client ready for {} (model `{}`)",
                config.llm.provider.as_str(),
                config.llm.effective_base_url(),
                config.llm.model
            ),
        },
        Err(error) => {
            DoctorCheck { name: "llm_client", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

use chrono::{DateTime, Utc};
use outbound_core::audit::{AuditContext, InMemoryAuditSink};
use outbound_core::domain::prospect::ProspectId;
use outbound_core::domain::sequence::{Enrollment, EnrollmentId};
use outbound_core::sequence::{AdvanceOutcome, SequenceEngine, SequenceTemplate, StepCommand};
use tracing::info;
use uuid::Uuid;

use super::CommandResult;

const SIMULATED_PROSPECT: &str = "simulated-prospect";

/// Walks a fresh enrollment from its first step to completion. The clock
/// jumps to each step's `next_action_at`, so the printed day offsets follow
/// the template's waits.
pub fn run(template_key: &str, skip: &[u32]) -> CommandResult {
    run_at(template_key, skip, Utc::now())
}

pub fn run_at(template_key: &str, skip: &[u32], started_at: DateTime<Utc>) -> CommandResult {
    let Some(template) = SequenceTemplate::find(template_key) else {
        let known = SequenceTemplate::all()
            .iter()
            .map(|template| template.key)
            .collect::<Vec<_>>()
            .join(", ");
        return CommandResult::failure(
            "simulate",
            "input",
            format!("unknown template `{template_key}` (known: {known})"),
            2,
        );
    };
    if let Some(order) = skip.iter().find(|order| **order as usize >= template.steps.len()) {
        return CommandResult::failure(
            "simulate",
            "input",
            format!("template `{}` has no step at order {order}", template.key),
            2,
        );
    }

    let enrollment_id = EnrollmentId(Uuid::new_v4().to_string());
    let mut enrollment = match Enrollment::start(
        enrollment_id.clone(),
        ProspectId(SIMULATED_PROSPECT.to_string()),
        template.instantiate(),
        started_at,
    ) {
        Ok(enrollment) => enrollment,
        Err(error) => return CommandResult::failure("simulate", "sequence", error.to_string(), 3),
    };

    let engine = SequenceEngine::new();
    let sink = InMemoryAuditSink::default();
    let audit = AuditContext::new(
        Some(enrollment.prospect_id.clone()),
        Some(enrollment_id),
        "cli-simulate",
        "cli",
    );

    let mut lines = vec![format!(
        "simulating `{}` ({} steps)",
        template.key,
        enrollment.sequence.steps.len()
    )];
    let mut now = started_at;
    while let Some(current) = enrollment.current() {
        let step_id = current.id.clone();
        let label = describe(current.order, current.step_type.as_str(), current.name.as_deref());
        let command = if skip.contains(&current.order) {
            StepCommand::Skip { step_id }
        } else {
            StepCommand::Complete { step_id, response_received: false }
        };

        let outcome = match engine.apply_with_audit(&mut enrollment, &command, now, &sink, &audit) {
            Ok(outcome) => outcome,
            Err(error) => {
                return CommandResult::failure("simulate", "sequence", error.to_string(), 3);
            }
        };
        lines.push(render_transition(&label, &outcome, now, started_at));
        now = outcome.next_action_at.unwrap_or(now);
    }

    lines.push(format!(
        "sequence complete on day {}; {} audit event(s) recorded",
        (now - started_at).num_days(),
        sink.events().len()
    ));

    info!(
        event_name = "sequence.simulation.completed",
        correlation_id = "cli-simulate",
        template = template.key,
        skipped = skip.len(),
        "sequence simulation finished"
    );

    CommandResult::success("simulate", lines.join("\n"))
}

fn describe(order: u32, step_type: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("step {order} {name} [{step_type}]"),
        None => format!("step {order} [{step_type}]"),
    }
}

fn render_transition(
    label: &str,
    outcome: &AdvanceOutcome,
    now: DateTime<Utc>,
    started_at: DateTime<Utc>,
) -> String {
    let status = serde_json::to_value(outcome.left_status)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", outcome.left_status));
    let day = (now - started_at).num_days();

    match outcome.next_action_at {
        Some(next) if !outcome.sequence_complete => format!(
            "day {day}: {label} {status}; step {} due day {}",
            outcome.current_step,
            (next - started_at).num_days()
        ),
        _ => format!("day {day}: {label} {status}; no steps remain"),
    }
}

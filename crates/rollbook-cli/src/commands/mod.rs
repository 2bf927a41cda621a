pub mod activate;
pub mod bulk_promote;
pub mod close;
pub mod completions;
pub mod enroll;
pub mod history;
pub mod inspect;
pub mod list;
pub mod lock;
pub mod promote;
pub mod retain;
pub mod session_new;
pub mod sessions;

use rollbook_core::Engine;
use rollbook_store::SessionRecord;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_VALIDATION_ERROR: u8 = 2;
pub const EXIT_REGISTRY_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "active" => Style::new().green().apply_to(status).to_string(),
        "promoted" => Style::new().cyan().apply_to(status).to_string(),
        "retained" => Style::new().yellow().apply_to(status).to_string(),
        "transferred" => Style::new().blue().apply_to(status).to_string(),
        "graduated" => Style::new().magenta().apply_to(status).to_string(),
        "dropped" => Style::new().dim().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

/// Resolve a session by full id or unique name.
pub fn resolve_session(engine: &Engine, input: &str) -> Result<SessionRecord, String> {
    engine.resolve_session(input).map_err(|e| e.to_string())
}

/// Resolve a full enrollment id from a full id, short id, or unique prefix.
pub fn resolve_enrollment_id(engine: &Engine, input: &str) -> Result<String, String> {
    if input.len() == 64 {
        return Ok(input.to_owned());
    }

    let rows = engine
        .list_enrollments(&rollbook_store::EnrollmentFilter::default())
        .map_err(|e| e.to_string())?;

    for r in &rows {
        if *r.short_id == *input {
            return Ok(r.enrollment_id.to_string());
        }
    }

    let matches: Vec<_> = rows
        .iter()
        .filter(|r| r.enrollment_id.starts_with(input))
        .collect();

    match matches.len() {
        0 => Err(format!("no enrollment matching '{input}'")),
        1 => Ok(matches[0].enrollment_id.to_string()),
        n => Err(format!(
            "ambiguous enrollment prefix '{input}': matches {n} enrollments"
        )),
    }
}

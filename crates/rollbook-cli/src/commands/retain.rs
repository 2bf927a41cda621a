use super::{json_pretty, resolve_enrollment_id, resolve_session, EXIT_SUCCESS};
use rollbook_core::Engine;
use rollbook_schema::requests::RetentionRequest;

pub fn run(
    engine: &Engine,
    enrollment: &str,
    session: &str,
    roll_no: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let enrollment_id = resolve_enrollment_id(engine, enrollment)?;
    let resolved = resolve_session(engine, session)?;

    let outcome = engine
        .retain(&RetentionRequest {
            enrollment_id: enrollment_id.into(),
            session_id: resolved.session_id,
            roll_no: roll_no.map(str::to_owned),
        })
        .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&outcome.opened)?);
    } else {
        println!(
            "retained {} in {}/{} for '{}' (roll {})",
            outcome.closed.student_id,
            outcome.opened.class_id,
            outcome.opened.section_id,
            resolved.name,
            outcome.opened.roll_no
        );
    }
    Ok(EXIT_SUCCESS)
}

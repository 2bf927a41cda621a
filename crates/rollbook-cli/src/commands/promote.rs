use super::{json_pretty, resolve_enrollment_id, resolve_session, EXIT_SUCCESS};
use rollbook_core::Engine;
use rollbook_schema::requests::PromotionRequest;

pub fn run(
    engine: &Engine,
    enrollment: &str,
    session: &str,
    class: &str,
    section: &str,
    roll_no: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let enrollment_id = resolve_enrollment_id(engine, enrollment)?;
    let resolved = resolve_session(engine, session)?;

    let outcome = engine
        .promote(&PromotionRequest {
            enrollment_id: enrollment_id.into(),
            session_id: resolved.session_id,
            class_id: class.into(),
            section_id: section.into(),
            roll_no: roll_no.map(str::to_owned),
        })
        .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&outcome.opened)?);
    } else {
        println!(
            "promoted {}: {} -> {} (roll {} in '{}' {}/{})",
            outcome.closed.student_id,
            outcome.closed.short_id,
            outcome.opened.short_id,
            outcome.opened.roll_no,
            resolved.name,
            outcome.opened.class_id,
            outcome.opened.section_id
        );
    }
    Ok(EXIT_SUCCESS)
}

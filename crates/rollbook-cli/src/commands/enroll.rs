use super::{json_pretty, resolve_session, EXIT_SUCCESS};
use rollbook_core::Engine;
use rollbook_schema::requests::EnrollRequest;

#[allow(clippy::too_many_arguments)]
pub fn run(
    engine: &Engine,
    student: &str,
    session: &str,
    class: &str,
    section: &str,
    roll_no: &str,
    json: bool,
) -> Result<u8, String> {
    let resolved = resolve_session(engine, session)?;
    let record = engine
        .enroll(&EnrollRequest {
            student_id: student.into(),
            session_id: resolved.session_id,
            class_id: class.into(),
            section_id: section.into(),
            roll_no: roll_no.to_owned(),
        })
        .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&record)?);
    } else {
        println!(
            "enrolled {} in '{}' {}/{} as roll {} ({})",
            record.student_id,
            resolved.name,
            record.class_id,
            record.section_id,
            record.roll_no,
            record.short_id
        );
    }
    Ok(EXIT_SUCCESS)
}

use super::{colorize_status, json_pretty, resolve_session, EXIT_SUCCESS};
use rollbook_core::Engine;
use rollbook_store::{EnrollmentFilter, EnrollmentStatus};
use std::collections::HashMap;

pub fn run(
    engine: &Engine,
    session: Option<&str>,
    class: Option<&str>,
    section: Option<&str>,
    status: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let session_id = session
        .map(|s| resolve_session(engine, s).map(|r| r.session_id))
        .transpose()?;
    let status = status
        .map(str::parse::<EnrollmentStatus>)
        .transpose()
        .map_err(|e| format!("validation error: {e}"))?;

    let filter = EnrollmentFilter {
        session_id,
        class_id: class.map(Into::into),
        section_id: section.map(Into::into),
        status,
        student_id: None,
    };
    let rows = engine.list_enrollments(&filter).map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&rows)?);
        return Ok(EXIT_SUCCESS);
    }
    if rows.is_empty() {
        println!("no enrollments found");
        return Ok(EXIT_SUCCESS);
    }

    let session_names: HashMap<_, _> = engine
        .list_sessions()
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|s| (s.session_id, s.name))
        .collect();

    println!(
        "{:<14} {:<12} {:<12} {:<10} {:<8} {:<6} STATUS",
        "SHORT_ID", "STUDENT", "SESSION", "CLASS", "SECTION", "ROLL"
    );
    for r in &rows {
        let session_name = session_names
            .get(&r.session_id)
            .map_or(r.session_id.as_str(), String::as_str);
        println!(
            "{:<14} {:<12} {:<12} {:<10} {:<8} {:<6} {}",
            r.short_id,
            r.student_id,
            session_name,
            r.class_id,
            r.section_id,
            r.roll_no,
            colorize_status(&r.status.to_string())
        );
    }
    Ok(EXIT_SUCCESS)
}

use super::{colorize_status, json_pretty, EXIT_SUCCESS};
use rollbook_core::Engine;

pub fn run(engine: &Engine, student: &str, json: bool) -> Result<u8, String> {
    let rows = engine
        .student_history(&student.into())
        .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("no enrollment history for '{student}'");
    } else {
        println!(
            "{:<14} {:<14} {:<10} {:<8} {:<6} STATUS",
            "SHORT_ID", "SESSION_ID", "CLASS", "SECTION", "ROLL"
        );
        for r in &rows {
            println!(
                "{:<14} {:<14} {:<10} {:<8} {:<6} {}",
                r.short_id,
                &r.session_id[..12.min(r.session_id.len())],
                r.class_id,
                r.section_id,
                r.roll_no,
                colorize_status(&r.status.to_string())
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

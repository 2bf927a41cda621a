use super::{colorize_status, json_pretty, resolve_enrollment_id, EXIT_SUCCESS};
use rollbook_core::Engine;

pub fn run(engine: &Engine, enrollment: &str, json: bool) -> Result<u8, String> {
    let resolved = resolve_enrollment_id(engine, enrollment)?;
    let rec = engine.enrollment(&resolved).map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&rec)?);
    } else {
        println!("enrollment_id:  {}", rec.enrollment_id);
        println!("short_id:       {}", rec.short_id);
        println!("student_id:     {}", rec.student_id);
        println!("session_id:     {}", rec.session_id);
        println!("class_id:       {}", rec.class_id);
        println!("section_id:     {}", rec.section_id);
        println!("roll_no:        {}", rec.roll_no);
        println!(
            "status:         {}",
            colorize_status(&rec.status.to_string())
        );
        if let Some(ref next) = rec.promoted_to {
            println!("promoted_to:    {next}");
        }
        if let Some(date) = rec.promotion_date {
            println!("promotion_date: {date}");
        }
        if !rec.remarks.is_empty() {
            println!("remarks:        {}", rec.remarks);
        }
        println!("created_at:     {}", rec.created_at);
        println!("updated_at:     {}", rec.updated_at);
    }
    Ok(EXIT_SUCCESS)
}

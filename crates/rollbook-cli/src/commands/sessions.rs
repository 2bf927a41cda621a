use super::{json_pretty, EXIT_SUCCESS};
use rollbook_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let sessions = engine.list_sessions().map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&sessions)?);
    } else if sessions.is_empty() {
        println!("no sessions found");
    } else {
        println!(
            "{:<14} {:<12} {:<12} {:<7} {:<7} SESSION_ID",
            "NAME", "START", "END", "ACTIVE", "LOCKED"
        );
        for s in &sessions {
            println!(
                "{:<14} {:<12} {:<12} {:<7} {:<7} {}",
                s.name,
                s.start_date,
                s.end_date,
                if s.is_active { "yes" } else { "" },
                if s.is_locked { "yes" } else { "" },
                &s.session_id[..12]
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

use super::{json_pretty, resolve_session, EXIT_SUCCESS};
use rollbook_core::Engine;

pub fn run(engine: &Engine, session: &str, json: bool) -> Result<u8, String> {
    let resolved = resolve_session(engine, session)?;
    let already = resolved.is_locked;
    let record = engine
        .lock_session(&resolved.session_id)
        .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&record)?);
    } else if already {
        println!("session '{}' was already locked", record.name);
    } else {
        println!("session '{}' locked", record.name);
    }
    Ok(EXIT_SUCCESS)
}

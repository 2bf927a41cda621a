use super::{json_pretty, resolve_session, EXIT_SUCCESS};
use rollbook_core::Engine;

pub fn run(engine: &Engine, session: &str, json: bool) -> Result<u8, String> {
    let resolved = resolve_session(engine, session)?;
    let record = engine
        .set_active_session(&resolved.session_id)
        .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&record)?);
    } else {
        println!("session '{}' is now active", record.name);
    }
    Ok(EXIT_SUCCESS)
}

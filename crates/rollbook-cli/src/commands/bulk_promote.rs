use super::{json_pretty, resolve_enrollment_id, resolve_session, EXIT_SUCCESS};
use rollbook_core::Engine;
use rollbook_schema::roster::parse_roster_file;
use std::path::Path;

pub fn run(engine: &Engine, roster_path: &Path, json: bool) -> Result<u8, String> {
    let roster = parse_roster_file(roster_path).map_err(|e| e.to_string())?;

    // Roster entries may use session names and short enrollment ids;
    // resolve everything up front so the batch fails before any write.
    let mut reqs = roster.to_requests();
    for req in &mut reqs {
        req.enrollment_id = resolve_enrollment_id(engine, req.enrollment_id.as_str())?.into();
        req.session_id = resolve_session(engine, req.session_id.as_str())?.session_id;
    }

    let outcomes = engine.bulk_promote(&reqs).map_err(|e| e.to_string())?;

    if json {
        let opened: Vec<_> = outcomes.iter().map(|o| &o.opened).collect();
        println!("{}", json_pretty(&opened)?);
    } else {
        println!("promoted {} students:", outcomes.len());
        for o in &outcomes {
            println!(
                "  {} {} -> {} (roll {})",
                o.closed.student_id, o.closed.short_id, o.opened.short_id, o.opened.roll_no
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

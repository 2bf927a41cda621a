use super::{json_pretty, EXIT_SUCCESS};
use chrono::NaiveDate;
use rollbook_core::Engine;
use rollbook_schema::requests::SessionRequest;

pub fn run(
    engine: &Engine,
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    activate: bool,
    json: bool,
) -> Result<u8, String> {
    let record = engine
        .create_session(&SessionRequest {
            name: name.to_owned(),
            start_date,
            end_date,
            is_active: activate,
        })
        .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&record)?);
    } else {
        println!(
            "created session '{}' ({})",
            record.name,
            &record.session_id[..12]
        );
        if record.is_active {
            println!("session '{}' is now active", record.name);
        }
    }
    Ok(EXIT_SUCCESS)
}

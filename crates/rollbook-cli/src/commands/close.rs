use super::{json_pretty, resolve_enrollment_id, EXIT_SUCCESS};
use rollbook_core::Engine;
use rollbook_schema::requests::ClosureRequest;

/// Terminal closures that end a student's enrollment without a successor row.
#[derive(Debug, Clone, Copy)]
pub enum CloseAction {
    Transfer,
    Graduate,
    Drop,
}

pub fn run(
    engine: &Engine,
    enrollment: &str,
    remarks: Option<&str>,
    action: CloseAction,
    json: bool,
) -> Result<u8, String> {
    let enrollment_id = resolve_enrollment_id(engine, enrollment)?;
    let req = ClosureRequest {
        enrollment_id: enrollment_id.into(),
        remarks: remarks.map(str::to_owned),
    };

    let closed = match action {
        CloseAction::Transfer => engine.transfer(&req),
        CloseAction::Graduate => engine.graduate(&req),
        CloseAction::Drop => engine.drop_out(&req),
    }
    .map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&closed)?);
    } else {
        println!(
            "enrollment {} ({}) closed as '{}'",
            closed.short_id, closed.student_id, closed.status
        );
    }
    Ok(EXIT_SUCCESS)
}

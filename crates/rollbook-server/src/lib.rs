//! HTTP JSON API for the Rollbook enrollment registry.
//!
//! Exposes the lifecycle engine over a small REST surface:
//! - `GET  /health`
//! - `GET|POST /sessions`, `GET /sessions/{id}`,
//!   `POST /sessions/{id}/lock`, `POST /sessions/{id}/activate`,
//!   `GET /sessions/{id}/locked`
//! - `GET|POST /enrollments`, `GET /enrollments/{id}`,
//!   `GET /enrollments/active?student_id=&session_id=`
//! - `POST /enrollments/{promote,bulk-promote,retain,transfer,graduate,drop}`
//!
//! Failures are JSON envelopes `{"error": {"kind": ..., "message": ...}}`
//! with 400 for validation, 404 for missing records, and 409 for lock,
//! duplicate, and state-machine conflicts.
//!
//! The [`TestServer`] helper starts a server on a random port for
//! integration testing.

use rollbook_core::{CoreError, Engine};
use rollbook_schema::requests::{
    ClosureRequest, EnrollRequest, PromotionRequest, RetentionRequest, SessionRequest,
};
use rollbook_store::{EnrollmentFilter, EnrollmentStatus, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::debug;

/// Split a request URL into its path and decoded query pairs.
fn split_query(url: &str) -> (&str, HashMap<&str, &str>) {
    match url.split_once('?') {
        Some((path, query)) => {
            let pairs = query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .filter(|(k, _)| !k.is_empty())
                .collect();
            (path, pairs)
        }
        None => (url, HashMap::new()),
    }
}

fn json_header() -> Header {
    Header::from_bytes("Content-Type", "application/json").expect("valid header")
}

fn respond_value(req: tiny_http::Request, value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            let _ = req.respond(Response::from_string(json).with_header(json_header()));
        }
        Err(e) => respond_error(req, 500, "internal", &format!("serialization failed: {e}")),
    }
}

fn respond_error(req: tiny_http::Request, code: u16, kind: &str, message: &str) {
    let body = serde_json::json!({"error": {"kind": kind, "message": message}});
    let _ = req.respond(
        Response::from_string(body.to_string())
            .with_header(json_header())
            .with_status_code(StatusCode(code)),
    );
}

/// Map an engine error onto a status code and a stable error kind.
fn error_parts(e: &CoreError) -> (u16, &'static str) {
    match e {
        CoreError::Validation(_) | CoreError::Store(StoreError::Validation(_)) => {
            (400, "validation")
        }
        CoreError::Store(
            StoreError::SessionNotFound(_) | StoreError::EnrollmentNotFound(_),
        ) => (404, "not_found"),
        CoreError::Store(StoreError::Locked(_)) => (409, "locked"),
        CoreError::Store(StoreError::DuplicateRollNumber { .. }) => (409, "duplicate_roll_number"),
        CoreError::Store(StoreError::DuplicateActiveEnrollment { .. }) => {
            (409, "duplicate_active_enrollment")
        }
        CoreError::Store(StoreError::DuplicateSessionName { .. }) => {
            (409, "duplicate_session_name")
        }
        CoreError::Store(StoreError::NotActive { .. }) | CoreError::InvalidTransition { .. } => {
            (409, "invalid_transition")
        }
        _ => (500, "internal"),
    }
}

fn respond_core_error(req: tiny_http::Request, e: &CoreError) {
    let (code, kind) = error_parts(e);
    respond_error(req, code, kind, &e.to_string());
}

fn read_json<T: DeserializeOwned>(req: &mut tiny_http::Request) -> Result<T, String> {
    let mut body = Vec::new();
    req.as_reader()
        .read_to_end(&mut body)
        .map_err(|e| format!("failed to read request body: {e}"))?;
    serde_json::from_slice(&body).map_err(|e| format!("invalid request body: {e}"))
}

/// Respond with the result of a mutating call, mapping errors to the envelope.
fn respond_result<T: Serialize>(req: tiny_http::Request, result: Result<T, CoreError>) {
    match result {
        Ok(value) => respond_value(req, &value),
        Err(e) => respond_core_error(req, &e),
    }
}

fn handle_enrollment_list(
    engine: &Engine,
    req: tiny_http::Request,
    query: &HashMap<&str, &str>,
) {
    let status = match query.get("status").map(|s| s.parse::<EnrollmentStatus>()) {
        Some(Ok(status)) => Some(status),
        Some(Err(e)) => {
            respond_error(req, 400, "validation", &e);
            return;
        }
        None => None,
    };
    let filter = EnrollmentFilter {
        session_id: query.get("session_id").map(|s| (*s).into()),
        class_id: query.get("class_id").map(|s| (*s).into()),
        section_id: query.get("section_id").map(|s| (*s).into()),
        status,
        student_id: query.get("student_id").map(|s| (*s).into()),
    };
    respond_result(req, engine.list_enrollments(&filter));
}

fn handle_find_active(engine: &Engine, req: tiny_http::Request, query: &HashMap<&str, &str>) {
    let (Some(student_id), Some(session_id)) =
        (query.get("student_id"), query.get("session_id"))
    else {
        respond_error(
            req,
            400,
            "validation",
            "student_id and session_id query parameters are required",
        );
        return;
    };
    match engine.find_active(&(*student_id).into(), &(*session_id).into()) {
        Ok(Some(record)) => respond_value(req, &record),
        Ok(None) => respond_error(
            req,
            404,
            "not_found",
            &format!("no active enrollment for student '{student_id}' in session '{session_id}'"),
        ),
        Err(e) => respond_core_error(req, &e),
    }
}

/// Handle a single HTTP request, dispatching to the appropriate route.
pub fn handle_request(engine: &Engine, mut req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let (path, query) = split_query(&url);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (&method, segments.as_slice()) {
        (Method::Get, ["health"]) => {
            let _ = req.respond(
                Response::from_string(r#"{"status":"ok"}"#).with_header(json_header()),
            );
        }

        (Method::Get, ["sessions"]) => respond_result(req, engine.list_sessions()),
        (Method::Post, ["sessions"]) => match read_json::<SessionRequest>(&mut req) {
            Ok(body) => respond_result(req, engine.create_session(&body)),
            Err(e) => respond_error(req, 400, "validation", &e),
        },
        (Method::Get, ["sessions", id]) => respond_result(req, engine.resolve_session(id)),
        (Method::Post, ["sessions", id, "lock"]) => {
            respond_result(req, engine.lock_session(id));
        }
        (Method::Post, ["sessions", id, "activate"]) => {
            respond_result(req, engine.set_active_session(id));
        }
        (Method::Get, ["sessions", id, "locked"]) => match engine.is_session_locked(id) {
            Ok(locked) => respond_value(req, &serde_json::json!({"locked": locked})),
            Err(e) => respond_core_error(req, &e),
        },

        (Method::Get, ["enrollments"]) => handle_enrollment_list(engine, req, &query),
        (Method::Get, ["enrollments", "active"]) => handle_find_active(engine, req, &query),
        (Method::Get, ["enrollments", id]) => respond_result(req, engine.enrollment(id)),
        (Method::Post, ["enrollments"]) => match read_json::<EnrollRequest>(&mut req) {
            Ok(body) => respond_result(req, engine.enroll(&body)),
            Err(e) => respond_error(req, 400, "validation", &e),
        },
        (Method::Post, ["enrollments", "promote"]) => {
            match read_json::<PromotionRequest>(&mut req) {
                Ok(body) => respond_result(req, engine.promote(&body)),
                Err(e) => respond_error(req, 400, "validation", &e),
            }
        }
        (Method::Post, ["enrollments", "bulk-promote"]) => {
            match read_json::<Vec<PromotionRequest>>(&mut req) {
                Ok(body) => respond_result(req, engine.bulk_promote(&body)),
                Err(e) => respond_error(req, 400, "validation", &e),
            }
        }
        (Method::Post, ["enrollments", "retain"]) => {
            match read_json::<RetentionRequest>(&mut req) {
                Ok(body) => respond_result(req, engine.retain(&body)),
                Err(e) => respond_error(req, 400, "validation", &e),
            }
        }
        (Method::Post, ["enrollments", "transfer"]) => {
            match read_json::<ClosureRequest>(&mut req) {
                Ok(body) => respond_result(req, engine.transfer(&body)),
                Err(e) => respond_error(req, 400, "validation", &e),
            }
        }
        (Method::Post, ["enrollments", "graduate"]) => {
            match read_json::<ClosureRequest>(&mut req) {
                Ok(body) => respond_result(req, engine.graduate(&body)),
                Err(e) => respond_error(req, 400, "validation", &e),
            }
        }
        (Method::Post, ["enrollments", "drop"]) => match read_json::<ClosureRequest>(&mut req) {
            Ok(body) => respond_result(req, engine.drop_out(&body)),
            Err(e) => respond_error(req, 400, "validation", &e),
        },

        _ => respond_error(req, 404, "not_found", "no such route"),
    }
}

/// Start the server loop, blocking the current thread.
pub fn run_server(engine: &Arc<Engine>, addr: &str) {
    let server = Server::http(addr).expect("failed to bind HTTP server");
    for request in server.incoming_requests() {
        handle_request(engine, request);
    }
}

/// A test helper that starts a rollbook-server on a random port in a
/// background thread, backed by the registry at `registry_dir`.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub registry_dir: PathBuf,
    _server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server. Binds to `127.0.0.1:0` (random port).
    pub fn start(registry_dir: PathBuf) -> Self {
        let engine = Engine::open(&registry_dir).expect("failed to open test registry");
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let srv = Arc::clone(&server);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&engine, request);
            }
        });

        Self {
            url,
            port,
            registry_dir,
            _server: server,
            _handle: handle,
        }
    }
}

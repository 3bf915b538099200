use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = &state.session;
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "rosterEntries": s.roster().map(|r| r.len()),
            "subjectFiles": s.subjects().len(),
            "cutoffOrigin": s.cutoffs().origin(),
            "hasResults": s.last_result().is_some(),
        }),
    )
}

fn handle_session_configure(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !req.params.is_object() {
        return err(&req.id, "bad_params", "params must be an object", None);
    }
    match state.session.configure(&req.params) {
        Ok(cleared) => ok(
            &req.id,
            json!({
                "config": state.session.config(),
                "subjectFilesCleared": cleared,
            }),
        ),
        Err(e) => err(&req.id, "bad_config", e.to_string(), None),
    }
}

fn handle_session_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session.reset();
    tracing::info!("session reset");
    ok(&req.id, json!({ "reset": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.configure" => Some(handle_session_configure(state, req)),
        "session.reset" => Some(handle_session_reset(state, req)),
        _ => None,
    }
}

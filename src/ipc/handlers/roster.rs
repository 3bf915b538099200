use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_roster_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match req.rows_param() {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match state.session.load_roster(&rows) {
        Ok(entries) => ok(&req.id, json!({ "entries": entries })),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.load" => Some(handle_roster_load(state, req)),
        _ => None,
    }
}

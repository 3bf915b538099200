use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_cutoffs_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match req.rows_param() {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match state.session.load_cutoffs(&rows) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_cutoffs_load_anchors(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match req.rows_param() {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match state.session.load_anchors(&rows) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_cutoffs_template(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "rows": state.session.cutoff_template() }))
}

fn handle_cutoffs_use_default(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subjects = state.session.use_default_cutoffs();
    ok(&req.id, json!({ "subjects": subjects }))
}

fn handle_cutoffs_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(subject) = req.str_param("subject") else {
        return err(&req.id, "bad_params", "missing params.subject", None);
    };
    let cutoffs = state.session.cutoffs();
    match cutoffs.get(subject) {
        Some(entry) => ok(
            &req.id,
            json!({ "origin": cutoffs.origin(), "entry": entry }),
        ),
        None => err(
            &req.id,
            "not_found",
            format!("no cutoff entry for {subject}"),
            Some(json!({ "origin": cutoffs.origin() })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "cutoffs.load" => Some(handle_cutoffs_load(state, req)),
        "cutoffs.loadAnchors" => Some(handle_cutoffs_load_anchors(state, req)),
        "cutoffs.template" => Some(handle_cutoffs_template(state, req)),
        "cutoffs.useDefault" => Some(handle_cutoffs_use_default(state, req)),
        "cutoffs.get" => Some(handle_cutoffs_get(state, req)),
        _ => None,
    }
}

use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::subjects::normalize_code;
use crate::table::cell_text;
use serde_json::json;

fn handle_subjects_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject = match req.str_param("subject") {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing params.subject", None),
    };
    if subject.is_empty() {
        return err(&req.id, "bad_params", "subject must not be empty", None);
    }
    let rows = match req.rows_param() {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match state.session.load_subject(&subject, rows) {
        Ok(n) => ok(&req.id, json!({ "subject": subject, "rows": n })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subjects: Vec<serde_json::Value> = state
        .session
        .subjects()
        .iter()
        .map(|t| json!({ "subject": t.subject(), "rows": t.len() }))
        .collect();
    let catalogue: Vec<serde_json::Value> = state
        .session
        .registry()
        .names()
        .map(|name| json!({ "name": name, "code": state.session.registry().code_for(name) }))
        .collect();
    ok(&req.id, json!({ "subjects": subjects, "catalogue": catalogue }))
}

fn handle_subjects_resolve_code(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(code) = cell_text(req.params.get("code")) else {
        return err(&req.id, "bad_params", "missing params.code", None);
    };
    let cutoffs = state.session.cutoffs();
    let registry = state.session.registry();
    ok(
        &req.id,
        json!({
            "code": normalize_code(&code),
            "subjectName": registry.resolve(&code, &cutoffs),
            "catalogueName": registry.name_for_code(&code),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.load" => Some(handle_subjects_load(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.resolveCode" => Some(handle_subjects_resolve_code(state, req)),
        _ => None,
    }
}

use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::table::identifier_text;
use serde_json::json;

fn handle_results_process(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.session.process() {
        Ok(result) => ok(&req.id, json!(result)),
        Err(e) => {
            tracing::warn!(code = e.code(), error = %e, "processing failed");
            engine_err(&req.id, &e)
        }
    }
}

fn handle_results_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(result) = state.session.last_result() else {
        return err(&req.id, "no_results", "run results.process first", None);
    };
    let examinees: Vec<serde_json::Value> = result
        .records
        .values()
        .map(|r| json!({ "examineeId": r.examinee_id, "name": r.name }))
        .collect();
    ok(
        &req.id,
        json!({ "runId": result.run_id, "examinees": examinees }),
    )
}

fn handle_results_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(examinee) = identifier_text(req.params.get("examineeId")) else {
        return err(&req.id, "bad_params", "missing params.examineeId", None);
    };
    let Some(result) = state.session.last_result() else {
        return err(&req.id, "no_results", "run results.process first", None);
    };
    match result.records.get(&examinee) {
        Some(record) => ok(
            &req.id,
            json!({ "runId": result.run_id, "record": record }),
        ),
        None => err(
            &req.id,
            "not_found",
            format!("no record for examinee {examinee}"),
            None,
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.process" => Some(handle_results_process(state, req)),
        "results.list" => Some(handle_results_list(state, req)),
        "results.student" => Some(handle_results_student(state, req)),
        _ => None,
    }
}

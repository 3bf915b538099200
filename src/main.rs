mod calc;
mod config;
mod cutoffs;
mod error;
mod ipc;
mod logging;
mod merge;
mod model;
mod roster;
mod session;
mod subjects;
mod table;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use config::EngineConfig;
use session::Session;
use subjects::SubjectRegistry;

fn main() {
    if let Err(e) = logging::init_tracing() {
        eprintln!("scorecardd: logging disabled: {e}");
    }

    let config = match EngineConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "config load failed; using defaults");
            EngineConfig::default()
        }
    };
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        merge_mode = ?config.merge_mode,
        max_examinees = config.max_examinees,
        "scorecardd started"
    );

    let mut state = ipc::AppState {
        session: Session::new(config, Arc::new(SubjectRegistry::builtin())),
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparsable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed; exiting");
}

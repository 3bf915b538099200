use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter override, e.g. `SCORECARDD_LOG=scorecardd=debug`.
pub const LOG_ENV: &str = "SCORECARDD_LOG";
/// Any non-empty value other than `0` switches stderr output to JSON lines.
pub const LOG_JSON_ENV: &str = "SCORECARDD_LOG_JSON";

const DEFAULT_FILTER: &str = "scorecardd=info";

/// Logs go to stderr only; stdout carries the IPC responses.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let json = std::env::var(LOG_JSON_ENV)
        .map(|v| !v.is_empty() && v != "0")
        .unwrap_or(false);
    init_with(json)
}

fn init_with(log_json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(filter);

    if log_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_span_events(fmt::format::FmtSpan::CLOSE),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

//! Logging setup shared by the harness binary and integration tests

use tracing_subscriber::{EnvFilter, fmt};

fn filter_for(verbose: bool) -> String {
    let base_level = if verbose { "debug" } else { "info" };
    format!("tester={base_level},shared={base_level},reqwest=warn,hyper=warn")
}

/// Initialize the stdout tracing subscriber for the harness process.
///
/// `RUST_LOG` is not consulted; the harness binary owns its filter so
/// scenario output stays readable next to the child processes' logs.
pub fn init_tracing(verbose: bool) {
    fmt()
        .with_env_filter(EnvFilter::new(filter_for(verbose)))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Like [`init_tracing`] but tolerates an already-installed subscriber,
/// which is what tests running in one process need.
pub fn try_init_tracing(verbose: bool) {
    let _ = fmt()
        .with_env_filter(EnvFilter::new(filter_for(verbose)))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

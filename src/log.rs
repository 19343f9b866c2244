//! Logging setup for the binary.

use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber writing to stderr.
///
/// `WARN` by default, `INFO` when verbose, `DEBUG` when debugging. Directives
/// in `RUST_LOG` take precedence.
pub fn init(verbose: bool, debug: bool) {
    let log_level = if debug {
        LevelFilter::DEBUG
    } else if verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // someone else already installed one; keep theirs
        return;
    }
    debug!("Initialize tracing log");
}

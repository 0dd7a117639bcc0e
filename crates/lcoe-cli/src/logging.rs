use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

/// Install a stderr subscriber. `RUST_LOG` wins; otherwise `-v` raises the
/// level from warn to debug and `-vv` to trace.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = Registry::default()
        .with(filter)
        .with(subscriber_fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

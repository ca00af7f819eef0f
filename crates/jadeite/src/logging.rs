use tracing_subscriber::EnvFilter;

use crate::args::GlobalArgs;

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level follows `-q`/`-v`.
pub fn init(args: &GlobalArgs) {
    let level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

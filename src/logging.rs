use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

pub fn init_logging(verbosity: u8) {
    let default_directive = match verbosity {
        0 => "info,phishfeat=info",
        1 => "info,phishfeat=debug",
        _ => "debug,phishfeat=trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

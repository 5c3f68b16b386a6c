// Log output control
//
// Three verbosity levels: 0 shows warnings and cycle summaries, 1 adds
// operational info, 2 shows everything. RUST_LOG overrides the level.
use tracing_subscriber::EnvFilter;

pub fn filter_for(verbosity: u8) -> EnvFilter {
    let directive = match verbosity {
        0 => "warn,fleet_autopilot::controller=info",
        1 => "info",
        _ => "debug,fleet_autopilot=trace",
    };
    EnvFilter::new(directive)
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(verbosity));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .try_init();
}

//! Thin CLI harness wiring a platform probe, scanner, and sampler together.
//!
//! This binary is a demonstration of the library's wiring, not the
//! deliverable: it uses [`MockProbe`] in place of a real OS-specific
//! process enumerator, which is out of scope for this crate (see the
//! crate-level design notes).

use clap::Parser;
use pt_core::collect::{CancelToken, MockProbe, Scanner};
use pt_core::{exit_codes::ExitCode, registry::Consumer, registry::ConsumerRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "pt-core", about = "Process telemetry scan/sample/sketch harness")]
struct Cli {
    /// How long to run the demonstration scan loop before exiting.
    #[arg(long, env = "PT_DEMO_DURATION_SECS", default_value_t = 5)]
    duration_secs: u64,

    /// Base scan interval in seconds.
    #[arg(long, env = "PT_SAMPLE_INTERVAL_SECS", default_value_t = 1)]
    sample_interval_secs: u64,
}

struct LoggingConsumer;

impl Consumer for LoggingConsumer {
    fn on_change(&mut self, change_set: Arc<pt_core::collect::ChangeSet>) {
        tracing::info!(
            appeared = change_set.appeared.len(),
            departed = change_set.departed.len(),
            changed = change_set.changed.len(),
            unchanged = change_set.unchanged.len(),
            "scan cycle"
        );
    }
}

fn main() {
    pt_core::logging::init();
    let cli = Cli::parse();

    let overrides = pt_config::TelemetryConfig {
        scanner: pt_config::ScannerConfig {
            sample_interval_secs: cli.sample_interval_secs,
            ..pt_config::ScannerConfig::default()
        },
        ..pt_config::TelemetryConfig::default()
    };
    let cfg = pt_config::resolve_config(Some(overrides));

    if let Err(errors) = pt_config::validate(&cfg) {
        for e in errors {
            tracing::error!(error = %e, "invalid configuration");
        }
        std::process::exit(ExitCode::ConfigError.as_i32());
    }

    let (sink, _diagnostics_rx) = pt_core::diagnostics::channel(64);
    let probe = MockProbe::new(vec![vec![]]);
    let scanner = match Scanner::new(probe, cfg.scanner.clone(), sink) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to construct scanner");
            std::process::exit(ExitCode::RuntimeError.as_i32());
        }
    };

    let registry = Arc::new(ConsumerRegistry::new(64));
    registry.register("logger", LoggingConsumer);

    let cancel = CancelToken::new();
    let run_cancel = cancel.clone();
    let handle = std::thread::spawn(move || scanner.run(registry, run_cancel));

    let deadline = Instant::now() + Duration::from_secs(cli.duration_secs);
    while Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(100));
    }
    cancel.cancel();
    let _ = handle.join();

    std::process::exit(ExitCode::Clean.as_i32());
}

use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::error::Error;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use altitude_hold::actuator::LoggingDriver;
use altitude_hold::control::{DiagnosticLog, LogSink};
use altitude_hold::sensor::SimulatedBarometer;
use altitude_hold::tasks::{
    spawn_actuator_thread, spawn_command_thread, spawn_control_thread, spawn_sensor_thread,
    TaskStats,
};
use altitude_hold::{load_config, AltitudeController, ConfigBuffer, ControlClock, SharedStateHub, TaskContext};

/// Altitude-hold controller running against a simulated barometer.
/// Remote commands (e.g. `TARGET 5`, `FORWARD`, `AUTO`) are read from stdin.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the TOML runtime configuration
    #[arg(short, long, default_value = "config/system_config.toml")]
    config: PathBuf,

    /// Override `run.duration_secs`
    #[arg(short, long)]
    duration_secs: Option<u64>,

    /// Override `run.log_level` (error, warn, info, debug, trace)
    #[arg(short, long)]
    log_level: Option<LevelFilter>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(secs) = args.duration_secs {
        config.run.duration_secs = secs;
    }
    let level = match args.log_level {
        Some(level) => level,
        None => config.run.log_level.parse()?,
    };
    TermLogger::init(
        level,
        ConfigBuilder::new().set_time_format_rfc3339().build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    info!("Starting altitude-hold controller");

    let clock = ControlClock::new();
    let hub = SharedStateHub::new(&config.hub);
    let diagnostics = DiagnosticLog::new(config.run.diagnostic_log_size);
    let controller = AltitudeController::from_settings(&config.controller)?
        .with_clock(clock.clone())
        .with_sink((LogSink, diagnostics.clone()));
    let barometer = SimulatedBarometer::new(&config.sensor, clock.clone());

    let duration = Duration::from_secs(config.run.duration_secs);
    let ctx = TaskContext::new(hub, ConfigBuffer::new(config), clock);

    let sensor_handle = spawn_sensor_thread(barometer.clone(), ctx.clone());
    let control_handle = spawn_control_thread(controller, ctx.clone());
    let actuator_handle = spawn_actuator_thread((LoggingDriver::default(), barometer.clone()), ctx.clone());
    // stdin blocks until a line arrives, so this one is not joined
    let _command_handle = spawn_command_thread(BufReader::new(std::io::stdin()), ctx.clone());

    info!("System running for {} seconds...", duration.as_secs());
    std::thread::sleep(duration);

    info!("Run completed - initiating shutdown");
    ctx.stats.request_shutdown();
    let _ = sensor_handle.join();
    let controller = control_handle.join().ok();
    let _ = actuator_handle.join();

    let stats = &ctx.stats;
    info!(
        "[SENSOR] cycles={} dropouts={} displaced={} write_failures={}",
        TaskStats::get(&stats.sensor_cycles),
        TaskStats::get(&stats.sensor_dropouts),
        TaskStats::get(&stats.samples_displaced),
        TaskStats::get(&stats.snapshot_write_failures),
    );
    info!(
        "[CONTROL] cycles={} commands={} skipped={} stale={} hub_failures={} remote={}",
        TaskStats::get(&stats.control_cycles),
        TaskStats::get(&stats.commands_written),
        TaskStats::get(&stats.skipped_cycles),
        TaskStats::get(&stats.stale_samples),
        TaskStats::get(&stats.hub_failures),
        TaskStats::get(&stats.remote_commands),
    );
    info!(
        "[NETWORK] queued={} rejected={}",
        TaskStats::get(&stats.commands_queued),
        TaskStats::get(&stats.rejected_lines),
    );
    info!("[ACTUATOR] cycles={}", TaskStats::get(&stats.actuation_cycles));

    if let Some(pid) = controller {
        info!(
            "Final: reference={:.2} m target={:+.2} m plant={:.2} m error_sum={:.3}",
            pid.initial_value(),
            pid.target(),
            barometer.true_altitude(),
            pid.error_sum()
        );
    }
    if let Some(d) = diagnostics.latest() {
        info!(
            "Last step: relative={:+.2} m error={:+.2} output={} ({} records kept)",
            d.relative,
            d.error,
            d.output,
            diagnostics.len()
        );
    }

    let report = ctx.metrics.report();
    info!("=== Performance Metrics ===");
    info!("Compute P50: {:?}, P99: {:?}", report.compute_p50, report.compute_p99);
    info!("Sample age P50: {} ms, P99: {} ms", report.sample_age_p50_ms, report.sample_age_p99_ms);
    info!("Lock wait P50: {:?}, P99: {:?}", report.lock_wait_p50, report.lock_wait_p99);
    info!("Cycle jitter P50: {:?}, P99: {:?}", report.jitter_p50, report.jitter_p99);
    info!("Computed cycles: {}", report.computed_cycles);
    info!(
        "Hub freshness at exit: {:?} ({} exhausted lock budgets)",
        ctx.hub.freshness(),
        ctx.hub.lock_failures()
    );

    Ok(())
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::task::spawn_blocking;
use tracing::{info, warn};

use sixsim_config::SimSettings;
use sixsim_engine::{Connectivity, EngineRegistry, RunSummary, SimEngine};
use sixsim_simulator::{connectivity, DefaultScenario};
use sixsim_telemetry::EventLogger;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Settings file. Without it, `config/sixsim.yaml` and
    /// `config/$SIXSIM_ENV.yaml` are layered over the defaults.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Boot the default scenario and run it
    Run(RunArgs),
    /// Validate the settings and build the connectivity model
    Check,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Pause when this ASN has been dispatched and print a snapshot
    #[arg(long)]
    pub pause_at: Option<u64>,

    /// Wall-clock seconds to stay paused before resuming
    #[arg(long, default_value = "0", value_parser = parse_secs, requires = "pause_at")]
    pub resume_after: Duration,

    /// End the run after this much virtual time, in seconds
    #[arg(long, value_parser = parse_secs)]
    pub terminate_after: Option<Duration>,

    /// Print the Prometheus metrics of the run when it ends
    #[arg(long)]
    pub metrics: bool,
}

/// Parses a non-negative, finite number of seconds.
fn parse_secs(arg: &str) -> Result<Duration, String> {
    let secs: f64 = arg.parse().map_err(|err: std::num::ParseFloatError| err.to_string())?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("{arg} is not a valid number of seconds"))
}

pub fn load_settings(path: Option<&Path>) -> anyhow::Result<SimSettings> {
    let settings = match path {
        Some(path) => SimSettings::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimSettings::load().context("loading settings")?,
    };
    Ok(settings)
}

pub async fn run_simulation(settings: SimSettings, args: RunArgs) -> anyhow::Result<()> {
    EventLogger::init(&settings.telemetry.log_level);

    let scenario = DefaultScenario::new();
    let stats = scenario.stats();
    let engine = spawn_blocking(move || {
        EngineRegistry::global().get_or_boot(settings, &scenario)
    })
    .await??;

    if let Some(asn) = args.pause_at {
        engine.pause_at_asn(asn)?;
    }
    if let Some(delay) = args.terminate_after {
        let end = engine.terminate_simulation(engine.slots_in(delay)?)?;
        info!(asn = end, "run will be terminated");
    }

    let handle = engine.start()?;
    let mut run = spawn_blocking(move || handle.join());

    if args.pause_at.is_some() {
        tokio::select! {
            paused = wait_until_paused(engine.clone()) => {
                if paused? {
                    print_snapshot(&engine);
                    tokio::time::sleep(args.resume_after).await;
                    engine.play();
                }
            }
            _ = tokio::signal::ctrl_c() => interrupt(&engine),
        }
    }

    let summary = tokio::select! {
        joined = &mut run => joined?,
        _ = tokio::signal::ctrl_c() => {
            interrupt(&engine);
            run.await?
        }
    };
    let summary = summary
        .map_err(|_| anyhow::anyhow!("SimEngine thread panicked"))??;

    print_summary(&summary, stats.beacons_sent(), stats.receptions());
    if args.metrics {
        println!("{}", engine.metrics().gather_metrics()?);
    }

    EngineRegistry::global().destroy();
    Ok(())
}

/// Resolves to `false` if the run ended without pausing.
async fn wait_until_paused(engine: SimEngine) -> anyhow::Result<bool> {
    loop {
        let probe = engine.clone();
        if spawn_blocking(move || probe.wait_until_paused(Duration::from_millis(100))).await? {
            return Ok(true);
        }
        if engine.wait_until_ended(Duration::ZERO) {
            return Ok(false);
        }
    }
}

/// Ends the run at the next slot, resuming it first if it is paused.
fn interrupt(engine: &SimEngine) {
    match engine.terminate_simulation(1) {
        Ok(asn) => warn!(asn, "interrupted, terminating"),
        Err(err) => warn!("interrupted, cannot terminate: {err}"),
    }
    engine.play();
}

fn print_snapshot(engine: &SimEngine) {
    println!("paused at ASN {}", engine.get_asn());
    println!("  pending events: {}", engine.pending_events());
    if let Some(next) = engine.next_event_asn() {
        println!("  next event at:  ASN {next}");
    }
}

fn print_summary(summary: &RunSummary, beacons: u64, receptions: u64) {
    println!("run ended: {:?}", summary.stop_reason);
    println!("  final ASN:         {}", summary.final_asn);
    println!("  events dispatched: {}", summary.events_dispatched);
    println!("  batches:           {}", summary.batches);
    println!("  beacons sent:      {beacons}");
    println!("  beacon receptions: {receptions}");
}

pub fn check(settings: SimSettings) -> anyhow::Result<()> {
    EventLogger::init(&settings.telemetry.log_level);

    let matrix = connectivity::from_settings(&settings)?;
    let nodes = settings
        .exec
        .num_motes
        .or_else(|| matrix.node_count())
        .context("exec.num_motes is unset and the connectivity model has no node count")?;

    println!("settings ok");
    println!("  connectivity:  {} ({} links)", matrix.kind(), matrix.link_count());
    println!("  topology:      {}", settings.topology.class);
    println!("  nodes:         {nodes}");
    println!(
        "  run length:    {} slots ({:.2} s)",
        settings.run_length_slots(),
        settings.run_length_secs()
    );
    if !settings.auto_end() {
        println!("  end of run:    on join (secjoin enabled)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "sixsim",
            "run",
            "--pause-at",
            "500",
            "--resume-after",
            "1.5",
            "--terminate-after",
            "30",
            "--config",
            "sim.yaml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("sim.yaml")));
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.pause_at, Some(500));
                assert_eq!(args.resume_after, Duration::from_millis(1500));
                assert_eq!(args.terminate_after, Some(Duration::from_secs(30)));
                assert!(!args.metrics);
            }
            Commands::Check => panic!("expected run"),
        }
    }

    #[test]
    fn rejects_negative_and_nan_durations() {
        for flags in [
            ["--terminate-after", "-1"],
            ["--terminate-after", "NaN"],
            ["--terminate-after", "inf"],
            ["--resume-after", "NaN"],
        ] {
            let mut argv = vec!["sixsim", "run", "--pause-at", "5"];
            argv.extend(flags);
            assert!(Cli::try_parse_from(argv).is_err(), "{flags:?}");
        }
    }

    #[test]
    fn resume_defaults_to_zero() {
        let cli = Cli::try_parse_from(["sixsim", "run"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.resume_after, Duration::ZERO);
                assert_eq!(args.terminate_after, None);
            }
            Commands::Check => panic!("expected run"),
        }
    }

    #[test]
    fn resume_needs_pause() {
        assert!(Cli::try_parse_from(["sixsim", "run", "--resume-after", "2"]).is_err());
    }

    #[test]
    fn check_default_settings() {
        check(SimSettings::default()).unwrap();
    }

    #[test]
    fn check_rejects_unknown_connectivity() {
        let mut settings = SimSettings::default();
        settings.conn.class = "Mesh".into();
        assert!(check(settings).is_err());
    }
}

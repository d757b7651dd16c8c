// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use esnode_offload::cluster::ClusterError;
use esnode_offload::PolicyKind;
use fogsim_core::adapters::export;
use fogsim_core::config::ConfigError;
use fogsim_core::metrics::SummaryRecord;
use fogsim_core::{run_policy, ConfigOverrides, LogLevel, SimConfig};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "esnode-fogsim", about = "Deterministic IoT-to-fog task offloading simulator")]
struct Cli {
    /// Optional path to configuration file (TOML). Also read from `FOGSIM_CONFIG`.
    #[arg(long, env = "FOGSIM_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Number of fog devices.
    #[arg(long, env = "FOGSIM_FOG", global = true)]
    fog: Option<usize>,

    /// Number of IoT task sources.
    #[arg(long, env = "FOGSIM_IOT", global = true)]
    iot: Option<usize>,

    /// Number of spatial cells (k for the clusterer).
    #[arg(long, env = "FOGSIM_CELLS", global = true)]
    cells: Option<usize>,

    /// Number of simulation ticks per policy run.
    #[arg(long, env = "FOGSIM_TICKS", global = true)]
    ticks: Option<u64>,

    /// Base seed; fans out to every random stream (topology, IoT, traffic,
    /// clusterer, policy).
    #[arg(long, env = "FOGSIM_SEED", global = true)]
    seed: Option<u64>,

    /// Wall-clock span of one tick (e.g. 1s, 500ms).
    #[arg(long, env = "FOGSIM_TICK_DURATION", global = true)]
    tick_duration: Option<String>,

    /// Task generation probability per IoT device per tick.
    #[arg(long, env = "FOGSIM_GEN_PROBABILITY", global = true)]
    gen_probability: Option<f64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "FOGSIM_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the simulator and print one summary block per policy.
    Run {
        /// Offloading policy to evaluate.
        #[arg(long, value_enum, default_value_t = PolicyArg::All)]
        policy: PolicyArg,

        /// Also write the summary records to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Emit records as JSON lines instead of the text blocks.
        #[arg(long)]
        json: bool,
    },
    /// List the available offloading policies.
    Policies,
    /// View or modify simulator config.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    Show,
    Set {
        /// Key-value pair (key=value) to persist into fogsim.toml.
        key_value: String,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PolicyArg {
    Static,
    Dynamic,
    Hybrid,
    All,
}

impl PolicyArg {
    fn kinds(self) -> Vec<PolicyKind> {
        match self {
            Self::Static => vec![PolicyKind::Static],
            Self::Dynamic => vec![PolicyKind::Dynamic],
            Self::Hybrid => vec![PolicyKind::Hybrid],
            Self::All => PolicyKind::all(),
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if err.downcast_ref::<ConfigError>().is_some()
                || err.downcast_ref::<ClusterError>().is_some()
                || err.downcast_ref::<fogsim_core::SimError>().is_some()
            {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(&cli);
    let mut config = SimConfig::default();

    if config_path.exists() {
        let file_overrides = load_config_file(&config_path)
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;
        config.apply_overrides(file_overrides);
    }
    config.apply_overrides(cli_to_overrides(&cli)?);
    if let Some(seed) = cli.seed {
        config.apply_base_seed(seed);
    }

    match cli.command.as_ref().unwrap_or(&Command::Run {
        policy: PolicyArg::All,
        csv: None,
        json: false,
    }) {
        Command::Run { policy, csv, json } => {
            init_tracing(&config);
            config.validate()?;
            command_run(&config, *policy, csv.as_deref(), *json)
        }
        Command::Policies => {
            command_policies();
            Ok(())
        }
        Command::Config { action } => match action {
            ConfigCommand::Show => command_config_show(&config_path, &config),
            ConfigCommand::Set { key_value } => command_config_set(&config_path, key_value),
        },
    }
}

fn command_run(config: &SimConfig, policy: PolicyArg, csv: Option<&Path>, json: bool) -> Result<()> {
    tracing::info!(config = %config.label(), "starting esnode-fogsim");
    let mut records = Vec::new();
    for kind in policy.kinds() {
        let record = run_policy(config, kind)?;
        if json {
            println!("{}", serde_json::to_string(&record)?);
        } else {
            print_record(&record);
        }
        records.push(record);
    }
    if let Some(path) = csv {
        export::write_csv(path, &records)
            .with_context(|| format!("failed to write CSV to {}", path.display()))?;
        tracing::info!(path = %path.display(), records = records.len(), "summary CSV written");
    }
    Ok(())
}

fn print_record(record: &SummaryRecord) {
    println!("Policy {} ({})", record.policy, record.config);
    println!(
        "  Completion rate: {:.3} ({} of {} tasks)",
        record.completion_rate, record.completed, record.generated
    );
    println!("  Mean utilization: {:.3}", record.utilization);
    println!(
        "  Load balance: {:.3} (stddev) / {:.3} (range)",
        record.load_balance_stddev, record.load_balance_range
    );
    println!("  Avg response: {:.1} ms", record.avg_response_ms);
    println!("  Energy: {:.1} J", record.total_energy_j);
    println!(
        "  Offload rate: {:.3} over {} messages",
        record.offload_rate, record.messages
    );
    println!(
        "  Failed: {}  Dropped: {}  In flight at end: {}",
        record.failed, record.dropped, record.in_flight
    );
}

fn command_policies() {
    println!("Available policies:");
    println!("  static  -> per-cell capacity ring, offload above 80% load");
    println!("  dynamic -> snapshot-driven, cell-agnostic, probabilistic probing");
    println!("  hybrid  -> master-aware table with a load/distance blend fallback");
}

fn command_config_show(path: &Path, effective: &SimConfig) -> Result<()> {
    println!("Config path: {}", path.display());
    println!("{}", toml::to_string_pretty(effective)?);
    Ok(())
}

fn command_config_set(path: &Path, pair: &str) -> Result<()> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("use key=value syntax"))?;
    let mut config = SimConfig::default();
    if path.exists() {
        let file_overrides = load_config_file(path)?;
        config.apply_overrides(file_overrides);
    }
    apply_config_kv(&mut config, key, value)?;
    persist_config(path, &config)?;
    println!("Updated {} in {}", key, path.display());
    Ok(())
}

fn apply_config_kv(config: &mut SimConfig, key: &str, val: &str) -> Result<()> {
    match key {
        "fog_devices" => config.fog_devices = val.parse()?,
        "iot_devices" => config.iot_devices = val.parse()?,
        "cells" => config.cells = val.parse()?,
        "ticks" => config.ticks = val.parse()?,
        "tick_duration" => config.tick_duration = humantime::parse_duration(val)?,
        "gen_probability" => config.gen_probability = val.parse()?,
        "urgent_probability" => config.urgent_probability = val.parse()?,
        "max_queue" => config.max_queue = val.parse()?,
        "refresh_interval" => config.refresh_interval = val.parse()?,
        "topology_seed" => config.topology_seed = val.parse()?,
        "iot_seed" => config.iot_seed = val.parse()?,
        "traffic_seed" => config.traffic_seed = val.parse()?,
        "cluster_seed" => config.cluster_seed = val.parse()?,
        "policy_seed" => config.policy_seed = val.parse()?,
        "log_level" => config.log_level = parse_log_level(Some(val))?.unwrap(),
        other => bail!("unknown config key {other}"),
    }
    Ok(())
}

fn persist_config(path: &Path, config: &SimConfig) -> Result<()> {
    let contents = toml::to_string_pretty(config)?;
    fs::write(path, contents)?;
    Ok(())
}

fn resolve_config_path(cli: &Cli) -> PathBuf {
    if let Some(path) = &cli.config {
        path.clone()
    } else {
        PathBuf::from("fogsim.toml")
    }
}

fn load_config_file(path: &Path) -> Result<ConfigOverrides> {
    let contents = fs::read_to_string(path)?;
    let overrides: ConfigOverrides = toml::from_str(&contents)?;
    Ok(overrides)
}

fn cli_to_overrides(cli: &Cli) -> Result<ConfigOverrides> {
    Ok(ConfigOverrides {
        fog_devices: cli.fog,
        iot_devices: cli.iot,
        cells: cli.cells,
        ticks: cli.ticks,
        tick_duration: parse_duration(cli.tick_duration.as_deref())?,
        gen_probability: cli.gen_probability,
        log_level: parse_log_level(cli.log_level.as_deref())?,
        ..ConfigOverrides::default()
    })
}

fn parse_duration(input: Option<&str>) -> Result<Option<std::time::Duration>> {
    if let Some(value) = input {
        let duration = humantime::parse_duration(value)?;
        Ok(Some(duration))
    } else {
        Ok(None)
    }
}

fn parse_log_level(input: Option<&str>) -> Result<Option<LogLevel>> {
    if let Some(level) = input {
        let parsed = match level.to_ascii_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            other => bail!("unknown log level {other}"),
        };
        Ok(Some(parsed))
    } else {
        Ok(None)
    }
}

fn init_tracing(config: &SimConfig) {
    let env_filter =
        EnvFilter::from_default_env().add_directive(config.log_level.as_tracing().into());
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

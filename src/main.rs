//! tfsynth CLI
//!
//! Entry point for the `tfsynth` command-line tool.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tfsynth::config::REPO_CONFIG_FILE;
use tfsynth::{
    write_app, AppFile, AppFileError, ConfigError, EffectiveConfig, ErrorCode, ErrorReport, OutputError,
    SynthError, Synthesis, SynthesizedApp,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tfsynth")]
#[command(about = "Synthesize Terraform JSON from declared stacks", version)]
struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable logging
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize every stack and write documents plus manifest.json
    Synth {
        #[command(flatten)]
        common: CommonArgs,

        /// Output directory (overrides output_dir)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Run a full synthesis pass without writing anything
    Validate {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Print emission order and dependency edges per stack
    Graph {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Print the effective configuration
    Config {
        /// Path to config file (default: tfsynth.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Declaration file (.json or .toml)
    #[arg(long, short = 'a', default_value = "tfsynth.json")]
    app: PathBuf,

    /// Path to config file (default: tfsynth.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Dependency linkage: ordering or explicit (overrides linkage)
    #[arg(long)]
    linkage: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Commands::Synth { common, out } => run_synth(common, out),
        Commands::Validate { common } => run_validate(common),
        Commands::Graph { common } => run_graph(common),
        Commands::Config { config } => run_config(config),
    }
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Print the error and exit non-zero
fn fail(json: bool, report: ErrorReport) -> ! {
    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{}", out),
            Err(_) => eprintln!("Error [{}]: {}", report.code, report.message),
        }
    } else {
        eprintln!("Error [{}]: {}", report.code, report.message);
    }
    process::exit(1);
}

fn config_report(e: ConfigError) -> ErrorReport {
    ErrorReport::new(ErrorCode::ConfigInvalid, e.to_string())
}

fn app_report(e: AppFileError) -> ErrorReport {
    match e {
        AppFileError::Synth(synth) => synth.to_report(),
        other => ErrorReport::new(ErrorCode::AppFileInvalid, other.to_string()),
    }
}

fn synth_report(e: SynthError) -> ErrorReport {
    e.to_report()
}

fn output_report(e: OutputError) -> ErrorReport {
    ErrorReport::new(ErrorCode::OutputFailed, e.to_string())
}

fn load_config(path: Option<PathBuf>, cli_overrides: Option<serde_json::Value>) -> Result<EffectiveConfig, ConfigError> {
    let path = path.unwrap_or_else(|| PathBuf::from(REPO_CONFIG_FILE));
    EffectiveConfig::build(Some(&path), cli_overrides)
}

/// Load config and declarations, then run the whole pass
fn synthesize(common: &CommonArgs, out: Option<&PathBuf>) -> (EffectiveConfig, SynthesizedApp) {
    let mut overrides = serde_json::Map::new();
    if let Some(linkage) = &common.linkage {
        overrides.insert("linkage".to_string(), serde_json::Value::String(linkage.clone()));
    }
    if let Some(out) = out {
        overrides.insert(
            "output_dir".to_string(),
            serde_json::Value::String(out.to_string_lossy().to_string()),
        );
    }
    let cli_overrides = (!overrides.is_empty()).then_some(serde_json::Value::Object(overrides));

    let config = load_config(common.config.clone(), cli_overrides).unwrap_or_else(|e| fail(common.json, config_report(e)));
    let options = config
        .to_options()
        .unwrap_or_else(|e| fail(common.json, config_report(e)));

    let tree = AppFile::from_path(&common.app)
        .and_then(|app| app.build())
        .unwrap_or_else(|e| fail(common.json, app_report(e)));

    let app = Synthesis::new(tree, options)
        .and_then(Synthesis::finish)
        .unwrap_or_else(|e| fail(common.json, synth_report(e)));

    (config, app)
}

fn run_synth(common: CommonArgs, out: Option<PathBuf>) {
    let (config, app) = synthesize(&common, out.as_ref());
    let out_dir = config.output_dir();

    let manifest = write_app(&out_dir, &app, config.pretty()).unwrap_or_else(|e| fail(common.json, output_report(e)));

    if common.json {
        match serde_json::to_string_pretty(&manifest) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        for stack in &manifest.stacks {
            println!("{}: {} ({} elements)", stack.name, out_dir.join(&stack.path).display(), stack.emission_order.len());
        }
    }
}

fn run_validate(common: CommonArgs) {
    let (_, app) = synthesize(&common, None);

    if common.json {
        let stacks: Vec<&str> = app.stacks.iter().map(|s| s.stack.as_str()).collect();
        println!("{}", serde_json::json!({ "valid": true, "stacks": stacks }));
    } else {
        println!("Declarations valid: {}", common.app.display());
        for stack in &app.stacks {
            println!("  {}: {} elements", stack.stack, stack.emission_order.len());
        }
    }
}

fn run_graph(common: CommonArgs) {
    let (_, app) = synthesize(&common, None);

    if common.json {
        let output: Vec<serde_json::Value> = app
            .stacks
            .iter()
            .map(|s| {
                serde_json::json!({
                    "stack": s.stack,
                    "emission_order": s.emission_order,
                    "edges": s.edges.iter().map(|(c, p)| serde_json::json!({"consumer": c, "provider": p})).collect::<Vec<_>>(),
                })
            })
            .collect();

        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        for stack in &app.stacks {
            println!("{}", stack.stack);
            for (i, address) in stack.emission_order.iter().enumerate() {
                println!("  {:>3}. {}", i + 1, address);
            }
            for (consumer, provider) in &stack.edges {
                println!("  {} -> {}", consumer, provider);
            }
        }
    }
}

fn run_config(config_path: Option<PathBuf>) {
    let config = load_config(config_path, None).unwrap_or_else(|e| fail(false, config_report(e)));

    match config.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_json_is_global() {
        let cli = Cli::try_parse_from(["tfsynth", "validate", "--app", "app.json", "--log-json"]).unwrap();
        assert!(cli.log_json);
        assert!(!cli.quiet);
        assert!(matches!(cli.command, Commands::Validate { .. }));

        let cli = Cli::try_parse_from(["tfsynth", "--log-json", "-vv", "config"]).unwrap();
        assert!(cli.log_json);
        assert_eq!(cli.verbose, 2);
    }
}

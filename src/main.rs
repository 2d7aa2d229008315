mod cli;

use ptsmap::{config, replay};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "ptsmap=trace,ptsmap_engine=trace,ptsmap_common=debug".to_string()
        } else {
            "ptsmap=info,ptsmap_engine=info".to_string()
        }
    });

    // Logs go to stderr so `--json` output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            trace,
            json,
            wall_clock,
            strict,
        } => replay_trace(&trace, cli.config.as_deref(), json, wall_clock, strict),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("ptsmap {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn replay_trace(
    trace: &Path,
    config_path: Option<&Path>,
    json: bool,
    wall_clock: bool,
    strict: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !trace.exists() {
        anyhow::bail!("Trace file does not exist: {:?}", trace);
    }

    let report = replay::replay_file(&config, trace, wall_clock)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }

    if strict && report.failures() > 0 {
        anyhow::bail!("{} trace events failed", report.failures());
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    let engine = config.engine_config();
    for (name, table) in [("Video", &engine.video), ("Audio", &engine.audio)] {
        println!(
            "  {} table: capacity {}, resolution {}, gc distance {:#x}, interpolation bound {}",
            name, table.capacity, table.resolution, table.gc_distance, table.interpolation_bound
        );
    }
    println!("  Hardware video alias: {}", engine.hw_video_alias);
    println!(
        "  Diagnostics: {} (window {})",
        config.diagnostics.enabled, config.diagnostics.window
    );

    Ok(())
}

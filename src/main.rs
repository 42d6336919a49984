//! SHOAL - CLI Entry Point
//!
//! Runs the competing-mortality kernel on a synthetic ecosystem.

use clap::{Parser, Subcommand};
use shoal::{benchmark, Config, Scenario};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "shoal")]
#[command(version)]
#[command(about = "Competing-mortality kernel for spatial fish-school ecosystem models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic ecosystem
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of steps to simulate
        #[arg(short, long, default_value = "240")]
        steps: usize,

        /// Output directory for statistics
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of steps
        #[arg(short, long, default_value = "48")]
        steps: usize,

        /// Maximum schools of each species per ocean cell
        #[arg(short = 'n', long, default_value = "3")]
        schools_per_cell: usize,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The configured log level is only known once the config is loaded
    let config = match &cli.command {
        Commands::Run { config, .. } => load_config(config)?,
        _ => None,
    };
    let level = config
        .as_ref()
        .map_or("info", |c| c.logging.log_level.as_str())
        .to_string();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Run {
            steps,
            output,
            seed,
            quiet,
            ..
        } => run_simulation(config.unwrap_or_default(), steps, output, seed, quiet),

        Commands::Benchmark {
            steps,
            schools_per_cell,
        } => run_benchmark(steps, schools_per_cell),

        Commands::Init { output } => generate_config(output),
    }
}

fn load_config(path: &Path) -> Result<Option<Config>, Box<dyn std::error::Error>> {
    if path.exists() {
        println!("Loading config from: {:?}", path);
        Ok(Some(Config::from_file(path)?))
    } else {
        println!("Using default configuration");
        Ok(None)
    }
}

fn run_simulation(
    config: Config,
    steps: usize,
    output: PathBuf,
    seed: Option<u64>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Create output directory
    std::fs::create_dir_all(&output)?;

    let mut scenario = if let Some(s) = seed {
        println!("Using seed: {}", s);
        Scenario::new_with_seed(config.clone(), s)?
    } else {
        Scenario::new(config.clone())?
    };

    println!("Starting simulation");
    println!("  Initial schools: {}", scenario.population());
    println!("  Grid size: {}x{}", config.grid.nx, config.grid.ny);
    println!("  Workers: {}", scenario.process().worker_count());
    println!("  Steps: {}", steps);
    println!();

    let start = Instant::now();
    let stats_interval = config.logging.stats_interval.max(1) as usize;

    for i in 0..steps {
        scenario.step()?;

        if !quiet && i % stats_interval == 0 {
            println!("{}", scenario.stats().summary());
        }

        if scenario.is_extinct() {
            println!("\nAll schools dead at step {}", scenario.time());
            break;
        }
    }

    let elapsed = start.elapsed();
    let steps_per_sec = scenario.time() as f64 / elapsed.as_secs_f64();

    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Steps: {}", scenario.time());
    println!("Speed: {:.1} steps/s", steps_per_sec);
    println!("Final schools: {}", scenario.population());
    if let Some(report) = scenario.last_report() {
        println!("Last batch layout: {:?}", report.batch_schools);
    }

    // Save stats
    let stats_path = output.join("stats_history.json");
    scenario.history().save(&stats_path)?;
    println!("Stats history: {:?}", stats_path);

    let last_path = output.join("stats_final.json");
    scenario.stats().save_json(&last_path)?;
    println!("Final stats: {:?}", last_path);

    Ok(())
}

fn run_benchmark(steps: usize, schools_per_cell: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== SHOAL Benchmark ===");
    println!("Steps: {}", steps);
    println!("Schools per cell: {}", schools_per_cell);
    println!();

    let result = benchmark(steps, schools_per_cell)?;
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}

//! # SHOAL
//!
//! Competing-mortality kernel for spatial fish-school ecosystem models.
//!
//! ## Features
//!
//! - **Unbiased**: causes and victims are visited in freshly shuffled order
//!   every sub-step
//! - **Parallel**: ocean cells are dispatched in school-balanced batches over
//!   a persistent Rayon pool
//! - **Lazy**: instantaneous abundance is derived on read behind a dirty flag
//! - **Configurable**: YAML configuration files
//! - **Reproducible**: seeded ChaCha streams, one per worker
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shoal::{Config, Scenario};
//!
//! // Create a synthetic ecosystem with the default config
//! let config = Config::default();
//! let mut scenario = Scenario::new(config)?;
//!
//! // Run twelve steps of mortality
//! scenario.run(12)?;
//!
//! println!("Schools: {}", scenario.population());
//! println!("{}", scenario.stats().summary());
//! # Ok::<(), shoal::MortalityError>(())
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use shoal::Config;
//!
//! let mut config = Config::default();
//! config.mortality.sub_steps = Some(20);
//! config.parallel.cpu_budget = 4;
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Driving the process directly
//!
//! ```rust,no_run
//! use shoal::{Config, MortalityProcess};
//! use shoal::scenario::build_domain;
//! use rand::SeedableRng;
//!
//! let config = Config::default();
//! let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
//! let mut domain = build_domain(&config, &mut rng);
//! let mut process = MortalityProcess::from_config(&config, &domain, 1)?;
//!
//! domain.begin_step();
//! let report = process.run(&mut domain, 0)?;
//! println!("Schools per worker: {:?}", report.batch_schools);
//! # Ok::<(), shoal::MortalityError>(())
//! ```

pub mod accounting;
pub mod config;
pub mod domain;
pub mod error;
pub mod fishing;
pub mod forcing;
pub mod grid;
pub mod orchestrator;
pub mod predation;
pub mod rates;
pub mod resolver;
pub mod scenario;
pub mod scheduler;
pub mod school;
pub mod stats;
pub mod swarm;

// Re-export main types
pub use accounting::{Accounting, MortalityCause};
pub use config::Config;
pub use domain::Domain;
pub use error::{MortalityError, Result};
pub use orchestrator::{MortalityProcess, StepReport};
pub use scenario::Scenario;
pub use school::School;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark
pub fn benchmark(steps: usize, schools_per_cell: usize) -> Result<BenchmarkResult> {
    use std::time::Instant;

    let mut config = Config::default();
    config.scenario.schools_per_cell = schools_per_cell;
    config.mortality.sub_steps = Some(config::DEFAULT_SUB_STEPS);

    let mut scenario = Scenario::new_with_seed(config, 42)?;
    let initial_schools = scenario.population();

    let start = Instant::now();
    scenario.run(steps)?;
    let elapsed = start.elapsed();

    Ok(BenchmarkResult {
        steps,
        workers: scenario.process().worker_count(),
        initial_schools,
        final_schools: scenario.population(),
        elapsed_secs: elapsed.as_secs_f64(),
        steps_per_second: steps as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    })
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub steps: usize,
    pub workers: usize,
    pub initial_schools: usize,
    pub final_schools: usize,
    pub elapsed_secs: f64,
    pub steps_per_second: f64,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Steps: {}", self.steps)?;
        writeln!(f, "Workers: {}", self.workers)?;
        writeln!(f, "Schools: {} -> {}", self.initial_schools, self.final_schools)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} steps/s", self.steps_per_second)?;
        Ok(())
    }
}

//! Scenario - a synthetic ecosystem around the mortality process.
//!
//! Builds a seeded grid and population from the configuration and runs a
//! minimal outer loop (spawning, random movement, mortality, ageing, dead
//! removal) so the mortality step can be exercised end to end.

use crate::config::Config;
use crate::domain::Domain;
use crate::error::Result;
use crate::grid::Grid;
use crate::orchestrator::{MortalityProcess, StepReport};
use crate::school::{Location, School};
use crate::stats::{MortalityStats, StatsHistory};
use crate::swarm::SwarmTemplate;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Probability that a school changes cell between two steps
const MOVE_PROBABILITY: f64 = 0.3;

/// The simulated ecosystem
pub struct Scenario {
    // Population
    domain: Domain,
    process: MortalityProcess,

    // State
    step: usize,
    config: Config,

    // Statistics
    stats: MortalityStats,
    history: StatsHistory,
    last_report: Option<StepReport>,

    // Random number generator (seeded for reproducibility)
    rng: ChaCha8Rng,
    seed: u64,
}

impl Scenario {
    /// Create a scenario, seeded from the configuration or at random
    pub fn new(config: Config) -> Result<Self> {
        let seed = config
            .scenario
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen());
        Self::new_with_seed(config, seed)
    }

    /// Create a scenario with a specific seed for reproducibility
    pub fn new_with_seed(config: Config, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let domain = build_domain(&config, &mut rng);
        let process = MortalityProcess::from_config(&config, &domain, rng.gen())?;
        log::info!(
            "Scenario seeded with {}: {} ocean cells, {} schools",
            seed,
            domain.grid().n_ocean(),
            domain.n_schools()
        );

        Ok(Self {
            domain,
            process,
            step: 0,
            stats: MortalityStats::new(),
            history: StatsHistory::new(config.logging.stats_interval),
            last_report: None,
            config,
            rng,
            seed,
        })
    }

    /// Main simulation step
    pub fn step(&mut self) -> Result<StepReport> {
        let started = std::time::Instant::now();

        // Phase 1: Spawn eggs at the start of every year
        if self.step % self.config.time.steps_per_year as usize == 0 {
            self.spawn_eggs();
        }

        // Phase 2: Move schools
        self.move_schools();

        // Phase 3: Freeze abundances
        self.domain.begin_step();

        // Phase 4: Mortality
        let report = self.process.run(&mut self.domain, self.step)?;

        // Phase 5: Statistics
        self.stats
            .update(&self.domain, self.step, self.config.species.len());

        // Phase 6: Age and remove dead schools
        let config = &self.config;
        self.stats.removed = self.domain.remove_dead(|species| config.lifespan_dt(species));
        for school in self.domain.schools_mut() {
            school.increment_age();
        }

        let elapsed = started.elapsed().as_secs_f32();
        self.stats.steps_per_second = if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 };
        if self.history.interval > 0 && self.step as u64 % self.history.interval == 0 {
            self.history.record(self.stats.clone());
        }

        self.step += 1;
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Run several steps
    pub fn run(&mut self, steps: usize) -> Result<()> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// One egg school per species in every cell where the species lives
    fn spawn_eggs(&mut self) {
        let mut spawners: Vec<(usize, usize)> = self
            .domain
            .cells()
            .iter()
            .flat_map(|population| {
                population
                    .schools()
                    .iter()
                    .filter(|s| !s.is_egg())
                    .map(move |s| (population.cell(), s.species))
            })
            .collect();
        spawners.sort_unstable();
        spawners.dedup();

        for (cell, species) in spawners {
            let sp = &self.config.species[species];
            let id = self.domain.next_school_id();
            let egg = School::new(
                id,
                species,
                self.config.scenario.egg_abundance,
                sp.weight * 1.0e-4,
                sp.length * 0.01,
                0,
                Location::Cell(cell),
            )
            .with_trophic_level(sp.trophic_level);
            self.domain.add_school(egg);
        }
    }

    fn move_schools(&mut self) {
        let ocean = self.domain.grid().ocean_cells().to_vec();
        if ocean.is_empty() {
            return;
        }
        for mut school in self.domain.drain_schools() {
            if !school.is_egg() && self.rng.gen_bool(MOVE_PROBABILITY) {
                if let Some(&cell) = ocean.choose(&mut self.rng) {
                    school.move_to(cell);
                }
            }
            self.domain.add_school(school);
        }
    }

    /// Live schools
    pub fn population(&self) -> usize {
        self.domain.n_schools()
    }

    pub fn is_extinct(&self) -> bool {
        self.population() == 0
    }

    /// Get seed for reproducibility
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of completed steps
    pub fn time(&self) -> usize {
        self.step
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn domain_mut(&mut self) -> &mut Domain {
        &mut self.domain
    }

    pub fn process(&self) -> &MortalityProcess {
        &self.process
    }

    pub fn process_mut(&mut self) -> &mut MortalityProcess {
        &mut self.process
    }

    pub fn stats(&self) -> &MortalityStats {
        &self.stats
    }

    pub fn history(&self) -> &StatsHistory {
        &self.history
    }

    pub fn last_report(&self) -> Option<&StepReport> {
        self.last_report.as_ref()
    }
}

/// Swarm templates of the configured resource groups, numbered as prey
/// after the fish species
pub fn swarm_templates(config: &Config) -> Vec<SwarmTemplate> {
    let n_species = config.species.len();
    config
        .resources
        .iter()
        .enumerate()
        .map(|(group, rsc)| SwarmTemplate {
            group,
            species: n_species + group,
            trophic_level: rsc.trophic_level,
        })
        .collect()
}

/// Seeded grid and initial population
pub fn build_domain<R: Rng>(config: &Config, rng: &mut R) -> Domain {
    let grid = Grid::random(config.grid.nx, config.grid.ny, config.grid.land_fraction, rng);
    let mut domain = Domain::new(grid, swarm_templates(config));
    let ocean = domain.grid().ocean_cells().to_vec();

    for cell in ocean {
        for (species, sp) in config.species.iter().enumerate() {
            let lifespan_dt = config.lifespan_dt(species).max(2);
            let count = rng.gen_range(0..=config.scenario.schools_per_cell);
            for _ in 0..count {
                let age_dt = rng.gen_range(1..lifespan_dt);
                // Von Bertalanffy-like growth towards the species length
                let relative = 1.0 - (-3.0 * age_dt as f32 / lifespan_dt as f32).exp();
                let length = sp.length * relative.max(0.05);
                let weight = sp.weight * f64::from(relative.max(0.05)).powi(3);
                let abundance = config.scenario.initial_abundance * rng.gen_range(0.5..1.5);

                let id = domain.next_school_id();
                let school = School::new(id, species, abundance, weight, length, age_dt, Location::Cell(cell))
                    .with_trophic_level(sp.trophic_level);
                domain.add_school(school);
            }
        }
    }
    domain
}

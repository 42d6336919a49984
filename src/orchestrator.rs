//! Mortality process - drives one full step of competing mortality.
//!
//! A step goes `Idle -> AccessibilitySnapshot -> Dispatch -> Done`. The
//! snapshot builds the swarms, refreshes their biomass, applies the egg loss
//! and freezes every predator's accessibility. Dispatch then runs the
//! sub-steps: each one refreshes the fishable biomass and hands every batch
//! of cells to a worker of a persistent thread pool. A sub-step only starts
//! once every batch of the previous one has returned. Once the sub-steps are
//! over, every school gets the starvation rate it will suffer next step and a
//! trophic level from its diet, and schools outside the domain take the
//! outside mortality.
//!
//! A panicking worker fails the whole step. The other batches of the sub-step
//! still run to completion, the error is returned and the process refuses to
//! run again until [`MortalityProcess::reset`].

use crate::accounting::MortalityCause;
use crate::config::Config;
use crate::domain::{CellPopulation, Domain};
use crate::error::{MortalityError, Result};
use crate::fishing::{Fishing, FishingPlan};
use crate::forcing::{ResourceForcing, UniformForcing};
use crate::predation::{Predation, PreyPool, SizeBasedPredation};
use crate::rates::{
    AdditionalMortality, OutsideMortality, SpeciesAdditionalMortality, SpeciesOutsideMortality,
    Starvation, SuccessStarvation,
};
use crate::resolver::{resolve, Collaborators, ResolveSettings};
use crate::scheduler::{batches, split_batches, Batch};
use crate::school::Location;
use crate::swarm::{slot_swarms, Swarm, SwarmTemplate};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Where the process stands within a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AccessibilitySnapshot,
    Dispatch { sub_step: u32 },
    Done,
    Failed,
}

/// Static parameters of a mortality process
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    pub sub_steps: u32,
    pub worker_count: usize,
    pub keep_prey_records: bool,
    /// Master seed of the per-worker random streams
    pub seed: u64,
}

impl ProcessOptions {
    pub fn from_config(config: &Config, seed: u64) -> Self {
        Self {
            sub_steps: config.sub_steps(),
            worker_count: config.worker_count(),
            keep_prey_records: config.mortality.keep_prey_records,
            seed,
        }
    }
}

/// Summary of one completed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: usize,
    pub sub_steps: u32,
    pub worker_count: usize,
    /// Ocean cells handled by each worker
    pub batch_cells: Vec<usize>,
    /// Schools handled by each worker
    pub batch_schools: Vec<usize>,
}

impl StepReport {
    fn new(step: usize, sub_steps: u32, worker_count: usize, layout: &[Batch]) -> Self {
        Self {
            step,
            sub_steps,
            worker_count,
            batch_cells: layout.iter().map(|b| b.len).collect(),
            batch_schools: layout.iter().map(|b| b.schools).collect(),
        }
    }
}

/// Competing mortality for a whole domain
pub struct MortalityProcess {
    // Collaborators
    predation: Box<dyn Predation>,
    additional: Box<dyn AdditionalMortality>,
    fishing: Box<dyn Fishing>,
    forcing: Box<dyn ResourceForcing>,
    starvation: Option<Box<dyn Starvation>>,
    outside: Option<Box<dyn OutsideMortality>>,

    options: ProcessOptions,
    pool: rayon::ThreadPool,
    /// One random stream per worker batch
    rngs: Vec<ChaCha8Rng>,
    phase: Phase,
}

impl MortalityProcess {
    /// Create a process with explicit collaborators
    pub fn new(
        options: ProcessOptions,
        predation: Box<dyn Predation>,
        additional: Box<dyn AdditionalMortality>,
        fishing: Box<dyn Fishing>,
        forcing: Box<dyn ResourceForcing>,
    ) -> Result<Self> {
        if options.sub_steps == 0 {
            return Err(MortalityError::config("mortality.sub_steps must be > 0"));
        }
        let options = ProcessOptions {
            worker_count: options.worker_count.max(1),
            ..options
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.worker_count)
            .thread_name(|i| format!("mortality-{}", i))
            .build()
            .map_err(|e| MortalityError::ThreadPool(e.to_string()))?;

        let rngs = (0..options.worker_count)
            .map(|worker| {
                let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
                rng.set_stream(worker as u64);
                rng
            })
            .collect();

        log::info!(
            "Mortality process: {} workers, {} sub-steps",
            options.worker_count,
            options.sub_steps
        );

        Ok(Self {
            predation,
            additional,
            fishing,
            forcing,
            starvation: None,
            outside: None,
            options,
            pool,
            rngs,
            phase: Phase::Idle,
        })
    }

    /// Refresh every school's starvation rate at the end of each step.
    /// Without it the rates are left as they are.
    pub fn with_starvation(mut self, starvation: Box<dyn Starvation>) -> Self {
        self.starvation = Some(starvation);
        self
    }

    /// Apply an outside mortality to the schools out of the domain at the
    /// end of each step. Without it they are left untouched.
    pub fn with_outside_mortality(mut self, outside: Box<dyn OutsideMortality>) -> Self {
        self.outside = Some(outside);
        self
    }

    /// Create a process with the reference collaborators built from `config`
    pub fn from_config(config: &Config, domain: &Domain, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            ProcessOptions::from_config(config, seed),
            Box::new(SizeBasedPredation::from_config(config)),
            Box::new(SpeciesAdditionalMortality::from_config(config)),
            Box::new(FishingPlan::from_config(config, domain.grid())),
            Box::new(UniformForcing::from_config(&config.resources)),
        )?
        .with_starvation(Box::new(SuccessStarvation::from_config(config)))
        .with_outside_mortality(Box::new(SpeciesOutsideMortality::from_config(config))))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    pub fn worker_count(&self) -> usize {
        self.options.worker_count
    }

    /// Forget a failed step. The schools touched by the failed step are left
    /// as they are.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Apply one full step of mortality to the domain.
    ///
    /// The outer loop is expected to have called [`Domain::begin_step`].
    pub fn run(&mut self, domain: &mut Domain, step: usize) -> Result<StepReport> {
        if self.phase == Phase::Failed {
            return Err(MortalityError::StepFailed { step });
        }

        // Phase 1: Swarms, egg loss and accessibility
        self.phase = Phase::AccessibilitySnapshot;
        self.snapshot(domain, step);

        // Phase 2: Batches, fixed for the whole step
        let layout = batches(&domain.school_counts(), self.options.worker_count);
        let lens: Vec<usize> = layout.iter().map(|b| b.len).collect();
        log::debug!(
            "Step {}: batches {:?} schools {:?}",
            step,
            lens,
            layout.iter().map(|b| b.schools).collect::<Vec<_>>()
        );

        // Phase 3: Sub-steps, one barrier each
        for sub_step in 0..self.options.sub_steps {
            self.phase = Phase::Dispatch { sub_step };
            self.fishing.refresh_fishable_biomass(domain.cells());
            if let Err(e) = self.dispatch(domain, &lens, sub_step) {
                self.phase = Phase::Failed;
                log::error!("Step {} failed: {}", step, e);
                return Err(e);
            }
        }

        // Phase 4: Starvation rates, diet trophic levels, outside mortality
        self.settle(domain);

        self.phase = Phase::Done;
        Ok(StepReport::new(
            step,
            self.options.sub_steps,
            self.options.worker_count,
            &layout,
        ))
    }

    fn snapshot(&mut self, domain: &mut Domain, step: usize) {
        let ocean: Vec<(usize, usize)> = domain
            .cells()
            .iter()
            .enumerate()
            .filter(|(_, population)| !population.is_empty())
            .map(|(slot, population)| (slot, population.cell()))
            .collect();
        let swarms = domain.swarms_mut();
        for (slot, cell) in ocean {
            swarms.swarms_for(slot, cell);
        }
        swarms.refresh_biomass(self.forcing.as_ref(), step);

        let (cells, templates, slots) = domain.parts_mut();
        let predation = self.predation.as_ref();
        let additional = self.additional.as_ref();
        self.pool.install(|| {
            cells
                .par_iter_mut()
                .zip(slots.par_iter_mut())
                .for_each(|(population, slot)| {
                    freeze_cell(population, slot, templates, predation, additional)
                });
        });
    }

    fn dispatch(&mut self, domain: &mut Domain, lens: &[usize], sub_step: u32) -> Result<()> {
        let (cells, templates, slots) = domain.parts_mut();
        let cell_parts = split_batches(cells, lens);
        let slot_parts = split_batches(slots, lens);

        let with = Collaborators {
            predation: self.predation.as_ref(),
            additional: self.additional.as_ref(),
            fishing: self.fishing.as_ref(),
        };
        let settings = ResolveSettings {
            sub_steps: self.options.sub_steps,
            keep_prey_records: self.options.keep_prey_records,
        };
        let rngs = &mut self.rngs;

        let outcomes: Vec<std::thread::Result<()>> = self.pool.install(|| {
            cell_parts
                .into_par_iter()
                .zip(slot_parts)
                .zip(rngs.par_iter_mut())
                .map(|((cells, slots), rng)| {
                    catch_unwind(AssertUnwindSafe(|| {
                        for (population, slot) in cells.iter_mut().zip(slots.iter_mut()) {
                            if population.is_empty() {
                                continue;
                            }
                            let swarms = slot_swarms(slot, templates, population.cell());
                            resolve(population.schools_mut(), swarms, &with, settings, rng);
                        }
                    }))
                })
                .collect()
        });

        for (batch, outcome) in outcomes.into_iter().enumerate() {
            if let Err(payload) = outcome {
                let message = panic_message(payload.as_ref());
                log::error!("Worker {} panicked in sub-step {}: {}", batch, sub_step, message);
                return Err(MortalityError::WorkerPanicked {
                    sub_step,
                    batch,
                    message,
                });
            }
        }
        Ok(())
    }

    fn settle(&self, domain: &mut Domain) {
        let starvation = self.starvation.as_deref();
        let cells = domain.cells_mut();
        self.pool.install(|| {
            cells.par_iter_mut().for_each(|population| {
                for school in population.schools_mut().iter_mut() {
                    if let Some(starvation) = starvation {
                        school.starvation_rate = starvation.rate(school);
                    }
                    school.update_trophic_level();
                }
            });
        });

        if let Some(outside) = self.outside.as_deref() {
            for school in domain
                .elsewhere_mut()
                .iter_mut()
                .filter(|s| s.location == Location::OutOfDomain)
            {
                let lost = school.instantaneous_abundance() * (1.0 - (-outside.rate(school)).exp());
                school.record_death(MortalityCause::OutOfDomain, lost);
            }
        }
    }
}

/// Egg loss and accessibility of every school of one cell
fn freeze_cell(
    population: &mut CellPopulation,
    slot: &mut Option<Vec<Swarm>>,
    templates: &[SwarmTemplate],
    predation: &dyn Predation,
    additional: &dyn AdditionalMortality,
) {
    if population.is_empty() {
        return;
    }
    let cell = population.cell();
    let schools = population.schools_mut();

    for school in schools.iter_mut().filter(|s| s.is_egg()) {
        let rate = additional.rate(school);
        let lost = school.instantaneous_abundance() * (1.0 - (-rate).exp());
        school.record_death(MortalityCause::Additional, lost);
        school.accounting_mut().retain_eggs();
    }

    let swarms = slot_swarms(slot, templates, cell);
    let accessibility: Vec<Vec<f64>> = {
        let pool = PreyPool::new(schools, swarms);
        (0..schools.len())
            .map(|predator| predation.accessibility(&pool, predator))
            .collect()
    };
    for (school, access) in schools.iter_mut().zip(accessibility) {
        school.set_accessibility(access);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fishing::FishingKind;
    use crate::grid::Grid;
    use crate::school::{Location, School};

    struct NoPredation;

    impl Predation for NoPredation {
        fn accessibility(&self, pool: &PreyPool<'_>, _: usize) -> Vec<f64> {
            vec![0.5; pool.len()]
        }

        fn consume(&self, pool: &PreyPool<'_>, _: usize, _: &[f64], _: u32) -> Vec<f64> {
            vec![0.0; pool.len()]
        }
    }

    struct Rate(f64);

    impl AdditionalMortality for Rate {
        fn rate(&self, _: &School) -> f64 {
            self.0
        }
    }

    struct NoFishing;

    impl Fishing for NoFishing {
        fn kind(&self, _: usize) -> FishingKind {
            FishingKind::Rate
        }

        fn rate(&self, _: &School) -> f64 {
            0.0
        }

        fn catches(&self, _: &School) -> f64 {
            0.0
        }

        fn refresh_fishable_biomass(&mut self, _: &[CellPopulation]) {}
    }

    fn process(sub_steps: u32, workers: usize, rate: f64) -> MortalityProcess {
        let options = ProcessOptions {
            sub_steps,
            worker_count: workers,
            keep_prey_records: false,
            seed: 7,
        };
        let mut forcing = UniformForcing::new();
        forcing.add_group(12.0, vec![0.5]);
        MortalityProcess::new(
            options,
            Box::new(NoPredation),
            Box::new(Rate(rate)),
            Box::new(NoFishing),
            Box::new(forcing),
        )
        .unwrap()
    }

    fn domain() -> Domain {
        let templates = vec![SwarmTemplate {
            group: 0,
            species: 1,
            trophic_level: 1.0,
        }];
        let mut domain = Domain::new(Grid::new(3, 2), templates);
        for cell in [0, 0, 1, 4, 4, 4] {
            let id = domain.next_school_id();
            domain.add_school(School::new(id, 0, 100.0, 1.0, 10.0, 2, Location::Cell(cell)));
        }
        domain
    }

    #[test]
    fn test_rejects_zero_sub_steps() {
        let options = ProcessOptions {
            sub_steps: 0,
            worker_count: 1,
            keep_prey_records: false,
            seed: 0,
        };
        let result = MortalityProcess::new(
            options,
            Box::new(NoPredation),
            Box::new(Rate(0.0)),
            Box::new(NoFishing),
            Box::new(UniformForcing::new()),
        );
        assert!(matches!(result, Err(MortalityError::Config(_))));
    }

    #[test]
    fn test_step_report_layout() {
        let mut process = process(4, 2, 0.0);
        let mut domain = domain();
        domain.begin_step();

        let report = process.run(&mut domain, 0).unwrap();

        assert_eq!(process.phase(), Phase::Done);
        assert_eq!(report.sub_steps, 4);
        assert_eq!(report.worker_count, 2);
        assert_eq!(report.batch_cells.iter().sum::<usize>(), 6);
        assert_eq!(report.batch_schools.iter().sum::<usize>(), 6);
    }

    #[test]
    fn test_snapshot_builds_swarms_and_accessibility() {
        let mut process = process(1, 1, 0.0);
        let mut domain = domain();
        domain.begin_step();

        process.run(&mut domain, 0).unwrap();

        // Only cells holding schools get swarms
        assert!(domain.swarms().is_cached(0));
        assert!(!domain.swarms().is_cached(2));
        assert_eq!(domain.swarms().iter().count(), 3);
        assert!(domain.swarms().iter().all(|s| s.biomass() == 6.0));
        // Two schools and one swarm in the first cell
        assert_eq!(domain.cells()[0].schools()[0].accessibility().len(), 3);
    }

    #[test]
    fn test_whole_step_rate() {
        let mut process = process(10, 3, 0.5);
        let mut domain = domain();
        domain.begin_step();

        process.run(&mut domain, 0).unwrap();

        let expected = 100.0 * (-0.5f64).exp();
        for school in domain.schools() {
            assert!((school.instantaneous_abundance() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_egg_loss_then_release() {
        let mut process = process(5, 1, 0.2);
        let mut domain = domain();
        let id = domain.next_school_id();
        domain.add_school(School::new(id, 0, 1000.0, 0.01, 0.2, 0, Location::Cell(2)));
        domain.begin_step();

        process.run(&mut domain, 0).unwrap();

        let egg = domain.schools().find(|s| s.id == id).unwrap();
        let survivors = 1000.0 * (-0.2f64).exp();
        assert!((egg.instantaneous_abundance() - survivors).abs() < 1e-9);
        assert!(egg.accounting().egg_retained() < 1e-9);
    }

    #[test]
    fn test_outside_mortality_applied_after_sub_steps() {
        struct Outside(f64);

        impl OutsideMortality for Outside {
            fn rate(&self, _: &School) -> f64 {
                self.0
            }
        }

        let mut process = process(10, 2, 0.5).with_outside_mortality(Box::new(Outside(0.5)));
        let mut domain = domain();
        let away = domain.next_school_id();
        domain.add_school(School::new(away, 0, 100.0, 1.0, 10.0, 2, Location::OutOfDomain));
        let off_grid = domain.next_school_id();
        domain.add_school(School::new(off_grid, 0, 100.0, 1.0, 10.0, 2, Location::OffGrid));
        domain.begin_step();

        process.run(&mut domain, 0).unwrap();

        let expected = 100.0 * (-0.5f64).exp();
        let away = domain.schools().find(|s| s.id == away).unwrap();
        assert!((away.instantaneous_abundance() - expected).abs() < 1e-9);
        assert!((away.accounting().dead(MortalityCause::OutOfDomain) - (100.0 - expected)).abs() < 1e-9);
        assert_eq!(away.accounting().dead(MortalityCause::Additional), 0.0);

        // Off-grid schools take no mortality at all
        let off_grid = domain.schools().find(|s| s.id == off_grid).unwrap();
        assert_eq!(off_grid.instantaneous_abundance(), 100.0);

        // In-cell schools never take the outside cause
        for population in domain.cells() {
            for school in population.schools() {
                assert_eq!(school.accounting().dead(MortalityCause::OutOfDomain), 0.0);
            }
        }
    }

    #[test]
    fn test_starvation_rate_refreshed_after_step() {
        // 2.4 per year over 24 steps, nothing eaten
        let starvation = SuccessStarvation::new(vec![2.4], vec![0.5], 24);
        let mut process = process(2, 2, 0.0).with_starvation(Box::new(starvation));
        let mut domain = domain();
        let egg = domain.next_school_id();
        domain.add_school(School::new(egg, 0, 1000.0, 0.01, 0.2, 0, Location::Cell(2)));
        domain.begin_step();

        process.run(&mut domain, 0).unwrap();

        for school in domain.schools() {
            let expected = if school.id == egg { 0.0 } else { 0.1 };
            assert!((school.starvation_rate - expected).abs() < 1e-12);
            // The refreshed rate only applies from the next step
            assert_eq!(school.accounting().dead(MortalityCause::Starvation), 0.0);
        }

        domain.begin_step();
        process.run(&mut domain, 1).unwrap();

        let school = domain.cells()[0].schools()[0].clone();
        let expected = school.accounting().abundance() * (1.0 - (-0.1f64).exp());
        assert!((school.accounting().dead(MortalityCause::Starvation) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_without_starvation_rates_are_kept() {
        let mut process = process(1, 1, 0.0);
        let mut domain = domain();
        for school in domain.schools_mut() {
            school.starvation_rate = 0.3;
        }
        domain.begin_step();

        process.run(&mut domain, 0).unwrap();

        assert!(domain.schools().all(|s| s.starvation_rate == 0.3));
        // Nothing eaten, trophic levels unchanged
        assert!(domain.schools().all(|s| s.trophic_level == 3.0));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(3u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}

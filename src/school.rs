//! School structure: a cohort of identical individuals tracked as one unit.

use crate::accounting::{Accounting, MortalityCause};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique school identifier
pub type SchoolId = u64;

/// Where a school sits at the time of the mortality snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// Index of a grid cell
    Cell(usize),
    /// Inside the domain but not attached to any cell
    OffGrid,
    /// Migrated out of the simulated domain for this step
    OutOfDomain,
}

/// Identity of a prey item as seen by a predator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreyInfo {
    pub species: usize,
    pub trophic_level: f32,
    /// Age in steps, `None` for resource swarms
    pub age_dt: Option<u32>,
    /// Length, `None` for resource swarms
    pub length: Option<f32>,
}

/// Biomass eaten from one kind of prey during the step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreyRecord {
    pub prey: PreyInfo,
    pub biomass: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PreyKey {
    species: usize,
    trophic_level: u32,
    age_dt: Option<u32>,
    length: Option<u32>,
}

impl From<&PreyInfo> for PreyKey {
    fn from(info: &PreyInfo) -> Self {
        Self {
            species: info.species,
            trophic_level: info.trophic_level.to_bits(),
            age_dt: info.age_dt,
            length: info.length.map(f32::to_bits),
        }
    }
}

/// A school in the simulation
#[derive(Debug, Clone)]
pub struct School {
    // Identity
    pub id: SchoolId,
    pub species: usize,

    // Physical state
    pub age_dt: u32,
    pub length: f32,
    pub trophic_level: f32,
    pub location: Location,

    /// Starvation hazard for the whole step, refreshed at the end of the
    /// previous step from its predation success
    pub starvation_rate: f64,

    // Predation state, frozen for the step
    accessibility: Vec<f64>,
    pred_success_rate: f32,
    preyed_biomass: f64,
    /// Sum of prey trophic level times biomass eaten
    diet_trophic: f64,
    prey_records: HashMap<PreyKey, PreyRecord>,

    accounting: Accounting,
}

impl School {
    /// Create a new school of `abundance` individuals of `weight` each
    pub fn new(
        id: SchoolId,
        species: usize,
        abundance: f64,
        weight: f64,
        length: f32,
        age_dt: u32,
        location: Location,
    ) -> Self {
        Self {
            id,
            species,
            age_dt,
            length,
            trophic_level: 3.0,
            location,
            starvation_rate: 0.0,
            accessibility: Vec::new(),
            pred_success_rate: 0.0,
            preyed_biomass: 0.0,
            diet_trophic: 0.0,
            prey_records: HashMap::new(),
            accounting: Accounting::new(abundance, weight),
        }
    }

    pub fn with_trophic_level(mut self, trophic_level: f32) -> Self {
        self.trophic_level = trophic_level;
        self
    }

    /// Reset per-step state. Called by the outer loop before mortality.
    pub fn begin_step(&mut self) {
        self.accounting.begin_step();
        self.prey_records.clear();
        self.preyed_biomass = 0.0;
        self.diet_trophic = 0.0;
        self.pred_success_rate = 0.0;
    }

    #[inline]
    pub fn accounting(&self) -> &Accounting {
        &self.accounting
    }

    #[inline]
    pub fn accounting_mut(&mut self) -> &mut Accounting {
        &mut self.accounting
    }

    #[inline]
    pub fn instantaneous_abundance(&self) -> f64 {
        self.accounting.instantaneous_abundance()
    }

    #[inline]
    pub fn instantaneous_biomass(&self) -> f64 {
        self.accounting.instantaneous_biomass()
    }

    #[inline]
    pub fn record_death(&mut self, cause: MortalityCause, amount: f64) {
        self.accounting.record_death(cause, amount);
    }

    #[inline]
    pub fn biomass_to_abundance(&self, biomass: f64) -> f64 {
        self.accounting.biomass_to_abundance(biomass)
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.accounting.weight()
    }

    /// Eggs are schools spawned at the start of this step
    #[inline]
    pub fn is_egg(&self) -> bool {
        self.age_dt == 0
    }

    /// A school lives while it has individuals left and is younger than
    /// the species lifespan.
    pub fn is_alive(&self, lifespan_dt: u32) -> bool {
        self.instantaneous_abundance() > 0.0 && self.age_dt < lifespan_dt
    }

    pub fn age_years(&self, steps_per_year: u32) -> f32 {
        self.age_dt as f32 / steps_per_year.max(1) as f32
    }

    pub fn increment_age(&mut self) {
        self.age_dt += 1;
    }

    pub fn cell(&self) -> Option<usize> {
        match self.location {
            Location::Cell(index) => Some(index),
            Location::OffGrid | Location::OutOfDomain => None,
        }
    }

    pub fn move_to(&mut self, cell: usize) {
        self.location = Location::Cell(cell);
    }

    pub fn prey_info(&self) -> PreyInfo {
        PreyInfo {
            species: self.species,
            trophic_level: self.trophic_level,
            age_dt: Some(self.age_dt),
            length: Some(self.length),
        }
    }

    pub fn set_accessibility(&mut self, accessibility: Vec<f64>) {
        self.accessibility = accessibility;
    }

    /// Accessibility of every prey item of the cell, frozen for the step
    pub fn accessibility(&self) -> &[f64] {
        &self.accessibility
    }

    /// Record `biomass` eaten from `prey`. Itemized records are only kept
    /// when `keep_record` is set and are merged by prey identity.
    pub fn record_consumption(&mut self, prey: PreyInfo, biomass: f64, keep_record: bool) {
        if keep_record {
            self.prey_records
                .entry(PreyKey::from(&prey))
                .and_modify(|record| record.biomass += biomass)
                .or_insert(PreyRecord { prey, biomass });
        }
        self.preyed_biomass += biomass;
        self.diet_trophic += f64::from(prey.trophic_level) * biomass;
    }

    /// Set the trophic level one above the biomass-weighted mean of the
    /// step's diet. Unchanged when nothing was eaten.
    pub fn update_trophic_level(&mut self) {
        if self.preyed_biomass > 0.0 {
            self.trophic_level = (self.diet_trophic / self.preyed_biomass + 1.0) as f32;
        }
    }

    /// Total biomass eaten during the step
    pub fn preyed_biomass(&self) -> f64 {
        self.preyed_biomass
    }

    pub fn prey_records(&self) -> impl Iterator<Item = &PreyRecord> {
        self.prey_records.values()
    }

    pub fn pred_success_rate(&self) -> f32 {
        self.pred_success_rate
    }

    pub fn increment_pred_success_rate(&mut self, delta: f32) {
        self.pred_success_rate += delta;
    }
}

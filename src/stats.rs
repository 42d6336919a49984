//! Statistics tracking for the mortality step.

use crate::accounting::{DeathCounts, MortalityCause};
use crate::domain::Domain;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Statistics snapshot taken after a mortality step
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MortalityStats {
    /// Simulation step
    pub step: usize,
    /// Schools in the domain
    pub schools: usize,
    /// Instantaneous biomass per species
    pub biomass: Vec<f64>,
    /// Dead individuals per species, by cause
    pub deaths: Vec<DeathCounts>,
    /// Biomass eaten from each resource group
    pub resource_predated: Vec<f64>,
    /// Mean predation success rate of the schools that predate
    pub pred_success_mean: f32,
    /// Schools removed after the step
    pub removed: usize,
    /// Steps per second (performance)
    pub steps_per_second: f32,
}

impl MortalityStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats from the domain, before dead schools are removed
    pub fn update(&mut self, domain: &Domain, step: usize, n_species: usize) {
        self.step = step;
        self.schools = domain.n_schools();
        self.biomass = domain.biomass_by_species(n_species);

        self.deaths = vec![DeathCounts::default(); n_species];
        let mut success_sum = 0.0f32;
        let mut predators = 0usize;
        for school in domain.schools() {
            if let Some(deaths) = self.deaths.get_mut(school.species) {
                for (cause, dead) in school.accounting().deaths().iter() {
                    deaths.add(cause, dead);
                }
            }
            if !school.is_egg() {
                success_sum += school.pred_success_rate();
                predators += 1;
            }
        }
        self.pred_success_mean = if predators > 0 {
            success_sum / predators as f32
        } else {
            0.0
        };

        self.resource_predated = vec![0.0; domain.swarms().templates().len()];
        for swarm in domain.swarms().iter() {
            if let Some(total) = self.resource_predated.get_mut(swarm.group()) {
                *total += swarm.predated();
            }
        }
    }

    /// Dead individuals of every species for one cause
    pub fn total_deaths(&self, cause: MortalityCause) -> f64 {
        self.deaths.iter().map(|d| d.get(cause)).sum()
    }

    /// Save stats to JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "T:{:6} | Schools:{:6} | Biomass:{:.1} | Pred:{:.3e} | Starv:{:.3e} | Add:{:.3e} | Fish:{:.3e} | Out:{:.3e} | Success:{:.2}",
            self.step,
            self.schools,
            self.biomass.iter().sum::<f64>(),
            self.total_deaths(MortalityCause::Predation),
            self.total_deaths(MortalityCause::Starvation),
            self.total_deaths(MortalityCause::Additional),
            self.total_deaths(MortalityCause::Fishing),
            self.total_deaths(MortalityCause::OutOfDomain),
            self.pred_success_mean,
        )
    }
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    /// All recorded stats snapshots
    pub snapshots: Vec<MortalityStats>,
    /// Recording interval
    pub interval: u64,
}

impl StatsHistory {
    /// Create new history with recording interval
    pub fn new(interval: u64) -> Self {
        Self {
            snapshots: Vec::new(),
            interval,
        }
    }

    pub fn record(&mut self, stats: MortalityStats) {
        self.snapshots.push(stats);
    }

    /// Total biomass over time
    pub fn biomass_series(&self) -> Vec<(usize, f64)> {
        self.snapshots
            .iter()
            .map(|s| (s.step, s.biomass.iter().sum()))
            .collect()
    }

    /// Deaths from one cause over time
    pub fn deaths_series(&self, cause: MortalityCause) -> Vec<(usize, f64)> {
        self.snapshots
            .iter()
            .map(|s| (s.step, s.total_deaths(cause)))
            .collect()
    }

    /// Save history to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load history from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

//! Fishing mortality: rate-based or catch-based, per species.

use crate::config::Config;
use crate::domain::CellPopulation;
use crate::grid::Grid;
use crate::school::School;
use serde::{Deserialize, Serialize};

/// How fishing mortality of a species is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FishingKind {
    /// Instantaneous fishing mortality rate
    Rate,
    /// Absolute biomass landed
    Catches,
}

/// Fishing collaborator consumed by the resolver
pub trait Fishing: Send + Sync {
    fn kind(&self, species: usize) -> FishingKind;

    /// Fishing mortality rate of the school over a full step
    fn rate(&self, school: &School) -> f64;

    /// Biomass caught from the school over a full step
    fn catches(&self, school: &School) -> f64;

    /// Recompute whatever depends on the current biomass. Called once per
    /// sub-step, between barrier phases.
    fn refresh_fishable_biomass(&mut self, cells: &[CellPopulation]);
}

#[derive(Debug, Clone)]
struct SpeciesPlan {
    kind: FishingKind,
    /// Annual rate or annual catches
    value: f64,
    recruitment_age_dt: u32,
}

/// Fishing plan read from the configuration.
///
/// Annual rates and catches are spread evenly over the steps of the year.
/// Catches are shared between the schools of a species in proportion to
/// their fishable biomass. Schools in protected cells are never fished; the
/// rate elsewhere is raised by `n_ocean / (n_ocean - n_protected)` so the
/// domain-wide effort stays the same.
#[derive(Debug, Clone)]
pub struct FishingPlan {
    species: Vec<SpeciesPlan>,
    steps_per_year: u32,
    protected: Vec<bool>,
    open_area_factor: f64,
    fishable_biomass: Vec<f64>,
}

impl FishingPlan {
    pub fn from_config(config: &Config, grid: &Grid) -> Self {
        let steps_per_year = config.time.steps_per_year.max(1);
        let species = config
            .species
            .iter()
            .map(|sp| SpeciesPlan {
                kind: sp.fishing.kind,
                value: sp.fishing.value,
                recruitment_age_dt: (sp.fishing.recruitment_age_years * steps_per_year as f32)
                    .round() as u32,
            })
            .collect();

        let mut protected = vec![false; grid.n_cells()];
        for &cell in &config.fishing.protected_cells {
            if let Some(flag) = protected.get_mut(cell) {
                *flag = true;
            }
        }
        let n_ocean = grid.n_ocean();
        let n_protected = grid
            .ocean_cells()
            .iter()
            .filter(|&&cell| protected[cell])
            .count();
        let open_area_factor = if n_protected < n_ocean {
            n_ocean as f64 / (n_ocean - n_protected) as f64
        } else {
            0.0
        };

        Self {
            fishable_biomass: vec![0.0; config.species.len()],
            species,
            steps_per_year,
            protected,
            open_area_factor,
        }
    }

    /// Whether a school can be fished at all this step
    pub fn is_fishable(&self, school: &School) -> bool {
        let Some(plan) = self.species.get(school.species) else {
            return false;
        };
        match school.cell() {
            Some(cell) => {
                school.age_dt >= plan.recruitment_age_dt
                    && !self.protected.get(cell).copied().unwrap_or(false)
            }
            None => false,
        }
    }

    /// Fishable biomass of a species at the last refresh
    pub fn fishable_biomass(&self, species: usize) -> f64 {
        self.fishable_biomass.get(species).copied().unwrap_or(0.0)
    }

    pub fn open_area_factor(&self) -> f64 {
        self.open_area_factor
    }
}

impl Fishing for FishingPlan {
    fn kind(&self, species: usize) -> FishingKind {
        self.species
            .get(species)
            .map_or(FishingKind::Rate, |plan| plan.kind)
    }

    fn rate(&self, school: &School) -> f64 {
        if !self.is_fishable(school) {
            return 0.0;
        }
        let annual = self.species[school.species].value;
        annual / self.steps_per_year as f64 * self.open_area_factor
    }

    fn catches(&self, school: &School) -> f64 {
        if !self.is_fishable(school) {
            return 0.0;
        }
        let total = self.fishable_biomass(school.species);
        if total <= 0.0 {
            return 0.0;
        }
        let annual = self.species[school.species].value;
        annual / self.steps_per_year as f64 * school.instantaneous_biomass() / total
    }

    fn refresh_fishable_biomass(&mut self, cells: &[CellPopulation]) {
        let mut totals = vec![0.0; self.species.len()];
        for school in cells.iter().flat_map(|c| c.schools()) {
            if self.is_fishable(school) {
                totals[school.species] += school.instantaneous_biomass();
            }
        }
        self.fishable_biomass = totals;
    }
}

//! Predation: the prey pool of a cell and the predation collaborator.
//!
//! Prey items of a cell are numbered schools first, then swarms. Accessibility
//! vectors and removal vectors use that numbering.

use crate::config::{Config, DEFAULT_ACCESSIBILITY};
use crate::school::{PreyInfo, School};
use crate::swarm::Swarm;

/// Index of a prey item in a [`PreyPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreyId {
    School(usize),
    Swarm(usize),
}

/// Read-only view of every prey item of one cell
#[derive(Debug, Clone, Copy)]
pub struct PreyPool<'a> {
    pub schools: &'a [School],
    pub swarms: &'a [Swarm],
}

impl<'a> PreyPool<'a> {
    pub fn new(schools: &'a [School], swarms: &'a [Swarm]) -> Self {
        Self { schools, swarms }
    }

    pub fn len(&self) -> usize {
        self.schools.len() + self.swarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map a position in the pool to the prey it designates
    pub fn id(&self, index: usize) -> Option<PreyId> {
        if index < self.schools.len() {
            Some(PreyId::School(index))
        } else if index < self.len() {
            Some(PreyId::Swarm(index - self.schools.len()))
        } else {
            None
        }
    }

    pub fn info(&self, id: PreyId) -> PreyInfo {
        match id {
            PreyId::School(i) => self.schools[i].prey_info(),
            PreyId::Swarm(j) => self.swarms[j].prey_info(),
        }
    }

    /// Biomass currently available from a prey item
    pub fn biomass(&self, id: PreyId) -> f64 {
        match id {
            PreyId::School(i) => self.schools[i].instantaneous_biomass(),
            PreyId::Swarm(j) => self.swarms[j].instantaneous_biomass(),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = PreyId> + '_ {
        (0..self.len()).filter_map(move |index| self.id(index))
    }
}

/// Predation collaborator consumed by the resolver.
///
/// `predator` is the index of the predating school in `pool.schools`.
pub trait Predation: Send + Sync {
    /// Accessibility of every prey item of the pool to the predator.
    /// Computed once per step.
    fn accessibility(&self, pool: &PreyPool<'_>, predator: usize) -> Vec<f64>;

    /// Biomass removed from every prey item during one sub-step
    fn consume(
        &self,
        pool: &PreyPool<'_>,
        predator: usize,
        accessibility: &[f64],
        sub_steps: u32,
    ) -> Vec<f64>;

    /// Largest biomass the predator could eat during one sub-step, used for
    /// the predation success rate. Zero disables the success rate.
    fn max_ingestion(&self, _predator: &School, _sub_steps: u32) -> f64 {
        0.0
    }
}

#[derive(Debug, Clone)]
struct PredatorTraits {
    min_prey_ratio: f32,
    max_prey_ratio: f32,
    max_ingestion_rate: f64,
    accessibility: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
struct ResourceSize {
    min: f32,
    max: f32,
}

/// Size-based opportunistic predation.
///
/// A predator of length `L` eats fish of length in
/// `[L * min_prey_ratio, L * max_prey_ratio)` and the share of a resource
/// group whose size range overlaps that window, weighted by its species
/// accessibility to each prey. Eggs do not predate and a school never eats
/// itself.
#[derive(Debug, Clone)]
pub struct SizeBasedPredation {
    predators: Vec<PredatorTraits>,
    resources: Vec<ResourceSize>,
    steps_per_year: u32,
}

impl SizeBasedPredation {
    pub fn from_config(config: &Config) -> Self {
        let predators = config
            .species
            .iter()
            .map(|sp| PredatorTraits {
                min_prey_ratio: sp.min_prey_ratio,
                max_prey_ratio: sp.max_prey_ratio,
                max_ingestion_rate: sp.max_ingestion_rate,
                accessibility: sp.accessibility.clone(),
            })
            .collect();
        let resources = config
            .resources
            .iter()
            .map(|rsc| ResourceSize {
                min: rsc.size_min,
                max: rsc.size_max,
            })
            .collect();
        Self {
            predators,
            resources,
            steps_per_year: config.time.steps_per_year.max(1),
        }
    }

    fn matrix(&self, predator: &PredatorTraits, prey_species: usize) -> f64 {
        predator
            .accessibility
            .get(prey_species)
            .copied()
            .unwrap_or(DEFAULT_ACCESSIBILITY)
    }

    /// Fraction of a resource size range inside `[low, high)`
    fn resource_overlap(&self, group: usize, low: f32, high: f32) -> f64 {
        let Some(size) = self.resources.get(group) else {
            return 0.0;
        };
        let width = size.max - size.min;
        if !(width > 0.0) {
            return 0.0;
        }
        let overlap = size.max.min(high) - size.min.max(low);
        (overlap / width).clamp(0.0, 1.0) as f64
    }
}

impl Predation for SizeBasedPredation {
    fn accessibility(&self, pool: &PreyPool<'_>, predator: usize) -> Vec<f64> {
        let mut access = vec![0.0; pool.len()];
        let pred = &pool.schools[predator];
        let Some(traits) = self.predators.get(pred.species) else {
            return access;
        };
        if pred.is_egg() {
            return access;
        }
        let low = pred.length * traits.min_prey_ratio;
        let high = pred.length * traits.max_prey_ratio;
        let n_species = self.predators.len();

        for (index, id) in pool.ids().enumerate() {
            access[index] = match id {
                PreyId::School(i) if i == predator => 0.0,
                PreyId::School(i) => {
                    let prey = &pool.schools[i];
                    if prey.length >= low && prey.length < high {
                        self.matrix(traits, prey.species)
                    } else {
                        0.0
                    }
                }
                PreyId::Swarm(j) => {
                    let species = pool.swarms[j].prey_info().species;
                    let group = species.saturating_sub(n_species);
                    self.matrix(traits, species) * self.resource_overlap(group, low, high)
                }
            };
        }
        access
    }

    fn consume(
        &self,
        pool: &PreyPool<'_>,
        predator: usize,
        accessibility: &[f64],
        sub_steps: u32,
    ) -> Vec<f64> {
        let mut removed = vec![0.0; pool.len()];
        let pred = &pool.schools[predator];
        if pred.is_egg() {
            return removed;
        }

        let mut accessible = 0.0;
        for (index, id) in pool.ids().enumerate() {
            let share = accessibility.get(index).copied().unwrap_or(0.0);
            removed[index] = share * pool.biomass(id);
            accessible += removed[index];
        }
        if accessible <= 0.0 {
            return vec![0.0; pool.len()];
        }

        let eaten = self.max_ingestion(pred, sub_steps).min(accessible);
        for value in &mut removed {
            *value *= eaten / accessible;
        }
        removed
    }

    fn max_ingestion(&self, predator: &School, sub_steps: u32) -> f64 {
        self.predators.get(predator.species).map_or(0.0, |traits| {
            traits.max_ingestion_rate / self.steps_per_year as f64
                * predator.instantaneous_biomass()
                / f64::from(sub_steps.max(1))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::school::Location;
    use crate::swarm::SwarmTemplate;

    fn predation() -> SizeBasedPredation {
        let mut config = Config::default();
        config.time.steps_per_year = 1;
        config.species.truncate(2);
        config.species[0].min_prey_ratio = 0.1;
        config.species[0].max_prey_ratio = 0.5;
        config.species[0].max_ingestion_rate = 2.0;
        config.species[0].accessibility = vec![1.0, 0.5, 1.0, 0.0];
        config.resources[0].size_min = 0.0;
        config.resources[0].size_max = 4.0;
        SizeBasedPredation::from_config(&config)
    }

    fn schools() -> Vec<School> {
        vec![
            // Predator, length 10: eats [1, 5)
            School::new(0, 0, 10.0, 1.0, 10.0, 3, Location::Cell(0)),
            School::new(1, 1, 4.0, 2.0, 3.0, 3, Location::Cell(0)),
            School::new(2, 0, 100.0, 1.0, 6.0, 3, Location::Cell(0)),
        ]
    }

    fn swarms() -> Vec<Swarm> {
        let template = SwarmTemplate {
            group: 0,
            species: 2,
            trophic_level: 1.0,
        };
        let mut swarm = Swarm::new(&template, 0);
        swarm.set_biomass(16.0);
        vec![swarm]
    }

    #[test]
    fn test_size_window_and_self() {
        let schools = schools();
        let swarms = swarms();
        let pool = PreyPool::new(&schools, &swarms);

        let access = predation().accessibility(&pool, 0);

        assert_eq!(access.len(), 4);
        assert_eq!(access[0], 0.0);
        assert_eq!(access[1], 0.5);
        // Too large
        assert_eq!(access[2], 0.0);
        // Resource sizes [0, 4) overlap [1, 5) on three quarters
        assert!((access[3] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_consumption_capped_by_ingestion() {
        let schools = schools();
        let swarms = swarms();
        let pool = PreyPool::new(&schools, &swarms);
        let pred = predation();
        let access = pred.accessibility(&pool, 0);

        let removed = pred.consume(&pool, 0, &access, 2);

        // Accessible: 0.5 * 8 + 0.75 * 16 = 16; max ingestion 2 * 10 / 2 = 10
        let total: f64 = removed.iter().sum();
        assert!((total - 10.0).abs() < 1e-9);
        assert!((removed[1] - 2.5).abs() < 1e-9);
        assert!((removed[3] - 7.5).abs() < 1e-9);
        assert_eq!(removed[2], 0.0);
    }

    #[test]
    fn test_eggs_do_not_predate() {
        let mut schools = schools();
        schools[0].age_dt = 0;
        let swarms = swarms();
        let pool = PreyPool::new(&schools, &swarms);
        let pred = predation();

        assert!(pred.accessibility(&pool, 0).iter().all(|&a| a == 0.0));
        assert!(pred.consume(&pool, 0, &[1.0; 4], 1).iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_empty_accessible_biomass() {
        let schools = schools();
        let pool = PreyPool::new(&schools, &[]);
        let removed = predation().consume(&pool, 0, &[0.0; 3], 1);
        assert_eq!(removed, vec![0.0; 3]);
    }

    #[test]
    fn test_pool_ids() {
        let schools = schools();
        let swarms = swarms();
        let pool = PreyPool::new(&schools, &swarms);

        assert_eq!(pool.id(2), Some(PreyId::School(2)));
        assert_eq!(pool.id(3), Some(PreyId::Swarm(0)));
        assert_eq!(pool.id(4), None);
        assert_eq!(pool.biomass(PreyId::Swarm(0)), 16.0);
    }
}

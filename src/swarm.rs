//! Low-trophic-level resource swarms.
//!
//! A swarm is the pseudo-prey made of one resource group inside one cell. It
//! is not owned by any school; its biomass is overwritten every step from the
//! forcing and predation removals are tracked until the next refresh.

use crate::forcing::ResourceForcing;
use crate::school::PreyInfo;

/// Static description of a resource group, shared by all its swarms
#[derive(Debug, Clone, PartialEq)]
pub struct SwarmTemplate {
    /// Index of the resource group
    pub group: usize,
    /// Prey index of the group, numbered after the fish species
    pub species: usize,
    pub trophic_level: f32,
}

/// Resource biomass of one group in one cell
#[derive(Debug, Clone, PartialEq)]
pub struct Swarm {
    group: usize,
    species: usize,
    trophic_level: f32,
    cell: usize,
    biomass: f64,
    predated: f64,
}

impl Swarm {
    pub fn new(template: &SwarmTemplate, cell: usize) -> Self {
        Self {
            group: template.group,
            species: template.species,
            trophic_level: template.trophic_level,
            cell,
            biomass: 0.0,
            predated: 0.0,
        }
    }

    /// Overwrite the biomass and forget previous removals.
    pub fn set_biomass(&mut self, biomass: f64) {
        self.biomass = biomass.max(0.0);
        self.predated = 0.0;
    }

    /// Biomass at the last refresh
    pub fn biomass(&self) -> f64 {
        self.biomass
    }

    /// Biomass left after this step's predation
    pub fn instantaneous_biomass(&self) -> f64 {
        (self.biomass - self.predated).max(0.0)
    }

    /// Swarms only die from predation, and biomass counts as abundance.
    pub fn record_predation(&mut self, biomass: f64) {
        if biomass > 0.0 {
            self.predated += biomass;
        }
    }

    pub fn predated(&self) -> f64 {
        self.predated
    }

    pub fn group(&self) -> usize {
        self.group
    }

    pub fn cell(&self) -> usize {
        self.cell
    }

    pub fn prey_info(&self) -> PreyInfo {
        PreyInfo {
            species: self.species,
            trophic_level: self.trophic_level,
            age_dt: None,
            length: None,
        }
    }
}

/// Lazily built swarms, one slot per ocean cell.
#[derive(Debug, Clone, Default)]
pub struct SwarmCache {
    templates: Vec<SwarmTemplate>,
    slots: Vec<Option<Vec<Swarm>>>,
}

impl SwarmCache {
    /// Create an empty cache for `n_slots` ocean cells
    pub fn new(templates: Vec<SwarmTemplate>, n_slots: usize) -> Self {
        Self {
            templates,
            slots: vec![None; n_slots],
        }
    }

    /// Swarms of ocean cell `slot` (grid cell `cell`), built on first access.
    pub fn swarms_for(&mut self, slot: usize, cell: usize) -> &mut Vec<Swarm> {
        if slot >= self.slots.len() {
            self.slots.resize(slot + 1, None);
        }
        slot_swarms(&mut self.slots[slot], &self.templates, cell)
    }

    /// Whether the swarms of `slot` have been built
    pub fn is_cached(&self, slot: usize) -> bool {
        self.slots.get(slot).map_or(false, Option::is_some)
    }

    /// Set every cached swarm's biomass to the forcing biomass scaled by the
    /// group's accessibility coefficient for `step`.
    pub fn refresh_biomass(&mut self, forcing: &dyn ResourceForcing, step: usize) {
        for swarm in self.slots.iter_mut().flatten().flatten() {
            let coefficient = forcing.accessibility_coefficient(swarm.group, step);
            let biomass = forcing.biomass(swarm.group, swarm.cell, step);
            swarm.set_biomass(coefficient * biomass);
        }
    }

    /// Split borrow used to hand disjoint slot ranges to workers
    pub fn parts_mut(&mut self) -> (&[SwarmTemplate], &mut [Option<Vec<Swarm>>]) {
        (&self.templates, &mut self.slots)
    }

    pub fn templates(&self) -> &[SwarmTemplate] {
        &self.templates
    }

    /// Every swarm built so far
    pub fn iter(&self) -> impl Iterator<Item = &Swarm> {
        self.slots.iter().flatten().flatten()
    }

    /// Instantaneous biomass summed by resource group
    pub fn biomass_by_group(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.templates.len()];
        for swarm in self.iter() {
            if let Some(total) = totals.get_mut(swarm.group) {
                *total += swarm.instantaneous_biomass();
            }
        }
        totals
    }
}

/// Swarms held in `slot`, building them from `templates` when missing.
pub fn slot_swarms<'a>(
    slot: &'a mut Option<Vec<Swarm>>,
    templates: &[SwarmTemplate],
    cell: usize,
) -> &'a mut Vec<Swarm> {
    slot.get_or_insert_with(|| templates.iter().map(|t| Swarm::new(t, cell)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatForcing;

    impl ResourceForcing for FlatForcing {
        fn biomass(&self, group: usize, cell: usize, _step: usize) -> f64 {
            (10 * (group + 1) + cell) as f64
        }

        fn accessibility_coefficient(&self, _group: usize, step: usize) -> f64 {
            if step % 2 == 0 {
                0.5
            } else {
                0.25
            }
        }
    }

    fn templates() -> Vec<SwarmTemplate> {
        vec![
            SwarmTemplate { group: 0, species: 3, trophic_level: 1.0 },
            SwarmTemplate { group: 1, species: 4, trophic_level: 2.0 },
        ]
    }

    #[test]
    fn test_swarms_built_lazily() {
        let mut cache = SwarmCache::new(templates(), 4);
        assert!(!cache.is_cached(2));

        let swarms = cache.swarms_for(2, 17);
        assert_eq!(swarms.len(), 2);
        assert_eq!(swarms[1].group(), 1);
        assert_eq!(swarms[1].cell(), 17);

        swarms[0].set_biomass(3.0);
        assert!(cache.is_cached(2));
        // Memoized: the same swarms come back
        assert_eq!(cache.swarms_for(2, 17)[0].biomass(), 3.0);
        assert_eq!(cache.iter().count(), 2);
    }

    #[test]
    fn test_refresh_only_touches_cached() {
        let mut cache = SwarmCache::new(templates(), 3);
        cache.swarms_for(0, 5);

        cache.refresh_biomass(&FlatForcing, 0);

        let swarms = cache.swarms_for(0, 5);
        assert_eq!(swarms[0].biomass(), 0.5 * 15.0);
        assert_eq!(swarms[1].biomass(), 0.5 * 25.0);
        assert_eq!(cache.iter().count(), 2);
    }

    #[test]
    fn test_refresh_resets_predation() {
        let mut cache = SwarmCache::new(templates(), 1);
        cache.swarms_for(0, 0)[0].set_biomass(10.0);
        cache.swarms_for(0, 0)[0].record_predation(4.0);
        assert_eq!(cache.swarms_for(0, 0)[0].instantaneous_biomass(), 6.0);

        cache.refresh_biomass(&FlatForcing, 1);

        let swarm = &cache.swarms_for(0, 0)[0];
        assert_eq!(swarm.predated(), 0.0);
        assert_eq!(swarm.biomass(), 0.25 * 10.0);
    }

    #[test]
    fn test_biomass_by_group() {
        let mut cache = SwarmCache::new(templates(), 2);
        cache.swarms_for(0, 0);
        cache.swarms_for(1, 1);
        cache.refresh_biomass(&FlatForcing, 0);

        let totals = cache.biomass_by_group();
        assert_eq!(totals, vec![0.5 * (10.0 + 11.0), 0.5 * (20.0 + 21.0)]);
    }
}

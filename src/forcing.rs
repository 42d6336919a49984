//! Resource forcing: biomass of the low-trophic-level groups.

use crate::config::ResourceConfig;

/// Source of resource biomass for the swarms
pub trait ResourceForcing: Send + Sync {
    /// Biomass of `group` in grid cell `cell` at simulation step `step`
    fn biomass(&self, group: usize, cell: usize, step: usize) -> f64;

    /// Fraction of the biomass of `group` available to predators at `step`
    fn accessibility_coefficient(&self, group: usize, step: usize) -> f64;
}

#[derive(Debug, Clone)]
struct GroupForcing {
    biomass: f64,
    accessibility: Vec<f64>,
}

/// Same biomass in every ocean cell, with an optional seasonal
/// accessibility series.
#[derive(Debug, Clone, Default)]
pub struct UniformForcing {
    groups: Vec<GroupForcing>,
}

impl UniformForcing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(resources: &[ResourceConfig]) -> Self {
        let mut forcing = Self::new();
        for resource in resources {
            forcing.add_group(resource.biomass_per_cell, resource.accessibility.clone());
        }
        forcing
    }

    /// Add a group. An empty accessibility series means fully accessible.
    pub fn add_group(&mut self, biomass: f64, accessibility: Vec<f64>) -> usize {
        self.groups.push(GroupForcing {
            biomass,
            accessibility,
        });
        self.groups.len() - 1
    }

    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }
}

impl ResourceForcing for UniformForcing {
    fn biomass(&self, group: usize, _cell: usize, _step: usize) -> f64 {
        self.groups.get(group).map_or(0.0, |g| g.biomass)
    }

    fn accessibility_coefficient(&self, group: usize, step: usize) -> f64 {
        match self.groups.get(group) {
            Some(g) if !g.accessibility.is_empty() => {
                g.accessibility[step % g.accessibility.len()]
            }
            Some(_) => 1.0,
            None => 0.0,
        }
    }
}

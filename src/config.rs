//! Configuration system for the mortality kernel.
//!
//! Supports YAML configuration files with sensible defaults.

use crate::error::{MortalityError, Result};
use crate::fishing::FishingKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of mortality sub-steps when the configuration does not say
pub const DEFAULT_SUB_STEPS: u32 = 10;

/// Predator accessibility used when a species does not list one for a prey
pub const DEFAULT_ACCESSIBILITY: f64 = 0.8;

/// Predation success below which a school starts to starve
pub const DEFAULT_CRITICAL_PREDATION_SUCCESS: f32 = 0.57;

fn default_critical_predation_success() -> f32 {
    DEFAULT_CRITICAL_PREDATION_SUCCESS
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub time: TimeConfig,
    pub grid: GridConfig,
    #[serde(default)]
    pub mortality: MortalityConfig,
    #[serde(default)]
    pub parallel: ParallelConfig,
    pub species: Vec<SpeciesConfig>,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    #[serde(default)]
    pub fishing: FishingConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Time discretisation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Number of simulation steps in one year
    pub steps_per_year: u32,
}

/// Spatial domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub nx: usize,
    pub ny: usize,
    /// Fraction of cells flagged as land (0.0 - 1.0)
    #[serde(default)]
    pub land_fraction: f32,
}

/// Mortality algorithm parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MortalityConfig {
    /// Sub-steps per step; defaults to [`DEFAULT_SUB_STEPS`] when absent
    #[serde(default)]
    pub sub_steps: Option<u32>,
    /// Keep itemized prey records for diet outputs
    #[serde(default)]
    pub keep_prey_records: bool,
}

/// CPU budget shared between concurrently running replicates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    pub cpu_budget: usize,
    pub replicates: usize,
}

/// Parameters of one fish species
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    pub lifespan_years: f32,
    /// Weight of one individual (tonne)
    pub weight: f64,
    /// Typical length of an individual (cm)
    pub length: f32,
    pub trophic_level: f32,
    /// Annual additional natural mortality rate
    pub additional_mortality_rate: f64,
    /// Annual starvation mortality rate of a school that ate nothing
    #[serde(default)]
    pub starvation_rate: f64,
    /// Predation success at and above which a school does not starve
    #[serde(default = "default_critical_predation_success")]
    pub critical_predation_success: f32,
    /// Annual mortality rate of schools outside the simulated domain
    #[serde(default)]
    pub outside_mortality_rate: f64,
    /// Annual maximum ingestion (biomass eaten per unit of predator biomass)
    pub max_ingestion_rate: f64,
    /// Smallest prey length as a fraction of predator length
    pub min_prey_ratio: f32,
    /// Largest prey length (exclusive) as a fraction of predator length
    pub max_prey_ratio: f32,
    /// Accessibility to each prey (species first, then resource groups)
    #[serde(default)]
    pub accessibility: Vec<f64>,
    #[serde(default)]
    pub fishing: SpeciesFishing,
}

/// Fishing parameters of one species
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesFishing {
    pub kind: FishingKind,
    /// Annual rate for [`FishingKind::Rate`], annual catches (tonne) for
    /// [`FishingKind::Catches`]
    pub value: f64,
    /// Age from which schools are fishable
    #[serde(default)]
    pub recruitment_age_years: f32,
}

/// Low-trophic-level resource group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub trophic_level: f32,
    /// Size range of the organisms in the group (cm)
    pub size_min: f32,
    pub size_max: f32,
    /// Biomass in every ocean cell (tonne)
    pub biomass_per_cell: f64,
    /// Accessible fraction, cycled over the steps of the year
    #[serde(default)]
    pub accessibility: Vec<f64>,
}

/// Spatial fishing restrictions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FishingConfig {
    /// Grid cells closed to fishing
    #[serde(default)]
    pub protected_cells: Vec<usize>,
}

/// Synthetic ecosystem used by the CLI and the benchmarks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Random seed; drawn at random when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Maximum number of schools of each species seeded per ocean cell
    pub schools_per_cell: usize,
    /// Initial abundance of a seeded school
    pub initial_abundance: f64,
    /// Abundance of the egg school spawned per species and cell every year
    pub egg_abundance: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Steps between stats logging
    pub stats_interval: u64,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time: TimeConfig::default(),
            grid: GridConfig::default(),
            mortality: MortalityConfig::default(),
            parallel: ParallelConfig::default(),
            species: default_species(),
            resources: default_resources(),
            fishing: FishingConfig::default(),
            scenario: ScenarioConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self { steps_per_year: 24 }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            nx: 20,
            ny: 20,
            land_fraction: 0.2,
        }
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            cpu_budget: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            replicates: 1,
        }
    }
}

impl Default for SpeciesFishing {
    fn default() -> Self {
        Self {
            kind: FishingKind::Rate,
            value: 0.0,
            recruitment_age_years: 1.0,
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: None,
            schools_per_cell: 3,
            initial_abundance: 1.0e5,
            egg_abundance: 1.0e7,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stats_interval: 12,
            log_level: "info".to_string(),
        }
    }
}

fn default_species() -> Vec<SpeciesConfig> {
    vec![
        SpeciesConfig {
            name: "anchovy".to_string(),
            lifespan_years: 4.0,
            weight: 1.5e-5,
            length: 12.0,
            trophic_level: 3.0,
            additional_mortality_rate: 0.6,
            starvation_rate: 0.1,
            critical_predation_success: 0.57,
            outside_mortality_rate: 0.0,
            max_ingestion_rate: 3.5,
            min_prey_ratio: 0.01,
            max_prey_ratio: 0.25,
            accessibility: Vec::new(),
            fishing: SpeciesFishing {
                kind: FishingKind::Rate,
                value: 0.4,
                recruitment_age_years: 1.0,
            },
        },
        SpeciesConfig {
            name: "hake".to_string(),
            lifespan_years: 12.0,
            weight: 8.0e-4,
            length: 40.0,
            trophic_level: 4.0,
            additional_mortality_rate: 0.2,
            starvation_rate: 0.05,
            critical_predation_success: 0.57,
            outside_mortality_rate: 0.2,
            max_ingestion_rate: 3.0,
            min_prey_ratio: 0.05,
            max_prey_ratio: 0.4,
            accessibility: Vec::new(),
            fishing: SpeciesFishing {
                kind: FishingKind::Catches,
                value: 500.0,
                recruitment_age_years: 2.0,
            },
        },
        SpeciesConfig {
            name: "tuna".to_string(),
            lifespan_years: 15.0,
            weight: 2.0e-2,
            length: 120.0,
            trophic_level: 4.5,
            additional_mortality_rate: 0.1,
            starvation_rate: 0.02,
            critical_predation_success: 0.5,
            outside_mortality_rate: 0.3,
            max_ingestion_rate: 2.5,
            min_prey_ratio: 0.05,
            max_prey_ratio: 0.35,
            accessibility: Vec::new(),
            fishing: SpeciesFishing::default(),
        },
    ]
}

fn default_resources() -> Vec<ResourceConfig> {
    vec![
        ResourceConfig {
            name: "mesozooplankton".to_string(),
            trophic_level: 2.0,
            size_min: 0.02,
            size_max: 0.2,
            biomass_per_cell: 50.0,
            accessibility: vec![0.4],
        },
        ResourceConfig {
            name: "macrozooplankton".to_string(),
            trophic_level: 2.5,
            size_min: 0.2,
            size_max: 2.0,
            biomass_per_cell: 20.0,
            accessibility: vec![0.3, 0.5],
        },
    ]
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.time.steps_per_year == 0 {
            return Err(MortalityError::config("steps_per_year must be > 0"));
        }
        if self.grid.nx == 0 || self.grid.ny == 0 {
            return Err(MortalityError::config("grid dimensions must be > 0"));
        }
        if !(0.0..1.0).contains(&self.grid.land_fraction) {
            return Err(MortalityError::config("land_fraction must be in [0, 1)"));
        }
        if self.mortality.sub_steps == Some(0) {
            return Err(MortalityError::config("mortality.sub_steps must be > 0"));
        }
        if self.parallel.replicates == 0 {
            return Err(MortalityError::config("parallel.replicates must be > 0"));
        }
        if self.species.is_empty() {
            return Err(MortalityError::config("at least one species is required"));
        }

        let n_prey = self.n_prey();
        for sp in &self.species {
            let fail = |msg: &str| MortalityError::config(format!("species '{}': {}", sp.name, msg));
            if !(sp.weight > 0.0) || !(sp.length > 0.0) {
                return Err(fail("weight and length must be > 0"));
            }
            if !(sp.lifespan_years > 0.0) {
                return Err(fail("lifespan_years must be > 0"));
            }
            if sp.additional_mortality_rate < 0.0
                || sp.starvation_rate < 0.0
                || sp.outside_mortality_rate < 0.0
                || sp.max_ingestion_rate < 0.0
                || sp.fishing.value < 0.0
            {
                return Err(fail("rates must be >= 0"));
            }
            if !(sp.critical_predation_success > 0.0 && sp.critical_predation_success <= 1.0) {
                return Err(fail("critical_predation_success must be in (0, 1]"));
            }
            if !(sp.min_prey_ratio >= 0.0 && sp.min_prey_ratio < sp.max_prey_ratio) {
                return Err(fail("prey ratios must satisfy 0 <= min_prey_ratio < max_prey_ratio"));
            }
            if sp.accessibility.len() > n_prey {
                return Err(fail("more accessibility entries than prey"));
            }
            if sp.accessibility.iter().any(|a| !(0.0..=1.0).contains(a)) {
                return Err(fail("accessibility must be in [0, 1]"));
            }
        }

        for rsc in &self.resources {
            if rsc.biomass_per_cell < 0.0 || !(rsc.size_min < rsc.size_max) {
                return Err(MortalityError::config(format!(
                    "resource '{}': biomass must be >= 0 and size_min < size_max",
                    rsc.name
                )));
            }
            if rsc.accessibility.iter().any(|a| !(0.0..=1.0).contains(a)) {
                return Err(MortalityError::config(format!(
                    "resource '{}': accessibility must be in [0, 1]",
                    rsc.name
                )));
            }
        }

        let n_cells = self.grid.nx * self.grid.ny;
        if let Some(&cell) = self.fishing.protected_cells.iter().find(|&&c| c >= n_cells) {
            return Err(MortalityError::config(format!(
                "protected cell {} is outside the {}x{} grid",
                cell, self.grid.nx, self.grid.ny
            )));
        }
        Ok(())
    }

    /// Mortality sub-steps per step, warning when the default is used
    pub fn sub_steps(&self) -> u32 {
        match self.mortality.sub_steps {
            Some(n) => n,
            None => {
                log::warn!(
                    "mortality.sub_steps not set, using default of {}",
                    DEFAULT_SUB_STEPS
                );
                DEFAULT_SUB_STEPS
            }
        }
    }

    /// Workers available to one replicate, never less than one
    pub fn worker_count(&self) -> usize {
        (self.parallel.cpu_budget / self.parallel.replicates.max(1)).max(1)
    }

    /// Number of prey indices: fish species then resource groups
    pub fn n_prey(&self) -> usize {
        self.species.len() + self.resources.len()
    }

    /// Lifespan of a species in steps
    pub fn lifespan_dt(&self, species: usize) -> u32 {
        self.species
            .get(species)
            .map_or(0, |sp| (sp.lifespan_years * self.time.steps_per_year as f32).round() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let loaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.grid.nx, loaded.grid.nx);
        assert_eq!(loaded.species.len(), 3);
        assert_eq!(loaded.species[1].fishing.kind, FishingKind::Catches);
    }

    #[test]
    fn test_sub_steps_default() {
        let mut config = Config::default();
        assert_eq!(config.sub_steps(), DEFAULT_SUB_STEPS);

        config.mortality.sub_steps = Some(4);
        assert_eq!(config.sub_steps(), 4);

        config.mortality.sub_steps = Some(0);
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_worker_count_floor() {
        let mut config = Config::default();
        config.parallel.cpu_budget = 8;
        config.parallel.replicates = 3;
        assert_eq!(config.worker_count(), 2);

        config.parallel.replicates = 16;
        assert_eq!(config.worker_count(), 1);

        config.parallel.replicates = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_fishing_kind_rejected() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config)
            .unwrap()
            .replacen("kind: catches", "kind: trawling", 1);
        let parsed: std::result::Result<Config, _> = serde_yaml::from_str(&yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_protected_cell_outside_grid() {
        let mut config = Config::default();
        config.fishing.protected_cells = vec![config.grid.nx * config.grid.ny];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_critical_predation_success() {
        let mut config = Config::default();
        config.species[0].critical_predation_success = 0.0;
        assert!(config.validate().unwrap_err().is_config());

        // Older files without the field get the default
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let yaml: Vec<&str> = yaml
            .lines()
            .filter(|line| !line.contains("critical_predation_success"))
            .collect();
        let loaded: Config = serde_yaml::from_str(&yaml.join("\n")).unwrap();
        assert!(loaded
            .species
            .iter()
            .all(|sp| sp.critical_predation_success == DEFAULT_CRITICAL_PREDATION_SUCCESS));
    }

    #[test]
    fn test_lifespan_dt() {
        let config = Config::default();
        assert_eq!(config.lifespan_dt(0), 96);
        assert_eq!(config.lifespan_dt(42), 0);
    }
}

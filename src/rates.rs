//! Hazard rates of the non-predation causes.
//!
//! Additional and outside-domain mortality are constant annual rates per
//! species. Starvation depends on how well a school fed during the previous
//! step and is refreshed at the end of every step.

use crate::config::Config;
use crate::school::School;

/// Source of the additional mortality hazard of a school
pub trait AdditionalMortality: Send + Sync {
    /// Hazard rate over a full step
    fn rate(&self, school: &School) -> f64;
}

/// Source of the starvation hazard a school will suffer next step
pub trait Starvation: Send + Sync {
    /// Hazard rate over a full step, from the school's state at the end of
    /// the current one
    fn rate(&self, school: &School) -> f64;
}

/// Source of the mortality of schools that left the simulated domain
pub trait OutsideMortality: Send + Sync {
    /// Hazard rate over a full step
    fn rate(&self, school: &School) -> f64;
}

/// Annual rates per species converted to per-step rates
#[derive(Debug, Clone)]
struct AnnualRates {
    annual: Vec<f64>,
    steps_per_year: u32,
}

impl AnnualRates {
    fn new(annual: Vec<f64>, steps_per_year: u32) -> Self {
        Self {
            annual,
            steps_per_year: steps_per_year.max(1),
        }
    }

    fn per_step(&self, species: usize) -> f64 {
        self.annual
            .get(species)
            .map_or(0.0, |rate| rate / self.steps_per_year as f64)
    }
}

/// Constant annual rate per species, spread evenly over the year
#[derive(Debug, Clone)]
pub struct SpeciesAdditionalMortality(AnnualRates);

impl SpeciesAdditionalMortality {
    pub fn new(annual: Vec<f64>, steps_per_year: u32) -> Self {
        Self(AnnualRates::new(annual, steps_per_year))
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config
                .species
                .iter()
                .map(|sp| sp.additional_mortality_rate)
                .collect(),
            config.time.steps_per_year,
        )
    }
}

impl AdditionalMortality for SpeciesAdditionalMortality {
    fn rate(&self, school: &School) -> f64 {
        self.0.per_step(school.species)
    }
}

/// Constant annual outside-domain rate per species
#[derive(Debug, Clone)]
pub struct SpeciesOutsideMortality(AnnualRates);

impl SpeciesOutsideMortality {
    pub fn new(annual: Vec<f64>, steps_per_year: u32) -> Self {
        Self(AnnualRates::new(annual, steps_per_year))
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config
                .species
                .iter()
                .map(|sp| sp.outside_mortality_rate)
                .collect(),
            config.time.steps_per_year,
        )
    }
}

impl OutsideMortality for SpeciesOutsideMortality {
    fn rate(&self, school: &School) -> f64 {
        self.0.per_step(school.species)
    }
}

/// Starvation driven by the predation success of the step.
///
/// A school whose success reaches the species' critical value does not
/// starve; below it the rate grows linearly up to the species maximum for a
/// school that ate nothing. Eggs do not feed and never starve.
#[derive(Debug, Clone)]
pub struct SuccessStarvation {
    max: AnnualRates,
    critical: Vec<f32>,
}

impl SuccessStarvation {
    pub fn new(max_annual: Vec<f64>, critical: Vec<f32>, steps_per_year: u32) -> Self {
        Self {
            max: AnnualRates::new(max_annual, steps_per_year),
            critical,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.species.iter().map(|sp| sp.starvation_rate).collect(),
            config
                .species
                .iter()
                .map(|sp| sp.critical_predation_success)
                .collect(),
            config.time.steps_per_year,
        )
    }
}

impl Starvation for SuccessStarvation {
    fn rate(&self, school: &School) -> f64 {
        if school.is_egg() {
            return 0.0;
        }
        let critical = match self.critical.get(school.species) {
            Some(&c) if c > 0.0 => f64::from(c),
            _ => return 0.0,
        };
        let success = f64::from(school.pred_success_rate());
        self.max.per_step(school.species) * (1.0 - success / critical).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::school::Location;

    #[test]
    fn test_rate_per_step() {
        let rates = SpeciesAdditionalMortality::new(vec![1.2, 0.0], 12);
        let a = School::new(0, 0, 10.0, 1.0, 5.0, 2, Location::OffGrid);
        let b = School::new(1, 1, 10.0, 1.0, 5.0, 2, Location::OffGrid);
        let unknown = School::new(2, 7, 10.0, 1.0, 5.0, 2, Location::OffGrid);

        assert!((rates.rate(&a) - 0.1).abs() < 1e-12);
        assert_eq!(rates.rate(&b), 0.0);
        assert_eq!(rates.rate(&unknown), 0.0);
    }

    #[test]
    fn test_outside_rate_per_step() {
        let rates = SpeciesOutsideMortality::new(vec![2.4], 24);
        let school = School::new(0, 0, 10.0, 1.0, 5.0, 2, Location::OutOfDomain);
        assert!((rates.rate(&school) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_starvation_follows_success() {
        let starvation = SuccessStarvation::new(vec![1.2], vec![0.5], 12);
        let mut school = School::new(0, 0, 10.0, 1.0, 5.0, 3, Location::Cell(0));

        // Nothing eaten: full rate
        assert!((starvation.rate(&school) - 0.1).abs() < 1e-12);

        school.increment_pred_success_rate(0.25);
        assert!((starvation.rate(&school) - 0.05).abs() < 1e-7);

        school.increment_pred_success_rate(0.5);
        assert_eq!(starvation.rate(&school), 0.0);
    }

    #[test]
    fn test_eggs_do_not_starve() {
        let starvation = SuccessStarvation::new(vec![1.2], vec![0.5], 12);
        let egg = School::new(0, 0, 10.0, 1.0, 0.1, 0, Location::Cell(0));
        assert_eq!(starvation.rate(&egg), 0.0);
    }
}

//! Per-school mortality bookkeeping.
//!
//! A school's abundance is frozen at the start of every step. Mortality is
//! then accumulated by cause, and the *instantaneous* abundance (step-start
//! abundance minus retained eggs minus every death so far) is derived lazily:
//! recording a death only flips a dirty flag, and the derived values are
//! recomputed on the next read.

use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Sources of death.
///
/// The first four compete within a sub-step; `OutOfDomain` is applied once
/// per step to schools that left the simulated domain. The declaration order
/// is only used to index [`DeathCounts`]; the resolver never relies on it as
/// an execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MortalityCause {
    Predation,
    Starvation,
    Additional,
    Fishing,
    OutOfDomain,
}

impl MortalityCause {
    /// Number of causes.
    pub const COUNT: usize = 5;

    /// Number of causes competing within a sub-step.
    pub const COMPETING_COUNT: usize = 4;

    /// Every cause, in index order.
    pub const ALL: [MortalityCause; Self::COUNT] = [
        MortalityCause::Predation,
        MortalityCause::Starvation,
        MortalityCause::Additional,
        MortalityCause::Fishing,
        MortalityCause::OutOfDomain,
    ];

    /// Causes resolved by the sub-step competition, in index order.
    pub const COMPETING: [MortalityCause; Self::COMPETING_COUNT] = [
        MortalityCause::Predation,
        MortalityCause::Starvation,
        MortalityCause::Additional,
        MortalityCause::Fishing,
    ];

    /// Stable index into per-cause arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            MortalityCause::Predation => 0,
            MortalityCause::Starvation => 1,
            MortalityCause::Additional => 2,
            MortalityCause::Fishing => 3,
            MortalityCause::OutOfDomain => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MortalityCause::Predation => "predation",
            MortalityCause::Starvation => "starvation",
            MortalityCause::Additional => "additional",
            MortalityCause::Fishing => "fishing",
            MortalityCause::OutOfDomain => "out_of_domain",
        }
    }
}

impl std::fmt::Display for MortalityCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Accumulated number of dead individuals, by cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeathCounts([f64; MortalityCause::COUNT]);

impl DeathCounts {
    #[inline]
    pub fn get(&self, cause: MortalityCause) -> f64 {
        self.0[cause.index()]
    }

    #[inline]
    pub fn add(&mut self, cause: MortalityCause, amount: f64) {
        self.0[cause.index()] += amount;
    }

    /// Sum over every cause.
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn reset(&mut self) {
        self.0 = [0.0; MortalityCause::COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item = (MortalityCause, f64)> + '_ {
        MortalityCause::ALL.iter().map(move |&c| (c, self.get(c)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Derived {
    abundance: f64,
    biomass: f64,
}

/// Accounting state of one school for the current step.
///
/// Reads go through [`Accounting::instantaneous_abundance`] and
/// [`Accounting::instantaneous_biomass`]; the cached values are private and
/// never stale when observed.
#[derive(Debug, Clone)]
pub struct Accounting {
    /// Abundance frozen at the start of the step
    abundance: f64,
    /// Weight of one individual
    weight: f64,
    /// Eggs not yet exposed to mortality this step
    egg_retained: f64,
    deaths: DeathCounts,

    // Per-individual energetic accumulators, rescaled on every death
    ingestion: f64,
    net_energy: f64,

    derived: Cell<Derived>,
    dirty: Cell<bool>,
    recomputations: Cell<u64>,
}

impl Accounting {
    /// Create the accounting of a school of `abundance` individuals weighing
    /// `weight` each.
    pub fn new(abundance: f64, weight: f64) -> Self {
        let abundance = abundance.max(0.0);
        Self {
            abundance,
            weight,
            egg_retained: 0.0,
            deaths: DeathCounts::default(),
            ingestion: 0.0,
            net_energy: 0.0,
            derived: Cell::new(Derived {
                abundance,
                biomass: abundance * weight,
            }),
            dirty: Cell::new(false),
            recomputations: Cell::new(0),
        }
    }

    /// Snapshot the current instantaneous abundance as the new step-start
    /// abundance and clear every per-step counter, energetic accumulators
    /// included.
    pub fn begin_step(&mut self) {
        self.abundance = self.instantaneous_abundance();
        self.egg_retained = 0.0;
        self.deaths.reset();
        self.ingestion = 0.0;
        self.net_energy = 0.0;
        self.derived.set(Derived {
            abundance: self.abundance,
            biomass: self.abundance * self.weight,
        });
        self.dirty.set(false);
    }

    /// Record `amount` dead individuals for `cause`.
    ///
    /// The energetic accumulators are rescaled by the surviving fraction
    /// `(before - amount) / before` so they keep describing an average
    /// surviving individual. The factor is 1 when the school is already empty.
    pub fn record_death(&mut self, cause: MortalityCause, amount: f64) {
        if !(amount > 0.0) {
            return;
        }
        let before = self.instantaneous_abundance();
        self.deaths.add(cause, amount);

        let factor = if before != 0.0 {
            ((before - amount) / before).max(0.0)
        } else {
            1.0
        };
        self.ingestion *= factor;
        self.net_energy *= factor;

        self.dirty.set(true);
    }

    /// Abundance after retained eggs and every recorded death, never negative.
    pub fn instantaneous_abundance(&self) -> f64 {
        self.refresh();
        self.derived.get().abundance
    }

    /// Biomass matching [`Self::instantaneous_abundance`].
    pub fn instantaneous_biomass(&self) -> f64 {
        self.refresh();
        self.derived.get().biomass
    }

    #[inline]
    fn refresh(&self) {
        if !self.dirty.get() {
            return;
        }
        let abundance =
            ((self.abundance - self.egg_retained) - self.deaths.total()).max(0.0);
        self.derived.set(Derived {
            abundance,
            biomass: abundance * self.weight,
        });
        self.dirty.set(false);
        self.recomputations.set(self.recomputations.get() + 1);
    }

    /// Hold back every egg that survived the egg loss. The instantaneous
    /// abundance drops to zero until [`Self::release_eggs`] is called.
    pub fn retain_eggs(&mut self) {
        self.egg_retained =
            (self.abundance - self.deaths.get(MortalityCause::Additional)).max(0.0);
        self.dirty.set(true);
    }

    /// Expose one sub-step's share of the retained eggs and return how many
    /// were released.
    pub fn release_eggs(&mut self, sub_steps: u32) -> f64 {
        let share = (self.abundance - self.deaths.get(MortalityCause::Additional))
            / f64::from(sub_steps.max(1));
        let before = self.egg_retained;
        self.egg_retained = (before - share).max(0.0);
        self.dirty.set(true);
        before - self.egg_retained
    }

    /// Convert a biomass into a number of individuals of this school.
    #[inline]
    pub fn biomass_to_abundance(&self, biomass: f64) -> f64 {
        if self.weight > 0.0 {
            biomass / self.weight
        } else {
            0.0
        }
    }

    #[inline]
    pub fn abundance_to_biomass(&self, abundance: f64) -> f64 {
        abundance * self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
        self.dirty.set(true);
    }

    /// Step-start abundance.
    pub fn abundance(&self) -> f64 {
        self.abundance
    }

    /// Step-start biomass.
    pub fn biomass(&self) -> f64 {
        self.abundance * self.weight
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn egg_retained(&self) -> f64 {
        self.egg_retained
    }

    pub fn deaths(&self) -> &DeathCounts {
        &self.deaths
    }

    pub fn dead(&self, cause: MortalityCause) -> f64 {
        self.deaths.get(cause)
    }

    pub fn ingestion(&self) -> f64 {
        self.ingestion
    }

    pub fn add_ingestion(&mut self, amount: f64) {
        self.ingestion += amount;
    }

    pub fn net_energy(&self) -> f64 {
        self.net_energy
    }

    pub fn set_net_energy(&mut self, value: f64) {
        self.net_energy = value;
    }

    /// Whether the derived values will be recomputed on the next read.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// How many times the derived values have been recomputed.
    pub fn recomputations(&self) -> u64 {
        self.recomputations.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_indices_are_distinct() {
        let mut seen = [false; MortalityCause::COUNT];
        for cause in MortalityCause::ALL {
            assert!(!seen[cause.index()]);
            seen[cause.index()] = true;
        }
        assert!(seen.iter().all(|&s| s));
        for (i, cause) in MortalityCause::COMPETING.iter().enumerate() {
            assert_eq!(cause.index(), i);
        }
        assert!(!MortalityCause::COMPETING.contains(&MortalityCause::OutOfDomain));
    }

    #[test]
    fn test_record_death_marks_dirty() {
        let mut acc = Accounting::new(100.0, 2.0);
        assert!(!acc.is_dirty());

        acc.record_death(MortalityCause::Fishing, 10.0);
        assert!(acc.is_dirty());
        assert_eq!(acc.dead(MortalityCause::Fishing), 10.0);
        assert_eq!(acc.instantaneous_abundance(), 90.0);
        assert_eq!(acc.instantaneous_biomass(), 180.0);
        assert!(!acc.is_dirty());
    }

    #[test]
    fn test_read_is_idempotent() {
        let mut acc = Accounting::new(50.0, 1.0);
        acc.record_death(MortalityCause::Starvation, 5.0);

        let first = acc.instantaneous_abundance();
        let second = acc.instantaneous_abundance();
        let _ = acc.instantaneous_biomass();

        assert_eq!(first, second);
        assert_eq!(acc.recomputations(), 1);
    }

    #[test]
    fn test_never_negative() {
        let mut acc = Accounting::new(10.0, 1.0);
        acc.record_death(MortalityCause::Predation, 8.0);
        acc.record_death(MortalityCause::Fishing, 8.0);

        assert_eq!(acc.instantaneous_abundance(), 0.0);
        assert_eq!(acc.instantaneous_biomass(), 0.0);
    }

    #[test]
    fn test_non_positive_amounts_ignored() {
        let mut acc = Accounting::new(10.0, 1.0);
        acc.record_death(MortalityCause::Predation, 0.0);
        acc.record_death(MortalityCause::Predation, -3.0);
        acc.record_death(MortalityCause::Predation, f64::NAN);

        assert_eq!(acc.deaths().total(), 0.0);
        assert!(!acc.is_dirty());
    }

    #[test]
    fn test_energy_rescaled_by_survivors() {
        let mut acc = Accounting::new(100.0, 1.0);
        acc.add_ingestion(40.0);
        acc.set_net_energy(20.0);

        acc.record_death(MortalityCause::Fishing, 25.0);

        assert!((acc.ingestion() - 30.0).abs() < 1e-12);
        assert!((acc.net_energy() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_energy_factor_defaults_to_one_when_empty() {
        let mut acc = Accounting::new(0.0, 1.0);
        acc.add_ingestion(4.0);
        acc.set_net_energy(2.0);

        acc.record_death(MortalityCause::Starvation, 1.0);

        assert_eq!(acc.ingestion(), 4.0);
        assert_eq!(acc.net_energy(), 2.0);
    }

    #[test]
    fn test_begin_step_snapshots_survivors() {
        let mut acc = Accounting::new(100.0, 0.5);
        acc.add_ingestion(3.0);
        acc.set_net_energy(1.5);
        acc.record_death(MortalityCause::Additional, 30.0);

        acc.begin_step();

        assert_eq!(acc.abundance(), 70.0);
        assert_eq!(acc.biomass(), 35.0);
        assert_eq!(acc.deaths().total(), 0.0);
        assert_eq!(acc.ingestion(), 0.0);
        assert_eq!(acc.net_energy(), 0.0);
        assert!(!acc.is_dirty());
    }

    #[test]
    fn test_egg_release_reconstructs_cohort() {
        let mut acc = Accounting::new(1000.0, 0.001);
        acc.record_death(MortalityCause::Additional, 200.0);
        acc.retain_eggs();
        assert_eq!(acc.instantaneous_abundance(), 0.0);

        let sub_steps = 7;
        let released: f64 = (0..sub_steps).map(|_| acc.release_eggs(sub_steps)).sum();

        assert!((released - 800.0).abs() < 1e-9);
        assert!((acc.instantaneous_abundance() - 800.0).abs() < 1e-9);
        // Nothing left to release
        assert!(acc.release_eggs(sub_steps) < 1e-9);
        assert_eq!(acc.egg_retained(), 0.0);
    }

    #[test]
    fn test_biomass_conversion() {
        let acc = Accounting::new(10.0, 4.0);
        assert_eq!(acc.biomass_to_abundance(8.0), 2.0);
        assert_eq!(acc.abundance_to_biomass(2.0), 8.0);

        let weightless = Accounting::new(10.0, 0.0);
        assert_eq!(weightless.biomass_to_abundance(8.0), 0.0);
    }
}

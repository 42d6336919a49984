//! Competing-mortality resolver.
//!
//! Within one sub-step, every school of a cell is visited exactly once per
//! cause. Each cause walks the schools in its own random order, and for every
//! slot the four causes are applied in a freshly shuffled order. Causes read
//! the current instantaneous abundance, so a cause applied later in a slot
//! sees the depletion left by the earlier ones.

use crate::accounting::MortalityCause;
use crate::fishing::{Fishing, FishingKind};
use crate::predation::{Predation, PreyId, PreyPool};
use crate::rates::AdditionalMortality;
use crate::school::School;
use crate::swarm::Swarm;
use rand::seq::SliceRandom;
use rand::Rng;

/// Collaborators providing the cause-specific rates and removals
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub predation: &'a dyn Predation,
    pub additional: &'a dyn AdditionalMortality,
    pub fishing: &'a dyn Fishing,
}

/// Settings shared by every cell of a step
#[derive(Debug, Clone, Copy)]
pub struct ResolveSettings {
    pub sub_steps: u32,
    pub keep_prey_records: bool,
}

/// Fraction of `abundance` dying from a hazard `rate` over one sub-step
#[inline]
fn hazard_deaths(abundance: f64, rate: f64, sub_steps: u32) -> f64 {
    abundance * (1.0 - (-rate / f64::from(sub_steps)).exp())
}

/// Resolve one sub-step of mortality for the schools and swarms of a cell.
pub fn resolve<R: Rng + ?Sized>(
    schools: &mut [School],
    swarms: &mut [Swarm],
    with: &Collaborators<'_>,
    settings: ResolveSettings,
    rng: &mut R,
) {
    let settings = ResolveSettings {
        sub_steps: settings.sub_steps.max(1),
        ..settings
    };

    for school in schools.iter_mut().filter(|s| s.is_egg()) {
        school.accounting_mut().release_eggs(settings.sub_steps);
    }

    let n = schools.len();
    if n == 0 {
        return;
    }

    let mut orders: [Vec<usize>; MortalityCause::COMPETING_COUNT] = Default::default();
    for order in &mut orders {
        order.extend(0..n);
        order.shuffle(rng);
    }

    let mut causes = MortalityCause::COMPETING;
    for slot in 0..n {
        causes.shuffle(rng);
        for &cause in &causes {
            let school = orders[cause.index()][slot];
            match cause {
                MortalityCause::Predation => {
                    predate(schools, swarms, school, with.predation, settings)
                }
                MortalityCause::Starvation => starve(&mut schools[school], settings.sub_steps),
                MortalityCause::Additional => {
                    additional(&mut schools[school], with.additional, settings.sub_steps)
                }
                MortalityCause::Fishing => {
                    fish(&mut schools[school], with.fishing, settings.sub_steps)
                }
                // Applied once per step by the orchestrator
                MortalityCause::OutOfDomain => {}
            }
        }
    }
}

fn predate(
    schools: &mut [School],
    swarms: &mut [Swarm],
    predator: usize,
    predation: &dyn Predation,
    settings: ResolveSettings,
) {
    let (removals, max_ingestion) = {
        let pool = PreyPool::new(schools, swarms);
        let accessibility = schools[predator].accessibility();
        (
            predation.consume(&pool, predator, accessibility, settings.sub_steps),
            predation.max_ingestion(&schools[predator], settings.sub_steps),
        )
    };

    let n_schools = schools.len();
    let mut eaten = 0.0;
    for (index, &requested) in removals.iter().enumerate() {
        if !(requested > 0.0) {
            continue;
        }
        let id = if index < n_schools {
            PreyId::School(index)
        } else if index - n_schools < swarms.len() {
            PreyId::Swarm(index - n_schools)
        } else {
            break;
        };

        let (prey, taken) = match id {
            PreyId::School(i) if i == predator => continue,
            PreyId::School(i) => {
                let prey = &mut schools[i];
                let taken = requested.min(prey.instantaneous_biomass());
                let dead = prey.biomass_to_abundance(taken);
                prey.record_death(MortalityCause::Predation, dead);
                (prey.prey_info(), taken)
            }
            PreyId::Swarm(j) => {
                let swarm = &mut swarms[j];
                let taken = requested.min(swarm.instantaneous_biomass());
                swarm.record_predation(taken);
                (swarm.prey_info(), taken)
            }
        };
        if taken > 0.0 {
            schools[predator].record_consumption(prey, taken, settings.keep_prey_records);
            eaten += taken;
        }
    }

    if max_ingestion > 0.0 {
        let success = (eaten / max_ingestion).min(1.0) / f64::from(settings.sub_steps);
        schools[predator].increment_pred_success_rate(success as f32);
    }
}

fn starve(school: &mut School, sub_steps: u32) {
    let dead = hazard_deaths(school.instantaneous_abundance(), school.starvation_rate, sub_steps);
    school.record_death(MortalityCause::Starvation, dead);
}

fn additional(school: &mut School, rates: &dyn AdditionalMortality, sub_steps: u32) {
    // Egg loss is applied once before the sub-steps
    if school.is_egg() {
        return;
    }
    let dead = hazard_deaths(school.instantaneous_abundance(), rates.rate(school), sub_steps);
    school.record_death(MortalityCause::Additional, dead);
}

fn fish(school: &mut School, fishing: &dyn Fishing, sub_steps: u32) {
    let abundance = school.instantaneous_abundance();
    let dead = match fishing.kind(school.species) {
        FishingKind::Rate => hazard_deaths(abundance, fishing.rate(school), sub_steps),
        FishingKind::Catches => {
            let catches = fishing.catches(school) / f64::from(sub_steps);
            school.biomass_to_abundance(catches).min(abundance)
        }
    };
    school.record_death(MortalityCause::Fishing, dead);
}

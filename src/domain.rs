//! Domain - schools arranged by ocean cell, plus the resource swarms.
//!
//! Schools live in one [`CellPopulation`] per ocean cell, in the ocean-cell
//! order of the [`Grid`]. Schools without a cell (off-grid or out of the
//! domain) are kept aside and take no part in the mortality step.

use crate::grid::Grid;
use crate::school::{Location, School, SchoolId};
use crate::swarm::{Swarm, SwarmCache, SwarmTemplate};

/// Schools of one ocean cell
#[derive(Debug, Clone, Default)]
pub struct CellPopulation {
    cell: usize,
    schools: Vec<School>,
}

impl CellPopulation {
    pub fn new(cell: usize) -> Self {
        Self {
            cell,
            schools: Vec::new(),
        }
    }

    pub fn with_schools(cell: usize, schools: Vec<School>) -> Self {
        Self { cell, schools }
    }

    /// Grid index of the cell
    pub fn cell(&self) -> usize {
        self.cell
    }

    pub fn schools(&self) -> &[School] {
        &self.schools
    }

    pub fn schools_mut(&mut self) -> &mut Vec<School> {
        &mut self.schools
    }

    pub fn len(&self) -> usize {
        self.schools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }
}

/// Every school of the simulation, indexed by location
#[derive(Debug, Clone)]
pub struct Domain {
    grid: Grid,
    cells: Vec<CellPopulation>,
    elsewhere: Vec<School>,
    swarms: SwarmCache,
    next_id: SchoolId,
}

impl Domain {
    pub fn new(grid: Grid, templates: Vec<SwarmTemplate>) -> Self {
        let cells = grid
            .ocean_cells()
            .iter()
            .map(|&cell| CellPopulation::new(cell))
            .collect();
        let swarms = SwarmCache::new(templates, grid.n_ocean());
        Self {
            grid,
            cells,
            elsewhere: Vec::new(),
            swarms,
            next_id: 0,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Fresh school identifier
    pub fn next_school_id(&mut self) -> SchoolId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Place a school according to its location. A school pointing at a
    /// land or unknown cell is kept off-grid.
    pub fn add_school(&mut self, mut school: School) {
        if school.id >= self.next_id {
            self.next_id = school.id + 1;
        }
        match school.cell().and_then(|cell| self.grid.ocean_slot(cell)) {
            Some(slot) => self.cells[slot].schools.push(school),
            None => {
                if let Location::Cell(cell) = school.location {
                    log::warn!("school {} placed on land cell {}, moved off-grid", school.id, cell);
                    school.location = Location::OffGrid;
                }
                self.elsewhere.push(school);
            }
        }
    }

    /// Take every school out of the domain, leaving the cells empty
    pub fn drain_schools(&mut self) -> Vec<School> {
        let mut schools = std::mem::take(&mut self.elsewhere);
        for population in &mut self.cells {
            schools.append(&mut population.schools);
        }
        schools
    }

    /// Start a new step for every school
    pub fn begin_step(&mut self) {
        for school in self.schools_mut() {
            school.begin_step();
        }
    }

    /// Drop dead schools and return how many were removed.
    ///
    /// `lifespan_dt` gives the lifespan in steps of a species.
    pub fn remove_dead<F>(&mut self, lifespan_dt: F) -> usize
    where
        F: Fn(usize) -> u32,
    {
        let before = self.n_schools();
        for population in &mut self.cells {
            population
                .schools
                .retain(|school| school.is_alive(lifespan_dt(school.species)));
        }
        self.elsewhere
            .retain(|school| school.is_alive(lifespan_dt(school.species)));
        before - self.n_schools()
    }

    /// Ocean-cell populations in ocean-cell order
    pub fn cells(&self) -> &[CellPopulation] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [CellPopulation] {
        &mut self.cells
    }

    /// Schools not attached to any cell
    pub fn elsewhere(&self) -> &[School] {
        &self.elsewhere
    }

    pub fn elsewhere_mut(&mut self) -> &mut [School] {
        &mut self.elsewhere
    }

    pub fn swarms(&self) -> &SwarmCache {
        &self.swarms
    }

    pub fn swarms_mut(&mut self) -> &mut SwarmCache {
        &mut self.swarms
    }

    /// Split borrow handed to the workers: the cell populations next to the
    /// swarm slots of the same ocean cells.
    pub fn parts_mut(
        &mut self,
    ) -> (
        &mut [CellPopulation],
        &[SwarmTemplate],
        &mut [Option<Vec<Swarm>>],
    ) {
        let (templates, slots) = self.swarms.parts_mut();
        (&mut self.cells, templates, slots)
    }

    /// Number of schools in each ocean cell
    pub fn school_counts(&self) -> Vec<usize> {
        self.cells.iter().map(CellPopulation::len).collect()
    }

    pub fn schools(&self) -> impl Iterator<Item = &School> {
        self.cells
            .iter()
            .flat_map(|c| c.schools.iter())
            .chain(self.elsewhere.iter())
    }

    pub fn schools_mut(&mut self) -> impl Iterator<Item = &mut School> {
        self.cells
            .iter_mut()
            .flat_map(|c| c.schools.iter_mut())
            .chain(self.elsewhere.iter_mut())
    }

    pub fn n_schools(&self) -> usize {
        self.cells.iter().map(CellPopulation::len).sum::<usize>() + self.elsewhere.len()
    }

    /// Instantaneous biomass of every school, summed by species
    pub fn biomass_by_species(&self, n_species: usize) -> Vec<f64> {
        let mut totals = vec![0.0; n_species];
        for school in self.schools() {
            if let Some(total) = totals.get_mut(school.species) {
                *total += school.instantaneous_biomass();
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::MortalityCause;

    fn domain() -> Domain {
        let grid = Grid::with_land(3, 1, vec![false, true, false]);
        Domain::new(grid, Vec::new())
    }

    #[test]
    fn test_schools_routed_by_cell() {
        let mut domain = domain();
        domain.add_school(School::new(0, 0, 10.0, 1.0, 5.0, 1, Location::Cell(2)));
        domain.add_school(School::new(1, 0, 10.0, 1.0, 5.0, 1, Location::Cell(1)));
        domain.add_school(School::new(2, 0, 10.0, 1.0, 5.0, 1, Location::OutOfDomain));

        assert_eq!(domain.school_counts(), vec![0, 1]);
        assert_eq!(domain.cells()[1].cell(), 2);
        assert_eq!(domain.elsewhere().len(), 2);
        assert_eq!(domain.elsewhere()[0].location, Location::OffGrid);
        assert_eq!(domain.n_schools(), 3);
        assert_eq!(domain.next_school_id(), 3);
    }

    #[test]
    fn test_remove_dead() {
        let mut domain = domain();
        domain.add_school(School::new(0, 0, 10.0, 1.0, 5.0, 1, Location::Cell(0)));
        domain.add_school(School::new(1, 0, 10.0, 1.0, 5.0, 9, Location::Cell(0)));
        domain.add_school(School::new(2, 1, 10.0, 1.0, 5.0, 1, Location::Cell(2)));
        for school in domain.schools_mut().filter(|s| s.species == 1) {
            school.record_death(MortalityCause::Starvation, 10.0);
        }

        let removed = domain.remove_dead(|_| 5);

        assert_eq!(removed, 2);
        assert_eq!(domain.schools().map(|s| s.id).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_drain_empties_cells() {
        let mut domain = domain();
        domain.add_school(School::new(0, 0, 10.0, 1.0, 5.0, 1, Location::Cell(0)));
        domain.add_school(School::new(1, 0, 10.0, 1.0, 5.0, 1, Location::OffGrid));

        let schools = domain.drain_schools();

        assert_eq!(schools.len(), 2);
        assert_eq!(domain.n_schools(), 0);
        assert_eq!(domain.cells().len(), 2);
    }
}

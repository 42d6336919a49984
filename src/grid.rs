//! Spatial grid: land/ocean cells and the ocean-cell ordering.
//!
//! Cells are indexed row-major (`y * nx + x`). Only ocean cells hold schools,
//! and they are walked in increasing cell index everywhere in the crate so
//! that batches are contiguous ranges of that ordering.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Regular grid of land and ocean cells
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Grid {
    nx: usize,
    ny: usize,
    land: Vec<bool>,
    /// Grid index of every ocean cell, increasing
    ocean: Vec<usize>,
    /// Position of each grid cell in `ocean`, `None` on land
    slots: Vec<Option<usize>>,
}

impl Grid {
    /// All-ocean grid
    pub fn new(nx: usize, ny: usize) -> Self {
        Self::with_land(nx, ny, vec![false; nx * ny])
    }

    /// Grid with an explicit land mask. Missing entries are ocean.
    pub fn with_land(nx: usize, ny: usize, mut land: Vec<bool>) -> Self {
        land.resize(nx * ny, false);

        let mut ocean = Vec::new();
        let mut slots = vec![None; nx * ny];
        for (cell, is_land) in land.iter().enumerate() {
            if !is_land {
                slots[cell] = Some(ocean.len());
                ocean.push(cell);
            }
        }

        Self {
            nx,
            ny,
            land,
            ocean,
            slots,
        }
    }

    /// Grid whose cells are land with probability `land_fraction`
    pub fn random<R: Rng>(nx: usize, ny: usize, land_fraction: f32, rng: &mut R) -> Self {
        let land = (0..nx * ny)
            .map(|_| rng.gen::<f32>() < land_fraction)
            .collect();
        Self::with_land(nx, ny, land)
    }

    /// Cell index of position (x, y)
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.nx && y < self.ny {
            Some(y * self.nx + x)
        } else {
            None
        }
    }

    /// Position of cell `index`
    #[inline]
    pub fn coords(&self, index: usize) -> Option<(usize, usize)> {
        if index < self.n_cells() {
            Some((index % self.nx, index / self.nx))
        } else {
            None
        }
    }

    /// Out-of-range cells count as land.
    #[inline]
    pub fn is_land(&self, cell: usize) -> bool {
        self.land.get(cell).copied().unwrap_or(true)
    }

    /// Ocean cells in increasing index order
    #[inline]
    pub fn ocean_cells(&self) -> &[usize] {
        &self.ocean
    }

    /// Position of `cell` among the ocean cells
    #[inline]
    pub fn ocean_slot(&self, cell: usize) -> Option<usize> {
        self.slots.get(cell).copied().flatten()
    }

    pub fn n_cells(&self) -> usize {
        self.nx * self.ny
    }

    pub fn n_ocean(&self) -> usize {
        self.ocean.len()
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }
}

//! Uniform 3-D bucket grid. A query visits the 3x3x3 block of cells around
//! the query point, so the cell size must be at least the search radius.

use crate::color::{dist_sq, Vec3};
use std::collections::HashMap;

type Cell = [i32; 3];

/// Smallest cell side. Color coordinates stay within a few hundred units,
/// so cell indices fit `i32` with room for the neighbor offsets.
const MIN_CELL_SIZE: f32 = 1e-3;

pub struct Grid {
    cell_size: f32,
    cells: HashMap<Cell, Vec<usize>>,
}

impl Grid {
    /// Buckets `points` by index. `cell_size` is raised to a small minimum;
    /// a larger cell still covers the same search radius.
    pub fn new(points: &[Vec3], cell_size: f32) -> Self {
        let mut grid = Self {
            cell_size: cell_size.max(MIN_CELL_SIZE),
            cells: HashMap::new(),
        };
        for (i, p) in points.iter().enumerate() {
            let cell = grid.cell_of(p);
            grid.cells.entry(cell).or_default().push(i);
        }
        grid
    }

    #[inline]
    fn cell_of(&self, p: &Vec3) -> Cell {
        p.map(|c| (c / self.cell_size).floor() as i32)
    }

    /// Calls `f` with the index of every bucketed point in the cells around
    /// `center`. Points are visited in insertion order within a cell.
    pub fn for_each_near<F>(&self, center: &Vec3, mut f: F)
    where
        F: FnMut(usize),
    {
        let [cx, cy, cz] = self.cell_of(center);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let cell = match (cx.checked_add(dx), cy.checked_add(dy), cz.checked_add(dz)) {
                        (Some(x), Some(y), Some(z)) => [x, y, z],
                        _ => continue,
                    };
                    if let Some(bucket) = self.cells.get(&cell) {
                        bucket.iter().for_each(|&i| f(i));
                    }
                }
            }
        }
    }

    /// Indices of `points` within `radius` of `center`, ascending.
    pub fn within(&self, points: &[Vec3], center: &Vec3, radius: f32) -> Vec<usize> {
        let r2 = radius * radius;
        let mut found = Vec::new();
        self.for_each_near(center, |i| {
            if dist_sq(&points[i], center) <= r2 {
                found.push(i);
            }
        });
        found.sort_unstable();
        found
    }
}

//! World generator: a stone shelf with holes, sloped ledges below it and a
//! randomly mixed sand load above it.

use crate::cell::{Material, SandVariant};
use crate::grid::{Grid, GridError, Pos};
use rand::Rng;
use std::ops::RangeInclusive;
use thiserror::Error;
use tracing::info;

/// Holes are never punched closer than this to either end of a ledge.
const HOLE_MARGIN: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum WorldGenError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("band row {band_row} must lie strictly inside a grid of height {height}")]
    BandOutOfRange { band_row: usize, height: usize },
    #[error("{name} must be within [0, 1] (got {value})")]
    Probability { name: &'static str, value: f32 },
    #[error("slope range {min}..={max} is empty")]
    SlopeRange { min: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldParams {
    pub width: usize,
    pub height: usize,
    /// Row of the stone shelf that holds the sand load.
    pub band_row: usize,
    /// Probability that an empty cell above the shelf receives sand.
    pub fill_ratio: f32,
    /// Number of sloped ledges, drawn uniformly from this range.
    pub slopes: RangeInclusive<usize>,
    /// Per ledge cell, probability of punching a two-wide hole in the shelf.
    pub hole_chance: f32,
}

impl WorldParams {
    /// Layout for a `width` x `height` world with the shelf a third of the way down.
    pub fn for_size(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            band_row: height / 3,
            fill_ratio: 0.7,
            slopes: 6..=8,
            hole_chance: 0.15,
        }
    }

    pub fn validate(&self) -> Result<(), WorldGenError> {
        if self.band_row == 0 || self.band_row + 1 >= self.height {
            return Err(WorldGenError::BandOutOfRange {
                band_row: self.band_row,
                height: self.height,
            });
        }
        for (name, value) in [("fill ratio", self.fill_ratio), ("hole chance", self.hole_chance)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(WorldGenError::Probability { name, value });
            }
        }
        if self.slopes.is_empty() {
            return Err(WorldGenError::SlopeRange {
                min: *self.slopes.start(),
                max: *self.slopes.end(),
            });
        }
        Ok(())
    }
}

impl Default for WorldParams {
    fn default() -> Self {
        Self::for_size(400, 300)
    }
}

/// Builds a fresh world. Every particle starts `Idle`; the simulation derives real statuses.
pub fn generate<R: Rng + ?Sized>(params: &WorldParams, rng: &mut R) -> Result<Grid, WorldGenError> {
    let mut grid = Grid::new(params.width, params.height)?;
    params.validate()?;
    let (width, height) = grid.dims();

    for x in 0..width {
        grid.fill(Pos::new(x, params.band_row), Material::Stone);
        grid.fill(Pos::new(x, height - 1), Material::Stone);
    }

    let slopes = rng.gen_range(params.slopes.clone());
    let spacing = width / (slopes + 1);
    // Ledge base rows sit in the lower middle of the world.
    let base_lo = height * 8 / 15;
    let base_span = (height / 5).max(1);
    let mut holes = 0usize;

    for i in 0..slopes {
        let start_x = i * spacing + rng.gen_range(0..(spacing / 3).max(1));
        let length = (spacing + rng.gen_range(0..20)).saturating_sub(10);
        let base_y = (base_lo + rng.gen_range(0..base_span)) as f64;
        let mut angle = rng.gen_range(0.0..1.0);
        if rng.gen_bool(0.5) {
            angle = -angle;
        }

        for dx in 0..length {
            let x = start_x + dx;
            if x >= width {
                continue;
            }
            let y = (base_y + dx as f64 * angle) as isize;
            let on_ledge = usize::try_from(y)
                .ok()
                .filter(|&y| y > params.band_row && y < height - 1);
            if let Some(y) = on_ledge {
                grid.fill(Pos::new(x, y), Material::Stone);
            }

            let inner = dx > HOLE_MARGIN && dx + HOLE_MARGIN < length;
            if rng.gen_range(0.0f32..1.0) < params.hole_chance && inner {
                for hx in [x, x + 1].into_iter().filter(|hx| *hx < width) {
                    grid.fill(Pos::new(hx, params.band_row), Material::Empty);
                }
                holes += 1;
            }
        }
    }

    for y in 0..params.band_row {
        for x in 0..width {
            let pos = Pos::new(x, y);
            let vacant = grid.get(pos).is_some_and(|c| c.is_empty());
            if vacant && rng.gen_range(0.0f32..1.0) < params.fill_ratio {
                let variant = SandVariant::ALL[rng.gen_range(0..SandVariant::ALL.len())];
                grid.fill(pos, Material::Sand(variant));
            }
        }
    }

    info!(
        width,
        height,
        slopes,
        holes,
        sand = grid.sand_count(),
        "world generated"
    );
    Ok(grid)
}

//! Occupancy grid: fixed-size row-major array of cells. y = 0 is the top row.

use crate::cell::{Cell, Material};
use thiserror::Error;

/// Largest accepted side length. Keeps `width * height` and signed offsets comfortably in range.
pub const MAX_SIDE: usize = 1 << 14;

/// Grid coordinate. Always in bounds for the grid that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    #[inline]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("grid dimensions must be non-zero (got {width}x{height})")]
    Empty { width: usize, height: usize },
    #[error("grid side {0} exceeds the maximum of {MAX_SIDE}")]
    TooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::Empty { width, height });
        }
        if let Some(side) = [width, height].into_iter().find(|s| *s > MAX_SIDE) {
            return Err(GridError::TooLarge(side));
        }
        Ok(Self {
            width,
            height,
            cells: vec![Cell::EMPTY; width * height],
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn contains(&self, pos: Pos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Checked signed offset from `pos`; `None` when it leaves the grid.
    #[inline]
    pub fn offset(&self, pos: Pos, dx: isize, dy: isize) -> Option<Pos> {
        let x = pos.x.checked_add_signed(dx)?;
        let y = pos.y.checked_add_signed(dy)?;
        let p = Pos::new(x, y);
        self.contains(p).then_some(p)
    }

    /// The cell directly below, if there is a row below.
    #[inline]
    pub fn below(&self, pos: Pos) -> Option<Pos> {
        self.offset(pos, 0, 1)
    }

    #[inline]
    fn index(&self, pos: Pos) -> usize {
        pos.y * self.width + pos.x
    }

    #[inline]
    pub fn get(&self, pos: Pos) -> Option<&Cell> {
        if !self.contains(pos) {
            return None;
        }
        self.cells.get(self.index(pos))
    }

    #[inline]
    pub fn get_mut(&mut self, pos: Pos) -> Option<&mut Cell> {
        if !self.contains(pos) {
            return None;
        }
        let i = self.index(pos);
        self.cells.get_mut(i)
    }

    /// Out-of-range writes are dropped (and trip a debug assertion).
    #[inline]
    pub fn set(&mut self, pos: Pos, cell: Cell) {
        debug_assert!(self.contains(pos), "write outside grid at {pos:?}");
        if let Some(slot) = self.get_mut(pos) {
            *slot = cell;
        }
    }

    /// Places `material` with the default status for it (stone fixed, sand idle).
    pub fn fill(&mut self, pos: Pos, material: Material) {
        self.set(pos, Cell::of(material));
    }

    /// Clears the slot and returns what was there.
    pub fn take(&mut self, pos: Pos) -> Option<Cell> {
        let slot = self.get_mut(pos)?;
        Some(std::mem::replace(slot, Cell::EMPTY))
    }

    /// True only for an in-bounds Empty slot; off-grid counts as impassable.
    #[inline]
    pub fn is_empty_at(&self, pos: Option<Pos>) -> bool {
        pos.and_then(|p| self.get(p)).is_some_and(Cell::is_empty)
    }

    /// True when `pos` has an occupied cell below it, or no row below at all.
    #[inline]
    pub fn is_supported(&self, pos: Pos) -> bool {
        !self.is_empty_at(self.below(pos))
    }

    /// Row-major iteration with coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (Pos, &Cell)> + '_ {
        let w = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, c)| (Pos::new(i % w, i / w), c))
    }

    /// Number of slots holding a sand variant.
    pub fn sand_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_sand()).count()
    }

    /// Builds a grid from rows of characters: `.` empty, `#` stone, `0`..`5` sand.
    /// Unknown characters are treated as empty. Rows shorter than the first are padded.
    pub fn from_ascii(rows: &[&str]) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.chars().count());
        let mut grid = Self::new(width, height)?;
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().take(width).enumerate() {
                let material = match ch {
                    '#' => Material::Stone,
                    d @ '0'..='9' => d
                        .to_digit(10)
                        .and_then(|n| crate::cell::SandVariant::new(n as u8))
                        .map_or(Material::Empty, Material::Sand),
                    _ => Material::Empty,
                };
                grid.fill(Pos::new(x, y), material);
            }
        }
        Ok(grid)
    }

    /// Inverse of [`Grid::from_ascii`], one string per row.
    pub fn to_ascii(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| match self.cells[self.index(Pos::new(x, y))].material {
                        Material::Empty => '.',
                        Material::Stone => '#',
                        Material::Sand(v) => char::from(b'0' + v.id()),
                    })
                    .collect()
            })
            .collect()
    }
}

//! Tick driver: the simulation context that owns the grid, the active set,
//! the iteration counter and the random stream.

use crate::active::{ActiveSet, WAKE_OFFSETS};
use crate::cell::{Cell, Material, SAND_VARIANTS, Status};
use crate::grid::{Grid, Pos};
use crate::rng::{RandomSource, SeededRandom};
use crate::rules::{self, Transition};
use tracing::{debug, info, trace};

/// Settled cells are swept for disturbances every this many ticks.
pub const RESCAN_INTERVAL: u64 = 60;

/// Read-only counters for diagnostics and rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    pub iteration: u64,
    pub active: usize,
    pub sand: usize,
    pub stone: usize,
    /// Sand particles per status, indexed like [`Status::ALL`].
    pub by_status: [usize; 6],
    pub by_variant: [usize; SAND_VARIANTS],
}

impl SimStats {
    pub fn count(&self, status: Status) -> usize {
        Status::ALL
            .iter()
            .position(|s| *s == status)
            .map_or(0, |i| self.by_status[i])
    }
}

#[derive(Debug, Clone)]
pub struct Simulation<R = SeededRandom> {
    grid: Grid,
    /// Coordinates to evaluate on the next tick.
    active: ActiveSet,
    iteration: u64,
    rng: R,
}

impl<R: RandomSource> Simulation<R> {
    /// Wraps a generated world. Call [`Simulation::initialize`] before ticking.
    pub fn new(grid: Grid, rng: R) -> Self {
        let (w, h) = grid.dims();
        Self {
            grid,
            active: ActiveSet::new(w, h),
            iteration: 0,
            rng,
        }
    }

    /// Computes every particle's starting status, bottom row upward, and seeds the active set.
    pub fn initialize(&mut self) {
        let (w, h) = self.grid.dims();
        for y in (0..h).rev() {
            for x in 0..w {
                let pos = Pos::new(x, y);
                if self.grid.get(pos).is_some_and(Cell::is_sand) {
                    self.refresh(pos);
                }
            }
        }
        info!(
            width = w,
            height = h,
            sand = self.grid.sand_count(),
            active = self.active.len(),
            "simulation initialized"
        );
    }

    /// Advances one tick: drains the pending set, then every
    /// [`RESCAN_INTERVAL`] ticks sweeps settled cells.
    pub fn tick(&mut self) {
        self.iteration += 1;
        let iteration = self.iteration;
        // Detached from the set that collects next tick's work.
        let current = self.active.take();
        let evaluated = current.len();

        for pos in current {
            match self.grid.get(pos) {
                // Already evaluated, or arrived here by a move this tick.
                Some(c) if c.is_sand() && c.last_checked == iteration => continue,
                Some(_) => {}
                None => continue,
            }
            let transition = rules::step(&self.grid, pos, &mut self.rng);
            self.apply(pos, transition);
        }

        if iteration % RESCAN_INTERVAL == 0 {
            let woken = self.rescan_settled();
            if woken > 0 {
                debug!(iteration, woken, "rescan woke settled cells");
            }
        }

        trace!(iteration, evaluated, next = self.active.len(), "tick");
    }

    /// Runs `ticks` ticks back to back.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    fn apply(&mut self, pos: Pos, transition: Transition) {
        let iteration = self.iteration;
        match transition {
            Transition::Skip => {}
            Transition::Rest(mut cell) => {
                cell.last_checked = iteration;
                self.grid.set(pos, cell);
            }
            Transition::Hold(mut cell) => {
                cell.last_checked = iteration;
                self.grid.set(pos, cell);
                self.active.insert(pos);
            }
            Transition::Reactivate(mut cell) => {
                cell.last_checked = iteration;
                self.grid.set(pos, cell);
                self.refresh(pos);
            }
            Transition::Move { to, mut cell } => {
                if !self.grid.is_empty_at(Some(to)) {
                    // Blocked: leave the particle as it was and try again next tick.
                    debug!(from = ?pos, ?to, "move target occupied");
                    self.active.insert(pos);
                    return;
                }
                cell.last_checked = iteration;
                self.grid.set(pos, Cell::EMPTY);
                self.grid.set(to, cell);
                self.active.insert(to);
                self.wake_neighbors(pos);
                self.wake_neighbors(to);
            }
        }
    }

    /// Re-derives the status at `pos` and schedules it when it needs evaluating.
    fn refresh(&mut self, pos: Pos) {
        if let Some(cell) = rules::refresh(&self.grid, pos, &mut self.rng) {
            self.grid.set(pos, cell);
            self.active.insert(pos);
        }
    }

    /// Idle or settled sand above and beside `pos` may have lost support or gained room.
    fn wake_neighbors(&mut self, pos: Pos) {
        for (dx, dy) in WAKE_OFFSETS {
            let Some(n) = self.grid.offset(pos, dx, dy) else {
                continue;
            };
            let wakeable = self
                .grid
                .get(n)
                .is_some_and(|c| c.is_sand() && matches!(c.status, Status::Idle | Status::Settled));
            if wakeable {
                self.refresh(n);
            }
        }
    }

    /// Wakes every settled particle whose surroundings changed. Returns how many woke.
    fn rescan_settled(&mut self) -> usize {
        let (w, h) = self.grid.dims();
        let mut woken = 0;
        for y in (0..h).rev() {
            for x in 0..w {
                let pos = Pos::new(x, y);
                let settled = self
                    .grid
                    .get(pos)
                    .is_some_and(|c| c.is_sand() && c.status == Status::Settled);
                if !settled || !rules::has_environment_changed(&self.grid, pos) {
                    continue;
                }
                if let Some(cell) = self.grid.get_mut(pos) {
                    cell.status = Status::Idle;
                    cell.stable_frames = 0;
                }
                self.refresh(pos);
                woken += 1;
            }
        }
        woken
    }

    /// Writes `material` at `pos`, replacing whatever was there. Sand starts idle and is
    /// evaluated on the next tick. Returns `false` when `pos` is off the grid.
    pub fn place(&mut self, pos: Pos, material: Material) -> bool {
        if !self.grid.contains(pos) {
            return false;
        }
        self.grid.fill(pos, material);
        if material.is_sand() {
            self.refresh(pos);
        }
        true
    }

    /// Clears `pos` without waking anything; only the periodic rescan notices.
    /// Returns the removed cell, or `None` if it was empty or off the grid.
    pub fn remove(&mut self, pos: Pos) -> Option<Cell> {
        self.grid.take(pos).filter(|c| !c.is_empty())
    }

    /// Queues `pos` for evaluation on the next tick. Off-grid positions are ignored.
    pub fn schedule(&mut self, pos: Pos) -> bool {
        self.active.insert(pos)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, pos: Pos) -> bool {
        self.active.contains(pos)
    }

    pub fn active_positions(&self) -> impl Iterator<Item = Pos> + '_ {
        self.active.iter()
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    pub fn stats(&self) -> SimStats {
        let mut stats = SimStats {
            iteration: self.iteration,
            active: self.active.len(),
            ..SimStats::default()
        };
        for (_, cell) in self.grid.iter() {
            match cell.material {
                Material::Empty => {}
                Material::Stone => stats.stone += 1,
                Material::Sand(v) => {
                    stats.sand += 1;
                    stats.by_variant[usize::from(v.id())] += 1;
                    if let Some(i) = Status::ALL.iter().position(|s| *s == cell.status) {
                        stats.by_status[i] += 1;
                    }
                }
            }
        }
        stats
    }
}

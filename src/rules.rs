//! Cell state machine and movement eligibility.
//!
//! Every handler is a pure function of the live grid (read only), the cell's
//! coordinate and the random stream. It returns a [`Transition`]; the tick
//! driver in [`crate::sim`] applies it and does all scheduling.

use crate::cell::{Cell, Status};
use crate::grid::{Grid, Pos};
use crate::rng::RandomSource;

/// Idle ticks after which a particle may go dormant.
pub const SETTLE_THRESHOLD: u32 = 60;
/// Probability of going dormant once past [`SETTLE_THRESHOLD`].
pub const SETTLE_CHANCE: f32 = 0.9;
/// Probability that an idle particle with a legal roll actually wakes up.
pub const IDLE_WAKE_CHANCE: f32 = 0.3;
/// Past this many stable frames the roll chance is halved.
pub const DORMANT_ROLL_THRESHOLD: u32 = 10;
/// Probability of keeping the previous roll direction when both sides are open.
pub const ROLL_MOMENTUM: f32 = 0.6;

/// Result of evaluating one active coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to evaluate here.
    Skip,
    /// Write the cell back; it leaves the active set.
    Rest(Cell),
    /// Write the cell back and evaluate it again next tick.
    Hold(Cell),
    /// Write the cell back, then re-derive its status via [`refresh`] and schedule it.
    Reactivate(Cell),
    /// Vacate the source and write `cell` at `to`.
    Move { to: Pos, cell: Cell },
}

/// Evaluates the particle at `pos` according to its status.
pub fn step<R: RandomSource + ?Sized>(grid: &Grid, pos: Pos, rng: &mut R) -> Transition {
    debug_assert!(grid.contains(pos), "active coordinate {pos:?} outside grid");
    let Some(&cell) = grid.get(pos) else {
        return Transition::Skip;
    };
    if !cell.is_sand() {
        return Transition::Skip;
    }
    match cell.status {
        Status::Idle => idle(grid, pos, cell, rng),
        Status::Falling => falling(grid, pos, cell, rng),
        Status::Rolling => rolling(grid, pos, cell, rng),
        Status::PendingRoll => pending_roll(grid, pos, cell, rng),
        Status::Fixed | Status::Settled => Transition::Skip,
    }
}

fn idle<R: RandomSource + ?Sized>(grid: &Grid, pos: Pos, mut cell: Cell, rng: &mut R) -> Transition {
    cell.stable_frames = cell.stable_frames.saturating_add(1);

    if cell.stable_frames > SETTLE_THRESHOLD {
        if rng.chance(SETTLE_CHANCE) {
            return Transition::Rest(Cell { status: Status::Settled, ..cell });
        }
        return Transition::Hold(cell);
    }

    let wake = grid.is_empty_at(grid.below(pos))
        || (can_roll(grid, pos, &cell, rng) && rng.chance(IDLE_WAKE_CHANCE));
    if wake {
        cell.stable_frames = 0;
        return Transition::Reactivate(cell);
    }
    Transition::Hold(cell)
}

fn falling<R: RandomSource + ?Sized>(grid: &Grid, pos: Pos, mut cell: Cell, rng: &mut R) -> Transition {
    let Some(below) = grid.below(pos) else {
        return Transition::Rest(cell.into_idle());
    };

    let delay = cell.material.config().map_or(0, |c| c.fall_delay);
    cell.fall_counter = cell.fall_counter.saturating_add(1);
    if cell.fall_counter <= delay {
        return Transition::Hold(cell);
    }

    if grid.is_empty_at(Some(below)) {
        // A fall ends any roll episode.
        let moved = Cell {
            status: Status::Falling,
            roll_count: 0,
            last_roll_dir: 0,
            stable_frames: 0,
            fall_counter: 0,
            ..cell
        };
        return Transition::Move { to: below, cell: moved };
    }

    cell.fall_counter = 0;
    if can_roll(grid, pos, &cell, rng) {
        Transition::Hold(Cell { status: Status::Rolling, stable_frames: 0, ..cell })
    } else {
        Transition::Hold(cell.into_idle())
    }
}

fn pending_roll<R: RandomSource + ?Sized>(grid: &Grid, pos: Pos, cell: Cell, rng: &mut R) -> Transition {
    let status = if can_roll(grid, pos, &cell, rng) { Status::Rolling } else { Status::Idle };
    Transition::Hold(Cell { status, stable_frames: 0, ..cell })
}

fn rolling<R: RandomSource + ?Sized>(grid: &Grid, pos: Pos, cell: Cell, rng: &mut R) -> Transition {
    if cell.roll_count >= cell.max_rolls() {
        return Transition::Hold(cell.into_idle());
    }

    let dirs = viable_directions(grid, pos, &cell);
    let dir = match dirs.as_slice() {
        [] => return Transition::Hold(cell.into_idle()),
        [only] => *only,
        both => {
            let last = cell.last_roll_dir;
            if last != 0 && both.contains(&last) && rng.chance(ROLL_MOMENTUM) {
                last
            } else {
                both[rng.next_index(both.len())]
            }
        }
    };

    let Some(to) = grid.offset(pos, isize::from(dir), 0) else {
        return Transition::Hold(cell.into_idle());
    };
    let moved = Cell {
        status: Status::Falling,
        roll_count: cell.roll_count + 1,
        last_roll_dir: dir,
        stable_frames: 0,
        fall_counter: 0,
        ..cell
    };
    Transition::Move { to, cell: moved }
}

/// Lateral directions (`-1` left, `+1` right) the particle could roll into right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Directions {
    dirs: [i8; 2],
    len: usize,
}

impl Directions {
    fn push(&mut self, dir: i8) {
        self.dirs[self.len] = dir;
        self.len += 1;
    }

    pub fn as_slice(&self) -> &[i8] {
        &self.dirs[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Left is checked before right, which fixes the index space for uniform picks.
pub fn viable_directions(grid: &Grid, pos: Pos, cell: &Cell) -> Directions {
    let mut dirs = Directions::default();
    for dir in [-1i8, 1] {
        let to_x = pos.x as isize + isize::from(dir);
        if can_roll_to(grid, pos, cell.fluidity, to_x) {
            dirs.push(dir);
        }
    }
    dirs
}

/// Whether `cell` at `pos` may start a roll this evaluation. Consumes one draw
/// once the particle is known to be blocked below.
pub fn can_roll<R: RandomSource + ?Sized>(grid: &Grid, pos: Pos, cell: &Cell, rng: &mut R) -> bool {
    let Some(config) = cell.material.config() else {
        return false;
    };
    // Rolling only happens when a fall is blocked; the bottom row never rolls.
    let Some(below) = grid.below(pos) else {
        return false;
    };
    if grid.is_empty_at(Some(below)) {
        return false;
    }

    let mut chance = config.roll_chance;
    if cell.stable_frames > DORMANT_ROLL_THRESHOLD {
        chance *= 0.5;
    }
    if rng.next_f32() > chance {
        return false;
    }

    !viable_directions(grid, pos, cell).is_empty()
}

/// Lateral reachability of column `to_x` on the row of `from`.
///
/// The target must be in bounds and Empty. With `fluidity > 2` there must also
/// be, within `fluidity` cells beyond the target, an Empty cell that is resting
/// on something (or on the floor). Otherwise the roll would just be a fall.
pub fn can_roll_to(grid: &Grid, from: Pos, fluidity: u8, to_x: isize) -> bool {
    let Ok(tx) = usize::try_from(to_x) else {
        return false;
    };
    let target = Pos::new(tx, from.y);
    if !grid.is_empty_at(Some(target)) {
        return false;
    }
    if fluidity <= 2 {
        return true;
    }

    let direction = (to_x - from.x as isize).signum();
    (1..=isize::from(fluidity)).any(|dist| {
        grid.offset(target, direction * dist, 0)
            .is_some_and(|p| grid.is_empty_at(Some(p)) && grid.is_supported(p))
    })
}

/// Re-derives the status of the sand at `pos` from its surroundings.
///
/// Settled particles are woken to Idle first. Returns `None` for non-sand and
/// for particles that are already falling or rolling; those need no scheduling.
pub fn refresh<R: RandomSource + ?Sized>(grid: &Grid, pos: Pos, rng: &mut R) -> Option<Cell> {
    let mut cell = *grid.get(pos)?;
    if !cell.is_sand() {
        return None;
    }
    if cell.status == Status::Settled {
        cell.status = Status::Idle;
        cell.stable_frames = 0;
    }
    if cell.status.is_moving() {
        return None;
    }

    if grid.is_empty_at(grid.below(pos)) {
        return Some(Cell { status: Status::Falling, stable_frames: 0, ..cell });
    }
    if can_roll(grid, pos, &cell, rng) {
        return Some(Cell { status: Status::Rolling, stable_frames: 0, ..cell });
    }
    Some(Cell { status: Status::Idle, ..cell })
}

/// Whether a settled particle should wake: its support is gone or a neighbour is moving.
pub fn has_environment_changed(grid: &Grid, pos: Pos) -> bool {
    if grid.is_empty_at(grid.below(pos)) {
        return true;
    }
    (-1..=1isize)
        .flat_map(|dy| (-1..=1isize).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| (dx, dy) != (0, 0))
        .filter_map(|(dx, dy)| grid.offset(pos, dx, dy))
        .filter_map(|p| grid.get(p))
        .any(|c| c.is_sand() && c.status.is_moving())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Material, SandVariant};
    use crate::rng::{FixedRandom, ScriptedRandom};

    /// Fails every probability check below 0.99.
    fn never() -> FixedRandom {
        FixedRandom(0.99)
    }

    /// Passes every probability check.
    fn always() -> FixedRandom {
        FixedRandom(0.0)
    }

    fn grid(rows: &[&str]) -> Grid {
        Grid::from_ascii(rows).unwrap()
    }

    fn with_status(g: &mut Grid, pos: Pos, status: Status) -> Cell {
        let c = g.get_mut(pos).unwrap();
        c.status = status;
        *c
    }

    #[test]
    fn test_can_roll_to_rejects_off_grid() {
        let g = grid(&["0..", "###"]);
        assert!(!can_roll_to(&g, Pos::new(0, 0), 1, -1));
        assert!(!can_roll_to(&g, Pos::new(0, 0), 1, 3));
        assert!(can_roll_to(&g, Pos::new(0, 0), 1, 1));
    }

    #[test]
    fn test_can_roll_to_occupied_target() {
        let g = grid(&["00.", "###"]);
        assert!(!can_roll_to(&g, Pos::new(1, 0), 1, 0));
        assert!(can_roll_to(&g, Pos::new(1, 0), 1, 2));
    }

    #[test]
    fn test_fine_sand_ignores_open_pit() {
        let pit = grid(&["...3...", "...#..."]);
        let from = Pos::new(3, 0);
        assert!(!can_roll_to(&pit, from, 3, 2));
        assert!(!can_roll_to(&pit, from, 3, 4));
        // Coarse sand does not look ahead.
        assert!(can_roll_to(&pit, from, 1, 2));

        let floor = grid(&["...3...", "#######"]);
        assert!(can_roll_to(&floor, from, 3, 2));
        assert!(can_roll_to(&floor, from, 3, 4));
    }

    #[test]
    fn test_look_ahead() {
        let g = grid(&["....3", "...##", "....."]);
        assert!(!can_roll_to(&g, Pos::new(4, 0), 3, 3));
        let g = grid(&["#....", "##..3", "#####"]);
        assert!(can_roll_to(&g, Pos::new(4, 1), 4, 3));
        // Off-grid below counts as support.
        let g = grid(&["3...."]);
        assert!(can_roll_to(&g, Pos::new(0, 0), 3, 1));
    }

    #[test]
    fn test_can_roll_needs_support() {
        let g = grid(&["..0..", ".....", "#####"]);
        let c = *g.get(Pos::new(2, 0)).unwrap();
        assert!(!can_roll(&g, Pos::new(2, 0), &c, &mut always()));

        let g = grid(&["..0..", "#####"]);
        let c = *g.get(Pos::new(2, 0)).unwrap();
        assert!(can_roll(&g, Pos::new(2, 0), &c, &mut always()));
        assert!(!can_roll(&g, Pos::new(2, 0), &c, &mut never()));
    }

    #[test]
    fn test_certain_roll_chance_passes_high_draw() {
        let g = grid(&["..4..", "#####"]);
        let c = *g.get(Pos::new(2, 0)).unwrap();
        assert!(can_roll(&g, Pos::new(2, 0), &c, &mut never()));
        let g = grid(&["..0..", "#####"]);
        let c = *g.get(Pos::new(2, 0)).unwrap();
        assert!(!can_roll(&g, Pos::new(2, 0), &c, &mut never()));
    }

    #[test]
    fn test_bottom_row_never_rolls() {
        let g = grid(&[".0."]);
        let c = *g.get(Pos::new(1, 0)).unwrap();
        assert!(!can_roll(&g, Pos::new(1, 0), &c, &mut always()));
    }

    #[test]
    fn test_dormant_particles_roll_less() {
        let g = grid(&[".0.", "###"]);
        let mut c = *g.get(Pos::new(1, 0)).unwrap();
        // 0.5 passes the 0.8 base chance but not the halved 0.4.
        assert!(can_roll(&g, Pos::new(1, 0), &c, &mut FixedRandom(0.5)));
        c.stable_frames = DORMANT_ROLL_THRESHOLD + 1;
        assert!(!can_roll(&g, Pos::new(1, 0), &c, &mut FixedRandom(0.5)));
    }

    #[test]
    fn test_falling_waits_for_delay() {
        // Variant 3 has fall delay 2: two holds, then a move.
        let mut g = grid(&["3", ".", "#"]);
        let pos = Pos::new(0, 0);
        with_status(&mut g, pos, Status::Falling);
        let mut rng = never();
        for expected in 1..=2u8 {
            match step(&g, pos, &mut rng) {
                Transition::Hold(c) => {
                    assert_eq!(c.fall_counter, expected);
                    g.set(pos, c);
                }
                other => panic!("expected hold, got {other:?}"),
            }
        }
        match step(&g, pos, &mut rng) {
            Transition::Move { to, cell } => {
                assert_eq!(to, Pos::new(0, 1));
                assert_eq!(cell.fall_counter, 0);
                assert_eq!(cell.status, Status::Falling);
                assert_eq!(cell.material, Material::Sand(SandVariant::ALL[3]));
            }
            other => panic!("expected move, got {other:?}"),
        }
    }

    #[test]
    fn test_falling_on_bottom_row_rests() {
        let mut g = grid(&[".", "0"]);
        let pos = Pos::new(0, 1);
        with_status(&mut g, pos, Status::Falling);
        assert!(matches!(
            step(&g, pos, &mut never()),
            Transition::Rest(c) if c.status == Status::Idle
        ));
    }

    #[test]
    fn test_blocked_fall_turns_to_roll_or_idle() {
        let mut g = grid(&["..0..", "#####"]);
        let pos = Pos::new(2, 0);
        with_status(&mut g, pos, Status::Falling);
        assert!(matches!(
            step(&g, pos, &mut always()),
            Transition::Hold(c) if c.status == Status::Rolling
        ));
        assert!(matches!(
            step(&g, pos, &mut never()),
            Transition::Hold(c) if c.status == Status::Idle
        ));
    }

    #[test]
    fn test_roll_cap_forces_idle() {
        let mut g = grid(&["..0..", "#####"]);
        let pos = Pos::new(2, 0);
        let mut c = with_status(&mut g, pos, Status::Rolling);
        c.roll_count = c.max_rolls();
        c.last_roll_dir = 1;
        g.set(pos, c);
        match step(&g, pos, &mut always()) {
            Transition::Hold(c) => {
                assert_eq!(c.status, Status::Idle);
                assert_eq!((c.roll_count, c.last_roll_dir), (0, 0));
            }
            other => panic!("expected hold, got {other:?}"),
        }
    }

    #[test]
    fn test_roll_prefers_momentum() {
        let mut g = grid(&["..1..", "#####"]);
        let pos = Pos::new(2, 0);
        let mut c = with_status(&mut g, pos, Status::Rolling);
        c.last_roll_dir = 1;
        g.set(pos, c);
        // 0.5 < 0.6 keeps going right.
        let mut rng = ScriptedRandom::new(vec![0.5], vec![0]);
        match step(&g, pos, &mut rng) {
            Transition::Move { to, cell } => {
                assert_eq!(to, Pos::new(3, 0));
                assert_eq!(cell.last_roll_dir, 1);
                assert_eq!(cell.roll_count, 1);
                assert_eq!(cell.status, Status::Falling);
            }
            other => panic!("expected move, got {other:?}"),
        }
        // 0.7 breaks momentum; index 0 picks left.
        let mut rng = ScriptedRandom::new(vec![0.7], vec![0]);
        assert!(matches!(
            step(&g, pos, &mut rng),
            Transition::Move { to, .. } if to == Pos::new(1, 0)
        ));
    }

    #[test]
    fn test_roll_single_side() {
        let mut g = grid(&["#.0#", "####"]);
        let pos = Pos::new(2, 0);
        with_status(&mut g, pos, Status::Rolling);
        assert!(matches!(
            step(&g, pos, &mut never()),
            Transition::Move { to, .. } if to == Pos::new(1, 0)
        ));
        let mut g = grid(&["#0#", "###"]);
        with_status(&mut g, Pos::new(1, 0), Status::Rolling);
        assert!(matches!(
            step(&g, Pos::new(1, 0), &mut always()),
            Transition::Hold(c) if c.status == Status::Idle
        ));
    }

    #[test]
    fn test_pending_roll() {
        let mut g = grid(&["..0..", "#####"]);
        let pos = Pos::new(2, 0);
        with_status(&mut g, pos, Status::PendingRoll);
        assert!(matches!(
            step(&g, pos, &mut always()),
            Transition::Hold(c) if c.status == Status::Rolling
        ));
        assert!(matches!(
            step(&g, pos, &mut never()),
            Transition::Hold(c) if c.status == Status::Idle
        ));
    }

    #[test]
    fn test_idle_accumulates_then_settles() {
        let mut g = grid(&["#0#", "###"]);
        let pos = Pos::new(1, 0);
        let mut c = *g.get(pos).unwrap();
        c.stable_frames = SETTLE_THRESHOLD - 1;
        g.set(pos, c);
        let c = match step(&g, pos, &mut always()) {
            Transition::Hold(c) => c,
            other => panic!("expected hold, got {other:?}"),
        };
        assert_eq!(c.stable_frames, SETTLE_THRESHOLD);
        g.set(pos, c);
        assert!(matches!(
            step(&g, pos, &mut never()),
            Transition::Hold(c) if c.status == Status::Idle
        ));
        assert!(matches!(
            step(&g, pos, &mut always()),
            Transition::Rest(c) if c.status == Status::Settled
        ));
    }

    #[test]
    fn test_idle_wakes_when_unsupported() {
        let g = grid(&["0", ".", "#"]);
        assert!(matches!(
            step(&g, Pos::new(0, 0), &mut never()),
            Transition::Reactivate(c) if c.stable_frames == 0
        ));
    }

    #[test]
    fn test_idle_wakes_on_roll_draw() {
        let g = grid(&[".0.", "###"]);
        let pos = Pos::new(1, 0);
        // First draw passes the 0.8 roll chance, second is the 0.3 wake draw.
        let mut rng = ScriptedRandom::new(vec![0.1, 0.2], vec![0]);
        assert!(matches!(
            step(&g, pos, &mut rng),
            Transition::Reactivate(c) if c.stable_frames == 0
        ));
        let mut rng = ScriptedRandom::new(vec![0.1, 0.5], vec![0]);
        assert!(matches!(
            step(&g, pos, &mut rng),
            Transition::Hold(c) if c.status == Status::Idle && c.stable_frames == 1
        ));
    }

    #[test]
    fn test_non_sand_and_dormant_skip() {
        let mut g = grid(&["#0", "##"]);
        assert_eq!(step(&g, Pos::new(0, 0), &mut always()), Transition::Skip);
        with_status(&mut g, Pos::new(1, 0), Status::Settled);
        assert_eq!(step(&g, Pos::new(1, 0), &mut always()), Transition::Skip);
    }

    #[test]
    fn test_refresh() {
        let mut g = grid(&["0.", "0.", "##"]);
        assert_eq!(refresh(&g, Pos::new(0, 0), &mut never()).unwrap().status, Status::Idle);
        g.take(Pos::new(0, 1));
        assert_eq!(refresh(&g, Pos::new(0, 0), &mut never()).unwrap().status, Status::Falling);
        with_status(&mut g, Pos::new(0, 0), Status::Rolling);
        assert_eq!(refresh(&g, Pos::new(0, 0), &mut never()), None);
        assert_eq!(refresh(&g, Pos::new(0, 2), &mut never()), None);
    }

    #[test]
    fn test_refresh_wakes_settled() {
        let mut g = grid(&["#0#", "###"]);
        let pos = Pos::new(1, 0);
        let mut c = with_status(&mut g, pos, Status::Settled);
        c.stable_frames = 90;
        g.set(pos, c);
        let r = refresh(&g, pos, &mut always()).unwrap();
        assert_eq!(r.status, Status::Idle);
        assert_eq!(r.stable_frames, 0);
    }

    #[test]
    fn test_environment_change() {
        let mut g = grid(&["...", ".0.", "###"]);
        let pos = Pos::new(1, 1);
        assert!(!has_environment_changed(&g, pos));
        g.fill(Pos::new(0, 0), Material::Sand(SandVariant::ALL[0]));
        assert!(!has_environment_changed(&g, pos));
        with_status(&mut g, Pos::new(0, 0), Status::Falling);
        assert!(has_environment_changed(&g, pos));
        let g = grid(&[".0.", "...", "###"]);
        assert!(has_environment_changed(&g, Pos::new(1, 0)));
    }
}

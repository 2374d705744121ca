//! Active-set scheduler: the sparse list of coordinates evaluated next tick.
//!
//! Insertion order is kept so a seeded run replays identically; a membership
//! bitmap drops duplicate inserts in O(1).

use crate::grid::Pos;

/// Offsets woken around a move: the three cells above and the two beside.
pub const WAKE_OFFSETS: [(isize, isize); 5] = [(0, -1), (-1, -1), (1, -1), (-1, 0), (1, 0)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSet {
    width: usize,
    height: usize,
    order: Vec<Pos>,
    queued: Vec<bool>,
}

impl ActiveSet {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            order: Vec::new(),
            queued: vec![false; width * height],
        }
    }

    #[inline]
    fn slot(&self, pos: Pos) -> Option<usize> {
        (pos.x < self.width && pos.y < self.height).then(|| pos.y * self.width + pos.x)
    }

    /// Adds `pos` unless it is already queued. Out-of-bounds positions are dropped.
    /// Returns whether the position was newly added.
    pub fn insert(&mut self, pos: Pos) -> bool {
        let Some(i) = self.slot(pos) else {
            return false;
        };
        if self.queued[i] {
            return false;
        }
        self.queued[i] = true;
        self.order.push(pos);
        true
    }

    #[inline]
    pub fn contains(&self, pos: Pos) -> bool {
        self.slot(pos).is_some_and(|i| self.queued[i])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Pos> + '_ {
        self.order.iter().copied()
    }

    /// Empties the set and returns its entries in insertion order.
    pub fn take(&mut self) -> Vec<Pos> {
        for p in &self.order {
            self.queued[p.y * self.width + p.x] = false;
        }
        std::mem::take(&mut self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_and_order() {
        let mut a = ActiveSet::new(4, 4);
        assert!(a.insert(Pos::new(2, 1)));
        assert!(a.insert(Pos::new(0, 3)));
        assert!(!a.insert(Pos::new(2, 1)));
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![Pos::new(2, 1), Pos::new(0, 3)]);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_out_of_bounds_dropped() {
        let mut a = ActiveSet::new(2, 2);
        assert!(!a.insert(Pos::new(2, 0)));
        assert!(!a.insert(Pos::new(0, 2)));
        assert!(a.is_empty());
        assert!(!a.contains(Pos::new(5, 5)));
    }

    #[test]
    fn test_take_resets_membership() {
        let mut a = ActiveSet::new(3, 3);
        a.insert(Pos::new(1, 1));
        let drained = a.take();
        assert_eq!(drained, vec![Pos::new(1, 1)]);
        assert!(!a.contains(Pos::new(1, 1)));
        assert!(a.insert(Pos::new(1, 1)));
    }
}

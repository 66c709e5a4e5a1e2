//! A fixed-capacity set of up to 4 peer ranks, with a bitset tracking which
//! of them are still "unexplored" by the library DFS election. Modeled as a
//! small array plus a bitmap rather than a heap-allocated collection, since
//! a grid node never has more than 4 neighbors (`spec.md` §9).
use libfed_proto::Rank;

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Hash)]
pub struct Neighbors4 {
    slots: [Option<Rank>; 4],
    unexplored: u8,
}

impl Neighbors4 {
    pub fn new(up: Option<Rank>, down: Option<Rank>, left: Option<Rank>, right: Option<Rank>) -> Self {
        let slots = [up, down, left, right];
        let mut unexplored = 0u8;
        for (i, s) in slots.iter().enumerate() {
            if s.is_some() {
                unexplored |= 1 << i;
            }
        }
        Neighbors4 { slots, unexplored }
    }

    pub fn slots(&self) -> impl Iterator<Item = Rank> + '_ {
        self.slots.iter().filter_map(|s| *s)
    }

    /// Resets the unexplored set to all present neighbors.
    pub fn reset_unexplored(&mut self) {
        self.unexplored = 0;
        for (i, s) in self.slots.iter().enumerate() {
            if s.is_some() {
                self.unexplored |= 1 << i;
            }
        }
    }

    /// Removes `rank` from the unexplored set, if present.
    pub fn mark_explored(&mut self, rank: Rank) {
        for (i, s) in self.slots.iter().enumerate() {
            if *s == Some(rank) {
                self.unexplored &= !(1 << i);
            }
        }
    }

    /// Pops an arbitrary still-unexplored neighbor, marking it explored.
    pub fn pop_unexplored(&mut self) -> Option<Rank> {
        for i in 0..4 {
            if self.unexplored & (1 << i) != 0 {
                self.unexplored &= !(1 << i);
                return self.slots[i];
            }
        }
        None
    }

    pub fn has_unexplored(&self) -> bool {
        self.unexplored != 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn r(n: u32) -> Rank {
        Rank::new(n)
    }

    #[test]
    fn corner_has_two_sentinels() {
        let n = Neighbors4::new(Some(r(3)), None, None, Some(r(2)));
        assert_eq!(n.slots().count(), 2);
    }

    #[test]
    fn pop_unexplored_drains_once() {
        let mut n = Neighbors4::new(Some(r(1)), Some(r(2)), None, None);
        let mut seen = vec![];
        while let Some(x) = n.pop_unexplored() {
            seen.push(x);
        }
        seen.sort_by_key(|r| r.get());
        assert_eq!(seen, vec![r(1), r(2)]);
        assert!(!n.has_unexplored());
        assert!(n.pop_unexplored().is_none());
    }

    #[test]
    fn mark_explored_removes_single_slot() {
        let mut n = Neighbors4::new(Some(r(1)), Some(r(2)), Some(r(3)), None);
        n.mark_explored(r(2));
        assert!(n.has_unexplored());
        let popped = n.pop_unexplored();
        assert!(popped == Some(r(1)) || popped == Some(r(3)));
    }
}

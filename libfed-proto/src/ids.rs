//! Newtypes for the handful of integer identifiers the protocol passes
//! around, so a `BookId` can never be passed where a `Rank` is expected.
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Rank(u32);

impl Rank {
    pub const COORDINATOR: Rank = Rank(0);

    pub fn new(n: u32) -> Self {
        Rank(n)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zero-based logical library identifier. `rank = l_id + 1`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct LibraryId(u32);

impl LibraryId {
    pub fn new(n: u32) -> Self {
        LibraryId(n)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn rank(self) -> Rank {
        Rank(self.0 + 1)
    }

    pub fn from_rank(rank: Rank) -> Self {
        LibraryId(rank.get() - 1)
    }
}

/// Zero-based logical borrower identifier. `rank = c_id + num_libraries + 1`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct BorrowerId(u32);

impl BorrowerId {
    pub fn new(n: u32) -> Self {
        BorrowerId(n)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn rank(self, num_libraries: u32) -> Rank {
        Rank(self.0 + num_libraries + 1)
    }

    pub fn from_rank(rank: Rank, num_libraries: u32) -> Self {
        BorrowerId(rank.get() - num_libraries - 1)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct BookId(pub u32);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Cost(pub u32);

/// The federation partitions book ids across libraries by `l_id = b_id / N`.
/// This partition is a fixed invariant used by every routing decision.
pub fn owning_library(book: BookId, grid_side: u32) -> LibraryId {
    LibraryId::new(book.0 / grid_side)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn library_rank_roundtrip() {
        let lid = LibraryId::new(3);
        assert_eq!(LibraryId::from_rank(lid.rank()), lid);
    }

    #[test]
    fn borrower_rank_roundtrip() {
        let bid = BorrowerId::new(2);
        let rank = bid.rank(4);
        assert_eq!(rank.get(), 7);
        assert_eq!(BorrowerId::from_rank(rank, 4), bid);
    }

    #[test]
    fn owning_library_partition() {
        // N = 2: books 0,1 -> library 0; books 2,3 -> library 1.
        assert_eq!(owning_library(BookId(0), 2), LibraryId::new(0));
        assert_eq!(owning_library(BookId(1), 2), LibraryId::new(0));
        assert_eq!(owning_library(BookId(2), 2), LibraryId::new(1));
        assert_eq!(owning_library(BookId(4), 2), LibraryId::new(2));
    }
}

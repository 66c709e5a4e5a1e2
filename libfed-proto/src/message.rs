//! The wire message catalogue. `spec.md` §6 describes these as an integer
//! tag plus a space-separated text payload; we keep the same classification
//! (see [`Tag`]) but express the payload as a typed Rust enum instead of a
//! string grammar — the tag already disambiguates the classes, so a
//! reimplementation gains nothing from re-parsing strings (`spec.md` §9).
use crate::ids::{BookId, Cost, LibraryId, Rank};
use serde::{Deserialize, Serialize};

/// Integer tag catalogue, unchanged from `spec.md` §6. Kept mostly for
/// tracing/observability (`Message::tag` below derives it), since the
/// `Message` enum discriminant already carries the same information type-safely.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tag {
    Ack = 0,
    Connect = 1,
    TakeBook = 2,
    DonateBooks = 3,
    GetMostPopularBook = 4,
    CheckNumBooksLoaned = 5,
    StartLeLibr = 6,
    StartLeLoaners = 7,
    Neighbor = 8,
    ClientElect = 9,
    ClientLeaderSelected = 10,
    LeLoanersDone = 11,
    LeLibrariesDone = 12,
    LibLeader = 13,
    LibParent = 14,
    LibAlready = 15,
    FindBook = 16,
    BookRequest = 17,
    AckTb = 18,
    DoneFindBook = 19,
    DonateBooksDone = 20,
    GetPopularBkInfo = 21,
    NumBooksLoaned = 22,
    Shutdown = 23,
}

/// A borrower's best (most-loaned) book, reported during popular-book
/// aggregation. `None` signals an empty loan history (the `l_id = -1`
/// sentinel in `spec.md` §4.7).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PopularBookReport {
    pub book: BookId,
    pub loan_num: u32,
    pub cost: Cost,
    pub library: LibraryId,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Coordinator -> borrower: install `peer` as a neighbor.
    Connect { peer: Rank },
    /// Generic handshake acknowledgement (also used for `ACK_DB`/`ACK_NBL`/
    /// `ACK_BK_INFO` style bare acks that carry no payload of their own).
    Ack,

    StartLeLibr,
    StartLeLoaners,

    TakeBook { book: BookId },
    DonateBooksCmd { book: BookId, copies: u32 },
    GetMostPopularBook,
    CheckNumBooksLoan,
    Shutdown,

    /// Borrower-to-borrower neighbor installation (`NEIGHBOR <rank>`).
    Neighbor { rank: Rank },
    /// Echo election wave, upward: `ELECT`. The candidate is the sender's
    /// own rank, which the substrate already hands the receiver out of band
    /// (see `spec.md` §4.4) — no payload field duplicates it.
    Elect,
    /// Echo election result broadcast down the tree (`LE_LOANERS <rank>`).
    LeLoaners { leader: Rank },
    LeLoanersDone,

    /// DFS election: `LEADER <rank>`.
    Leader { leader: Rank },
    /// DFS election: `PARENT <rank>`.
    Parent { leader: Rank },
    /// DFS election: `ALREADY <rank>`.
    Already { leader: Rank },
    /// Root-to-leaves dissemination of the final elected leader, sent down
    /// the spanning tree the election just built. Not part of the reference
    /// tag catalogue proper, but needed so every library (not just the root)
    /// learns who to forward `FIND_BOOK` to afterwards.
    LeaderAnnounce { leader: Rank },
    /// Leader -> coordinator: election finished.
    LeLibrariesDone,

    /// Borrower -> library: `LEND_BOOK <b_id>`.
    LendBook { book: BookId },
    /// Library -> borrower: had the book (`GET_BOOK <cost>`).
    GetBook { cost: Cost },
    /// Library -> library leader: `FIND_BOOK <b_id>`.
    FindBook { book: BookId },
    /// Library leader -> library: `FOUND_BOOK <rank>`; `None` is the `-1`
    /// sentinel (not found anywhere).
    FoundBook { library: Option<Rank> },
    /// Library -> library: `BOOK_REQUEST <b_id> <client_rank>`.
    BookRequest { book: BookId, client: Rank },
    /// Transfer result, `None` book id is the `-1` sentinel.
    AckTb { book: Option<BookId>, cost: Cost },
    DoneFindBook,

    /// Leader -> library: `DONATE_BOOK <b_id> <cost>`, `copies` new stock.
    DonateBook { book: BookId, cost: Cost, copies: u32 },
    DonateBooksDone,

    /// Broadcast flood of the popular-book pass down the borrower tree.
    GetPopularBkInfoCmd,
    /// Borrower -> leader, converging back up the tree:
    /// `GET_POPULAR_BK_INFO <b_id> <loan_num> <cost> <l_id>`.
    GetPopularBkInfo { report: Option<PopularBookReport> },
    /// Borrower leader -> coordinator, with the network-wide winner.
    GetMostPopularBookDone { report: Option<PopularBookReport> },

    /// Library/borrower -> leader convergecast: `NUM_BOOKS_LOANED <n>`.
    NumBooksLoaned { count: u64 },
    CheckNumBooksLoanDone { count: u64 },
}

impl Message {
    pub fn tag(&self) -> Tag {
        use Message::*;
        match self {
            Ack => Tag::Ack,
            Connect { .. } => Tag::Connect,
            TakeBook { .. } => Tag::TakeBook,
            DonateBooksCmd { .. } => Tag::DonateBooks,
            GetMostPopularBook => Tag::GetMostPopularBook,
            CheckNumBooksLoan => Tag::CheckNumBooksLoaned,
            StartLeLibr => Tag::StartLeLibr,
            StartLeLoaners => Tag::StartLeLoaners,
            Shutdown => Tag::Shutdown,
            Neighbor { .. } => Tag::Neighbor,
            Elect => Tag::ClientElect,
            LeLoaners { .. } => Tag::ClientLeaderSelected,
            LeLoanersDone => Tag::LeLoanersDone,
            Leader { .. } => Tag::LibLeader,
            Parent { .. } => Tag::LibParent,
            Already { .. } => Tag::LibAlready,
            LeaderAnnounce { .. } => Tag::LibLeader,
            LeLibrariesDone => Tag::LeLibrariesDone,
            LendBook { .. } | GetBook { .. } => Tag::TakeBook,
            FindBook { .. } | FoundBook { .. } => Tag::FindBook,
            BookRequest { .. } => Tag::BookRequest,
            AckTb { .. } => Tag::AckTb,
            DoneFindBook => Tag::DoneFindBook,
            DonateBook { .. } => Tag::DonateBooks,
            DonateBooksDone => Tag::DonateBooksDone,
            GetPopularBkInfoCmd => Tag::GetMostPopularBook,
            GetPopularBkInfo { .. } => Tag::GetPopularBkInfo,
            GetMostPopularBookDone { .. } => Tag::GetMostPopularBook,
            NumBooksLoaned { .. } => Tag::NumBooksLoaned,
            CheckNumBooksLoanDone { .. } => Tag::CheckNumBooksLoaned,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ack_tb_not_found_roundtrips_through_msgpack() {
        let msg = Message::AckTb { book: None, cost: Cost(0) };
        let bytes = rmp_serde::to_vec(&msg).unwrap();
        let back: Message = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(msg, back);
    }
}

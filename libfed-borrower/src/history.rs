//! A single borrower's loan history. Grounded on `client.c`'s
//! `add_to_history` / `get_most_popular_book` family.
use std::collections::HashMap;

use libfed_proto::{owning_library, BookId, Cost, PopularBookReport};

struct Entry {
    cost: Cost,
    loan_num: u32,
}

#[derive(Default)]
pub struct LoanHistory {
    books: HashMap<BookId, Entry>,
}

impl LoanHistory {
    pub fn new() -> Self {
        LoanHistory::default()
    }

    /// Records a successful loan of `book` at `cost`: a new entry on first
    /// loan, an incremented counter thereafter.
    pub fn record(&mut self, book: BookId, cost: Cost) {
        self.books
            .entry(book)
            .and_modify(|e| e.loan_num += 1)
            .or_insert(Entry { cost, loan_num: 1 });
    }

    /// Total loans across every title, used for the loan-count integrity
    /// check against the libraries' combined `loaned_num`.
    pub fn total_loans(&self) -> u64 {
        self.books.values().map(|e| e.loan_num as u64).sum()
    }

    /// This borrower's single most-loaned title (ties broken by book id,
    /// which stands in for the reference design's insertion order since a
    /// `HashMap` does not preserve one). `None` for an empty history, the
    /// `l_id = -1` sentinel of `spec.md` §4.7.
    pub fn most_loaned(&self, grid_side: u32) -> Option<PopularBookReport> {
        self.books
            .iter()
            .max_by_key(|(&book, e)| (e.loan_num, book.0))
            .map(|(&book, e)| PopularBookReport {
                book,
                loan_num: e.loan_num,
                cost: e.cost,
                library: owning_library(book, grid_side),
            })
    }
}

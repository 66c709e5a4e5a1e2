//! A single library's book inventory. Grounded on `server.c`'s `init_books` /
//! `add_book` / `event_lend_book` family, minus the self-addressed
//! `FOUND_BOOK` round trip that function had (see `SPEC_FULL.md` §9).
use std::collections::HashMap;

use libfed_base::random_cost_in_range;
use libfed_proto::{BookId, Cost, PopularBookReport};

const INITIAL_COST_RANGE: (u32, u32) = (5, 100);

struct Entry {
    cost: Cost,
    copies: u32,
    loan_num: u32,
}

#[derive(Default)]
pub struct Inventory {
    books: HashMap<BookId, Entry>,
    loaned_total: u64,
}

impl Inventory {
    pub fn new() -> Self {
        Inventory::default()
    }

    /// Seeds this library with `count` distinct books starting at `first`,
    /// each given `copies_per_book` copies and a random cost (`spec.md` §3:
    /// "each with N copies and a random cost in [5,100]").
    pub fn seed(&mut self, first: BookId, count: u32, copies_per_book: u32) {
        for offset in 0..count {
            let book = BookId(first.0 + offset);
            let cost = Cost(random_cost_in_range(INITIAL_COST_RANGE.0, INITIAL_COST_RANGE.1));
            self.books.insert(
                book,
                Entry {
                    cost,
                    copies: copies_per_book,
                    loan_num: 0,
                },
            );
        }
    }

    pub fn has_book(&self, book: BookId) -> bool {
        self.books.contains_key(&book)
    }

    /// Lends a copy of `book` if one is available, returning its cost.
    pub fn take(&mut self, book: BookId) -> Option<Cost> {
        let entry = self.books.get_mut(&book)?;
        if entry.copies == 0 {
            return None;
        }
        entry.copies -= 1;
        entry.loan_num += 1;
        self.loaned_total += 1;
        Some(entry.cost)
    }

    /// Adds `copies` donated copies of `book`, assigning it `cost` if new.
    pub fn donate(&mut self, book: BookId, copies: u32, cost: Cost) {
        self.books
            .entry(book)
            .and_modify(|e| e.copies += copies)
            .or_insert(Entry {
                cost,
                copies,
                loan_num: 0,
            });
    }

    pub fn loaned_total(&self) -> u64 {
        self.loaned_total
    }

    /// The book with the highest loan count this library has recorded, if any.
    pub fn most_loaned(&self, library: libfed_proto::LibraryId) -> Option<PopularBookReport> {
        self.books
            .iter()
            .filter(|(_, e)| e.loan_num > 0)
            .max_by_key(|(_, e)| e.loan_num)
            .map(|(&book, e)| PopularBookReport {
                book,
                loan_num: e.loan_num,
                cost: e.cost,
                library,
            })
    }
}

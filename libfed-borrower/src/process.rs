//! The borrower process's message dispatch loop. Mirrors
//! `libfed_library::process::LibraryProcess` in shape: a pure `handle`
//! producing outbound actions from `(sender, Message)`, socket I/O isolated
//! to [`BorrowerProcess::run`]. Grounded on `client.c`'s `start_client` main
//! `switch`-on-tag loop.
use std::collections::HashSet;

use tracing::warn;

use libfed_base::{err, random_cost_in_range, Result};
use libfed_election::EchoElection;
use libfed_net::Endpoint;
use libfed_proto::{owning_library, BookId, BorrowerId, Cost, LibraryId, Message, PopularBookReport, Rank};

use crate::history::LoanHistory;

const DONATION_COST_RANGE: (u32, u32) = (5, 100);

/// In-flight round-robin distribution of a donated batch across every
/// library, one copy per `DONATE_BOOK` message, awaiting each library's ack
/// before sending the next (`spec.md` §4.6).
struct Donation {
    book: BookId,
    cost: Cost,
    remaining: u32,
    next_library: u32,
    /// Who to tell once the batch is fully placed: the coordinator, if this
    /// leader was targeted directly, or the borrower that forwarded the
    /// command, which will relay completion onward itself.
    origin: Rank,
}

/// The borrower leader's running aggregation of the popular-book pass: one
/// slot per library, kept if a later report beats what's there.
struct PopularAggregation {
    slots: Vec<Option<PopularBookReport>>,
    received: u32,
}

/// A node's participation in the loan-count tree convergecast: the flood
/// parent (`None` at the root), the forward targets still owed a reply, and
/// the running sum of everything reported back so far.
struct LoanTally {
    parent: Option<Rank>,
    outstanding: HashSet<Rank>,
    sum: u64,
}

pub struct BorrowerProcess {
    endpoint: Endpoint,
    c_id: BorrowerId,
    num_libraries: u32,
    num_borrowers: u32,
    grid_side: u32,
    coordinator: Rank,
    neighbors: Vec<Rank>,
    election: Option<EchoElection>,
    leader: Option<Rank>,
    history: LoanHistory,
    pending_connect: Option<Rank>,
    pending_take: Option<BookId>,
    donation: Option<Donation>,
    popular: Option<PopularAggregation>,
    loan_tally: Option<LoanTally>,
    shutdown: bool,
}

impl BorrowerProcess {
    pub fn new(
        endpoint: Endpoint,
        c_id: BorrowerId,
        num_libraries: u32,
        num_borrowers: u32,
        grid_side: u32,
        coordinator: Rank,
    ) -> Self {
        BorrowerProcess {
            endpoint,
            c_id,
            num_libraries,
            num_borrowers,
            grid_side,
            coordinator,
            neighbors: Vec::new(),
            election: None,
            leader: None,
            history: LoanHistory::new(),
            pending_connect: None,
            pending_take: None,
            donation: None,
            popular: None,
            loan_tally: None,
            shutdown: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        while !self.shutdown {
            let (from, msg) = self.endpoint.recv()?;
            let actions = self.handle(from, msg)?;
            for (dst, out) in actions {
                self.endpoint.send(dst, &out)?;
            }
        }
        Ok(())
    }

    fn handle(&mut self, from: Rank, msg: Message) -> Result<Vec<(Rank, Message)>> {
        match msg {
            Message::Connect { peer } => Ok(self.on_connect(peer)),
            Message::Neighbor { rank } => Ok(self.on_neighbor(rank)),
            Message::Ack => Ok(self.on_ack(from)),

            Message::StartLeLoaners => Ok(self.on_start_le_loaners()),
            Message::Elect => self.on_elect(from),
            Message::LeLoaners { leader } => self.on_le_loaners(from, leader),

            Message::TakeBook { book } => Ok(self.on_take_book(book)),
            Message::GetBook { cost } => self.on_get_book(cost),
            Message::AckTb { book, cost } => Ok(self.on_ack_tb(book, cost)),

            Message::DonateBooksCmd { book, copies } => self.on_donate_cmd(from, book, copies),
            Message::DonateBooksDone => Ok(vec![(self.coordinator, Message::DonateBooksDone)]),

            Message::GetMostPopularBook => Ok(self.start_popular_aggregation()),
            Message::GetPopularBkInfoCmd => self.on_popular_flood(from),
            Message::GetPopularBkInfo { report } => Ok(self.on_popular_report(from, report)),

            Message::CheckNumBooksLoan => Ok(self.on_check_num_books_loan(from)),
            Message::NumBooksLoaned { count } => Ok(self.on_num_books_loaned(from, count)),

            Message::Shutdown => {
                self.shutdown = true;
                Ok(vec![])
            }
            other => {
                warn!(target: "libfed", ?other, from = %from, "borrower process received unexpected message");
                Ok(vec![])
            }
        }
    }

    fn is_leader(&self) -> bool {
        self.leader == Some(self.endpoint.rank())
    }

    // ---- neighbor setup (spec.md §4.4, first half) ----

    fn on_connect(&mut self, peer: Rank) -> Vec<(Rank, Message)> {
        if self.neighbors.contains(&peer) {
            return vec![(self.coordinator, Message::Ack)];
        }
        self.neighbors.push(peer);
        self.pending_connect = Some(peer);
        vec![(peer, Message::Neighbor { rank: self.endpoint.rank() })]
    }

    fn on_neighbor(&mut self, peer: Rank) -> Vec<(Rank, Message)> {
        if !self.neighbors.contains(&peer) {
            self.neighbors.push(peer);
        }
        vec![(peer, Message::Ack)]
    }

    /// A bare `ACK` means different things depending on which phase is
    /// outstanding; each process has at most one active at a time, since
    /// the coordinator serializes phases (`spec.md` §4.2).
    fn on_ack(&mut self, from: Rank) -> Vec<(Rank, Message)> {
        if self.pending_connect == Some(from) {
            self.pending_connect = None;
            return vec![(self.coordinator, Message::Ack)];
        }
        if self.donation.is_some() {
            return self.advance_donation();
        }
        if let Some(election) = &self.election {
            if !election.broadcast_done() {
                let actions = self.election.as_mut().expect("checked above").on_ack(from);
                return self.maybe_finish_election(actions);
            }
        }
        vec![]
    }

    // ---- leader election (spec.md §4.4, echo algorithm) ----

    fn on_start_le_loaners(&mut self) -> Vec<(Rank, Message)> {
        let mut election = EchoElection::new(self.endpoint.rank(), self.neighbors.clone());
        let actions = election.start();
        self.election = Some(election);
        self.maybe_finish_election(actions)
    }

    fn on_elect(&mut self, from: Rank) -> Result<Vec<(Rank, Message)>> {
        let actions = self
            .election
            .as_mut()
            .ok_or_else(|| err("ELECT arrived before START_LE_LOANERS"))?
            .on_elect(from);
        Ok(self.maybe_finish_election(actions))
    }

    fn on_le_loaners(&mut self, from: Rank, leader: Rank) -> Result<Vec<(Rank, Message)>> {
        let actions = self
            .election
            .as_mut()
            .ok_or_else(|| err("LE_LOANERS arrived before START_LE_LOANERS"))?
            .on_le_loaners(from, leader);
        Ok(self.maybe_finish_election(actions))
    }

    /// Only the elected leader itself announces completion to the
    /// coordinator, and only once its own broadcast-with-ack has drained
    /// (every descendant has acked back up the tree).
    fn maybe_finish_election(&mut self, mut actions: Vec<(Rank, Message)>) -> Vec<(Rank, Message)> {
        if let Some(election) = &self.election {
            if let Some(leader) = election.leader() {
                self.leader = Some(leader);
                if leader == self.endpoint.rank() && election.broadcast_done() {
                    actions.push((self.coordinator, Message::LeLoanersDone));
                }
            }
        }
        actions
    }

    // ---- book lookup / transfer (spec.md §4.5, borrower side) ----

    fn on_take_book(&mut self, book: BookId) -> Vec<(Rank, Message)> {
        let target = owning_library(book, self.grid_side).rank();
        self.pending_take = Some(book);
        vec![(target, Message::LendBook { book })]
    }

    fn on_get_book(&mut self, cost: Cost) -> Result<Vec<(Rank, Message)>> {
        let book = self
            .pending_take
            .take()
            .ok_or_else(|| err("GET_BOOK with no outstanding LEND_BOOK"))?;
        self.history.record(book, cost);
        Ok(vec![(self.coordinator, Message::DoneFindBook)])
    }

    fn on_ack_tb(&mut self, book: Option<BookId>, cost: Cost) -> Vec<(Rank, Message)> {
        self.pending_take = None;
        if let Some(b) = book {
            self.history.record(b, cost);
        }
        vec![(self.coordinator, Message::DoneFindBook)]
    }

    // ---- donation (spec.md §4.6) ----

    fn on_donate_cmd(&mut self, from: Rank, book: BookId, copies: u32) -> Result<Vec<(Rank, Message)>> {
        if self.is_leader() {
            return Ok(self.begin_donation(from, book, copies));
        }
        let leader = self.leader.ok_or_else(|| err("donation requested before an election has settled"))?;
        Ok(vec![(leader, Message::DonateBooksCmd { book, copies })])
    }

    fn begin_donation(&mut self, origin: Rank, book: BookId, copies: u32) -> Vec<(Rank, Message)> {
        let cost = Cost(random_cost_in_range(DONATION_COST_RANGE.0, DONATION_COST_RANGE.1));
        self.donation = Some(Donation { book, cost, remaining: copies, next_library: 0, origin });
        self.advance_donation()
    }

    fn advance_donation(&mut self) -> Vec<(Rank, Message)> {
        let state = self.donation.as_mut().expect("advance_donation called with no donation active");
        if state.remaining == 0 {
            let origin = state.origin;
            self.donation = None;
            return vec![(origin, Message::DonateBooksDone)];
        }
        let rank = LibraryId::new(state.next_library % self.num_libraries).rank();
        state.next_library += 1;
        state.remaining -= 1;
        let (book, cost) = (state.book, state.cost);
        vec![(rank, Message::DonateBook { book, cost, copies: 1 })]
    }

    // ---- popular-book aggregation (spec.md §4.7) ----

    fn start_popular_aggregation(&mut self) -> Vec<(Rank, Message)> {
        let mut actions: Vec<(Rank, Message)> =
            self.neighbors.iter().map(|&n| (n, Message::GetPopularBkInfoCmd)).collect();
        let mut slots = vec![None; self.num_libraries as usize];
        if let Some(report) = self.history.most_loaned(self.grid_side) {
            slots[report.library.get() as usize] = Some(report);
        }
        self.popular = Some(PopularAggregation { slots, received: 0 });
        actions.extend(self.maybe_finish_popular());
        actions
    }

    fn on_popular_flood(&mut self, from: Rank) -> Result<Vec<(Rank, Message)>> {
        let mut actions: Vec<(Rank, Message)> = self
            .neighbors
            .iter()
            .copied()
            .filter(|&n| n != from)
            .map(|n| (n, Message::GetPopularBkInfoCmd))
            .collect();
        let report = self.history.most_loaned(self.grid_side);
        let leader = self
            .leader
            .ok_or_else(|| err("popular-book pass arrived before an election has settled"))?;
        actions.push((leader, Message::GetPopularBkInfo { report }));
        Ok(actions)
    }

    fn on_popular_report(&mut self, from: Rank, report: Option<PopularBookReport>) -> Vec<(Rank, Message)> {
        if let Some(agg) = &mut self.popular {
            if let Some(r) = report {
                let slot = &mut agg.slots[r.library.get() as usize];
                let better = match slot {
                    Some(existing) => (r.loan_num, r.cost.0) > (existing.loan_num, existing.cost.0),
                    None => true,
                };
                if better {
                    *slot = Some(r);
                }
            }
            agg.received += 1;
        }
        let mut actions = vec![(from, Message::Ack)];
        actions.extend(self.maybe_finish_popular());
        actions
    }

    fn maybe_finish_popular(&mut self) -> Vec<(Rank, Message)> {
        let expected = self.num_borrowers.saturating_sub(1);
        let done = matches!(&self.popular, Some(p) if p.received >= expected);
        if !done {
            return vec![];
        }
        let agg = self.popular.take().expect("checked above");
        let best = agg.slots.into_iter().flatten().max_by_key(|r| (r.loan_num, r.cost.0));
        vec![(self.coordinator, Message::GetMostPopularBookDone { report: best })]
    }

    // ---- loan-count aggregation (spec.md §4.8, borrower side) ----

    fn on_check_num_books_loan(&mut self, from: Rank) -> Vec<(Rank, Message)> {
        let is_root = self.is_leader() && from == self.coordinator;
        let parent = if is_root { None } else { Some(from) };
        let targets: Vec<Rank> = self.neighbors.iter().copied().filter(|&n| Some(n) != parent).collect();
        self.loan_tally = Some(LoanTally {
            parent,
            outstanding: targets.iter().copied().collect(),
            sum: self.history.total_loans(),
        });
        let mut actions: Vec<(Rank, Message)> = targets.into_iter().map(|n| (n, Message::CheckNumBooksLoan)).collect();
        actions.extend(self.maybe_finish_loan_tally());
        actions
    }

    fn on_num_books_loaned(&mut self, from: Rank, count: u64) -> Vec<(Rank, Message)> {
        if let Some(tally) = &mut self.loan_tally {
            tally.sum += count;
            tally.outstanding.remove(&from);
        }
        let mut actions = vec![(from, Message::Ack)];
        actions.extend(self.maybe_finish_loan_tally());
        actions
    }

    fn maybe_finish_loan_tally(&mut self) -> Vec<(Rank, Message)> {
        let done = matches!(&self.loan_tally, Some(t) if t.outstanding.is_empty());
        if !done {
            return vec![];
        }
        let tally = self.loan_tally.take().expect("checked above");
        match tally.parent {
            Some(parent) => vec![(parent, Message::NumBooksLoaned { count: tally.sum })],
            None => vec![(self.coordinator, Message::CheckNumBooksLoanDone { count: tally.sum })],
        }
    }

    pub fn c_id(&self) -> BorrowerId {
        self.c_id
    }
}

//! The coordinator: a single-threaded scenario interpreter. Grounded on
//! `client.c`'s driver loop that reads scenario lines and blocks on each
//! phase's terminal acknowledgement in turn (`spec.md` §4.2).
mod tree;

use tracing::info;

use libfed_admin::ScenarioCommand;
use libfed_base::{err, Result};
use libfed_net::Endpoint;
use libfed_proto::{BookId, BorrowerId, LibraryId, Message, PopularBookReport, Rank};

/// What the scenario driver observed over a run: the pass/fail signal from
/// every `CHECK_NUM_BOOKS_LOANED` phase (`spec.md` §7's "sole user-visible
/// failure") and the winner reported by every `GET_MOST_POPULAR_BOOK` phase,
/// in the order the scenario issued them. Exists so callers other than a
/// terminal (tests, in particular) can observe phase outcomes without
/// scraping stdout.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunOutcome {
    pub loan_checks: Vec<bool>,
    pub popular_books: Vec<Option<PopularBookReport>>,
}

pub struct Coordinator {
    endpoint: Endpoint,
    num_libraries: u32,
    num_borrowers: u32,
    library_leader: Option<Rank>,
    borrower_leader: Option<Rank>,
    connect_edges: Vec<(Rank, Rank)>,
}

impl Coordinator {
    pub fn new(endpoint: Endpoint, num_libraries: u32, num_borrowers: u32) -> Self {
        Coordinator {
            endpoint,
            num_libraries,
            num_borrowers,
            library_leader: None,
            borrower_leader: None,
            connect_edges: Vec::new(),
        }
    }

    /// Runs every command to completion, in order. Phase sequencing is
    /// strictly serial: a command is never issued until the previous one's
    /// terminal acknowledgement has been received.
    ///
    /// If a command fails partway through, every process is still sent
    /// `SHUTDOWN` (best-effort) before the error is returned, so a protocol
    /// violation never leaves library or borrower threads parked on a
    /// `recv` that will never be answered.
    pub fn run(mut self, commands: &[ScenarioCommand]) -> Result<RunOutcome> {
        let mut outcome = RunOutcome::default();
        match self.run_commands(commands, &mut outcome) {
            Ok(()) => Ok(outcome),
            Err(e) => {
                let _ = self.shutdown();
                Err(e)
            }
        }
    }

    fn run_commands(&mut self, commands: &[ScenarioCommand], outcome: &mut RunOutcome) -> Result<()> {
        for cmd in commands {
            match *cmd {
                ScenarioCommand::Connect { c1, c2 } => self.connect(c1, c2)?,
                ScenarioCommand::StartLeLibr => self.start_le_libr()?,
                ScenarioCommand::StartLeLoaners => self.start_le_loaners()?,
                ScenarioCommand::TakeBook { c, b } => self.take_book(c, b)?,
                ScenarioCommand::DonateBook { c, b, n } => self.donate_book(c, b, n)?,
                ScenarioCommand::GetMostPopularBook => {
                    outcome.popular_books.push(self.get_most_popular_book()?);
                }
                ScenarioCommand::CheckNumBooksLoaned => {
                    outcome.loan_checks.push(self.check_num_books_loaned()?);
                }
                ScenarioCommand::Shutdown => self.shutdown()?,
            }
        }
        Ok(())
    }

    fn library_rank(id: u32) -> Rank {
        LibraryId::new(id).rank()
    }

    fn borrower_rank(&self, c: BorrowerId) -> Rank {
        c.rank(self.num_libraries)
    }

    /// Blocks for the next message, failing unless it came from `from`.
    fn recv_from(&self, from: Rank) -> Result<Message> {
        let (got_from, msg) = self.endpoint.recv()?;
        if got_from != from {
            return Err(err(format!("expected a reply from rank {from}, got one from {got_from} instead")));
        }
        Ok(msg)
    }

    fn connect(&mut self, c1: BorrowerId, c2: BorrowerId) -> Result<()> {
        let r1 = self.borrower_rank(c1);
        let r2 = self.borrower_rank(c2);
        self.endpoint.send(r1, &Message::Connect { peer: r2 })?;
        match self.recv_from(r1)? {
            Message::Ack => {
                self.connect_edges.push((r1, r2));
                Ok(())
            }
            other => Err(err(format!("expected ACK from {r1} after CONNECT, got {other:?}"))),
        }
    }

    fn start_le_libr(&mut self) -> Result<()> {
        for id in 0..self.num_libraries {
            self.endpoint.send(Self::library_rank(id), &Message::StartLeLibr)?;
        }
        let (from, msg) = self.endpoint.recv()?;
        match msg {
            Message::LeLibrariesDone => {
                info!(target: "libfed", leader = %from, "library leader elected");
                self.library_leader = Some(from);
                Ok(())
            }
            other => Err(err(format!("expected LE_LIBRARIES_DONE, got {other:?} from {from}"))),
        }
    }

    fn start_le_loaners(&mut self) -> Result<()> {
        tree::validate_borrower_tree(self.num_libraries, self.num_borrowers, &self.connect_edges)?;
        for id in 0..self.num_borrowers {
            self.endpoint.send(BorrowerId::new(id).rank(self.num_libraries), &Message::StartLeLoaners)?;
        }
        let (from, msg) = self.endpoint.recv()?;
        match msg {
            Message::LeLoanersDone => {
                info!(target: "libfed", leader = %from, "borrower leader elected");
                self.borrower_leader = Some(from);
                Ok(())
            }
            other => Err(err(format!("expected LE_LOANERS_DONE, got {other:?} from {from}"))),
        }
    }

    fn take_book(&mut self, c: BorrowerId, b: BookId) -> Result<()> {
        let rank = self.borrower_rank(c);
        self.endpoint.send(rank, &Message::TakeBook { book: b })?;
        match self.recv_from(rank)? {
            Message::DoneFindBook => Ok(()),
            other => Err(err(format!("expected DONE_FIND_BOOK from {rank}, got {other:?}"))),
        }
    }

    fn donate_book(&mut self, c: BorrowerId, b: BookId, n: u32) -> Result<()> {
        let rank = self.borrower_rank(c);
        self.endpoint.send(rank, &Message::DonateBooksCmd { book: b, copies: n })?;
        match self.recv_from(rank)? {
            Message::DonateBooksDone => Ok(()),
            other => Err(err(format!("expected DONATE_BOOKS_DONE from {rank}, got {other:?}"))),
        }
    }

    fn get_most_popular_book(&mut self) -> Result<Option<PopularBookReport>> {
        let leader = self
            .borrower_leader
            .ok_or_else(|| err("GET_MOST_POPULAR_BOOK issued before START_LE_LOANERS settled a leader"))?;
        self.endpoint.send(leader, &Message::GetMostPopularBook)?;
        match self.recv_from(leader)? {
            Message::GetMostPopularBookDone { report } => Ok(report),
            other => Err(err(format!("expected GET_MOST_POPULAR_BOOK_DONE from {leader}, got {other:?}"))),
        }
    }

    /// The sole pass/fail signal visible to the scenario driver (`spec.md`
    /// §7): prints `SUCCESS` when the two independently-tallied totals
    /// agree, `FAILED` otherwise.
    fn check_num_books_loaned(&mut self) -> Result<bool> {
        let lib_leader = self
            .library_leader
            .ok_or_else(|| err("CHECK_NUM_BOOKS_LOANED issued before START_LE_LIBR settled a leader"))?;
        let brw_leader = self
            .borrower_leader
            .ok_or_else(|| err("CHECK_NUM_BOOKS_LOANED issued before START_LE_LOANERS settled a leader"))?;
        self.endpoint.send(lib_leader, &Message::CheckNumBooksLoan)?;
        self.endpoint.send(brw_leader, &Message::CheckNumBooksLoan)?;

        let mut lib_count = None;
        let mut brw_count = None;
        for _ in 0..2 {
            let (from, msg) = self.endpoint.recv()?;
            match msg {
                Message::CheckNumBooksLoanDone { count } if from == lib_leader => lib_count = Some(count),
                Message::CheckNumBooksLoanDone { count } if from == brw_leader => brw_count = Some(count),
                other => return Err(err(format!("expected CHECK_NUM_BOOKS_LOAN_DONE, got {other:?} from {from}"))),
            }
        }
        let lib_count = lib_count.ok_or_else(|| err("missing CHECK_NUM_BOOKS_LOAN_DONE from the library leader"))?;
        let brw_count = brw_count.ok_or_else(|| err("missing CHECK_NUM_BOOKS_LOAN_DONE from the borrower leader"))?;

        let success = lib_count == brw_count;
        info!(target: "libfed", lib_count, brw_count, success, "CHECK_NUM_BOOKS_LOANED");
        println!("{}", if success { "SUCCESS" } else { "FAILED" });
        Ok(success)
    }

    fn shutdown(&mut self) -> Result<()> {
        for id in 0..self.num_libraries {
            self.endpoint.send(Self::library_rank(id), &Message::Shutdown)?;
        }
        for id in 0..self.num_borrowers {
            self.endpoint.send(BorrowerId::new(id).rank(self.num_libraries), &Message::Shutdown)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use libfed_proto::Rank;
    use test_log::test;

    #[test]
    fn recv_from_rejects_wrong_sender() {
        let endpoints = libfed_net::build(&[Rank::COORDINATOR, Rank::new(1), Rank::new(2)]);
        let a = endpoints.get(&Rank::new(1)).unwrap();
        a.send(Rank::COORDINATOR, &Message::Ack).unwrap();
        let coordinator = Coordinator::new(
            endpoints.into_iter().find(|(r, _)| *r == Rank::COORDINATOR).unwrap().1,
            1,
            1,
        );
        assert_eq!(coordinator.recv_from(Rank::new(1)).unwrap(), Message::Ack);
    }
}

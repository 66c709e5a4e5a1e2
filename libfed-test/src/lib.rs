//! End-to-end test harness: boots a full federation (coordinator + every
//! library + every borrower thread) over the in-process substrate and runs a
//! scenario to completion, mirroring `libfed`'s own bootstrap in
//! `libfed/src/main.rs` but returning the [`RunOutcome`] instead of exiting
//! the process.
use std::thread;

use libfed_admin::{parse_scenario, FederationConfig};
use libfed_base::Result;
use libfed_borrower::BorrowerProcess;
use libfed_coordinator::{Coordinator, RunOutcome};
use libfed_library::LibraryProcess;
use libfed_proto::{BorrowerId, LibraryId, Rank};

/// Parses `scenario_text` and drives it to completion against a freshly
/// built federation of `num_libraries` libraries and `num_borrowers`
/// borrowers. Joins every process thread before returning, so by the time
/// this call returns the whole run (including every `SHUTDOWN`) is over.
pub fn run_scenario(num_libraries: u32, num_borrowers: u32, scenario_text: &str) -> Result<RunOutcome> {
    let config = FederationConfig::new(num_libraries, num_borrowers)?;
    let commands = parse_scenario(scenario_text)?;

    let mut ranks = vec![Rank::COORDINATOR];
    ranks.extend((0..config.num_libraries).map(|id| LibraryId::new(id).rank()));
    ranks.extend((0..config.num_borrowers).map(|id| BorrowerId::new(id).rank(config.num_libraries)));
    let mut endpoints = libfed_net::build(&ranks);

    let mut handles = Vec::with_capacity(ranks.len() - 1);

    for id in 0..config.num_libraries {
        let l_id = LibraryId::new(id);
        let endpoint = endpoints.remove(&l_id.rank()).expect("every declared rank has an endpoint");
        handles.push(thread::spawn(move || {
            LibraryProcess::new(endpoint, l_id, config.grid_side, config.num_libraries, config.grid_side, Rank::COORDINATOR).run()
        }));
    }

    for id in 0..config.num_borrowers {
        let c_id = BorrowerId::new(id);
        let endpoint = endpoints.remove(&c_id.rank(config.num_libraries)).expect("every declared rank has an endpoint");
        handles.push(thread::spawn(move || {
            BorrowerProcess::new(endpoint, c_id, config.num_libraries, config.num_borrowers, config.grid_side, Rank::COORDINATOR).run()
        }));
    }

    let coordinator_endpoint = endpoints.remove(&Rank::COORDINATOR).expect("coordinator has an endpoint");
    let coordinator = Coordinator::new(coordinator_endpoint, config.num_libraries, config.num_borrowers);
    let result = coordinator.run(&commands);

    for handle in handles {
        handle.join().expect("process thread panicked")?;
    }

    result
}

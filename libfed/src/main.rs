//! Process bootstrap: parses the CLI, builds the in-process substrate, spawns
//! one OS thread per library and per borrower, and drives the scenario from
//! the coordinator on the main thread. Grounded on `submerge`'s own
//! `main.rs`, which spawns one thread per replica over a `submerge-net`
//! substrate and joins them after the client driver finishes.
use std::fs;
use std::thread::{self, JoinHandle};

use clap::Parser;
use tracing::error;

use libfed_admin::{init_logging, parse_scenario, Cli};
use libfed_base::{err, Result};
use libfed_borrower::BorrowerProcess;
use libfed_coordinator::Coordinator;
use libfed_library::LibraryProcess;
use libfed_proto::{BorrowerId, LibraryId, Rank};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;
    let config = cli.federation_config()?;

    let scenario_text = fs::read_to_string(&cli.scenario)
        .map_err(|e| err(format!("failed to read scenario file {:?}: {e}", cli.scenario)))?;
    let commands = parse_scenario(&scenario_text)?;

    let mut ranks = vec![Rank::COORDINATOR];
    ranks.extend((0..config.num_libraries).map(|id| LibraryId::new(id).rank()));
    ranks.extend((0..config.num_borrowers).map(|id| BorrowerId::new(id).rank(config.num_libraries)));
    let mut endpoints = libfed_net::build(&ranks);

    let mut handles: Vec<(Rank, JoinHandle<Result<()>>)> = Vec::with_capacity(ranks.len() - 1);

    for id in 0..config.num_libraries {
        let l_id = LibraryId::new(id);
        let rank = l_id.rank();
        let endpoint = endpoints.remove(&rank).expect("every declared rank has an endpoint");
        let handle = thread::spawn(move || {
            LibraryProcess::new(endpoint, l_id, config.grid_side, config.num_libraries, config.grid_side, Rank::COORDINATOR)
                .run()
        });
        handles.push((rank, handle));
    }

    for id in 0..config.num_borrowers {
        let c_id = BorrowerId::new(id);
        let rank = c_id.rank(config.num_libraries);
        let endpoint = endpoints.remove(&rank).expect("every declared rank has an endpoint");
        let handle = thread::spawn(move || {
            BorrowerProcess::new(
                endpoint,
                c_id,
                config.num_libraries,
                config.num_borrowers,
                config.grid_side,
                Rank::COORDINATOR,
            )
            .run()
        });
        handles.push((rank, handle));
    }

    let coordinator_endpoint = endpoints.remove(&Rank::COORDINATOR).expect("coordinator has an endpoint");
    let coordinator = Coordinator::new(coordinator_endpoint, config.num_libraries, config.num_borrowers);
    let run_result = coordinator.run(&commands).map(|_outcome| ());

    let mut any_process_failed = false;
    for (rank, handle) in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(target: "libfed", rank = %rank, error = ?e, "process exited with an error");
                any_process_failed = true;
            }
            Err(_) => {
                error!(target: "libfed", rank = %rank, "process panicked");
                any_process_failed = true;
            }
        }
    }

    run_result?;
    if any_process_failed {
        return Err(err("one or more library/borrower processes failed; see the logged ranks above"));
    }
    Ok(())
}

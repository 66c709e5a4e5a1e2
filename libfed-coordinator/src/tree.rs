//! Validates that the `CONNECT` edges issued so far form a single spanning
//! tree over every borrower, before `START_LE_LOANERS` runs the echo
//! election over them. Resolves the Open Question in `spec.md` §9: a
//! malformed scenario becomes a configuration error instead of a silent
//! protocol hang.
use std::collections::HashMap;

use libfed_base::{err, Result};
use libfed_proto::{BorrowerId, Rank};

pub fn validate_borrower_tree(num_libraries: u32, num_borrowers: u32, edges: &[(Rank, Rank)]) -> Result<()> {
    let expected_edges = (num_borrowers as usize).saturating_sub(1);
    if edges.len() != expected_edges {
        return Err(err(format!(
            "borrower overlay has {} CONNECT edge(s), a tree over {num_borrowers} borrowers needs exactly {expected_edges}",
            edges.len()
        )));
    }

    let mut parent: HashMap<Rank, Rank> = (0..num_borrowers)
        .map(|id| {
            let r = BorrowerId::new(id).rank(num_libraries);
            (r, r)
        })
        .collect();

    for &(a, b) in edges {
        let ra = find(&mut parent, a)?;
        let rb = find(&mut parent, b)?;
        if ra == rb {
            return Err(err("borrower CONNECT edges contain a cycle"));
        }
        parent.insert(ra, rb);
    }

    let root = find(&mut parent, BorrowerId::new(0).rank(num_libraries))?;
    for id in 1..num_borrowers {
        let r = BorrowerId::new(id).rank(num_libraries);
        if find(&mut parent, r)? != root {
            return Err(err("borrower overlay is not connected"));
        }
    }
    Ok(())
}

fn find(parent: &mut HashMap<Rank, Rank>, x: Rank) -> Result<Rank> {
    let p = *parent.get(&x).ok_or_else(|| err(format!("CONNECT refers to unknown borrower rank {x}")))?;
    if p == x {
        return Ok(x);
    }
    let root = find(parent, p)?;
    parent.insert(x, root);
    Ok(root)
}

#[cfg(test)]
mod test {
    use super::*;

    fn r(n: u32) -> Rank {
        Rank::new(n)
    }

    #[test]
    fn line_of_four_is_a_valid_tree() {
        let edges = vec![(r(5), r(6)), (r(6), r(7)), (r(7), r(8))];
        assert!(validate_borrower_tree(4, 4, &edges).is_ok());
    }

    #[test]
    fn missing_edge_is_rejected() {
        let edges = vec![(r(5), r(6)), (r(6), r(7))];
        assert!(validate_borrower_tree(4, 4, &edges).is_err());
    }

    #[test]
    fn cycle_is_rejected() {
        let edges = vec![(r(5), r(6)), (r(6), r(7)), (r(7), r(5))];
        assert!(validate_borrower_tree(4, 3, &edges).is_err());
    }

    #[test]
    fn a_different_shaped_tree_is_still_valid() {
        let edges = vec![(r(5), r(6)), (r(7), r(8)), (r(5), r(8))];
        assert!(validate_borrower_tree(4, 4, &edges).is_ok());
    }

    #[test]
    fn redundant_edge_within_one_component_is_rejected() {
        // (5,6) twice plus (7,8): edge count matches n-1=3, but {5,6} never
        // joins {7,8} — the redundant edge is caught as a cycle.
        let edges = vec![(r(5), r(6)), (r(5), r(6)), (r(7), r(8))];
        assert!(validate_borrower_tree(4, 4, &edges).is_err());
    }
}

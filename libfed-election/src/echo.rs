//! Echo-style leader election over the borrower overlay tree.
//!
//! Every borrower knows only its own neighbor set (installed by the
//! coordinator's `CONNECT` edges, see `spec.md` §4.4); there is no
//! predetermined root or parent. A leaf (degree 1) spontaneously sends
//! `ELECT` to its sole neighbor. An interior node counts votes as `ELECT`
//! arrives from each neighbor; once it has heard from all but one, it
//! forwards `ELECT` to that last neighbor. The two endpoints of whichever
//! edge ends up carrying `ELECT` in both directions are the tree's "center";
//! the higher-ranked of the two is the leader. Grounded on `client.c`'s
//! `event_client_start_le_loaners` / `event_client_elect` /
//! `event_client_leader_selected` chain.
use std::collections::HashSet;

use libfed_proto::{Message, Rank};

pub struct EchoElection {
    self_rank: Rank,
    neighbors: Vec<Rank>,
    voters: Vec<Rank>,
    sent_elect_to: Option<Rank>,
    leader: Option<Rank>,
    /// Who the `LE_LOANERS` flood arrived from; stays `None` at the root,
    /// which has nobody to ack back to once its flood completes.
    flood_from: Option<Rank>,
    flood_started: bool,
    awaiting_ack: HashSet<Rank>,
}

impl EchoElection {
    pub fn new(self_rank: Rank, neighbors: Vec<Rank>) -> Self {
        EchoElection {
            self_rank,
            neighbors,
            voters: Vec::new(),
            sent_elect_to: None,
            leader: None,
            flood_from: None,
            flood_started: false,
            awaiting_ack: HashSet::new(),
        }
    }

    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }

    pub fn leader(&self) -> Option<Rank> {
        self.leader
    }

    /// True once this node's `LE_LOANERS` flood has reached every leaf and
    /// every ack has propagated back to here.
    pub fn broadcast_done(&self) -> bool {
        self.flood_started && self.awaiting_ack.is_empty()
    }

    /// Starts the upward wave. A leaf sends `ELECT` immediately; a node with
    /// no neighbors at all (a singleton borrower set) is trivially its own
    /// leader with nothing left to broadcast.
    pub fn start(&mut self) -> Vec<(Rank, Message)> {
        match self.neighbors.len() {
            0 => self.originate_broadcast(self.self_rank),
            1 => {
                let only = self.neighbors[0];
                self.sent_elect_to = Some(only);
                vec![(only, Message::Elect)]
            }
            _ => vec![],
        }
    }

    /// An `ELECT` arrived from `from`.
    pub fn on_elect(&mut self, from: Rank) -> Vec<(Rank, Message)> {
        self.voters.push(from);
        let degree = self.neighbors.len();
        if self.voters.len() == degree {
            let winner = if self.sent_elect_to == Some(from) {
                std::cmp::max(self.self_rank, from)
            } else {
                self.self_rank
            };
            return if winner == self.self_rank {
                self.originate_broadcast(winner)
            } else {
                // The peer across the settled edge is the higher rank; wait
                // for its `LE_LOANERS` flood to arrive.
                vec![]
            };
        }
        if self.sent_elect_to.is_none() && self.voters.len() + 1 == degree {
            let remaining = *self
                .neighbors
                .iter()
                .find(|n| !self.voters.contains(n))
                .expect("one neighbor has not yet voted");
            self.sent_elect_to = Some(remaining);
            return vec![(remaining, Message::Elect)];
        }
        vec![]
    }

    fn originate_broadcast(&mut self, leader: Rank) -> Vec<(Rank, Message)> {
        self.leader = Some(leader);
        self.flood_started = true;
        self.flood_from = None;
        self.awaiting_ack = self.neighbors.iter().copied().collect();
        self.neighbors
            .iter()
            .map(|&n| (n, Message::LeLoaners { leader }))
            .collect()
    }

    /// `LE_LOANERS <leader>` arrived from `from`: forward to every other
    /// neighbor, or ack straight back if this node is a leaf of the flood.
    pub fn on_le_loaners(&mut self, from: Rank, leader: Rank) -> Vec<(Rank, Message)> {
        self.leader = Some(leader);
        self.flood_started = true;
        self.flood_from = Some(from);
        let targets: Vec<Rank> = self.neighbors.iter().copied().filter(|&n| n != from).collect();
        if targets.is_empty() {
            return vec![(from, Message::Ack)];
        }
        self.awaiting_ack = targets.iter().copied().collect();
        targets.into_iter().map(|n| (n, Message::LeLoaners { leader })).collect()
    }

    /// An `ACK` arrived from `from` during the `LE_LOANERS` flood. Returns
    /// the ack to relay to this node's own flood parent once every forward
    /// target has acked, or nothing if more acks are outstanding or this
    /// node is the root (nobody left to tell).
    pub fn on_ack(&mut self, from: Rank) -> Vec<(Rank, Message)> {
        self.awaiting_ack.remove(&from);
        if !self.awaiting_ack.is_empty() {
            return vec![];
        }
        match self.flood_from {
            Some(parent) => vec![(parent, Message::Ack)],
            None => vec![],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn r(n: u32) -> Rank {
        Rank::new(n)
    }

    #[test]
    fn singleton_is_its_own_leader() {
        let mut e = EchoElection::new(r(5), vec![]);
        let actions = e.start();
        assert!(actions.is_empty());
        assert_eq!(e.leader(), Some(r(5)));
        assert!(e.broadcast_done());
    }

    #[test]
    fn two_node_line_elects_higher_rank_and_floods() {
        let mut a = EchoElection::new(r(3), vec![r(7)]);
        let mut b = EchoElection::new(r(7), vec![r(3)]);

        let to_b = a.start();
        assert_eq!(to_b, vec![(r(7), Message::Elect)]);
        let to_a = b.start();
        assert_eq!(to_a, vec![(r(3), Message::Elect)]);

        // Both sides independently settle the same winner across the edge.
        let from_a = a.on_elect(r(7));
        assert_eq!(from_a, vec![(r(7), Message::LeLoaners { leader: r(7) })]);
        assert_eq!(a.leader(), Some(r(7)));

        let from_b = b.on_elect(r(3));
        assert!(from_b.is_empty());
        assert_eq!(b.leader(), None);

        // The flood from a arrives at b; b is a leaf of it, acks straight back.
        let ack = b.on_le_loaners(r(3), r(7));
        assert_eq!(ack, vec![(r(3), Message::Ack)]);
        assert_eq!(b.leader(), Some(r(7)));

        let done = a.on_ack(r(7));
        assert!(done.is_empty());
        assert!(a.broadcast_done());
    }

    #[test]
    fn three_node_line_center_edge_breaks_tie_by_rank() {
        // 1 - 2 - 3: node 2 has degree 2, nodes 1 and 3 are leaves.
        let mut n1 = EchoElection::new(r(1), vec![r(2)]);
        let mut n2 = EchoElection::new(r(2), vec![r(1), r(3)]);
        let mut n3 = EchoElection::new(r(3), vec![r(2)]);

        assert_eq!(n1.start(), vec![(r(2), Message::Elect)]);
        assert!(n2.start().is_empty());
        assert_eq!(n3.start(), vec![(r(2), Message::Elect)]);

        // n2 gets the first vote (from n1): that's degree - 1, so it
        // forwards to the other neighbor (n3).
        let fwd = n2.on_elect(r(1));
        assert_eq!(fwd, vec![(r(3), Message::Elect)]);

        // n3 already spontaneously sent_elect_to(n2) and now receives ELECT
        // back from n2 on the same edge: two-way, winner = max(2, 3) = 3.
        let from_n3 = n3.on_elect(r(2));
        assert_eq!(from_n3, vec![(r(2), Message::LeLoaners { leader: r(3) })]);
        assert_eq!(n3.leader(), Some(r(3)));

        // n2 receives ELECT from n3 (its forwarded-to neighbor): two-way too.
        let from_n2 = n2.on_elect(r(3));
        assert!(from_n2.is_empty());
        assert_eq!(n2.leader(), None);

        let fwd2 = n2.on_le_loaners(r(3), r(3));
        assert_eq!(fwd2, vec![(r(1), Message::LeLoaners { leader: r(3) })]);

        let ack1 = n1.on_le_loaners(r(2), r(3));
        assert_eq!(ack1, vec![(r(2), Message::Ack)]);

        let up = n2.on_ack(r(1));
        assert_eq!(up, vec![(r(3), Message::Ack)]);

        let done = n3.on_ack(r(2));
        assert!(done.is_empty());
        assert!(n3.broadcast_done());
    }
}

//! The messaging substrate standing in for the reference design's MPI
//! communicator: every process (coordinator, library, borrower) gets a
//! [`Endpoint`] addressed by [`Rank`], backed by an `crossbeam_channel`
//! mailbox. Sends still go through `rmp_serde` encode/decode exactly the way
//! `submerge-net`'s `Node` serializes its `Msg` envelope, even though the
//! transport here is in-process — it keeps `Message` from leaking internal
//! representation across the simulated wire and makes the substrate a drop-in
//! replacement for a real socket transport later.
use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::trace;

use libfed_base::{err, Result};
use libfed_proto::{Message, Rank};

/// Every message travels with its sender's rank attached, since the
/// substrate is a bag of independent mailboxes rather than a set of
/// per-peer sockets where the source is implicit in which connection it
/// arrived on.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Envelope {
    from: Rank,
    msg: Message,
}

/// Builds a fully-connected substrate for the given ranks: every endpoint can
/// address every other by [`Rank`]. Returns one [`Endpoint`] per rank.
pub fn build(ranks: &[Rank]) -> HashMap<Rank, Endpoint> {
    let mut senders = HashMap::with_capacity(ranks.len());
    let mut inboxes = HashMap::with_capacity(ranks.len());
    for &r in ranks {
        let (tx, rx) = unbounded();
        senders.insert(r, tx);
        inboxes.insert(r, rx);
    }
    inboxes
        .into_iter()
        .map(|(r, inbox)| {
            (
                r,
                Endpoint {
                    self_rank: r,
                    senders: senders.clone(),
                    inbox,
                },
            )
        })
        .collect()
}

/// A process's view of the substrate: who it is, who it can reach, and the
/// mailbox it reads its own incoming traffic from.
pub struct Endpoint {
    self_rank: Rank,
    senders: HashMap<Rank, Sender<Box<[u8]>>>,
    inbox: Receiver<Box<[u8]>>,
}

impl Endpoint {
    pub fn rank(&self) -> Rank {
        self.self_rank
    }

    /// Encodes and enqueues `msg` in `dst`'s mailbox.
    pub fn send(&self, dst: Rank, msg: &Message) -> Result<()> {
        trace!(target: "libfed", from = %self.self_rank, to = %dst, tag = ?msg.tag(), "send");
        let envelope = Envelope { from: self.self_rank, msg: *msg };
        let bytes = rmp_serde::to_vec(&envelope)?;
        self.senders
            .get(&dst)
            .ok_or_else(|| err(format!("no such peer rank {dst}")))?
            .send(bytes.into_boxed_slice())
            .map_err(|_| err(format!("peer rank {dst} has gone away")))
    }

    /// Blocks until a message addressed to this endpoint arrives, returning
    /// it along with the rank that sent it.
    pub fn recv(&self) -> Result<(Rank, Message)> {
        let bytes = self
            .inbox
            .recv()
            .map_err(|_| err("inbox closed with no more senders"))?;
        let envelope: Envelope = rmp_serde::from_slice(&bytes)?;
        trace!(target: "libfed", to = %self.self_rank, from = %envelope.from, tag = ?envelope.msg.tag(), "recv");
        Ok((envelope.from, envelope.msg))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use libfed_proto::BookId;
    use test_log::test;

    #[test]
    fn point_to_point_roundtrip() {
        let ranks = [Rank::new(0), Rank::new(1)];
        let endpoints = build(&ranks);
        let a = &endpoints[&ranks[0]];
        let b = &endpoints[&ranks[1]];

        a.send(ranks[1], &Message::TakeBook { book: BookId(7) }).unwrap();
        let (from, got) = b.recv().unwrap();
        assert_eq!(from, ranks[0]);
        assert_eq!(got, Message::TakeBook { book: BookId(7) });
    }

    #[test]
    fn send_to_unknown_rank_fails() {
        let ranks = [Rank::new(0)];
        let endpoints = build(&ranks);
        let a = &endpoints[&ranks[0]];
        assert!(a.send(Rank::new(99), &Message::Ack).is_err());
    }
}

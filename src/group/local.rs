//! In-process group: one thread per worker
//!
//! Each worker runs on its own named thread and owns a [`LocalComm`]
//! endpoint. Endpoints talk through one crossbeam channel per rank (its inbox);
//! nothing else is shared between workers.
//!
//! # Collectives
//!
//! - **broadcast** is flat: the root sends its directive to every other rank.
//! - **reduce_product** is a binomial tree rooted at the requested root. Ranks
//!   are renumbered so the root is virtual rank 0. For a group size that is not
//!   a power of two, the excess ranks first fold into the largest power-of-two
//!   subset; the tree then takes `log2` rounds.
//!
//! Messages carry the sequence number of the collective they belong to, so a
//! fast rank that already entered the next collective cannot confuse a slower
//! peer.
//!
//! # Example
//!
//! ```
//! use geomean::group::{Communicator, LocalGroup};
//!
//! let results = LocalGroup::run(4, |mut comm| {
//!     let local = (comm.rank() + 1) as f64;
//!     comm.reduce_product(local, 0).unwrap()
//! })
//! .unwrap();
//!
//! assert_eq!(results[0], Some(24.0));
//! assert!(results[1..].iter().all(Option::is_none));
//! ```

use super::{check_root, root_directive, Communicator, Directive, Rank};
use crate::error::{GeomeanError, GroupResult};
use crate::reduce::combine;
use anyhow::Context;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::collections::VecDeque;

/// Message between two endpoints
#[derive(Debug)]
struct Packet {
    from: Rank,
    seq: u64,
    body: Body,
}

#[derive(Debug)]
enum Body {
    Directive(Directive),
    Partial(f64),
}

/// One worker's endpoint in an in-process group
pub struct LocalComm {
    rank: Rank,
    size: usize,
    inbox: Receiver<Packet>,
    /// Senders to every other rank's inbox (`None` at our own rank)
    peers: Vec<Option<Sender<Packet>>>,
    /// Packets that arrived before the collective they belong to
    pending: VecDeque<Packet>,
    /// Sequence number of the current collective
    seq: u64,
}

impl LocalComm {
    fn send(&self, dest: Rank, body: Body) -> GroupResult<()> {
        let sender = self.peers[dest]
            .as_ref()
            .ok_or_else(|| GeomeanError::Transport(format!("rank {} cannot send to itself", dest)))?;

        sender
            .send(Packet {
                from: self.rank,
                seq: self.seq,
                body,
            })
            .map_err(|_| GeomeanError::PeerDisconnected { rank: dest })
    }

    fn recv(&mut self, src: Rank) -> GroupResult<Body> {
        let seq = self.seq;
        if let Some(pos) = self.pending.iter().position(|p| p.from == src && p.seq == seq) {
            if let Some(packet) = self.pending.remove(pos) {
                return Ok(packet.body);
            }
        }

        loop {
            let packet = self
                .inbox
                .recv()
                .map_err(|_| GeomeanError::PeerDisconnected { rank: src })?;
            if packet.from == src && packet.seq == seq {
                return Ok(packet.body);
            }
            self.pending.push_back(packet);
        }
    }

    fn recv_partial(&mut self, src: Rank) -> GroupResult<f64> {
        match self.recv(src)? {
            Body::Partial(value) => Ok(value),
            other => Err(GeomeanError::UnexpectedMessage {
                operation: "reduce",
                got: format!("{:?}", other),
            }),
        }
    }

    fn recv_directive(&mut self, src: Rank) -> GroupResult<Directive> {
        match self.recv(src)? {
            Body::Directive(directive) => Ok(directive),
            other => Err(GeomeanError::UnexpectedMessage {
                operation: "broadcast",
                got: format!("{:?}", other),
            }),
        }
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast(&mut self, directive: Option<Directive>, root: Rank) -> GroupResult<Directive> {
        check_root(root, self.size)?;
        self.seq += 1;

        if self.rank == root {
            let directive = root_directive(directive)?;
            for dest in (0..self.size).filter(|&r| r != root) {
                self.send(dest, Body::Directive(directive.clone()))?;
            }
            Ok(directive)
        } else {
            self.recv_directive(root)
        }
    }

    fn reduce_product(&mut self, local: f64, root: Rank) -> GroupResult<Option<f64>> {
        check_root(root, self.size)?;
        self.seq += 1;

        let world = self.size;
        if world == 1 {
            return Ok(Some(local));
        }

        let vrank = (self.rank + world - root) % world;
        let physical = |v: usize| (v + root) % world;

        let p2 = if world.is_power_of_two() {
            world
        } else {
            world.next_power_of_two() >> 1
        };
        let excess = world - p2;

        let mut acc = local;

        if vrank < excess {
            let partial = self.recv_partial(physical(vrank + p2))?;
            acc = combine(acc, partial);
        } else if vrank >= p2 {
            self.send(physical(vrank - p2), Body::Partial(acc))?;
            return Ok(None);
        }

        for round in 0..p2.trailing_zeros() {
            let mask = 1usize << round;
            let partner = physical(vrank ^ mask);
            if vrank & mask != 0 {
                self.send(partner, Body::Partial(acc))?;
                return Ok(None);
            }
            let partial = self.recv_partial(partner)?;
            acc = combine(acc, partial);
        }

        // only virtual rank 0 (the root) gets here
        Ok(Some(acc))
    }
}

/// Builder for in-process groups
pub struct LocalGroup;

impl LocalGroup {
    /// Create the connected endpoints of a group of `size`, in rank order
    pub fn endpoints(size: usize) -> Vec<LocalComm> {
        let (senders, inboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();

        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalComm {
                rank,
                size,
                inbox,
                peers: senders
                    .iter()
                    .enumerate()
                    .map(|(r, s)| (r != rank).then(|| s.clone()))
                    .collect(),
                pending: VecDeque::new(),
                seq: 0,
            })
            .collect()
    }

    /// Run `f` once per rank on its own thread and collect the results
    ///
    /// Blocks until every worker returns. Results are in rank order.
    pub fn run<T, F>(size: usize, f: F) -> anyhow::Result<Vec<T>>
    where
        F: Fn(LocalComm) -> T + Sync,
        T: Send,
    {
        anyhow::ensure!(size > 0, "group must have at least one worker");

        let endpoints = Self::endpoints(size);
        let f = &f;

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(size);
            for comm in endpoints {
                let rank = comm.rank;
                let handle = std::thread::Builder::new()
                    .name(format!("worker-{}", rank))
                    .spawn_scoped(scope, move || f(comm))
                    .with_context(|| format!("Failed to spawn worker thread {}", rank))?;
                handles.push(handle);
            }

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .map_err(|_| anyhow::anyhow!("Worker thread {} panicked", rank))
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce::product_of;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= a.abs().max(b.abs()).max(1.0) * 1e-12
    }

    #[test]
    fn test_single_worker_reduce_is_identity() {
        let results = LocalGroup::run(1, |mut comm| comm.reduce_product(42.5, 0).unwrap()).unwrap();
        assert_eq!(results, vec![Some(42.5)]);
    }

    #[test]
    fn test_reduce_all_group_sizes() {
        for size in 1..=9usize {
            let results = LocalGroup::run(size, |mut comm| {
                let local = (comm.rank() + 2) as f64;
                comm.reduce_product(local, 0).unwrap()
            })
            .unwrap();

            let expected = product_of(&(0..size).map(|r| (r + 2) as f64).collect::<Vec<_>>());
            assert!(approx_eq(results[0].unwrap(), expected), "size {}", size);
            assert!(results[1..].iter().all(Option::is_none), "size {}", size);
        }
    }

    #[test]
    fn test_reduce_non_zero_root() {
        for size in 2..=7usize {
            for root in 0..size {
                let results = LocalGroup::run(size, |mut comm| {
                    let local = 1.5 + comm.rank() as f64;
                    comm.reduce_product(local, root).unwrap()
                })
                .unwrap();

                let expected = product_of(&(0..size).map(|r| 1.5 + r as f64).collect::<Vec<_>>());
                for (rank, result) in results.iter().enumerate() {
                    if rank == root {
                        assert!(approx_eq(result.unwrap(), expected));
                    } else {
                        assert!(result.is_none());
                    }
                }
            }
        }
    }

    #[test]
    fn test_broadcast_reaches_every_rank() {
        let results = LocalGroup::run(5, |mut comm| {
            let directive = comm.is_coordinator().then(|| Directive::Run { size: 8 });
            comm.broadcast(directive, 0).unwrap()
        })
        .unwrap();

        assert!(results.iter().all(|d| *d == Directive::Run { size: 8 }));
    }

    #[test]
    fn test_abort_broadcast() {
        let results = LocalGroup::run(3, |mut comm| {
            let directive = comm.is_coordinator().then(|| Directive::Abort {
                reason: "bad size".to_string(),
            });
            comm.broadcast(directive, 0).unwrap()
        })
        .unwrap();

        for directive in results {
            assert_eq!(directive, Directive::Abort { reason: "bad size".to_string() });
        }
    }

    #[test]
    fn test_consecutive_collectives_do_not_mix() {
        let results = LocalGroup::run(6, |mut comm| {
            let directive = comm.is_coordinator().then(|| Directive::Run { size: 6 });
            let first = comm.broadcast(directive, 0).unwrap();
            let a = comm.reduce_product(2.0, 0).unwrap();
            let b = comm.reduce_product(3.0, 5).unwrap();
            (first, a, b)
        })
        .unwrap();

        assert_eq!(results[0].1, Some(64.0));
        assert_eq!(results[5].2, Some(729.0));
        for (rank, (directive, a, b)) in results.iter().enumerate() {
            assert_eq!(*directive, Directive::Run { size: 6 });
            assert_eq!(a.is_some(), rank == 0);
            assert_eq!(b.is_some(), rank == 5);
        }
    }

    #[test]
    fn test_invalid_root() {
        let results = LocalGroup::run(2, |mut comm| comm.reduce_product(1.0, 2)).unwrap();
        for result in results {
            assert!(matches!(result, Err(GeomeanError::InvalidRoot { root: 2, size: 2 })));
        }
    }

    #[test]
    fn test_root_without_directive() {
        let mut comms = LocalGroup::endpoints(1);
        let result = comms[0].broadcast(None, 0);
        assert!(matches!(result, Err(GeomeanError::UnexpectedMessage { .. })));
    }

    #[test]
    fn test_zero_size_group_rejected() {
        assert!(LocalGroup::run(0, |comm| comm.rank()).is_err());
    }
}

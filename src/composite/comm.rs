//! Point-to-point messaging between ranks.
//!
//! All collective operations are blocking: every rank in the group must
//! reach the same call or the group deadlocks. A peer that goes away
//! surfaces as [`FlowError::Communication`] on whoever talks to it next.

use crate::composite::program::{BinaryTreeTopology, ReductionTopology};
use crate::error::{FlowError, FlowResult, ResultExt};
use crate::xfer::Wire;
use crossbeam_channel::{unbounded, Receiver, Sender};

pub trait Communicator: Send {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Deliver `data` to `to`. Messages between one pair arrive in order.
    fn send(&self, to: usize, data: Vec<u8>) -> FlowResult<()>;

    /// Block until `from` sends.
    fn recv(&self, from: usize) -> FlowResult<Vec<u8>>;

    fn ranks(&self) -> Vec<usize> {
        (0..self.size()).collect()
    }

    /// Element-wise sum over every rank; every rank receives the total.
    ///
    /// Partials flow up a binary tree to rank 0, which then sends the total
    /// back out. Vectors of different lengths are a communication error.
    fn all_reduce_sum(&self, values: &[f64]) -> FlowResult<Vec<f64>> {
        let me = self.rank();
        let program = BinaryTreeTopology.make_program(&self.ranks());
        let mut local = values.to_vec();

        for round in 0..program.number_of_rounds() {
            let Some(pair) = program.pair_for(round, me) else {
                continue;
            };
            if pair.sender == me {
                self.send(pair.receiver, local.to_bytes()?)?;
            } else {
                let bytes = self.recv(pair.sender)?;
                let theirs = Vec::<f64>::from_bytes(&bytes)
                    .with_context(|| format!("reduction partial from rank {}", pair.sender))?;
                if theirs.len() != local.len() {
                    return Err(FlowError::Communication(format!(
                        "rank {} contributed {} values, rank {} has {}",
                        pair.sender,
                        theirs.len(),
                        me,
                        local.len()
                    )));
                }
                for (acc, v) in local.iter_mut().zip(theirs) {
                    *acc += v;
                }
            }
        }

        let root = program.root().unwrap_or(me);
        if me == root {
            let bytes = local.to_bytes()?;
            for peer in self.ranks().into_iter().filter(|&r| r != root) {
                self.send(peer, bytes.clone())?;
            }
            Ok(local)
        } else {
            Vec::<f64>::from_bytes(&self.recv(root)?)
        }
    }
}

/// The only rank of a one-rank run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, to: usize, _data: Vec<u8>) -> FlowResult<()> {
        Err(FlowError::Communication(format!("serial run has no rank {}", to)))
    }

    fn recv(&self, from: usize) -> FlowResult<Vec<u8>> {
        Err(FlowError::Communication(format!("serial run has no rank {}", from)))
    }

    fn all_reduce_sum(&self, values: &[f64]) -> FlowResult<Vec<f64>> {
        Ok(values.to_vec())
    }
}

/// One rank of an in-process group, usually driven from its own thread.
///
/// Each ordered pair of ranks gets its own channel, which keeps messages
/// from one sender in order without any tagging.
#[derive(Debug)]
pub struct LocalCommunicator {
    rank: usize,
    outgoing: Vec<Sender<Vec<u8>>>,
    incoming: Vec<Receiver<Vec<u8>>>,
}

impl LocalCommunicator {
    /// A fully connected group of `size` ranks.
    pub fn group(size: usize) -> Vec<LocalCommunicator> {
        // channels[from][to]
        let channels: Vec<Vec<(Sender<Vec<u8>>, Receiver<Vec<u8>>)>> =
            (0..size).map(|_| (0..size).map(|_| unbounded()).collect()).collect();

        (0..size)
            .map(|rank| LocalCommunicator {
                rank,
                outgoing: (0..size).map(|to| channels[rank][to].0.clone()).collect(),
                incoming: (0..size).map(|from| channels[from][rank].1.clone()).collect(),
            })
            .collect()
    }

    fn check_peer(&self, peer: usize) -> FlowResult<()> {
        if peer >= self.outgoing.len() || peer == self.rank {
            return Err(FlowError::Communication(format!(
                "rank {} cannot talk to rank {} in a group of {}",
                self.rank,
                peer,
                self.outgoing.len()
            )));
        }
        Ok(())
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.outgoing.len()
    }

    fn send(&self, to: usize, data: Vec<u8>) -> FlowResult<()> {
        self.check_peer(to)?;
        tracing::trace!("rank {} -> {}: {} bytes", self.rank, to, data.len());
        self.outgoing[to]
            .send(data)
            .map_err(|_| FlowError::Communication(format!("rank {} has left the group", to)))
    }

    fn recv(&self, from: usize) -> FlowResult<Vec<u8>> {
        self.check_peer(from)?;
        self.incoming[from]
            .recv()
            .map_err(|_| FlowError::Communication(format!("rank {} has left the group", from)))
    }
}

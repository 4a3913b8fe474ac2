//! Reduction programs: which rank sends to which, round by round.
//!
//! A program is plain data, built once from an ordered rank list and then
//! walked by whoever moves the bytes. Swapping the topology changes the
//! rounds, not the consumer.

use crate::config::TopologyKind;
use std::fmt;

/// `receiver` absorbs `sender`'s partial result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankPair {
    pub receiver: usize,
    pub sender: usize,
}

impl RankPair {
    pub fn new(receiver: usize, sender: usize) -> Self {
        Self { receiver, sender }
    }
}

/// One round of pairwise transfers and the ranks still active after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub pairs: Vec<RankPair>,
    pub survivors: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunicationProgram {
    participants: Vec<usize>,
    rounds: Vec<Round>,
}

impl CommunicationProgram {
    pub fn new(participants: Vec<usize>, rounds: Vec<Round>) -> Self {
        Self { participants, rounds }
    }

    pub fn participants(&self) -> &[usize] {
        &self.participants
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn number_of_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Rank holding the final result. `None` for an empty rank list.
    pub fn root(&self) -> Option<usize> {
        match self.rounds.last() {
            Some(round) => round.survivors.first().copied(),
            None => self.participants.first().copied(),
        }
    }

    /// The pair `rank` takes part in during `round`, if any.
    pub fn pair_for(&self, round: usize, rank: usize) -> Option<RankPair> {
        self.rounds
            .get(round)?
            .pairs
            .iter()
            .copied()
            .find(|p| p.receiver == rank || p.sender == rank)
    }
}

impl fmt::Display for CommunicationProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, round) in self.rounds.iter().enumerate() {
            write!(f, "round {}:", i)?;
            for p in &round.pairs {
                write!(f, " ({},{})", p.receiver, p.sender)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Strategy for building a [`CommunicationProgram`].
pub trait ReductionTopology: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn make_program(&self, ranks: &[usize]) -> CommunicationProgram;
}

/// Pair adjacent ranks and halve the active list each round.
///
/// An odd rank out passes through to the next round untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryTreeTopology;

impl ReductionTopology for BinaryTreeTopology {
    fn name(&self) -> &'static str {
        "binary_tree"
    }

    fn make_program(&self, ranks: &[usize]) -> CommunicationProgram {
        let mut rounds = Vec::new();
        let mut active = ranks.to_vec();
        while active.len() > 1 {
            let pairs: Vec<RankPair> = active
                .chunks(2)
                .filter(|c| c.len() == 2)
                .map(|c| RankPair::new(c[0], c[1]))
                .collect();
            active = active.chunks(2).map(|c| c[0]).collect();
            rounds.push(Round {
                pairs,
                survivors: active.clone(),
            });
        }
        CommunicationProgram::new(ranks.to_vec(), rounds)
    }
}

/// Fold every rank into the first one, one sender per round.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTopology;

impl ReductionTopology for LinearTopology {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn make_program(&self, ranks: &[usize]) -> CommunicationProgram {
        let mut rounds = Vec::new();
        if let Some((&first, rest)) = ranks.split_first() {
            for (i, &sender) in rest.iter().enumerate() {
                let mut survivors = vec![first];
                survivors.extend_from_slice(&rest[i + 1..]);
                rounds.push(Round {
                    pairs: vec![RankPair::new(first, sender)],
                    survivors,
                });
            }
        }
        CommunicationProgram::new(ranks.to_vec(), rounds)
    }
}

/// Topology named by the engine configuration.
pub fn topology_for(kind: TopologyKind) -> Box<dyn ReductionTopology> {
    match kind {
        TopologyKind::BinaryTree => Box::new(BinaryTreeTopology),
        TopologyKind::Linear => Box::new(LinearTopology),
    }
}

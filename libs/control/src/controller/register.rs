//! Register round
//!
//! `Collecting → Complete`, once per controller lifetime. Every rank sends
//! its own node; once all `size` ranks are in, the completed table goes back
//! to every one of them.

use super::Waiter;
use crate::{ControlError, Result};
use codec::RegisterReply;
use types::{Node, NodeTable, TypesError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterPhase {
    Collecting,
    Complete,
}

#[derive(Debug)]
pub struct RegisterRound {
    table: NodeTable,
    waiters: Vec<Option<Waiter>>,
    registered: usize,
    phase: RegisterPhase,
}

/// Registration finished: one reply body for every registered rank
#[derive(Debug)]
pub struct RegisterRelease {
    pub reply: RegisterReply,
    pub waiters: Vec<Waiter>,
}

impl RegisterRound {
    pub fn new(size: usize) -> Self {
        Self {
            table: NodeTable::new(size),
            waiters: vec![None; size],
            registered: 0,
            phase: RegisterPhase::Collecting,
        }
    }

    pub fn phase(&self) -> RegisterPhase {
        self.phase
    }

    pub fn registered(&self) -> usize {
        self.registered
    }

    /// The membership table, once complete
    pub fn table(&self) -> Option<&NodeTable> {
        match self.phase {
            RegisterPhase::Complete => Some(&self.table),
            RegisterPhase::Collecting => None,
        }
    }

    /// Take every rank still waiting for the table
    pub fn drain_waiters(&mut self) -> Vec<Waiter> {
        self.waiters.iter_mut().filter_map(Option::take).collect()
    }

    /// Record one registration; returns the release when it was the last one
    pub fn record(&mut self, waiter: Waiter, node: Node) -> Result<Option<RegisterRelease>> {
        if self.phase == RegisterPhase::Complete {
            return Err(ControlError::RegistrationClosed { rank: node.rank });
        }

        let size = self.table.len();
        let slot = self
            .waiters
            .get_mut(node.rank as usize)
            .ok_or(TypesError::RankOutOfRange {
                rank: node.rank,
                size,
            })?;
        if slot.is_some() {
            return Err(ControlError::DuplicateRegistration { rank: node.rank });
        }

        self.table.set(node)?;
        *slot = Some(waiter);
        self.registered += 1;

        if self.registered < size {
            return Ok(None);
        }

        self.table.mark_complete();
        self.phase = RegisterPhase::Complete;
        let waiters = self.waiters.iter_mut().filter_map(Option::take).collect();
        Ok(Some(RegisterRelease {
            reply: RegisterReply::from_table(self.table.clone()),
            waiters,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::Role;

    fn waiter(rank: u32) -> Waiter {
        Waiter {
            rank,
            correlation: 100 + rank as u64,
        }
    }

    #[test]
    fn test_completes_after_all_ranks() {
        let mut round = RegisterRound::new(3);
        assert!(round.record(waiter(2), Node::new(2, Role::SERVER)).unwrap().is_none());
        assert!(round.record(waiter(0), Node::new(0, Role::NONE)).unwrap().is_none());
        assert!(round.table().is_none());

        let release = round
            .record(waiter(1), Node::new(1, Role::WORKER | Role::SERVER))
            .unwrap()
            .unwrap();

        assert_eq!(round.phase(), RegisterPhase::Complete);
        assert_eq!(release.reply.num_workers, 1);
        assert_eq!(release.reply.num_servers, 2);
        assert!(release.reply.table.is_complete());
        let ranks: Vec<u32> = release.waiters.iter().map(|w| w.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
        assert_eq!(release.waiters[1].correlation, 101);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut round = RegisterRound::new(2);
        round.record(waiter(1), Node::new(1, Role::WORKER)).unwrap();
        let err = round
            .record(waiter(1), Node::new(1, Role::WORKER))
            .unwrap_err();
        assert!(matches!(err, ControlError::DuplicateRegistration { rank: 1 }));
        assert_eq!(round.registered(), 1);
    }

    #[test]
    fn test_request_after_completion() {
        let mut round = RegisterRound::new(1);
        round.record(waiter(0), Node::new(0, Role::WORKER)).unwrap().unwrap();
        let err = round
            .record(waiter(0), Node::new(0, Role::WORKER))
            .unwrap_err();
        assert!(matches!(err, ControlError::RegistrationClosed { rank: 0 }));
    }

    #[test]
    fn test_rank_out_of_range() {
        let mut round = RegisterRound::new(2);
        let err = round.record(waiter(5), Node::new(5, Role::WORKER)).unwrap_err();
        assert!(matches!(
            err,
            ControlError::Types(TypesError::RankOutOfRange { rank: 5, size: 2 })
        ));
    }

    #[test]
    fn test_drain_takes_waiting_ranks() {
        let mut round = RegisterRound::new(3);
        round.record(waiter(2), Node::new(2, Role::WORKER)).unwrap();
        round.record(waiter(0), Node::new(0, Role::SERVER)).unwrap();
        assert_eq!(round.drain_waiters(), vec![waiter(0), waiter(2)]);
        assert!(round.drain_waiters().is_empty());
    }
}

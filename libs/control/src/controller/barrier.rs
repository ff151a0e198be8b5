//! Barrier epochs
//!
//! ```text
//! Open(epoch, arrivals) ──(arrivals == size)──▶ Released ──▶ Open(epoch + 1, deferred)
//! ```
//!
//! A rank counts at most once per epoch. A second arrival from a rank that
//! is already counted belongs to the next epoch: it is parked and replayed
//! right after the release, so an early next-round arrival is never counted
//! twice and never lost.

use super::Waiter;
use crate::Result;
use std::collections::VecDeque;
use tracing::debug;
use types::{Rank, TypesError};

#[derive(Debug)]
pub struct BarrierEpochs {
    size: usize,
    epoch: u64,
    counted: Vec<bool>,
    arrivals: Vec<Waiter>,
    deferred: VecDeque<Waiter>,
}

/// Every waiter of one released epoch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierRelease {
    pub epoch: u64,
    pub waiters: Vec<Waiter>,
}

impl BarrierEpochs {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            epoch: 0,
            counted: vec![false; size],
            arrivals: Vec::with_capacity(size),
            deferred: VecDeque::new(),
        }
    }

    /// Epoch currently collecting arrivals
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Arrivals counted in the open epoch
    pub fn arrived(&self) -> usize {
        self.arrivals.len()
    }

    /// Arrivals parked for a later epoch
    pub fn deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Take every waiter, counted or deferred, leaving the epoch empty
    pub fn drain_waiters(&mut self) -> Vec<Waiter> {
        self.counted.iter_mut().for_each(|counted| *counted = false);
        let mut waiters = std::mem::take(&mut self.arrivals);
        waiters.extend(self.deferred.drain(..));
        waiters
    }

    /// Record one arrival; returns every epoch it released, oldest first
    pub fn arrive(&mut self, waiter: Waiter) -> Result<Vec<BarrierRelease>> {
        self.check_rank(waiter.rank)?;

        let mut released = Vec::new();
        if let Some(release) = self.count(waiter) {
            released.push(release);
            self.replay(&mut released);
        }
        Ok(released)
    }

    fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank as usize >= self.size {
            return Err(TypesError::RankOutOfRange {
                rank,
                size: self.size,
            }
            .into());
        }
        Ok(())
    }

    fn count(&mut self, waiter: Waiter) -> Option<BarrierRelease> {
        let counted = &mut self.counted[waiter.rank as usize];
        if *counted {
            debug!(
                rank = waiter.rank,
                epoch = self.epoch,
                "Deferring early barrier arrival to the next epoch"
            );
            self.deferred.push_back(waiter);
            return None;
        }
        *counted = true;
        self.arrivals.push(waiter);

        if self.arrivals.len() < self.size {
            return None;
        }

        // Release and reset in one step
        let release = BarrierRelease {
            epoch: self.epoch,
            waiters: std::mem::replace(&mut self.arrivals, Vec::with_capacity(self.size)),
        };
        self.counted.iter_mut().for_each(|counted| *counted = false);
        self.epoch += 1;
        Some(release)
    }

    /// Feed parked arrivals into the freshly opened epoch
    fn replay(&mut self, released: &mut Vec<BarrierRelease>) {
        loop {
            let pending = std::mem::take(&mut self.deferred);
            let mut progressed = false;
            for waiter in pending {
                if let Some(release) = self.count(waiter) {
                    released.push(release);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
    }
}

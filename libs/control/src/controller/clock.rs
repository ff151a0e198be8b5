//! Bounded-staleness clock
//!
//! A clock request `{rank, clock}` means worker `rank` finished tick `clock`.
//! With `min` the smallest clock over all workers (0 until a worker reports),
//! a request is granted iff `clock <= min + staleness`; otherwise it is
//! parked and looked at again whenever `min` moves.

use super::Waiter;
use crate::{ControlError, Result};
use std::collections::BTreeMap;
use tracing::debug;
use types::Rank;

/// A clock request that may proceed, with the minimum at grant time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockRelease {
    pub waiter: Waiter,
    pub clock: u64,
    pub min_clock: u64,
}

#[derive(Debug)]
pub struct ClockTracker {
    staleness: u64,
    clocks: BTreeMap<Rank, Option<u64>>,
    parked: Vec<(Waiter, u64)>,
}

impl ClockTracker {
    /// Track the given worker ranks
    pub fn new(workers: impl IntoIterator<Item = Rank>, staleness: u64) -> Self {
        Self {
            staleness,
            clocks: workers.into_iter().map(|rank| (rank, None)).collect(),
            parked: Vec::new(),
        }
    }

    pub fn staleness(&self) -> u64 {
        self.staleness
    }

    /// Smallest clock over every tracked worker
    pub fn min_clock(&self) -> u64 {
        self.clocks
            .values()
            .map(|clock| clock.unwrap_or(0))
            .min()
            .unwrap_or(0)
    }

    /// Last clock reported by `rank`
    pub fn clock_of(&self, rank: Rank) -> Option<u64> {
        self.clocks.get(&rank).copied().flatten()
    }

    pub fn parked(&self) -> usize {
        self.parked.len()
    }

    /// Take every parked request
    pub fn drain_waiters(&mut self) -> Vec<Waiter> {
        self.parked.drain(..).map(|(waiter, _)| waiter).collect()
    }

    /// Record a finished tick; returns every request now allowed to proceed
    pub fn report(&mut self, waiter: Waiter, clock: u64) -> Result<Vec<ClockRelease>> {
        let rank = waiter.rank;
        let last = *self
            .clocks
            .get(&rank)
            .ok_or(ControlError::NotAWorker { rank })?;
        if let Some(previous) = last {
            if clock <= previous {
                return Err(ControlError::ClockRegression {
                    rank,
                    previous,
                    got: clock,
                });
            }
        }

        let min_before = self.min_clock();
        self.clocks.insert(rank, Some(clock));
        let min_clock = self.min_clock();

        let mut granted = Vec::new();
        if min_clock > min_before {
            debug!(min_before, min_clock, "Minimum clock advanced");
            let bound = min_clock.saturating_add(self.staleness);
            let parked = std::mem::take(&mut self.parked);
            let (ready, still_parked): (Vec<_>, Vec<_>) =
                parked.into_iter().partition(|(_, clock)| *clock <= bound);
            self.parked = still_parked;
            granted.extend(ready.into_iter().map(|(waiter, clock)| ClockRelease {
                waiter,
                clock,
                min_clock,
            }));
        }

        if clock <= min_clock.saturating_add(self.staleness) {
            granted.push(ClockRelease {
                waiter,
                clock,
                min_clock,
            });
        } else {
            debug!(rank, clock, min_clock, staleness = self.staleness, "Parking clock request");
            self.parked.push((waiter, clock));
        }
        Ok(granted)
    }
}

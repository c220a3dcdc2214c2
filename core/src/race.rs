//! Bookkeeping for callers waiting on numbered renders.
//!
//! Every emit of an async generator gets a sequence number. Callers register
//! interest in "the first emit numbered at least `n`" and are resolved when
//! emit `n`, or any later one, commits.

use alloc::collections::BTreeMap;

use futures::{FutureExt, channel::oneshot};

use crate::{error::Error, spawn::Pending};

#[derive(Default)]
pub(crate) struct RaceRecord {
    waiters: BTreeMap<u64, (oneshot::Sender<Result<(), Error>>, Pending)>,
}

impl RaceRecord {
    /// Returns the shared waiter for `threshold`, creating it on first use.
    pub(crate) fn register(&mut self, threshold: u64) -> Pending {
        if let Some((_, pending)) = self.waiters.get(&threshold) {
            return pending.clone();
        }
        let (tx, rx) = oneshot::channel();
        let pending = rx
            .map(|result| result.unwrap_or(Err(Error::Canceled)))
            .boxed_local()
            .shared();
        self.waiters.insert(threshold, (tx, pending.clone()));
        pending
    }

    /// Resolves every waiter registered at or below `sequence`.
    pub(crate) fn settle_through(&mut self, sequence: u64, result: &Result<(), Error>) {
        let rest = self.waiters.split_off(&sequence.saturating_add(1));
        let settled = core::mem::replace(&mut self.waiters, rest);
        for (_, (tx, _)) in settled {
            let _ = tx.send(result.clone());
        }
    }

    /// Resolves every waiter.
    pub(crate) fn settle_all(&mut self, result: &Result<(), Error>) {
        for (_, (tx, _)) in core::mem::take(&mut self.waiters) {
            let _ = tx.send(result.clone());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiters_for_the_same_sequence_share_a_subscription() {
        let mut record = RaceRecord::default();
        let first = record.register(3);
        let second = record.register(3);
        assert_eq!(record.len(), 1);
        record.settle_through(3, &Ok(()));
        let first = futures::executor::block_on(first);
        let second = futures::executor::block_on(second);
        assert!(first.is_ok() && second.is_ok());
    }

    #[test]
    fn settling_leaves_later_waiters_alone() {
        let mut record = RaceRecord::default();
        let early = record.register(1);
        let late = record.register(5);
        record.settle_through(2, &Err(Error::Canceled));
        assert_eq!(record.len(), 1);
        assert!(matches!(
            futures::executor::block_on(early),
            Err(Error::Canceled)
        ));
        record.settle_all(&Ok(()));
        assert!(futures::executor::block_on(late).is_ok());
        assert_eq!(record.len(), 0);
    }

    #[test]
    fn dropping_the_record_cancels_waiters() {
        let mut record = RaceRecord::default();
        let waiter = record.register(1);
        drop(record);
        assert!(matches!(
            futures::executor::block_on(waiter),
            Err(Error::Canceled)
        ));
    }
}

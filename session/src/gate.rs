//! Single-flight refresh coordination.
//!
//! The first request that needs a refresh gets a [`RefreshLease`] and performs
//! the refresh; everyone arriving while it runs is queued as a [`Waiter`] and
//! receives the lease holder's outcome, in arrival order.
//!
//! ```text
//! Idle ──join()──> Refreshing { queue } ──settle()/drop──> Idle
//!                     ^      |
//!                     └join()┘ (push waiter)
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use backoffice_types::AccessToken;
use tokio::sync::oneshot;

use crate::RefreshError;

pub(crate) type RefreshOutcome = Result<AccessToken, RefreshError>;

#[derive(Debug)]
struct Waiter {
    ticket: u64,
    tx: oneshot::Sender<RefreshOutcome>,
}

#[derive(Debug)]
enum GateState {
    Idle,
    Refreshing { queue: VecDeque<Waiter> },
}

#[derive(Debug)]
pub(crate) struct RefreshGate {
    state: Mutex<GateState>,
    next_ticket: AtomicU64,
}

pub(crate) enum Ticket<'a> {
    /// Caller must run the refresh and settle the lease.
    Leader(RefreshLease<'a>),
    /// A refresh is already in flight; await its outcome.
    Waiter {
        ticket: u64,
        rx: oneshot::Receiver<RefreshOutcome>,
    },
}

impl RefreshGate {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub(crate) fn join(&self) -> Ticket<'_> {
        let mut state = self.lock();
        if let GateState::Refreshing { queue } = &mut *state {
            let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            queue.push_back(Waiter { ticket, tx });
            return Ticket::Waiter { ticket, rx };
        }

        *state = GateState::Refreshing {
            queue: VecDeque::new(),
        };
        Ticket::Leader(RefreshLease {
            gate: self,
            settled: false,
        })
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), GateState::Refreshing { .. })
    }

    pub(crate) fn queued(&self) -> usize {
        match &*self.lock() {
            GateState::Idle => 0,
            GateState::Refreshing { queue } => queue.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_queue(&self) -> VecDeque<Waiter> {
        match std::mem::replace(&mut *self.lock(), GateState::Idle) {
            GateState::Refreshing { queue } => queue,
            GateState::Idle => VecDeque::new(),
        }
    }
}

/// Proof that the holder owns the in-flight refresh.
///
/// Dropping an unsettled lease (the refreshing task was cancelled) reopens the
/// gate and drops every queued sender, so waiters observe an abandoned refresh
/// instead of hanging.
pub(crate) struct RefreshLease<'a> {
    gate: &'a RefreshGate,
    settled: bool,
}

impl RefreshLease<'_> {
    /// Reopen the gate and hand `outcome` to every waiter in FIFO order.
    ///
    /// Returns the tickets in the order they were resolved.
    pub(crate) fn settle(mut self, outcome: &RefreshOutcome) -> Vec<u64> {
        self.settled = true;
        let queue = self.gate.take_queue();
        let mut resolved = Vec::with_capacity(queue.len());
        for waiter in queue {
            resolved.push(waiter.ticket);
            // A waiter whose request was cancelled has dropped its receiver.
            let _ = waiter.tx.send(outcome.clone());
        }
        resolved
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let abandoned = self.gate.take_queue();
        tracing::warn!(
            waiters = abandoned.len(),
            "Token refresh abandoned before completion"
        );
    }
}

pub(crate) async fn wait(rx: oneshot::Receiver<RefreshOutcome>) -> RefreshOutcome {
    rx.await.unwrap_or(Err(RefreshError::Abandoned))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str) -> AccessToken {
        AccessToken::new(value).unwrap()
    }

    fn expect_leader(ticket: Ticket<'_>) -> RefreshLease<'_> {
        match ticket {
            Ticket::Leader(lease) => lease,
            Ticket::Waiter { .. } => panic!("expected leader"),
        }
    }

    fn expect_waiter(ticket: Ticket<'_>) -> (u64, oneshot::Receiver<RefreshOutcome>) {
        match ticket {
            Ticket::Waiter { ticket, rx } => (ticket, rx),
            Ticket::Leader(_) => panic!("expected waiter"),
        }
    }

    #[test]
    fn first_join_leads_and_later_joins_queue() {
        let gate = RefreshGate::new();
        assert!(!gate.is_refreshing());

        let lease = expect_leader(gate.join());
        assert!(gate.is_refreshing());
        let (_, _rx1) = expect_waiter(gate.join());
        let (_, _rx2) = expect_waiter(gate.join());
        assert_eq!(gate.queued(), 2);

        lease.settle(&Ok(token("fresh")));
        assert!(!gate.is_refreshing());
        assert_eq!(gate.queued(), 0);
    }

    #[tokio::test]
    async fn settle_resolves_waiters_in_fifo_order() {
        let gate = RefreshGate::new();
        let lease = expect_leader(gate.join());
        let (r1, rx1) = expect_waiter(gate.join());
        let (r2, rx2) = expect_waiter(gate.join());
        let (r3, rx3) = expect_waiter(gate.join());

        let resolved = lease.settle(&Ok(token("fresh")));
        assert_eq!(resolved, vec![r1, r2, r3]);

        for rx in [rx1, rx2, rx3] {
            let outcome = wait(rx).await.unwrap();
            assert_eq!(outcome.expose_secret(), "fresh");
        }
    }

    #[tokio::test]
    async fn rejection_fans_out_to_every_waiter() {
        let gate = RefreshGate::new();
        let lease = expect_leader(gate.join());
        let (_, rx1) = expect_waiter(gate.join());
        let (_, rx2) = expect_waiter(gate.join());

        lease.settle(&Err(RefreshError::MissingToken));

        assert!(matches!(wait(rx1).await, Err(RefreshError::MissingToken)));
        assert!(matches!(wait(rx2).await, Err(RefreshError::MissingToken)));
    }

    #[tokio::test]
    async fn dropped_lease_abandons_waiters_and_reopens_gate() {
        let gate = RefreshGate::new();
        let lease = expect_leader(gate.join());
        let (_, rx) = expect_waiter(gate.join());

        drop(lease);

        assert!(matches!(wait(rx).await, Err(RefreshError::Abandoned)));
        assert!(!gate.is_refreshing());
        // The next 401 starts a fresh refresh.
        assert!(matches!(gate.join(), Ticket::Leader(_)));
    }

    #[test]
    fn settle_tolerates_cancelled_waiters() {
        let gate = RefreshGate::new();
        let lease = expect_leader(gate.join());
        let (r1, rx1) = expect_waiter(gate.join());
        let (r2, _rx2) = expect_waiter(gate.join());
        drop(rx1);

        assert_eq!(lease.settle(&Ok(token("fresh"))), vec![r1, r2]);
    }
}

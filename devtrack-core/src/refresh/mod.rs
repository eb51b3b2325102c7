//! Single-flight access token refresh.
//!
//! This module provides:
//! - [`RefreshCoordinator`] - The Idle/Refreshing state machine and waiter queue
//! - [`TokenRefresher`] / [`HttpTokenRefresher`] - The exchange it drives
//! - [`UnauthorizedHook`] - Notification slot fired when a cycle fails
//!
//! # Protocol
//!
//! The first caller to enter while the coordinator is Idle becomes the
//! leader of a cycle and runs exactly one exchange. Callers arriving while
//! the cycle is in progress register a pending waiter and suspend. When the
//! exchange completes, every waiter registered so far is resolved in
//! registration order with the same outcome, and the coordinator returns to
//! Idle.
//!
//! Callers enter either because a request was rejected with 401
//! ([`renew`](RefreshCoordinator::renew)) or because the user asked for a
//! refresh ([`refresh_now`](RefreshCoordinator::refresh_now)). Both share
//! the same cycle. A failed cycle that any rejected request led or joined
//! also clears the stored credentials and fires the unauthorized hook once;
//! a failed cycle entered only explicitly just reports the error.
//!
//! The Idle check and the transition to Refreshing happen under one lock,
//! before any await, so two callers can never both lead.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::{ApiError, ApiResult};
use crate::store::{CredentialStore, Secret};

mod exchange;
mod hook;

pub use exchange::{
    HttpTokenRefresher, REFRESH_PATH, RefreshRequest, RefreshResponse, RefreshedTokens,
    TokenRefresher,
};
pub use hook::UnauthorizedHook;

/// Why a caller entered the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// A request was rejected with 401 and waits to be replayed.
    Rejected,
    /// A caller asked for a refresh directly.
    Explicit,
}

/// A caller suspended until the current cycle completes.
struct PendingWaiter {
    ticket: u64,
    resolve: oneshot::Sender<ApiResult<RefreshedTokens>>,
}

#[derive(Default)]
struct CycleState {
    refreshing: bool,
    /// A rejected request depends on the current cycle.
    forces_logout: bool,
    waiters: Vec<PendingWaiter>,
    next_ticket: u64,
    cycles: u64,
}

enum Role {
    Leader,
    Waiter(u64, oneshot::Receiver<ApiResult<RefreshedTokens>>),
}

/// Owns the in-progress flag and the waiter queue.
///
/// One instance per process, shared by reference with the transport and
/// the auth service.
pub struct RefreshCoordinator {
    state: Mutex<CycleState>,
    refresher: Arc<dyn TokenRefresher>,
    store: CredentialStore,
    hook: UnauthorizedHook,
}

impl RefreshCoordinator {
    /// Create a coordinator driving `refresher`.
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        store: CredentialStore,
        hook: UnauthorizedHook,
    ) -> Self {
        Self {
            state: Mutex::new(CycleState::default()),
            refresher,
            store,
            hook,
        }
    }

    /// Whether a cycle is in progress.
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().refreshing
    }

    /// Number of waiters queued on the current cycle.
    pub fn pending(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Number of exchanges started since creation.
    pub fn cycles(&self) -> u64 {
        self.state.lock().cycles
    }

    /// The unauthorized notification slot.
    pub fn hook(&self) -> &UnauthorizedHook {
        &self.hook
    }

    /// Obtain a renewed access token for a request rejected with 401,
    /// leading a new cycle or joining the one in progress.
    pub async fn renew(&self) -> ApiResult<Secret> {
        self.run(Trigger::Rejected)
            .await
            .map(|tokens| tokens.access_token)
    }

    /// Refresh on request, leading a new cycle or joining the one in
    /// progress.
    ///
    /// A failure is returned without clearing the session, unless a
    /// rejected request joined the same cycle.
    pub async fn refresh_now(&self) -> ApiResult<RefreshedTokens> {
        self.run(Trigger::Explicit).await
    }

    async fn run(&self, trigger: Trigger) -> ApiResult<RefreshedTokens> {
        match self.enter(trigger) {
            Role::Leader => self.lead().await,
            Role::Waiter(ticket, receiver) => {
                tracing::debug!("Refresh in progress, queued as waiter #{}", ticket);
                receiver
                    .await
                    .unwrap_or_else(|_| Err(ApiError::unknown("Token refresh was abandoned.")))
            }
        }
    }

    fn enter(&self, trigger: Trigger) -> Role {
        let mut state = self.state.lock();
        if trigger == Trigger::Rejected {
            state.forces_logout = true;
        }

        if state.refreshing {
            let (resolve, receiver) = oneshot::channel();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiters.push(PendingWaiter { ticket, resolve });
            Role::Waiter(ticket, receiver)
        } else {
            state.refreshing = true;
            state.cycles += 1;
            Role::Leader
        }
    }

    async fn lead(&self) -> ApiResult<RefreshedTokens> {
        let cycle = CycleGuard {
            coordinator: self,
            finished: false,
        };
        tracing::info!("Starting refresh cycle");

        let outcome = self.refresher.refresh().await;

        let mut cleared = false;
        if let Err(e) = &outcome {
            if self.state.lock().forces_logout {
                tracing::warn!("Token refresh failed, clearing session: {}", e);
                self.store.clear().await;
                cleared = true;
            } else {
                tracing::warn!("Token refresh failed: {}", e);
            }
        }

        // A rejected request may still join after the check above.
        let joined_by_rejected = cycle.finish(&outcome);
        let forced_logout = outcome.is_err() && joined_by_rejected;
        if forced_logout && !cleared {
            self.store.clear().await;
        }

        if forced_logout && !self.hook.notify() {
            tracing::debug!("No unauthorized hook registered");
        }
        outcome
    }

    /// Return to Idle and resolve every queued waiter, oldest first.
    ///
    /// Returns whether a rejected request took part in the cycle.
    fn flush(&self, outcome: &ApiResult<RefreshedTokens>) -> bool {
        let (waiters, forces_logout) = {
            let mut state = self.state.lock();
            state.refreshing = false;
            let forces_logout = std::mem::take(&mut state.forces_logout);
            (std::mem::take(&mut state.waiters), forces_logout)
        };

        if !waiters.is_empty() {
            tracing::debug!(
                "Flushing {} waiter(s) ({})",
                waiters.len(),
                if outcome.is_ok() { "renewed" } else { "rejected" }
            );
        }

        for waiter in waiters {
            if waiter.resolve.send(outcome.clone()).is_err() {
                tracing::debug!("Waiter #{} went away before the flush", waiter.ticket);
            }
        }
        forces_logout
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &state.refreshing)
            .field("pending", &state.waiters.len())
            .field("cycles", &state.cycles)
            .finish()
    }
}

/// Releases the cycle even if the leader's future is dropped mid-exchange.
struct CycleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    finished: bool,
}

impl CycleGuard<'_> {
    fn finish(mut self, outcome: &ApiResult<RefreshedTokens>) -> bool {
        self.finished = true;
        self.coordinator.flush(outcome)
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Refresh cycle interrupted, releasing waiters");
            self.coordinator
                .flush(&Err(ApiError::unknown("Token refresh was interrupted.")));
        }
    }
}

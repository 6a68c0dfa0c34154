//! Single-flight refresh coordination: one in-flight refresh, N waiters
//! released together.
//!
//! The coordinator owns the refresh-in-flight flag and the pending-waiter
//! queue described by the gateway's refresh protocol. The flag check and set
//! happen under one lock acquisition with no await point in between, so at
//! most one caller ever becomes the leader of a refresh cycle; everyone else
//! receives a oneshot continuation that resolves when the leader settles the
//! cycle. The queue lives for exactly one cycle: it is drained in FIFO order
//! the moment the refresh resolves or rejects and is never persisted.

// crates.io
use tokio::sync::oneshot;
// self
use crate::{_prelude::*, error::SessionError};

/// Outcome broadcast to every participant of a refresh cycle: the new access
/// token, or the rejection derived from the refresh failure.
pub type RefreshOutcome = Result<String, SessionError>;

/// Role assigned to a caller entering the refresh protocol.
#[derive(Debug)]
pub enum RefreshTicket {
	/// This caller owns the refresh cycle and must settle it via the lease.
	Leader(RefreshLease),
	/// A refresh is already in flight; await the receiver for its outcome.
	Follower(oneshot::Receiver<RefreshOutcome>),
}

/// Explicit owner of the refresh-in-flight flag and waiter queue.
///
/// Owned by the composition root and injected into the gateway so its
/// lifecycle is explicit and a fresh coordinator can be constructed per test.
#[derive(Debug, Default)]
pub struct TokenCoordinator {
	state: Mutex<CoordinatorState>,
}

#[derive(Debug, Default)]
struct CoordinatorState {
	refresh_in_flight: bool,
	waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

impl TokenCoordinator {
	/// Creates an idle coordinator.
	pub fn new() -> Self {
		Self::default()
	}

	/// Enters the refresh protocol.
	///
	/// The first caller while the coordinator is idle becomes the
	/// [`RefreshTicket::Leader`]; every caller arriving while a refresh is in
	/// flight is enqueued as a [`RefreshTicket::Follower`]. Both decisions
	/// happen under the same lock acquisition, which is the mutual-exclusion
	/// guarantee for the whole protocol.
	pub fn begin(this: &Arc<Self>) -> RefreshTicket {
		let mut state = this.state.lock();

		if state.refresh_in_flight {
			let (sender, receiver) = oneshot::channel();

			state.waiters.push(sender);

			RefreshTicket::Follower(receiver)
		} else {
			state.refresh_in_flight = true;

			RefreshTicket::Leader(RefreshLease { coordinator: Arc::clone(this), fulfilled: false })
		}
	}

	/// Returns `true` while a refresh cycle is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().refresh_in_flight
	}

	/// Returns the number of queued waiters (zero whenever idle).
	pub fn pending_waiters(&self) -> usize {
		self.state.lock().waiters.len()
	}

	fn settle(&self, outcome: RefreshOutcome) {
		let waiters = {
			let mut state = self.state.lock();

			state.refresh_in_flight = false;

			std::mem::take(&mut state.waiters)
		};

		// FIFO dispatch. A waiter whose caller gave up is simply gone; the
		// send result is irrelevant.
		for waiter in waiters {
			let _ = waiter.send(outcome.clone());
		}
	}
}

/// Settlement handle held by the leader of a refresh cycle.
///
/// Dropping the lease without fulfilling it releases every waiter with a
/// rejection, so a cancelled leader future cannot leave followers pending
/// forever.
pub struct RefreshLease {
	coordinator: Arc<TokenCoordinator>,
	fulfilled: bool,
}
impl RefreshLease {
	/// Settles the cycle: clears the in-flight flag and releases every queued
	/// waiter with the provided outcome.
	pub fn fulfill(mut self, outcome: RefreshOutcome) {
		self.fulfilled = true;
		self.coordinator.settle(outcome);
	}
}
impl Drop for RefreshLease {
	fn drop(&mut self) {
		if !self.fulfilled {
			self.coordinator.settle(Err(SessionError::RefreshRejected {
				reason: "The refresh attempt was abandoned before completing.".into(),
			}));
		}
	}
}
impl Debug for RefreshLease {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshLease").field("fulfilled", &self.fulfilled).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn expect_leader(ticket: RefreshTicket) -> RefreshLease {
		match ticket {
			RefreshTicket::Leader(lease) => lease,
			RefreshTicket::Follower(_) => panic!("Expected the leader ticket."),
		}
	}

	fn expect_follower(ticket: RefreshTicket) -> oneshot::Receiver<RefreshOutcome> {
		match ticket {
			RefreshTicket::Follower(receiver) => receiver,
			RefreshTicket::Leader(_) => panic!("Expected a follower ticket."),
		}
	}

	#[tokio::test]
	async fn single_leader_and_queued_followers_share_the_outcome() {
		let coordinator = Arc::new(TokenCoordinator::new());
		let lease = expect_leader(TokenCoordinator::begin(&coordinator));
		let first = expect_follower(TokenCoordinator::begin(&coordinator));
		let second = expect_follower(TokenCoordinator::begin(&coordinator));

		assert!(coordinator.is_refreshing());
		assert_eq!(coordinator.pending_waiters(), 2);

		lease.fulfill(Ok("A2".into()));

		assert_eq!(first.await.expect("First waiter should be released."), Ok("A2".into()));
		assert_eq!(second.await.expect("Second waiter should be released."), Ok("A2".into()));
		assert!(!coordinator.is_refreshing());
		assert_eq!(coordinator.pending_waiters(), 0);
	}

	#[tokio::test]
	async fn failures_are_broadcast_to_every_waiter() {
		let coordinator = Arc::new(TokenCoordinator::new());
		let lease = expect_leader(TokenCoordinator::begin(&coordinator));
		let waiter = expect_follower(TokenCoordinator::begin(&coordinator));
		let rejection = SessionError::RefreshRejected { reason: "upstream said no".into() };

		lease.fulfill(Err(rejection.clone()));

		assert_eq!(waiter.await.expect("Waiter should observe the failure."), Err(rejection));
		assert!(!coordinator.is_refreshing());
	}

	#[tokio::test]
	async fn dropping_the_lease_releases_waiters_with_a_rejection() {
		let coordinator = Arc::new(TokenCoordinator::new());
		let lease = expect_leader(TokenCoordinator::begin(&coordinator));
		let waiter = expect_follower(TokenCoordinator::begin(&coordinator));

		drop(lease);

		let outcome = waiter.await.expect("Waiter should be released on lease drop.");

		assert!(matches!(outcome, Err(SessionError::RefreshRejected { .. })));
		assert!(!coordinator.is_refreshing());
	}

	#[tokio::test]
	async fn coordinator_is_reusable_after_settlement() {
		let coordinator = Arc::new(TokenCoordinator::new());

		expect_leader(TokenCoordinator::begin(&coordinator)).fulfill(Ok("A2".into()));

		// A new cycle elects a fresh leader instead of queueing.
		let lease = expect_leader(TokenCoordinator::begin(&coordinator));

		lease.fulfill(Ok("A3".into()));
	}
}

use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex, MutexGuard, PoisonError,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use tokio::sync::Notify;
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket(Uuid);
impl Ticket {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn id(&self) -> Uuid {
		self.0
	}
}

impl Default for Ticket {
	fn default() -> Self {
		Self::new()
	}
}

/// Cooperative cancellation shared between a caller and the search it started.
#[derive(Debug, Default)]
pub struct CancelSignal {
	cancelled: AtomicBool,
	notify: Notify,
}
impl CancelSignal {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::SeqCst);
		self.notify.notify_waiters();
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}

	/// Resolves once `cancel` has been called.
	pub async fn cancelled(&self) {
		loop {
			let notified = self.notify.notified();

			tokio::pin!(notified);
			notified.as_mut().enable();

			if self.is_cancelled() {
				return;
			}

			notified.await;
		}
	}
}

/// System-wide FIFO of pending searches. Only the head ticket may run.
pub struct AdmissionQueue {
	queue: Mutex<VecDeque<Ticket>>,
	notify: Notify,
	poll_interval: Duration,
}
impl AdmissionQueue {
	pub fn new(poll_interval: Duration) -> Self {
		Self { queue: Mutex::new(VecDeque::new()), notify: Notify::new(), poll_interval }
	}

	/// Appends `ticket` to the tail. Returns its zero-based position.
	pub fn enqueue(&self, ticket: Ticket) -> usize {
		let mut queue = self.lock();

		if let Some(position) = queue.iter().position(|queued| *queued == ticket) {
			tracing::warn!(ticket = %ticket.id(), "Ticket is already queued.");

			return position;
		}

		queue.push_back(ticket);

		queue.len() - 1
	}

	pub fn is_head(&self, ticket: Ticket) -> bool {
		self.lock().front() == Some(&ticket)
	}

	pub fn position(&self, ticket: Ticket) -> Option<usize> {
		self.lock().iter().position(|queued| *queued == ticket)
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	/// Removes `ticket` wherever it sits and wakes every waiter.
	pub fn dequeue(&self, ticket: Ticket) -> bool {
		let removed = self.remove(ticket);

		if !removed {
			tracing::warn!(ticket = %ticket.id(), "Ticket was not queued.");
		}

		removed
	}

	/// Waits until `ticket` reaches the head. On cancellation the ticket leaves the queue.
	pub async fn wait_for_turn(&self, ticket: Ticket, cancel: &CancelSignal) -> Result<()> {
		loop {
			let notified = self.notify.notified();

			tokio::pin!(notified);
			notified.as_mut().enable();

			if cancel.is_cancelled() {
				self.remove(ticket);

				return Err(Error::Cancelled);
			}
			if self.is_head(ticket) {
				return Ok(());
			}

			tokio::select! {
				_ = &mut notified => {},
				_ = tokio::time::sleep(self.poll_interval) => {},
				_ = cancel.cancelled() => {},
			}
		}
	}

	/// Enqueues a fresh ticket and waits for its turn. Dropping the returned guard, or the
	/// future before it resolves, releases the slot.
	pub async fn admit(self: &Arc<Self>, cancel: &CancelSignal) -> Result<AdmissionGuard> {
		let ticket = Ticket::new();
		let position = self.enqueue(ticket);
		let guard = AdmissionGuard { queue: Arc::clone(self), ticket };

		tracing::debug!(ticket = %ticket.id(), position, "Search queued.");

		self.wait_for_turn(ticket, cancel).await?;

		Ok(guard)
	}

	fn remove(&self, ticket: Ticket) -> bool {
		let removed = {
			let mut queue = self.lock();

			match queue.iter().position(|queued| *queued == ticket) {
				Some(position) => queue.remove(position).is_some(),
				None => false,
			}
		};

		if removed {
			self.notify.notify_waiters();
		}

		removed
	}

	fn lock(&self) -> MutexGuard<'_, VecDeque<Ticket>> {
		self.queue.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

/// Holds the head slot. Dropping it dequeues the ticket.
pub struct AdmissionGuard {
	queue: Arc<AdmissionQueue>,
	ticket: Ticket,
}
impl AdmissionGuard {
	pub fn ticket(&self) -> Ticket {
		self.ticket
	}
}

impl Drop for AdmissionGuard {
	fn drop(&mut self) {
		self.queue.remove(self.ticket);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn head_follows_fifo_order() {
		let queue = AdmissionQueue::new(Duration::from_millis(100));
		let first = Ticket::new();
		let second = Ticket::new();

		assert_eq!(queue.enqueue(first), 0);
		assert_eq!(queue.enqueue(second), 1);
		assert!(queue.is_head(first));
		assert!(!queue.is_head(second));
		assert!(queue.dequeue(first));
		assert!(queue.is_head(second));
		assert_eq!(queue.position(second), Some(0));
	}

	#[test]
	fn tickets_are_never_queued_twice() {
		let queue = AdmissionQueue::new(Duration::from_millis(100));
		let ticket = Ticket::new();

		queue.enqueue(ticket);
		queue.enqueue(ticket);

		assert_eq!(queue.len(), 1);
	}

	#[test]
	fn dequeue_of_unknown_ticket_is_a_no_op() {
		let queue = AdmissionQueue::new(Duration::from_millis(100));
		let queued = Ticket::new();

		queue.enqueue(queued);

		assert!(!queue.dequeue(Ticket::new()));
		assert!(queue.is_head(queued));
	}

	#[test]
	fn empty_queue_has_no_head() {
		let queue = AdmissionQueue::new(Duration::from_millis(100));

		assert!(queue.is_empty());
		assert!(!queue.is_head(Ticket::new()));
	}
}

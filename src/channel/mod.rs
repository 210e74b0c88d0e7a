//! Messages from the sample-rate side of a channel (acquisition, valves) to the control-rate side.
//!
//! Producers hold an `EventSender` and never block.  The channel controller owns the single
//! `EventReceiver` and parks on `blocking_pop` until something arrives.  All producers go through one
//! tokio unbounded channel, so every consumer sees one arrival order and each producer's own pushes
//! stay in the order they were made.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

pub mod synchro;

pub use synchro::GnssSynchro;


#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
	/// A valve let its maximum number of items through and closed
	ValveClosed,
	/// Acquisition succeeded; the record is the controller's copy of the filled-in synchro record
	AcqSuccess(GnssSynchro),
	AcqFail,
	/// The input ended before a full integration buffer was collected
	StreamExhausted,
}

impl ChannelEvent {

	pub fn code(&self) -> u8 { match self {
		ChannelEvent::ValveClosed     => 0,
		ChannelEvent::AcqSuccess(_)   => 1,
		ChannelEvent::AcqFail         => 2,
		ChannelEvent::StreamExhausted => 3,
	}}

	pub fn is_success(&self) -> bool { matches!(self, ChannelEvent::AcqSuccess(_)) }

}

/// Why `EventReceiver::pop_timeout` came back empty-handed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PopError {
	#[error("No channel event arrived within the timeout")]
	Timeout,

	#[error("Every event sender is gone and the queue is drained")]
	Closed,

	#[error("pop_timeout can't block inside an async context")]
	InsideRuntime,

	#[error("Unable to start the timer: {0}")]
	Timer(String),
}

pub fn event_queue() -> (EventSender, EventReceiver) {
	let (tx, rx) = mpsc::unbounded_channel();
	(EventSender{ tx }, EventReceiver{ rx, rt: None })
}

#[derive(Debug, Clone)]
pub struct EventSender {
	tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl EventSender {

	pub fn push(&self, event:ChannelEvent) {
		let code = event.code();
		match self.tx.send(event) {
			Ok(()) => tracing::debug!(code, "Channel event pushed"),
			Err(_) => tracing::warn!(code, "Channel event dropped, no consumer left"),
		}
	}

}

#[derive(Debug)]
pub struct EventReceiver {
	rx: mpsc::UnboundedReceiver<ChannelEvent>,
	rt: Option<tokio::runtime::Runtime>,
}

impl EventReceiver {

	/// Parks the calling thread until an event arrives.  Returns None only after every sender has been
	/// dropped and the queue is drained.  Must not be called from inside an async context.
	pub fn blocking_pop(&mut self) -> Option<ChannelEvent> {
		self.rx.blocking_recv()
	}

	pub fn try_pop(&mut self) -> Option<ChannelEvent> {
		self.rx.try_recv().ok()
	}

	/// Like `blocking_pop`, but gives up after `timeout`.  Parks the calling thread on a private timer
	/// runtime, so it must not be called from inside an async context; doing so returns
	/// `PopError::InsideRuntime` instead of waiting.
	pub fn pop_timeout(&mut self, timeout:Duration) -> Result<ChannelEvent, PopError> {
		if tokio::runtime::Handle::try_current().is_ok() { return Err(PopError::InsideRuntime); }

		if self.rt.is_none() {
			let rt = tokio::runtime::Builder::new_current_thread().enable_time().build()
				.map_err(|e| PopError::Timer(e.to_string()))?;
			self.rt = Some(rt);
		}

		let EventReceiver{ rx, rt } = self;
		let rt = rt.as_ref().ok_or_else(|| PopError::Timer("no runtime".to_string()))?;
		match rt.block_on(async { tokio::time::timeout(timeout, rx.recv()).await }) {
			Ok(Some(event)) => Ok(event),
			Ok(None)        => Err(PopError::Closed),
			Err(_)          => Err(PopError::Timeout),
		}
	}

	pub fn len(&self) -> usize { self.rx.len() }
	pub fn is_empty(&self) -> bool { self.rx.is_empty() }

}

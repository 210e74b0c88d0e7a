use std::marker::PhantomData;

use serde::Serialize;

use crate::AcqError;
use crate::block::{BlockFunctionality as BlkFunc, BlockResult};
use crate::channel::{ChannelEvent, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValveStatus {
	pub forwarded:u64,
	pub closed:bool,
}

/// Lets at most `max_items` items through, then closes for good.  Closing pushes one
/// `ChannelEvent::ValveClosed`; everything offered after that is dropped and answered with `Done`.
#[derive(Debug)]
pub struct Valve<I> {
	max_items:u64,
	forwarded:u64,
	closed:bool,
	queue:Option<EventSender>,
	pi:PhantomData<I>,
}

impl<I> Valve<I> {

	pub fn new(max_items:u64, queue:Option<EventSender>) -> Self {
		Self { max_items, forwarded: 0, closed: false, queue, pi: PhantomData }
	}

	pub fn status(&self) -> ValveStatus { ValveStatus{ forwarded: self.forwarded, closed: self.closed } }

	fn close(&mut self) {
		self.closed = true;
		tracing::info!(forwarded = self.forwarded, "Valve closed");
		if let Some(queue) = &self.queue {
			queue.push(ChannelEvent::ValveClosed);
		}
	}

}

impl<I: Clone> BlkFunc<(), ValveStatus, Vec<I>, Vec<I>> for Valve<I> {

	fn control(&mut self, _:&()) -> Result<ValveStatus, AcqError> { Ok(self.status()) }

	fn apply(&mut self, input:&Vec<I>) -> BlockResult<Vec<I>> {
		if self.closed { return BlockResult::Done; }

		let remaining = self.max_items - self.forwarded;
		if (input.len() as u64) < remaining {
			if input.is_empty() { return BlockResult::NotReady; }
			self.forwarded += input.len() as u64;
			BlockResult::Ready(input.clone())
		} else {
			// This buffer reaches the limit, so only the front of it goes through
			self.forwarded = self.max_items;
			self.close();
			if remaining > 0 { BlockResult::Ready(input[..remaining as usize].to_vec()) }
			else { BlockResult::Done }
		}
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::channel::event_queue;

	fn offer(valve:&mut Valve<u32>, counts:&[usize]) -> u64 {
		let mut total = 0;
		let mut next = 0u32;
		for n in counts {
			let buffer:Vec<u32> = (0..*n).map(|_| { next += 1; next }).collect();
			if let BlockResult::Ready(out) = valve.apply(&buffer) {
				assert_eq!(&out[..], &buffer[..out.len()]);
				total += out.len() as u64;
			}
		}
		total
	}

	#[test]
	fn one_hundred_samples_one_message() {
		let (tx, mut rx) = event_queue();
		let mut valve:Valve<u32> = Valve::new(100, Some(tx));

		assert_eq!(offer(&mut valve, &[30, 30, 30, 30, 30]), 100);
		assert_eq!(valve.control(&()).unwrap(), ValveStatus{ forwarded: 100, closed: true });
		assert_eq!(rx.try_pop(), Some(ChannelEvent::ValveClosed));
		assert_eq!(rx.try_pop(), None);
	}

	#[test]
	fn forwards_min_of_limit_and_offered() {
		for (limit, counts) in [(10u64, vec![3, 3]), (10, vec![10]), (10, vec![4, 6, 1]), (7, vec![20, 20]), (0, vec![5])] {
			let (tx, mut rx) = event_queue();
			let mut valve:Valve<u32> = Valve::new(limit, Some(tx));
			let offered:u64 = counts.iter().map(|c| *c as u64).sum();

			assert_eq!(offer(&mut valve, &counts), limit.min(offered));
			let expected_events = if offered >= limit { 1 } else { 0 };
			assert_eq!(rx.len(), expected_events);
		}
	}

	#[test]
	fn closed_valve_stays_quiet() {
		let (tx, mut rx) = event_queue();
		let mut valve:Valve<u32> = Valve::new(5, Some(tx));
		offer(&mut valve, &[5]);
		for _ in 0..10 {
			assert!(matches!(valve.apply(&vec![1, 2, 3]), BlockResult::Done));
		}
		assert_eq!(rx.try_pop(), Some(ChannelEvent::ValveClosed));
		assert!(rx.is_empty());
	}

	#[test]
	fn valve_without_queue() {
		let mut valve:Valve<u32> = Valve::new(3, None);
		assert_eq!(offer(&mut valve, &[2, 2]), 3);
		assert!(valve.status().closed);
	}
}

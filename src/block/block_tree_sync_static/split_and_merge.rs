
use std::collections::VecDeque;
use std::marker::PhantomData;

use crate::AcqError;
use crate::block::{BlockFunctionality as BlkFunc, BlockResult};

/// Feeds every input to each of a set of identical blocks (one per channel, say) and merges their outputs
/// into one stream
pub struct SplitAndMerge<C, D, T, U, A: BlkFunc<C, D, T, U>> {
	blocks:Vec<A>,
	done:Vec<bool>,
	output_buffer:VecDeque<U>,
	pc: PhantomData<C>,
	pd: PhantomData<D>,
	pt: PhantomData<T>,
}

impl<C, D, T, U, A: BlkFunc<C, D, T, U>> SplitAndMerge<C, D, T, U, A> {

	pub fn from_iter<I: Iterator<Item=A>>(iter:I) -> Self {
		let blocks:Vec<A> = iter.collect();
		let done = vec![false; blocks.len()];
		Self { blocks, done, output_buffer: VecDeque::new(), pc: PhantomData, pd: PhantomData, pt: PhantomData }
	}

	// Stays at zero as long as the caller drains `pending` after every `apply`
	pub fn output_buffer_len(&self) -> usize { self.output_buffer.len() }

}

impl<C, D, T, U, A: BlkFunc<C, D, T, U>> BlkFunc<C, Vec<D>, T, U> for SplitAndMerge<C, D, T, U, A> {

	// The control input is applied to all blocks and a vector of all responses is returned
	fn control(&mut self, c:&C) -> Result<Vec<D>, AcqError> {
		let mut ans = vec![];
		for blk in self.blocks.iter_mut() {
			ans.push(blk.control(c)?);
		}
		Ok(ans)
	}

	fn apply(&mut self, input:&T) -> BlockResult<U> {
		for (blk, done) in self.blocks.iter_mut().zip(self.done.iter_mut()) {
			if *done { continue; }
			match blk.apply(input) {
				BlockResult::NotReady => (),
				BlockResult::Ready(u) => self.output_buffer.push_back(u),
				BlockResult::Done     => *done = true,
				BlockResult::Err(e)   => return BlockResult::Err(e)
			}
		}

		match self.output_buffer.pop_front() {
			Some(u) => BlockResult::Ready(u),
			None if self.done.iter().all(|d| *d) => BlockResult::Done,
			None => BlockResult::NotReady,
		}
	}

	fn pending(&mut self) -> BlockResult<U> {
		for (blk, done) in self.blocks.iter_mut().zip(self.done.iter()) {
			if *done { continue; }
			loop {
				match blk.pending() {
					BlockResult::Ready(u) => self.output_buffer.push_back(u),
					BlockResult::Err(e)   => return BlockResult::Err(e),
					BlockResult::NotReady | BlockResult::Done => break,
				}
			}
		}

		match self.output_buffer.pop_front() {
			Some(u) => BlockResult::Ready(u),
			None    => BlockResult::NotReady,
		}
	}

	fn reset(&mut self) {
		for blk in self.blocks.iter_mut() { blk.reset(); }
		for done in self.done.iter_mut() { *done = false; }
		self.output_buffer.clear();
	}

	fn end_of_stream(&mut self) -> BlockResult<U> {
		for blk in self.blocks.iter_mut() {
			loop {
				match blk.end_of_stream() {
					BlockResult::Ready(u) => self.output_buffer.push_back(u),
					BlockResult::Err(e)   => return BlockResult::Err(e),
					BlockResult::NotReady | BlockResult::Done => break,
				}
			}
		}

		match self.output_buffer.pop_front() {
			Some(u) => BlockResult::Ready(u),
			None    => BlockResult::NotReady,
		}
	}

}


use std::marker::PhantomData;

use crate::AcqError;
use crate::block::{BlockFunctionality as BlkFunc, BlockResult};

pub mod split_and_merge;

pub use split_and_merge::SplitAndMerge;

/// Two blocks in a row.  Control goes to the right block, which is normally the one doing the real work;
/// the left one (a valve, for instance) is reachable through `left_mut`.
pub struct Series<CL, DL, C, D, T, U, V, A: BlkFunc<CL, DL, T, U>, B: BlkFunc<C, D, U, V>> {
	left: A,
	right: B,
	pcl: PhantomData<CL>,
	pdl: PhantomData<DL>,
	pc: PhantomData<C>,
	pd: PhantomData<D>,
	pt: PhantomData<T>,
	pu: PhantomData<U>,
	pv: PhantomData<V>,
}

impl<CL, DL, C, D, T, U, V, A: BlkFunc<CL, DL, T, U>, B: BlkFunc<C, D, U, V>> Series<CL, DL, C, D, T, U, V, A, B> {

	pub fn new(left:A, right:B) -> Self {
		Self { left, right, pcl:PhantomData, pdl:PhantomData, pc:PhantomData, pd:PhantomData, pt:PhantomData, pu:PhantomData, pv:PhantomData }
	}

	pub fn left(&self) -> &A { &self.left }
	pub fn left_mut(&mut self) -> &mut A { &mut self.left }
	pub fn right(&self) -> &B { &self.right }

}

impl<CL, DL, C, D, T, U, V, A: BlkFunc<CL, DL, T, U>, B: BlkFunc<C, D, U, V>> BlkFunc<C, D, T, V> for Series<CL, DL, C, D, T, U, V, A, B> {

	fn control(&mut self, control:&C) -> Result<D, AcqError> {
		self.right.control(control)
	}

	fn apply(&mut self, input:&T) -> BlockResult<V> {
		match self.left.apply(input) {
			BlockResult::Ready(u) => self.right.apply(&u),
			BlockResult::NotReady => BlockResult::NotReady,
			BlockResult::Done     => BlockResult::Done,
			BlockResult::Err(e)   => BlockResult::Err(e)
		}
	}

	fn reset(&mut self) {
		self.left.reset();
		self.right.reset();
	}

	// The right block's own backlog comes first, then whatever the left one still holds goes through it
	fn pending(&mut self) -> BlockResult<V> {
		loop {
			match self.right.pending() {
				BlockResult::Ready(v) => return BlockResult::Ready(v),
				BlockResult::Err(e)   => return BlockResult::Err(e),
				BlockResult::NotReady | BlockResult::Done => (),
			}
			match self.left.pending() {
				BlockResult::Ready(u) => match self.right.apply(&u) {
					BlockResult::Ready(v) => return BlockResult::Ready(v),
					BlockResult::Err(e)   => return BlockResult::Err(e),
					BlockResult::NotReady | BlockResult::Done => (),
				},
				BlockResult::Err(e) => return BlockResult::Err(e),
				BlockResult::NotReady | BlockResult::Done => return BlockResult::NotReady,
			}
		}
	}

	fn end_of_stream(&mut self) -> BlockResult<V> {
		// Flush whatever the left block still holds through the right one before draining the right one
		loop {
			match self.left.end_of_stream() {
				BlockResult::Ready(u) => match self.right.apply(&u) {
					BlockResult::Ready(v) => return BlockResult::Ready(v),
					BlockResult::Err(e)   => return BlockResult::Err(e),
					BlockResult::NotReady | BlockResult::Done => (),
				},
				BlockResult::Err(e) => return BlockResult::Err(e),
				BlockResult::NotReady | BlockResult::Done => break,
			}
		}
		self.right.end_of_stream()
	}

}

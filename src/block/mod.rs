
use crate::{AcqError, DigSigProcErr as DSPErr};

pub mod block_tree_sync_static;
pub mod flowgraph;
pub mod valve;

pub use flowgraph::{StopHandle, TopBlock};
pub use valve::{Valve, ValveStatus};

#[derive(Debug)]
pub enum BlockResult<U> {
	NotReady,
	Ready(U),
	/// The block won't produce anything else no matter what it's given
	Done,
	Err(DSPErr)
}

// A type that implements BlockFunctionality consumes instances of T and produces Ready(U) if an output
// is ready, NotReady if it isn't, Done once it's finished for good, or Err(_) if the operation fails
pub trait BlockFunctionality<C, D, T, U> {

	// Requiring immutable references to the input and control values is the least restrictive thing
	// because if the block needs an owned value, it can clone it
	fn control(&mut self, control:&C) -> Result<D, AcqError>;
	fn apply(&mut self, input:&T) -> BlockResult<U>;

	fn reset(&mut self) { }

	// One input can finish more than one output.  `apply` returns the first and the rest come out of here;
	// called after every `apply` until it stops returning Ready
	fn pending(&mut self) -> BlockResult<U> { BlockResult::NotReady }

	// Called repeatedly after the last input until it stops returning Ready
	fn end_of_stream(&mut self) -> BlockResult<U> { BlockResult::NotReady }

}

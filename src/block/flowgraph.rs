//! Drives a block tree from a sample source, either on the calling thread or on a tokio blocking worker

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustfft::num_complex::Complex;
use tokio::task::JoinHandle;

use crate::{DigSigProcErr, SampleBuffer};
use crate::block::{BlockFunctionality as BlkFunc, BlockResult};
use crate::io::BUFFER_SIZE;

/// Cooperative stop request shared between whoever wants something to stop and the loop that checks it
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
	flag:Arc<AtomicBool>,
}

impl StopHandle {

	pub fn new() -> Self { Self::default() }

	pub fn request_stop(&self) { self.flag.store(true, Ordering::Release); }
	pub fn is_stop_requested(&self) -> bool { self.flag.load(Ordering::Acquire) }
	pub fn clear(&self) { self.flag.store(false, Ordering::Release); }
	pub fn flag(&self) -> &AtomicBool { &self.flag }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
	SourceExhausted,
	BlockDone,
	StopRequested,
	Error(DigSigProcErr),
}

#[derive(Debug)]
pub struct RunReport<U> {
	pub reason:StopReason,
	pub samples:u64,
	pub outputs:Vec<U>,
}

pub struct TopBlock<C, D, U, B: BlkFunc<C, D, SampleBuffer, U>> {
	name:String,
	block:B,
	buffer_size:usize,
	stop:StopHandle,
	pc:PhantomData<C>,
	pd:PhantomData<D>,
	pu:PhantomData<U>,
}

impl<C, D, U, B: BlkFunc<C, D, SampleBuffer, U>> TopBlock<C, D, U, B> {

	pub fn new(name:&str, block:B) -> Self {
		Self { name: name.to_string(), block, buffer_size: BUFFER_SIZE, stop: StopHandle::new(),
			pc: PhantomData, pd: PhantomData, pu: PhantomData }
	}

	pub fn with_buffer_size(mut self, buffer_size:usize) -> Self {
		self.buffer_size = buffer_size.max(1);
		self
	}

	pub fn name(&self) -> &str { &self.name }
	pub fn stop_handle(&self) -> StopHandle { self.stop.clone() }
	pub fn block(&self) -> &B { &self.block }
	pub fn block_mut(&mut self) -> &mut B { &mut self.block }
	pub fn into_inner(self) -> B { self.block }

	/// Pushes fixed-size buffers from `source` through the block until the source runs dry, the block is
	/// done, a block fails, or a stop is requested.  Once the input has ended normally the block is drained.
	pub fn run<I: Iterator<Item=Complex<f64>>>(&mut self, source:I) -> RunReport<U> {
		let mut source = source;
		let mut outputs:Vec<U> = vec![];
		let mut samples:u64 = 0;
		let mut buffer:SampleBuffer = Vec::with_capacity(self.buffer_size);

		tracing::info!(name = %self.name, buffer_size = self.buffer_size, "Flowgraph started");

		let reason = 'schedule: loop {
			if self.stop.is_stop_requested() { break StopReason::StopRequested; }

			buffer.clear();
			buffer.extend(source.by_ref().take(self.buffer_size));
			if buffer.is_empty() { break StopReason::SourceExhausted; }
			samples += buffer.len() as u64;

			match self.block.apply(&buffer) {
				BlockResult::Ready(u) => outputs.push(u),
				BlockResult::NotReady => (),
				BlockResult::Done     => break StopReason::BlockDone,
				BlockResult::Err(e)   => {
					tracing::error!(name = %self.name, error = ?e, "Block failed, stopping flowgraph");
					break StopReason::Error(e);
				}
			}

			// Take everything this buffer finished before pulling the next one
			loop {
				match self.block.pending() {
					BlockResult::Ready(u) => outputs.push(u),
					BlockResult::Err(e)   => {
						tracing::error!(name = %self.name, error = ?e, "Block failed, stopping flowgraph");
						break 'schedule StopReason::Error(e);
					},
					BlockResult::NotReady | BlockResult::Done => break,
				}
			}
		};

		if matches!(reason, StopReason::SourceExhausted | StopReason::BlockDone) {
			loop {
				match self.block.end_of_stream() {
					BlockResult::Ready(u) => outputs.push(u),
					BlockResult::Err(e) => {
						tracing::error!(name = %self.name, error = ?e, "Block failed while draining");
						break;
					},
					BlockResult::NotReady | BlockResult::Done => break,
				}
			}
		}

		tracing::info!(name = %self.name, samples, reason = ?reason, outputs = outputs.len(), "Flowgraph stopped");
		RunReport{ reason, samples, outputs }
	}

}

impl<C, D, U, B> TopBlock<C, D, U, B>
	where B: BlkFunc<C, D, SampleBuffer, U> + Send + 'static, C: Send + 'static, D: Send + 'static, U: Send + 'static {

	/// Runs the flowgraph on tokio's blocking pool.  The top block comes back with the report so the caller
	/// can inspect the blocks afterwards.  Must be called from inside a tokio runtime.
	pub fn start<I>(mut self, source:I) -> JoinHandle<(Self, RunReport<U>)>
		where I: Iterator<Item=Complex<f64>> + Send + 'static {

		tokio::task::spawn_blocking(move || {
			let report = self.run(source);
			(self, report)
		})
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::AcqError;

	// Sums each buffer and fails once it's been given more than `limit` samples
	struct Totalizer { seen:usize, limit:usize, buffers:usize }

	impl BlkFunc<(), usize, SampleBuffer, f64> for Totalizer {
		fn control(&mut self, _:&()) -> Result<usize, AcqError> { Ok(self.seen) }
		fn apply(&mut self, input:&SampleBuffer) -> BlockResult<f64> {
			self.seen += input.len();
			self.buffers += 1;
			if self.seen > self.limit { BlockResult::Err(DigSigProcErr::Other("too many samples")) }
			else { BlockResult::Ready(input.iter().map(|c| c.re).sum()) }
		}
	}

	fn ones(n:usize) -> impl Iterator<Item=Complex<f64>> { (0..n).map(|_| Complex{ re: 1.0, im: 0.0 }) }

	#[test]
	fn runs_until_source_ends() {
		let mut top = TopBlock::new("test", Totalizer{ seen: 0, limit: 10000, buffers: 0 }).with_buffer_size(100);
		let report = top.run(ones(250));
		assert_eq!(report.reason, StopReason::SourceExhausted);
		assert_eq!(report.samples, 250);
		assert_eq!(report.outputs, vec![100.0, 100.0, 50.0]);
		assert_eq!(top.block().buffers, 3);
	}

	// Every buffer finishes one output per 10 samples
	struct Chunker { owed:usize }

	impl BlkFunc<(), usize, SampleBuffer, usize> for Chunker {
		fn control(&mut self, _:&()) -> Result<usize, AcqError> { Ok(self.owed) }
		fn apply(&mut self, input:&SampleBuffer) -> BlockResult<usize> {
			self.owed += input.len() / 10;
			self.pending()
		}
		fn pending(&mut self) -> BlockResult<usize> {
			if self.owed == 0 { return BlockResult::NotReady; }
			self.owed -= 1;
			BlockResult::Ready(self.owed)
		}
	}

	#[test]
	fn every_finished_output_is_taken_per_buffer() {
		let mut top = TopBlock::new("test", Chunker{ owed: 0 }).with_buffer_size(100);
		let report = top.run(ones(1000));
		assert_eq!(report.outputs.len(), 100);
		assert_eq!(top.block_mut().control(&()).unwrap(), 0);
		assert_eq!(&report.outputs[..10], &[9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
	}

	#[test]
	fn error_stops_the_schedule() {
		let mut top = TopBlock::new("test", Totalizer{ seen: 0, limit: 150, buffers: 0 }).with_buffer_size(100);
		let report = top.run(ones(1000));
		assert_eq!(report.reason, StopReason::Error(DigSigProcErr::Other("too many samples")));
		assert_eq!(top.into_inner().buffers, 2);
	}

	#[test]
	fn stop_request_is_honored_before_next_buffer() {
		let mut top = TopBlock::new("test", Totalizer{ seen: 0, limit: 10000, buffers: 0 });
		top.stop_handle().request_stop();
		let report = top.run(ones(5000));
		assert_eq!(report.reason, StopReason::StopRequested);
		assert_eq!(report.samples, 0);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn start_runs_on_blocking_pool() {
		let top = TopBlock::new("test", Totalizer{ seen: 0, limit: 1_000_000, buffers: 0 });
		let (top, report) = top.start(ones(3 * BUFFER_SIZE)).await.unwrap();
		assert_eq!(report.outputs.len(), 3);
		assert_eq!(top.block().seen, 3 * BUFFER_SIZE);
	}
}

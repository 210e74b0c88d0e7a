//! Parallel code phase search acquisition with a state machine around it.  One block searches for one
//! satellite on one channel; the outcome of every attempt is reported on the channel's event queue.
//!
//! For Galileo E1 with the `cboc` option, the block keeps two replicas (the signal's own CBOC combination
//! and the opposite one) and cycles through them on retries, which resolves the ambiguity between the
//! E1B and E1C sub-carrier signs.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};
use serde::Serialize;

use crate::{AcqError, DigSigProcErr, SampleBuffer};
use crate::block::{BlockFunctionality, BlockResult};
use crate::block::flowgraph::StopHandle;
use crate::channel::{ChannelEvent, EventSender, GnssSynchro};
use crate::config::{AcquisitionConfig, Implementation, InMemoryConfiguration};
use crate::gnss::common::replica::{self, CodeReplica, GnssSystem, Signal};
use crate::gnss::galileo_e1::memory_codes::MemoryCodeBook;

use super::AcquisitionResult;
use super::pcps::{self, Correlator};
use super::search_grid::{self, SearchGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcqState {
	/// Not collecting; samples are counted and dropped
	Idle,
	Collecting,
	Searching,
	/// An attempt just finished with the given outcome.  Behaves like a disarmed Idle.
	Decided(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcqControl {
	Status,
	Init,
	Reset,
	SetThreshold(f64),
}

pub struct Acquisition {
	config:AcquisitionConfig,
	channel:usize,
	synchro:GnssSynchro,
	queue:Option<EventSender>,
	code_book:Option<Arc<MemoryCodeBook>>,
	stop:StopHandle,

	signal:Option<Signal>,
	replicas:Vec<CodeReplica>,
	correlators:Vec<Correlator>,
	doppler_bins:Vec<i32>,
	exclusion:usize,
	len_fft:usize,

	state:AcqState,
	armed:bool,
	attempts:u32,
	sample_count:u64,
	buffer:SampleBuffer,
	buffer_stamp:u64,
	exhausted_reported:bool,
	output_buffer:VecDeque<AcquisitionResult>,
}

impl Acquisition {

	pub fn new(config:AcquisitionConfig) -> Self {
		Self { config, channel: 0, synchro: GnssSynchro::default(), queue: None, code_book: None, stop: StopHandle::new(),
			signal: None, replicas: vec![], correlators: vec![], doppler_bins: vec![], exclusion: 0, len_fft: 0,
			state: AcqState::Idle, armed: false, attempts: 0, sample_count: 0, buffer: vec![], buffer_stamp: 0,
			exhausted_reported: false, output_buffer: VecDeque::new() }
	}

	pub fn from_configuration(cfg:&InMemoryConfiguration, role:&str, channel:usize) -> Result<Self, AcqError> {
		let mut ans = Self::new(AcquisitionConfig::from_configuration(cfg, role, channel)?);
		ans.set_channel(channel);
		Ok(ans)
	}

	pub fn set_channel(&mut self, channel:usize) {
		self.channel = channel;
		self.synchro.channel_id = channel;
	}

	/// Hands the block the record it fills in on success.  The channel id always follows `set_channel`.
	pub fn set_gnss_synchro(&mut self, synchro:GnssSynchro) {
		self.synchro = synchro;
		self.synchro.channel_id = self.channel;
	}

	pub fn set_channel_queue(&mut self, queue:EventSender) { self.queue = Some(queue); }
	pub fn set_threshold(&mut self, threshold:f64) { self.config.threshold = threshold; }
	pub fn set_doppler_max(&mut self, doppler_max:u32) { self.config.doppler_max = doppler_max; }
	pub fn set_doppler_step(&mut self, doppler_step:u32) { self.config.doppler_step = doppler_step; }
	pub fn set_code_book(&mut self, code_book:Arc<MemoryCodeBook>) { self.code_book = Some(code_book); }

	pub fn implementation(&self) -> &'static str { self.config.implementation.name() }
	pub fn config(&self) -> &AcquisitionConfig { &self.config }
	pub fn channel(&self) -> usize { self.channel }
	pub fn gnss_synchro(&self) -> &GnssSynchro { &self.synchro }
	pub fn signal(&self) -> Option<Signal> { self.signal }
	pub fn state(&self) -> AcqState { self.state }
	pub fn is_armed(&self) -> bool { self.armed }
	pub fn attempts(&self) -> u32 { self.attempts }
	/// Results finished but not yet handed out through `apply` or `pending`
	pub fn pending_results(&self) -> usize { self.output_buffer.len() }
	pub fn samples_per_attempt(&self) -> usize { self.len_fft }
	pub fn doppler_bins(&self) -> &[i32] { &self.doppler_bins }
	pub fn stop_handle(&self) -> StopHandle { self.stop.clone() }

	/// Validates the configuration and builds the replicas and FFT plans.  Leaves the block idle and
	/// disarmed with its attempt count and sample count cleared.
	pub fn init(&mut self) -> Result<(), AcqError> {
		self.config.validate()?;

		let signal = Signal::from_parts(self.synchro.system, &self.synchro.signal)?;
		let expected_system = match self.config.implementation {
			Implementation::GalileoE1PcpsAmbiguous => GnssSystem::Galileo,
			Implementation::GpsL1CaPcps            => GnssSystem::Gps,
		};
		if signal.system() != expected_system {
			return Err(AcqError::UnsupportedSignal(format!("{} in {}", signal, self.implementation())));
		}

		let code_period_ms = signal.code_period_ms();
		if self.config.sampled_ms % code_period_ms != 0 {
			return Err(AcqError::InvalidIntegrationTime{ sampled_ms: self.config.sampled_ms, code_period_ms });
		}

		if signal.system() == GnssSystem::Galileo && self.code_book.is_none() {
			if let Some(path) = &self.config.codes_file {
				self.code_book = Some(Arc::new(MemoryCodeBook::from_file(signal, path)?));
			}
		}

		let fs = self.config.fs_in;
		let replicas = replica::code_replicas(signal, self.synchro.prn, self.config.cboc, fs, self.code_book.as_deref())?;
		let len_fft = self.config.samples_per_attempt();
		let correlators = replicas.iter()
			.map(|r| Correlator::new(r, fs, self.config.if_hz, len_fft))
			.collect::<Result<Vec<Correlator>, AcqError>>()?;

		self.signal = Some(signal);
		self.replicas = replicas;
		self.correlators = correlators;
		self.doppler_bins = search_grid::doppler_bins(self.config.doppler_max, self.config.doppler_step);
		self.exclusion = replica::exclusion_samples(signal, fs);
		self.len_fft = len_fft;

		self.state = AcqState::Idle;
		self.armed = false;
		self.attempts = 0;
		self.sample_count = 0;
		self.buffer = Vec::with_capacity(len_fft);
		self.buffer_stamp = 0;
		self.exhausted_reported = false;
		self.output_buffer.clear();
		self.synchro.clear_acquisition();
		self.stop.clear();

		tracing::info!(channel = self.channel, signal = %signal, prn = self.synchro.prn, len_fft, doppler_bins = self.doppler_bins.len(),
			variants = self.replicas.len(), "Acquisition initialized");
		Ok(())
	}

	/// Clears the attempt count and any stop request and arms the block, so the next sample starts a new
	/// integration buffer
	pub fn reset(&mut self) {
		self.attempts = 0;
		self.stop.clear();
		self.buffer.clear();
		self.state = AcqState::Idle;
		self.armed = true;
		self.exhausted_reported = false;
		self.synchro.clear_acquisition();
		tracing::debug!(channel = self.channel, prn = self.synchro.prn, "Acquisition armed");
	}

	fn notify(&self, event:ChannelEvent) {
		match &self.queue {
			Some(queue) => queue.push(event),
			None => tracing::debug!(channel = self.channel, code = event.code(), "No channel queue, event dropped"),
		}
	}

	// `next_stamp` is the absolute index of the sample right after the buffer being searched
	fn run_attempt(&mut self, next_stamp:u64) {
		self.state = AcqState::Searching;
		let variant_idx = (self.attempts as usize) % self.correlators.len();
		let input_power = pcps::mean_power(&self.buffer);

		let grid = match search_grid::search(&mut self.correlators[variant_idx], &self.buffer, input_power, &self.doppler_bins, self.stop.flag()) {
			Some(grid) => grid,
			None => {
				tracing::info!(channel = self.channel, prn = self.synchro.prn, "Acquisition stopped");
				self.buffer.clear();
				self.state = AcqState::Idle;
				self.armed = false;
				return;
			}
		};

		self.attempts += 1;
		let peak = grid.peak(self.exclusion);
		if self.config.dump { self.dump_grid(&grid); }

		let detected = peak.statistic > 0.0 && peak.statistic >= self.config.threshold;
		let result = AcquisitionResult {
			channel_id: self.channel,
			system: self.synchro.system,
			signal: self.synchro.signal.clone(),
			prn: self.synchro.prn,
			detected,
			code_phase: peak.code_phase,
			doppler_hz: peak.doppler_hz,
			doppler_step_hz: self.config.doppler_step as f64,
			sample_stamp: self.buffer_stamp,
			test_statistic: peak.statistic,
			secondary_statistic: peak.secondary_statistic,
			noise_floor: peak.noise_floor,
			attempt: self.attempts,
			variant: self.replicas[variant_idx].variant,
		};
		self.buffer.clear();
		self.state = AcqState::Decided(detected);

		if detected {
			self.synchro.acq_delay_samples = peak.code_phase as f64;
			self.synchro.acq_doppler_hz = peak.doppler_hz;
			self.synchro.acq_samplestamp_samples = self.buffer_stamp;
			self.synchro.flag_valid_acquisition = true;
			self.armed = false;

			tracing::info!(channel = self.channel, prn = self.synchro.prn, statistic = peak.statistic, doppler_hz = peak.doppler_hz,
				code_phase = peak.code_phase, sample_stamp = self.buffer_stamp, attempt = self.attempts, "Acquisition succeeded");
			// The record is complete before the controller can see the event
			self.notify(ChannelEvent::AcqSuccess(self.synchro.clone()));
		} else if self.config.repeat_satellite && self.config.max_attempts.map_or(true, |max| self.attempts < max) {
			tracing::debug!(channel = self.channel, prn = self.synchro.prn, statistic = peak.statistic, attempt = self.attempts, "Acquisition attempt failed, retrying");
			self.state = AcqState::Collecting;
			self.buffer_stamp = next_stamp;
		} else {
			self.armed = false;
			tracing::info!(channel = self.channel, prn = self.synchro.prn, statistic = peak.statistic, threshold = self.config.threshold,
				attempt = self.attempts, "Acquisition failed");
			self.notify(ChannelEvent::AcqFail);
		}

		self.output_buffer.push_back(result);
	}

	fn dump_path(&self) -> PathBuf {
		let base = Path::new(&self.config.dump_filename);
		let stem = base.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "acquisition".to_string());
		base.with_file_name(format!("{}_ch{}_{}{}_prn{}_{}.dat", stem, self.channel, self.synchro.system, self.synchro.signal,
			self.synchro.prn, self.attempts))
	}

	fn dump_grid(&self, grid:&SearchGrid) {
		let path = self.dump_path();
		match write_grid(&path, grid) {
			Ok(()) => tracing::debug!(path = %path.display(), "Search grid written"),
			Err(e) => tracing::warn!(path = %path.display(), error = %e, "Unable to write search grid"),
		}
	}

}

// Header of u32 row count and u32 delay count, then the i32 Doppler bins, then the cells row by row
fn write_grid(path:&Path, grid:&SearchGrid) -> std::io::Result<()> {
	let mut dst = BufWriter::new(File::create(path)?);
	dst.write_u32::<LittleEndian>(grid.doppler_bins().len() as u32)?;
	dst.write_u32::<LittleEndian>(grid.n_delays() as u32)?;
	for doppler_hz in grid.doppler_bins() {
		dst.write_i32::<LittleEndian>(*doppler_hz)?;
	}
	for bin_idx in 0..grid.doppler_bins().len() {
		for stat in grid.row(bin_idx) {
			dst.write_f32::<LittleEndian>(*stat as f32)?;
		}
	}
	dst.flush()
}

impl BlockFunctionality<AcqControl, AcqState, SampleBuffer, AcquisitionResult> for Acquisition {

	fn control(&mut self, control:&AcqControl) -> Result<AcqState, AcqError> {
		match control {
			AcqControl::Status => (),
			AcqControl::Init   => self.init()?,
			AcqControl::Reset  => Acquisition::reset(self),
			AcqControl::SetThreshold(threshold) => {
				if !(threshold.is_finite() && *threshold >= 0.0) { return Err(AcqError::InvalidThreshold); }
				self.config.threshold = *threshold;
			},
		}
		Ok(self.state)
	}

	fn apply(&mut self, input:&SampleBuffer) -> BlockResult<AcquisitionResult> {
		if self.correlators.is_empty() {
			return BlockResult::Err(DigSigProcErr::Other("Acquisition block used before init"));
		}
		if let AcqState::Decided(_) = self.state { self.state = AcqState::Idle; }

		let mut offset:usize = 0;
		while offset < input.len() {
			match self.state {
				AcqState::Idle if self.armed => {
					self.state = AcqState::Collecting;
					self.buffer.clear();
					self.buffer_stamp = self.sample_count + offset as u64;
				},
				AcqState::Collecting => (),
				_ => break,
			}

			let take = (self.len_fft - self.buffer.len()).min(input.len() - offset);
			self.buffer.extend_from_slice(&input[offset..offset+take]);
			offset += take;

			if self.buffer.len() >= self.len_fft {
				self.run_attempt(self.sample_count + offset as u64);
			}
		}
		self.sample_count += input.len() as u64;

		match self.output_buffer.pop_front() {
			Some(result) => BlockResult::Ready(result),
			None         => BlockResult::NotReady,
		}
	}

	fn pending(&mut self) -> BlockResult<AcquisitionResult> {
		match self.output_buffer.pop_front() {
			Some(result) => BlockResult::Ready(result),
			None         => BlockResult::NotReady,
		}
	}

	fn reset(&mut self) { Acquisition::reset(self) }

	fn end_of_stream(&mut self) -> BlockResult<AcquisitionResult> {
		let waiting = match self.state {
			AcqState::Collecting | AcqState::Searching => true,
			AcqState::Idle => self.armed,
			AcqState::Decided(_) => false,
		};

		if waiting && !self.exhausted_reported {
			tracing::info!(channel = self.channel, prn = self.synchro.prn, collected = self.buffer.len(), needed = self.len_fft,
				"Input ended before a full integration buffer");
			self.exhausted_reported = true;
			self.buffer.clear();
			self.state = AcqState::Idle;
			self.armed = false;
			self.notify(ChannelEvent::StreamExhausted);
		}

		match self.output_buffer.pop_front() {
			Some(result) => BlockResult::Ready(result),
			None         => BlockResult::NotReady,
		}
	}

}

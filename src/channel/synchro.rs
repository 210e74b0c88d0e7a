use serde::{Serialize, Deserialize};

/// Per-channel synchronization record handed from acquisition to tracking.  The acquisition block is
/// the only writer while it's running; the channel controller receives its own copy inside
/// `ChannelEvent::AcqSuccess`, so the two sides never touch the same record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GnssSynchro {
	pub channel_id: usize,
	pub system: char,
	pub signal: String,
	pub prn: u32,
	pub acq_delay_samples: f64,
	pub acq_doppler_hz: f64,
	pub acq_samplestamp_samples: u64,
	pub flag_valid_acquisition: bool,
}

impl GnssSynchro {

	pub fn new(channel_id:usize, system:char, signal:&str, prn:u32) -> Self {
		Self { channel_id, system, signal: signal.to_string(), prn, ..Self::default() }
	}

	// Clears everything an earlier acquisition wrote, keeping the satellite identity
	pub fn clear_acquisition(&mut self) {
		self.acq_delay_samples = 0.0;
		self.acq_doppler_hz = 0.0;
		self.acq_samplestamp_samples = 0;
		self.flag_valid_acquisition = false;
	}

}

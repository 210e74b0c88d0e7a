use serde::{Serialize, Deserialize};

use crate::gnss::common::replica::ReplicaVariant;

pub mod pcps;
pub mod pcps_ambiguous;
pub mod search_grid;

pub use pcps_ambiguous::{Acquisition, AcqControl, AcqState};


/// Outcome of one search attempt, produced whether or not the satellite was found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionResult {
	pub channel_id:usize,
	pub system:char,
	pub signal:String,
	pub prn:u32,
	pub detected:bool,
	pub code_phase:usize,
	pub doppler_hz:f64,
	pub doppler_step_hz:f64,
	pub sample_stamp:u64,
	pub test_statistic:f64,
	pub secondary_statistic:f64,
	pub noise_floor:f64,
	pub attempt:u32,
	pub variant:ReplicaVariant,
}

impl AcquisitionResult {

	/// Ratio of the peak to the strongest cell outside its main lobe
	pub fn peak_ratio(&self) -> f64 {
		if self.secondary_statistic > 0.0 { self.test_statistic / self.secondary_statistic } else { 0.0 }
	}

}

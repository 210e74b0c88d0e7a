//! String-keyed configuration and the typed acquisition parameters built from it

use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::AcqError;

pub const FS_KEY:&str = "GNSS-SDR.internal_fs_hz";

pub const DEFAULT_DOPPLER_MAX_HZ:u32 = 10000;
pub const DEFAULT_DOPPLER_STEP_HZ:u32 = 500;
pub const DEFAULT_DUMP_FILENAME:&str = "./acquisition.dat";


/// Flat string property store with keys such as `Acquisition.threshold` or `GNSS-SDR.internal_fs_hz`
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfiguration {
	properties: HashMap<String, String>,
}

impl InMemoryConfiguration {

	pub fn new() -> Self { Self::default() }

	pub fn set_property(&mut self, key:&str, value:&str) {
		self.properties.insert(key.to_string(), value.to_string());
	}

	pub fn is_present(&self, key:&str) -> bool { self.properties.contains_key(key) }

	pub fn property_str(&self, key:&str) -> Option<&str> { self.properties.get(key).map(|s| s.as_str()) }

	/// Value for `key`, or `default` if it's absent or doesn't parse.  Only use this for keys that
	/// really have a default; required keys go through `required`.
	pub fn property<T: FromStr>(&self, key:&str, default:T) -> T {
		self.property_str(key).and_then(|s| s.trim().parse().ok()).unwrap_or(default)
	}

	pub fn optional<T: FromStr>(&self, key:&str) -> Result<Option<T>, AcqError> {
		match self.property_str(key) {
			None    => Ok(None),
			Some(s) => s.trim().parse().map(Some).map_err(|_| AcqError::InvalidProperty{ key: key.to_string(), value: s.to_string() }),
		}
	}

	pub fn required<T: FromStr>(&self, key:&str) -> Result<T, AcqError> {
		self.optional(key)?.ok_or_else(|| AcqError::MissingProperty(key.to_string()))
	}

	/// Loads a flat JSON object; strings, numbers and booleans are all stored as strings
	pub fn from_json_reader<R: Read>(reader:R) -> Result<Self, AcqError> {
		let raw:HashMap<String, serde_json::Value> = serde_json::from_reader(reader)
			.map_err(|e| AcqError::InvalidProperty{ key: "<json>".to_string(), value: e.to_string() })?;

		let mut cfg = Self::new();
		for (key, value) in raw.into_iter() {
			let s = match value {
				serde_json::Value::String(s) => s,
				serde_json::Value::Number(n) => n.to_string(),
				serde_json::Value::Bool(b)   => b.to_string(),
				other => return Err(AcqError::InvalidProperty{ key, value: other.to_string() }),
			};
			cfg.properties.insert(key, s);
		}
		Ok(cfg)
	}

	pub fn from_json_str(s:&str) -> Result<Self, AcqError> { Self::from_json_reader(s.as_bytes()) }

}

/// How samples are laid out in a capture file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
	/// Interleaved little-endian f32 I/Q
	GrComplex,
	/// Interleaved little-endian i16 I/Q
	ComplexShort,
	/// Interleaved i8 I/Q
	ComplexByte,
}

impl ItemType {

	pub fn item_size(&self) -> usize { match self {
		ItemType::GrComplex    => 8,
		ItemType::ComplexShort => 4,
		ItemType::ComplexByte  => 2,
	}}

}

impl FromStr for ItemType {
	type Err = AcqError;

	fn from_str(s:&str) -> Result<Self, AcqError> { match s {
		"gr_complex"        => Ok(ItemType::GrComplex),
		"cshort" | "ishort" => Ok(ItemType::ComplexShort),
		"cbyte"  | "ibyte"  => Ok(ItemType::ComplexByte),
		other               => Err(AcqError::UnsupportedItemType(other.to_string())),
	}}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Implementation {
	GalileoE1PcpsAmbiguous,
	GpsL1CaPcps,
}

impl Implementation {

	pub fn name(&self) -> &'static str { match self {
		Implementation::GalileoE1PcpsAmbiguous => "Galileo_E1_PCPS_Ambiguous_Acquisition",
		Implementation::GpsL1CaPcps            => "GPS_L1_CA_PCPS_Acquisition",
	}}

}

impl FromStr for Implementation {
	type Err = AcqError;

	fn from_str(s:&str) -> Result<Self, AcqError> { match s {
		"Galileo_E1_PCPS_Ambiguous_Acquisition" => Ok(Implementation::GalileoE1PcpsAmbiguous),
		"GPS_L1_CA_PCPS_Acquisition"            => Ok(Implementation::GpsL1CaPcps),
		other => Err(AcqError::UnsupportedImplementation(other.to_string())),
	}}
}

/// Per-channel acquisition parameters.  Built once before the channel starts and never changed by a
/// running search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
	pub implementation: Implementation,
	pub fs_in: f64,
	pub if_hz: f64,
	pub sampled_ms: u32,
	pub threshold: f64,
	pub doppler_max: u32,
	pub doppler_step: u32,
	pub repeat_satellite: bool,
	pub max_attempts: Option<u32>,
	pub cboc: bool,
	pub item_type: ItemType,
	pub dump: bool,
	pub dump_filename: String,
	pub codes_file: Option<String>,
}

impl AcquisitionConfig {

	pub fn from_configuration(cfg:&InMemoryConfiguration, role:&str, channel:usize) -> Result<Self, AcqError> {
		let key = |name:&str| format!("{}.{}", role, name);

		let implementation:Implementation = match cfg.property_str(&key("implementation")) {
			Some(s) => s.parse()?,
			None    => Implementation::GalileoE1PcpsAmbiguous,
		};
		let item_type:ItemType = match cfg.property_str(&key("item_type")) {
			Some(s) => s.parse()?,
			None    => ItemType::GrComplex,
		};

		// A per-channel key such as "Acquisition0.cboc" wins over the role-wide one
		let cboc_default:bool = cfg.optional(&key("cboc"))?.unwrap_or(false);
		let cboc:bool = cfg.optional(&format!("{}{}.cboc", role, channel))?.unwrap_or(cboc_default);

		let ans = Self {
			implementation,
			fs_in:            cfg.required(FS_KEY)?,
			if_hz:            cfg.optional(&key("if"))?.unwrap_or(0.0),
			sampled_ms:       cfg.required(&key("sampled_ms"))?,
			threshold:        cfg.required(&key("threshold"))?,
			doppler_max:      cfg.optional(&key("doppler_max"))?.unwrap_or(DEFAULT_DOPPLER_MAX_HZ),
			doppler_step:     cfg.optional(&key("doppler_step"))?.unwrap_or(DEFAULT_DOPPLER_STEP_HZ),
			repeat_satellite: cfg.optional(&key("repeat_satellite"))?.unwrap_or(false),
			max_attempts:     cfg.optional(&key("max_attempts"))?,
			cboc,
			item_type,
			dump:             cfg.optional(&key("dump"))?.unwrap_or(false),
			dump_filename:    cfg.optional(&key("dump_filename"))?.unwrap_or_else(|| DEFAULT_DUMP_FILENAME.to_string()),
			codes_file:       cfg.optional(&key("codes_file"))?,
		};

		ans.validate()?;
		Ok(ans)
	}

	pub fn validate(&self) -> Result<(), AcqError> {
		if !(self.fs_in.is_finite() && self.fs_in > 0.0) { return Err(AcqError::InvalidSampleRate); }
		if !self.if_hz.is_finite() { return Err(AcqError::InvalidProperty{ key: "if".to_string(), value: self.if_hz.to_string() }); }
		if self.sampled_ms == 0 { return Err(AcqError::InvalidIntegrationTime{ sampled_ms: 0, code_period_ms: 1 }); }
		if !(self.threshold.is_finite() && self.threshold >= 0.0) { return Err(AcqError::InvalidThreshold); }
		validate_doppler(self.doppler_max, self.doppler_step)
	}

	/// Number of samples collected for one search attempt
	pub fn samples_per_attempt(&self) -> usize { ((self.sampled_ms as f64) * self.fs_in / 1000.0).round() as usize }

}

pub fn validate_doppler(doppler_max:u32, doppler_step:u32) -> Result<(), AcqError> {
	if doppler_step == 0 { Err(AcqError::InvalidDopplerStep) }
	// Bins are signed Hz
	else if doppler_max > i32::MAX as u32 { Err(AcqError::InvalidProperty{ key: "doppler_max".to_string(), value: doppler_max.to_string() }) }
	else if doppler_max < doppler_step { Err(AcqError::InvalidDopplerRange{ max: doppler_max, step: doppler_step }) }
	else { Ok(()) }
}

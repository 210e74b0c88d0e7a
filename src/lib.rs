use rustfft::num_complex::Complex;
use thiserror::Error;

pub mod block;
pub mod channel;
pub mod config;
pub mod gnss;
pub mod io;

/// One buffer of complex baseband samples as it moves between blocks
pub type SampleBuffer = Vec<Complex<f64>>;

/// Errors raised while a block is streaming
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DigSigProcErr {
	Other(&'static str),
}

/// Errors raised while building or configuring a block.  These are always returned synchronously
/// to whoever constructs the component; nothing in the streaming path produces them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AcqError {
	#[error("Missing required property {0}")]
	MissingProperty(String),

	#[error("Invalid value {value:?} for property {key}")]
	InvalidProperty { key: String, value: String },

	#[error("Sample rate must be positive and finite")]
	InvalidSampleRate,

	#[error("Integration time of {sampled_ms} [ms] isn't a positive multiple of the {code_period_ms} [ms] code period")]
	InvalidIntegrationTime { sampled_ms: u32, code_period_ms: u32 },

	#[error("Threshold must be finite and non-negative")]
	InvalidThreshold,

	#[error("Doppler step must be positive")]
	InvalidDopplerStep,

	#[error("Doppler max ({max} [Hz]) is smaller than the Doppler step ({step} [Hz])")]
	InvalidDopplerRange { max: u32, step: u32 },

	#[error("Satellite id {prn} is outside the valid range for {signal}")]
	InvalidSatelliteId { prn: u32, signal: String },

	#[error("Unsupported signal {0}")]
	UnsupportedSignal(String),

	#[error("Unsupported acquisition implementation {0}")]
	UnsupportedImplementation(String),

	#[error("Unsupported item type {0}")]
	UnsupportedItemType(String),

	#[error("No memory code book available for {0}")]
	MissingCodeBook(String),

	#[error("Malformed memory code book: {0}")]
	CodeBook(String),

	#[error("I/O error: {0}")]
	Io(String),
}

impl From<std::io::Error> for AcqError {
	fn from(e:std::io::Error) -> Self { AcqError::Io(e.to_string()) }
}

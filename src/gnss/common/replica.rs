use std::fmt;
use std::sync::Arc;

use num_complex::Complex;
use serde::{Serialize, Deserialize};

use crate::AcqError;
use crate::gnss::{gps_l1_ca, galileo_e1};
use crate::gnss::galileo_e1::memory_codes::MemoryCodeBook;
use crate::gnss::galileo_e1::signal_modulation::{sinboc, cboc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GnssSystem {
	Gps,
	Galileo,
}

impl GnssSystem {

	pub fn from_char(c:char) -> Result<Self, AcqError> { match c {
		'G' => Ok(GnssSystem::Gps),
		'E' => Ok(GnssSystem::Galileo),
		other => Err(AcqError::UnsupportedSignal(format!("system {:?}", other))),
	}}

	pub fn to_char(&self) -> char { match self {
		GnssSystem::Gps     => 'G',
		GnssSystem::Galileo => 'E',
	}}

}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
	GpsL1Ca,
	GalileoE1B,
	GalileoE1C,
}

impl Signal {

	/// Builds a signal from the system letter and two-character signal code used in `GnssSynchro`
	pub fn from_parts(system:char, signal:&str) -> Result<Self, AcqError> {
		match (GnssSystem::from_char(system)?, signal) {
			(GnssSystem::Gps,     "1C") => Ok(Signal::GpsL1Ca),
			(GnssSystem::Galileo, "1B") => Ok(Signal::GalileoE1B),
			(GnssSystem::Galileo, "1C") => Ok(Signal::GalileoE1C),
			(_, other) => Err(AcqError::UnsupportedSignal(format!("{}{}", system, other))),
		}
	}

	pub fn system(&self) -> GnssSystem { match self {
		Signal::GpsL1Ca => GnssSystem::Gps,
		Signal::GalileoE1B | Signal::GalileoE1C => GnssSystem::Galileo,
	}}

	pub fn signal_str(&self) -> &'static str { match self {
		Signal::GpsL1Ca | Signal::GalileoE1C => "1C",
		Signal::GalileoE1B => "1B",
	}}

	pub fn name(&self) -> &'static str { match self {
		Signal::GpsL1Ca    => "GPS L1 C/A",
		Signal::GalileoE1B => "Galileo E1B",
		Signal::GalileoE1C => "Galileo E1C",
	}}

	pub fn code_length(&self) -> usize { match self.system() {
		GnssSystem::Gps     => gps_l1_ca::CODE_LENGTH,
		GnssSystem::Galileo => galileo_e1::CODE_LENGTH,
	}}

	pub fn chip_rate_hz(&self) -> f64 { match self.system() {
		GnssSystem::Gps     => gps_l1_ca::CHIP_RATE_HZ,
		GnssSystem::Galileo => galileo_e1::CHIP_RATE_HZ,
	}}

	pub fn code_period_ms(&self) -> u32 { match self.system() {
		GnssSystem::Gps     => gps_l1_ca::CODE_PERIOD_MS,
		GnssSystem::Galileo => galileo_e1::CODE_PERIOD_MS,
	}}

	pub fn prn_range(&self) -> std::ops::RangeInclusive<u32> { match self.system() {
		GnssSystem::Gps     => 1..=gps_l1_ca::MAX_PRN,
		GnssSystem::Galileo => 1..=galileo_e1::MAX_PRN,
	}}

	/// The CBOC combination this signal is actually broadcast with
	pub fn cboc_plus(&self) -> bool { *self != Signal::GalileoE1C }

}

impl fmt::Display for Signal {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.name()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaVariant {
	Bpsk,
	SinBoc11,
	Cboc { plus:bool },
}

impl ReplicaVariant {

	fn subcarrier(&self, chip_phase:f64) -> f64 { match self {
		ReplicaVariant::Bpsk         => 1.0,
		ReplicaVariant::SinBoc11     => sinboc(1, chip_phase),
		ReplicaVariant::Cboc{ plus } => cboc(chip_phase, *plus),
	}}

}

/// One code period of a local replica sampled at the receiver rate
#[derive(Debug, Clone)]
pub struct CodeReplica {
	pub signal: Signal,
	pub prn: u32,
	pub variant: ReplicaVariant,
	samples: Arc<[Complex<f64>]>,
}

impl CodeReplica {

	pub fn samples(&self) -> &[Complex<f64>] { &self.samples }
	pub fn len(&self) -> usize { self.samples.len() }
	pub fn is_empty(&self) -> bool { self.samples.is_empty() }
	pub fn energy(&self) -> f64 { self.samples.iter().map(|c| c.norm_sqr()).sum() }

}

/// Number of samples in one primary code period
pub fn samples_per_code(signal:Signal, fs:f64) -> Result<usize, AcqError> {
	if !(fs.is_finite() && fs > 0.0) { return Err(AcqError::InvalidSampleRate); }
	let n = (fs * (signal.code_period_ms() as f64) / 1000.0).round() as usize;
	if n == 0 { Err(AcqError::InvalidSampleRate) } else { Ok(n) }
}

/// Half width in samples of the main correlation lobe, one chip plus one sample
pub fn exclusion_samples(signal:Signal, fs:f64) -> usize {
	(fs / signal.chip_rate_hz()).ceil() as usize + 1
}

fn chips_for(signal:Signal, prn:u32, codes:Option<&MemoryCodeBook>) -> Result<Vec<i8>, AcqError> {
	if !signal.prn_range().contains(&prn) {
		return Err(AcqError::InvalidSatelliteId{ prn, signal: signal.name().to_string() });
	}
	match signal.system() {
		GnssSystem::Gps => gps_l1_ca::signal_modulation::prn_int(prn),
		GnssSystem::Galileo => {
			let book = codes.ok_or_else(|| AcqError::MissingCodeBook(signal.name().to_string()))?;
			if book.signal() != signal {
				return Err(AcqError::CodeBook(format!("book holds {} codes, {} requested", book.signal(), signal)));
			}
			Ok(book.code(prn)?.to_vec())
		}
	}
}

fn sample_code(chips:&[i8], variant:ReplicaVariant, chip_rate:f64, fs:f64, n_samples:usize) -> Arc<[Complex<f64>]> {
	let chip_len = chips.len();
	(0..n_samples).map(|i| {
		let t_chips = (i as f64) * chip_rate / fs;
		let chip_idx = (t_chips.floor() as usize) % chip_len;
		let chip_phase = t_chips - t_chips.floor();
		Complex{ re: (chips[chip_idx] as f64) * variant.subcarrier(chip_phase), im: 0.0 }
	}).collect()
}

/// Builds the replicas a search cycles through.  GPS L1 C/A yields one BPSK replica.  Galileo E1 yields
/// a BOC(1,1) replica, or with `cboc` set the signal's own CBOC combination followed by the opposite one.
pub fn code_replicas(signal:Signal, prn:u32, cboc:bool, fs:f64, codes:Option<&MemoryCodeBook>) -> Result<Vec<CodeReplica>, AcqError> {
	let variants:Vec<ReplicaVariant> = match (signal.system(), cboc) {
		(GnssSystem::Gps, false) => vec![ReplicaVariant::Bpsk],
		(GnssSystem::Gps, true)  => return Err(AcqError::UnsupportedSignal(format!("{} with CBOC", signal))),
		(GnssSystem::Galileo, false) => vec![ReplicaVariant::SinBoc11],
		(GnssSystem::Galileo, true)  => vec![
			ReplicaVariant::Cboc{ plus:  signal.cboc_plus() },
			ReplicaVariant::Cboc{ plus: !signal.cboc_plus() },
		],
	};

	let n_samples = samples_per_code(signal, fs)?;
	let chips = chips_for(signal, prn, codes)?;

	Ok(variants.into_iter().map(|variant| CodeReplica {
		signal, prn, variant,
		samples: sample_code(&chips, variant, signal.chip_rate_hz(), fs, n_samples),
	}).collect())
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;
	use rand::{Rng, SeedableRng};
	use rand::rngs::StdRng;

	fn synthetic_book(signal:Signal, n_prn:usize, seed:u64) -> MemoryCodeBook {
		let mut rng = StdRng::seed_from_u64(seed);
		let codes = (0..n_prn).map(|_| (0..galileo_e1::CODE_LENGTH).map(|_| if rng.gen::<bool>() { 1 } else { -1 }).collect()).collect();
		MemoryCodeBook::from_chips(signal, codes).unwrap()
	}

	#[test]
	fn signal_parts() {
		assert_eq!(Signal::from_parts('G', "1C").unwrap(), Signal::GpsL1Ca);
		assert_eq!(Signal::from_parts('E', "1B").unwrap(), Signal::GalileoE1B);
		assert_eq!(Signal::from_parts('E', "1C").unwrap(), Signal::GalileoE1C);
		assert!(Signal::from_parts('G', "2S").is_err());
		assert!(Signal::from_parts('R', "1C").is_err());
		assert_eq!(Signal::GalileoE1B.system().to_char(), 'E');
	}

	#[test]
	fn gps_replica_at_chip_rate_is_the_code() {
		let replicas = code_replicas(Signal::GpsL1Ca, 1, false, 1.023e6, None).unwrap();
		assert_eq!(replicas.len(), 1);
		assert_eq!(replicas[0].variant, ReplicaVariant::Bpsk);

		let code = gps_l1_ca::signal_modulation::prn_int(1).unwrap();
		let samples:Vec<f64> = replicas[0].samples().iter().map(|c| c.re).collect();
		let expected:Vec<f64> = code.iter().map(|c| *c as f64).collect();
		assert_eq!(samples, expected);
		assert_abs_diff_eq!(replicas[0].energy(), 1023.0);
	}

	#[test]
	fn replica_sampling_rate() {
		let replicas = code_replicas(Signal::GpsL1Ca, 3, false, 4e6, None).unwrap();
		assert_eq!(replicas[0].len(), 4000);

		let book = synthetic_book(Signal::GalileoE1B, 2, 7);
		let replicas = code_replicas(Signal::GalileoE1B, 2, false, 4e6, Some(&book)).unwrap();
		assert_eq!(replicas[0].len(), 16000);
		assert_eq!(replicas[0].variant, ReplicaVariant::SinBoc11);
	}

	#[test]
	fn ambiguous_variants_start_with_own_modulation() {
		let book_b = synthetic_book(Signal::GalileoE1B, 1, 1);
		let book_c = synthetic_book(Signal::GalileoE1C, 1, 2);

		let b = code_replicas(Signal::GalileoE1B, 1, true, 4e6, Some(&book_b)).unwrap();
		assert_eq!(b.iter().map(|r| r.variant).collect::<Vec<_>>(), vec![ReplicaVariant::Cboc{ plus: true }, ReplicaVariant::Cboc{ plus: false }]);

		let c = code_replicas(Signal::GalileoE1C, 1, true, 4e6, Some(&book_c)).unwrap();
		assert_eq!(c[0].variant, ReplicaVariant::Cboc{ plus: false });
	}

	#[test]
	fn replica_errors() {
		assert!(matches!(code_replicas(Signal::GpsL1Ca, 0, false, 4e6, None), Err(AcqError::InvalidSatelliteId{ prn: 0, .. })));
		assert!(matches!(code_replicas(Signal::GpsL1Ca, 33, false, 4e6, None), Err(AcqError::InvalidSatelliteId{ prn: 33, .. })));
		assert!(matches!(code_replicas(Signal::GpsL1Ca, 1, true, 4e6, None), Err(AcqError::UnsupportedSignal(_))));
		assert!(matches!(code_replicas(Signal::GalileoE1B, 1, false, 4e6, None), Err(AcqError::MissingCodeBook(_))));
		assert!(matches!(code_replicas(Signal::GalileoE1B, 51, false, 4e6, None), Err(AcqError::InvalidSatelliteId{ .. })));
		assert!(matches!(code_replicas(Signal::GpsL1Ca, 1, false, 0.0, None), Err(AcqError::InvalidSampleRate)));

		let book = synthetic_book(Signal::GalileoE1C, 1, 3);
		assert!(matches!(code_replicas(Signal::GalileoE1B, 1, false, 4e6, Some(&book)), Err(AcqError::CodeBook(_))));
	}

	#[test]
	fn exclusion_zone_covers_one_chip() {
		assert_eq!(exclusion_samples(Signal::GalileoE1B, 4e6), 5);
		assert_eq!(exclusion_samples(Signal::GpsL1Ca, 2.048e6), 4);
	}
}

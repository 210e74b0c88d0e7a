use std::f64::consts;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner};
use rustfft::num_complex::Complex;
use num_traits::Zero;

use crate::AcqError;
use crate::gnss::common::replica::CodeReplica;

/// Mean power of one sample, 0.0 for an empty buffer
pub fn mean_power(signal:&[Complex<f64>]) -> f64 {
	if signal.is_empty() { 0.0 }
	else { signal.iter().map(|c| c.norm_sqr()).sum::<f64>() / (signal.len() as f64) }
}

/// Circular correlation of an integration buffer against one replica, one Doppler hypothesis at a time.
/// The FFT plans and the conjugated replica spectrum are built once and reused for every call.
pub struct Correlator {
	fs:f64,
	if_hz:f64,
	len_fft:usize,
	samples_per_code:usize,
	fft:Arc<dyn Fft<f64>>,
	ifft:Arc<dyn Fft<f64>>,
	local_code_freq_domain:Vec<Complex<f64>>,
	code_energy:f64,
	work:Vec<Complex<f64>>,
	scratch:Vec<Complex<f64>>,
}

impl Correlator {

	pub fn new(replica:&CodeReplica, fs:f64, if_hz:f64, len_fft:usize) -> Result<Self, AcqError> {
		if !(fs.is_finite() && fs > 0.0) { return Err(AcqError::InvalidSampleRate); }
		let samples_per_code = replica.len();
		if samples_per_code == 0 || len_fft < samples_per_code {
			return Err(AcqError::InvalidIntegrationTime{ sampled_ms: (1000.0 * (len_fft as f64) / fs).round() as u32, code_period_ms: replica.signal.code_period_ms() });
		}

		let mut planner = FftPlanner::<f64>::new();
		let fft  = planner.plan_fft_forward(len_fft);
		let ifft = planner.plan_fft_inverse(len_fft);
		let mut scratch = vec![Complex::zero(); fft.get_inplace_scratch_len().max(ifft.get_inplace_scratch_len())];

		// Tile the replica over the whole integration time
		let code = replica.samples();
		let mut local_code:Vec<Complex<f64>> = (0..len_fft).map(|idx| code[idx % samples_per_code]).collect();
		let code_energy:f64 = local_code.iter().map(|c| c.norm_sqr()).sum();

		fft.process_with_scratch(&mut local_code, &mut scratch);
		let local_code_freq_domain:Vec<Complex<f64>> = local_code.into_iter().map(|p| p.conj()).collect();

		Ok(Self { fs, if_hz, len_fft, samples_per_code, fft, ifft, local_code_freq_domain, code_energy,
			work: vec![Complex::zero(); len_fft], scratch })
	}

	pub fn len_fft(&self) -> usize { self.len_fft }
	pub fn samples_per_code(&self) -> usize { self.samples_per_code }
	pub fn code_energy(&self) -> f64 { self.code_energy }

	/// Fills `row` (one cell per code delay) with `|r|^2 / (input_power * code_energy)` for a carrier at
	/// `if_hz + doppler_hz`.  Anything degenerate (wrong buffer length, no input power, no replica energy)
	/// gives a row of zeros.
	pub fn correlate(&mut self, signal:&[Complex<f64>], input_power:f64, doppler_hz:f64, row:&mut [f64]) {
		for cell in row.iter_mut() { *cell = 0.0; }

		if signal.len() != self.len_fft || !(input_power.is_finite() && input_power > 0.0) || self.code_energy <= 0.0 {
			return;
		}

		// Wipe the carrier off the input signal
		let phase_step_rad:f64 = (-2.0 * consts::PI * (self.if_hz + doppler_hz)) / self.fs;
		for (idx, (w, s)) in self.work.iter_mut().zip(signal.iter()).enumerate() {
			let phase = phase_step_rad * (idx as f64);
			*w = *s * Complex{ re: phase.cos(), im: phase.sin() };
		}

		self.fft.process_with_scratch(&mut self.work, &mut self.scratch);

		// Multiplication in the freq domain is circular correlation in the time domain
		for (w, c) in self.work.iter_mut().zip(self.local_code_freq_domain.iter()) {
			*w *= c;
		}

		self.ifft.process_with_scratch(&mut self.work, &mut self.scratch);

		let norm = input_power * self.code_energy;
		let scale = 1.0 / (self.len_fft as f64);
		for (cell, r) in row.iter_mut().zip(self.work.iter()).take(self.samples_per_code) {
			let stat = (*r * scale).norm_sqr() / norm;
			*cell = if stat.is_finite() { stat } else { 0.0 };
		}
	}

}

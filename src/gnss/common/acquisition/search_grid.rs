use std::sync::atomic::{AtomicBool, Ordering};

use rustfft::num_complex::Complex;

use super::pcps::Correlator;

/// Doppler hypotheses in ascending order: -max, -max+step, ... with floor(2*max/step)+1 entries
pub fn doppler_bins(doppler_max:u32, doppler_step:u32) -> Vec<i32> {
	if doppler_step == 0 { return vec![]; }
	let n_bins = (2 * doppler_max as u64 / doppler_step as u64) as i64 + 1;
	(0..n_bins).map(|idx| (-(doppler_max as i64) + idx * (doppler_step as i64)) as i32).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPeak {
	pub statistic:f64,
	pub doppler_hz:f64,
	pub code_phase:usize,
	pub secondary_statistic:f64,
	pub noise_floor:f64,
}

/// Test statistic for every (Doppler, delay) hypothesis of one attempt, stored row-major by Doppler bin
#[derive(Debug, Clone)]
pub struct SearchGrid {
	doppler_bins:Vec<i32>,
	n_delays:usize,
	cells:Vec<f64>,
}

impl SearchGrid {

	pub fn new(doppler_bins:Vec<i32>, n_delays:usize) -> Self {
		let cells = vec![0.0; doppler_bins.len() * n_delays];
		Self { doppler_bins, n_delays, cells }
	}

	pub fn doppler_bins(&self) -> &[i32] { &self.doppler_bins }
	pub fn n_delays(&self) -> usize { self.n_delays }
	pub fn row(&self, bin_idx:usize) -> &[f64] { &self.cells[bin_idx*self.n_delays..(bin_idx+1)*self.n_delays] }
	pub fn row_mut(&mut self, bin_idx:usize) -> &mut [f64] { &mut self.cells[bin_idx*self.n_delays..(bin_idx+1)*self.n_delays] }

	/// Largest cell in the grid.  Ties go to the first cell in (Doppler, delay) order.  Every cell within
	/// `exclusion` samples of circular delay distance from the peak, in any Doppler row, belongs to the
	/// main lobe; the secondary statistic and noise floor are taken over the remaining cells.
	pub fn peak(&self, exclusion:usize) -> GridPeak {
		let mut best_bin = 0;
		let mut best_delay = 0;
		let mut best = 0.0;
		for bin_idx in 0..self.doppler_bins.len() {
			for (delay, stat) in self.row(bin_idx).iter().enumerate() {
				if *stat > best {
					best = *stat;
					best_bin = bin_idx;
					best_delay = delay;
				}
			}
		}

		let mut secondary:f64 = 0.0;
		let mut total:f64 = 0.0;
		let mut count:usize = 0;
		for bin_idx in 0..self.doppler_bins.len() {
			for (delay, stat) in self.row(bin_idx).iter().enumerate() {
				let diff = if delay > best_delay { delay - best_delay } else { best_delay - delay };
				let distance = diff.min(self.n_delays - diff);
				if distance > exclusion {
					secondary = secondary.max(*stat);
					total += *stat;
					count += 1;
				}
			}
		}

		GridPeak {
			statistic: best,
			doppler_hz: self.doppler_bins.get(best_bin).map(|d| *d as f64).unwrap_or(0.0),
			code_phase: best_delay,
			secondary_statistic: secondary,
			noise_floor: if count > 0 { total / (count as f64) } else { 0.0 },
		}
	}

}

/// Runs one correlation per Doppler bin, in ascending order.  The stop flag is checked before each bin;
/// if it's set the partial grid is thrown away and None comes back.
pub fn search(correlator:&mut Correlator, signal:&[Complex<f64>], input_power:f64, bins:&[i32], stop:&AtomicBool) -> Option<SearchGrid> {
	let mut grid = SearchGrid::new(bins.to_vec(), correlator.samples_per_code());
	for (bin_idx, doppler_hz) in bins.iter().enumerate() {
		if stop.load(Ordering::Acquire) {
			tracing::debug!(doppler_hz, "Search stopped before Doppler pass");
			return None;
		}
		correlator.correlate(signal, input_power, *doppler_hz as f64, grid.row_mut(bin_idx));
		tracing::trace!(doppler_hz, "Doppler pass complete");
	}
	Some(grid)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;
	use rand_distr::{Distribution, Normal};
	use crate::gnss::common::acquisition::pcps::mean_power;
	use crate::gnss::common::replica::{code_replicas, Signal};

	#[test]
	fn bin_counts() {
		let bins = doppler_bins(10000, 125);
		assert_eq!(bins.len(), 161);
		assert_eq!(bins[0], -10000);
		assert_eq!(bins[80], 0);
		assert_eq!(bins[160], 10000);

		assert_eq!(doppler_bins(10000, 500).len(), 41);
		assert_eq!(doppler_bins(1000, 300), vec![-1000, -700, -400, -100, 200, 500, 800]);
		assert_eq!(doppler_bins(0, 100), vec![0]);
	}

	#[test]
	fn peak_ties_keep_first_cell() {
		let mut grid = SearchGrid::new(vec![-500, 0, 500], 10);
		grid.row_mut(1)[7] = 3.0;
		grid.row_mut(2)[2] = 3.0;
		let peak = grid.peak(1);
		assert_eq!(peak.doppler_hz, 0.0);
		assert_eq!(peak.code_phase, 7);
		assert_eq!(peak.statistic, 3.0);
		// The equal cell in the last row is outside the main lobe
		assert_eq!(peak.secondary_statistic, 3.0);
	}

	#[test]
	fn exclusion_wraps_around() {
		let mut grid = SearchGrid::new(vec![0, 100], 20);
		grid.row_mut(0)[0] = 10.0;
		grid.row_mut(1)[19] = 8.0;	// circular distance 1
		grid.row_mut(0)[18] = 6.0;	// circular distance 2
		grid.row_mut(1)[5] = 1.0;

		let peak = grid.peak(2);
		assert_eq!(peak.code_phase, 0);
		assert_eq!(peak.secondary_statistic, 1.0);
		// 2 rows x (20 - 5 excluded delays), only one of them non-zero
		approx::assert_relative_eq!(peak.noise_floor, 1.0 / 30.0);
	}

	#[test]
	fn all_zero_grid() {
		let grid = SearchGrid::new(doppler_bins(1000, 500), 100);
		let peak = grid.peak(3);
		assert_eq!(peak.statistic, 0.0);
		assert_eq!(peak.doppler_hz, -1000.0);
		assert_eq!(peak.code_phase, 0);
		assert_eq!(peak.noise_floor, 0.0);
	}

	fn noisy_gps_buffer(fs:f64, len:usize, seed:u64) -> Vec<Complex<f64>> {
		let replica = code_replicas(Signal::GpsL1Ca, 12, false, fs, None).unwrap().remove(0);
		let n = replica.len();
		let normal = Normal::new(0.0, 1.0).unwrap();
		let mut rng = StdRng::seed_from_u64(seed);
		(0..len).map(|i| {
			let phase = 2.0 * std::f64::consts::PI * 2000.0 * (i as f64) / fs;
			replica.samples()[(i + n - 400) % n] * Complex{ re: phase.cos(), im: phase.sin() }
				+ Complex{ re: normal.sample(&mut rng), im: normal.sample(&mut rng) }
		}).collect()
	}

	#[test]
	fn search_finds_signal_and_is_repeatable() {
		let fs = 2.048e6;
		let replica = code_replicas(Signal::GpsL1Ca, 12, false, fs, None).unwrap().remove(0);
		let mut corr = Correlator::new(&replica, fs, 0.0, replica.len()).unwrap();
		let signal = noisy_gps_buffer(fs, replica.len(), 11);
		let p = mean_power(&signal);
		let bins = doppler_bins(5000, 250);
		let stop = AtomicBool::new(false);

		let first = search(&mut corr, &signal, p, &bins, &stop).unwrap().peak(3);
		let second = search(&mut corr, &signal, p, &bins, &stop).unwrap().peak(3);
		assert_eq!(first, second);
		assert!((first.doppler_hz - 2000.0).abs() <= 250.0);
		assert_eq!(first.code_phase, 400);
		assert!(first.statistic > first.secondary_statistic);
	}

	#[test]
	fn stop_flag_aborts_search() {
		let fs = 2.048e6;
		let replica = code_replicas(Signal::GpsL1Ca, 12, false, fs, None).unwrap().remove(0);
		let mut corr = Correlator::new(&replica, fs, 0.0, replica.len()).unwrap();
		let signal = noisy_gps_buffer(fs, replica.len(), 3);
		let stop = AtomicBool::new(true);
		assert!(search(&mut corr, &signal, mean_power(&signal), &doppler_bins(5000, 250), &stop).is_none());
	}
}

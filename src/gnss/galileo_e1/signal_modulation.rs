// Sub-carriers for E1 are functions of the position inside a chip, chip_phase in [0, 1)

const CBOC_ALPHA:f64 = 0.953_462_589_245_592_4;	// sqrt(10/11)
const CBOC_BETA:f64  = 0.301_511_344_577_763_6;	// sqrt(1/11)

/// Sine-phased BOC(m,1) square wave: 2m half periods per chip, starting positive
pub fn sinboc(m:u32, chip_phase:f64) -> f64 {
	let half_period_idx = (chip_phase * 2.0 * (m as f64)).floor() as i64;
	if half_period_idx % 2 == 0 { 1.0 } else { -1.0 }
}

/// CBOC(6,1,1/11).  E1B carries the '+' combination and E1C the '-' one.
pub fn cboc(chip_phase:f64, plus:bool) -> f64 {
	let sign = if plus { 1.0 } else { -1.0 };
	CBOC_ALPHA * sinboc(1, chip_phase) + sign * CBOC_BETA * sinboc(6, chip_phase)
}

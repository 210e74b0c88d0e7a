use crate::AcqError;

use super::{CODE_LENGTH, MAX_PRN};

// G2 delay in chips for each PRN, given in IS-GPS-200, Table 3-Ia
const G2_DELAY:[usize; 32] = [
	  5,   6,   7,   8,  17,  18, 139, 140,	// PRN 01-08
	141, 251, 252, 254, 255, 256, 257, 258,	// PRN 09-16
	469, 470, 471, 472, 473, 474, 509, 512,	// PRN 17-24
	513, 514, 515, 516, 859, 860, 861, 862,	// PRN 25-32
];

/// One period of the C/A Gold code as logic values
pub fn prn_bits(prn:u32) -> Result<Vec<bool>, AcqError> {
	if prn < 1 || prn > MAX_PRN {
		return Err(AcqError::InvalidSatelliteId{ prn, signal: "GPS L1 C/A".to_string() });
	}

	// Both shift registers start out as all ones; the output of each register is stage 10
	let mut g1:[bool; 10] = [true; 10];
	let mut g2:[bool; 10] = [true; 10];
	let mut g1_out:Vec<bool> = Vec::with_capacity(CODE_LENGTH);
	let mut g2_out:Vec<bool> = Vec::with_capacity(CODE_LENGTH);

	for _ in 0..CODE_LENGTH {
		g1_out.push(g1[9]);
		g2_out.push(g2[9]);

		// G1 = 1 + x^3 + x^10, G2 = 1 + x^2 + x^3 + x^6 + x^8 + x^9 + x^10
		let fb1 = g1[2] ^ g1[9];
		let fb2 = g2[1] ^ g2[2] ^ g2[5] ^ g2[7] ^ g2[8] ^ g2[9];
		g1.rotate_right(1);
		g2.rotate_right(1);
		g1[0] = fb1;
		g2[0] = fb2;
	}

	let delay = G2_DELAY[(prn - 1) as usize];
	Ok((0..CODE_LENGTH).map(|i| g1_out[i] ^ g2_out[(i + CODE_LENGTH - delay) % CODE_LENGTH]).collect())
}

/// One period of the C/A code as chips; logic one maps to +1
pub fn prn_int(prn:u32) -> Result<Vec<i8>, AcqError> {
	Ok(prn_bits(prn)?.into_iter().map(|b| if b { 1 } else { -1 }).collect())
}

//! Galileo E1 primary codes are memory codes; they can't be generated from shift registers, so they're
//! loaded from the hexadecimal tables published in the OS SIS ICD (Annex C).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::AcqError;
use crate::gnss::common::replica::Signal;

use super::{CODE_LENGTH, HEX_DIGITS_PER_CODE, MAX_PRN};

#[derive(Debug, Clone)]
pub struct MemoryCodeBook {
	signal: Signal,
	codes: Vec<Vec<i8>>,
}

impl MemoryCodeBook {

	/// One code per line, 1023 hex digits each, in PRN order starting at PRN 1.  Blank lines and lines
	/// starting with '#' are skipped.
	pub fn parse(signal:Signal, text:&str) -> Result<Self, AcqError> {
		let mut codes:Vec<Vec<i8>> = vec![];

		for (line_idx, line) in text.lines().enumerate() {
			let line = line.trim();
			if line.is_empty() || line.starts_with('#') { continue; }

			if line.len() != HEX_DIGITS_PER_CODE {
				return Err(AcqError::CodeBook(format!("line {} has {} hex digits, expected {}", line_idx+1, line.len(), HEX_DIGITS_PER_CODE)));
			}

			let mut chips:Vec<i8> = Vec::with_capacity(CODE_LENGTH);
			for c in line.chars() {
				let nibble = c.to_digit(16).ok_or_else(|| AcqError::CodeBook(format!("line {} has non-hex character {:?}", line_idx+1, c)))?;
				// Most significant bit first; logic zero maps to +1
				for bit in (0..4).rev() {
					chips.push(if (nibble >> bit) & 1 == 0 { 1 } else { -1 });
				}
			}
			codes.push(chips);
		}

		Self::from_chips(signal, codes)
	}

	pub fn from_reader<R: Read>(signal:Signal, mut reader:R) -> Result<Self, AcqError> {
		let mut text = String::new();
		reader.read_to_string(&mut text)?;
		Self::parse(signal, &text)
	}

	pub fn from_file<P: AsRef<Path>>(signal:Signal, path:P) -> Result<Self, AcqError> {
		Self::from_reader(signal, File::open(path)?)
	}

	pub fn from_chips(signal:Signal, codes:Vec<Vec<i8>>) -> Result<Self, AcqError> {
		if signal.system() != crate::gnss::common::replica::GnssSystem::Galileo {
			return Err(AcqError::UnsupportedSignal(format!("memory codes for {}", signal.name())));
		}
		if codes.is_empty() {
			return Err(AcqError::CodeBook("no codes".to_string()));
		}
		if codes.len() > MAX_PRN as usize {
			return Err(AcqError::CodeBook(format!("{} codes, at most {} expected", codes.len(), MAX_PRN)));
		}
		for (idx, code) in codes.iter().enumerate() {
			if code.len() != CODE_LENGTH || code.iter().any(|c| *c != 1 && *c != -1) {
				return Err(AcqError::CodeBook(format!("code for PRN {} isn't {} chips of +/-1", idx+1, CODE_LENGTH)));
			}
		}
		Ok(Self { signal, codes })
	}

	pub fn signal(&self) -> Signal { self.signal }
	pub fn len(&self) -> usize { self.codes.len() }
	pub fn is_empty(&self) -> bool { self.codes.is_empty() }

	pub fn code(&self, prn:u32) -> Result<&[i8], AcqError> {
		if prn >= 1 && (prn as usize) <= self.codes.len() {
			Ok(&self.codes[(prn - 1) as usize])
		} else {
			Err(AcqError::InvalidSatelliteId{ prn, signal: self.signal.name().to_string() })
		}
	}

}

#[cfg(test)]
mod tests {
	use super::*;

	fn hex_line(digit:char) -> String { std::iter::repeat(digit).take(HEX_DIGITS_PER_CODE).collect() }

	#[test]
	fn parse_hex_table() {
		let text = format!("# E1B test table\n{}\n\n{}\n", hex_line('0'), hex_line('A'));
		let book = MemoryCodeBook::parse(Signal::GalileoE1B, &text).unwrap();
		assert_eq!(book.len(), 2);

		assert!(book.code(1).unwrap().iter().all(|c| *c == 1));
		// 0xA = 1010
		assert_eq!(&book.code(2).unwrap()[..8], &[-1, 1, -1, 1, -1, 1, -1, 1]);
	}

	#[test]
	fn prn_outside_book() {
		let book = MemoryCodeBook::parse(Signal::GalileoE1C, &hex_line('F')).unwrap();
		assert!(book.code(1).is_ok());
		assert!(matches!(book.code(0), Err(AcqError::InvalidSatelliteId{ .. })));
		assert!(matches!(book.code(2), Err(AcqError::InvalidSatelliteId{ .. })));
	}

	#[test]
	fn malformed_tables() {
		assert!(matches!(MemoryCodeBook::parse(Signal::GalileoE1B, "ABC"), Err(AcqError::CodeBook(_))));
		let mut bad = hex_line('1');
		bad.replace_range(0..1, "G");
		assert!(matches!(MemoryCodeBook::parse(Signal::GalileoE1B, &bad), Err(AcqError::CodeBook(_))));
		assert!(matches!(MemoryCodeBook::parse(Signal::GalileoE1B, "# nothing here\n"), Err(AcqError::CodeBook(_))));
		assert!(matches!(MemoryCodeBook::parse(Signal::GpsL1Ca, &hex_line('1')), Err(AcqError::UnsupportedSignal(_))));
	}
}

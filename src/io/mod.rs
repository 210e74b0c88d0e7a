use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rustfft::num_complex::Complex;

use crate::AcqError;
use crate::config::ItemType;

pub const BUFFER_SIZE:usize = 2048;

/// Interleaved I/Q samples from a capture file or any other reader, converted to `Complex<f64>`
pub struct SampleFileSource<R: Read> {
	src: BufReader<R>,
	item_type: ItemType,
	idx: u64,
}

impl SampleFileSource<File> {

	pub fn from_file<P: AsRef<Path>>(path:P, item_type:ItemType) -> Result<Self, AcqError> {
		Ok(Self::new(File::open(path)?, item_type))
	}

}

impl<R: Read> SampleFileSource<R> {

	pub fn new(src:R, item_type:ItemType) -> Self {
		Self { src: BufReader::with_capacity(BUFFER_SIZE * item_type.item_size(), src), item_type, idx: 0 }
	}


	/// Number of samples handed out so far
	pub fn samples_read(&self) -> u64 { self.idx }

	fn read_sample(&mut self) -> std::io::Result<Complex<f64>> {
		let (re, im) = match self.item_type {
			ItemType::GrComplex    => (self.src.read_f32::<LittleEndian>()? as f64, self.src.read_f32::<LittleEndian>()? as f64),
			ItemType::ComplexShort => (self.src.read_i16::<LittleEndian>()? as f64, self.src.read_i16::<LittleEndian>()? as f64),
			ItemType::ComplexByte  => (self.src.read_i8()? as f64, self.src.read_i8()? as f64),
		};
		Ok(Complex{ re, im })
	}

}

impl<R: Read> Iterator for SampleFileSource<R> {
	type Item = Complex<f64>;

	fn next(&mut self) -> Option<Complex<f64>> {
		match self.read_sample() {
			Ok(c) => {
				self.idx += 1;
				Some(c)
			},
			// A trailing partial sample is dropped along with the end of the file
			Err(e) if e.kind() == ErrorKind::UnexpectedEof => None,
			Err(e) => {
				tracing::warn!(error = %e, samples = self.idx, "Unable to read sample, ending stream");
				None
			}
		}
	}
}

/// Writes samples in the layout `item_type` describes; integer layouts are rounded and saturated
pub fn write_samples<W: Write>(dst:W, samples:&[Complex<f64>], item_type:ItemType) -> Result<(), AcqError> {
	let mut dst = BufWriter::new(dst);
	for c in samples {
		match item_type {
			ItemType::GrComplex => {
				dst.write_f32::<LittleEndian>(c.re as f32)?;
				dst.write_f32::<LittleEndian>(c.im as f32)?;
			},
			ItemType::ComplexShort => {
				dst.write_i16::<LittleEndian>(c.re.round() as i16)?;
				dst.write_i16::<LittleEndian>(c.im.round() as i16)?;
			},
			ItemType::ComplexByte => {
				dst.write_i8(c.re.round() as i8)?;
				dst.write_i8(c.im.round() as i8)?;
			},
		}
	}
	dst.flush()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Seek, SeekFrom};

	fn ramp(n:usize) -> Vec<Complex<f64>> {
		(0..n).map(|i| Complex{ re: i as f64, im: -(i as f64) }).collect()
	}

	#[test]
	fn gr_complex_file() {
		let mut file = tempfile::tempfile().unwrap();
		write_samples(&mut file, &ramp(5000), ItemType::GrComplex).unwrap();
		file.seek(SeekFrom::Start(0)).unwrap();

		let mut src = SampleFileSource::new(file, ItemType::GrComplex);
		let read:Vec<Complex<f64>> = src.by_ref().collect();
		assert_eq!(read, ramp(5000));
		assert_eq!(src.samples_read(), 5000);
	}

	#[test]
	fn integer_layouts() {
		let samples = ramp(100);
		for item_type in [ItemType::ComplexShort, ItemType::ComplexByte] {
			let mut bytes:Vec<u8> = vec![];
			write_samples(&mut bytes, &samples, item_type).unwrap();
			assert_eq!(bytes.len(), 100 * item_type.item_size());

			let read:Vec<Complex<f64>> = SampleFileSource::new(&bytes[..], item_type).collect();
			assert_eq!(read, samples);
		}
	}

	#[test]
	fn trailing_partial_sample_is_dropped() {
		let bytes:Vec<u8> = vec![1, 255, 2, 254, 3];
		let read:Vec<Complex<f64>> = SampleFileSource::new(&bytes[..], ItemType::ComplexByte).collect();
		assert_eq!(read, vec![Complex{ re: 1.0, im: -1.0 }, Complex{ re: 2.0, im: -2.0 }]);
	}

	#[test]
	fn missing_file() {
		let dir = tempfile::tempdir().unwrap();
		assert!(matches!(SampleFileSource::from_file(dir.path().join("nope.dat"), ItemType::GrComplex), Err(AcqError::Io(_))));
	}
}

use std::fmt::Formatter;
use std::io::Read;
use std::sync::Arc;

use crate::errors::Result;

#[inline]
pub(crate) fn read_byte(stream: &mut dyn Read) -> Result<u8> {
	let mut byte = 0u8;
	stream.read_exact(std::slice::from_mut(&mut byte))?;
	Ok(byte)
}

#[inline]
pub(crate) fn read_array<const SIZE: usize>(stream: &mut dyn Read) -> Result<[u8; SIZE]> {
	let mut bytes = [0u8; SIZE];
	stream.read_exact(&mut bytes)?;
	Ok(bytes)
}

pub(crate) fn skip_bytes(stream: &mut dyn Read, mut count: u64) -> Result<()> {
	let mut scratch = [0u8; 512];
	while count > 0 {
		let chunk = count.min(scratch.len() as u64) as usize;
		stream.read_exact(&mut scratch[..chunk])?;
		count -= chunk as u64;
	}
	Ok(())
}

pub(crate) fn display_as_hex(bytes: &Arc<[u8]>, fmt: &mut Formatter) -> std::fmt::Result {
	match bytes.is_empty() {
		true => fmt.write_str("null"),
		false => {
			for byte in bytes.iter() {
				write!(fmt, "{byte:02x}")?;
			}
			Ok(())
		},
	}
}

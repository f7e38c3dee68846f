use std::io::{Read, Write};

use paste::paste;
use uuid::Uuid;

use crate::errors::{Result, SerializationError};
use crate::tokens::{Optimization, Token};
use crate::values::{Date, DateTime, DateTimeOffset, Decimal, Time};
use crate::var_int;

/// Low-level primitive encoder over the output stream. All multi-byte values
/// are little-endian on the wire; in Size mode the 16/32/64-bit integer
/// primitives switch to LEB128.
pub struct TokenWriter<'l> {
	stream: &'l mut dyn Write,
	mode: Optimization,
}

macro_rules! impl_numeric_writes {
	($($ty: ident => $domain: ident),*) => {paste! {$(
		pub fn [<write_ $ty>](&mut self, value: $ty) -> Result<()> {
			match self.mode {
				Optimization::Speed => self.write_bytes(&value.to_le_bytes()),
				Optimization::Size => {
					var_int::[<write_ $domain>](&mut *self.stream, value as $domain)?;
					Ok(())
				},
			}
		}
	)*}};
}

impl<'l> TokenWriter<'l> {
	pub(crate) fn new(stream: &'l mut dyn Write, mode: Optimization) -> Self {
		Self { stream, mode }
	}

	#[inline]
	pub fn mode(&self) -> Optimization {
		self.mode
	}

	#[inline]
	pub(crate) fn write_token(&mut self, token: Token) -> Result<()> {
		token.write(&mut *self.stream)
	}

	#[inline]
	pub(crate) fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
		self.stream.write_all(bytes)?;
		Ok(())
	}

	/// Lengths, counts and back-reference ids are LEB128 regardless of mode.
	#[inline]
	pub(crate) fn write_len(&mut self, value: usize) -> Result<()> {
		var_int::write_u64(&mut *self.stream, value as u64)?;
		Ok(())
	}

	#[inline]
	pub(crate) fn write_id(&mut self, value: u32) -> Result<()> {
		var_int::write_u32(&mut *self.stream, value)?;
		Ok(())
	}

	#[inline]
	pub(crate) fn write_var_i32(&mut self, value: i32) -> Result<()> {
		var_int::write_i32(&mut *self.stream, value)?;
		Ok(())
	}

	pub fn write_bool(&mut self, value: bool) -> Result<()> {
		self.write_bytes(&[value as u8])
	}

	pub fn write_i8(&mut self, value: i8) -> Result<()> {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_u8(&mut self, value: u8) -> Result<()> {
		self.write_bytes(&[value])
	}

	impl_numeric_writes! {
		i16 => i32,
		u16 => u32,
		i32 => i32,
		u32 => u32,
		i64 => i64,
		u64 => u64
	}

	pub fn write_char(&mut self, value: char) -> Result<()> {
		match self.mode {
			Optimization::Speed => self.write_bytes(&(value as u32).to_le_bytes()),
			Optimization::Size => {
				var_int::write_u32(&mut *self.stream, value as u32)?;
				Ok(())
			},
		}
	}

	pub fn write_f32(&mut self, value: f32) -> Result<()> {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_f64(&mut self, value: f64) -> Result<()> {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_decimal(&mut self, value: Decimal) -> Result<()> {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_date_time(&mut self, value: DateTime) -> Result<()> {
		self.write_i64(value.ticks())?;
		self.write_bytes(&[value.kind() as u8])
	}

	pub fn write_date_time_offset(&mut self, value: DateTimeOffset) -> Result<()> {
		self.write_i64(value.ticks())?;
		self.write_i16(value.offset_minutes())
	}

	pub fn write_date(&mut self, value: Date) -> Result<()> {
		self.write_i32(value.day_number())
	}

	pub fn write_time(&mut self, value: Time) -> Result<()> {
		self.write_i64(value.ticks())
	}

	pub fn write_guid(&mut self, value: Uuid) -> Result<()> {
		self.write_bytes(value.as_bytes())
	}

	pub(crate) fn write_str_payload(&mut self, value: &str) -> Result<()> {
		self.write_len(value.len())?;
		self.write_bytes(value.as_bytes())
	}

	pub(crate) fn copy_from(&mut self, source: &mut dyn Read, length: u64) -> Result<()> {
		let copied = std::io::copy(&mut (&mut *source).take(length), &mut *self.stream)?;
		match copied == length {
			true => Ok(()),
			false => Err(SerializationError::TruncatedInput),
		}
	}
}

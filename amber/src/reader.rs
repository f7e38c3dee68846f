use std::io::Read;
use std::sync::Arc;

use paste::paste;
use uuid::Uuid;

use crate::errors::{Result, SerializationError};
use crate::tokens::{Optimization, Token};
use crate::utilities::{read_array, skip_bytes};
use crate::values::{Date, DateTime, DateTimeKind, DateTimeOffset, Decimal, Time};
use crate::var_int;

/// Low-level primitive decoder, the mirror of [`TokenWriter`].
///
/// [`TokenWriter`]: crate::writer::TokenWriter
pub struct TokenReader<'l> {
	stream: &'l mut dyn Read,
	mode: Optimization,
}

macro_rules! impl_numeric_reads {
	($($ty: ident => $domain: ident),*) => {paste! {$(
		pub fn [<read_ $ty>](&mut self) -> Result<$ty> {
			match self.mode {
				Optimization::Speed => Ok($ty::from_le_bytes(read_array(&mut *self.stream)?)),
				Optimization::Size => {
					let value = var_int::[<read_ $domain>](&mut *self.stream)?;
					$ty::try_from(value).map_err(|_| SerializationError::Overflow)
				},
			}
		}
	)*}};
}

impl<'l> TokenReader<'l> {
	pub(crate) fn new(stream: &'l mut dyn Read, mode: Optimization) -> Self {
		Self { stream, mode }
	}

	#[inline]
	pub fn mode(&self) -> Optimization {
		self.mode
	}

	#[inline]
	pub(crate) fn read_token(&mut self) -> Result<Token> {
		Token::read(&mut *self.stream)
	}

	#[inline]
	pub(crate) fn read_bytes<const SIZE: usize>(&mut self) -> Result<[u8; SIZE]> {
		read_array(&mut *self.stream)
	}

	pub(crate) fn read_len(&mut self) -> Result<usize> {
		let value = var_int::read_u64(&mut *self.stream)?;
		usize::try_from(value).map_err(|_| SerializationError::Overflow)
	}

	#[inline]
	pub(crate) fn read_id(&mut self) -> Result<u32> {
		var_int::read_u32(&mut *self.stream)
	}

	#[inline]
	pub(crate) fn read_var_i32(&mut self) -> Result<i32> {
		var_int::read_i32(&mut *self.stream)
	}

	pub fn read_bool(&mut self) -> Result<bool> {
		let [byte] = self.read_bytes::<1>()?;
		Ok(byte != 0)
	}

	pub fn read_i8(&mut self) -> Result<i8> {
		Ok(i8::from_le_bytes(self.read_bytes::<1>()?))
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		let [byte] = self.read_bytes::<1>()?;
		Ok(byte)
	}

	impl_numeric_reads! {
		i16 => i32,
		u16 => u32,
		i32 => i32,
		u32 => u32,
		i64 => i64,
		u64 => u64
	}

	pub fn read_char(&mut self) -> Result<char> {
		let scalar = match self.mode {
			Optimization::Speed => u32::from_le_bytes(self.read_bytes::<4>()?),
			Optimization::Size => var_int::read_u32(&mut *self.stream)?,
		};
		char::from_u32(scalar).ok_or(SerializationError::Overflow)
	}

	pub fn read_f32(&mut self) -> Result<f32> {
		Ok(f32::from_le_bytes(self.read_bytes::<4>()?))
	}

	pub fn read_f64(&mut self) -> Result<f64> {
		Ok(f64::from_le_bytes(self.read_bytes::<8>()?))
	}

	pub fn read_decimal(&mut self) -> Result<Decimal> {
		Ok(Decimal::from_le_bytes(self.read_bytes::<16>()?))
	}

	pub fn read_date_time(&mut self) -> Result<DateTime> {
		let ticks = self.read_i64()?;
		let [kind] = self.read_bytes::<1>()?;
		let kind = DateTimeKind::from_repr(kind).ok_or(SerializationError::UnknownToken(kind))?;
		Ok(DateTime::new(ticks, kind))
	}

	pub fn read_date_time_offset(&mut self) -> Result<DateTimeOffset> {
		let ticks = self.read_i64()?;
		let offset_minutes = self.read_i16()?;
		Ok(DateTimeOffset::new(ticks, offset_minutes))
	}

	pub fn read_date(&mut self) -> Result<Date> {
		Ok(Date::new(self.read_i32()?))
	}

	pub fn read_time(&mut self) -> Result<Time> {
		Ok(Time::new(self.read_i64()?))
	}

	pub fn read_guid(&mut self) -> Result<Uuid> {
		Ok(Uuid::from_bytes(self.read_bytes::<16>()?))
	}

	pub(crate) fn read_str_payload(&mut self) -> Result<Arc<str>> {
		let length = self.read_len()?;
		let mut bytes = vec![0u8; length];
		self.stream.read_exact(&mut bytes)?;
		match String::from_utf8(bytes) {
			Ok(string) => Ok(Arc::from(string)),
			Err(_) => Err(SerializationError::InvalidArchiveState("string payload is not valid utf-8")),
		}
	}

	pub(crate) fn read_exact(&mut self, buffer: &mut [u8]) -> Result<()> {
		self.stream.read_exact(buffer)?;
		Ok(())
	}

	pub(crate) fn read_raw(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
		self.stream.read(buffer)
	}

	pub(crate) fn skip(&mut self, count: u64) -> Result<()> {
		skip_bytes(&mut *self.stream, count)
	}
}

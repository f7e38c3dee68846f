use std::fmt::{Display, Formatter};

/// A 128-bit decimal split into four little-endian 32-bit lanes, matching the
/// wire layout: three magnitude lanes plus a flags lane carrying the sign bit
/// and the decimal scale.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Decimal {
	lo: u32,
	mid: u32,
	hi: u32,
	flags: u32,
}

const DECIMAL_SIGN: u32 = 0x8000_0000;
const DECIMAL_SCALE_SHIFT: u32 = 16;
const DECIMAL_SCALE_MASK: u32 = 0x00FF_0000;
const DECIMAL_MAX_SCALE: u8 = 28;

impl Decimal {
	pub const ZERO: Decimal = Decimal { lo: 0, mid: 0, hi: 0, flags: 0 };

	pub fn from_parts(lo: u32, mid: u32, hi: u32, negative: bool, scale: u8) -> Decimal {
		let scale = scale.min(DECIMAL_MAX_SCALE) as u32;
		let mut flags = scale << DECIMAL_SCALE_SHIFT;
		if negative {
			flags |= DECIMAL_SIGN;
		}
		Decimal { lo, mid, hi, flags }
	}

	#[inline]
	pub fn lo(&self) -> u32 {
		self.lo
	}
	#[inline]
	pub fn mid(&self) -> u32 {
		self.mid
	}
	#[inline]
	pub fn hi(&self) -> u32 {
		self.hi
	}
	#[inline]
	pub fn is_negative(&self) -> bool {
		self.flags & DECIMAL_SIGN != 0
	}
	#[inline]
	pub fn scale(&self) -> u8 {
		((self.flags & DECIMAL_SCALE_MASK) >> DECIMAL_SCALE_SHIFT) as u8
	}

	pub fn to_le_bytes(self) -> [u8; 16] {
		let mut bytes = [0u8; 16];
		bytes[0..4].copy_from_slice(&self.lo.to_le_bytes());
		bytes[4..8].copy_from_slice(&self.mid.to_le_bytes());
		bytes[8..12].copy_from_slice(&self.hi.to_le_bytes());
		bytes[12..16].copy_from_slice(&self.flags.to_le_bytes());
		bytes
	}

	pub fn from_le_bytes(bytes: [u8; 16]) -> Decimal {
		Decimal {
			lo: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
			mid: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
			hi: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
			flags: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
		}
	}
}

impl From<i64> for Decimal {
	fn from(value: i64) -> Self {
		let magnitude = value.unsigned_abs();
		Decimal::from_parts(magnitude as u32, (magnitude >> 32) as u32, 0, value < 0, 0)
	}
}

impl From<u64> for Decimal {
	fn from(value: u64) -> Self {
		Decimal::from_parts(value as u32, (value >> 32) as u32, 0, false, 0)
	}
}

impl Display for Decimal {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let magnitude = (self.hi as u128) << 64 | (self.mid as u128) << 32 | self.lo as u128;
		let sign = match self.is_negative() {
			true => "-",
			false => "",
		};
		match self.scale() {
			0 => write!(f, "{sign}{magnitude}"),
			scale => {
				let divisor = 10u128.pow(scale as u32);
				write!(f, "{sign}{}.{:0width$}", magnitude / divisor, magnitude % divisor, width = scale as usize)
			},
		}
	}
}

#[repr(u8)]
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum DateTimeKind {
	#[default]
	Unspecified = 0x00,
	Utc = 0x01,
	Local = 0x02,
}

impl DateTimeKind {
	pub(crate) fn from_repr(discriminant: u8) -> Option<DateTimeKind> {
		match discriminant {
			0x00 => Some(DateTimeKind::Unspecified),
			0x01 => Some(DateTimeKind::Utc),
			0x02 => Some(DateTimeKind::Local),
			_ => None,
		}
	}
}

/// A point in time as 100-nanosecond ticks since 0001-01-01T00:00:00, plus the
/// kind marker distinguishing UTC, local and unspecified times.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DateTime {
	ticks: i64,
	kind: DateTimeKind,
}

impl DateTime {
	pub fn new(ticks: i64, kind: DateTimeKind) -> DateTime {
		DateTime { ticks, kind }
	}

	#[inline]
	pub fn ticks(&self) -> i64 {
		self.ticks
	}
	#[inline]
	pub fn kind(&self) -> DateTimeKind {
		self.kind
	}
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DateTimeOffset {
	ticks: i64,
	offset_minutes: i16,
}

impl DateTimeOffset {
	pub fn new(ticks: i64, offset_minutes: i16) -> DateTimeOffset {
		DateTimeOffset { ticks, offset_minutes }
	}

	#[inline]
	pub fn ticks(&self) -> i64 {
		self.ticks
	}
	#[inline]
	pub fn offset_minutes(&self) -> i16 {
		self.offset_minutes
	}
}

/// A calendar date as the number of days since 0001-01-01.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Date {
	day_number: i32,
}

impl Date {
	pub fn new(day_number: i32) -> Date {
		Date { day_number }
	}

	#[inline]
	pub fn day_number(&self) -> i32 {
		self.day_number
	}
}

/// A time of day as 100-nanosecond ticks since midnight.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Time {
	ticks: i64,
}

impl Time {
	pub fn new(ticks: i64) -> Time {
		Time { ticks }
	}

	#[inline]
	pub fn ticks(&self) -> i64 {
		self.ticks
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decimal_lane_round_trip() {
		let value = Decimal::from_parts(0xDEAD_BEEF, 0x0123_4567, 0x89AB_CDEF, true, 4);
		let bytes = value.to_le_bytes();
		assert_eq!(Decimal::from_le_bytes(bytes), value);
		assert_eq!(value.scale(), 4);
		assert!(value.is_negative());
	}

	#[test]
	fn decimal_display() {
		assert_eq!(Decimal::from(12345i64).to_string(), "12345");
		assert_eq!(Decimal::from_parts(12345, 0, 0, true, 2).to_string(), "-123.45");
	}

	#[test]
	fn datetime_kind_from_repr() {
		assert_eq!(DateTimeKind::from_repr(1), Some(DateTimeKind::Utc));
		assert_eq!(DateTimeKind::from_repr(3), None);
	}
}

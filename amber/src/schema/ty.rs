use std::fmt::{Display, Formatter};
use std::sync::Arc;

use nohash_hasher::IsEnabled;

use crate::errors::{Result, SerializationError};
use crate::schema::assembly::AssemblyName;

/// Handle into the registry's type table. Handles are process-local; the
/// persisted form of a type is always its [`TypeName`] descriptor.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(pub(crate) u32);

impl TypeHandle {
	#[inline]
	pub(crate) fn index(self) -> usize {
		self.0 as usize
	}
}

impl IsEnabled for TypeHandle {}

/// The built-in leaf types. Their payloads are written with dedicated tokens
/// and never participate in object identity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Primitive {
	Bool,
	Char,
	Int8,
	UInt8,
	Int16,
	UInt16,
	Int32,
	UInt32,
	Int64,
	UInt64,
	Float32,
	Float64,
	Decimal,
	DateTime,
	DateTimeOffset,
	Date,
	Time,
	Guid,
}

impl Primitive {
	pub(crate) const ALL: [Primitive; 18] = [
		Primitive::Bool,
		Primitive::Char,
		Primitive::Int8,
		Primitive::UInt8,
		Primitive::Int16,
		Primitive::UInt16,
		Primitive::Int32,
		Primitive::UInt32,
		Primitive::Int64,
		Primitive::UInt64,
		Primitive::Float32,
		Primitive::Float64,
		Primitive::Decimal,
		Primitive::DateTime,
		Primitive::DateTimeOffset,
		Primitive::Date,
		Primitive::Time,
		Primitive::Guid,
	];

	pub(crate) fn name(self) -> &'static str {
		match self {
			Primitive::Bool => "bool",
			Primitive::Char => "char",
			Primitive::Int8 => "i8",
			Primitive::UInt8 => "u8",
			Primitive::Int16 => "i16",
			Primitive::UInt16 => "u16",
			Primitive::Int32 => "i32",
			Primitive::UInt32 => "u32",
			Primitive::Int64 => "i64",
			Primitive::UInt64 => "u64",
			Primitive::Float32 => "f32",
			Primitive::Float64 => "f64",
			Primitive::Decimal => "decimal",
			Primitive::DateTime => "datetime",
			Primitive::DateTimeOffset => "datetimeoffset",
			Primitive::Date => "date",
			Primitive::Time => "time",
			Primitive::Guid => "guid",
		}
	}

	#[inline]
	pub(crate) fn index(self) -> usize {
		self as usize
	}
}

impl Display for Primitive {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// The structural descriptor of a type as it is persisted: a fully qualified
/// name with its owning assembly, an unbound generic definition, a constructed
/// generic, or an array marked with its element type and rank.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum TypeName {
	Named {
		assembly: AssemblyName,
		name: Arc<str>,
	},
	GenericDefinition {
		assembly: AssemblyName,
		name: Arc<str>,
		arity: u32,
	},
	GenericInstance {
		definition: Box<TypeName>,
		args: Box<[TypeName]>,
	},
	Array {
		element: Box<TypeName>,
		rank: u32,
	},
}

impl TypeName {
	/// Parses the `` `N `` arity suffix of a generic definition name.
	pub(crate) fn parse_arity(name: &str) -> Result<u32> {
		let Some(tick) = name.rfind('`') else {
			return Err(SerializationError::MalformedTypeName(name.to_string()));
		};
		let digits = &name[tick + 1..];
		if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
			return Err(SerializationError::MalformedTypeName(name.to_string()));
		}
		digits
			.parse()
			.map_err(|_| SerializationError::MalformedTypeName(name.to_string()))
	}
}

impl Display for TypeName {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			TypeName::Named { name, .. } => f.write_str(name),
			TypeName::GenericDefinition { name, .. } => f.write_str(name),
			TypeName::GenericInstance { definition, args } => {
				write!(f, "{definition}[")?;
				for (i, arg) in args.iter().enumerate() {
					match i {
						0 => write!(f, "{arg}")?,
						_ => write!(f, ", {arg}")?,
					}
				}
				f.write_str("]")
			},
			TypeName::Array { element, rank } => {
				write!(f, "{element}[")?;
				for _ in 1..*rank {
					f.write_str(",")?;
				}
				f.write_str("]")
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn arity_parsing() {
		assert_eq!(TypeName::parse_arity("Map`2").unwrap(), 2);
		assert_eq!(TypeName::parse_arity("a.b.List`1").unwrap(), 1);
		assert!(matches!(TypeName::parse_arity("Plain"), Err(SerializationError::MalformedTypeName(_))));
		assert!(matches!(TypeName::parse_arity("Bad`"), Err(SerializationError::MalformedTypeName(_))));
		assert!(matches!(TypeName::parse_arity("Bad`x1"), Err(SerializationError::MalformedTypeName(_))));
	}
}

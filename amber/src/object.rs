use std::any::Any;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use std::sync::Arc;

use derivative::Derivative;
use uuid::Uuid;

use crate::schema::ty::{Primitive, TypeHandle};
use crate::values::{Date, DateTime, DateTimeOffset, Decimal, Time};

/// Implemented by every custom-serialized instance that can appear in a graph.
///
/// Types whose registration fully determines their runtime type leave
/// [`runtime_type`] at the default; dynamically constructed generics (one Rust
/// type standing for many persisted constructed types) report their handle
/// explicitly.
///
/// [`runtime_type`]: GraphObject::runtime_type
pub trait GraphObject: Any {
	fn type_name(&self) -> &'static str;
	fn as_any(&self) -> &dyn Any;

	fn runtime_type(&self) -> Option<TypeHandle> {
		None
	}
}

/// Implements [`GraphObject`] for plain types that are identified by their
/// registration alone.
#[macro_export]
macro_rules! impl_graph_object {
	($($ty: ty),*) => {$(
		impl $crate::object::GraphObject for $ty {
			fn type_name(&self) -> &'static str {
				std::any::type_name::<$ty>()
			}

			fn as_any(&self) -> &dyn std::any::Any {
				self
			}
		}
	)*};
}

/// An enum value: the enum's runtime type plus its underlying integer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct EnumValue {
	pub ty: TypeHandle,
	pub value: i64,
}

impl EnumValue {
	pub fn new(ty: TypeHandle, value: i64) -> EnumValue {
		EnumValue { ty, value }
	}
}

/// A dynamically typed graph value.
///
/// Reference semantics: strings compare (and deduplicate in the stream) by
/// content, arrays and objects by pointer identity.
#[derive(Clone)]
pub enum Value {
	Null,
	Bool(bool),
	Char(char),
	Int8(i8),
	UInt8(u8),
	Int16(i16),
	UInt16(u16),
	Int32(i32),
	UInt32(u32),
	Int64(i64),
	UInt64(u64),
	Float32(f32),
	Float64(f64),
	Decimal(Decimal),
	Str(Arc<str>),
	DateTime(DateTime),
	DateTimeOffset(DateTimeOffset),
	Date(Date),
	Time(Time),
	Guid(Uuid),
	Type(TypeHandle),
	Enum(EnumValue),
	Array(Rc<Array>),
	Object(Rc<dyn GraphObject>),
}

impl Value {
	pub fn object<T: GraphObject>(value: T) -> Value {
		Value::Object(Rc::new(value))
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	pub fn as_object<T: GraphObject>(&self) -> Option<&T> {
		match self {
			Value::Object(obj) => obj.as_any().downcast_ref(),
			_ => None,
		}
	}

	pub(crate) fn primitive(&self) -> Option<Primitive> {
		match self {
			Value::Bool(_) => Some(Primitive::Bool),
			Value::Char(_) => Some(Primitive::Char),
			Value::Int8(_) => Some(Primitive::Int8),
			Value::UInt8(_) => Some(Primitive::UInt8),
			Value::Int16(_) => Some(Primitive::Int16),
			Value::UInt16(_) => Some(Primitive::UInt16),
			Value::Int32(_) => Some(Primitive::Int32),
			Value::UInt32(_) => Some(Primitive::UInt32),
			Value::Int64(_) => Some(Primitive::Int64),
			Value::UInt64(_) => Some(Primitive::UInt64),
			Value::Float32(_) => Some(Primitive::Float32),
			Value::Float64(_) => Some(Primitive::Float64),
			Value::Decimal(_) => Some(Primitive::Decimal),
			Value::DateTime(_) => Some(Primitive::DateTime),
			Value::DateTimeOffset(_) => Some(Primitive::DateTimeOffset),
			Value::Date(_) => Some(Primitive::Date),
			Value::Time(_) => Some(Primitive::Time),
			Value::Guid(_) => Some(Primitive::Guid),
			_ => None,
		}
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Null => f.write_str("Null"),
			Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
			Value::Char(v) => f.debug_tuple("Char").field(v).finish(),
			Value::Int8(v) => f.debug_tuple("Int8").field(v).finish(),
			Value::UInt8(v) => f.debug_tuple("UInt8").field(v).finish(),
			Value::Int16(v) => f.debug_tuple("Int16").field(v).finish(),
			Value::UInt16(v) => f.debug_tuple("UInt16").field(v).finish(),
			Value::Int32(v) => f.debug_tuple("Int32").field(v).finish(),
			Value::UInt32(v) => f.debug_tuple("UInt32").field(v).finish(),
			Value::Int64(v) => f.debug_tuple("Int64").field(v).finish(),
			Value::UInt64(v) => f.debug_tuple("UInt64").field(v).finish(),
			Value::Float32(v) => f.debug_tuple("Float32").field(v).finish(),
			Value::Float64(v) => f.debug_tuple("Float64").field(v).finish(),
			Value::Decimal(v) => f.debug_tuple("Decimal").field(v).finish(),
			Value::Str(v) => f.debug_tuple("Str").field(v).finish(),
			Value::DateTime(v) => f.debug_tuple("DateTime").field(v).finish(),
			Value::DateTimeOffset(v) => f.debug_tuple("DateTimeOffset").field(v).finish(),
			Value::Date(v) => f.debug_tuple("Date").field(v).finish(),
			Value::Time(v) => f.debug_tuple("Time").field(v).finish(),
			Value::Guid(v) => f.debug_tuple("Guid").field(v).finish(),
			Value::Type(v) => f.debug_tuple("Type").field(v).finish(),
			Value::Enum(v) => f.debug_tuple("Enum").field(v).finish(),
			Value::Array(v) => f.debug_tuple("Array").field(v).finish(),
			Value::Object(v) => f.debug_tuple("Object").field(&v.type_name()).finish(),
		}
	}
}

impl PartialEq<Self> for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Char(a), Value::Char(b)) => a == b,
			(Value::Int8(a), Value::Int8(b)) => a == b,
			(Value::UInt8(a), Value::UInt8(b)) => a == b,
			(Value::Int16(a), Value::Int16(b)) => a == b,
			(Value::UInt16(a), Value::UInt16(b)) => a == b,
			(Value::Int32(a), Value::Int32(b)) => a == b,
			(Value::UInt32(a), Value::UInt32(b)) => a == b,
			(Value::Int64(a), Value::Int64(b)) => a == b,
			(Value::UInt64(a), Value::UInt64(b)) => a == b,
			(Value::Float32(a), Value::Float32(b)) => a == b,
			(Value::Float64(a), Value::Float64(b)) => a == b,
			(Value::Decimal(a), Value::Decimal(b)) => a == b,
			(Value::Str(a), Value::Str(b)) => a == b,
			(Value::DateTime(a), Value::DateTime(b)) => a == b,
			(Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => a == b,
			(Value::Date(a), Value::Date(b)) => a == b,
			(Value::Time(a), Value::Time(b)) => a == b,
			(Value::Guid(a), Value::Guid(b)) => a == b,
			(Value::Type(a), Value::Type(b)) => a == b,
			(Value::Enum(a), Value::Enum(b)) => a == b,
			(Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
			(Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}
}

macro_rules! impl_value_from {
	($($ty: ty => $variant: ident),*) => {$(
		impl From<$ty> for Value {
			#[inline]
			fn from(value: $ty) -> Self {
				Value::$variant(value)
			}
		}
	)*};
}

impl_value_from! {
	bool => Bool,
	char => Char,
	i8 => Int8,
	u8 => UInt8,
	i16 => Int16,
	u16 => UInt16,
	i32 => Int32,
	u32 => UInt32,
	i64 => Int64,
	u64 => UInt64,
	f32 => Float32,
	f64 => Float64,
	Decimal => Decimal,
	DateTime => DateTime,
	DateTimeOffset => DateTimeOffset,
	Date => Date,
	Time => Time,
	Uuid => Guid,
	EnumValue => Enum
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Str(Arc::from(value))
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Str(Arc::from(value))
	}
}

impl From<Rc<Array>> for Value {
	fn from(value: Rc<Array>) -> Self {
		Value::Array(value)
	}
}

/// A one- or multi-dimensional array with reference semantics. Elements sit
/// behind a `RefCell` so a graph may point back into an array that is still
/// being populated, which is what makes self-referencing arrays expressible.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Array {
	element_type: TypeHandle,
	lower_bounds: Box<[i32]>,
	lengths: Box<[usize]>,
	#[derivative(Debug = "ignore")]
	elements: RefCell<Vec<Value>>,
}

impl Array {
	/// A one-dimensional, zero-based array filled with nulls.
	pub fn vector(element_type: TypeHandle, length: usize) -> Rc<Array> {
		Rc::new(Array {
			element_type,
			lower_bounds: Box::new([0]),
			lengths: Box::new([length]),
			elements: RefCell::new(vec![Value::Null; length]),
		})
	}

	pub fn from_values(element_type: TypeHandle, values: Vec<Value>) -> Rc<Array> {
		Rc::new(Array {
			element_type,
			lower_bounds: Box::new([0]),
			lengths: Box::new([values.len()]),
			elements: RefCell::new(values),
		})
	}

	/// A multi-dimensional array with per-dimension lower bounds, filled with
	/// nulls. One-dimensional arrays are always zero-based.
	pub fn multi_dim(element_type: TypeHandle, lower_bounds: &[i32], lengths: &[usize]) -> Rc<Array> {
		assert!(!lengths.is_empty());
		assert_eq!(lower_bounds.len(), lengths.len());
		let total: usize = lengths.iter().product();
		let lower_bounds = match lengths.len() {
			1 => Box::new([0i32]) as Box<[i32]>,
			_ => Box::from(lower_bounds),
		};
		Rc::new(Array {
			element_type,
			lower_bounds,
			lengths: Box::from(lengths),
			elements: RefCell::new(vec![Value::Null; total]),
		})
	}

	#[inline]
	pub fn element_type(&self) -> TypeHandle {
		self.element_type
	}

	#[inline]
	pub fn rank(&self) -> usize {
		self.lengths.len()
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.elements.borrow().len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	#[inline]
	pub fn lengths(&self) -> &[usize] {
		&self.lengths
	}

	#[inline]
	pub fn lower_bounds(&self) -> &[i32] {
		&self.lower_bounds
	}

	pub fn get(&self, index: usize) -> Value {
		self.elements.borrow()[index].clone()
	}

	pub fn set(&self, index: usize, value: Value) {
		self.elements.borrow_mut()[index] = value;
	}

	pub fn get_at(&self, indices: &[i32]) -> Option<Value> {
		let index = self.flatten_index(indices)?;
		Some(self.get(index))
	}

	pub fn set_at(&self, indices: &[i32], value: Value) -> bool {
		match self.flatten_index(indices) {
			Some(index) => {
				self.set(index, value);
				true
			},
			None => false,
		}
	}

	/// Row-major flattening of multi-dimensional indices, honoring the
	/// per-dimension lower bounds.
	fn flatten_index(&self, indices: &[i32]) -> Option<usize> {
		if indices.len() != self.rank() {
			return None;
		}
		let mut flat = 0usize;
		for (dim, &index) in indices.iter().enumerate() {
			let offset = index.checked_sub(self.lower_bounds[dim])?;
			if offset < 0 || offset as usize >= self.lengths[dim] {
				return None;
			}
			flat = flat * self.lengths[dim] + offset as usize;
		}
		Some(flat)
	}

	pub(crate) fn snapshot(&self) -> Vec<Value> {
		self.elements.borrow().clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn multi_dim_addressing() {
		let array = Array::multi_dim(TypeHandle(0), &[1, -2], &[2, 3]);
		assert_eq!(array.len(), 6);
		assert!(array.set_at(&[1, -2], Value::Int32(11)));
		assert!(array.set_at(&[2, 0], Value::Int32(42)));
		assert_eq!(array.get_at(&[1, -2]).unwrap(), Value::Int32(11));
		assert_eq!(array.get_at(&[2, 0]).unwrap(), Value::Int32(42));
		assert!(array.get_at(&[3, 0]).is_none());
		assert!(array.get_at(&[2]).is_none());
	}

	#[test]
	fn self_reference() {
		let array = Array::vector(TypeHandle(0), 1);
		array.set(0, Value::Array(array.clone()));
		assert_eq!(array.get(0), Value::Array(array.clone()));
	}
}

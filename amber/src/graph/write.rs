use std::any::Any;
use std::rc::Rc;
use std::sync::Arc;

use crate::errors::{Result, SerializationError};
use crate::graph::archive::WriteArchive;
use crate::graph::ScratchState;
use crate::object::{Array, GraphObject, Value};
use crate::registry::{EntryKind, Registry};
use crate::schema::codec;
use crate::schema::ty::{Primitive, TypeHandle};
use crate::tokens::Token;
use crate::writer::TokenWriter;

/// One serialize pass: the token writer plus the per-pass identity and
/// deduplication tables. Dropped when the top-level call returns; no identity
/// survives across passes.
pub(crate) struct WritePass<'l> {
	pub(crate) writer: TokenWriter<'l>,
	pub(crate) registry: &'l Registry,
	state: &'l mut ScratchState,
	next_object_id: u32,
	pub(crate) contexts: Vec<Option<Rc<dyn Any>>>,
}

impl<'l> WritePass<'l> {
	pub fn new(
		writer: TokenWriter<'l>,
		registry: &'l Registry,
		state: &'l mut ScratchState,
		context: Option<Rc<dyn Any>>,
	) -> Self {
		Self {
			writer,
			registry,
			state,
			next_object_id: 0,
			contexts: vec![context],
		}
	}

	pub(crate) fn current_context(&self) -> Option<Rc<dyn Any>> {
		self.contexts.last().and_then(|context| context.clone())
	}

	fn alloc_object_id(&mut self) -> u32 {
		let id = self.next_object_id;
		self.next_object_id += 1;
		id
	}

	pub fn write_value(&mut self, value: &Value) -> Result<()> {
		match value {
			Value::Null => self.writer.write_token(Token::Null),
			Value::Str(string) => self.write_string(string),
			Value::Type(handle) => codec::write_type(&mut self.writer, self.registry, &mut self.state.emit, *handle),
			Value::Enum(value) => {
				self.writer.write_token(Token::EnumValue)?;
				codec::write_type(&mut self.writer, self.registry, &mut self.state.emit, value.ty)?;
				self.writer.write_i64(value.value)
			},
			Value::Array(array) => self.write_array(array),
			Value::Object(object) => self.write_object(object),
			_ => match value.primitive() {
				Some(primitive) => {
					self.writer.write_token(Token::of_primitive(primitive))?;
					write_primitive_payload(&mut self.writer, value)
				},
				None => unreachable!(),
			},
		}
	}

	pub(crate) fn write_string(&mut self, string: &Arc<str>) -> Result<()> {
		if let Some(&id) = self.state.strings.get(string) {
			self.writer.write_token(Token::ObjectRef)?;
			return self.writer.write_id(id);
		}

		let id = self.alloc_object_id();
		self.state.strings.insert(string.clone(), id);
		self.writer.write_token(Token::String)?;
		self.writer.write_str_payload(string)
	}

	fn write_array(&mut self, array: &Rc<Array>) -> Result<()> {
		let key = Rc::as_ptr(array) as usize;
		if let Some(&id) = self.state.objects.get(&key) {
			self.writer.write_token(Token::ObjectRef)?;
			return self.writer.write_id(id);
		}

		// The id enters the identity table before the elements are walked, so
		// an element referencing the array itself resolves to a back-reference
		// instead of recursing.
		let id = self.alloc_object_id();
		self.state.objects.insert(key, id);

		self.writer.write_token(Token::Array)?;
		codec::write_type(&mut self.writer, self.registry, &mut self.state.emit, array.element_type())?;
		let rank = array.rank() as u32;
		self.writer.write_id(rank)?;
		match rank {
			1 => self.writer.write_len(array.len())?,
			_ => {
				for dim in 0..array.rank() {
					self.writer.write_var_i32(array.lower_bounds()[dim])?;
					self.writer.write_len(array.lengths()[dim])?;
				}
			},
		}

		let elements = array.snapshot();
		match self.packed_element(array) {
			Some(primitive) => {
				for element in &elements {
					if element.primitive() != Some(primitive) {
						return Err(SerializationError::InvalidArchiveState("array element does not match the element type"));
					}
					write_primitive_payload(&mut self.writer, element)?;
				}
			},
			None => {
				for element in &elements {
					self.write_value(element)?;
				}
			},
		}
		Ok(())
	}

	fn write_object(&mut self, object: &Rc<dyn GraphObject>) -> Result<()> {
		let key = Rc::as_ptr(object) as *const () as usize;
		if let Some(&id) = self.state.objects.get(&key) {
			return match self.state.cycle.contains(&id) {
				true => Err(SerializationError::CyclicDependency(object.type_name().to_string())),
				false => {
					self.writer.write_token(Token::ObjectRef)?;
					self.writer.write_id(id)
				},
			};
		}

		let handle = self.registry.runtime_type_of(object)?;
		let (serializer, version) = self.registry.serializer_for(handle)?;

		let id = self.alloc_object_id();
		self.state.objects.insert(key, id);
		self.state.cycle.insert(id);

		self.writer.write_token(Token::ArchiveStart)?;
		codec::write_type(&mut self.writer, self.registry, &mut self.state.emit, handle)?;
		self.writer.write_id(version)?;

		{
			let mut archive = WriteArchive::new(self, handle, version);
			serializer.serialize(object, &mut archive)?;
		}

		self.writer.write_token(Token::ArchiveEnd)?;
		self.state.cycle.remove(&id);
		Ok(())
	}

	/// One-dimensional arrays over a primitive leaf pack their element
	/// payloads without per-element tokens.
	fn packed_element(&self, array: &Array) -> Option<Primitive> {
		if array.rank() != 1 {
			return None;
		}
		self.primitive_element(array.element_type())
	}

	fn primitive_element(&self, handle: TypeHandle) -> Option<Primitive> {
		match self.registry.entry(handle).kind {
			EntryKind::Primitive(primitive) => Some(primitive),
			_ => None,
		}
	}
}

pub(crate) fn write_primitive_payload(writer: &mut TokenWriter, value: &Value) -> Result<()> {
	match value {
		Value::Bool(v) => writer.write_bool(*v),
		Value::Char(v) => writer.write_char(*v),
		Value::Int8(v) => writer.write_i8(*v),
		Value::UInt8(v) => writer.write_u8(*v),
		Value::Int16(v) => writer.write_i16(*v),
		Value::UInt16(v) => writer.write_u16(*v),
		Value::Int32(v) => writer.write_i32(*v),
		Value::UInt32(v) => writer.write_u32(*v),
		Value::Int64(v) => writer.write_i64(*v),
		Value::UInt64(v) => writer.write_u64(*v),
		Value::Float32(v) => writer.write_f32(*v),
		Value::Float64(v) => writer.write_f64(*v),
		Value::Decimal(v) => writer.write_decimal(*v),
		Value::DateTime(v) => writer.write_date_time(*v),
		Value::DateTimeOffset(v) => writer.write_date_time_offset(*v),
		Value::Date(v) => writer.write_date(*v),
		Value::Time(v) => writer.write_time(*v),
		Value::Guid(v) => writer.write_guid(*v),
		_ => Err(SerializationError::InvalidArchiveState("value is not a primitive")),
	}
}

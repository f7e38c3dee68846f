use std::any::Any;
use std::rc::Rc;

use crate::errors::{Result, SerializationError};
use crate::graph::archive::ReadArchive;
use crate::graph::ScratchState;
use crate::object::{Array, EnumValue, Value};
use crate::reader::TokenReader;
use crate::registry::{EntryKind, Registry};
use crate::schema::codec;
use crate::schema::ty::{Primitive, TypeHandle};
use crate::tokens::Token;

/// One deserialize pass, the mirror of [`WritePass`]: reconstructed values
/// enter the identity table at the id implied by first-seen order.
///
/// [`WritePass`]: crate::graph::write::WritePass
pub(crate) struct ReadPass<'l> {
	pub(crate) reader: TokenReader<'l>,
	pub(crate) registry: &'l Registry,
	tolerant: bool,
	state: &'l mut ScratchState,
	objects: Vec<Option<Value>>,
	pub(crate) context: Option<Rc<dyn Any>>,
	pub(crate) pending_buffer: u64,
}

impl<'l> ReadPass<'l> {
	pub fn new(
		reader: TokenReader<'l>,
		registry: &'l Registry,
		tolerant: bool,
		state: &'l mut ScratchState,
		context: Option<Rc<dyn Any>>,
	) -> Self {
		Self {
			reader,
			registry,
			tolerant,
			state,
			objects: Vec::new(),
			context,
			pending_buffer: 0,
		}
	}

	/// Skips whatever an abandoned buffer view left unread.
	pub(crate) fn drain_pending(&mut self) -> Result<()> {
		if self.pending_buffer > 0 {
			let pending = std::mem::take(&mut self.pending_buffer);
			self.reader.skip(pending)?;
		}
		Ok(())
	}

	pub fn read_value(&mut self) -> Result<Value> {
		self.drain_pending()?;
		let token = self.reader.read_token()?;
		self.read_value_with(token)
	}

	fn reserve_slot(&mut self) -> usize {
		self.objects.push(None);
		self.objects.len() - 1
	}

	pub(crate) fn read_value_with(&mut self, token: Token) -> Result<Value> {
		if let Some(primitive) = token.primitive() {
			return read_primitive_payload(&mut self.reader, primitive);
		}

		match token {
			Token::Null => Ok(Value::Null),
			Token::String => {
				let slot = self.reserve_slot();
				let value = Value::Str(self.reader.read_str_payload()?);
				self.objects[slot] = Some(value.clone());
				Ok(value)
			},
			Token::ObjectRef => {
				let id = self.reader.read_id()? as usize;
				match self.objects.get(id) {
					Some(Some(value)) => Ok(value.clone()),
					_ => Err(SerializationError::InvalidArchiveState("dangling object reference")),
				}
			},
			Token::TypeRef | Token::TypeInline => {
				let handle =
					codec::read_type_with(token, &mut self.reader, self.registry, self.tolerant, &mut self.state.read_types)?;
				Ok(Value::Type(handle))
			},
			Token::EnumValue => {
				let ty = codec::read_type(&mut self.reader, self.registry, self.tolerant, &mut self.state.read_types)?;
				let value = self.reader.read_i64()?;
				Ok(Value::Enum(EnumValue::new(ty, value)))
			},
			Token::Array => self.read_array(),
			Token::ArchiveStart => self.read_archive_object(),
			_ => Err(SerializationError::InvalidArchiveState("unexpected token")),
		}
	}

	fn read_array(&mut self) -> Result<Value> {
		let slot = self.reserve_slot();

		let element = codec::read_type(&mut self.reader, self.registry, self.tolerant, &mut self.state.read_types)?;
		let rank = self.reader.read_id()?;
		if rank == 0 {
			return Err(SerializationError::InvalidArchiveState("array rank must be at least one"));
		}

		let (lower_bounds, lengths) = match rank {
			1 => (vec![0i32], vec![self.reader.read_len()?]),
			_ => {
				let mut lower_bounds = Vec::with_capacity(rank as usize);
				let mut lengths = Vec::with_capacity(rank as usize);
				for _ in 0..rank {
					lower_bounds.push(self.reader.read_var_i32()?);
					lengths.push(self.reader.read_len()?);
				}
				(lower_bounds, lengths)
			},
		};
		let total = lengths
			.iter()
			.try_fold(1usize, |acc, &length| acc.checked_mul(length))
			.ok_or(SerializationError::Overflow)?;

		// The array enters the identity table before its elements are read so
		// cyclic element references resolve onto the array being built.
		let array = Array::multi_dim(element, &lower_bounds, &lengths);
		let value = Value::Array(array.clone());
		self.objects[slot] = Some(value.clone());

		match (rank, self.primitive_element(element)) {
			(1, Some(primitive)) => {
				for index in 0..total {
					array.set(index, read_primitive_payload(&mut self.reader, primitive)?);
				}
			},
			_ => {
				for index in 0..total {
					let element = self.read_value()?;
					array.set(index, element);
				}
			},
		}
		Ok(value)
	}

	fn read_archive_object(&mut self) -> Result<Value> {
		let slot = self.reserve_slot();

		let handle = codec::read_type(&mut self.reader, self.registry, self.tolerant, &mut self.state.read_types)?;
		let version = self.reader.read_id()?;
		let (serializer, max_version) = self.registry.serializer_for(handle)?;
		if version > max_version {
			return Err(SerializationError::VersionNotSupported {
				type_name: self.registry.display_of(handle),
				version,
				max_version,
			});
		}

		let object = {
			let mut archive = ReadArchive::new(self, handle, version);
			serializer.deserialize(&mut archive)?
		};

		self.drain_pending()?;
		match self.reader.read_token()? {
			Token::ArchiveEnd => {},
			_ => return Err(SerializationError::InvalidArchiveState("custom serializer did not drain its archive")),
		}

		// Custom-serialized objects only become referenceable after their
		// constructor returns, which is why cycles through them are rejected
		// on the write side.
		let value = Value::Object(object);
		self.objects[slot] = Some(value.clone());
		Ok(value)
	}

	fn primitive_element(&self, handle: TypeHandle) -> Option<Primitive> {
		match self.registry.entry(handle).kind {
			EntryKind::Primitive(primitive) => Some(primitive),
			_ => None,
		}
	}
}

pub(crate) fn read_primitive_payload(reader: &mut TokenReader, primitive: Primitive) -> Result<Value> {
	match primitive {
		Primitive::Bool => Ok(Value::Bool(reader.read_bool()?)),
		Primitive::Char => Ok(Value::Char(reader.read_char()?)),
		Primitive::Int8 => Ok(Value::Int8(reader.read_i8()?)),
		Primitive::UInt8 => Ok(Value::UInt8(reader.read_u8()?)),
		Primitive::Int16 => Ok(Value::Int16(reader.read_i16()?)),
		Primitive::UInt16 => Ok(Value::UInt16(reader.read_u16()?)),
		Primitive::Int32 => Ok(Value::Int32(reader.read_i32()?)),
		Primitive::UInt32 => Ok(Value::UInt32(reader.read_u32()?)),
		Primitive::Int64 => Ok(Value::Int64(reader.read_i64()?)),
		Primitive::UInt64 => Ok(Value::UInt64(reader.read_u64()?)),
		Primitive::Float32 => Ok(Value::Float32(reader.read_f32()?)),
		Primitive::Float64 => Ok(Value::Float64(reader.read_f64()?)),
		Primitive::Decimal => Ok(Value::Decimal(reader.read_decimal()?)),
		Primitive::DateTime => Ok(Value::DateTime(reader.read_date_time()?)),
		Primitive::DateTimeOffset => Ok(Value::DateTimeOffset(reader.read_date_time_offset()?)),
		Primitive::Date => Ok(Value::Date(reader.read_date()?)),
		Primitive::Time => Ok(Value::Time(reader.read_time()?)),
		Primitive::Guid => Ok(Value::Guid(reader.read_guid()?)),
	}
}

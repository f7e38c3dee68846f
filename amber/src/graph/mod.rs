use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::Arc;

use fxhash::FxHashMap;
use nohash_hasher::BuildNoHashHasher;

use crate::errors::{Result, SerializationError};
use crate::object::Value;
use crate::reader::TokenReader;
use crate::registry::Registry;
use crate::schema::codec::{TypeEmitTable, TypeReadTable};
use crate::tokens::{Optimization, STREAM_MAGIC};
use crate::utilities::read_byte;
use crate::writer::TokenWriter;

pub mod archive;
pub(crate) mod read;
pub(crate) mod write;

pub use archive::{BufferReader, ReadArchive, WriteArchive};

/// Pass configuration. The optimization mode is recorded in the stream header,
/// so readers never depend on the writing caller's choice.
#[derive(Clone, Default)]
pub struct SerializerOptions {
	pub optimization: Optimization,
	pub tolerant_deserialization: bool,
	/// Opaque state threaded through every custom-serializer call.
	pub context: Option<Rc<dyn Any>>,
}

impl Debug for SerializerOptions {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SerializerOptions")
			.field("optimization", &self.optimization)
			.field("tolerant_deserialization", &self.tolerant_deserialization)
			.field("context", &self.context.is_some())
			.finish()
	}
}

/// The identity tables and scratch buffers of one pass, reusable across
/// passes through [`SerializerPool`].
///
/// [`SerializerPool`]: crate::pool::SerializerPool
#[derive(Default)]
pub(crate) struct ScratchState {
	pub(crate) objects: HashMap<usize, u32, BuildNoHashHasher<usize>>,
	pub(crate) strings: FxHashMap<Arc<str>, u32>,
	pub(crate) cycle: HashSet<u32, BuildNoHashHasher<u32>>,
	pub(crate) emit: TypeEmitTable,
	pub(crate) read_types: TypeReadTable,
	pub(crate) buffer: Vec<u8>,
}

impl ScratchState {
	pub fn clear(&mut self) {
		self.objects.clear();
		self.strings.clear();
		self.cycle.clear();
		self.emit.clear();
		self.read_types.clear();
		self.buffer.clear();
	}
}

/// The front door: serializes any [`Value`] into a self-describing stream and
/// reconstructs it without knowing the top-level type in advance.
#[derive(Debug, Clone)]
pub struct Serializer {
	registry: Arc<Registry>,
	options: SerializerOptions,
}

impl Serializer {
	pub fn new(registry: Arc<Registry>) -> Serializer {
		Serializer::with_options(registry, SerializerOptions::default())
	}

	pub fn with_options(registry: Arc<Registry>, options: SerializerOptions) -> Serializer {
		Serializer { registry, options }
	}

	#[inline]
	pub fn registry(&self) -> &Arc<Registry> {
		&self.registry
	}

	#[inline]
	pub fn options(&self) -> &SerializerOptions {
		&self.options
	}

	pub fn serialize(&self, value: &Value, stream: &mut dyn Write) -> Result<()> {
		let mut scratch = ScratchState::default();
		self.serialize_with(value, stream, &mut scratch)
	}

	pub(crate) fn serialize_with(&self, value: &Value, stream: &mut dyn Write, scratch: &mut ScratchState) -> Result<()> {
		scratch.clear();
		stream.write_all(&[STREAM_MAGIC, self.options.optimization as u8])?;
		let writer = TokenWriter::new(stream, self.options.optimization);
		let mut pass = write::WritePass::new(writer, &self.registry, scratch, self.options.context.clone());
		pass.write_value(value)
	}

	pub fn deserialize(&self, stream: &mut dyn Read) -> Result<Value> {
		let mut scratch = ScratchState::default();
		self.deserialize_with(stream, &mut scratch)
	}

	pub(crate) fn deserialize_with(&self, stream: &mut dyn Read, scratch: &mut ScratchState) -> Result<Value> {
		scratch.clear();
		let magic = read_byte(stream)?;
		if magic != STREAM_MAGIC {
			return Err(SerializationError::UnknownToken(magic));
		}
		let mode = read_byte(stream)?;
		let mode = Optimization::from_repr(mode).ok_or(SerializationError::UnknownToken(mode))?;

		let reader = TokenReader::new(stream, mode);
		let mut pass = read::ReadPass::new(
			reader,
			&self.registry,
			self.options.tolerant_deserialization,
			scratch,
			self.options.context.clone(),
		);
		pass.read_value()
	}

	/// Deep-copies a value by round-tripping it through an in-memory stream.
	pub fn copy(&self, value: &Value) -> Result<Value> {
		let mut scratch = ScratchState::default();
		self.copy_with(value, &mut scratch)
	}

	pub(crate) fn copy_with(&self, value: &Value, scratch: &mut ScratchState) -> Result<Value> {
		let mut buffer = std::mem::take(&mut scratch.buffer);
		buffer.clear();
		self.serialize_with(value, &mut buffer, scratch)?;
		let copied = self.deserialize_with(&mut buffer.as_slice(), scratch);
		scratch.buffer = buffer;
		copied
	}
}

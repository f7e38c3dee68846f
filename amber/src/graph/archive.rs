use std::any::Any;
use std::io::Read;
use std::rc::Rc;
use std::sync::Arc;

use paste::paste;
use uuid::Uuid;

use crate::errors::{Result, SerializationError};
use crate::graph::read::ReadPass;
use crate::graph::write::WritePass;
use crate::object::Value;
use crate::registry::Registry;
use crate::schema::ty::TypeHandle;
use crate::tokens::Token;
use crate::values::{Date, DateTime, DateTimeOffset, Decimal, Time};

/// The cursor a custom serializer writes one object's payload through.
///
/// Every operation appends tokens; the reading side must drain the same
/// tokens in the same order. The archive is strictly sequential and supports
/// no skipping.
pub struct WriteArchive<'p, 'l> {
	pass: &'p mut WritePass<'l>,
	ty: TypeHandle,
	version: u32,
	base_emitted: bool,
	pushed_context: bool,
}

macro_rules! impl_archive_writes {
	($($method: ident: $ty: ty => $token: ident),*) => {paste! {$(
		pub fn [<write_ $method>](&mut self, value: $ty) -> Result<()> {
			self.pass.writer.write_token(Token::$token)?;
			self.pass.writer.[<write_ $method>](value)
		}
	)*}};
}

impl<'p, 'l> WriteArchive<'p, 'l> {
	pub(crate) fn new(pass: &'p mut WritePass<'l>, ty: TypeHandle, version: u32) -> Self {
		Self {
			pass,
			ty,
			version,
			base_emitted: false,
			pushed_context: false,
		}
	}

	/// The version chosen for the object currently being written.
	#[inline]
	pub fn version(&self) -> u32 {
		self.version
	}

	/// The runtime type of the object currently being written.
	#[inline]
	pub fn object_type(&self) -> TypeHandle {
		self.ty
	}

	/// The opaque context threaded through the pass.
	pub fn context(&self) -> Option<Rc<dyn Any>> {
		self.pass.current_context()
	}

	pub fn registry(&self) -> &Registry {
		self.pass.registry
	}

	impl_archive_writes! {
		bool: bool => Boolean,
		char: char => Char,
		i8: i8 => SByte,
		u8: u8 => Byte,
		i16: i16 => Int16,
		u16: u16 => UInt16,
		i32: i32 => Int32,
		u32: u32 => UInt32,
		i64: i64 => Int64,
		u64: u64 => UInt64,
		f32: f32 => Single,
		f64: f64 => Double,
		decimal: Decimal => Decimal,
		date_time: DateTime => DateTime,
		date_time_offset: DateTimeOffset => DateTimeOffset,
		date: Date => DateOnly,
		time: Time => TimeOnly,
		guid: Uuid => Guid
	}

	/// Writes a string through the pass-wide deduplication table.
	pub fn write_str(&mut self, value: &str) -> Result<()> {
		self.pass.write_string(&Arc::from(value))
	}

	pub fn write_string(&mut self, value: &Arc<str>) -> Result<()> {
		self.pass.write_string(value)
	}

	/// Writes an embedded value, recursing into the graph walker.
	pub fn write_object(&mut self, value: &Value) -> Result<()> {
		self.pass.write_value(value)
	}

	/// Like [`write_object`], but the given context replaces the pass context
	/// for the embedded subtree.
	///
	/// [`write_object`]: WriteArchive::write_object
	pub fn write_object_with_context(&mut self, value: &Value, context: Option<Rc<dyn Any>>) -> Result<()> {
		self.pass.contexts.push(context);
		let result = self.pass.write_value(value);
		self.pass.contexts.pop();
		result
	}

	/// Writes a length-prefixed raw payload.
	pub fn write_buffer(&mut self, bytes: &[u8]) -> Result<()> {
		self.pass.writer.write_token(Token::Buffer)?;
		self.pass.writer.write_len(bytes.len())?;
		self.pass.writer.write_bytes(bytes)
	}

	/// Streams `length` bytes out of `source` as a length-prefixed payload.
	pub fn write_buffer_from(&mut self, source: &mut dyn Read, length: u64) -> Result<()> {
		self.pass.writer.write_token(Token::Buffer)?;
		self.pass.writer.write_len(length as usize)?;
		self.pass.writer.copy_from(source, length)
	}

	/// Opens the nested archive of the declared base type. The emitted version
	/// is the base declaration's max version; the caller hands the returned
	/// archive to the base type's serializing code before writing its own
	/// fields.
	pub fn write_base_archive(&mut self) -> Result<WriteArchive<'_, 'l>> {
		self.base_archive(false, None)
	}

	/// Like [`write_base_archive`], with a context override for the nested
	/// archive.
	///
	/// [`write_base_archive`]: WriteArchive::write_base_archive
	pub fn write_base_archive_with_context(&mut self, context: Option<Rc<dyn Any>>) -> Result<WriteArchive<'_, 'l>> {
		self.base_archive(true, context)
	}

	fn base_archive(&mut self, push_context: bool, context: Option<Rc<dyn Any>>) -> Result<WriteArchive<'_, 'l>> {
		if self.base_emitted {
			return Err(SerializationError::InvalidArchiveState("the base archive was already written"));
		}
		let Some(base) = self.pass.registry.entry(self.ty).base else {
			return Err(SerializationError::InvalidArchiveState("the current type declares no base type"));
		};
		let (_, version) = self.pass.registry.serializer_for(base)?;

		self.pass.writer.write_token(Token::BaseArchiveStart)?;
		self.pass.writer.write_id(version)?;
		self.base_emitted = true;

		if push_context {
			self.pass.contexts.push(context);
		}
		Ok(WriteArchive {
			pass: &mut *self.pass,
			ty: base,
			version,
			base_emitted: false,
			pushed_context: push_context,
		})
	}
}

impl Drop for WriteArchive<'_, '_> {
	fn drop(&mut self) {
		if self.pushed_context {
			self.pass.contexts.pop();
		}
	}
}

/// The read-side mirror of [`WriteArchive`].
pub struct ReadArchive<'p, 'l> {
	pass: &'p mut ReadPass<'l>,
	ty: TypeHandle,
	version: u32,
	base_read: bool,
}

macro_rules! impl_archive_reads {
	($($method: ident: $ty: ty => $token: ident),*) => {paste! {$(
		pub fn [<read_ $method>](&mut self) -> Result<$ty> {
			self.pass.drain_pending()?;
			match self.pass.reader.read_token()? {
				Token::$token => self.pass.reader.[<read_ $method>](),
				_ => Err(SerializationError::InvalidArchiveState(
					concat!("expected a ", stringify!($token), " token"),
				)),
			}
		}
	)*}};
}

impl<'p, 'l> ReadArchive<'p, 'l> {
	pub(crate) fn new(pass: &'p mut ReadPass<'l>, ty: TypeHandle, version: u32) -> Self {
		Self {
			pass,
			ty,
			version,
			base_read: false,
		}
	}

	/// The version recorded in the stream for the object being read. Custom
	/// serializers must fail with [`VersionNotSupported`] for versions they
	/// do not know.
	///
	/// [`VersionNotSupported`]: crate::errors::SerializationError::VersionNotSupported
	#[inline]
	pub fn version(&self) -> u32 {
		self.version
	}

	/// The resolved runtime type of the object being read.
	#[inline]
	pub fn object_type(&self) -> TypeHandle {
		self.ty
	}

	pub fn context(&self) -> Option<Rc<dyn Any>> {
		self.pass.context.clone()
	}

	pub fn registry(&self) -> &Registry {
		self.pass.registry
	}

	impl_archive_reads! {
		bool: bool => Boolean,
		char: char => Char,
		i8: i8 => SByte,
		u8: u8 => Byte,
		i16: i16 => Int16,
		u16: u16 => UInt16,
		i32: i32 => Int32,
		u32: u32 => UInt32,
		i64: i64 => Int64,
		u64: u64 => UInt64,
		f32: f32 => Single,
		f64: f64 => Double,
		decimal: Decimal => Decimal,
		date_time: DateTime => DateTime,
		date_time_offset: DateTimeOffset => DateTimeOffset,
		date: Date => DateOnly,
		time: Time => TimeOnly,
		guid: Uuid => Guid
	}

	/// Reads an embedded value, recursing into the graph walker.
	pub fn read_object(&mut self) -> Result<Value> {
		self.pass.read_value()
	}

	/// Reads a non-null string.
	pub fn read_str(&mut self) -> Result<Arc<str>> {
		match self.read_object()? {
			Value::Str(value) => Ok(value),
			_ => Err(SerializationError::InvalidArchiveState("expected a string value")),
		}
	}

	/// Reads a whole buffer payload into a fresh vector.
	pub fn read_buffer(&mut self) -> Result<Vec<u8>> {
		let length = self.buffer_length()?;
		let mut bytes = vec![0u8; length];
		self.pass.reader.read_exact(&mut bytes)?;
		Ok(bytes)
	}

	/// Reads a buffer payload into the caller's slice, returning the payload
	/// length. The destination must be at least as large as the payload.
	pub fn read_buffer_into(&mut self, destination: &mut [u8]) -> Result<usize> {
		let length = self.buffer_length()?;
		if length > destination.len() {
			return Err(SerializationError::InvalidArchiveState("buffer payload exceeds the destination"));
		}
		self.pass.reader.read_exact(&mut destination[..length])?;
		Ok(length)
	}

	/// A lazy view over the buffer payload that surrenders the underlying
	/// stream's bytes as it is read. Whatever the view leaves undrained is
	/// skipped before the next archive operation.
	pub fn read_buffer_stream(&mut self) -> Result<BufferReader<'_, 'l>> {
		let length = self.buffer_length()?;
		self.pass.pending_buffer = length as u64;
		Ok(BufferReader { pass: &mut *self.pass })
	}

	fn buffer_length(&mut self) -> Result<usize> {
		self.pass.drain_pending()?;
		match self.pass.reader.read_token()? {
			Token::Buffer => self.pass.reader.read_len(),
			_ => Err(SerializationError::InvalidArchiveState("expected a Buffer token")),
		}
	}

	/// Opens the nested archive rooted at the next base-archive token,
	/// verifying the recorded version against the base declaration before any
	/// user code runs.
	pub fn prepare_base_archive(&mut self) -> Result<ReadArchive<'_, 'l>> {
		if self.base_read {
			return Err(SerializationError::InvalidArchiveState("the base archive was already read"));
		}
		let Some(base) = self.pass.registry.entry(self.ty).base else {
			return Err(SerializationError::InvalidArchiveState("the current type declares no base type"));
		};

		self.pass.drain_pending()?;
		match self.pass.reader.read_token()? {
			Token::BaseArchiveStart => {},
			_ => return Err(SerializationError::InvalidArchiveState("no base archive follows")),
		}
		let version = self.pass.reader.read_id()?;
		let (_, max_version) = self.pass.registry.serializer_for(base)?;
		if version > max_version {
			return Err(SerializationError::VersionNotSupported {
				type_name: self.pass.registry.display_of(base),
				version,
				max_version,
			});
		}

		self.base_read = true;
		Ok(ReadArchive {
			pass: &mut *self.pass,
			ty: base,
			version,
			base_read: false,
		})
	}
}

/// Lazily reads a buffer payload out of the archive's underlying stream.
pub struct BufferReader<'p, 'l> {
	pass: &'p mut ReadPass<'l>,
}

impl BufferReader<'_, '_> {
	/// Bytes of the payload not yet consumed.
	#[inline]
	pub fn remaining(&self) -> u64 {
		self.pass.pending_buffer
	}
}

impl Read for BufferReader<'_, '_> {
	fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
		if self.pass.pending_buffer == 0 || buffer.is_empty() {
			return Ok(0);
		}
		let max = buffer.len().min(self.pass.pending_buffer.min(usize::MAX as u64) as usize);
		let read = self.pass.reader.read_raw(&mut buffer[..max])?;
		if read == 0 {
			return Err(std::io::ErrorKind::UnexpectedEof.into());
		}
		self.pass.pending_buffer -= read as u64;
		Ok(read)
	}
}

use std::collections::HashMap;
use std::sync::Arc;

use fxhash::FxHashMap;
use nohash_hasher::BuildNoHashHasher;

use crate::errors::{Result, SerializationError};
use crate::reader::TokenReader;
use crate::registry::{EntryKind, Registry};
use crate::schema::assembly::{AssemblyName, AssemblyNameFlags, AssemblyVersion};
use crate::schema::resolver::TypeResolver;
use crate::schema::ty::{TypeHandle, TypeName};
use crate::tokens::Token;
use crate::writer::TokenWriter;

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum TypeShape {
	Named = 0x00,
	GenericDefinition = 0x01,
	GenericInstance = 0x02,
	Array = 0x03,
}

impl TypeShape {
	fn from_repr(discriminant: u8) -> Option<TypeShape> {
		match discriminant {
			0x00 => Some(TypeShape::Named),
			0x01 => Some(TypeShape::GenericDefinition),
			0x02 => Some(TypeShape::GenericInstance),
			0x03 => Some(TypeShape::Array),
			_ => None,
		}
	}
}

/// Write-side deduplication tables. The first sighting of a type or assembly
/// emits the inline descriptor and assigns the next dense id; later sightings
/// emit only the back-reference.
#[derive(Default)]
pub(crate) struct TypeEmitTable {
	types: HashMap<TypeHandle, u32, BuildNoHashHasher<TypeHandle>>,
	assemblies: FxHashMap<AssemblyName, u32>,
}

impl TypeEmitTable {
	pub fn clear(&mut self) {
		self.types.clear();
		self.assemblies.clear();
	}
}

/// Read-side mirror of [`TypeEmitTable`]: ids index into these vectors in
/// first-seen order.
#[derive(Default)]
pub(crate) struct TypeReadTable {
	types: Vec<TypeHandle>,
	assemblies: Vec<AssemblyName>,
}

impl TypeReadTable {
	pub fn clear(&mut self) {
		self.types.clear();
		self.assemblies.clear();
	}
}

// Slot value while an inline descriptor is still being parsed. A well-formed
// stream cannot reference a type that has not finished parsing.
const PENDING: TypeHandle = TypeHandle(u32::MAX);

pub(crate) fn write_type(
	writer: &mut TokenWriter,
	registry: &Registry,
	table: &mut TypeEmitTable,
	handle: TypeHandle,
) -> Result<()> {
	if let Some(&id) = table.types.get(&handle) {
		writer.write_token(Token::TypeRef)?;
		return writer.write_id(id);
	}

	let id = table.types.len() as u32;
	table.types.insert(handle, id);
	writer.write_token(Token::TypeInline)?;

	let entry = registry.entry(handle);
	match &entry.kind {
		EntryKind::GenericInstance { definition, args } => {
			writer.write_u8(TypeShape::GenericInstance as u8)?;
			write_type(writer, registry, table, *definition)?;
			writer.write_len(args.len())?;
			for &arg in args.iter() {
				write_type(writer, registry, table, arg)?;
			}
			Ok(())
		},
		EntryKind::Array { element, rank } => {
			writer.write_u8(TypeShape::Array as u8)?;
			write_type(writer, registry, table, *element)?;
			writer.write_id(*rank)
		},
		_ => match &entry.name {
			TypeName::Named { assembly, name } => {
				writer.write_u8(TypeShape::Named as u8)?;
				write_assembly(writer, table, assembly)?;
				writer.write_str_payload(name)
			},
			// The placeholder form: the argument list stays empty, arity
			// travels in the name's suffix.
			TypeName::GenericDefinition { assembly, name, .. } => {
				writer.write_u8(TypeShape::GenericDefinition as u8)?;
				write_assembly(writer, table, assembly)?;
				writer.write_str_payload(name)
			},
			_ => Err(SerializationError::InvalidArchiveState("type entry does not match its descriptor")),
		},
	}
}

fn write_assembly(writer: &mut TokenWriter, table: &mut TypeEmitTable, name: &AssemblyName) -> Result<()> {
	if let Some(&id) = table.assemblies.get(name) {
		writer.write_token(Token::AssemblyRef)?;
		return writer.write_id(id);
	}

	let id = table.assemblies.len() as u32;
	table.assemblies.insert(name.clone(), id);

	writer.write_token(Token::AssemblyInline)?;
	writer.write_str_payload(&name.name)?;
	writer.write_bytes(&name.version.major.to_le_bytes())?;
	writer.write_bytes(&name.version.minor.to_le_bytes())?;
	writer.write_bytes(&name.version.build.to_le_bytes())?;
	writer.write_bytes(&name.version.revision.to_le_bytes())?;
	writer.write_str_payload(&name.culture)?;
	writer.write_len(name.public_key_token.len())?;
	writer.write_bytes(&name.public_key_token)?;
	writer.write_id(name.flags.bits())
}

pub(crate) fn read_type(
	reader: &mut TokenReader,
	registry: &Registry,
	tolerant: bool,
	table: &mut TypeReadTable,
) -> Result<TypeHandle> {
	let token = reader.read_token()?;
	read_type_with(token, reader, registry, tolerant, table)
}

pub(crate) fn read_type_with(
	token: Token,
	reader: &mut TokenReader,
	registry: &Registry,
	tolerant: bool,
	table: &mut TypeReadTable,
) -> Result<TypeHandle> {
	match token {
		Token::TypeRef => {
			let id = reader.read_id()? as usize;
			match table.types.get(id) {
				Some(&handle) if handle != PENDING => Ok(handle),
				_ => Err(SerializationError::InvalidArchiveState("dangling type reference")),
			}
		},
		Token::TypeInline => {
			let slot = table.types.len();
			table.types.push(PENDING);

			let [shape] = reader.read_bytes::<1>()?;
			let shape = TypeShape::from_repr(shape).ok_or(SerializationError::UnknownToken(shape))?;
			let handle = match shape {
				TypeShape::Named => {
					let assembly = read_assembly(reader, table)?;
					let name = reader.read_str_payload()?;
					TypeResolver::new(registry, tolerant).resolve_named(&assembly, &name)?
				},
				TypeShape::GenericDefinition => {
					let assembly = read_assembly(reader, table)?;
					let name = reader.read_str_payload()?;
					TypeName::parse_arity(&name)?;
					TypeResolver::new(registry, tolerant).resolve_named(&assembly, &name)?
				},
				TypeShape::GenericInstance => {
					let definition = read_type(reader, registry, tolerant, table)?;
					let count = reader.read_len()?;
					let mut args = Vec::with_capacity(count.min(64));
					for _ in 0..count {
						args.push(read_type(reader, registry, tolerant, table)?);
					}
					registry.instance_of(definition, &args)?
				},
				TypeShape::Array => {
					let element = read_type(reader, registry, tolerant, table)?;
					let rank = reader.read_id()?;
					if rank == 0 {
						return Err(SerializationError::InvalidArchiveState("array rank must be at least one"));
					}
					registry.array_of(element, rank)
				},
			};

			table.types[slot] = handle;
			Ok(handle)
		},
		_ => Err(SerializationError::InvalidArchiveState("expected a type token")),
	}
}

fn read_assembly(reader: &mut TokenReader, table: &mut TypeReadTable) -> Result<AssemblyName> {
	match reader.read_token()? {
		Token::AssemblyRef => {
			let id = reader.read_id()? as usize;
			table
				.assemblies
				.get(id)
				.cloned()
				.ok_or(SerializationError::InvalidArchiveState("dangling assembly reference"))
		},
		Token::AssemblyInline => {
			let name = reader.read_str_payload()?;
			let version = AssemblyVersion::new(
				u16::from_le_bytes(reader.read_bytes::<2>()?),
				u16::from_le_bytes(reader.read_bytes::<2>()?),
				u16::from_le_bytes(reader.read_bytes::<2>()?),
				u16::from_le_bytes(reader.read_bytes::<2>()?),
			);
			let culture = reader.read_str_payload()?;
			let token_length = reader.read_len()?;
			let mut public_key_token = vec![0u8; token_length];
			reader.read_exact(&mut public_key_token)?;
			let flags = AssemblyNameFlags::from_bits_truncate(reader.read_id()?);

			let assembly = AssemblyName {
				name,
				version,
				culture,
				public_key_token: Arc::from(public_key_token),
				flags,
			};
			table.assemblies.push(assembly.clone());
			Ok(assembly)
		},
		_ => Err(SerializationError::InvalidArchiveState("expected an assembly token")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::registry::{AssemblyBuilder, Registry};
	use crate::schema::assembly::AssemblyVersion;
	use crate::schema::ty::Primitive;
	use crate::tokens::Optimization;

	fn registry() -> std::sync::Arc<Registry> {
		let name = AssemblyName::new("codec", AssemblyVersion::new(1, 0, 0, 0));
		Registry::build(vec![AssemblyBuilder::new(name)])
	}

	fn round_trip(registry: &Registry, handles: &[TypeHandle]) -> Vec<TypeHandle> {
		let mut stream = Vec::new();
		let mut writer = TokenWriter::new(&mut stream, Optimization::Speed);
		let mut emit = TypeEmitTable::default();
		for &handle in handles {
			write_type(&mut writer, registry, &mut emit, handle).unwrap();
		}

		let mut cursor = stream.as_slice();
		let mut reader = TokenReader::new(&mut cursor, Optimization::Speed);
		let mut table = TypeReadTable::default();
		handles
			.iter()
			.map(|_| read_type(&mut reader, registry, false, &mut table).unwrap())
			.collect()
	}

	#[test]
	fn descriptors_resolve_to_the_same_handles() {
		let registry = registry();
		let i32_type = registry.primitive(Primitive::Int32);
		let string_type = registry.string_type();
		let array = registry.array_of(string_type, 2);
		let map = registry.instance_of(registry.map_definition(), &[i32_type, string_type]).unwrap();

		let handles = [i32_type, string_type, array, map, map, i32_type];
		assert_eq!(round_trip(&registry, &handles), handles);
	}

	#[test]
	fn repeated_descriptors_shrink_to_back_references() {
		let registry = registry();
		let string_type = registry.string_type();

		let mut stream = Vec::new();
		let mut emit = TypeEmitTable::default();
		{
			let mut writer = TokenWriter::new(&mut stream, Optimization::Speed);
			write_type(&mut writer, &registry, &mut emit, string_type).unwrap();
		}
		let inline = stream.len();
		{
			let mut writer = TokenWriter::new(&mut stream, Optimization::Speed);
			write_type(&mut writer, &registry, &mut emit, string_type).unwrap();
		}

		// Token::TypeRef plus a one-byte id.
		assert_eq!(stream.len() - inline, 2);
	}

	#[test]
	fn dangling_references_are_detected() {
		let registry = registry();
		let stream = [Token::TypeRef as u8, 5];
		let mut cursor = stream.as_slice();
		let mut reader = TokenReader::new(&mut cursor, Optimization::Speed);
		let result = read_type(&mut reader, &registry, false, &mut TypeReadTable::default());
		assert!(matches!(result, Err(SerializationError::InvalidArchiveState(_))));
	}
}

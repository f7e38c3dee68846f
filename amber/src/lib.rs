//! A self-describing binary serializer for in-process object graphs: values
//! are written with enough type and assembly metadata that a reader can
//! reconstruct them on another process, machine or host configuration without
//! knowing the top-level type in advance.

pub mod collections;
pub mod errors;
pub mod graph;
pub mod object;
pub mod pool;
pub mod reader;
pub mod registry;
pub mod schema;
pub mod tokens;
mod utilities;
pub mod values;
pub mod var_int;
pub mod writer;

pub use collections::{Dictionary, List};
pub use errors::{Result, SerializationError};
pub use graph::{BufferReader, ReadArchive, Serializer, SerializerOptions, WriteArchive};
pub use object::{Array, EnumValue, GraphObject, Value};
pub use pool::{PooledSerializer, SerializerPool};
pub use registry::declaration::TypeSpec;
pub use registry::{
	AssemblyBuilder, ExternalSerializer, GenericSerializerFactory, GraphSerializer, Registry, Serializable,
	TypeDeclaration,
};
pub use schema::{AssemblyName, AssemblyNameFlags, AssemblyVersion, Primitive, TypeHandle, TypeName};
pub use tokens::{Optimization, Token};
pub use values::{Date, DateTime, DateTimeKind, DateTimeOffset, Decimal, Time};

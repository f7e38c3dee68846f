#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;
use std::sync::Arc;

use amber::{
	impl_graph_object, AssemblyBuilder, AssemblyName, AssemblyVersion, GraphObject, GraphSerializer, Primitive,
	ReadArchive, Registry, Result, Serializable, SerializationError, TypeSpec, Value, WriteArchive,
};

pub struct Point {
	pub x: i32,
	pub y: i32,
}

impl Serializable for Point {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		archive.write_i32(self.x)?;
		archive.write_i32(self.y)
	}

	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		Ok(Point {
			x: archive.read_i32()?,
			y: archive.read_i32()?,
		})
	}
}

pub struct Line {
	pub start: Value,
	pub end: Value,
}

impl Serializable for Line {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		archive.write_object(&self.start)?;
		archive.write_object(&self.end)
	}

	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		Ok(Line {
			start: archive.read_object()?,
			end: archive.read_object()?,
		})
	}
}

pub struct Node {
	pub name: String,
	pub next: RefCell<Value>,
}

impl Node {
	pub fn new(name: &str) -> Rc<Node> {
		Rc::new(Node {
			name: name.to_string(),
			next: RefCell::new(Value::Null),
		})
	}
}

impl Serializable for Node {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		archive.write_str(&self.name)?;
		let next = self.next.borrow().clone();
		archive.write_object(&next)
	}

	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		Ok(Node {
			name: archive.read_str()?.to_string(),
			next: RefCell::new(archive.read_object()?),
		})
	}
}

pub struct ShapeBase {
	pub id: i32,
}

impl Serializable for ShapeBase {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		archive.write_i32(self.id)
	}

	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		Ok(ShapeBase { id: archive.read_i32()? })
	}
}

pub struct Circle {
	pub base: ShapeBase,
	pub radius: f64,
}

impl Serializable for Circle {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		{
			let mut base_archive = archive.write_base_archive()?;
			self.base.serialize(&mut base_archive)?;
		}
		archive.write_f64(self.radius)
	}

	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		let base = {
			let mut base_archive = archive.prepare_base_archive()?;
			ShapeBase::deserialize(&mut base_archive)?
		};
		Ok(Circle {
			base,
			radius: archive.read_f64()?,
		})
	}
}

/// Misbehaves on purpose: opens the base archive twice.
pub struct GreedyCircle {
	pub base: ShapeBase,
}

impl Serializable for GreedyCircle {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		{
			let mut base_archive = archive.write_base_archive()?;
			self.base.serialize(&mut base_archive)?;
		}
		archive.write_base_archive().map(|_| ())
	}

	fn deserialize(_archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		Err(SerializationError::InvalidArchiveState("never deserialized"))
	}
}

pub struct Versioned {
	pub value: i64,
}

impl Serializable for Versioned {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		match archive.version() {
			1 => archive.write_i32(self.value as i32),
			_ => archive.write_i64(self.value),
		}
	}

	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		match archive.version() {
			1 => Ok(Versioned { value: archive.read_i32()? as i64 }),
			2 => Ok(Versioned { value: archive.read_i64()? }),
			version => Err(SerializationError::VersionNotSupported {
				type_name: "demo.Versioned".to_string(),
				version,
				max_version: 2,
			}),
		}
	}
}

pub struct Blob {
	pub data: Vec<u8>,
	pub tail: i32,
}

impl Serializable for Blob {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		archive.write_buffer(&self.data)?;
		archive.write_i32(self.tail)
	}

	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		Ok(Blob {
			data: archive.read_buffer()?,
			tail: archive.read_i32()?,
		})
	}
}

/// Reads only the first three bytes of its buffer payload through the lazy
/// stream view, leaving the rest for the archive to skip.
pub struct Chunky {
	pub head: Vec<u8>,
	pub tail: i32,
}

impl Serializable for Chunky {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		archive.write_buffer(&self.head)?;
		archive.write_i32(self.tail)
	}

	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		let head = {
			let mut view = archive.read_buffer_stream()?;
			let mut first = [0u8; 3];
			view.read_exact(&mut first)?;
			first.to_vec()
		};
		Ok(Chunky {
			head,
			tail: archive.read_i32()?,
		})
	}
}

pub struct Tagged {
	pub tag: i32,
}

pub struct TaggedSerializer;

impl GraphSerializer for TaggedSerializer {
	fn serialize(&self, value: &Rc<dyn GraphObject>, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		let tagged = value
			.as_any()
			.downcast_ref::<Tagged>()
			.ok_or(SerializationError::InvalidArchiveState("expected a Tagged instance"))?;
		archive.write_i32(tagged.tag)
	}

	fn deserialize(&self, archive: &mut ReadArchive<'_, '_>) -> Result<Rc<dyn GraphObject>> {
		Ok(Rc::new(Tagged { tag: archive.read_i32()? }))
	}
}

pub struct GenPair<A, B> {
	pub a: A,
	pub b: B,
}

impl Serializable for GenPair<i32, u32> {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		archive.write_i32(self.a)?;
		archive.write_u32(self.b)
	}

	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		Ok(GenPair {
			a: archive.read_i32()?,
			b: archive.read_u32()?,
		})
	}
}

impl Serializable for GenPair<i32, String> {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		archive.write_i32(self.a)?;
		archive.write_str(&self.b)
	}

	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		Ok(GenPair {
			a: archive.read_i32()?,
			b: archive.read_str()?.to_string(),
		})
	}
}

pub struct Unregistered;

impl_graph_object!(
	Point,
	Line,
	Node,
	ShapeBase,
	Circle,
	GreedyCircle,
	Versioned,
	Blob,
	Chunky,
	Tagged,
	GenPair<i32, u32>,
	GenPair<i32, String>,
	Unregistered
);

pub fn demo_assembly() -> AssemblyBuilder {
	let name = AssemblyName::new("demo", AssemblyVersion::new(1, 0, 0, 0));
	let mut assembly = AssemblyBuilder::new(name);

	assembly.declare_internal::<Point>("demo.Point", 1);
	assembly.declare_internal::<Line>("demo.Line", 1);
	assembly.declare_internal::<Node>("demo.Node", 1);
	assembly.declare_internal::<ShapeBase>("demo.ShapeBase", 1);
	assembly.declare_internal::<Circle>("demo.Circle", 1).base("demo.ShapeBase");
	assembly.declare_internal::<GreedyCircle>("demo.GreedyCircle", 1).base("demo.ShapeBase");
	assembly.declare_internal::<Versioned>("demo.Versioned", 2);
	assembly.declare_internal::<Blob>("demo.Blob", 1);
	assembly.declare_internal::<Chunky>("demo.Chunky", 1);
	assembly.declare_enum("demo.Color", Primitive::Int32);

	assembly.declare_interface_with("demo.ITagged", 1, Arc::new(TaggedSerializer));
	assembly.declare_class::<Tagged>("demo.Tagged").implements("demo.ITagged");

	assembly.declare_definition("demo.Gen`2");
	assembly.declare_internal::<GenPair<i32, u32>>(TypeSpec::generic("demo.Gen`2", ["i32", "u32"]), 1);
	assembly.declare_internal::<GenPair<i32, String>>(TypeSpec::generic("demo.Gen`2", ["i32", "string"]), 1);

	assembly
}

pub fn demo_registry() -> Arc<Registry> {
	Registry::build(vec![demo_assembly()])
}

/// A registry whose `demo.Versioned` declaration tops out at the given max
/// version, for version-dispatch tests.
pub fn versioned_registry(max_version: u32) -> Arc<Registry> {
	let name = AssemblyName::new("demo", AssemblyVersion::new(1, 0, 0, 0));
	let mut assembly = AssemblyBuilder::new(name);
	assembly.declare_internal::<Versioned>("demo.Versioned", max_version);
	Registry::build(vec![assembly])
}

/// A registry hosting `mig.Widget` inside the given assembly version, for
/// type-migration tests.
pub fn migration_registry(version: AssemblyVersion) -> Arc<Registry> {
	let mut assembly = AssemblyBuilder::new(AssemblyName::new("mig", version));
	assembly.declare_internal::<Point>("mig.Widget", 1);
	Registry::build(vec![assembly])
}

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use derivative::Derivative;

use crate::errors::{Result, SerializationError};
use crate::graph::archive::{ReadArchive, WriteArchive};
use crate::object::{GraphObject, Value};
use crate::registry::serializers::{GenericSerializerFactory, GraphSerializer};
use crate::registry::{EntryKind, Registry};
use crate::schema::ty::TypeHandle;

/// A dynamic key/value collection standing for any constructed `Map`2` type.
/// One Rust type serves every key/value combination, so instances report their
/// constructed runtime type themselves.
///
/// Entries keep insertion order; comparers are not part of the data model, so
/// a reconstructed map always uses plain value equality.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Dictionary {
	ty: TypeHandle,
	key_type: TypeHandle,
	value_type: TypeHandle,
	#[derivative(Debug = "ignore")]
	entries: RefCell<Vec<(Value, Value)>>,
}

impl Dictionary {
	pub fn new(registry: &Registry, key_type: TypeHandle, value_type: TypeHandle) -> Result<Rc<Dictionary>> {
		let ty = registry.instance_of(registry.map_definition(), &[key_type, value_type])?;
		Ok(Rc::new(Dictionary {
			ty,
			key_type,
			value_type,
			entries: RefCell::new(Vec::new()),
		}))
	}

	pub(crate) fn with_type(ty: TypeHandle, key_type: TypeHandle, value_type: TypeHandle) -> Rc<Dictionary> {
		Rc::new(Dictionary {
			ty,
			key_type,
			value_type,
			entries: RefCell::new(Vec::new()),
		})
	}

	#[inline]
	pub fn key_type(&self) -> TypeHandle {
		self.key_type
	}

	#[inline]
	pub fn value_type(&self) -> TypeHandle {
		self.value_type
	}

	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Inserts or replaces the entry with an equal key.
	pub fn insert(&self, key: Value, value: Value) {
		let mut entries = self.entries.borrow_mut();
		match entries.iter_mut().find(|(existing, _)| *existing == key) {
			Some(entry) => entry.1 = value,
			None => entries.push((key, value)),
		}
	}

	pub fn get(&self, key: &Value) -> Option<Value> {
		self.entries
			.borrow()
			.iter()
			.find(|(existing, _)| existing == key)
			.map(|(_, value)| value.clone())
	}

	pub(crate) fn push_entry(&self, key: Value, value: Value) {
		self.entries.borrow_mut().push((key, value));
	}

	pub fn entries(&self) -> Vec<(Value, Value)> {
		self.entries.borrow().clone()
	}
}

impl GraphObject for Dictionary {
	fn type_name(&self) -> &'static str {
		std::any::type_name::<Dictionary>()
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}

	fn runtime_type(&self) -> Option<TypeHandle> {
		Some(self.ty)
	}
}

/// A dynamic sequence standing for any constructed `List`1` type.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct List {
	ty: TypeHandle,
	element_type: TypeHandle,
	#[derivative(Debug = "ignore")]
	items: RefCell<Vec<Value>>,
}

impl List {
	pub fn new(registry: &Registry, element_type: TypeHandle) -> Result<Rc<List>> {
		let ty = registry.instance_of(registry.list_definition(), &[element_type])?;
		Ok(Rc::new(List {
			ty,
			element_type,
			items: RefCell::new(Vec::new()),
		}))
	}

	pub(crate) fn with_type(ty: TypeHandle, element_type: TypeHandle) -> Rc<List> {
		Rc::new(List {
			ty,
			element_type,
			items: RefCell::new(Vec::new()),
		})
	}

	#[inline]
	pub fn element_type(&self) -> TypeHandle {
		self.element_type
	}

	pub fn len(&self) -> usize {
		self.items.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn push(&self, value: Value) {
		self.items.borrow_mut().push(value);
	}

	pub fn get(&self, index: usize) -> Option<Value> {
		self.items.borrow().get(index).cloned()
	}

	pub fn items(&self) -> Vec<Value> {
		self.items.borrow().clone()
	}
}

impl GraphObject for List {
	fn type_name(&self) -> &'static str {
		std::any::type_name::<List>()
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}

	fn runtime_type(&self) -> Option<TypeHandle> {
		Some(self.ty)
	}
}

/// Generic arguments of the archive's object type, falling back to the
/// untyped object placeholder when a foreign type routed here through an
/// interface declaration.
fn generic_args(archive_type: TypeHandle, registry: &Registry, expected: usize) -> Vec<TypeHandle> {
	if let EntryKind::GenericInstance { ref args, .. } = registry.entry(archive_type).kind {
		if args.len() == expected {
			return args.to_vec();
		}
	}
	vec![registry.object_type(); expected]
}

pub(crate) struct DictionarySerializer;

impl GraphSerializer for DictionarySerializer {
	fn serialize(&self, value: &Rc<dyn GraphObject>, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		let dictionary = value
			.as_any()
			.downcast_ref::<Dictionary>()
			.ok_or_else(|| SerializationError::NoSerializerFor(value.type_name().to_string()))?;

		let entries = dictionary.entries();
		archive.write_i32(entries.len() as i32)?;
		for (key, value) in &entries {
			archive.write_object(key)?;
			archive.write_object(value)?;
		}
		Ok(())
	}

	fn deserialize(&self, archive: &mut ReadArchive<'_, '_>) -> Result<Rc<dyn GraphObject>> {
		let ty = archive.object_type();
		let args = generic_args(ty, archive.registry(), 2);
		let dictionary = Dictionary::with_type(ty, args[0], args[1]);

		let count = archive.read_i32()?;
		let count = usize::try_from(count).map_err(|_| SerializationError::Overflow)?;
		for _ in 0..count {
			let key = archive.read_object()?;
			let value = archive.read_object()?;
			dictionary.push_entry(key, value);
		}
		Ok(dictionary)
	}
}

pub(crate) struct ListSerializer;

impl GraphSerializer for ListSerializer {
	fn serialize(&self, value: &Rc<dyn GraphObject>, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		let list = value
			.as_any()
			.downcast_ref::<List>()
			.ok_or_else(|| SerializationError::NoSerializerFor(value.type_name().to_string()))?;

		let items = list.items();
		archive.write_i32(items.len() as i32)?;
		for item in &items {
			archive.write_object(item)?;
		}
		Ok(())
	}

	fn deserialize(&self, archive: &mut ReadArchive<'_, '_>) -> Result<Rc<dyn GraphObject>> {
		let ty = archive.object_type();
		let args = generic_args(ty, archive.registry(), 1);
		let list = List::with_type(ty, args[0]);

		let count = archive.read_i32()?;
		let count = usize::try_from(count).map_err(|_| SerializationError::Overflow)?;
		for _ in 0..count {
			list.push(archive.read_object()?);
		}
		Ok(list)
	}
}

pub(crate) struct DictionaryFactory;

impl GenericSerializerFactory for DictionaryFactory {
	fn instantiate(&self, _args: &[TypeHandle], _registry: &Registry) -> Result<Arc<dyn GraphSerializer>> {
		Ok(Arc::new(DictionarySerializer))
	}
}

pub(crate) struct ListFactory;

impl GenericSerializerFactory for ListFactory {
	fn instantiate(&self, _args: &[TypeHandle], _registry: &Registry) -> Result<Arc<dyn GraphSerializer>> {
		Ok(Arc::new(ListSerializer))
	}
}

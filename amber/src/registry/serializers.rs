use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use crate::errors::{Result, SerializationError};
use crate::graph::archive::{ReadArchive, WriteArchive};
use crate::object::GraphObject;
use crate::registry::Registry;
use crate::schema::ty::TypeHandle;

/// The contract of a type that serializes itself: a method taking a write
/// archive and a constructor of arity one taking a read archive. Declared
/// through [`AssemblyBuilder::declare_internal`].
///
/// [`AssemblyBuilder::declare_internal`]: crate::registry::AssemblyBuilder::declare_internal
pub trait Serializable: GraphObject + Sized {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()>;
	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self>;
}

/// A serializer declared outside its target type, for targets that cannot be
/// modified. Implementations must be state-free; one instance is shared across
/// the process.
pub trait ExternalSerializer<T: GraphObject>: Send + Sync {
	fn serialize(&self, value: &T, archive: &mut WriteArchive<'_, '_>) -> Result<()>;
	fn deserialize(&self, archive: &mut ReadArchive<'_, '_>) -> Result<T>;
}

/// The object-level dispatch surface the graph walker calls through. Internal
/// and external serializers are adapted into this; interface serializers and
/// instantiated generic-definition serializers implement it directly.
pub trait GraphSerializer: Send + Sync {
	fn serialize(&self, value: &Rc<dyn GraphObject>, archive: &mut WriteArchive<'_, '_>) -> Result<()>;
	fn deserialize(&self, archive: &mut ReadArchive<'_, '_>) -> Result<Rc<dyn GraphObject>>;
}

/// A serializer attached to a generic type definition, instantiated on demand
/// for a specific argument list. Instantiations are cached per constructed
/// type.
pub trait GenericSerializerFactory: Send + Sync {
	fn instantiate(&self, args: &[TypeHandle], registry: &Registry) -> Result<Arc<dyn GraphSerializer>>;
}

pub(crate) struct InternalAdapter<T>(PhantomData<fn() -> T>);

impl<T> Default for InternalAdapter<T> {
	fn default() -> Self {
		Self(PhantomData)
	}
}

impl<T: Serializable> GraphSerializer for InternalAdapter<T> {
	fn serialize(&self, value: &Rc<dyn GraphObject>, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		let value = value
			.as_any()
			.downcast_ref::<T>()
			.ok_or(SerializationError::InvalidArchiveState("object does not match its type declaration"))?;
		value.serialize(archive)
	}

	fn deserialize(&self, archive: &mut ReadArchive<'_, '_>) -> Result<Rc<dyn GraphObject>> {
		Ok(Rc::new(T::deserialize(archive)?))
	}
}

pub(crate) struct ExternalAdapter<T, S> {
	serializer: S,
	marker: PhantomData<fn() -> T>,
}

impl<T, S> ExternalAdapter<T, S> {
	pub(crate) fn new(serializer: S) -> Self {
		Self { serializer, marker: PhantomData }
	}
}

impl<T: GraphObject, S: ExternalSerializer<T>> GraphSerializer for ExternalAdapter<T, S> {
	fn serialize(&self, value: &Rc<dyn GraphObject>, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		let value = value
			.as_any()
			.downcast_ref::<T>()
			.ok_or(SerializationError::InvalidArchiveState("object does not match its type declaration"))?;
		self.serializer.serialize(value, archive)
	}

	fn deserialize(&self, archive: &mut ReadArchive<'_, '_>) -> Result<Rc<dyn GraphObject>> {
		Ok(Rc::new(self.serializer.deserialize(archive)?))
	}
}

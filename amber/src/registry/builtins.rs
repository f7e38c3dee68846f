use std::sync::Arc;

use crate::collections::{DictionaryFactory, DictionarySerializer, ListFactory, ListSerializer};
use crate::registry::declaration::AssemblyBuilder;
use crate::schema::assembly::{AssemblyName, AssemblyVersion};
use crate::schema::ty::Primitive;

pub(crate) const RUNTIME_ASSEMBLY: &str = "amber.runtime";
pub(crate) const STRING_TYPE: &str = "string";
pub(crate) const OBJECT_TYPE: &str = "object";
pub(crate) const MAP_DEFINITION: &str = "amber.collections.Map`2";
pub(crate) const LIST_DEFINITION: &str = "amber.collections.List`1";
pub(crate) const IDICTIONARY_INTERFACE: &str = "amber.collections.IDictionary`2";
pub(crate) const ILIST_INTERFACE: &str = "amber.collections.IList`1";
pub(crate) const ICOLLECTION_INTERFACE: &str = "amber.collections.ICollection`1";

/// The assembly every registry starts from: the primitive leaf types, strings,
/// the untyped object placeholder, and the dynamic collection machinery. It is
/// retargetable so streams written by any crate version bind by name.
pub(crate) fn runtime_assembly() -> AssemblyBuilder {
	let name = AssemblyName::new(RUNTIME_ASSEMBLY, AssemblyVersion::new(1, 0, 0, 0)).retargetable();
	let mut builder = AssemblyBuilder::new(name);

	for primitive in Primitive::ALL {
		builder.declare_primitive(primitive);
	}
	builder.declare_str(STRING_TYPE);
	builder.declare_object(OBJECT_TYPE);

	builder.declare_interface_with(IDICTIONARY_INTERFACE, 1, Arc::new(DictionarySerializer));
	builder.declare_interface_with(ILIST_INTERFACE, 1, Arc::new(ListSerializer));
	builder.declare_interface_with(ICOLLECTION_INTERFACE, 1, Arc::new(ListSerializer));

	builder
		.declare_generic(MAP_DEFINITION, 1, DictionaryFactory)
		.implements(IDICTIONARY_INTERFACE)
		.implements(ICOLLECTION_INTERFACE);
	builder
		.declare_generic(LIST_DEFINITION, 1, ListFactory)
		.implements(ILIST_INTERFACE)
		.implements(ICOLLECTION_INTERFACE);

	builder
}

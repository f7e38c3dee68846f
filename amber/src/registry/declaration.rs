use std::any::TypeId;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::object::GraphObject;
use crate::registry::serializers::{
	ExternalAdapter, ExternalSerializer, GenericSerializerFactory, GraphSerializer, InternalAdapter, Serializable,
};
use crate::schema::assembly::AssemblyName;
use crate::schema::ty::Primitive;

/// Names a type inside an assembly's declarations, either by its fully
/// qualified name or as a constructed generic over other specs.
#[derive(Debug, Clone)]
pub enum TypeSpec {
	Name(String),
	Generic(String, Vec<TypeSpec>),
}

impl TypeSpec {
	pub fn generic<A: Into<TypeSpec>>(definition: &str, args: impl IntoIterator<Item = A>) -> TypeSpec {
		TypeSpec::Generic(definition.to_string(), args.into_iter().map(Into::into).collect())
	}
}

impl From<&str> for TypeSpec {
	fn from(value: &str) -> Self {
		TypeSpec::Name(value.to_string())
	}
}

impl From<String> for TypeSpec {
	fn from(value: String) -> Self {
		TypeSpec::Name(value)
	}
}

impl Display for TypeSpec {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			TypeSpec::Name(name) => f.write_str(name),
			TypeSpec::Generic(definition, args) => {
				write!(f, "{definition}[")?;
				for (i, arg) in args.iter().enumerate() {
					match i {
						0 => write!(f, "{arg}")?,
						_ => write!(f, ", {arg}")?,
					}
				}
				f.write_str("]")
			},
		}
	}
}

pub(crate) enum DeclarationKind {
	Internal {
		version: u32,
		serializer: Arc<dyn GraphSerializer>,
		rust_id: TypeId,
	},
	External {
		version: u32,
		serializer: Arc<dyn GraphSerializer>,
		rust_id: TypeId,
	},
	GenericDefinition {
		dispatch: Option<(u32, Arc<dyn GenericSerializerFactory>)>,
	},
	Interface {
		dispatch: Option<(u32, Arc<dyn GraphSerializer>)>,
	},
	Class {
		rust_id: Option<TypeId>,
	},
	Enum {
		underlying: Primitive,
	},
	Primitive(Primitive),
	Str,
	Object,
}

/// One declared type: its spec, the serializer attached to it, and the
/// optional base type and implemented interfaces.
pub struct TypeDeclaration {
	pub(crate) spec: TypeSpec,
	pub(crate) kind: DeclarationKind,
	pub(crate) base: Option<TypeSpec>,
	pub(crate) implements: Vec<TypeSpec>,
}

impl TypeDeclaration {
	/// Names the base type whose serializer backs [`write_base_archive`].
	///
	/// [`write_base_archive`]: crate::graph::archive::WriteArchive::write_base_archive
	pub fn base(&mut self, spec: impl Into<TypeSpec>) -> &mut Self {
		self.base = Some(spec.into());
		self
	}

	/// Declares an implemented interface. Order matters: interface dispatch
	/// picks the first declared interface that carries a serializer.
	pub fn implements(&mut self, spec: impl Into<TypeSpec>) -> &mut Self {
		self.implements.push(spec.into());
		self
	}
}

/// Collects the custom-serializer declarations of one assembly before the
/// registry indexes them. The Rust rendering of the original's build-time
/// assembly scan: declarations are contributed explicitly, then frozen on
/// first use.
pub struct AssemblyBuilder {
	pub(crate) name: AssemblyName,
	pub(crate) declarations: Vec<TypeDeclaration>,
}

impl AssemblyBuilder {
	pub fn new(name: AssemblyName) -> AssemblyBuilder {
		AssemblyBuilder { name, declarations: Vec::new() }
	}

	#[inline]
	pub fn name(&self) -> &AssemblyName {
		&self.name
	}

	fn declare(&mut self, spec: TypeSpec, kind: DeclarationKind) -> &mut TypeDeclaration {
		self.declarations.push(TypeDeclaration {
			spec,
			kind,
			base: None,
			implements: Vec::new(),
		});
		self.declarations.last_mut().unwrap()
	}

	/// Declares a type that serializes itself (max version ≥ 1).
	pub fn declare_internal<T: Serializable>(&mut self, spec: impl Into<TypeSpec>, max_version: u32) -> &mut TypeDeclaration {
		self.declare(spec.into(), DeclarationKind::Internal {
			version: max_version,
			serializer: Arc::new(InternalAdapter::<T>::default()),
			rust_id: TypeId::of::<T>(),
		})
	}

	/// Declares an external serializer for a target type.
	pub fn declare_external<T, S>(&mut self, spec: impl Into<TypeSpec>, max_version: u32, serializer: S) -> &mut TypeDeclaration
	where
		T: GraphObject,
		S: ExternalSerializer<T> + 'static,
	{
		self.declare(spec.into(), DeclarationKind::External {
			version: max_version,
			serializer: Arc::new(ExternalAdapter::<T, S>::new(serializer)),
			rust_id: TypeId::of::<T>(),
		})
	}

	/// Declares a generic type definition (name carries a `` `N `` arity
	/// suffix) served by a serializer factory instantiated per argument list.
	pub fn declare_generic(
		&mut self,
		name: &str,
		max_version: u32,
		factory: impl GenericSerializerFactory + 'static,
	) -> &mut TypeDeclaration {
		self.declare(name.into(), DeclarationKind::GenericDefinition {
			dispatch: Some((max_version, Arc::new(factory))),
		})
	}

	/// Declares a generic type definition without a factory of its own; its
	/// constructed instances carry their serializers individually.
	pub fn declare_definition(&mut self, name: &str) -> &mut TypeDeclaration {
		self.declare(name.into(), DeclarationKind::GenericDefinition { dispatch: None })
	}

	/// Declares a type without a serializer of its own; it dispatches through
	/// its implemented interfaces, if any carry one.
	pub fn declare_class<T: GraphObject>(&mut self, spec: impl Into<TypeSpec>) -> &mut TypeDeclaration {
		self.declare(spec.into(), DeclarationKind::Class {
			rust_id: Some(TypeId::of::<T>()),
		})
	}

	/// Declares an interface without a serializer of its own.
	pub fn declare_interface(&mut self, name: &str) -> &mut TypeDeclaration {
		self.declare(name.into(), DeclarationKind::Interface { dispatch: None })
	}

	/// Declares an interface served by a serializer; types listing it among
	/// their interfaces dispatch to it as a last resort.
	pub fn declare_interface_with(
		&mut self,
		name: &str,
		max_version: u32,
		serializer: Arc<dyn GraphSerializer>,
	) -> &mut TypeDeclaration {
		self.declare(name.into(), DeclarationKind::Interface {
			dispatch: Some((max_version, serializer)),
		})
	}

	/// Declares an enum with its underlying primitive.
	pub fn declare_enum(&mut self, name: &str, underlying: Primitive) -> &mut TypeDeclaration {
		self.declare(name.into(), DeclarationKind::Enum { underlying })
	}

	pub(crate) fn declare_primitive(&mut self, primitive: Primitive) {
		self.declare(primitive.name().into(), DeclarationKind::Primitive(primitive));
	}

	pub(crate) fn declare_str(&mut self, name: &str) {
		self.declare(name.into(), DeclarationKind::Str);
	}

	pub(crate) fn declare_object(&mut self, name: &str) {
		self.declare(name.into(), DeclarationKind::Object);
	}
}

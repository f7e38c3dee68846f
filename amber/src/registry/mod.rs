use std::any::TypeId;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use derivative::Derivative;
use fxhash::FxHashMap;
use nohash_hasher::BuildNoHashHasher;
use tracing::{debug, info, warn};

use crate::errors::{Result, SerializationError};
use crate::object::GraphObject;
use crate::registry::declaration::{DeclarationKind, TypeSpec};
use crate::schema::assembly::AssemblyName;
use crate::schema::ty::{Primitive, TypeHandle, TypeName};

pub(crate) mod builtins;
pub mod declaration;
pub mod serializers;

pub use declaration::{AssemblyBuilder, TypeDeclaration};
pub use serializers::{ExternalSerializer, GenericSerializerFactory, GraphSerializer, Serializable};

use serializers::GraphSerializer as DynSerializer;

pub(crate) enum EntryKind {
	Primitive(Primitive),
	Str,
	Object,
	Class,
	Interface,
	Enum(Primitive),
	GenericDefinition {
		arity: u32,
		dispatch: Option<(u32, Arc<dyn GenericSerializerFactory>)>,
	},
	GenericInstance {
		definition: TypeHandle,
		args: Box<[TypeHandle]>,
	},
	Array {
		element: TypeHandle,
		rank: u32,
	},
}

impl Debug for EntryKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			EntryKind::Primitive(p) => f.debug_tuple("Primitive").field(p).finish(),
			EntryKind::Str => f.write_str("Str"),
			EntryKind::Object => f.write_str("Object"),
			EntryKind::Class => f.write_str("Class"),
			EntryKind::Interface => f.write_str("Interface"),
			EntryKind::Enum(p) => f.debug_tuple("Enum").field(p).finish(),
			EntryKind::GenericDefinition { arity, .. } => f.debug_struct("GenericDefinition").field("arity", arity).finish(),
			EntryKind::GenericInstance { definition, args } => f
				.debug_struct("GenericInstance")
				.field("definition", definition)
				.field("args", args)
				.finish(),
			EntryKind::Array { element, rank } => f.debug_struct("Array").field("element", element).field("rank", rank).finish(),
		}
	}
}

pub(crate) enum Dispatch {
	Internal {
		version: u32,
		serializer: Arc<dyn DynSerializer>,
	},
	External {
		version: u32,
		serializer: Arc<dyn DynSerializer>,
	},
}

impl Dispatch {
	#[inline]
	pub fn version(&self) -> u32 {
		match self {
			Dispatch::Internal { version, .. } => *version,
			Dispatch::External { version, .. } => *version,
		}
	}

	#[inline]
	pub fn serializer(&self) -> &Arc<dyn DynSerializer> {
		match self {
			Dispatch::Internal { serializer, .. } => serializer,
			Dispatch::External { serializer, .. } => serializer,
		}
	}
}

impl Debug for Dispatch {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Dispatch::Internal { version, .. } => write!(f, "Internal(v{version})"),
			Dispatch::External { version, .. } => write!(f, "External(v{version})"),
		}
	}
}

#[derive(Debug)]
pub(crate) struct TypeEntry {
	pub name: TypeName,
	pub full_name: Arc<str>,
	pub kind: EntryKind,
	pub dispatch: Option<Dispatch>,
	pub interfaces: Vec<TypeHandle>,
	pub base: Option<TypeHandle>,
}

pub(crate) struct AssemblyEntry {
	pub name: AssemblyName,
	pub types: FxHashMap<Arc<str>, TypeHandle>,
}

struct Tables {
	types: Vec<Arc<TypeEntry>>,
	instances: FxHashMap<(TypeHandle, Box<[TypeHandle]>), TypeHandle>,
	arrays: FxHashMap<(TypeHandle, u32), TypeHandle>,
}

pub(crate) struct KnownHandles {
	pub primitives: [TypeHandle; Primitive::ALL.len()],
	pub string: TypeHandle,
	pub object: TypeHandle,
	pub map_definition: TypeHandle,
	pub list_definition: TypeHandle,
}

/// The process-wide index of declared assemblies, types and serializers.
///
/// Built at most once per instance from a set of [`AssemblyBuilder`]s (the
/// built-in runtime assembly is always prepended), read-only afterwards apart
/// from the interning tables and caches, which are safe under concurrent
/// readers.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Registry {
	#[derivative(Debug(format_with = "Registry::fmt_assemblies"))]
	assemblies: Box<[AssemblyEntry]>,
	#[derivative(Debug = "ignore")]
	rust_ids: FxHashMap<TypeId, TypeHandle>,
	#[derivative(Debug = "ignore")]
	by_full_name: FxHashMap<Arc<str>, Vec<TypeHandle>>,
	#[derivative(Debug = "ignore")]
	known: KnownHandles,
	#[derivative(Debug(format_with = "Registry::fmt_tables"))]
	tables: RwLock<Tables>,
	#[derivative(Debug = "ignore")]
	resolution_cache: RwLock<FxHashMap<(AssemblyName, Arc<str>), TypeHandle>>,
	#[derivative(Debug = "ignore")]
	instantiated: RwLock<HashMap<TypeHandle, Arc<dyn DynSerializer>, BuildNoHashHasher<TypeHandle>>>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();

impl Registry {
	/// Indexes the given assembly declarations into a fresh registry.
	/// Defective declarations are recoverable: they are logged and skipped.
	#[tracing::instrument(skip_all)]
	pub fn build(assemblies: Vec<AssemblyBuilder>) -> Arc<Registry> {
		let mut builders = vec![builtins::runtime_assembly()];
		builders.extend(assemblies);

		let mut tables = Tables {
			types: Vec::new(),
			instances: FxHashMap::default(),
			arrays: FxHashMap::default(),
		};
		let mut assembly_entries = Vec::with_capacity(builders.len());
		let mut rust_ids = FxHashMap::default();
		let mut by_full_name: FxHashMap<Arc<str>, Vec<TypeHandle>> = FxHashMap::default();
		let mut handles: Vec<Vec<Option<TypeHandle>>> = Vec::with_capacity(builders.len());
		let mut deferred = Vec::new();

		for (ai, builder) in builders.iter().enumerate() {
			let mut types = FxHashMap::default();
			let mut declared = vec![None; builder.declarations.len()];

			for (di, declaration) in builder.declarations.iter().enumerate() {
				let TypeSpec::Name(name) = &declaration.spec else {
					deferred.push((ai, di));
					continue;
				};

				if let Some(version) = declared_version(&declaration.kind) {
					if version < 1 {
						warn!(assembly = %builder.name, ty = %name, "Skipping declaration with version < 1");
						continue;
					}
				}

				let name: Arc<str> = Arc::from(name.as_str());
				if types.contains_key(&name) {
					warn!(assembly = %builder.name, ty = %name, "Skipping duplicate type declaration");
					continue;
				}

				let (kind, dispatch) = match &declaration.kind {
					DeclarationKind::Internal { version, serializer, .. } => (
						EntryKind::Class,
						Some(Dispatch::Internal { version: *version, serializer: serializer.clone() }),
					),
					DeclarationKind::External { version, serializer, .. } => (
						EntryKind::Class,
						Some(Dispatch::External { version: *version, serializer: serializer.clone() }),
					),
					DeclarationKind::GenericDefinition { dispatch } => {
						let arity = match TypeName::parse_arity(&name) {
							Ok(arity) => arity,
							Err(err) => {
								warn!(assembly = %builder.name, ty = %name, %err, "Skipping malformed generic definition");
								continue;
							},
						};
						(
							EntryKind::GenericDefinition {
								arity,
								dispatch: dispatch.clone(),
							},
							None,
						)
					},
					DeclarationKind::Interface { dispatch } => (
						EntryKind::Interface,
						dispatch
							.as_ref()
							.map(|(version, serializer)| Dispatch::External { version: *version, serializer: serializer.clone() }),
					),
					DeclarationKind::Class { .. } => (EntryKind::Class, None),
					DeclarationKind::Enum { underlying } => (EntryKind::Enum(*underlying), None),
					DeclarationKind::Primitive(primitive) => (EntryKind::Primitive(*primitive), None),
					DeclarationKind::Str => (EntryKind::Str, None),
					DeclarationKind::Object => (EntryKind::Object, None),
				};

				let type_name = match &kind {
					EntryKind::GenericDefinition { arity, .. } => TypeName::GenericDefinition {
						assembly: builder.name.clone(),
						name: name.clone(),
						arity: *arity,
					},
					_ => TypeName::Named {
						assembly: builder.name.clone(),
						name: name.clone(),
					},
				};

				let handle = TypeHandle(tables.types.len() as u32);
				tables.types.push(Arc::new(TypeEntry {
					name: type_name,
					full_name: name.clone(),
					kind,
					dispatch,
					interfaces: Vec::new(),
					base: None,
				}));

				types.insert(name.clone(), handle);
				by_full_name.entry(name.clone()).or_default().push(handle);
				if let Some(rust_id) = declared_rust_id(&declaration.kind) {
					if rust_ids.insert(rust_id, handle).is_some() {
						warn!(assembly = %builder.name, ty = %name, "A Rust type was declared more than once; the last declaration wins");
					}
				}
				declared[di] = Some(handle);
			}

			assembly_entries.push(AssemblyEntry { name: builder.name.clone(), types });
			handles.push(declared);
		}

		// Constructed generic declarations resolve after every named type
		// exists, so arguments may live in any assembly.
		for (ai, di) in deferred {
			let builder = &builders[ai];
			let declaration = &builder.declarations[di];
			let handle = match resolve_spec(&mut tables, &by_full_name, &declaration.spec) {
				Ok(handle) => handle,
				Err(err) => {
					warn!(assembly = %builder.name, ty = %declaration.spec, %err, "Skipping unresolvable declaration");
					continue;
				},
			};

			let dispatch = match &declaration.kind {
				DeclarationKind::Internal { version, serializer, .. } => {
					Dispatch::Internal { version: *version, serializer: serializer.clone() }
				},
				DeclarationKind::External { version, serializer, .. } => {
					Dispatch::External { version: *version, serializer: serializer.clone() }
				},
				_ => {
					warn!(assembly = %builder.name, ty = %declaration.spec, "Constructed generics only accept internal or external serializers");
					continue;
				},
			};

			let entry = Arc::get_mut(&mut tables.types[handle.index()]).unwrap();
			if entry.dispatch.is_some() {
				warn!(assembly = %builder.name, ty = %declaration.spec, "Skipping duplicate constructed generic declaration");
				continue;
			}
			entry.dispatch = Some(dispatch);
			if let Some(rust_id) = declared_rust_id(&declaration.kind) {
				rust_ids.insert(rust_id, handle);
			}
			handles[ai][di] = Some(handle);
		}

		// Bases and implemented interfaces, now that every handle exists.
		for (ai, builder) in builders.iter().enumerate() {
			for (di, declaration) in builder.declarations.iter().enumerate() {
				let Some(handle) = handles[ai][di] else { continue };

				let base = match &declaration.base {
					None => None,
					Some(spec) => match resolve_spec(&mut tables, &by_full_name, spec) {
						Ok(base) => Some(base),
						Err(err) => {
							warn!(assembly = %builder.name, ty = %declaration.spec, %err, "Dropping unresolvable base type");
							None
						},
					},
				};

				let mut interfaces = Vec::with_capacity(declaration.implements.len());
				for spec in &declaration.implements {
					match resolve_spec(&mut tables, &by_full_name, spec) {
						Ok(interface) => interfaces.push(interface),
						Err(err) => {
							warn!(assembly = %builder.name, ty = %declaration.spec, %err, "Dropping unresolvable interface");
						},
					}
				}

				if base.is_some() || !interfaces.is_empty() {
					let entry = Arc::get_mut(&mut tables.types[handle.index()]).unwrap();
					entry.base = base;
					entry.interfaces = interfaces;
				}
			}
		}

		let known = KnownHandles {
			primitives: Primitive::ALL.map(|p| assembly_entries[0].types[p.name()]),
			string: assembly_entries[0].types[builtins::STRING_TYPE],
			object: assembly_entries[0].types[builtins::OBJECT_TYPE],
			map_definition: assembly_entries[0].types[builtins::MAP_DEFINITION],
			list_definition: assembly_entries[0].types[builtins::LIST_DEFINITION],
		};

		info!(
			assemblies = assembly_entries.len(),
			types = tables.types.len(),
			"Serializer registry initialized"
		);

		Arc::new(Registry {
			assemblies: assembly_entries.into_boxed_slice(),
			rust_ids,
			by_full_name,
			known,
			tables: RwLock::new(tables),
			resolution_cache: RwLock::new(FxHashMap::default()),
			instantiated: RwLock::new(HashMap::default()),
		})
	}

	/// Installs the process-wide registry. The first caller wins; concurrent
	/// first callers block until the build completes.
	pub fn install(assemblies: Vec<AssemblyBuilder>) -> Arc<Registry> {
		if let Some(existing) = GLOBAL_REGISTRY.get() {
			warn!("The global serializer registry is already installed");
			return existing.clone();
		}
		GLOBAL_REGISTRY.get_or_init(|| Registry::build(assemblies)).clone()
	}

	pub fn global() -> Option<Arc<Registry>> {
		GLOBAL_REGISTRY.get().cloned()
	}

	pub(crate) fn entry(&self, handle: TypeHandle) -> Arc<TypeEntry> {
		let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
		tables.types[handle.index()].clone()
	}

	pub(crate) fn assemblies(&self) -> &[AssemblyEntry] {
		&self.assemblies
	}

	#[inline]
	pub fn primitive(&self, primitive: Primitive) -> TypeHandle {
		self.known.primitives[primitive.index()]
	}

	#[inline]
	pub fn string_type(&self) -> TypeHandle {
		self.known.string
	}

	#[inline]
	pub fn object_type(&self) -> TypeHandle {
		self.known.object
	}

	#[inline]
	pub fn map_definition(&self) -> TypeHandle {
		self.known.map_definition
	}

	#[inline]
	pub fn list_definition(&self) -> TypeHandle {
		self.known.list_definition
	}

	/// The first registered type with this fully qualified name, across
	/// assemblies in registration order.
	pub fn type_by_name(&self, full_name: &str) -> Option<TypeHandle> {
		self.by_full_name.get(full_name).and_then(|handles| handles.first()).copied()
	}

	pub fn handle_of<T: GraphObject>(&self) -> Option<TypeHandle> {
		self.rust_ids.get(&TypeId::of::<T>()).copied()
	}

	/// Renders a handle's fully qualified display name.
	pub fn display_of(&self, handle: TypeHandle) -> String {
		self.entry(handle).full_name.to_string()
	}

	pub(crate) fn cached_resolution(&self, assembly: &AssemblyName, name: &str) -> Option<TypeHandle> {
		let cache = self.resolution_cache.read().unwrap_or_else(PoisonError::into_inner);
		cache.get(&(assembly.clone(), Arc::from(name))).copied()
	}

	pub(crate) fn cache_resolution(&self, assembly: AssemblyName, name: Arc<str>, handle: TypeHandle) {
		let mut cache = self.resolution_cache.write().unwrap_or_else(PoisonError::into_inner);
		cache.insert((assembly, name), handle);
	}

	/// Interns the array type over the given element and rank.
	pub fn array_of(&self, element: TypeHandle, rank: u32) -> TypeHandle {
		let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
		intern_array(&mut tables, element, rank)
	}

	/// Interns the constructed generic over the given definition and argument
	/// list. Fails when the definition handle is not a generic definition or
	/// the argument count does not match its arity.
	pub fn instance_of(&self, definition: TypeHandle, args: &[TypeHandle]) -> Result<TypeHandle> {
		let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
		intern_instance(&mut tables, definition, args)
	}

	/// The runtime type of a graph object: self-reported when the object is a
	/// dynamically constructed generic, otherwise looked up by Rust type
	/// identity.
	pub(crate) fn runtime_type_of(&self, value: &Rc<dyn GraphObject>) -> Result<TypeHandle> {
		if let Some(handle) = value.runtime_type() {
			return Ok(handle);
		}
		let rust_id = value.as_any().type_id();
		self.rust_ids
			.get(&rust_id)
			.copied()
			.ok_or_else(|| SerializationError::NoSerializerFor(value.type_name().to_string()))
	}

	/// Finds the serializer and declared max version for a type: exact
	/// declaration first, then the generic definition instantiated on demand,
	/// then the implemented interfaces in declaration order.
	pub(crate) fn serializer_for(&self, handle: TypeHandle) -> Result<(Arc<dyn DynSerializer>, u32)> {
		let entry = self.entry(handle);
		if let Some(dispatch) = &entry.dispatch {
			return Ok((dispatch.serializer().clone(), dispatch.version()));
		}

		if let EntryKind::GenericInstance { definition, ref args } = entry.kind {
			let def_entry = self.entry(definition);
			if let EntryKind::GenericDefinition { dispatch: Some((version, ref factory)), .. } = def_entry.kind {
				{
					let cache = self.instantiated.read().unwrap_or_else(PoisonError::into_inner);
					if let Some(serializer) = cache.get(&handle) {
						return Ok((serializer.clone(), version));
					}
				}
				let serializer = factory.instantiate(args, self)?;
				let mut cache = self.instantiated.write().unwrap_or_else(PoisonError::into_inner);
				let serializer = cache.entry(handle).or_insert(serializer).clone();
				debug!(ty = %entry.full_name, "Instantiated generic serializer");
				return Ok((serializer, version));
			}
			if let Some(found) = self.interface_dispatch(&def_entry) {
				return Ok(found);
			}
		}

		if let Some(found) = self.interface_dispatch(&entry) {
			return Ok(found);
		}

		Err(SerializationError::NoSerializerFor(entry.full_name.to_string()))
	}

	fn interface_dispatch(&self, entry: &TypeEntry) -> Option<(Arc<dyn DynSerializer>, u32)> {
		for &interface in &entry.interfaces {
			let interface_entry = self.entry(interface);
			if let Some(dispatch) = &interface_entry.dispatch {
				return Some((dispatch.serializer().clone(), dispatch.version()));
			}
		}
		None
	}

	fn fmt_assemblies(assemblies: &Box<[AssemblyEntry]>, fmt: &mut Formatter) -> std::fmt::Result {
		let mut dbg = fmt.debug_list();
		for assembly in assemblies.iter() {
			dbg.entry(&format_args!("{} ({} types)", assembly.name, assembly.types.len()));
		}
		dbg.finish()
	}

	fn fmt_tables(tables: &RwLock<Tables>, fmt: &mut Formatter) -> std::fmt::Result {
		let tables = tables.read().unwrap_or_else(PoisonError::into_inner);
		write!(fmt, "[{} types]", tables.types.len())
	}
}

fn declared_version(kind: &DeclarationKind) -> Option<u32> {
	match kind {
		DeclarationKind::Internal { version, .. } => Some(*version),
		DeclarationKind::External { version, .. } => Some(*version),
		DeclarationKind::GenericDefinition { dispatch } => dispatch.as_ref().map(|(version, _)| *version),
		DeclarationKind::Interface { dispatch } => dispatch.as_ref().map(|(version, _)| *version),
		_ => None,
	}
}

fn declared_rust_id(kind: &DeclarationKind) -> Option<TypeId> {
	match kind {
		DeclarationKind::Internal { rust_id, .. } => Some(*rust_id),
		DeclarationKind::External { rust_id, .. } => Some(*rust_id),
		DeclarationKind::Class { rust_id } => *rust_id,
		_ => None,
	}
}

fn resolve_spec(
	tables: &mut Tables,
	by_full_name: &FxHashMap<Arc<str>, Vec<TypeHandle>>,
	spec: &TypeSpec,
) -> Result<TypeHandle> {
	match spec {
		TypeSpec::Name(name) => by_full_name
			.get(name.as_str())
			.and_then(|handles| handles.first())
			.copied()
			.ok_or_else(|| SerializationError::TypeNotFound(name.clone())),
		TypeSpec::Generic(definition, args) => {
			let definition = by_full_name
				.get(definition.as_str())
				.and_then(|handles| handles.first())
				.copied()
				.ok_or_else(|| SerializationError::TypeNotFound(definition.clone()))?;
			let args = args
				.iter()
				.map(|arg| resolve_spec(tables, by_full_name, arg))
				.collect::<Result<Vec<_>>>()?;
			intern_instance(tables, definition, &args)
		},
	}
}

fn intern_array(tables: &mut Tables, element: TypeHandle, rank: u32) -> TypeHandle {
	if let Some(&handle) = tables.arrays.get(&(element, rank)) {
		return handle;
	}

	let name = TypeName::Array {
		element: Box::new(tables.types[element.index()].name.clone()),
		rank,
	};
	let handle = TypeHandle(tables.types.len() as u32);
	tables.types.push(Arc::new(TypeEntry {
		full_name: Arc::from(name.to_string()),
		name,
		kind: EntryKind::Array { element, rank },
		dispatch: None,
		interfaces: Vec::new(),
		base: None,
	}));
	tables.arrays.insert((element, rank), handle);
	handle
}

fn intern_instance(tables: &mut Tables, definition: TypeHandle, args: &[TypeHandle]) -> Result<TypeHandle> {
	let def_entry = &tables.types[definition.index()];
	let EntryKind::GenericDefinition { arity, .. } = def_entry.kind else {
		return Err(SerializationError::MalformedTypeName(def_entry.full_name.to_string()));
	};
	if arity as usize != args.len() {
		return Err(SerializationError::MalformedTypeName(def_entry.full_name.to_string()));
	}

	let key = (definition, Box::from(args));
	if let Some(&handle) = tables.instances.get(&key) {
		return Ok(handle);
	}

	let name = TypeName::GenericInstance {
		definition: Box::new(def_entry.name.clone()),
		args: args.iter().map(|arg| tables.types[arg.index()].name.clone()).collect(),
	};
	let handle = TypeHandle(tables.types.len() as u32);
	tables.types.push(Arc::new(TypeEntry {
		full_name: Arc::from(name.to_string()),
		name,
		kind: EntryKind::GenericInstance {
			definition,
			args: Box::from(args),
		},
		dispatch: None,
		interfaces: Vec::new(),
		base: None,
	}));
	tables.instances.insert(key, handle);
	Ok(handle)
}

mod common;

use std::any::Any;
use std::io::Cursor;
use std::rc::Rc;

use amber::{Serializer, SerializationError, SerializerOptions, Value};

use common::{demo_registry, Circle, GreedyCircle, Line, Node, Point, ShapeBase};

fn round_trip(serializer: &Serializer, value: &Value) -> Value {
	let mut stream = Vec::new();
	serializer.serialize(value, &mut stream).unwrap();

	let mut cursor = Cursor::new(stream.as_slice());
	let result = serializer.deserialize(&mut cursor).unwrap();
	assert_eq!(cursor.position() as usize, stream.len());
	result
}

#[test]
fn shared_references_are_reconstructed_once() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let shared = Value::object(Point { x: 5, y: 6 });
	let line = Value::object(Line {
		start: shared.clone(),
		end: shared,
	});

	let copied = round_trip(&serializer, &line);
	let copied = copied.as_object::<Line>().unwrap();
	assert_eq!(copied.start, copied.end, "identical input references must stay identical");

	let point = copied.start.as_object::<Point>().unwrap();
	assert_eq!((point.x, point.y), (5, 6));
}

#[test]
fn self_referencing_arrays_round_trip() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let array = amber::Array::vector(registry.object_type(), 1);
	array.set(0, Value::Array(array.clone()));

	let copied = round_trip(&serializer, &Value::Array(array));
	let Value::Array(copied) = copied else { panic!("expected an array") };

	assert_eq!(copied.len(), 1);
	let Value::Array(inner) = copied.get(0) else { panic!("expected the array itself") };
	assert!(Rc::ptr_eq(&copied, &inner), "a[0] must be a itself after the round trip");
}

#[test]
fn cycles_through_custom_serializers_are_rejected() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let n0 = Node::new("n0");
	let n1 = Node::new("n1");
	let n2 = Node::new("n2");
	*n0.next.borrow_mut() = Value::Object(n1.clone());
	*n1.next.borrow_mut() = Value::Object(n2.clone());
	*n2.next.borrow_mut() = Value::Object(n0.clone());

	let mut stream = Vec::new();
	let result = serializer.serialize(&Value::Object(n0), &mut stream);
	assert!(
		matches!(result, Err(SerializationError::CyclicDependency(_))),
		"got {result:?}"
	);
}

#[test]
fn acyclic_node_chains_round_trip() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let head = Node::new("head");
	let tail = Node::new("tail");
	*head.next.borrow_mut() = Value::Object(tail);

	let copied = round_trip(&serializer, &Value::Object(head));
	let head = copied.as_object::<Node>().unwrap();
	assert_eq!(head.name, "head");
	let next = head.next.borrow().clone();
	let tail = next.as_object::<Node>().unwrap();
	assert_eq!(tail.name, "tail");
	assert!(tail.next.borrow().is_null());
}

#[test]
fn base_archives_chain_through_the_declared_base() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let circle = Value::object(Circle {
		base: ShapeBase { id: 41 },
		radius: 2.5,
	});

	let copied = round_trip(&serializer, &circle);
	let copied = copied.as_object::<Circle>().unwrap();
	assert_eq!(copied.base.id, 41);
	assert_eq!(copied.radius, 2.5);
}

#[test]
fn writing_the_base_archive_twice_fails() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let greedy = Value::object(GreedyCircle { base: ShapeBase { id: 1 } });
	let mut stream = Vec::new();
	let result = serializer.serialize(&greedy, &mut stream);
	assert!(
		matches!(result, Err(SerializationError::InvalidArchiveState(_))),
		"got {result:?}"
	);
}

#[test]
fn context_is_visible_to_serializers() {
	struct Probe {
		seen: std::cell::Cell<bool>,
	}

	struct ContextUser;
	amber::impl_graph_object!(ContextUser);

	impl amber::Serializable for ContextUser {
		fn serialize(&self, archive: &mut amber::WriteArchive<'_, '_>) -> amber::Result<()> {
			let context = archive.context().expect("context must be present");
			let probe = context.downcast_ref::<Probe>().expect("context type");
			probe.seen.set(true);
			archive.write_bool(true)
		}

		fn deserialize(archive: &mut amber::ReadArchive<'_, '_>) -> amber::Result<Self> {
			archive.read_bool()?;
			Ok(ContextUser)
		}
	}

	let mut assembly = amber::AssemblyBuilder::new(amber::AssemblyName::new(
		"ctx",
		amber::AssemblyVersion::new(1, 0, 0, 0),
	));
	assembly.declare_internal::<ContextUser>("ctx.ContextUser", 1);
	let registry = amber::Registry::build(vec![assembly]);

	let probe: Rc<dyn Any> = Rc::new(Probe {
		seen: std::cell::Cell::new(false),
	});
	let serializer = Serializer::with_options(registry, SerializerOptions {
		context: Some(probe.clone()),
		..SerializerOptions::default()
	});

	let mut stream = Vec::new();
	serializer.serialize(&Value::object(ContextUser), &mut stream).unwrap();
	assert!(probe.downcast_ref::<Probe>().unwrap().seen.get());

	serializer.deserialize(&mut stream.as_slice()).unwrap();
}

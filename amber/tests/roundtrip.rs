mod common;

use std::io::Cursor;
use std::sync::Arc;

use amber::{
	Date, DateTime, DateTimeKind, DateTimeOffset, Decimal, Dictionary, EnumValue, Optimization, Primitive, Serializer,
	SerializerOptions, Time, Value,
};
use uuid::Uuid;

use common::{demo_registry, Blob, Chunky, Point};

fn serializer(optimization: Optimization) -> Serializer {
	Serializer::with_options(demo_registry(), SerializerOptions {
		optimization,
		..SerializerOptions::default()
	})
}

fn round_trip(serializer: &Serializer, value: &Value) -> Value {
	let mut stream = Vec::new();
	serializer.serialize(value, &mut stream).unwrap();

	// A well-formed stream is consumed exactly to the end of the root object.
	let mut cursor = Cursor::new(stream.as_slice());
	let result = serializer.deserialize(&mut cursor).unwrap();
	assert_eq!(cursor.position() as usize, stream.len());
	result
}

#[test]
fn primitives_survive_both_modes() {
	let values = [
		Value::Null,
		Value::Bool(true),
		Value::Bool(false),
		Value::Char('ф'),
		Value::Char('🦀'),
		Value::Int8(-12),
		Value::UInt8(250),
		Value::Int16(-30000),
		Value::UInt16(65000),
		Value::Int32(0x1FFF),
		Value::Int32(i32::MIN),
		Value::UInt32(u32::MAX),
		Value::Int64(i64::MIN),
		Value::UInt64(u64::MAX),
		Value::Float32(std::f32::consts::PI),
		Value::Float64(-std::f64::consts::E),
		Value::Decimal(Decimal::from_parts(1234, 5678, 0, true, 6)),
		Value::DateTime(DateTime::new(638_000_000_000_000_000, DateTimeKind::Utc)),
		Value::DateTimeOffset(DateTimeOffset::new(638_000_000_000_000_000, -90)),
		Value::Date(Date::new(739_000)),
		Value::Time(Time::new(429_000_000_000)),
		Value::Guid(Uuid::from_bytes([7; 16])),
		Value::from("amber"),
	];

	for optimization in [Optimization::Size, Optimization::Speed] {
		let serializer = serializer(optimization);
		for value in &values {
			assert_eq!(&round_trip(&serializer, value), value, "{value:?} in {optimization:?} mode");
		}
	}
}

#[test]
fn size_mode_packs_small_integers() {
	let serializer = serializer(Optimization::Size);
	let mut stream = Vec::new();
	serializer.serialize(&Value::Int32(0x1FFF), &mut stream).unwrap();

	// Header (magic + mode), Int32 token, then exactly two LEB128 bytes.
	assert_eq!(stream.len(), 5);
	assert_eq!(&stream[3..], &[0xFF, 0x3F][..]);
	assert_eq!(round_trip(&serializer, &Value::Int32(0x1FFF)), Value::Int32(0x1FFF));
}

#[test]
fn speed_mode_uses_native_widths() {
	let serializer = serializer(Optimization::Speed);
	let mut stream = Vec::new();
	serializer.serialize(&Value::Int32(0x1FFF), &mut stream).unwrap();

	assert_eq!(stream.len(), 7);
	assert_eq!(&stream[3..], &0x1FFFi32.to_le_bytes()[..]);
}

#[test]
fn custom_object_round_trips() {
	let serializer = serializer(Optimization::Size);
	let point = Value::object(Point { x: -3, y: 44 });

	let copied = round_trip(&serializer, &point);
	let copied = copied.as_object::<Point>().unwrap();
	assert_eq!((copied.x, copied.y), (-3, 44));
}

#[test]
fn deep_copy_detaches_the_graph() {
	let serializer = serializer(Optimization::Speed);
	let original = Value::object(Point { x: 1, y: 2 });

	let copied = serializer.copy(&original).unwrap();
	assert!(copied.as_object::<Point>().is_some());
	assert_ne!(copied, original, "a deep copy must not alias the source");
}

#[test]
fn dictionary_round_trips() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let char_type = registry.primitive(Primitive::Char);
	let string_type = registry.string_type();
	let map = Dictionary::new(&registry, char_type, string_type).unwrap();
	map.insert(Value::Char('0'), Value::from("Value 0"));
	map.insert(Value::Char('1'), Value::from("Value 1"));

	let copied = round_trip(&serializer, &Value::Object(map.clone()));
	let copied = copied.as_object::<Dictionary>().unwrap();
	assert_eq!(copied.len(), 2);
	assert_eq!(copied.get(&Value::Char('0')), Some(Value::from("Value 0")));
	assert_eq!(copied.get(&Value::Char('1')), Some(Value::from("Value 1")));
	assert_eq!(copied.key_type(), char_type);
	assert_eq!(copied.value_type(), string_type);
}

#[test]
fn list_round_trips() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let list = amber::List::new(&registry, registry.primitive(Primitive::Int32)).unwrap();
	list.push(Value::Int32(10));
	list.push(Value::Int32(20));

	let copied = round_trip(&serializer, &Value::Object(list));
	let copied = copied.as_object::<amber::List>().unwrap();
	assert_eq!(copied.items(), vec![Value::Int32(10), Value::Int32(20)]);
}

#[test]
fn packed_primitive_vector() {
	let registry = demo_registry();
	let serializer = Serializer::with_options(registry.clone(), SerializerOptions {
		optimization: Optimization::Size,
		..SerializerOptions::default()
	});

	let array = amber::Array::from_values(
		registry.primitive(Primitive::Int32),
		(0..64).map(Value::Int32).collect(),
	);
	let value = Value::Array(array);

	let mut stream = Vec::new();
	serializer.serialize(&value, &mut stream).unwrap();

	let copied = round_trip(&serializer, &value);
	let Value::Array(copied) = copied else { panic!("expected an array") };
	assert_eq!(copied.len(), 64);
	for i in 0..64 {
		assert_eq!(copied.get(i), Value::Int32(i as i32));
	}

	// Packed payloads carry no per-element tokens: 64 one-byte LEB values
	// must stay well under one byte of overhead per element.
	assert!(stream.len() < 64 * 2, "stream was {} bytes", stream.len());
}

#[test]
fn multi_dimensional_arrays_keep_their_shape() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let array = amber::Array::multi_dim(registry.object_type(), &[1, -2], &[2, 3]);
	let shared = Value::object(Point { x: 9, y: 9 });
	array.set_at(&[1, -2], shared.clone());
	array.set_at(&[2, 0], shared.clone());
	array.set_at(&[1, 0], Value::from("corner"));

	let copied = round_trip(&serializer, &Value::Array(array));
	let Value::Array(copied) = copied else { panic!("expected an array") };

	assert_eq!(copied.rank(), 2);
	assert_eq!(copied.lower_bounds(), &[1, -2]);
	assert_eq!(copied.lengths(), &[2, 3]);
	assert_eq!(copied.get_at(&[1, 0]).unwrap(), Value::from("corner"));

	// Reference elements keep their identity.
	let first = copied.get_at(&[1, -2]).unwrap();
	let second = copied.get_at(&[2, 0]).unwrap();
	assert_eq!(first, second);
	assert!(first.as_object::<Point>().is_some());
}

#[test]
fn enums_round_trip() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let color = registry.type_by_name("demo.Color").unwrap();
	let value = Value::Enum(EnumValue::new(color, 2));
	assert_eq!(round_trip(&serializer, &value), value);
}

#[test]
fn type_values_round_trip() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let point = registry.type_by_name("demo.Point").unwrap();
	assert_eq!(round_trip(&serializer, &Value::Type(point)), Value::Type(point));
}

#[test]
fn buffers_round_trip() {
	let serializer = serializer(Optimization::Speed);
	let blob = Value::object(Blob {
		data: (0..100u8).collect(),
		tail: 7,
	});

	let copied = round_trip(&serializer, &blob);
	let copied = copied.as_object::<Blob>().unwrap();
	assert_eq!(copied.data, (0..100u8).collect::<Vec<_>>());
	assert_eq!(copied.tail, 7);
}

#[test]
fn abandoned_buffer_views_are_skipped() {
	let serializer = serializer(Optimization::Speed);
	let chunky = Value::object(Chunky {
		head: vec![1, 2, 3, 4, 5, 6, 7, 8],
		tail: 99,
	});

	let copied = round_trip(&serializer, &chunky);
	let copied = copied.as_object::<Chunky>().unwrap();
	assert_eq!(copied.head, vec![1, 2, 3]);
	assert_eq!(copied.tail, 99);
}

#[test]
fn strings_deduplicate_by_content() {
	let registry = demo_registry();
	let serializer = Serializer::new(registry.clone());

	let duplicated = amber::Array::from_values(registry.string_type(), vec![
		Value::from("repeated payload"),
		Value::from("repeated payload"),
	]);
	let distinct = amber::Array::from_values(registry.string_type(), vec![
		Value::from("repeated payload"),
		Value::from("distinct payload"),
	]);

	let mut duplicated_stream = Vec::new();
	serializer.serialize(&Value::Array(duplicated), &mut duplicated_stream).unwrap();
	let mut distinct_stream = Vec::new();
	serializer.serialize(&Value::Array(distinct), &mut distinct_stream).unwrap();

	assert!(
		duplicated_stream.len() < distinct_stream.len(),
		"the second sighting must shrink to a back-reference ({} vs {} bytes)",
		duplicated_stream.len(),
		distinct_stream.len()
	);

	let copied = serializer.deserialize(&mut duplicated_stream.as_slice()).unwrap();
	let Value::Array(copied) = copied else { panic!("expected an array") };
	let (Value::Str(first), Value::Str(second)) = (copied.get(0), copied.get(1)) else {
		panic!("expected strings");
	};
	assert!(Arc::ptr_eq(&first, &second), "back-references reconstruct the same string");
}

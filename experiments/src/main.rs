use std::fs::File;
use std::io::BufWriter;
use std::time::SystemTime;

use memory_stats::memory_stats;
use tracing_flame::FlameLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry as SubscriberRegistry;

use amber::{
	impl_graph_object, AssemblyBuilder, AssemblyName, AssemblyVersion, Dictionary, Primitive, ReadArchive, Registry,
	Result, Serializable, Serializer, SerializerOptions, Optimization, Value, WriteArchive,
};

fn setup_global_subscriber() -> impl Drop {
	let file = File::create("./trace.folded").unwrap();
	let flame_layer = FlameLayer::new(BufWriter::new(file)).with_file_and_line(false);
	let guard = flame_layer.flush_on_drop();

	let subscriber = SubscriberRegistry::default()
		.with(flame_layer);

	tracing::subscriber::set_global_default(subscriber).expect("Could not set global default");
	guard
}

struct Measurement {
	sensor: i32,
	reading: f64,
	label: String,
}

impl_graph_object!(Measurement);

impl Serializable for Measurement {
	fn serialize(&self, archive: &mut WriteArchive<'_, '_>) -> Result<()> {
		archive.write_i32(self.sensor)?;
		archive.write_f64(self.reading)?;
		archive.write_str(&self.label)
	}

	fn deserialize(archive: &mut ReadArchive<'_, '_>) -> Result<Self> {
		Ok(Measurement {
			sensor: archive.read_i32()?,
			reading: archive.read_f64()?,
			label: archive.read_str()?.to_string(),
		})
	}
}

fn main() {
	let _guard = setup_global_subscriber();

	let mut start = SystemTime::now();
	let mut assembly = AssemblyBuilder::new(AssemblyName::new("experiments", AssemblyVersion::new(1, 0, 0, 0)));
	assembly.declare_internal::<Measurement>("experiments.Measurement", 1);
	let registry = Registry::build(vec![assembly]);

	println! {
		"Registry build time: {:?}, RAM: {}MB",
		start.elapsed().unwrap(),
		memory_stats().unwrap().virtual_mem as f32 / 1000000.0,
	}

	start = SystemTime::now();

	let i32_type = registry.primitive(Primitive::Int32);
	let string_type = registry.string_type();
	let samples = Dictionary::new(&registry, i32_type, string_type).unwrap();
	let mut graph = Vec::new();
	for sensor in 0..2_000 {
		samples.insert(Value::Int32(sensor), Value::from(format!("sensor #{sensor}")));
		graph.push(Value::object(Measurement {
			sensor,
			reading: sensor as f64 * 0.25,
			label: format!("reading #{sensor}"),
		}));
	}
	graph.push(Value::Object(samples));
	let root = Value::Array(amber::Array::from_values(registry.object_type(), graph));

	for optimization in [Optimization::Size, Optimization::Speed] {
		let serializer = Serializer::with_options(registry.clone(), SerializerOptions {
			optimization,
			..SerializerOptions::default()
		});

		start = SystemTime::now();
		let mut stream = Vec::new();
		serializer.serialize(&root, &mut stream).unwrap();
		let write_time = start.elapsed().unwrap();

		start = SystemTime::now();
		let _copy = serializer.deserialize(&mut stream.as_slice()).unwrap();
		let read_time = start.elapsed().unwrap();

		println! {
			"{optimization:?}: {} bytes, write {write_time:?}, read {read_time:?}, RAM: {}MB",
			stream.len(),
			memory_stats().unwrap().virtual_mem as f32 / 1000000.0,
		}
	}
}

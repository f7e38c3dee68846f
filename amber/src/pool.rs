use std::io::{Read, Write};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::errors::Result;
use crate::graph::{ScratchState, Serializer};
use crate::object::Value;

/// Reuses serializer-state bundles (identity tables, scratch buffers) across
/// passes to reduce allocator pressure. Checked-out state is private to its
/// pass and returns to the pool when the [`PooledSerializer`] drops.
pub struct SerializerPool {
	serializer: Serializer,
	idle: Mutex<Vec<ScratchState>>,
}

impl SerializerPool {
	pub fn new(serializer: Serializer) -> SerializerPool {
		SerializerPool {
			serializer,
			idle: Mutex::new(Vec::new()),
		}
	}

	#[inline]
	pub fn serializer(&self) -> &Serializer {
		&self.serializer
	}

	pub fn checkout(&self) -> PooledSerializer<'_> {
		let state = {
			let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
			idle.pop()
		};
		let state = match state {
			Some(state) => state,
			None => {
				debug!("Serializer pool empty, allocating fresh scratch state");
				ScratchState::default()
			},
		};
		PooledSerializer {
			pool: self,
			state: Some(state),
		}
	}

	fn give_back(&self, mut state: ScratchState) {
		state.clear();
		let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
		idle.push(state);
	}
}

/// A checked-out serializer-state bundle. Not shared between concurrent
/// passes; use one per pass and drop it to return the state.
pub struct PooledSerializer<'l> {
	pool: &'l SerializerPool,
	state: Option<ScratchState>,
}

impl PooledSerializer<'_> {
	pub fn serialize(&mut self, value: &Value, stream: &mut dyn Write) -> Result<()> {
		let state = self.state.as_mut().unwrap();
		self.pool.serializer.serialize_with(value, stream, state)
	}

	pub fn deserialize(&mut self, stream: &mut dyn Read) -> Result<Value> {
		let state = self.state.as_mut().unwrap();
		self.pool.serializer.deserialize_with(stream, state)
	}

	pub fn copy(&mut self, value: &Value) -> Result<Value> {
		let state = self.state.as_mut().unwrap();
		self.pool.serializer.copy_with(value, state)
	}
}

impl Drop for PooledSerializer<'_> {
	fn drop(&mut self) {
		if let Some(state) = self.state.take() {
			self.pool.give_back(state);
		}
	}
}

pub mod any_value;
pub mod array;
pub mod buffer;
pub mod collection;
pub mod config;
pub mod context;
pub mod error;
pub mod hash;
pub mod map;
pub mod meta;
pub mod primitive;
pub mod reference;
pub mod registry;
pub mod resolver;
pub mod serializer;
pub mod skip;
pub mod types;

pub use any_value::{DynMap, DynStruct, DynValue, Shared};
pub use array::PrimitiveArray;
pub use config::Config;
pub use error::{Error, Result};

use buffer::{Reader, Writer};
use context::{ReadContext, WriteContext};
use meta::TypeMeta;
use registry::Registry;
use resolver::TypeResolver;
use types::TypeId;

/// Top-level serializer/deserializer entry point (spec §3 "Fory driver").
/// Owns its `Config` plus the `Registry`/`TypeResolver` pair that id- and
/// name-registered dynamic struct reads resolve against (spec §4.5, §4.6) —
/// register a type's schema with `register_by_id`/`register_by_name` before
/// deserializing wire bytes that reference it.
#[derive(Debug, Clone, Default)]
pub struct Fory {
	pub config: Config,
	registry: Registry,
	resolver: TypeResolver,
}

impl Fory {
	/// `config.max_depth <= 0` is rejected at construction time (spec §6.5).
	pub fn new(config: Config) -> Result<Self> {
		config.validate()?;
		Ok(Fory {
			config,
			registry: Registry::new(),
			resolver: TypeResolver::new(),
		})
	}

	/// Registers a schema addressed by a numeric user type id.
	pub fn register_by_id(&mut self, user_type_id: u32, kind: TypeId, schema: TypeMeta) {
		self.registry.register_by_id(user_type_id, kind, schema);
		self.resolver.record_id_registration(kind);
	}

	/// Registers a schema addressed by `(namespace, typename)`.
	pub fn register_by_name(
		&mut self,
		namespace: impl Into<String>,
		typename: impl Into<String>,
		kind: TypeId,
		schema: TypeMeta,
	) {
		self.registry.register_by_name(namespace, typename, kind, schema);
		self.resolver.record_name_registration(kind);
	}

	/// Serializes a single dynamic value to a fresh byte buffer.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
	pub fn serialize(&self, value: &DynValue) -> Result<Vec<u8>> {
		let mut ctx = WriteContext::new(self.config.track_ref, self.config.compatible, self.config.max_depth);
		any_value::write_any(&mut ctx, value)?;
		Ok(ctx.writer.into_vec())
	}

	/// Deserializes a single dynamic value from a byte slice.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
	pub fn deserialize(&self, bytes: &[u8]) -> Result<DynValue> {
		let mut ctx: ReadContext<DynValue> = ReadContext::new(
			Reader::new(bytes),
			self.config.track_ref,
			self.config.compatible,
			self.config.max_depth,
		);
		any_value::read_any(&mut ctx, &self.registry, &self.resolver)
	}

	pub fn writer(&self) -> Writer {
		Writer::new()
	}
}

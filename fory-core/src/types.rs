//! Wire type tags and reference-protocol enums (spec §3, §6.2, §6.3).
//!
//! `TypeId` follows the teacher's `TableKind` (`raw/heaps/table.rs`): a `#[repr(u8)]`
//! enum with explicit discriminants and a derived `FromRepr` for the read side.

use fory_core_derive::FromRepr;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, FromRepr)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum TypeId {
	Unknown = 0,
	Bool = 1,
	Int8 = 2,
	Int16 = 3,
	Int32 = 4,
	VarInt32 = 5,
	Int64 = 6,
	VarInt64 = 7,
	TaggedInt64 = 8,
	UInt8 = 9,
	UInt16 = 10,
	UInt32 = 11,
	VarUInt32 = 12,
	UInt64 = 13,
	VarUInt64 = 14,
	TaggedUInt64 = 15,
	Float8 = 16,
	Float16 = 17,
	BFloat16 = 18,
	Float32 = 19,
	Float64 = 20,
	String = 21,
	List = 22,
	Set = 23,
	Map = 24,
	Enum = 25,
	NamedEnum = 26,
	Struct = 27,
	CompatibleStruct = 28,
	NamedStruct = 29,
	NamedCompatibleStruct = 30,
	Ext = 31,
	NamedExt = 32,
	Union = 33,
	TypedUnion = 34,
	NamedUnion = 35,
	None = 36,
	Duration = 37,
	Timestamp = 38,
	Date = 39,
	Decimal = 40,
	Binary = 41,
	Array = 42,
	BoolArray = 43,
	Int8Array = 44,
	Int16Array = 45,
	Int32Array = 46,
	Int64Array = 47,
	UInt8Array = 48,
	UInt16Array = 49,
	UInt32Array = 50,
	UInt64Array = 51,
	Float8Array = 52,
	Float16Array = 53,
	BFloat16Array = 54,
	Float32Array = 55,
	Float64Array = 56,
}

impl TypeId {
	#[inline]
	pub fn as_u8(self) -> u8 {
		self as u8
	}

	/// User-defined kinds that carry an identity (id- or name-registered) — spec §6.2.
	pub fn is_user_type_kind(self) -> bool {
		matches!(
			self,
			TypeId::Enum
				| TypeId::NamedEnum
				| TypeId::Struct
				| TypeId::CompatibleStruct
				| TypeId::NamedStruct
				| TypeId::NamedCompatibleStruct
				| TypeId::Ext
				| TypeId::NamedExt
				| TypeId::TypedUnion
				| TypeId::NamedUnion
		)
	}

	/// Kinds whose fields need a type-info prefix even when declared — spec §6.2.
	pub fn needs_type_info_for_field(self) -> bool {
		matches!(
			self,
			TypeId::Struct
				| TypeId::CompatibleStruct
				| TypeId::NamedStruct
				| TypeId::NamedCompatibleStruct
				| TypeId::Ext
				| TypeId::NamedExt
				| TypeId::Unknown
		)
	}

	/// Scalar kinds with a fixed or varint-but-homogeneous wire width, eligible for
	/// the primitive collection/array fast paths (spec §4.7, §4.9).
	pub fn is_primitive(self) -> bool {
		matches!(
			self,
			TypeId::Bool
				| TypeId::Int8
				| TypeId::Int16
				| TypeId::Int32
				| TypeId::VarInt32
				| TypeId::Int64
				| TypeId::VarInt64
				| TypeId::UInt8
				| TypeId::UInt16
				| TypeId::UInt32
				| TypeId::VarUInt32
				| TypeId::UInt64
				| TypeId::VarUInt64
				| TypeId::Float32
				| TypeId::Float64
				| TypeId::Date
				| TypeId::Timestamp
				| TypeId::Duration
		)
	}

	/// Reserved but un-implemented wire kinds (spec §9 Open Questions).
	pub fn is_unimplemented_reserved(self) -> bool {
		matches!(self, TypeId::Float8 | TypeId::Float16 | TypeId::BFloat16)
	}
}

/// Per-field choice of nullability/ref-tracking encoding (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RefMode {
	#[default]
	None = 0,
	NullOnly = 1,
	Tracking = 2,
}

impl RefMode {
	#[inline]
	pub const fn from_flags(nullable: bool, track_ref: bool) -> Self {
		match (nullable, track_ref) {
			(false, false) => RefMode::None,
			(true, false) => RefMode::NullOnly,
			(_, true) => RefMode::Tracking,
		}
	}

	#[inline]
	pub const fn is_nullable(self) -> bool {
		!matches!(self, RefMode::None)
	}

	#[inline]
	pub const fn tracks_refs(self) -> bool {
		matches!(self, RefMode::Tracking)
	}
}

/// Single-byte wire tag distinguishing null / back-reference / new tracked value /
/// plain non-null value (spec §3, §6.3).
///
/// Numeric values are fixed by the real `apache/fory` Rust core (see DESIGN.md),
/// not the illustrative `{-1,0,1,2}` numbering in spec.md §3.
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromRepr)]
#[repr(i8)]
pub enum RefFlag {
	Null = -3,
	Ref = -2,
	NotNullValue = -1,
	RefValue = 0,
}

/// Field-name / type-name encoding codes used by `TypeMetaFieldInfo` (spec §3).
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum MetaStringEncoding {
	Utf8 = 0,
	AllToLowerSpecial = 1,
	LowerUpperDigitSpecial = 2,
	/// Reserved encoding code signalling "this field was addressed by numeric tag,
	/// not by name" — the name is synthesized on read as `$tag{id}` (spec §3).
	Tagged = 3,
}

/// String-body encoding used by the `String` leaf codec (spec §4.2).
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum StringEncoding {
	Latin1 = 0,
	Utf16 = 1,
	Utf8 = 2,
}

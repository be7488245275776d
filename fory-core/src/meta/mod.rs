//! Schema metadata: the MetaString name oracle and the `TypeMeta` schema
//! codec built on top of it (spec §3, §4.3).

pub mod meta_string;
pub mod type_meta;

pub use type_meta::{FieldId, TypeMeta, TypeMetaFieldInfo, TypeMetaFieldType};

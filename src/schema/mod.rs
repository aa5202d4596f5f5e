//! # Schema Reconstruction
//!
//! Everything the readers know about the shape of the backed-up data:
//!
//! - `dict`: the word-encoded table descriptor blob and its decoder
//! - `table`: [`Table`] / [`AttributeDesc`] with the three-way column
//!   categorization that drives tuple decoding
//! - `metadata`: [`Metadata`], one control file's tables plus the global
//!   checkpoint range

pub mod dict;
pub mod metadata;
pub mod table;

pub use dict::{encode_table_info, parse_table_info, ColumnInfo, TableImpl};
pub use metadata::Metadata;
pub use table::{AttributeDesc, Table};

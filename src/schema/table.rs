//! # Table Schema and Column Categorization
//!
//! [`Table::build`] turns a raw dictionary view ([`TableImpl`]) into the
//! decoded schema the data and log readers work against. Columns receive
//! dense attribute ids in declaration order and are partitioned into three
//! ordered groups that drive the three tuple decode loops:
//!
//! | Group | Columns | Tuple area |
//! |-------|---------|------------|
//! | `fixed_keys` | primary key | fixed-width key area |
//! | `fixed_attrs` | non-nullable non-key | fixed-width attribute area |
//! | `var_attrs` | nullable | variable-size trailing area |
//!
//! The partition is exact and its order is part of the on-disk contract:
//! the producer lays tuple areas out by walking columns in declaration
//! order, so the reader must categorize the same way. Each nullable column
//! gets the next free null-bit index in encounter order; the null bitmask
//! prefix of every tuple is `ceil(nullable / 32)` words.

use eyre::{ensure, Result};

use crate::error::ReadError;
use crate::schema::dict::TableImpl;

/// Decoded metadata for one column.
#[derive(Debug, Clone)]
pub struct AttributeDesc {
    attr_id: u32,
    name: String,
    width_bits: u32,
    array_len: u32,
    nullable: bool,
    primary_key: bool,
    /// Index into the tuple null bitmask. Valid iff `nullable`.
    null_bit_index: u32,
}

impl AttributeDesc {
    pub fn attr_id(&self) -> u32 {
        self.attr_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width_bits(&self) -> u32 {
        self.width_bits
    }

    pub fn array_len(&self) -> u32 {
        self.array_len
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn null_bit_index(&self) -> u32 {
        self.null_bit_index
    }

    pub fn size_in_bytes(&self) -> usize {
        (self.width_bits as usize / 8) * self.array_len as usize
    }

    /// Size of this attribute's fixed-area slice, in 32-bit words.
    pub fn size_in_words(&self) -> usize {
        self.size_in_bytes().div_ceil(4)
    }
}

/// One relation of the backup: attribute descriptors in declaration order
/// plus the three decode-order categorizations.
#[derive(Debug, Clone)]
pub struct Table {
    id: u32,
    name: String,
    version: u32,
    backup_version: u32,
    all_attrs: Vec<AttributeDesc>,
    fixed_keys: Vec<usize>,
    fixed_attrs: Vec<usize>,
    var_attrs: Vec<usize>,
    no_of_nullable: u32,
    null_bitmask_words: usize,
}

impl Table {
    /// Builds a table from its dictionary view. `backup_version` is the
    /// producer version from the control file header.
    pub fn build(info: TableImpl, backup_version: u32) -> Result<Self> {
        let mut table = Table {
            id: info.id,
            name: info.name,
            version: info.version,
            backup_version,
            all_attrs: Vec::with_capacity(info.columns.len()),
            fixed_keys: Vec::new(),
            fixed_attrs: Vec::new(),
            var_attrs: Vec::new(),
            no_of_nullable: 0,
            null_bitmask_words: 0,
        };

        for column in info.columns {
            ensure!(
                matches!(column.width_bits, 8 | 16 | 32 | 64),
                ReadError::schema(format!(
                    "column {}.{} has unsupported width {} bits",
                    table.name, column.name, column.width_bits
                ))
            );
            ensure!(
                !(column.nullable && column.primary_key),
                ReadError::schema(format!(
                    "column {}.{} is a nullable primary key",
                    table.name, column.name
                ))
            );

            let attr_id = table.all_attrs.len() as u32;
            let index = table.all_attrs.len();
            let mut desc = AttributeDesc {
                attr_id,
                name: column.name,
                width_bits: column.width_bits,
                array_len: column.array_len,
                nullable: column.nullable,
                primary_key: column.primary_key,
                null_bit_index: 0,
            };

            if desc.primary_key {
                // Keys are fixed width in the current format.
                table.fixed_keys.push(index);
            } else if !desc.nullable {
                table.fixed_attrs.push(index);
            } else {
                desc.null_bit_index = table.no_of_nullable;
                table.no_of_nullable += 1;
                table.null_bitmask_words = (table.no_of_nullable as usize).div_ceil(32);
                table.var_attrs.push(index);
            }

            table.all_attrs.push(desc);
        }

        Ok(table)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn backup_version(&self) -> u32 {
        self.backup_version
    }

    pub fn attr_count(&self) -> usize {
        self.all_attrs.len()
    }

    pub fn attr(&self, attr_id: u32) -> Option<&AttributeDesc> {
        self.all_attrs.get(attr_id as usize)
    }

    pub fn attrs(&self) -> &[AttributeDesc] {
        &self.all_attrs
    }

    pub(crate) fn fixed_keys(&self) -> impl Iterator<Item = &AttributeDesc> {
        self.fixed_keys.iter().map(|&i| &self.all_attrs[i])
    }

    pub(crate) fn fixed_attrs(&self) -> impl Iterator<Item = &AttributeDesc> {
        self.fixed_attrs.iter().map(|&i| &self.all_attrs[i])
    }

    pub(crate) fn var_attrs(&self) -> impl Iterator<Item = &AttributeDesc> {
        self.var_attrs.iter().map(|&i| &self.all_attrs[i])
    }

    pub fn no_of_nullable(&self) -> u32 {
        self.no_of_nullable
    }

    /// Null bitmask prefix length of every tuple, in 32-bit words.
    pub fn null_bitmask_words(&self) -> usize {
        self.null_bitmask_words
    }
}

//! # Dictionary Descriptor Decoding
//!
//! Each table-description section in a control file carries a compact
//! word-encoded descriptor blob. This module decodes it into a
//! [`TableImpl`] value, the raw dictionary view that [`Table::build`]
//! consumes. The encoder lives alongside the decoder; it is what the test
//! fixtures (and producer-side tooling) use to write descriptor blobs.
//!
//! ## Blob Layout (32-bit words)
//!
//! ```text
//! word 0        table id
//! word 1        table schema version
//! word 2        table name length in bytes (<= 256)
//! words 3..     table name, UTF-8, packed 4 bytes per word, zero padded
//! next word     column count (>= 1)
//! per column:
//!   word 0      flags: bit 0 = nullable, bit 1 = primary key
//!   word 1      width in bits (8 / 16 / 32 / 64)
//!   word 2      array length (>= 1)
//!   word 3      column name length in bytes (<= 256)
//!   words 4..   column name, packed as above
//! ```
//!
//! Name bytes are packed most-significant-byte first within each word, so
//! the blob decodes identically regardless of which machine wrote the
//! section framing around it.
//!
//! Any malformed blob (truncated, zero columns, bad width, bad UTF-8,
//! oversized name, nullable primary key) is a `Schema` error.
//!
//! [`Table::build`]: crate::schema::Table::build

use eyre::{bail, ensure, Result};

use crate::error::ReadError;

pub const MAX_NAME_BYTES: usize = 256;

pub const COLUMN_NULLABLE: u32 = 0b01;
pub const COLUMN_PRIMARY_KEY: u32 = 0b10;

/// Raw dictionary view of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub width_bits: u32,
    pub array_len: u32,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, width_bits: u32, array_len: u32) -> Self {
        Self {
            name: name.into(),
            width_bits,
            array_len,
            nullable: false,
            primary_key: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

/// Raw dictionary view of one table, as decoded from a descriptor blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableImpl {
    pub id: u32,
    pub version: u32,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

struct WordCursor<'a> {
    words: &'a [u32],
    pos: usize,
}

impl<'a> WordCursor<'a> {
    fn new(words: &'a [u32]) -> Self {
        Self { words, pos: 0 }
    }

    fn next(&mut self) -> Result<u32> {
        match self.words.get(self.pos) {
            Some(&word) => {
                self.pos += 1;
                Ok(word)
            }
            None => bail!(ReadError::schema(format!(
                "truncated table descriptor at word {}",
                self.pos
            ))),
        }
    }

    fn name(&mut self) -> Result<String> {
        let len = self.next()? as usize;
        ensure!(
            len <= MAX_NAME_BYTES,
            ReadError::schema(format!("name length {} exceeds {}", len, MAX_NAME_BYTES))
        );

        let word_count = len.div_ceil(4);
        let mut bytes = Vec::with_capacity(len);
        for _ in 0..word_count {
            let word = self.next()?;
            for shift in [24, 16, 8, 0] {
                if bytes.len() < len {
                    bytes.push((word >> shift) as u8);
                }
            }
        }

        String::from_utf8(bytes)
            .map_err(|_| ReadError::schema("name is not valid UTF-8").into())
    }
}

/// Decodes one table descriptor blob. The caller hands over host-order
/// words (the control-file reader converts the big-endian section body
/// while reading it).
pub fn parse_table_info(words: &[u32]) -> Result<TableImpl> {
    let mut cursor = WordCursor::new(words);

    let id = cursor.next()?;
    let version = cursor.next()?;
    let name = cursor.name()?;

    let column_count = cursor.next()?;
    ensure!(
        column_count > 0,
        ReadError::schema(format!("table {} declares no columns", name))
    );
    // Each column costs at least four words; a count past the blob length
    // is corrupt, not merely truncated.
    ensure!(
        column_count as usize <= words.len(),
        ReadError::schema(format!(
            "table {} declares {} columns in a {}-word blob",
            name,
            column_count,
            words.len()
        ))
    );

    let mut columns = Vec::with_capacity(column_count as usize);
    for _ in 0..column_count {
        let flags = cursor.next()?;
        let width_bits = cursor.next()?;
        let array_len = cursor.next()?;
        let column_name = cursor.name()?;

        ensure!(
            matches!(width_bits, 8 | 16 | 32 | 64),
            ReadError::schema(format!(
                "column {}.{} has unsupported width {} bits",
                name, column_name, width_bits
            ))
        );
        ensure!(
            array_len > 0,
            ReadError::schema(format!(
                "column {}.{} has zero array length",
                name, column_name
            ))
        );

        let nullable = flags & COLUMN_NULLABLE != 0;
        let primary_key = flags & COLUMN_PRIMARY_KEY != 0;
        ensure!(
            !(nullable && primary_key),
            ReadError::schema(format!(
                "column {}.{} is a nullable primary key",
                name, column_name
            ))
        );

        columns.push(ColumnInfo {
            name: column_name,
            width_bits,
            array_len,
            nullable,
            primary_key,
        });
    }

    Ok(TableImpl {
        id,
        version,
        name,
        columns,
    })
}

fn push_name(out: &mut Vec<u32>, name: &str) {
    let bytes = name.as_bytes();
    out.push(bytes.len() as u32);
    for chunk in bytes.chunks(4) {
        let mut word = 0u32;
        for (i, &b) in chunk.iter().enumerate() {
            word |= (b as u32) << (24 - 8 * i);
        }
        out.push(word);
    }
}

/// Encodes a [`TableImpl`] into the descriptor blob layout. Counterpart of
/// [`parse_table_info`]; used by the synthetic backup writers in tests.
pub fn encode_table_info(table: &TableImpl) -> Vec<u32> {
    let mut out = Vec::new();
    out.push(table.id);
    out.push(table.version);
    push_name(&mut out, &table.name);
    out.push(table.columns.len() as u32);

    for column in &table.columns {
        let mut flags = 0;
        if column.nullable {
            flags |= COLUMN_NULLABLE;
        }
        if column.primary_key {
            flags |= COLUMN_PRIMARY_KEY;
        }
        out.push(flags);
        out.push(column.width_bits);
        out.push(column.array_len);
        push_name(&mut out, &column.name);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{error_kind, ReadErrorKind};

    fn two_column_table() -> TableImpl {
        TableImpl {
            id: 7,
            version: 3,
            name: "accounts".to_string(),
            columns: vec![
                ColumnInfo::new("id", 32, 1).primary_key(),
                ColumnInfo::new("note", 8, 12).nullable(),
            ],
        }
    }

    #[test]
    fn descriptor_roundtrip() {
        let table = two_column_table();
        let words = encode_table_info(&table);
        let parsed = parse_table_info(&words).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn name_length_not_word_aligned() {
        let table = TableImpl {
            id: 1,
            version: 1,
            name: "abcde".to_string(),
            columns: vec![ColumnInfo::new("x", 32, 1)],
        };
        let parsed = parse_table_info(&encode_table_info(&table)).unwrap();
        assert_eq!(parsed.name, "abcde");
    }

    #[test]
    fn truncated_blob_is_a_schema_error() {
        let words = encode_table_info(&two_column_table());
        let err = parse_table_info(&words[..words.len() - 2]).unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Schema));
    }

    #[test]
    fn zero_columns_rejected() {
        // id, version, empty name, zero column count.
        let words = [1, 1, 0, 0];
        let err = parse_table_info(&words).unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Schema));
    }

    #[test]
    fn bad_width_rejected() {
        let mut table = two_column_table();
        table.columns[0].width_bits = 24;
        let err = parse_table_info(&encode_table_info(&table)).unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Schema));
    }

    #[test]
    fn zero_array_len_rejected() {
        let mut table = two_column_table();
        table.columns[1].array_len = 0;
        let err = parse_table_info(&encode_table_info(&table)).unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Schema));
    }

    #[test]
    fn nullable_primary_key_rejected() {
        let mut table = two_column_table();
        table.columns[0].nullable = true;
        let err = parse_table_info(&encode_table_info(&table)).unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Schema));
    }

    #[test]
    fn oversized_name_rejected() {
        // Claim a 300-byte name without supplying it.
        let words = [1, 1, 300];
        let err = parse_table_info(&words).unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Schema));
    }
}

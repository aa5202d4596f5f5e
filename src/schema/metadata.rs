//! # Backup Metadata
//!
//! The decoded product of one control file: every table of the backup plus
//! the global checkpoint range bounding its consistency window. The
//! metadata also carries the backup coordinates (directory, node id,
//! backup id, producer version) so that data and log readers can be
//! constructed directly from it, mirroring how their files are named on
//! disk.
//!
//! Tables are held in declaration order; lookup by table id goes through a
//! hash index because data fragments and log records reference tables by
//! id only.

use std::path::{Path, PathBuf};

use eyre::{ensure, Result};
use hashbrown::HashMap;

use crate::error::ReadError;
use crate::schema::table::Table;

#[derive(Debug)]
pub struct Metadata {
    dir: PathBuf,
    node_id: u32,
    backup_id: u32,
    version: u32,
    start_gcp: u32,
    stop_gcp: u32,
    tables: Vec<Table>,
    by_id: HashMap<u32, usize>,
}

impl Metadata {
    pub(crate) fn assemble(
        dir: PathBuf,
        node_id: u32,
        backup_id: u32,
        version: u32,
        start_gcp: u32,
        stop_gcp: u32,
        tables: Vec<Table>,
    ) -> Result<Self> {
        ensure!(
            start_gcp <= stop_gcp,
            ReadError::format(format!(
                "GCP range is inverted: start {} > stop {}",
                start_gcp, stop_gcp
            ))
        );

        let mut by_id = HashMap::with_capacity(tables.len());
        for (index, table) in tables.iter().enumerate() {
            ensure!(
                by_id.insert(table.id(), index).is_none(),
                ReadError::format(format!("duplicate table id {} in control file", table.id()))
            );
        }

        Ok(Self {
            dir,
            node_id,
            backup_id,
            version,
            start_gcp,
            stop_gcp,
            tables,
            by_id,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn backup_id(&self) -> u32 {
        self.backup_id
    }

    /// Producer version recorded in the control file header.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn start_gcp(&self) -> u32 {
        self.start_gcp
    }

    pub fn stop_gcp(&self) -> u32 {
        self.stop_gcp
    }

    /// Decoded tables in control-file order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, table_id: u32) -> Option<&Table> {
        self.by_id.get(&table_id).map(|&i| &self.tables[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{error_kind, ReadErrorKind};
    use crate::schema::dict::{ColumnInfo, TableImpl};

    fn table(id: u32, name: &str) -> Table {
        Table::build(
            TableImpl {
                id,
                version: 1,
                name: name.to_string(),
                columns: vec![ColumnInfo::new("pk", 32, 1).primary_key()],
            },
            70,
        )
        .unwrap()
    }

    #[test]
    fn lookup_by_id() {
        let meta = Metadata::assemble(
            PathBuf::from("."),
            1,
            42,
            70,
            7,
            11,
            vec![table(3, "a"), table(9, "b")],
        )
        .unwrap();

        assert_eq!(meta.table(9).unwrap().name(), "b");
        assert!(meta.table(5).is_none());
        assert_eq!(meta.tables().len(), 2);
        assert_eq!(meta.start_gcp(), 7);
        assert_eq!(meta.stop_gcp(), 11);
    }

    #[test]
    fn inverted_gcp_range_rejected() {
        let err = Metadata::assemble(PathBuf::from("."), 1, 42, 70, 12, 11, vec![table(1, "t")])
            .unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Format));
    }

    #[test]
    fn duplicate_table_id_rejected() {
        let err = Metadata::assemble(
            PathBuf::from("."),
            1,
            42,
            70,
            0,
            0,
            vec![table(3, "a"), table(3, "b")],
        )
        .unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Format));
    }
}

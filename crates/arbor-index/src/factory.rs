//! Index construction.

use crate::container::OrderedContainer;
use crate::index::Index;
use crate::metadata::IndexMetadata;
use arbor_common::{ArborError, IndexConfig, Result};
use std::sync::Arc;
use tracing::debug;

/// Builds indexes from metadata and configuration.
pub struct IndexFactory;

impl IndexFactory {
    /// Creates an empty index of the kind named by `metadata`.
    ///
    /// Fails with `InvalidParameter` for an unusable configuration and with
    /// `InvalidSchema` if the key has more columns than the configuration
    /// allows.
    pub fn create(metadata: impl Into<Arc<IndexMetadata>>, config: &IndexConfig) -> Result<Index> {
        config.validate()?;
        let metadata = metadata.into();

        if metadata.key_column_count() > config.max_key_columns {
            return Err(ArborError::InvalidSchema(format!(
                "index {}: key has {} columns, at most {} are allowed",
                metadata.name(),
                metadata.key_column_count(),
                config.max_key_columns
            )));
        }

        let container = OrderedContainer::new(metadata.kind(), config)?;
        debug!(
            index = metadata.name(),
            oid = metadata.oid(),
            kind = %metadata.kind(),
            unique = metadata.is_unique(),
            key_columns = metadata.key_column_count(),
            "created index"
        );
        Ok(Index::new(metadata, container))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, Schema};
    use crate::metadata::IndexKind;
    use arbor_common::TypeId;

    fn metadata(columns: usize, kind: IndexKind) -> IndexMetadata {
        let cols: Vec<Column> = (0..columns)
            .map(|i| Column::new(TypeId::Int16, format!("c{}", i), false))
            .collect();
        IndexMetadata::new(
            "idx",
            1,
            Schema::new(cols.clone()),
            Schema::new(cols),
            (0..columns).collect(),
            false,
            kind,
        )
        .unwrap()
    }

    #[test]
    fn test_create_each_kind() {
        let config = IndexConfig::default();
        let bw = IndexFactory::create(metadata(2, IndexKind::BwTree), &config).unwrap();
        assert_eq!(bw.type_name(), "BWTree");
        assert!(bw.container().as_bwtree().is_some());

        let bt = IndexFactory::create(metadata(2, IndexKind::BTree), &config).unwrap();
        assert_eq!(bt.type_name(), "BTree");
    }

    #[test]
    fn test_too_many_key_columns() {
        let config = IndexConfig {
            max_key_columns: 3,
            ..IndexConfig::default()
        };
        assert!(IndexFactory::create(metadata(3, IndexKind::BwTree), &config).is_ok());
        let err = IndexFactory::create(metadata(4, IndexKind::BwTree), &config).unwrap_err();
        assert!(matches!(err, ArborError::InvalidSchema(_)));
    }

    #[test]
    fn test_invalid_config() {
        let config = IndexConfig {
            leaf_max_entries: 1,
            ..IndexConfig::default()
        };
        let err = IndexFactory::create(metadata(1, IndexKind::BTree), &config).unwrap_err();
        assert!(matches!(err, ArborError::InvalidParameter { .. }));
    }

    #[test]
    fn test_shared_metadata() {
        let shared = Arc::new(metadata(1, IndexKind::BwTree));
        let index = IndexFactory::create(shared.clone(), &IndexConfig::default()).unwrap();
        assert!(Arc::ptr_eq(index.metadata(), &shared));
    }
}

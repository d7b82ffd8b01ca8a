//! Configuration structures for Arbor indexes.

use crate::error::{ArborError, Result};
use serde::{Deserialize, Serialize};

/// Tuning knobs for an index instance.
///
/// The defaults suit secondary indexes of up to a few million keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Delta records allowed on a node before it is consolidated into a new base.
    pub delta_chain_threshold: usize,
    /// Maximum keys in a consolidated leaf before it splits.
    pub leaf_max_entries: usize,
    /// Maximum separators in a consolidated inner node before it splits.
    pub inner_max_entries: usize,
    /// Maximum number of columns in a key schema.
    pub max_key_columns: usize,
    /// Capacity of the node mapping table (number of logical node ids).
    pub max_nodes: usize,
    /// Upper bound on spin iterations of one CAS backoff step.
    pub max_backoff_spins: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            delta_chain_threshold: 8,
            leaf_max_entries: 64,
            inner_max_entries: 64,
            max_key_columns: 16,
            max_nodes: 1 << 22, // 4M logical nodes
            max_backoff_spins: 1024,
        }
    }
}

impl IndexConfig {
    /// Checks that every parameter is usable.
    ///
    /// Node capacities below 4 would let a split produce an empty half, and a
    /// zero chain threshold would consolidate on every read.
    pub fn validate(&self) -> Result<()> {
        if self.delta_chain_threshold == 0 {
            return Err(invalid("delta_chain_threshold", self.delta_chain_threshold));
        }
        if self.leaf_max_entries < 4 {
            return Err(invalid("leaf_max_entries", self.leaf_max_entries));
        }
        if self.inner_max_entries < 4 {
            return Err(invalid("inner_max_entries", self.inner_max_entries));
        }
        if self.max_key_columns == 0 {
            return Err(invalid("max_key_columns", self.max_key_columns));
        }
        if self.max_nodes < 2 {
            return Err(invalid("max_nodes", self.max_nodes));
        }
        if self.max_backoff_spins == 0 {
            return Err(invalid("max_backoff_spins", self.max_backoff_spins));
        }
        Ok(())
    }
}

fn invalid(name: &str, value: impl ToString) -> ArborError {
    ArborError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}

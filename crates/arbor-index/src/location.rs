//! Physical tuple locations stored by the index.

/// Location of a physical tuple, as handed out by the tuple storage layer.
///
/// Combines a block number with an offset inside that block. The index
/// copies these by value and never dereferences them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemPointer {
    /// Block containing the tuple.
    pub block: u32,
    /// Offset (slot) of the tuple inside its block.
    pub offset: u32,
}

impl ItemPointer {
    /// Creates a new item pointer.
    pub fn new(block: u32, offset: u32) -> Self {
        Self { block, offset }
    }

    /// Invalid item pointer.
    pub const INVALID: ItemPointer = ItemPointer {
        block: u32::MAX,
        offset: u32::MAX,
    };

    /// Returns false for the block number reserved by [`ItemPointer::INVALID`].
    /// Such pointers are never stored in an index.
    pub fn is_valid(&self) -> bool {
        self.block != u32::MAX
    }
}

impl std::fmt::Display for ItemPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.block, self.offset)
    }
}

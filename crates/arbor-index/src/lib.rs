//! Concurrent ordered secondary index for Arbor.
//!
//! This crate provides:
//! - Column descriptors and schemas for tuples and keys
//! - An order-preserving, fixed-width key encoder
//! - Immutable index metadata, validated at construction
//! - A latch-free Bw-tree and a lock-based B-tree as ordered containers
//! - The index facade with optional uniqueness enforcement

mod btree;
mod bwtree;
mod catalog;
mod container;
mod factory;
mod index;
mod key;
mod location;
mod metadata;

pub use btree::LockedBTree;
pub use bwtree::{BwTree, BwTreeStats, BwTreeStatsSnapshot, NodeId};
pub use catalog::{Column, Schema};
pub use container::{InsertOutcome, OrderedContainer};
pub use factory::IndexFactory;
pub use index::Index;
pub use key::{EncodedKey, KeyEncoder, format_key};
pub use location::ItemPointer;
pub use metadata::{IndexKind, IndexMetadata};

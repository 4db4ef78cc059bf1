//! Identifier allocation for experiments and results.
//!
//! Identifiers are opaque strings whose lexicographic order matches
//! allocation order, so id-ordered listings are also creation-ordered.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of globally unique, sortable document identifiers.
pub trait IdAllocator: Send + Sync {
    /// Allocate the next identifier.
    fn next_id(&self) -> String;
}

/// Time-ordered UUIDv7 identifiers (default).
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Allocator;

impl IdAllocator for UuidV7Allocator {
    fn next_id(&self) -> String {
        Uuid::now_v7().to_string()
    }
}

/// Deterministic `<prefix>-<counter>` identifiers.
///
/// The counter is zero-padded to 20 digits (the width of `u64::MAX`) so that
/// string order and numeric order agree.
#[derive(Debug)]
pub struct SequentialAllocator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialAllocator {
    /// Create an allocator whose first id is `<prefix>-00000000000000000001`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdAllocator for SequentialAllocator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n:020}", self.prefix)
    }
}

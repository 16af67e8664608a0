//! Pagination for ledger history and audit scans.

use serde::{Deserialize, Serialize};

/// Page request: at most `limit` items starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    /// 0-based.
    pub offset: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// Cut one page out of an already ordered sequence.
    pub fn apply<T>(self, items: impl IntoIterator<Item = T>) -> Page<T> {
        let all: Vec<T> = items.into_iter().collect();
        let total = all.len() as u64;
        let items: Vec<T> = all
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect();
        let has_more = u64::from(self.offset) + (items.len() as u64) < total;
        Page {
            items,
            total,
            pagination: self,
            has_more,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Items matching across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            pagination: self.pagination,
            has_more: self.has_more,
        }
    }
}

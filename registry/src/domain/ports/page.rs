//! Keyset page returned by streaming reads.

/// One batch of records plus the cursor to resume after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T, C> {
    /// Records in cursor order.
    pub items: Vec<T>,
    /// Cursor of the last record when more records may follow.
    pub next: Option<C>,
}

impl<T, C> Page<T, C> {
    /// A page with no successor.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    /// Build a page from up to `limit + 1` fetched rows.
    ///
    /// The extra row only signals that another page exists; it is dropped and
    /// the cursor points at the last row kept.
    pub fn from_overfetch(mut rows: Vec<T>, limit: usize, cursor: impl Fn(&T) -> C) -> Self {
        if rows.len() > limit {
            rows.truncate(limit);
            let next = rows.last().map(cursor);
            Self { items: rows, next }
        } else {
            Self::last(rows)
        }
    }
}

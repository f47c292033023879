/// Identifies a table within the catalog. Opaque beyond equality/hashing.
pub type TableId = i32;

/// Identifies a single fixed-size page within a table.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub struct PageId {
    pub table_id: TableId,
    pub page_index: u64,
}

impl PageId {
    pub fn new(table_id: TableId, page_index: u64) -> Self {
        Self { table_id, page_index }
    }

    /// Short, hex-free representation used in log lines (mirrors this
    /// crate's `get_short_repr` debug helper).
    pub fn get_short_repr(&self) -> String {
        format!("t{}:p{}", self.table_id, self.page_index)
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get_short_repr())
    }
}

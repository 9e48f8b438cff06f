use docstore_backend::{Direction, FilterOp};
use docstore_mapping::ColumnValue;
use docstore_types::RecordId;

/// Condition on one column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnFilter {
    pub column: String,
    pub op: FilterOp,
    pub value: ColumnValue,
}

/// Column-level query over the records of one storage.
///
/// Values are converted with the storage's column mapping before the query
/// reaches the backend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordQuery {
    pub filters: Vec<ColumnFilter>,
    pub order: Vec<(String, Direction)>,
    pub limit: Option<usize>,
    /// Restrict the query to the entity group of this ancestor.
    pub group: Option<RecordId>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: impl Into<String>, op: FilterOp, value: impl Into<ColumnValue>) -> Self {
        self.filters.push(ColumnFilter {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.filter(column, FilterOp::Equal, value)
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn within_group(mut self, ancestor: RecordId) -> Self {
        self.group = Some(ancestor);
        self
    }
}

use crate::error::Result;
use hopper_core::{decode_partitions, Partition, Row, Schema};
use std::sync::Arc;

/// Handle to the outcome of an ingestion call.
///
/// Per-call failures do not raise; they come back as an error dataset so the
/// caller can branch on [`Dataset::is_error`] downstream, exactly like every
/// other dataset it holds.
#[derive(Debug)]
pub enum Dataset {
    Normal {
        schema: Arc<Schema>,
        partitions: Vec<Partition>,
        columns: Vec<String>,
    },
    Error {
        message: String,
    },
}

impl Dataset {
    pub fn error(message: impl Into<String>) -> Dataset {
        Dataset::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Dataset::Error { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Dataset::Error { message } => Some(message),
            Dataset::Normal { .. } => None,
        }
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        match self {
            Dataset::Normal { schema, .. } => Some(schema),
            Dataset::Error { .. } => None,
        }
    }

    pub fn partitions(&self) -> &[Partition] {
        match self {
            Dataset::Normal { partitions, .. } => partitions,
            Dataset::Error { .. } => &[],
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            Dataset::Normal { columns, .. } => columns,
            Dataset::Error { .. } => &[],
        }
    }

    /// Total rows across all partitions.
    pub fn num_rows(&self) -> u64 {
        self.partitions().iter().map(Partition::num_rows).sum()
    }

    /// Materialized bytes across all partitions, headers included.
    pub fn size_in_memory(&self) -> usize {
        self.partitions().iter().map(Partition::size).sum()
    }

    /// Decode every row back into memory, in input order.
    pub fn collect_rows(&self) -> Result<Vec<Row>> {
        Ok(decode_partitions(self.partitions())?)
    }
}

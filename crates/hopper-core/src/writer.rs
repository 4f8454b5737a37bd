use crate::error::{CoreError, Result};
use crate::partition::{Driver, Partition};
use crate::row::Row;
use crate::schema::Schema;
use std::sync::Arc;

/// Appends rows of a fixed row type into a chain of capacity-bounded
/// partitions.
///
/// The append protocol is reserve-then-commit: [`PartitionSink::reserve`]
/// returns a zeroed byte region large enough for one row, the caller encodes
/// into it, and [`PartitionSink::commit_row`] makes the row visible. A
/// reservation that is never committed leaves no trace, which is how encoders
/// drop a partially written row without rewinding anything by hand.
///
/// When a reservation does not fit into the current partition, the partition
/// is finalized (header flushed, write lock released, pushed onto the
/// completed list) and a fresh one is allocated, sized to the larger of the
/// configured minimum and the reservation itself.
pub struct PartitionSink<'d> {
    driver: &'d dyn Driver,
    schema: Arc<Schema>,
    min_size: usize,
    partitions: Vec<Partition>,
    current: Partition,
    written: usize,
    rows_in_current: u64,
    total_rows: u64,
}

impl<'d> PartitionSink<'d> {
    /// Open a sink, allocating the first partition eagerly.
    pub fn new(driver: &'d dyn Driver, schema: Arc<Schema>, min_size: usize) -> Result<Self> {
        let mut current = driver.alloc_writable_partition(min_size, &schema, None)?;
        current.lock_write_raw()?;
        current.write_header(0);
        Ok(PartitionSink {
            driver,
            schema,
            min_size,
            partitions: Vec::new(),
            current,
            written: 0,
            rows_in_current: 0,
            total_rows: 0,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Rows committed across all partitions so far.
    pub fn rows_written(&self) -> u64 {
        self.total_rows
    }

    /// Reserve `required` zeroed bytes for one row, rolling over to a new
    /// partition when the current one cannot hold them.
    pub fn reserve(&mut self, required: usize) -> Result<&mut [u8]> {
        if self.written + required > self.current.payload_capacity() {
            self.rotate(required)?;
        }
        let region = &mut self.current.payload_mut()[self.written..self.written + required];
        region.fill(0);
        Ok(region)
    }

    /// Commit the most recent reservation as one row of `used` bytes.
    pub fn commit_row(&mut self, used: usize) {
        debug_assert!(self.written + used <= self.current.payload_capacity());
        self.written += used;
        self.rows_in_current += 1;
        self.total_rows += 1;
        self.current.write_header(self.rows_in_current);
    }

    /// Append an already-built row, reserving exactly its serialized length.
    pub fn append_row(&mut self, row: &Row) -> Result<()> {
        if row.row_type() != self.schema.row_type() {
            return Err(CoreError::schema(format!(
                "row of type {} cannot be appended to a sink of type {}",
                row.row_type(),
                self.schema.row_type()
            )));
        }
        let required = row.serialized_length()?;
        let region = self.reserve(required)?;
        let written = row.serialize_into(region)?;
        debug_assert_eq!(written, required);
        self.commit_row(required);
        Ok(())
    }

    fn rotate(&mut self, required: usize) -> Result<()> {
        let min_size = self.min_size.max(required);
        let mut next = self
            .driver
            .alloc_writable_partition(min_size, &self.schema, None)?;
        next.lock_write_raw()?;
        next.write_header(0);
        if required > next.payload_capacity() {
            return Err(CoreError::alloc(format!(
                "driver returned a {}-byte partition for a {}-byte row",
                next.payload_capacity(),
                required
            )));
        }
        let mut finished = std::mem::replace(&mut self.current, next);
        finished.set_bytes_written(self.written);
        finished.unlock_write();
        self.partitions.push(finished);
        self.written = 0;
        self.rows_in_current = 0;
        Ok(())
    }

    /// Finalize the current partition and return the whole chain. The last
    /// partition is kept even when no rows were written to it; the downstream
    /// dataset constructor handles empty partitions.
    pub fn finish(mut self) -> Vec<Partition> {
        self.current.set_bytes_written(self.written);
        self.current.unlock_write();
        self.partitions.push(self.current);
        self.partitions
    }
}

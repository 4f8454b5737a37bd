use crate::error::{CoreError, Result};
use crate::schema::Schema;
use bytes::BytesMut;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Size of the row-count header at the start of every partition.
pub const PARTITION_HEADER_SIZE: usize = 8;

/// Default payload capacity handed out by [`MemoryDriver`].
pub const DEFAULT_PARTITION_SIZE: usize = 1024 * 1024;

/// A capacity-bounded byte buffer holding a row count header followed by a
/// packed row payload.
///
/// A partition is created writable, filled by exactly one writer while
/// write-locked, unlocked, and then handed to the backend dataset which owns
/// it from that point on.
#[derive(Debug)]
pub struct Partition {
    schema: Arc<Schema>,
    buf: BytesMut,
    bytes_written: usize,
    locked: bool,
}

impl Partition {
    pub(crate) fn writable(schema: Arc<Schema>, payload_capacity: usize) -> Partition {
        let mut buf = BytesMut::with_capacity(PARTITION_HEADER_SIZE + payload_capacity);
        buf.resize(PARTITION_HEADER_SIZE + payload_capacity, 0);
        Partition {
            schema,
            buf,
            bytes_written: 0,
            locked: false,
        }
    }

    /// The schema this partition was allocated for; pointer-equal to the
    /// schema of every other partition in the same set.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Total buffer capacity, header included.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Capacity available to row data.
    pub fn payload_capacity(&self) -> usize {
        self.buf.len() - PARTITION_HEADER_SIZE
    }

    /// Acquire the write lock and expose the raw buffer, header included.
    pub fn lock_write_raw(&mut self) -> Result<&mut [u8]> {
        if self.locked {
            return Err(CoreError::internal("partition is already write-locked"));
        }
        self.locked = true;
        Ok(&mut self.buf[..])
    }

    /// Release the write lock.
    pub fn unlock_write(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn set_bytes_written(&mut self, bytes: usize) {
        debug_assert!(bytes <= self.payload_capacity());
        self.bytes_written = bytes;
    }

    /// Mutable view of the payload area. Requires the write lock.
    pub(crate) fn payload_mut(&mut self) -> &mut [u8] {
        debug_assert!(self.locked);
        &mut self.buf[PARTITION_HEADER_SIZE..]
    }

    /// Update the row-count header. Requires the write lock.
    pub(crate) fn write_header(&mut self, rows: u64) {
        debug_assert!(self.locked);
        self.buf[..PARTITION_HEADER_SIZE].copy_from_slice(&rows.to_le_bytes());
    }

    /// Bytes in use, header included.
    pub fn size(&self) -> usize {
        PARTITION_HEADER_SIZE + self.bytes_written
    }

    /// Number of rows recorded in the header.
    pub fn num_rows(&self) -> u64 {
        u64::from_le_bytes(self.buf[..PARTITION_HEADER_SIZE].try_into().expect("header"))
    }

    /// The written part of the payload area.
    pub fn payload(&self) -> &[u8] {
        &self.buf[PARTITION_HEADER_SIZE..PARTITION_HEADER_SIZE + self.bytes_written]
    }
}

/// The partition allocator contract the writer draws from.
///
/// `hint` is an opaque dataset hint passed through to the memory manager;
/// callers that have none pass `None`.
pub trait Driver {
    fn alloc_writable_partition(
        &self,
        min_size: usize,
        schema: &Arc<Schema>,
        hint: Option<u64>,
    ) -> Result<Partition>;
}

/// In-memory allocator handing out fixed-size partitions, sized up when a
/// single row needs more.
#[derive(Debug)]
pub struct MemoryDriver {
    partition_size: usize,
    allocations: AtomicUsize,
}

impl MemoryDriver {
    pub fn new(partition_size: usize) -> MemoryDriver {
        MemoryDriver {
            partition_size,
            allocations: AtomicUsize::new(0),
        }
    }

    /// Number of partitions handed out so far.
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITION_SIZE)
    }
}

impl Driver for MemoryDriver {
    fn alloc_writable_partition(
        &self,
        min_size: usize,
        schema: &Arc<Schema>,
        _hint: Option<u64>,
    ) -> Result<Partition> {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        let capacity = min_size.max(self.partition_size);
        Ok(Partition::writable(Arc::clone(schema), capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::row(Type::I64))
    }

    #[test]
    fn test_alloc_and_lock_lifecycle() {
        let driver = MemoryDriver::new(64);
        let mut p = driver
            .alloc_writable_partition(16, &schema(), None)
            .unwrap();
        assert_eq!(p.payload_capacity(), 64);
        assert_eq!(p.capacity(), 64 + PARTITION_HEADER_SIZE);

        let raw = p.lock_write_raw().unwrap();
        raw[..8].copy_from_slice(&2u64.to_le_bytes());
        raw[8..16].copy_from_slice(&7i64.to_le_bytes());
        raw[16..24].copy_from_slice(&8i64.to_le_bytes());
        p.set_bytes_written(16);
        p.unlock_write();

        assert!(!p.is_locked());
        assert_eq!(p.num_rows(), 2);
        assert_eq!(p.size(), 24);
        assert_eq!(p.payload().len(), 16);
        assert_eq!(driver.allocations(), 1);
    }

    #[test]
    fn test_double_lock_is_rejected() {
        let driver = MemoryDriver::new(64);
        let mut p = driver.alloc_writable_partition(0, &schema(), None).unwrap();
        p.lock_write_raw().unwrap();
        assert!(p.lock_write_raw().is_err());
    }

    #[test]
    fn test_min_size_overrides_default() {
        let driver = MemoryDriver::new(32);
        let p = driver
            .alloc_writable_partition(100, &schema(), None)
            .unwrap();
        assert_eq!(p.payload_capacity(), 100);
    }
}

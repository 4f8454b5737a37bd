//! Host-agnostic core of the Hopper ingestion engine.
//!
//! `hopper-core` provides the engine-side pieces shared by every host
//! integration: the type lattice used to describe normal-case row types, the
//! row-major binary format, and the capacity-bounded partition buffers rows
//! are packed into.
//!
//! # Key Components
//!
//! - **Types**: the [`Type`] lattice of scalars, options, tuples, lists and
//!   mapping forms, with the sub-option relation and the super-option join
//!   used to collapse sampled types into a single normal-case type.
//!
//! - **Rows**: [`Row`] and [`Field`], dynamic row values with an exact
//!   binary encoding (fixed 8-byte slots, descriptor words, variable tail).
//!
//! - **Partitions**: [`Partition`] buffers allocated through the [`Driver`]
//!   contract, filled by a [`PartitionSink`] with reserve/commit appends and
//!   decoded back by [`decode_partitions`].
//!
//! # Design Philosophy
//!
//! This crate holds no host types and never inspects host objects. The
//! host-facing side (`hopper-host`) classifies and converts host values,
//! then drives the sink with raw bytes or prebuilt rows.

pub mod error;
pub mod partition;
pub mod reader;
pub mod row;
pub mod schema;
pub mod types;
pub mod writer;

pub use error::{CoreError, ErrorContext, Result};
pub use partition::{Driver, MemoryDriver, Partition, DEFAULT_PARTITION_SIZE, PARTITION_HEADER_SIZE};
pub use reader::{decode_partition, decode_partitions};
pub use row::{Field, Row};
pub use schema::{MemoryLayout, Schema};
pub use types::Type;
pub use writer::PartitionSink;

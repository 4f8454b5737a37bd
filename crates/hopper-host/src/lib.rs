//! Host-facing side of the Hopper ingestion engine.
//!
//! A scripting front-end owns a heterogeneous, dynamically typed in-memory
//! sequence; this crate turns it into typed, row-major binary partitions for
//! the native backend. Along the way it infers a single "normal-case" row
//! type from a sample, quarantines the values that violate it, and honors
//! caller-supplied schemas and column names.
//!
//! # Overview
//!
//! The crate is built from three layers:
//!
//! ## Host value model
//!
//! [`HostObject`] is the engine's view of a dynamic host value, and
//! [`ObjectRef`] the owning, reference-counted handle to one. Inspecting a
//! value requires the [`HostRuntime`] lock guard, which mirrors how a real
//! dynamic runtime gates object access behind its global lock. The runtime
//! also carries the interrupt flag the slow encoder polls.
//!
//! ## Inference
//!
//! [`infer::infer_type`] collapses a sampled type histogram into one
//! normal-case type, lifting minority nulls into options;
//! [`columns::infer_columns_from_dicts`] projects string-keyed mapping rows
//! onto a stable column list.
//!
//! ## Ingestion
//!
//! [`HostContext`] is the public entry point: `parallelize` for in-memory
//! sequences, `csv` and `text` for file sources, plus the option store and
//! small filesystem helpers. Specialized encoders cover the common row
//! types; everything else takes the generic slow path through
//! [`hopper_core::Row`].

pub mod backend;
pub mod columns;
pub mod context;
pub mod convert;
pub mod dataset;
pub mod encode;
pub mod error;
pub mod infer;
pub mod object;
pub mod options;
pub mod runtime;
pub mod util;

pub use backend::BackendContext;
pub use context::HostContext;
pub use dataset::Dataset;
pub use error::{HostError, Result};
pub use object::HostObject;
pub use options::ContextOptions;
pub use runtime::{HostRuntime, ObjectRef, RuntimeGuard};

//! Row encoders: one specialized fast path per common normal-case type, a
//! dict-as-tuple path, and the general slow path.
//!
//! All encoders share the same loop shape: walk the input sequence under the
//! runtime lock, write conforming elements through the partition sink, and
//! push `(index, owned-reference)` pairs for everything else onto the
//! quarantine list. A row is only ever committed whole; a fast-tuple row that
//! fails halfway through simply abandons its reservation.

use crate::backend::BackendContext;
use crate::convert;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::infer::classify;
use crate::object::HostObject;
use crate::runtime::{HostRuntime, ObjectRef, RuntimeGuard};
use hopper_core::{PartitionSink, Schema, Type};
use num::ToPrimitive;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `(input index, owned reference)` pairs for rows that did not conform to
/// the normal-case type. Entries hold exactly one reference each until the
/// orchestrator drains the list.
pub(crate) type Quarantine = Vec<(usize, ObjectRef)>;

const SLOT: usize = 8;

fn scalar_schema(ty: Type) -> Arc<Schema> {
    Arc::new(Schema::row(ty))
}

fn write_word(sink: &mut PartitionSink<'_>, word: u64) -> Result<()> {
    let region = sink.reserve(SLOT)?;
    region.copy_from_slice(&word.to_le_bytes());
    sink.commit_row(SLOT);
    Ok(())
}

/// Fast path for a bool column.
pub(crate) fn fast_bool_transfer(
    backend: &BackendContext,
    guard: &RuntimeGuard<'_>,
    seq: &[ObjectRef],
    columns: Vec<String>,
    quarantine: &mut Quarantine,
) -> Result<Dataset> {
    let schema = scalar_schema(Type::Bool);
    if seq.is_empty() {
        return Ok(backend.from_partitions(schema, Vec::new(), columns));
    }
    let mut sink = PartitionSink::new(backend.driver(), Arc::clone(&schema), SLOT)?;
    for (i, obj) in seq.iter().enumerate() {
        match obj.get(guard) {
            HostObject::Bool(b) => write_word(&mut sink, *b as u64)?,
            _ => quarantine.push((i, obj.clone())),
        }
    }
    Ok(backend.from_partitions(schema, sink.finish(), columns))
}

/// Fast path for an i64 column. With `auto_upcast`, bools widen to 0/1;
/// integers beyond 64 bits are quarantined.
pub(crate) fn fast_i64_transfer(
    backend: &BackendContext,
    guard: &RuntimeGuard<'_>,
    seq: &[ObjectRef],
    columns: Vec<String>,
    auto_upcast: bool,
    quarantine: &mut Quarantine,
) -> Result<Dataset> {
    let schema = scalar_schema(Type::I64);
    if seq.is_empty() {
        return Ok(backend.from_partitions(schema, Vec::new(), columns));
    }
    let mut sink = PartitionSink::new(backend.driver(), Arc::clone(&schema), SLOT)?;
    for (i, obj) in seq.iter().enumerate() {
        match obj.get(guard) {
            HostObject::Int(v) => match v.to_i64() {
                Some(v) => write_word(&mut sink, v as u64)?,
                None => quarantine.push((i, obj.clone())),
            },
            HostObject::Bool(b) if auto_upcast => write_word(&mut sink, *b as u64)?,
            _ => quarantine.push((i, obj.clone())),
        }
    }
    Ok(backend.from_partitions(schema, sink.finish(), columns))
}

/// Fast path for an f64 column. With `auto_upcast`, bools and 64-bit
/// integers widen to doubles.
pub(crate) fn fast_f64_transfer(
    backend: &BackendContext,
    guard: &RuntimeGuard<'_>,
    seq: &[ObjectRef],
    columns: Vec<String>,
    auto_upcast: bool,
    quarantine: &mut Quarantine,
) -> Result<Dataset> {
    let schema = scalar_schema(Type::F64);
    if seq.is_empty() {
        return Ok(backend.from_partitions(schema, Vec::new(), columns));
    }
    let mut sink = PartitionSink::new(backend.driver(), Arc::clone(&schema), SLOT)?;
    for (i, obj) in seq.iter().enumerate() {
        match obj.get(guard) {
            HostObject::Float(v) => write_word(&mut sink, v.to_bits())?,
            HostObject::Bool(b) if auto_upcast => write_word(&mut sink, (*b as u64 as f64).to_bits())?,
            HostObject::Int(v) if auto_upcast => match v.to_i64() {
                Some(v) => write_word(&mut sink, (v as f64).to_bits())?,
                None => quarantine.push((i, obj.clone())),
            },
            _ => quarantine.push((i, obj.clone())),
        }
    }
    Ok(backend.from_partitions(schema, sink.finish(), columns))
}

/// Fast path for a string column: descriptor word, total-varlen word, then
/// the NUL-terminated bytes.
pub(crate) fn fast_str_transfer(
    backend: &BackendContext,
    guard: &RuntimeGuard<'_>,
    seq: &[ObjectRef],
    columns: Vec<String>,
    quarantine: &mut Quarantine,
) -> Result<Dataset> {
    let schema = scalar_schema(Type::Str);
    if seq.is_empty() {
        return Ok(backend.from_partitions(schema, Vec::new(), columns));
    }
    let mut sink = PartitionSink::new(backend.driver(), Arc::clone(&schema), 2 * SLOT)?;
    for (i, obj) in seq.iter().enumerate() {
        match obj.get(guard) {
            HostObject::Str(s) => {
                let var_size = s.len() + 1;
                let required = 2 * SLOT + var_size;
                let region = sink.reserve(required)?;
                let descriptor = (2 * SLOT) as u64 | ((var_size as u64) << 32);
                region[..SLOT].copy_from_slice(&descriptor.to_le_bytes());
                region[SLOT..2 * SLOT].copy_from_slice(&(var_size as u64).to_le_bytes());
                region[2 * SLOT..2 * SLOT + s.len()].copy_from_slice(s.as_bytes());
                region[2 * SLOT + s.len()] = 0;
                sink.commit_row(required);
            }
            _ => quarantine.push((i, obj.clone())),
        }
    }
    Ok(backend.from_partitions(schema, sink.finish(), columns))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    Bool,
    Int,
    Float,
    Str,
}

fn scalar_kinds(params: &[Type]) -> Vec<ScalarKind> {
    params
        .iter()
        .map(|p| match p {
            Type::Bool => ScalarKind::Bool,
            Type::I64 => ScalarKind::Int,
            Type::F64 => ScalarKind::Float,
            Type::Str => ScalarKind::Str,
            other => unreachable!("non-scalar field {} on the fast tuple path", other),
        })
        .collect()
}

/// Fast path for tuples of simple scalars. Any field mismatch quarantines
/// the whole row; the reservation is simply never committed, so partial rows
/// cannot leak into a partition.
pub(crate) fn fast_tuple_transfer(
    backend: &BackendContext,
    guard: &RuntimeGuard<'_>,
    seq: &[ObjectRef],
    row_type: &Type,
    columns: Vec<String>,
    quarantine: &mut Quarantine,
) -> Result<Dataset> {
    let schema = Arc::new(Schema::row(row_type.clone()));
    if seq.is_empty() {
        return Ok(backend.from_partitions(schema, Vec::new(), columns));
    }
    let kinds = scalar_kinds(schema.row_type().params());
    let n = kinds.len();
    let has_varlen = kinds.contains(&ScalarKind::Str);
    let base_required = (n + has_varlen as usize) * SLOT;

    let mut sink = PartitionSink::new(backend.driver(), Arc::clone(&schema), base_required)?;
    'rows: for (i, obj) in seq.iter().enumerate() {
        let items = match obj.get(guard) {
            HostObject::Tuple(items) if items.len() == n => items,
            _ => {
                quarantine.push((i, obj.clone()));
                continue;
            }
        };

        // size the reservation: string fields must actually be strings
        let mut required = base_required;
        for (j, kind) in kinds.iter().enumerate() {
            if *kind == ScalarKind::Str {
                match items[j].get(guard) {
                    HostObject::Str(s) => required += s.len() + 1,
                    _ => {
                        quarantine.push((i, obj.clone()));
                        continue 'rows;
                    }
                }
            }
        }

        let region = sink.reserve(required)?;
        let mut row_var_sizes = 0usize;
        for (j, kind) in kinds.iter().enumerate() {
            let slot = j * SLOT;
            let word = match (kind, items[j].get(guard)) {
                (ScalarKind::Bool, HostObject::Bool(b)) => *b as u64,
                (ScalarKind::Int, HostObject::Int(v)) => match v.to_i64() {
                    Some(v) => v as u64,
                    None => {
                        quarantine.push((i, obj.clone()));
                        continue 'rows;
                    }
                },
                (ScalarKind::Float, HostObject::Float(v)) => v.to_bits(),
                (ScalarKind::Str, HostObject::Str(s)) => {
                    let var_size = s.len() + 1;
                    let offset = (n + 1 - j) * SLOT + row_var_sizes;
                    let payload = slot + offset;
                    region[payload..payload + s.len()].copy_from_slice(s.as_bytes());
                    region[payload + s.len()] = 0;
                    row_var_sizes += var_size;
                    offset as u64 | ((var_size as u64) << 32)
                }
                _ => {
                    quarantine.push((i, obj.clone()));
                    continue 'rows;
                }
            };
            region[slot..slot + SLOT].copy_from_slice(&word.to_le_bytes());
        }
        if has_varlen {
            region[n * SLOT..(n + 1) * SLOT]
                .copy_from_slice(&(row_var_sizes as u64).to_le_bytes());
        }
        sink.commit_row(required);
    }
    Ok(backend.from_partitions(schema, sink.finish(), columns))
}

/// Dict-as-tuple path: mapping rows are projected onto the column list and
/// written as tuples. Arity mismatches, missing keys and rows whose
/// projected type differs from the target all quarantine.
pub(crate) fn dict_transfer(
    backend: &BackendContext,
    guard: &RuntimeGuard<'_>,
    seq: &[ObjectRef],
    row_type: &Type,
    columns: &[String],
    quarantine: &mut Quarantine,
) -> Result<Dataset> {
    debug_assert_eq!(row_type.params().len(), columns.len());
    let schema = Arc::new(Schema::row(row_type.clone()));
    if seq.is_empty() {
        return Ok(backend.from_partitions(schema, Vec::new(), columns.to_vec()));
    }

    let mut sink = PartitionSink::new(backend.driver(), Arc::clone(&schema), SLOT)?;
    'rows: for (i, obj) in seq.iter().enumerate() {
        let pairs = match obj.get(guard) {
            HostObject::Dict(pairs) => pairs,
            _ => {
                quarantine.push((i, obj.clone()));
                continue;
            }
        };
        if pairs.len() != columns.len() {
            quarantine.push((i, obj.clone()));
            continue;
        }

        // project the mapping onto the column order; the temporary tuple
        // holds its own references until the end of the iteration
        let mut values: Vec<ObjectRef> = Vec::with_capacity(columns.len());
        for column in columns {
            let found = pairs.iter().find(|(key, _)| {
                matches!(key.get(guard), HostObject::Str(k) if k == column)
            });
            match found {
                Some((_, value)) => values.push(value.clone()),
                None => {
                    quarantine.push((i, obj.clone()));
                    continue 'rows;
                }
            }
        }

        let projected = Type::make_tuple(
            values
                .iter()
                .map(|v| classify(v.get(guard), guard))
                .collect(),
        );
        if &projected != row_type {
            quarantine.push((i, obj.clone()));
            continue;
        }

        let fields = values
            .iter()
            .zip(row_type.params().iter())
            .map(|(value, ty)| convert::field_from(value.get(guard), ty, guard))
            .collect::<Result<Vec<_>>>();
        let row = match fields.and_then(|fields| {
            Ok(hopper_core::Row::new(row_type.clone(), fields)?)
        }) {
            Ok(row) => row,
            Err(_) => {
                quarantine.push((i, obj.clone()));
                continue;
            }
        };

        let required = row.serialized_length()?;
        let region = sink.reserve(required)?;
        row.serialize_into(region)?;
        sink.commit_row(required);
    }
    Ok(backend.from_partitions(schema, sink.finish(), columns.to_vec()))
}

/// Fallback path for every other normal-case type. Converts each conforming
/// element into a generic row and serializes the batch at the end; polls the
/// interrupt flag between rows.
pub(crate) fn slow_transfer(
    backend: &BackendContext,
    runtime: &HostRuntime,
    guard: &RuntimeGuard<'_>,
    seq: &[ObjectRef],
    maj_type: &Type,
    columns: Vec<String>,
    quarantine: &mut Quarantine,
) -> Result<Dataset> {
    info!("using slow transfer to backend");
    debug!("transferring {} elements", seq.len());

    let mut rows = Vec::new();
    for (i, obj) in seq.iter().enumerate() {
        // this loop can be long; give the host's signal handling a chance
        // to cut it short between rows
        if runtime.interrupted() {
            // leave the flag set so the host's own handlers still run
            warn!("slow transfer to backend interrupted");
            quarantine.clear();
            rows.clear();
            return Ok(backend.make_error("interrupted transfer"));
        }

        let item = obj.clone();
        let item_type = classify(item.get(guard), guard);
        if item_type.is_sub_option(maj_type) {
            match convert::to_row(&item, maj_type, guard) {
                Ok(row) => rows.push(row),
                // conforming classification but unconvertible content, e.g.
                // an integer beyond 64 bits
                Err(_) => quarantine.push((i, item)),
            }
        } else {
            quarantine.push((i, item));
        }
    }

    backend.parallelize_rows(maj_type.clone(), rows, columns)
}

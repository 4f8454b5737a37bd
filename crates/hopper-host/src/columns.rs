use crate::error::{HostError, Result};
use crate::infer::{classify, infer_type};
use crate::object::HostObject;
use crate::runtime::{ObjectRef, RuntimeGuard};
use hopper_core::Type;
use indexmap::IndexMap;
use tracing::warn;

/// Derive a column list and per-column types from a sample of mapping rows.
///
/// Every string key seen in the sample is counted; a key is part of the
/// normal case when it appears in at least `ceil(normal_threshold *
/// num_dicts)` of the mapping rows, and its column type is inferred over its
/// pooled values. When no key survives the threshold, the first mapping row
/// whose keys are all strings serves as the schema; when there is no such
/// row either, inference is unrecoverable and the caller must supply a
/// schema.
///
/// The returned map enumerates columns in first-seen key order.
pub fn infer_columns_from_dicts(
    seq: &[ObjectRef],
    guard: &RuntimeGuard<'_>,
    normal_threshold: f64,
    optional_threshold: f64,
) -> Result<IndexMap<String, Type>> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    let mut pooled: IndexMap<String, Vec<ObjectRef>> = IndexMap::new();
    let mut num_dicts = 0usize;

    for obj in seq {
        if let HostObject::Dict(pairs) = obj.get(guard) {
            num_dicts += 1;
            for (key, value) in pairs {
                if let HostObject::Str(key) = key.get(guard) {
                    *counts.entry(key.clone()).or_insert(0) += 1;
                    pooled.entry(key.clone()).or_default().push(value.clone());
                }
            }
        }
    }

    let required = (normal_threshold * num_dicts as f64).ceil() as usize;
    let mut columns: IndexMap<String, Type> = IndexMap::new();
    for (key, count) in &counts {
        if *count >= required && *count > 0 {
            let column_type = infer_type(&pooled[key], guard, optional_threshold);
            columns.insert(key.clone(), column_type);
        }
    }

    if !columns.is_empty() {
        return Ok(columns);
    }

    // no key met the threshold: take the first fully string-keyed mapping
    // row as the schema
    warn!(
        "could not infer column names from sample according to threshold, \
         defaulting to the schema defined by the first row"
    );
    let fallback = seq.iter().find_map(|obj| match obj.get(guard) {
        HostObject::Dict(pairs)
            if !pairs.is_empty()
                && pairs
                    .iter()
                    .all(|(k, _)| matches!(k.get(guard), HostObject::Str(_))) =>
        {
            Some(pairs)
        }
        _ => None,
    });

    let pairs = fallback.ok_or_else(|| {
        HostError::inference("type inference from mapping rows failed, please provide a schema")
    })?;
    for (key, value) in pairs {
        if let HostObject::Str(key) = key.get(guard) {
            columns.insert(key.clone(), classify(value.get(guard), guard));
        }
    }
    Ok(columns)
}

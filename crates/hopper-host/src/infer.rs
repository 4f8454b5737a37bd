use crate::object::HostObject;
use crate::runtime::{ObjectRef, RuntimeGuard};
use ahash::RandomState;
use hopper_core::Type;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{info, warn};

/// Upper bound on how many rows the inferencer examines. Currently the whole
/// input; a smaller ceiling only changes how representative the histogram is.
const MAX_SAMPLE_ROWS: usize = usize::MAX;

/// Band parameter used when collapsing the pooled key/value samples of a
/// single mapping; classification has no access to the configured threshold.
const POOL_THRESHOLD: f64 = 0.9;

fn sample_size(len: usize) -> usize {
    len.min(MAX_SAMPLE_ROWS)
}

/// Classify a single host value to a ground type.
///
/// Tuples recurse into their elements. List element types are unified with
/// the super-option join, falling back to `[any]` for mixed lists. Mapping
/// key and value types are majority-collapsed over the pooled entries, so a
/// mapping with a stray value type still classifies as a concrete dict.
/// Empty mappings classify to their designated constant.
pub fn classify(value: &HostObject, guard: &RuntimeGuard<'_>) -> Type {
    match value {
        HostObject::None => Type::Null,
        HostObject::Bool(_) => Type::Bool,
        HostObject::Int(_) => Type::I64,
        HostObject::Float(_) => Type::F64,
        HostObject::Str(_) => Type::Str,
        HostObject::Opaque(_) => Type::Any,
        HostObject::Tuple(items) => Type::make_tuple(
            items
                .iter()
                .map(|item| classify(item.get(guard), guard))
                .collect(),
        ),
        HostObject::List(items) => match unify(items.iter(), guard) {
            Some(elem) => Type::List(Box::new(elem)),
            None => Type::List(Box::new(Type::Any)),
        },
        HostObject::Dict(pairs) => {
            if pairs.is_empty() {
                return Type::EmptyDict;
            }
            let keys = collapse_pool(pairs.iter().map(|(k, _)| k), guard);
            let values = collapse_pool(pairs.iter().map(|(_, v)| v), guard);
            match (keys, values) {
                (Type::Unknown, _) | (_, Type::Unknown) => Type::GenericDict,
                (k, v) => Type::Dict(Box::new(k), Box::new(v)),
            }
        }
    }
}

/// Join the classifications of a pooled sample of objects under the
/// super-option relation. `None` when the pool is empty or does not unify.
fn unify<'a>(
    mut objects: impl Iterator<Item = &'a ObjectRef>,
    guard: &RuntimeGuard<'_>,
) -> Option<Type> {
    let first = classify(objects.next()?.get(guard), guard);
    objects.try_fold(first, |acc, obj| {
        acc.super_option(&classify(obj.get(guard), guard))
    })
}

/// Majority-collapse the classifications of a pooled sample, so that a
/// mapping with mixed value types still gets a single representative value
/// type instead of falling out of the lattice.
fn collapse_pool<'a>(
    objects: impl Iterator<Item = &'a ObjectRef>,
    guard: &RuntimeGuard<'_>,
) -> Type {
    let mut histogram: HashMap<Type, usize, RandomState> = HashMap::default();
    let mut count = 0usize;
    for obj in objects {
        *histogram.entry(classify(obj.get(guard), guard)).or_insert(0) += 1;
        count += 1;
    }
    build_row_type_from_samples(&histogram, count, POOL_THRESHOLD)
}

/// Infer the normal-case row type of an input sequence from a sample.
///
/// `threshold` is the option-lifting band parameter: a minority of nulls (or
/// of tuple variants coverable by option lifting) whose fraction falls inside
/// `(1 - threshold, threshold)` is folded into the majority type instead of
/// being left for quarantine.
pub fn infer_type(seq: &[ObjectRef], guard: &RuntimeGuard<'_>, threshold: f64) -> Type {
    let num_sample = sample_size(seq.len());
    info!("inferring type from {} sampled rows", num_sample);

    let mut histogram: HashMap<Type, usize, RandomState> = HashMap::default();
    for obj in &seq[..num_sample] {
        *histogram.entry(classify(obj.get(guard), guard)).or_insert(0) += 1;
    }

    if histogram.len() > 1 {
        warn!("more than one type in column found");
    }

    build_row_type_from_samples(&histogram, num_sample, threshold)
}

/// Collapse a type histogram to a single normal-case type.
pub(crate) fn build_row_type_from_samples(
    histogram: &HashMap<Type, usize, RandomState>,
    num_samples: usize,
    threshold: f64,
) -> Type {
    let types: Vec<(&Type, usize)> = histogram.iter().map(|(t, c)| (t, *c)).collect();

    // frequency decides; ties resolve towards the structurally bigger type,
    // then by rendering so the result never depends on hash order
    let prefer = |candidate: &Type, count: usize, best: &Type, best_count: usize| {
        match count.cmp(&best_count) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => {
                if best.is_subclass(candidate) && candidate != best {
                    true
                } else if candidate.is_subclass(best) {
                    false
                } else {
                    candidate.to_string() < best.to_string()
                }
            }
        }
    };

    let mut max_count = 0usize;
    let mut maj_type = Type::Unknown;
    let mut max_tuple_count = 0usize;
    let mut maj_tuple_type: Option<&Type> = None;
    for &(ty, frequency) in &types {
        if maj_type == Type::Unknown || prefer(ty, frequency, &maj_type, max_count) {
            max_count = frequency;
            maj_type = ty.clone();
        }
        if ty.is_tuple() {
            match maj_tuple_type {
                Some(best) if !prefer(ty, frequency, best, max_tuple_count) => {}
                _ => {
                    max_tuple_count = frequency;
                    maj_tuple_type = Some(ty);
                }
            }
        }
    }

    // try to option-lift the fields of the majority tuple so that it covers
    // more of the sample than any single type does
    if let Some(maj_tuple) = maj_tuple_type {
        let mut super_tuple = maj_tuple.clone();
        let mut covered = 0usize;
        for &(ty, frequency) in &types {
            if let Some(joined) = ty.super_option(&super_tuple) {
                super_tuple = joined;
                covered += frequency;
            }
        }
        let fraction = (covered - histogram[maj_tuple]) as f64 / num_samples as f64;
        if covered > max_count && fraction > 1.0 - threshold && fraction < threshold {
            maj_type = super_tuple;
        }
    }

    // fold a suitable minority of nulls into the majority type
    if maj_type != Type::Unknown && maj_type != Type::Null {
        if let Some(&null_count) = histogram.get(&Type::Null) {
            let null_fraction = null_count as f64 / num_samples as f64;
            if null_fraction > 1.0 - threshold && null_fraction < threshold {
                maj_type = Type::make_option(maj_type);
            }
        }
    }

    maj_type
}

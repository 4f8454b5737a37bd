use crate::error::{HostError, Result};
use crate::object::HostObject;
use crate::runtime::{ObjectRef, RuntimeGuard};
use hopper_core::{Field, Row, Type};
use num::ToPrimitive;
use ordered_float::OrderedFloat;
use serde_json::{Map, Number, Value};

/// Convert a host object into a [`Row`] of the given row type.
///
/// Callers have already established that the object's classification is a
/// sub-option of the row type; anything that still does not fit (an integer
/// beyond 64 bits, a ragged nested container) comes back as an error so the
/// caller can quarantine the row instead of aborting the transfer.
pub fn to_row(obj: &ObjectRef, row_type: &Type, guard: &RuntimeGuard<'_>) -> Result<Row> {
    let fields = if row_type.is_tuple() {
        match obj.get(guard) {
            HostObject::Tuple(items) => {
                let params = row_type.params();
                if items.len() != params.len() {
                    return Err(conversion_error(obj.get(guard), row_type));
                }
                items
                    .iter()
                    .zip(params.iter())
                    .map(|(item, ty)| field_from(item.get(guard), ty, guard))
                    .collect::<Result<Vec<_>>>()?
            }
            other => return Err(conversion_error(other, row_type)),
        }
    } else {
        vec![field_from(obj.get(guard), row_type, guard)?]
    };
    Ok(Row::new(row_type.clone(), fields)?)
}

/// Convert one host value into a field of the target type.
pub fn field_from(value: &HostObject, target: &Type, guard: &RuntimeGuard<'_>) -> Result<Field> {
    match (value, target) {
        (HostObject::None, Type::Null) | (HostObject::None, Type::Option(_)) => Ok(Field::Null),
        (value, Type::Option(inner)) => field_from(value, inner, guard),
        (HostObject::Bool(b), Type::Bool) => Ok(Field::Bool(*b)),
        (HostObject::Int(v), Type::I64) => v
            .to_i64()
            .map(Field::Int)
            .ok_or_else(|| HostError::invalid_argument("integer does not fit into 64 bits")),
        (HostObject::Float(v), Type::F64) => Ok(Field::Float(OrderedFloat(*v))),
        (HostObject::Str(s), Type::Str) => Ok(Field::Str(s.as_str().into())),
        (HostObject::Tuple(items), Type::Tuple(params)) => {
            if items.len() != params.len() {
                return Err(conversion_error(value, target));
            }
            let fields = items
                .iter()
                .zip(params.iter())
                .map(|(item, ty)| field_from(item.get(guard), ty, guard))
                .collect::<Result<Vec<_>>>()?;
            Ok(Field::Tuple(fields))
        }
        (HostObject::List(items), Type::List(elem)) => {
            let fields = items
                .iter()
                .map(|item| field_from(item.get(guard), elem, guard))
                .collect::<Result<Vec<_>>>()?;
            Ok(Field::List(fields))
        }
        (HostObject::Dict(_), Type::Dict(_, _))
        | (HostObject::Dict(_), Type::EmptyDict)
        | (HostObject::Dict(_), Type::GenericDict) => {
            let json = json_of(value, guard)?;
            Ok(Field::Json(serde_json::to_string(&json)?))
        }
        (value, Type::Any) => Ok(Field::Opaque(value.to_string().into())),
        (value, target) => Err(conversion_error(value, target)),
    }
}

fn conversion_error(value: &HostObject, target: &Type) -> HostError {
    HostError::invalid_argument(format!(
        "cannot convert {} value to {}",
        value.type_name(),
        target
    ))
}

/// Render a host value as JSON, the carrier format for mapping payloads.
/// Non-string mapping keys become their display form.
fn json_of(value: &HostObject, guard: &RuntimeGuard<'_>) -> Result<Value> {
    Ok(match value {
        HostObject::None => Value::Null,
        HostObject::Bool(b) => Value::Bool(*b),
        HostObject::Int(v) => match v.to_i64() {
            Some(v) => Value::Number(v.into()),
            None => Value::String(v.to_string()),
        },
        HostObject::Float(v) => Number::from_f64(*v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        HostObject::Str(s) => Value::String(s.clone()),
        HostObject::Tuple(items) | HostObject::List(items) => Value::Array(
            items
                .iter()
                .map(|item| json_of(item.get(guard), guard))
                .collect::<Result<Vec<_>>>()?,
        ),
        HostObject::Dict(pairs) => {
            let mut map = Map::new();
            for (key, val) in pairs {
                let key = match key.get(guard) {
                    HostObject::Str(s) => s.clone(),
                    other => other.to_string(),
                };
                map.insert(key, json_of(val.get(guard), guard)?);
            }
            Value::Object(map)
        }
        HostObject::Opaque(repr) => Value::String(repr.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::HostRuntime;
    use num::BigInt;

    #[test]
    fn test_scalar_conversion() {
        let rt = HostRuntime::new();
        let guard = rt.lock();
        let row_type = Type::make_tuple(vec![Type::I64, Type::Str]);
        let obj = rt.tuple(vec![rt.int(7), rt.str("x")]);
        let row = to_row(&obj, &row_type, &guard).unwrap();
        assert_eq!(row.fields(), &[Field::Int(7), Field::Str("x".into())]);
    }

    #[test]
    fn test_scalar_sequences_wrap_into_unary_rows() {
        let rt = HostRuntime::new();
        let guard = rt.lock();
        let row = to_row(&rt.float(2.5), &Type::F64, &guard).unwrap();
        assert_eq!(row.row_type(), &Type::make_tuple(vec![Type::F64]));
        assert_eq!(row.fields().len(), 1);
    }

    #[test]
    fn test_option_targets_accept_both_sides() {
        let rt = HostRuntime::new();
        let guard = rt.lock();
        let target = Type::make_option(Type::Str);
        assert_eq!(
            field_from(rt.str("a").get(&guard), &target, &guard).unwrap(),
            Field::Str("a".into())
        );
        assert_eq!(
            field_from(rt.none().get(&guard), &target, &guard).unwrap(),
            Field::Null
        );
    }

    #[test]
    fn test_oversized_int_is_an_error_not_a_panic() {
        let rt = HostRuntime::new();
        let guard = rt.lock();
        let huge = rt.big_int(BigInt::from(u64::MAX) * 4);
        assert!(field_from(huge.get(&guard), &Type::I64, &guard).is_err());
    }

    #[test]
    fn test_dicts_become_json_payloads() {
        let rt = HostRuntime::new();
        let guard = rt.lock();
        let dict = rt.dict(vec![(rt.str("k"), rt.int(1))]);
        let field = field_from(dict.get(&guard), &Type::GenericDict, &guard).unwrap();
        assert_eq!(field, Field::Json("{\"k\":1}".to_string()));
    }

    #[test]
    fn test_anything_converts_to_any() {
        let rt = HostRuntime::new();
        let guard = rt.lock();
        let field = field_from(rt.opaque("<handle>").get(&guard), &Type::Any, &guard).unwrap();
        assert_eq!(field, Field::Opaque("<handle>".into()));
    }

    #[test]
    fn test_mismatch_is_an_error() {
        let rt = HostRuntime::new();
        let guard = rt.lock();
        assert!(field_from(rt.str("x").get(&guard), &Type::I64, &guard).is_err());
    }
}

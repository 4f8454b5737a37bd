use crate::error::{CoreError, Result};
use crate::partition::Partition;
use crate::row::{fixed_length, is_varlen, Field, Row, SLOT_SIZE};
use crate::types::Type;
use std::sync::Arc;

/// Decode every row of a partition chain, in order.
pub fn decode_partitions(partitions: &[Partition]) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    for partition in partitions {
        decode_partition(partition, &mut rows)?;
    }
    Ok(rows)
}

/// Decode one partition's payload into `out`.
pub fn decode_partition(partition: &Partition, out: &mut Vec<Row>) -> Result<()> {
    let row_type = partition.schema().row_type().clone();
    let params = row_type.params();
    let payload = partition.payload();
    let mut cursor = 0usize;
    for i in 0..partition.num_rows() {
        let (fields, consumed) = decode_fields(&payload[cursor..], params)
            .map_err(|e| CoreError::corrupt(format!("row {}: {}", i, e)))?;
        cursor += consumed;
        out.push(Row::new(row_type.clone(), fields)?);
    }
    if cursor != payload.len() {
        return Err(CoreError::corrupt(format!(
            "{} trailing payload bytes after {} rows",
            payload.len() - cursor,
            partition.num_rows()
        )));
    }
    Ok(())
}

fn read_word(buf: &[u8], pos: usize) -> Result<u64> {
    let bytes = buf
        .get(pos..pos + SLOT_SIZE)
        .ok_or_else(|| CoreError::corrupt("truncated fixed region"))?;
    Ok(u64::from_le_bytes(bytes.try_into().expect("slot")))
}

/// Decode one encoded field list, returning the values and the number of
/// bytes consumed (fixed region plus variable tail).
fn decode_fields(buf: &[u8], types: &[Type]) -> Result<(Vec<Field>, usize)> {
    let has_bitmask = types.iter().any(Type::is_option);
    if has_bitmask && types.len() > 64 {
        return Err(CoreError::unsupported(
            "rows with optional fields are limited to 64 columns",
        ));
    }
    let has_varlen = types.iter().any(is_varlen);
    let n = types.len();
    let bitmask_off = has_bitmask as usize;
    let fixed = fixed_length(types);
    if buf.len() < fixed {
        return Err(CoreError::corrupt("truncated fixed region"));
    }

    let bitmask = if has_bitmask { read_word(buf, 0)? } else { 0 };
    let varlen_total = if has_varlen {
        read_word(buf, (bitmask_off + n) * SLOT_SIZE)? as usize
    } else {
        0
    };
    let total = fixed + varlen_total;
    if buf.len() < total {
        return Err(CoreError::corrupt("variable-length tail out of bounds"));
    }

    let mut fields = Vec::with_capacity(n);
    for (j, ty) in types.iter().enumerate() {
        let slot_pos = (bitmask_off + j) * SLOT_SIZE;
        let effective = match ty {
            Type::Option(inner) => {
                if bitmask & (1 << j) != 0 {
                    fields.push(Field::Null);
                    continue;
                }
                inner.as_ref()
            }
            other => other,
        };
        let word = read_word(buf, slot_pos)?;
        let field = match effective {
            Type::Null => Field::Null,
            Type::Bool => Field::Bool(word != 0),
            Type::I64 => Field::Int(word as i64),
            Type::F64 => Field::Float(f64::from_bits(word).into()),
            ty if is_varlen(ty) => {
                let offset = (word & 0xFFFF_FFFF) as usize;
                let len = (word >> 32) as usize;
                let start = slot_pos + offset;
                if start + len > total {
                    return Err(CoreError::corrupt(format!(
                        "descriptor for field {} points outside the row",
                        j
                    )));
                }
                decode_payload(&buf[start..start + len], ty)?
            }
            other => {
                return Err(CoreError::corrupt(format!(
                    "cannot decode a value of type {}",
                    other
                )))
            }
        };
        fields.push(field);
    }
    Ok((fields, total))
}

fn decode_payload(payload: &[u8], ty: &Type) -> Result<Field> {
    match ty {
        Type::Str | Type::Any | Type::Dict(_, _) | Type::EmptyDict | Type::GenericDict => {
            let text = decode_text(payload)?;
            Ok(match ty {
                Type::Str => Field::Str(Arc::from(text)),
                Type::Any => Field::Opaque(Arc::from(text)),
                _ => Field::Json(text.to_string()),
            })
        }
        Type::Tuple(params) => {
            let (items, consumed) = decode_fields(payload, params)?;
            if consumed != payload.len() {
                return Err(CoreError::corrupt("nested tuple length mismatch"));
            }
            Ok(Field::Tuple(items))
        }
        Type::List(elem) => {
            if payload.len() < SLOT_SIZE {
                return Err(CoreError::corrupt("truncated list payload"));
            }
            let count = read_word(payload, 0)? as usize;
            let elem_types = vec![elem.as_ref().clone(); count];
            let (items, consumed) = decode_fields(&payload[SLOT_SIZE..], &elem_types)?;
            if SLOT_SIZE + consumed != payload.len() {
                return Err(CoreError::corrupt("list payload length mismatch"));
            }
            Ok(Field::List(items))
        }
        other => Err(CoreError::corrupt(format!(
            "no payload decoding for type {}",
            other
        ))),
    }
}

fn decode_text(payload: &[u8]) -> Result<&str> {
    match payload.split_last() {
        Some((0, bytes)) => Ok(std::str::from_utf8(bytes)?),
        _ => Err(CoreError::corrupt("text payload is not NUL-terminated")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::MemoryDriver;
    use crate::schema::Schema;
    use crate::writer::PartitionSink;
    use ordered_float::OrderedFloat;

    fn roundtrip(row_type: Type, rows: Vec<Vec<Field>>) -> Vec<Row> {
        let schema = Arc::new(Schema::row(row_type));
        let driver = MemoryDriver::new(64);
        let mut sink = PartitionSink::new(&driver, Arc::clone(&schema), 32).unwrap();
        let originals: Vec<Row> = rows
            .into_iter()
            .map(|fields| Row::new(schema.row_type().clone(), fields).unwrap())
            .collect();
        for row in &originals {
            sink.append_row(row).unwrap();
        }
        let partitions = sink.finish();
        let decoded = decode_partitions(&partitions).unwrap();
        assert_eq!(originals, decoded);
        decoded
    }

    #[test]
    fn test_roundtrip_scalars() {
        roundtrip(
            Type::make_tuple(vec![Type::I64, Type::F64, Type::Bool]),
            (0..10)
                .map(|i| {
                    vec![
                        Field::Int(i),
                        Field::Float(OrderedFloat(i as f64 * 0.5)),
                        Field::Bool(i % 2 == 0),
                    ]
                })
                .collect(),
        );
    }

    #[test]
    fn test_roundtrip_strings_across_partitions() {
        roundtrip(
            Type::Str,
            (0..20)
                .map(|i| vec![Field::Str(format!("value_{}", i).into())])
                .collect(),
        );
    }

    #[test]
    fn test_roundtrip_optional_fields() {
        roundtrip(
            Type::make_tuple(vec![Type::make_option(Type::Str), Type::I64]),
            vec![
                vec![Field::Str("a".into()), Field::Int(1)],
                vec![Field::Null, Field::Int(2)],
                vec![Field::Str("c".into()), Field::Int(3)],
            ],
        );
    }

    #[test]
    fn test_roundtrip_composites() {
        roundtrip(
            Type::make_tuple(vec![
                Type::List(Box::new(Type::Str)),
                Type::make_tuple(vec![Type::I64, Type::make_option(Type::I64)]),
                Type::GenericDict,
            ]),
            vec![vec![
                Field::List(vec![Field::Str("x".into()), Field::Str("yy".into())]),
                Field::Tuple(vec![Field::Int(1), Field::Null]),
                Field::Json("{\"k\":1}".to_string()),
            ]],
        );
    }

    #[test]
    fn test_empty_partition_decodes_to_nothing() {
        let schema = Arc::new(Schema::row(Type::I64));
        let driver = MemoryDriver::new(64);
        let sink = PartitionSink::new(&driver, schema, 32).unwrap();
        let partitions = sink.finish();
        assert_eq!(decode_partitions(&partitions).unwrap(), Vec::<Row>::new());
    }

    #[test]
    fn test_corrupt_descriptor_is_reported() {
        let schema = Arc::new(Schema::row(Type::Str));
        let driver = MemoryDriver::new(64);
        let mut sink = PartitionSink::new(&driver, Arc::clone(&schema), 32).unwrap();
        let region = sink.reserve(19).unwrap();
        // descriptor promising 100 payload bytes the row does not have
        let bogus = 16u64 | (100u64 << 32);
        region[0..8].copy_from_slice(&bogus.to_le_bytes());
        region[8..16].copy_from_slice(&3u64.to_le_bytes());
        sink.commit_row(19);
        let partitions = sink.finish();
        let err = decode_partitions(&partitions).unwrap_err();
        assert!(err.to_string().contains("descriptor"));
    }
}

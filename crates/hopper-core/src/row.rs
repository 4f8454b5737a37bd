use crate::error::{CoreError, Result};
use crate::types::Type;
use ordered_float::OrderedFloat;
use std::sync::Arc;

/// A single decoded field value.
///
/// Composite host values that the engine does not unpack (mappings and opaque
/// objects) are carried as text payloads: mappings as JSON, opaque objects as
/// their display form.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Arc<str>),
    Tuple(Vec<Field>),
    List(Vec<Field>),
    /// A mapping serialized to JSON text.
    Json(String),
    /// An opaque host object carried as its display form.
    Opaque(Arc<str>),
}

impl Field {
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Short name of the field's shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Field::Null => "null",
            Field::Bool(_) => "bool",
            Field::Int(_) => "i64",
            Field::Float(_) => "f64",
            Field::Str(_) => "str",
            Field::Tuple(_) => "tuple",
            Field::List(_) => "list",
            Field::Json(_) => "dict",
            Field::Opaque(_) => "any",
        }
    }
}

/// A typed row of field values with a row-major binary encoding.
///
/// The wire format per row:
///
/// 1. one 8-byte null-bitmask word, present only when the row type has an
///    optional top-level field (bit `j` set means field `j` is null);
/// 2. one 8-byte slot per field, in field order;
/// 3. one 8-byte word holding the total variable-length size of the row,
///    present only when some field is variable-length;
/// 4. the variable-length tail.
///
/// Fixed-width fields store their value directly in the slot (bools widened
/// to 0/1, floats as little-endian IEEE-754). Variable-length fields store a
/// descriptor word: low 32 bits hold the offset from the slot's own address
/// to the payload, high 32 bits the payload length. String-like payloads are
/// NUL-terminated; nested tuples recurse into the same format; lists prefix
/// an element count.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    row_type: Type,
    fields: Vec<Field>,
}

pub(crate) const SLOT_SIZE: usize = 8;

/// Whether values of this type live in the variable-length tail.
pub(crate) fn is_varlen(ty: &Type) -> bool {
    match ty {
        Type::Bool | Type::I64 | Type::F64 | Type::Null | Type::Unknown => false,
        Type::Option(inner) => is_varlen(inner),
        _ => true,
    }
}

/// Fixed-region length for a row of the given field types: optional bitmask,
/// one slot per field, optional total-varlen word.
pub(crate) fn fixed_length(types: &[Type]) -> usize {
    let bitmask = types.iter().any(Type::is_option) as usize;
    let varlen = types.iter().any(is_varlen) as usize;
    (bitmask + types.len() + varlen) * SLOT_SIZE
}

impl Row {
    /// Create a row, normalizing the row type to a tuple the way
    /// [`crate::Schema::row`] does.
    pub fn new(row_type: Type, fields: Vec<Field>) -> Result<Row> {
        let row_type = if row_type.is_tuple() {
            row_type
        } else {
            Type::make_tuple(vec![row_type])
        };
        let arity = row_type.params().len();
        if fields.len() != arity {
            return Err(CoreError::schema(format!(
                "row has {} fields but type {} has {}",
                fields.len(),
                row_type,
                arity
            )));
        }
        Ok(Row { row_type, fields })
    }

    pub fn row_type(&self) -> &Type {
        &self.row_type
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    /// Exact number of bytes [`Row::serialize_into`] will write.
    pub fn serialized_length(&self) -> Result<usize> {
        encoded_length(&self.fields, self.row_type.params())
    }

    /// Encode the row into `out`, which must hold at least
    /// [`Row::serialized_length`] bytes. Returns the number of bytes written.
    pub fn serialize_into(&self, out: &mut [u8]) -> Result<usize> {
        encode_fields(&self.fields, self.row_type.params(), out)
    }
}

pub(crate) fn encoded_length(fields: &[Field], types: &[Type]) -> Result<usize> {
    let mut total = fixed_length(types);
    for (field, ty) in fields.iter().zip(types.iter()) {
        total += payload_length(field, ty)?;
    }
    Ok(total)
}

fn payload_length(field: &Field, ty: &Type) -> Result<usize> {
    match (field, ty) {
        (Field::Null, Type::Option(_)) | (Field::Null, Type::Null) => Ok(0),
        (f, Type::Option(inner)) => payload_length(f, inner),
        (_, Type::Bool) | (_, Type::I64) | (_, Type::F64) => Ok(0),
        (Field::Str(s), Type::Str) => Ok(s.len() + 1),
        (Field::Opaque(s), Type::Any) => Ok(s.len() + 1),
        (Field::Json(s), Type::Dict(_, _))
        | (Field::Json(s), Type::EmptyDict)
        | (Field::Json(s), Type::GenericDict) => Ok(s.len() + 1),
        (Field::Tuple(items), Type::Tuple(params)) => encoded_length(items, params),
        (Field::List(items), Type::List(elem)) => {
            let elem_types = vec![elem.as_ref().clone(); items.len()];
            Ok(SLOT_SIZE + encoded_length(items, &elem_types)?)
        }
        (f, t) => Err(CoreError::serialize(format!(
            "cannot encode {} value as {}",
            f.kind(),
            t
        ))),
    }
}

/// Encode a field list into `out` using the row wire format. Returns the
/// number of bytes written.
pub(crate) fn encode_fields(fields: &[Field], types: &[Type], out: &mut [u8]) -> Result<usize> {
    if fields.len() != types.len() {
        return Err(CoreError::internal(format!(
            "field/type arity mismatch: {} vs {}",
            fields.len(),
            types.len()
        )));
    }
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
    if out.len() < fixed {
        return Err(CoreError::serialize("output buffer too small for row"));
    }

    let mut bitmask: u64 = 0;
    let mut tail_written = 0usize;
    for (j, (field, ty)) in fields.iter().zip(types.iter()).enumerate() {
        let slot_pos = (bitmask_off + j) * SLOT_SIZE;
        let word = match (field, unwrap_option(field, ty)?) {
            (Field::Null, _) => {
                if !ty.is_option() && *ty != Type::Null {
                    return Err(CoreError::serialize(format!(
                        "null value in non-nullable column of type {}",
                        ty
                    )));
                }
                bitmask |= 1 << j;
                0u64
            }
            (Field::Bool(b), Type::Bool) => *b as u64,
            (Field::Int(v), Type::I64) => *v as u64,
            (Field::Float(v), Type::F64) => v.into_inner().to_bits(),
            (field, ty) => {
                // variable-length: payload goes at the current tail position
                let payload_len = payload_length(field, ty)?;
                let payload_pos = fixed + tail_written;
                if out.len() < payload_pos + payload_len {
                    return Err(CoreError::serialize("output buffer too small for row"));
                }
                write_payload(field, ty, &mut out[payload_pos..payload_pos + payload_len])?;
                let offset = payload_pos - slot_pos;
                if offset > u32::MAX as usize || payload_len > u32::MAX as usize {
                    return Err(CoreError::serialize("variable-length field exceeds 4GiB"));
                }
                tail_written += payload_len;
                offset as u64 | ((payload_len as u64) << 32)
            }
        };
        out[slot_pos..slot_pos + SLOT_SIZE].copy_from_slice(&word.to_le_bytes());
    }

    if has_bitmask {
        out[0..SLOT_SIZE].copy_from_slice(&bitmask.to_le_bytes());
    }
    if has_varlen {
        let varlen_pos = (bitmask_off + n) * SLOT_SIZE;
        out[varlen_pos..varlen_pos + SLOT_SIZE]
            .copy_from_slice(&(tail_written as u64).to_le_bytes());
    }
    Ok(fixed + tail_written)
}

/// Resolve the effective storage type of a field, looking through options for
/// non-null values. Nulls are handled by the caller via the bitmask.
fn unwrap_option<'t>(field: &Field, ty: &'t Type) -> Result<&'t Type> {
    match ty {
        Type::Option(inner) if !field.is_null() => Ok(inner.as_ref()),
        Type::Null if !field.is_null() => Err(CoreError::serialize(format!(
            "cannot encode {} value as null",
            field.kind()
        ))),
        _ => Ok(ty),
    }
}

fn write_payload(field: &Field, ty: &Type, out: &mut [u8]) -> Result<()> {
    match (field, ty) {
        (Field::Str(s), Type::Str) => write_text(s.as_bytes(), out),
        (Field::Opaque(s), Type::Any) => write_text(s.as_bytes(), out),
        (Field::Json(s), Type::Dict(_, _))
        | (Field::Json(s), Type::EmptyDict)
        | (Field::Json(s), Type::GenericDict) => write_text(s.as_bytes(), out),
        (Field::Tuple(items), Type::Tuple(params)) => {
            encode_fields(items, params, out)?;
            Ok(())
        }
        (Field::List(items), Type::List(elem)) => {
            out[0..SLOT_SIZE].copy_from_slice(&(items.len() as u64).to_le_bytes());
            let elem_types = vec![elem.as_ref().clone(); items.len()];
            encode_fields(items, &elem_types, &mut out[SLOT_SIZE..])?;
            Ok(())
        }
        (f, t) => Err(CoreError::serialize(format!(
            "cannot encode {} value as {}",
            f.kind(),
            t
        ))),
    }
}

fn write_text(bytes: &[u8], out: &mut [u8]) -> Result<()> {
    out[..bytes.len()].copy_from_slice(bytes);
    out[bytes.len()] = 0;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn str_field(s: &str) -> Field {
        Field::Str(Arc::from(s))
    }

    #[test]
    fn test_fixed_scalar_row_layout() {
        let row = Row::new(
            Type::make_tuple(vec![Type::I64, Type::F64, Type::Bool]),
            vec![Field::Int(-7), Field::Float(OrderedFloat(1.5)), Field::Bool(true)],
        )
        .unwrap();
        assert_eq!(row.serialized_length().unwrap(), 24);

        let mut buf = vec![0u8; 24];
        assert_eq!(row.serialize_into(&mut buf).unwrap(), 24);
        assert_eq!(i64::from_le_bytes(buf[0..8].try_into().unwrap()), -7);
        assert_eq!(f64::from_le_bytes(buf[8..16].try_into().unwrap()), 1.5);
        assert_eq!(u64::from_le_bytes(buf[16..24].try_into().unwrap()), 1);
    }

    #[test]
    fn test_string_descriptor_layout() {
        // one string field: slot, total-varlen word, then "hi\0"
        let row = Row::new(Type::Str, vec![str_field("hi")]).unwrap();
        assert_eq!(row.serialized_length().unwrap(), 8 + 8 + 3);

        let mut buf = vec![0u8; 19];
        row.serialize_into(&mut buf).unwrap();

        let word = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let offset = (word & 0xFFFF_FFFF) as usize;
        let len = (word >> 32) as usize;
        assert_eq!(offset, 16);
        assert_eq!(len, 3);
        assert_eq!(u64::from_le_bytes(buf[8..16].try_into().unwrap()), 3);
        assert_eq!(&buf[16..19], b"hi\0");
    }

    #[test]
    fn test_two_strings_offsets_are_slot_relative() {
        let row = Row::new(
            Type::make_tuple(vec![Type::Str, Type::Str]),
            vec![str_field("ab"), str_field("c")],
        )
        .unwrap();
        let mut buf = vec![0u8; row.serialized_length().unwrap()];
        row.serialize_into(&mut buf).unwrap();

        // field 0: two remaining slots + varlen word ahead of its payload
        let w0 = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        assert_eq!(w0 & 0xFFFF_FFFF, 24);
        assert_eq!(w0 >> 32, 3);
        // field 1: one slot + varlen word ahead, plus field 0's payload
        let w1 = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        assert_eq!(w1 & 0xFFFF_FFFF, 16 + 3);
        assert_eq!(w1 >> 32, 2);
        assert_eq!(u64::from_le_bytes(buf[16..24].try_into().unwrap()), 5);
        assert_eq!(&buf[24..29], b"ab\0c\0");
    }

    #[test]
    fn test_optional_field_bitmask() {
        let ty = Type::make_tuple(vec![
            Type::make_option(Type::I64),
            Type::make_option(Type::I64),
        ]);
        let row = Row::new(ty, vec![Field::Null, Field::Int(9)]).unwrap();
        // bitmask word + two slots, no varlen
        assert_eq!(row.serialized_length().unwrap(), 24);

        let mut buf = vec![0u8; 24];
        row.serialize_into(&mut buf).unwrap();
        assert_eq!(u64::from_le_bytes(buf[0..8].try_into().unwrap()), 0b01);
        assert_eq!(i64::from_le_bytes(buf[16..24].try_into().unwrap()), 9);
    }

    #[test]
    fn test_null_optional_string_has_no_payload() {
        let ty = Type::make_tuple(vec![Type::make_option(Type::Str)]);
        let row = Row::new(ty.clone(), vec![Field::Null]).unwrap();
        // bitmask + slot + varlen word, empty tail
        assert_eq!(row.serialized_length().unwrap(), 24);

        let with_value = Row::new(ty, vec![str_field("x")]).unwrap();
        assert_eq!(with_value.serialized_length().unwrap(), 26);
    }

    #[test]
    fn test_nested_tuple_payload() {
        let ty = Type::make_tuple(vec![
            Type::I64,
            Type::make_tuple(vec![Type::I64, Type::Str]),
        ]);
        let row = Row::new(
            ty,
            vec![
                Field::Int(1),
                Field::Tuple(vec![Field::Int(2), str_field("z")]),
            ],
        )
        .unwrap();
        // outer: 2 slots + varlen word; inner blob: 2 slots + varlen word + "z\0"
        assert_eq!(row.serialized_length().unwrap(), 24 + 26);
        let mut buf = vec![0u8; 50];
        assert_eq!(row.serialize_into(&mut buf).unwrap(), 50);
    }

    #[test]
    fn test_list_payload_has_count() {
        let ty = Type::make_tuple(vec![Type::List(Box::new(Type::I64))]);
        let row = Row::new(ty, vec![Field::List(vec![Field::Int(1), Field::Int(2)])]).unwrap();
        // slot + varlen word + (count + 2 element slots)
        assert_eq!(row.serialized_length().unwrap(), 16 + 24);
        let mut buf = vec![0u8; 40];
        row.serialize_into(&mut buf).unwrap();
        assert_eq!(u64::from_le_bytes(buf[16..24].try_into().unwrap()), 2);
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let row = Row::new(Type::I64, vec![str_field("oops")]).unwrap();
        assert!(row.serialized_length().is_err());
    }

    #[test]
    fn test_arity_mismatch_is_rejected() {
        assert!(Row::new(
            Type::make_tuple(vec![Type::I64, Type::I64]),
            vec![Field::Int(1)]
        )
        .is_err());
    }
}

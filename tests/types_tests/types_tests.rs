//! Tests for Types and Values
//!
//! These tests verify:
//! - Serialized sizes of scalar and array types
//! - Little-endian value encoding
//! - Type conformance for single values and runs
//! - Type descriptor encoding

use numstore::{NumstoreError, Type, Value};

// =============================================================================
// Size Tests
// =============================================================================

#[test]
fn test_byte_size() {
    assert_eq!(Type::U8.byte_size(), 1);
    assert_eq!(Type::Bool.byte_size(), 1);
    assert_eq!(Type::I16.byte_size(), 2);
    assert_eq!(Type::F32.byte_size(), 4);
    assert_eq!(Type::U64.byte_size(), 8);
    assert_eq!(Type::array(Type::F64, 3).byte_size(), 24);
    assert_eq!(Type::array(Type::array(Type::U16, 4), 2).byte_size(), 16);
    assert_eq!(Type::array(Type::U32, 0).byte_size(), 0);
}

#[test]
fn test_byte_size_overflow() {
    let huge = Type::array(Type::array(Type::U64, u32::MAX), u32::MAX);
    assert_eq!(huge.checked_byte_size(), None);
    assert_eq!(huge.byte_size(), u64::MAX);

    let big = Type::array(Type::U64, u32::MAX);
    assert_eq!(big.checked_byte_size(), Some(8 * u32::MAX as u64));
}

#[test]
fn test_display() {
    assert_eq!(Type::I32.to_string(), "i32");
    assert_eq!(Type::array(Type::F32, 3).to_string(), "[f32; 3]");
}

// =============================================================================
// Serialization Tests
// =============================================================================

#[test]
fn test_serialize_little_endian() {
    assert_eq!(Value::U16(0x0102).serialize(), vec![0x02, 0x01]);
    assert_eq!(Value::I32(-2).serialize(), vec![0xFE, 0xFF, 0xFF, 0xFF]);
    assert_eq!(Value::F32(1.0).serialize(), 1.0f32.to_le_bytes());
    assert_eq!(Value::Bool(true).serialize(), vec![1]);
}

#[test]
fn test_serialize_array_concatenates() {
    let value = Value::Array(vec![Value::U8(1), Value::U8(2), Value::U8(3)]);
    assert_eq!(value.serialized_len(), 3);
    assert_eq!(value.serialize(), vec![1, 2, 3]);
}

#[test]
fn test_serialize_into_reports_written() {
    let mut buf = [0u8; 16];
    let written = Value::U64(7).serialize_into(&mut buf);
    assert_eq!(written, 8);
    assert_eq!(&buf[..8], &7u64.to_le_bytes());
}

#[test]
fn test_deserialize() {
    let ty = Type::array(Type::I16, 2);
    let value = Value::deserialize(&[1, 0, 0xFF, 0xFF], &ty).unwrap();
    assert_eq!(value, Value::Array(vec![Value::I16(1), Value::I16(-1)]));

    assert!(matches!(
        Value::deserialize(&[1, 0, 0], &ty),
        Err(NumstoreError::Serialization(_))
    ));
}

#[test]
fn test_deserialize_all() {
    let bytes: Vec<u8> = [10u32, 20, 30].iter().flat_map(|v| v.to_le_bytes()).collect();
    let values = Value::deserialize_all(&bytes, &Type::U32).unwrap();
    assert_eq!(values, vec![Value::U32(10), Value::U32(20), Value::U32(30)]);

    assert!(Value::deserialize_all(&bytes[..5], &Type::U32).is_err());
    assert!(Value::deserialize_all(&[], &Type::U32).unwrap().is_empty());
}

#[test]
fn test_invalid_bool_byte() {
    assert!(matches!(
        Value::deserialize(&[2], &Type::Bool),
        Err(NumstoreError::Serialization(_))
    ));
}

// =============================================================================
// Conformance Tests
// =============================================================================

#[test]
fn test_scalar_conformance() {
    assert!(Value::U8(1).conforms_to(&Type::U8));
    assert!(!Value::U8(1).conforms_to(&Type::I8));
    assert!(!Value::F64(1.0).conforms_to(&Type::F32));
}

#[test]
fn test_run_conformance() {
    let run = Value::Array(vec![Value::U32(1), Value::U32(2)]);
    assert!(run.conforms_to(&Type::U32));
    assert!(!run.has_type(&Type::U32));

    let mixed = Value::Array(vec![Value::U32(1), Value::U16(2)]);
    assert!(!mixed.conforms_to(&Type::U32));

    assert!(!Value::Array(vec![]).conforms_to(&Type::U32));
}

#[test]
fn test_strict_array_conformance() {
    let ty = Type::array(Type::U8, 2);
    let pair = Value::Array(vec![Value::U8(1), Value::U8(2)]);
    let triple = Value::Array(vec![Value::U8(1), Value::U8(2), Value::U8(3)]);

    assert!(pair.has_type(&ty));
    assert!(Value::Array(vec![pair.clone(), pair]).conforms_to(&ty));
    assert!(!triple.conforms_to(&ty));
}

// =============================================================================
// Descriptor Tests
// =============================================================================

#[test]
fn test_type_descriptor_round_trip() {
    for ty in [
        Type::U8,
        Type::F64,
        Type::Bool,
        Type::array(Type::array(Type::I64, 3), 7),
    ] {
        let encoded = ty.encode().unwrap();
        assert_eq!(Type::decode(&encoded).unwrap(), ty);
    }
}

#[test]
fn test_type_descriptor_garbage_rejected() {
    assert!(matches!(
        Type::decode(&[0xFF, 0xFF, 0xFF, 0xFF]),
        Err(NumstoreError::Serialization(_))
    ));
}

use hopper_core::*;
use std::sync::Arc;

fn str_rows(values: &[&str]) -> Vec<Row> {
    values
        .iter()
        .map(|v| Row::new(Type::Str, vec![Field::Str((*v).into())]).unwrap())
        .collect()
}

// =============================================================================
// Round-trip Behavior
// =============================================================================

#[test]
fn roundtrip_i64_rows_small_partitions() {
    let schema = Arc::new(Schema::row(Type::I64));
    let driver = MemoryDriver::new(32);
    let mut sink = PartitionSink::new(&driver, Arc::clone(&schema), 16).unwrap();

    let rows: Vec<Row> = (0..100)
        .map(|i| Row::new(Type::I64, vec![Field::Int(i)]).unwrap())
        .collect();
    for row in &rows {
        sink.append_row(row).unwrap();
    }
    let partitions = sink.finish();
    assert!(partitions.len() > 1, "expected the chain to roll over");
    assert_eq!(
        partitions.iter().map(|p| p.num_rows()).sum::<u64>(),
        rows.len() as u64
    );

    let decoded = decode_partitions(&partitions).unwrap();
    assert_eq!(decoded, rows);
}

#[test]
fn roundtrip_strings_preserve_order() {
    let schema = Arc::new(Schema::row(Type::Str));
    let driver = MemoryDriver::new(48);
    let mut sink = PartitionSink::new(&driver, Arc::clone(&schema), 48).unwrap();

    let rows = str_rows(&["alpha", "", "a longer string that spills partitions", "tail"]);
    for row in &rows {
        sink.append_row(row).unwrap();
    }
    let decoded = decode_partitions(&sink.finish()).unwrap();
    assert_eq!(decoded, rows);
}

// =============================================================================
// Descriptor Validity
// =============================================================================

#[test]
fn string_descriptors_stay_inside_partition_and_end_with_nul() {
    let schema = Arc::new(Schema::row(Type::make_tuple(vec![Type::I64, Type::Str])));
    let driver = MemoryDriver::new(1024);
    let mut sink = PartitionSink::new(&driver, Arc::clone(&schema), 256).unwrap();

    for i in 0..10 {
        let row = Row::new(
            schema.row_type().clone(),
            vec![Field::Int(i), Field::Str(format!("name_{}", i).into())],
        )
        .unwrap();
        sink.append_row(&row).unwrap();
    }
    let partitions = sink.finish();

    for partition in &partitions {
        let payload = partition.payload();
        let mut cursor = 0;
        for _ in 0..partition.num_rows() {
            // layout: i64 slot, str descriptor slot, varlen word, tail
            let slot_pos = cursor + 8;
            let word = u64::from_le_bytes(payload[slot_pos..slot_pos + 8].try_into().unwrap());
            let offset = (word & 0xFFFF_FFFF) as usize;
            let len = (word >> 32) as usize;
            let start = slot_pos + offset;

            assert!(start + len <= partition.capacity() - PARTITION_HEADER_SIZE);
            assert_eq!(payload[start + len - 1], 0x00);

            let varlen = u64::from_le_bytes(payload[cursor + 16..cursor + 24].try_into().unwrap());
            cursor += 24 + varlen as usize;
        }
    }
}

// =============================================================================
// Partition Lifecycle
// =============================================================================

#[test]
fn header_count_matches_rows_even_when_empty() {
    let schema = Arc::new(Schema::row(Type::Bool));
    let driver = MemoryDriver::new(64);
    let sink = PartitionSink::new(&driver, schema, 64).unwrap();
    let partitions = sink.finish();

    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].num_rows(), 0);
    assert_eq!(partitions[0].size(), PARTITION_HEADER_SIZE);
    assert!(!partitions[0].is_locked());
}

#[test]
fn schema_is_shared_across_the_chain() {
    let schema = Arc::new(Schema::row(Type::I64));
    let driver = MemoryDriver::new(16);
    let mut sink = PartitionSink::new(&driver, Arc::clone(&schema), 8).unwrap();
    for i in 0..6 {
        sink.append_row(&Row::new(Type::I64, vec![Field::Int(i)]).unwrap())
            .unwrap();
    }
    let partitions = sink.finish();
    assert!(partitions.len() > 1);
    for partition in &partitions {
        assert!(Arc::ptr_eq(partition.schema(), &schema));
    }
}

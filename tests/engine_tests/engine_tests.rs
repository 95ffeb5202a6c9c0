//! Tests for Engine
//!
//! These tests verify:
//! - Typed statement wrappers and raw query execution
//! - Persistence across close/reopen
//! - Config validation and page size handling on reopen
//! - Corruption surfacing through statements
//! - Concurrent access through a shared engine

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;
use std::thread;

use numstore::{Config, Engine, ErrorClass, NumstoreError, Query, SyncStrategy, Type, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn small_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .path(temp_dir.path().join("engine.db"))
        .page_size(256)
        .sync_strategy(SyncStrategy::EveryStatement)
        .max_value_bytes(64 * 1024)
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(small_config(&temp_dir)).unwrap();
    (temp_dir, engine)
}

fn i32s(values: impl IntoIterator<Item = i32>) -> Value {
    Value::Array(values.into_iter().map(Value::I32).collect())
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_create_append_read() {
    let (_temp, engine) = setup_temp_engine();

    engine.create("series", Type::I32).unwrap();
    engine.append("series", i32s([-1, 0, 1])).unwrap();

    let bytes = engine.read("series", 4, 8).unwrap();
    assert_eq!(bytes, [0i32.to_le_bytes(), 1i32.to_le_bytes()].concat());
    assert_eq!(engine.info("series").unwrap().length, 12);
}

#[test]
fn test_engine_read_values() {
    let (_temp, engine) = setup_temp_engine();

    engine.create("series", Type::I32).unwrap();
    engine.append("series", i32s(0..100)).unwrap();

    let values = engine.read_values("series", 10, 3).unwrap();
    assert_eq!(values, vec![Value::I32(10), Value::I32(11), Value::I32(12)]);

    // Past the end is clamped
    let tail = engine.read_values("series", 98, 10).unwrap();
    assert_eq!(tail, vec![Value::I32(98), Value::I32(99)]);
}

#[test]
fn test_engine_insert_and_remove() {
    let (_temp, engine) = setup_temp_engine();

    engine.create("v", Type::I32).unwrap();
    engine.append("v", i32s([1, 2, 5])).unwrap();
    engine.insert("v", i32s([3, 4]), 8).unwrap();

    let removed = engine.remove("v", 0, 4).unwrap();
    assert_eq!(removed, 1i32.to_le_bytes());
    assert_eq!(
        engine.read_values("v", 0, 10).unwrap(),
        vec![Value::I32(2), Value::I32(3), Value::I32(4), Value::I32(5)]
    );
}

#[test]
fn test_engine_write_and_strided_access() {
    let (_temp, engine) = setup_temp_engine();

    engine.create("grid", Type::I32).unwrap();
    engine.append("grid", i32s(0..12)).unwrap();

    // Column 1 of a 4-wide grid
    engine.write("grid", i32s([-1, -5]), 4).unwrap();
    let column = engine.read_strided("grid", 4, 12, 4).unwrap();
    let expected: Vec<u8> = [-1i32, 5, 9].iter().flat_map(|v| v.to_le_bytes()).collect();
    assert_eq!(column, expected);
    assert_eq!(engine.info("grid").unwrap().length, 48);

    // Drop column 3
    let removed = engine.remove_strided("grid", 12, 12, 4).unwrap();
    let expected: Vec<u8> = [3i32, 7, 11].iter().flat_map(|v| v.to_le_bytes()).collect();
    assert_eq!(removed, expected);
    assert_eq!(
        engine.read_values("grid", 0, 9).unwrap(),
        vec![0, -1, -5, 4, 5, 6, 8, 9, 10].into_iter().map(Value::I32).collect::<Vec<_>>()
    );
    engine.check("grid").unwrap();
}

#[test]
fn test_engine_execute_query() {
    let (_temp, engine) = setup_temp_engine();

    let create = Query::Create {
        name: "flags".to_string(),
        ty: Type::Bool,
    };
    assert_eq!(engine.execute(create).unwrap(), None);

    let append = Query::Append {
        name: "flags".to_string(),
        value: Value::Array(vec![Value::Bool(true), Value::Bool(false)]),
    };
    assert_eq!(engine.execute(append).unwrap(), None);

    let read = Query::read("flags", 0, 2);
    assert_eq!(engine.execute(read).unwrap(), Some(vec![1, 0]));
}

#[test]
fn test_engine_delete_and_list() {
    let (_temp, engine) = setup_temp_engine();

    engine.create("b", Type::U8).unwrap();
    engine.create("a", Type::F32).unwrap();
    engine.create("c", Type::U64).unwrap();
    engine.delete("b").unwrap();

    let names: Vec<String> = engine.list().unwrap().into_iter().map(|v| v.name).collect();
    assert_eq!(names, vec!["a", "c"]);

    let err = engine.delete("b").unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[test]
fn test_engine_rejected_statement_changes_nothing() {
    let (_temp, engine) = setup_temp_engine();
    engine.create("v", Type::U16).unwrap();
    engine.append("v", Value::U16(1)).unwrap();

    let pages = engine.page_count();
    let free = engine.free_list_len();

    assert!(matches!(
        engine.append("v", Value::U32(1)),
        Err(NumstoreError::TypeMismatch(_))
    ));
    assert!(matches!(
        engine.insert("v", Value::U16(1), 1),
        Err(NumstoreError::TypeMismatch(_))
    ));
    assert!(matches!(
        engine.create("v", Type::U16),
        Err(NumstoreError::AlreadyExists(_))
    ));

    assert_eq!(engine.page_count(), pages);
    assert_eq!(engine.free_list_len(), free);
    assert_eq!(engine.read("v", 0, 100).unwrap(), vec![1, 0]);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_engine_reopen_preserves_variables() {
    let temp_dir = TempDir::new().unwrap();
    let expected: Vec<Value> = (0..2_000).map(Value::I32).collect();

    {
        let engine = Engine::open(small_config(&temp_dir)).unwrap();
        engine.create("big", Type::I32).unwrap();
        engine.create("small", Type::U8).unwrap();
        for chunk in expected.chunks(250) {
            engine.append("big", Value::Array(chunk.to_vec())).unwrap();
        }
        engine.append("small", Value::U8(42)).unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(small_config(&temp_dir)).unwrap();
    assert_eq!(engine.list().unwrap().len(), 2);
    assert_eq!(engine.read_values("big", 0, 2_000).unwrap(), expected);
    assert_eq!(engine.read("small", 0, 1).unwrap(), vec![42]);

    let stats = engine.check("big").unwrap();
    assert_eq!(stats.length, 8_000);
    assert!(stats.height >= 2);
}

#[test]
fn test_engine_manual_sync_then_flush() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("manual.db"))
        .sync_strategy(SyncStrategy::Manual)
        .build();

    {
        let engine = Engine::open(config.clone()).unwrap();
        engine.create("v", Type::U64).unwrap();
        engine.append("v", Value::U64(u64::MAX)).unwrap();
        engine.flush().unwrap();
    }

    let engine = Engine::open(config).unwrap();
    assert_eq!(engine.read_values("v", 0, 1).unwrap(), vec![Value::U64(u64::MAX)]);
}

#[test]
fn test_engine_existing_page_size_wins() {
    let temp_dir = TempDir::new().unwrap();
    drop(Engine::open(small_config(&temp_dir)).unwrap());

    let config = Config {
        page_size: 4096,
        ..small_config(&temp_dir)
    };
    let engine = Engine::open(config).unwrap();
    assert_eq!(engine.config().page_size, 256);
}

#[test]
fn test_engine_open_path_convenience() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("default.db");

    let engine = Engine::open_path(&path).unwrap();
    engine.create("x", Type::U8).unwrap();

    assert_eq!(engine.config().path, path);
    assert_eq!(engine.config().page_size, 4096);
    assert!(path.exists());
}

#[test]
fn test_engine_invalid_config_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        page_size: 1000,
        ..small_config(&temp_dir)
    };
    assert!(matches!(Engine::open(config), Err(NumstoreError::Config(_))));

    let config = Config {
        max_name_len: 0,
        ..small_config(&temp_dir)
    };
    assert!(matches!(Engine::open(config), Err(NumstoreError::Config(_))));
}

#[test]
fn test_engine_max_pages_out_of_space() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("capped.db"))
        .page_size(128)
        .max_pages(6)
        .build();
    let engine = Engine::open(config).unwrap();

    engine.create("v", Type::U8).unwrap();
    let err = engine
        .append("v", Value::Array(vec![Value::U8(1); 1_000]))
        .unwrap_err();
    assert!(matches!(err, NumstoreError::OutOfSpace(_)));
    assert_eq!(err.class(), ErrorClass::Structural);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_engine_reports_corrupt_leaf() {
    let temp_dir = TempDir::new().unwrap();
    let leaf;
    {
        let engine = Engine::open(small_config(&temp_dir)).unwrap();
        engine.create("v", Type::U8).unwrap();
        engine.append("v", Value::Array(vec![Value::U8(5); 50])).unwrap();
        leaf = engine.info("v").unwrap().root;
        engine.close().unwrap();
    }

    let mut file = OpenOptions::new()
        .write(true)
        .open(temp_dir.path().join("engine.db"))
        .unwrap();
    file.seek(SeekFrom::Start(leaf as u64 * 256 + 20)).unwrap();
    file.write_all(&[0xFF]).unwrap();
    drop(file);

    let engine = Engine::open(small_config(&temp_dir)).unwrap();
    let err = engine.read("v", 0, 50).unwrap_err();
    assert!(matches!(err, NumstoreError::CorruptPage { .. }));
    assert_eq!(err.class(), ErrorClass::Structural);

    // Metadata is on other pages and still readable
    assert_eq!(engine.info("v").unwrap().length, 50);
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_engine_concurrent_appends() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);

    let mut handles = vec![];
    for t in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let name = format!("thread_{}", t);
            engine.create(&name, Type::U32).unwrap();
            for i in 0..100u32 {
                engine.append(&name, Value::U32(t * 1_000 + i)).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.list().unwrap().len(), 4);
    for t in 0..4u32 {
        let name = format!("thread_{}", t);
        let values = engine.read_values(&name, 0, 100).unwrap();
        let expected: Vec<Value> = (0..100).map(|i| Value::U32(t * 1_000 + i)).collect();
        assert_eq!(values, expected);
        engine.check(&name).unwrap();
    }
}

#[test]
fn test_engine_concurrent_readers_and_writer() {
    let (_temp, engine) = setup_temp_engine();
    engine.create("log", Type::U64).unwrap();
    engine
        .append("log", Value::Array((0..64).map(Value::U64).collect()))
        .unwrap();
    let engine = Arc::new(engine);

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 64..264u64 {
                engine.append("log", Value::U64(i)).unwrap();
            }
        })
    };

    let mut readers = vec![];
    for _ in 0..3 {
        let engine = Arc::clone(&engine);
        readers.push(thread::spawn(move || {
            for _ in 0..50 {
                // The prefix never changes while the writer appends
                let values = engine.read_values("log", 0, 64).unwrap();
                assert_eq!(values.len(), 64);
                assert_eq!(values[63], Value::U64(63));
            }
        }));
    }

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(engine.info("log").unwrap().length, 264 * 8);
}

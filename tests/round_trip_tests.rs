use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;

use ddb_mover::runner::{run_dump, run_load, DumpConfig, LoadConfig};
use ddb_mover::Record;

mod common;
use common::{assert_same_records, scratch_dir, FakeStore};

/// A record exercising the attribute type union: strings, numbers,
/// binary, sets, lists and nested maps.
fn rich_record(pk: &str, n: i64) -> Record {
    let mut nested = std::collections::HashMap::new();
    nested.insert(
        "inner".to_string(),
        AttributeValue::N((n * 10).to_string()),
    );

    let mut item = Record::new();
    item.insert("pk".to_string(), AttributeValue::S(pk.to_string()));
    item.insert("n".to_string(), AttributeValue::N(n.to_string()));
    item.insert(
        "blob".to_string(),
        AttributeValue::B(Blob::new(vec![n as u8, 0xff, 0x00])),
    );
    item.insert(
        "names".to_string(),
        AttributeValue::Ss(vec!["x".to_string(), "y".to_string()]),
    );
    item.insert(
        "list".to_string(),
        AttributeValue::L(vec![
            AttributeValue::Bool(n % 2 == 0),
            AttributeValue::Null(true),
        ]),
    );
    item.insert("map".to_string(), AttributeValue::M(nested));
    item
}

#[tokio::test(start_paused = true)]
async fn dump_then_load_reproduces_the_record_set() {
    let originals: Vec<Record> = (0..40).map(|i| rich_record(&format!("pk-{i}"), i)).collect();
    let segments = vec![
        originals[..15].to_vec(),
        originals[15..27].to_vec(),
        originals[27..].to_vec(),
    ];

    let source = FakeStore::new("users", "pk", segments).with_page_size(6);
    let out_dir = scratch_dir("round-trip");

    let dump = run_dump(
        source,
        DumpConfig {
            table: "users".to_string(),
            total_segments: 3,
            hash_keys: Vec::new(),
            workers: 2,
            compress: true,
            capacity_fraction: 0.25,
            output_dir: out_dir.clone(),
        },
    )
    .await
    .unwrap();

    assert_eq!(dump.items, 40);

    let target = FakeStore::new("users-restore", "pk", vec![Vec::new()]);
    let load = run_load(
        target.clone(),
        LoadConfig {
            table: "users-restore".to_string(),
            files: dump.files,
            workers: 3,
        },
    )
    .await
    .unwrap();

    assert_eq!(load.items, 40);
    assert_same_records(&target.written(), &originals);

    std::fs::remove_dir_all(&out_dir).ok();
}

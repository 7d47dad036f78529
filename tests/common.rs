use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;

use ddb_mover::errors::StoreError;
use ddb_mover::store::{PageResponse, StoreClient, TableInfo};
use ddb_mover::Record;

/// In-memory stand-in for the real store: one table whose items are
/// pre-split across scan segments. Cheaply cloneable so the orchestrator
/// can hand one handle to every worker.
#[derive(Clone)]
pub struct FakeStore {
    inner: Arc<Inner>,
}

struct Inner {
    table: String,
    hash_key: String,
    segments: Vec<Vec<Record>>,
    read_capacity: f64,
    page_size: usize,
    consumed_per_page: f64,
    /// Segment whose scans fail hard, to exercise worker failure.
    fail_segment: Option<i32>,
    /// Reject the first N items of the first batch-write as unprocessed.
    reject_once: Mutex<Option<usize>>,
    batches: Mutex<Vec<Vec<Record>>>,
    written: Mutex<Vec<Record>>,
}

impl FakeStore {
    pub fn new(table: &str, hash_key: &str, segments: Vec<Vec<Record>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: table.to_string(),
                hash_key: hash_key.to_string(),
                segments,
                read_capacity: 100.0,
                page_size: 100,
                consumed_per_page: 0.5,
                fail_segment: None,
                reject_once: Mutex::new(None),
                batches: Mutex::new(Vec::new()),
                written: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        Arc::get_mut(&mut self.inner).unwrap().page_size = page_size;
        self
    }

    pub fn with_failing_segment(mut self, segment: i32) -> Self {
        Arc::get_mut(&mut self.inner).unwrap().fail_segment = Some(segment);
        self
    }

    pub fn with_reject_once(self, count: usize) -> Self {
        *self.inner.reject_once.lock().unwrap() = Some(count);
        self
    }

    /// Every batch-write call received, in order, with its items.
    pub fn batches(&self) -> Vec<Vec<Record>> {
        self.inner.batches.lock().unwrap().clone()
    }

    /// Everything the store has durably applied.
    pub fn written(&self) -> Vec<Record> {
        self.inner.written.lock().unwrap().clone()
    }

    fn all_items(&self) -> Vec<Record> {
        self.inner.segments.iter().flatten().cloned().collect()
    }

    fn page_of(&self, items: &[Record], start_key: Option<Record>, limit: i32) -> PageResponse {
        let offset = token_offset(&start_key);
        let step = self.inner.page_size.min(limit.max(0) as usize);
        let end = (offset + step).min(items.len());

        let last_evaluated_key = if end < items.len() {
            Some(offset_token(end))
        } else {
            None
        };

        PageResponse {
            items: items[offset..end].to_vec(),
            last_evaluated_key,
            consumed_capacity: self.inner.consumed_per_page,
        }
    }
}

#[async_trait]
impl StoreClient for FakeStore {
    async fn describe_table(&self, table: &str) -> Result<Option<TableInfo>, StoreError> {
        if table != self.inner.table {
            return Ok(None);
        }
        Ok(Some(TableInfo {
            item_count: self.all_items().len() as i64,
            read_capacity_units: self.inner.read_capacity,
            hash_key: self.inner.hash_key.clone(),
        }))
    }

    async fn scan_page(
        &self,
        _table: &str,
        segment: i32,
        _total_segments: i32,
        start_key: Option<Record>,
        limit: i32,
    ) -> Result<PageResponse, StoreError> {
        if self.inner.fail_segment == Some(segment) {
            return Err(StoreError::Aws("AccessDeniedException".to_string()));
        }
        let items = &self.inner.segments[segment as usize];
        Ok(self.page_of(items, start_key, limit))
    }

    async fn query_page(
        &self,
        _table: &str,
        hash_key_name: &str,
        hash_key: &str,
        start_key: Option<Record>,
        limit: i32,
    ) -> Result<PageResponse, StoreError> {
        let wanted = AttributeValue::S(hash_key.to_string());
        let items: Vec<Record> = self
            .all_items()
            .into_iter()
            .filter(|item| item.get(hash_key_name) == Some(&wanted))
            .collect();
        Ok(self.page_of(&items, start_key, limit))
    }

    async fn batch_put(&self, _table: &str, items: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        self.inner.batches.lock().unwrap().push(items.clone());

        let rejected = self.inner.reject_once.lock().unwrap().take().unwrap_or(0);
        let unprocessed: Vec<Record> = items.iter().take(rejected).cloned().collect();
        self.inner
            .written
            .lock()
            .unwrap()
            .extend(items.into_iter().skip(rejected));

        Ok(unprocessed)
    }
}

fn offset_token(offset: usize) -> Record {
    let mut token = Record::new();
    token.insert(
        "__offset".to_string(),
        AttributeValue::N(offset.to_string()),
    );
    token
}

fn token_offset(start_key: &Option<Record>) -> usize {
    start_key
        .as_ref()
        .and_then(|key| key.get("__offset"))
        .and_then(|value| value.as_n().ok())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// A record with a string hash key and a numeric payload attribute.
pub fn record(pk: &str, value: i64) -> Record {
    let mut item = Record::new();
    item.insert("pk".to_string(), AttributeValue::S(pk.to_string()));
    item.insert("value".to_string(), AttributeValue::N(value.to_string()));
    item
}

/// A fresh scratch directory under the system temp dir.
pub fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ddb-mover-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Order-insensitive record-set equality.
pub fn assert_same_records(actual: &[Record], expected: &[Record]) {
    assert_eq!(actual.len(), expected.len());
    for record in expected {
        assert!(
            actual.contains(record),
            "missing record: {record:?} in {actual:?}"
        );
    }
}

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeValue, KeyType, PutRequest, ReturnConsumedCapacity, WriteRequest,
};
use aws_sdk_dynamodb::Client;

use crate::errors::StoreError;
use crate::Record;

/// Applied to every store call on top of whatever the transport does.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Item count and capacity details for a table, from describe-table.
///
/// `item_count` is the store's approximate count and is only used for the
/// `~N` estimate in progress lines. `hash_key` is the partition key
/// attribute name, needed for key-query dumps.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub item_count: i64,
    pub read_capacity_units: f64,
    pub hash_key: String,
}

/// One page of a scan or query.
#[derive(Debug, Default)]
pub struct PageResponse {
    pub items: Vec<Record>,
    pub last_evaluated_key: Option<Record>,
    pub consumed_capacity: f64,
}

/// The store operations the dump and load pipelines need.
///
/// Implemented by [`Dynamo`] for the real store; tests swap in an
/// in-memory fake.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Returns `None` when the table does not exist.
    async fn describe_table(&self, table: &str) -> Result<Option<TableInfo>, StoreError>;

    /// One page of a parallel scan over the given segment.
    async fn scan_page(
        &self,
        table: &str,
        segment: i32,
        total_segments: i32,
        start_key: Option<Record>,
        limit: i32,
    ) -> Result<PageResponse, StoreError>;

    /// One page of a query for a single hash key.
    async fn query_page(
        &self,
        table: &str,
        hash_key_name: &str,
        hash_key: &str,
        start_key: Option<Record>,
        limit: i32,
    ) -> Result<PageResponse, StoreError>;

    /// Submits one batch-write of puts and returns the items the store
    /// rejected as unprocessed. An `Err` is a hard failure, not throttling.
    async fn batch_put(&self, table: &str, items: Vec<Record>) -> Result<Vec<Record>, StoreError>;
}

/// Production [`StoreClient`] over the AWS SDK.
///
/// Cloned once per worker; the SDK client is a shared handle with its own
/// connection pooling underneath.
#[derive(Clone)]
pub struct Dynamo {
    client: Client,
    timeout: Duration,
}

impl Dynamo {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = T> + Send,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(op))
    }
}

#[async_trait]
impl StoreClient for Dynamo {
    async fn describe_table(&self, table: &str) -> Result<Option<TableInfo>, StoreError> {
        let result = self
            .bounded(
                "describe_table",
                self.client.describe_table().table_name(table).send(),
            )
            .await?;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_resource_not_found_exception())
                    .unwrap_or(false);
                if not_found {
                    return Ok(None);
                }
                return Err(StoreError::Aws(err.to_string()));
            }
        };

        let desc = output.table.ok_or_else(|| {
            StoreError::MalformedResponse("describe_table returned no table description".into())
        })?;

        let hash_key = desc
            .key_schema()
            .iter()
            .find(|k| *k.key_type() == KeyType::Hash)
            .map(|k| k.attribute_name().to_string())
            .ok_or_else(|| {
                StoreError::MalformedResponse(format!("table '{table}' has no hash key"))
            })?;

        Ok(Some(TableInfo {
            item_count: desc.item_count.unwrap_or(0),
            read_capacity_units: desc
                .provisioned_throughput()
                .and_then(|p| p.read_capacity_units())
                .unwrap_or(0) as f64,
            hash_key,
        }))
    }

    async fn scan_page(
        &self,
        table: &str,
        segment: i32,
        total_segments: i32,
        start_key: Option<Record>,
        limit: i32,
    ) -> Result<PageResponse, StoreError> {
        let request = self
            .client
            .scan()
            .table_name(table)
            .segment(segment)
            .total_segments(total_segments)
            .limit(limit)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .set_exclusive_start_key(start_key);

        let output = self
            .bounded("scan", request.send())
            .await?
            .map_err(|e| StoreError::Aws(e.to_string()))?;

        Ok(PageResponse {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key,
            consumed_capacity: output
                .consumed_capacity
                .and_then(|c| c.capacity_units)
                .unwrap_or(0.0),
        })
    }

    async fn query_page(
        &self,
        table: &str,
        hash_key_name: &str,
        hash_key: &str,
        start_key: Option<Record>,
        limit: i32,
    ) -> Result<PageResponse, StoreError> {
        let request = self
            .client
            .query()
            .table_name(table)
            .key_condition_expression("#hk = :hk")
            .expression_attribute_names("#hk", hash_key_name)
            .expression_attribute_values(":hk", AttributeValue::S(hash_key.to_string()))
            .limit(limit)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .set_exclusive_start_key(start_key);

        let output = self
            .bounded("query", request.send())
            .await?
            .map_err(|e| StoreError::Aws(e.to_string()))?;

        Ok(PageResponse {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key,
            consumed_capacity: output
                .consumed_capacity
                .and_then(|c| c.capacity_units)
                .unwrap_or(0.0),
        })
    }

    async fn batch_put(&self, table: &str, items: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        let mut requests = Vec::with_capacity(items.len());
        for item in items {
            let put = PutRequest::builder().set_item(Some(item)).build()?;
            requests.push(WriteRequest::builder().put_request(put).build());
        }

        let output = self
            .bounded(
                "batch_write_item",
                self.client
                    .batch_write_item()
                    .request_items(table, requests)
                    .send(),
            )
            .await?
            .map_err(|e| StoreError::Aws(e.to_string()))?;

        let unprocessed = output
            .unprocessed_items
            .unwrap_or_default()
            .remove(table)
            .unwrap_or_default();

        Ok(unprocessed
            .into_iter()
            .filter_map(|wr| wr.put_request.map(|pr| pr.item))
            .collect())
    }
}

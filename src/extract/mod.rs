use crate::errors::DumpError;
use crate::store::StoreClient;
use crate::throttle::Throttle;
use crate::Record;

/// Items requested per scan/query page.
pub const PAGE_LIMIT: i32 = 100;

/// How one worker's slice of the table is addressed.
///
/// A run uses exactly one mode for all of its workers: segment scans cover
/// disjoint slices of the whole table, key queries retrieve the items
/// sharing one partition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionSpec {
    SegmentScan { index: i32, total: i32 },
    KeyQuery { key: String },
}

impl PartitionSpec {
    /// Identifier used in dump filenames.
    pub fn id(&self) -> String {
        match self {
            Self::SegmentScan { index, .. } => index.to_string(),
            Self::KeyQuery { key } => key.clone(),
        }
    }

    /// Human-readable unit name for progress and error reporting.
    pub fn unit_name(&self) -> String {
        match self {
            Self::SegmentScan { index, .. } => format!("segment {index}"),
            Self::KeyQuery { key } => format!("key '{key}'"),
        }
    }
}

/// Per-partition paginated reader.
///
/// Drives one continuation-token chain: each [`Extractor::fetch_page`]
/// resumes from the token the previous page returned, so pages within a
/// partition are strictly sequential. The consumed capacity of every page
/// is fed to the owned [`Throttle`] before the page is returned. Once
/// exhausted the instance is spent.
pub struct Extractor<C> {
    store: C,
    table: String,
    hash_key_name: String,
    spec: PartitionSpec,
    throttle: Throttle,
    start_key: Option<Record>,
    exhausted: bool,
    page_limit: i32,
}

impl<C: StoreClient> Extractor<C> {
    pub fn new(
        store: C,
        table: impl Into<String>,
        hash_key_name: impl Into<String>,
        spec: PartitionSpec,
        throttle: Throttle,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            hash_key_name: hash_key_name.into(),
            spec,
            throttle,
            start_key: None,
            exhausted: false,
            page_limit: PAGE_LIMIT,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetches the next page of the partition. A page may hold zero
    /// records: the store can spend capacity without returning data.
    pub async fn fetch_page(&mut self) -> Result<Vec<Record>, DumpError> {
        if self.exhausted {
            return Ok(Vec::new());
        }

        let page = match &self.spec {
            PartitionSpec::SegmentScan { index, total } => {
                self.store
                    .scan_page(
                        &self.table,
                        *index,
                        *total,
                        self.start_key.take(),
                        self.page_limit,
                    )
                    .await?
            }
            PartitionSpec::KeyQuery { key } => {
                self.store
                    .query_page(
                        &self.table,
                        &self.hash_key_name,
                        key,
                        self.start_key.take(),
                        self.page_limit,
                    )
                    .await?
            }
        };

        self.exhausted = page.last_evaluated_key.is_none();
        self.start_key = page.last_evaluated_key;
        self.throttle.record(page.consumed_capacity).await;

        Ok(page.items)
    }
}

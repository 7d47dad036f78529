use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info};
use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};

use crate::dumpfile::{self, DumpWriter};
use crate::errors::{DumpError, Error, LoadError, SetupError};
use crate::extract::{Extractor, PartitionSpec};
use crate::load::BatchPutManager;
use crate::progress::{self, ProgressEvent, ProgressTotals, ReportStyle};
use crate::store::StoreClient;
use crate::throttle::Throttle;
use crate::Record;

#[derive(Debug, Clone)]
pub struct DumpConfig {
    pub table: String,
    /// Segment count for a parallel full-table scan. Ignored when
    /// `hash_keys` is non-empty.
    pub total_segments: i32,
    /// When non-empty, dump only these partition keys (query mode).
    pub hash_keys: Vec<String>,
    pub workers: usize,
    pub compress: bool,
    /// Fraction of the table's provisioned read capacity this run may
    /// consume, clamped to `[0.01, 1.0]`.
    pub capacity_fraction: f64,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub table: String,
    pub files: Vec<PathBuf>,
    pub workers: usize,
}

#[derive(Debug)]
pub struct DumpSummary {
    pub items: u64,
    pub files: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct LoadSummary {
    pub items: u64,
    pub files: usize,
}

/// Per-worker read budget: the run's share of the table's capacity split
/// across workers, floored at one unit per second.
fn capacity_budget(read_capacity: f64, fraction: f64, workers: usize) -> f64 {
    let fraction = fraction.clamp(0.01, 1.0);
    (read_capacity * fraction / workers.max(1) as f64).max(1.0)
}

/// Dumps a whole table to one file per partition.
///
/// Spawns one worker per partition (bounded to `config.workers` running
/// at once), each driving its own [`Extractor`] and output file. The
/// first worker failure aborts the rest of the run and names the unit.
pub async fn run_dump<C>(store: C, config: DumpConfig) -> Result<DumpSummary, Error>
where
    C: StoreClient + Clone + 'static,
{
    let table_info = store
        .describe_table(&config.table)
        .await
        .map_err(SetupError::Store)?
        .ok_or_else(|| SetupError::TableNotFound(config.table.clone()))?;

    let (partitions, unit_label) = if config.hash_keys.is_empty() {
        let total = config.total_segments.max(1);
        let specs = (0..total)
            .map(|index| PartitionSpec::SegmentScan { index, total })
            .collect::<Vec<_>>();
        (specs, "segments")
    } else {
        let specs = config
            .hash_keys
            .iter()
            .map(|key| PartitionSpec::KeyQuery { key: key.clone() })
            .collect::<Vec<_>>();
        (specs, "keys")
    };

    let budget = capacity_budget(
        table_info.read_capacity_units,
        config.capacity_fraction,
        config.workers,
    );
    info!(
        "dumping table '{}': {} {unit_label}, {} workers, {budget:.1} read units/sec per worker",
        config.table,
        partitions.len(),
        config.workers
    );

    let (events_tx, events_rx) = mpsc::channel(progress::CHANNEL_CAPACITY);
    let reporter = tokio::spawn(progress::report(
        events_rx,
        ReportStyle::Dump {
            approx_items: table_info.item_count.max(0) as u64,
            unit_label,
        },
        partitions.len(),
    ));

    let pool = Arc::new(Semaphore::new(config.workers.max(1)));
    let mut workers = JoinSet::new();
    let mut files = Vec::with_capacity(partitions.len());

    for spec in partitions {
        let path = config.output_dir.join(dumpfile::dump_file_name(
            &config.table,
            &spec.id(),
            config.compress,
        ));
        files.push(path.clone());

        let unit = DumpUnit {
            table: config.table.clone(),
            hash_key: table_info.hash_key.clone(),
            spec,
            path,
            compress: config.compress,
            budget,
        };
        let store = store.clone();
        let events = events_tx.clone();
        let pool = pool.clone();

        workers.spawn(async move {
            let _permit = pool
                .acquire_owned()
                .await
                .expect("worker pool semaphore closed");
            let name = unit.spec.unit_name();
            let result = dump_partition(store, unit, events).await;
            (name, result)
        });
    }
    drop(events_tx);

    join_workers(&mut workers, &reporter, |unit, source| Error::DumpWorker {
        unit,
        source,
    })
    .await?;

    let totals = await_reporter(reporter).await?;
    Ok(DumpSummary {
        items: totals.items,
        files,
    })
}

/// Loads dump files back into a table, one worker per file.
pub async fn run_load<C>(store: C, config: LoadConfig) -> Result<LoadSummary, Error>
where
    C: StoreClient + Clone + 'static,
{
    if config.files.is_empty() {
        return Err(SetupError::NoInputFiles.into());
    }
    let missing = config
        .files
        .iter()
        .filter(|path| !path.is_file())
        .map(|path| path.display())
        .join(", ");
    if !missing.is_empty() {
        return Err(SetupError::MissingFiles(missing).into());
    }

    store
        .describe_table(&config.table)
        .await
        .map_err(SetupError::Store)?
        .ok_or_else(|| SetupError::TableNotFound(config.table.clone()))?;

    info!(
        "loading {} files into table '{}' with {} workers",
        config.files.len(),
        config.table,
        config.workers
    );

    let (events_tx, events_rx) = mpsc::channel(progress::CHANNEL_CAPACITY);
    let reporter = tokio::spawn(progress::report(
        events_rx,
        ReportStyle::Load,
        config.files.len(),
    ));

    let pool = Arc::new(Semaphore::new(config.workers.max(1)));
    let mut workers = JoinSet::new();

    for path in &config.files {
        let path = path.clone();
        let store = store.clone();
        let table = config.table.clone();
        let events = events_tx.clone();
        let pool = pool.clone();

        workers.spawn(async move {
            let _permit = pool
                .acquire_owned()
                .await
                .expect("worker pool semaphore closed");
            let name = path.display().to_string();
            let result = load_file(store, table, path, events).await;
            (name, result)
        });
    }
    drop(events_tx);

    join_workers(&mut workers, &reporter, |unit, source| Error::LoadWorker {
        unit,
        source,
    })
    .await?;

    let totals = await_reporter(reporter).await?;
    Ok(LoadSummary {
        items: totals.items,
        files: config.files.len(),
    })
}

struct DumpUnit {
    table: String,
    hash_key: String,
    spec: PartitionSpec,
    path: PathBuf,
    compress: bool,
    budget: f64,
}

async fn dump_partition<C: StoreClient>(
    store: C,
    unit: DumpUnit,
    events: mpsc::Sender<ProgressEvent>,
) -> Result<(), DumpError> {
    let mut writer = DumpWriter::create(&unit.path, unit.compress)?;
    let mut extractor = Extractor::new(
        store,
        unit.table,
        unit.hash_key,
        unit.spec,
        Throttle::new(unit.budget),
    );

    while !extractor.exhausted() {
        let records = extractor.fetch_page().await?;
        let count = records.len() as u64;
        for record in records {
            writeln!(writer, "{}", dumpfile::encode_record(record)?)?;
        }
        if count > 0 {
            let _ = events.send(ProgressEvent::Items(count)).await;
        }
    }

    writer.finish()?;
    let _ = events.send(ProgressEvent::UnitComplete).await;
    Ok(())
}

async fn load_file<C: StoreClient>(
    store: C,
    table: String,
    path: PathBuf,
    events: mpsc::Sender<ProgressEvent>,
) -> Result<(), LoadError> {
    let reader = dumpfile::open_reader(&path)?;
    let mut batch = BatchPutManager::new(store, table);

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let record: Record = dumpfile::decode_record(&line).map_err(|source| LoadError::Decode {
            path: path.clone(),
            source,
        })?;
        batch.put(record).await?;
        let _ = events.send(ProgressEvent::Items(1)).await;
    }

    // a file must end with nothing buffered
    batch.commit().await?;
    let _ = events.send(ProgressEvent::UnitComplete).await;
    Ok(())
}

/// Awaits every worker; the first failure (or panic) aborts the rest of
/// the pool and the reporter so the run terminates instead of hanging.
async fn join_workers<E: 'static>(
    workers: &mut JoinSet<(String, Result<(), E>)>,
    reporter: &JoinHandle<ProgressTotals>,
    to_error: impl Fn(String, E) -> Error,
) -> Result<(), Error> {
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((unit, Ok(()))) => debug!("worker for {unit} complete"),
            Ok((unit, Err(source))) => {
                workers.abort_all();
                reporter.abort();
                return Err(to_error(unit, source));
            }
            Err(_join_error) => {
                workers.abort_all();
                reporter.abort();
                return Err(Error::WorkerPanic {
                    unit: "unidentified worker".to_string(),
                });
            }
        }
    }
    Ok(())
}

async fn await_reporter(reporter: JoinHandle<ProgressTotals>) -> Result<ProgressTotals, Error> {
    reporter.await.map_err(|_| Error::WorkerPanic {
        unit: "progress reporter".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_splits_capacity_across_workers() {
        assert_eq!(capacity_budget(1000.0, 0.5, 4), 125.0);
        assert_eq!(capacity_budget(100.0, 1.0, 2), 50.0);
    }

    #[test]
    fn budget_is_floored_at_one_unit() {
        assert_eq!(capacity_budget(10.0, 0.01, 8), 1.0);
        assert_eq!(capacity_budget(0.0, 1.0, 1), 1.0);
    }

    #[test]
    fn budget_clamps_the_fraction() {
        // a fraction above 1.0 is treated as 1.0
        assert_eq!(capacity_budget(100.0, 5.0, 1), 100.0);
        // and one below 0.01 as 0.01
        assert!((capacity_budget(10_000.0, 0.0001, 1) - 100.0).abs() < 1e-9);
    }
}

// =============================================================================
// pipeline.rs — FETCH, EXTRACT, NORMALIZE, PERSIST. REPEAT.
// =============================================================================
//
// One query at a time, start to finish, before the next one begins:
//
//   fetch page ─▶ extract every row ─▶ normalize every row ─▶ write each record
//
// The first three steps are all-or-nothing per page. A row we can't read
// means the site's layout moved under us, and guessing at the remaining rows
// would quietly store garbage. So extraction and normalization finish for
// the whole page before a single write happens.
//
// Writes are per record. A mark we can't convert or a row the store refuses
// is logged with the record attached and counted; the rest of the page still
// lands.
//
// A failed query stops the run unless `keep_going` is set, in which case we
// log it and move on. Either way the run's exit status reports it.
// =============================================================================

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use crate::error::IngestError;
use crate::extractor::extract_page;
use crate::fetch::RankingsSource;
use crate::metrics::IngestMetrics;
use crate::models::{PerformanceRecord, Query};
use crate::normalizer::normalize;
use crate::query_plan::QueryPlan;
use crate::store::RecordStore;
use crate::writer::RecordWriter;

/// How a multi-query run behaves around failures and restarts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Log a failed query and continue with the next one.
    pub keep_going: bool,
    /// Skip this many queries from the start of the plan.
    pub skip: usize,
}

/// Per-query tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryReport {
    pub rows: usize,
    pub written: usize,
    pub failed: usize,
}

/// Fetch one page and turn every rank row on it into a record.
pub async fn fetch_records<R: RankingsSource>(
    source: &R,
    query: &Query,
    metrics: &IngestMetrics,
) -> Result<Vec<PerformanceRecord>, IngestError> {
    let html = source.fetch(query).await?;
    let entries = extract_page(&html, query.entry_shape())?;
    metrics.rows_extracted(entries.len() as u64);

    let records = entries
        .iter()
        .map(|entry| normalize(entry, query.year))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(query = %query, records = records.len(), "page normalized");
    Ok(records)
}

/// Run one query through the whole pipeline.
pub async fn ingest_query<R, S>(
    source: &R,
    writer: &mut RecordWriter<'_, S>,
    query: &Query,
    metrics: &IngestMetrics,
) -> Result<QueryReport, IngestError>
where
    R: RankingsSource,
    S: RecordStore + ?Sized,
{
    let records = fetch_records(source, query, metrics).await?;
    let mut report = QueryReport {
        rows: records.len(),
        ..QueryReport::default()
    };

    for record in &records {
        match writer.write(record, query) {
            Ok(_) => {
                report.written += 1;
                metrics.record_written();
            }
            Err(e) => {
                report.failed += 1;
                metrics.record_failed();
                error!(query = %query, error = %e, "record not persisted");
            }
        }
    }

    Ok(report)
}

/// Import every query in the plan into `store`.
pub async fn run_import<R, S>(
    source: &R,
    store: &S,
    plan: &QueryPlan,
    options: RunOptions,
    seen_cache_size: usize,
    metrics: Arc<IngestMetrics>,
) -> Result<(), IngestError>
where
    R: RankingsSource,
    S: RecordStore + ?Sized,
{
    let mut writer = RecordWriter::new(store, seen_cache_size, metrics.clone());
    let total = plan.len();
    announce_skip(options.skip, total, &metrics);

    for (index, query) in plan.iter().enumerate().skip(options.skip) {
        info!(
            progress = %format!("{}/{}", index + 1, total),
            season = %query.season,
            gender = %query.gender,
            year = query.year,
            age_group = %query.age_group,
            event = %query.event,
            "importing"
        );
        let started = Instant::now();

        match ingest_query(source, &mut writer, &query, &metrics).await {
            Ok(report) => {
                metrics.query_completed(started.elapsed());
                info!(
                    query = %query,
                    rows = report.rows,
                    written = report.written,
                    failed = report.failed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "query imported"
                );
            }
            Err(e) => {
                metrics.query_failed();
                error!(query = %query, index, error = %e, "query failed");
                if !options.keep_going {
                    warn!(
                        "stopping; rerun with --skip {} to resume at this query",
                        index
                    );
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}

/// Fetch, extract and normalize every query in the plan, printing each record
/// as one JSON line. Nothing is persisted.
pub async fn run_read<R, W>(
    source: &R,
    plan: &QueryPlan,
    options: RunOptions,
    metrics: &IngestMetrics,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: RankingsSource,
    W: Write,
{
    let total = plan.len();
    announce_skip(options.skip, total, metrics);

    for (index, query) in plan.iter().enumerate().skip(options.skip) {
        debug!(progress = %format!("{}/{}", index + 1, total), query = %query, "reading");
        let started = Instant::now();

        let records = match fetch_records(source, &query, metrics).await {
            Ok(records) => records,
            Err(e) => {
                metrics.query_failed();
                error!(query = %query, index, error = %e, "query failed");
                if options.keep_going {
                    continue;
                }
                return Err(e.into());
            }
        };

        for record in &records {
            let line = serde_json::to_string(record).context("failed to serialize record")?;
            writeln!(out, "{line}").context("failed to write record")?;
        }
        metrics.query_completed(started.elapsed());
    }

    out.flush().context("failed to flush output")?;
    Ok(())
}

fn announce_skip(skip: usize, total: usize, metrics: &IngestMetrics) {
    if skip == 0 {
        return;
    }
    let skipped = skip.min(total);
    metrics.queries_skipped(skipped as u64);
    info!(skipped, total, "resuming partway through the plan");
}

// src/metrics.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series carry help text once scraped).
pub fn describe_all() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe);
}

fn describe() {
    describe_counter!("mention_documents_total", "Documents handed to the analyzer.");
    describe_counter!(
        "mention_documents_skipped_total",
        "Documents skipped for missing or empty text."
    );
    describe_counter!("mention_extracted_total", "Stock mentions produced.");
    describe_counter!(
        "mention_classification_failures_total",
        "Texts whose sentiment classification failed (scored as zero)."
    );
    describe_counter!(
        "mention_universe_fallbacks_total",
        "Ticker universe sources that failed or returned nothing."
    );
    describe_counter!(
        "mention_batch_panics_total",
        "Analysis batches dropped because a worker panicked."
    );
    describe_counter!(
        "summary_generated_total",
        "Summaries produced by aggregation, by granularity."
    );
    describe_counter!(
        "summary_merged_total",
        "Summaries merged with a prior persisted summary, by granularity."
    );
    describe_histogram!("mention_batch_ms", "Time to analyze one batch in milliseconds.");
}

/// Install a global Prometheus recorder. Fails if a recorder is already installed.
pub fn install_prometheus() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")?;
    // Descriptions registered before the recorder existed went nowhere.
    describe();
    Ok(handle)
}

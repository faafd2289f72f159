// src/pipeline.rs
//! One pipeline run: documents -> mentions -> summaries -> merged summaries.
//!
//! Fetching documents and storing results belong to collaborators behind the
//! [`DocumentSource`] and [`SummaryStore`] traits. Retries and scheduling stay
//! with whoever calls [`Pipeline::run_once`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::aggregate::{aggregate_all, DailySummary, HourlySummary, Summary, WeeklySummary};
use crate::analyzer::MentionBuilder;
use crate::batch::BatchAnalyzer;
use crate::config::EngineConfig;
use crate::document::RawDocument;
use crate::extract::UniverseLoader;
use crate::merge::{IncrementalMerger, MergePolicy};
use crate::mention::StockMention;
use crate::metrics::describe_all;
use crate::sentiment::DynClassifier;

/// Warehouse extractor: documents created after `since`, newest first,
/// unique by `message_id`, never `[deleted]` or empty.
#[async_trait::async_trait]
pub trait DocumentSource: Send + Sync {
    async fn extract_documents(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawDocument>>;
    fn name(&self) -> &'static str;
}

/// Read side of summary persistence: prior summaries for a set of keys.
#[async_trait::async_trait]
pub trait SummaryStore<S: Summary>: Send + Sync {
    async fn find(&self, keys: &[S::Key]) -> Result<BTreeMap<S::Key, S>>;
}

/// In-memory document source honoring the extractor contract.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub docs: Vec<RawDocument>,
}

impl MemorySource {
    pub fn new(docs: Vec<RawDocument>) -> Self {
        Self { docs }
    }
}

#[async_trait::async_trait]
impl DocumentSource for MemorySource {
    async fn extract_documents(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawDocument>> {
        let mut seen = HashSet::new();
        let mut out: Vec<RawDocument> = self
            .docs
            .iter()
            .filter(|d| since.map_or(true, |s| d.created_at > s))
            .filter(|d| {
                d.content
                    .as_deref()
                    .map(|c| !c.trim().is_empty() && c != "[deleted]")
                    .unwrap_or(false)
            })
            .filter(|d| seen.insert(d.message_id.clone()))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Upsert-by-key summary store kept in memory.
pub struct MemoryStore<S: Summary> {
    inner: RwLock<BTreeMap<S::Key, S>>,
}

impl<S: Summary> Default for MemoryStore<S> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<S: Summary> MemoryStore<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, items: Vec<S>) {
        let mut g = self.inner.write().await;
        for s in items {
            g.insert(s.key(), s);
        }
    }

    pub async fn get(&self, key: &S::Key) -> Option<S> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn all(&self) -> Vec<S> {
        self.inner.read().await.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl<S: Summary> SummaryStore<S> for MemoryStore<S> {
    async fn find(&self, keys: &[S::Key]) -> Result<BTreeMap<S::Key, S>> {
        let g = self.inner.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| g.get(k).map(|s| (k.clone(), s.clone())))
            .collect())
    }
}

/// Prior-summary lookups, one per granularity.
pub struct Stores<'a> {
    pub daily: &'a dyn SummaryStore<DailySummary>,
    pub hourly: &'a dyn SummaryStore<HourlySummary>,
    pub weekly: &'a dyn SummaryStore<WeeklySummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub documents: usize,
    pub skipped: usize,
    pub mentions: usize,
    pub daily: usize,
    pub hourly: usize,
    pub weekly: usize,
    pub merged_daily: usize,
    pub merged_hourly: usize,
    pub merged_weekly: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub mentions: Vec<StockMention>,
    pub daily: Vec<DailySummary>,
    pub hourly: Vec<HourlySummary>,
    pub weekly: Vec<WeeklySummary>,
    pub report: RunReport,
}

pub struct Pipeline {
    analyzer: Arc<BatchAnalyzer>,
    cfg: EngineConfig,
}

impl Pipeline {
    pub fn new(cfg: EngineConfig, builder: MentionBuilder) -> Self {
        describe_all();
        let analyzer = Arc::new(BatchAnalyzer::new(builder, cfg.batch));
        Self { analyzer, cfg }
    }

    /// Load the universe through `loader`, then build the analyzer around `classifier`.
    pub async fn bootstrap(
        cfg: EngineConfig,
        loader: &UniverseLoader,
        classifier: DynClassifier,
    ) -> Result<Self> {
        let universe = loader.load().await;
        let builder = MentionBuilder::new(&cfg, universe, classifier)
            .context("building mention analyzer")?;
        Ok(Self::new(cfg, builder))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Mentions only, on a blocking thread.
    pub async fn analyze(&self, docs: Vec<RawDocument>) -> Result<crate::analyzer::BatchOutput> {
        let analyzer = self.analyzer.clone();
        tokio::task::spawn_blocking(move || analyzer.analyze(&docs))
            .await
            .context("analysis task failed")
    }

    pub async fn run_once(
        &self,
        source: &dyn DocumentSource,
        stores: &Stores<'_>,
        since: Option<DateTime<Utc>>,
    ) -> Result<RunOutput> {
        let started = Instant::now();

        let docs = source
            .extract_documents(since)
            .await
            .with_context(|| format!("extracting documents from {}", source.name()))?;
        tracing::info!(target: "pipeline", source = source.name(), documents = docs.len(), "documents extracted");

        let analysis = self.analyze(docs).await?;

        let agg_cfg = self.cfg.aggregation;
        let mentions = analysis.mentions;
        let (mentions, all) = tokio::task::spawn_blocking(move || {
            let all = aggregate_all(&mentions, &agg_cfg);
            (mentions, all)
        })
        .await
        .context("aggregation task failed")?;

        let top_n = self.cfg.aggregation.top_contexts;
        let (daily, merged_daily) =
            merge_with_store(all.daily, stores.daily, self.cfg.merge.daily, top_n).await;
        let (hourly, merged_hourly) =
            merge_with_store(all.hourly, stores.hourly, self.cfg.merge.hourly, top_n).await;
        let (weekly, merged_weekly) =
            merge_with_store(all.weekly, stores.weekly, self.cfg.merge.weekly, top_n).await;

        let report = RunReport {
            documents: analysis.documents,
            skipped: analysis.skipped,
            mentions: mentions.len(),
            daily: daily.len(),
            hourly: hourly.len(),
            weekly: weekly.len(),
            merged_daily,
            merged_hourly,
            merged_weekly,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(target: "pipeline", report = ?report, "run complete");

        Ok(RunOutput {
            mentions,
            daily,
            hourly,
            weekly,
            report,
        })
    }
}

/// Lookup failures are treated as "no prior summary" so a flaky store never blocks a run.
async fn merge_with_store<S: Summary>(
    fresh: Vec<S>,
    store: &dyn SummaryStore<S>,
    policy: MergePolicy,
    top_n: usize,
) -> (Vec<S>, usize) {
    let merger = IncrementalMerger::new(policy, top_n);
    if policy == MergePolicy::Replace || fresh.is_empty() {
        return merger.merge_all(fresh, &BTreeMap::new());
    }
    let keys: Vec<S::Key> = fresh.iter().map(Summary::key).collect();
    let priors = match store.find(&keys).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(
                target: "merge",
                error = ?e,
                granularity = S::GRANULARITY.as_str(),
                "prior summary lookup failed; merging against nothing"
            );
            BTreeMap::new()
        }
    };
    merger.merge_all(fresh, &priors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MessageType;
    use chrono::TimeZone;

    fn doc(id: &str, content: &str, hour: u32) -> RawDocument {
        RawDocument {
            message_id: id.into(),
            content: Some(content.into()),
            title: None,
            author: "x".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            subreddit: "stocks".into(),
            url: String::new(),
            score: 0,
            message_type: MessageType::RedditComment,
        }
    }

    #[tokio::test]
    async fn memory_source_applies_extractor_contract() {
        let src = MemorySource::new(vec![
            doc("a", "first", 1),
            doc("b", "[deleted]", 2),
            doc("a", "dup", 3),
            doc("c", "  ", 4),
            doc("d", "latest", 5),
        ]);
        let all = src.extract_documents(None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|d| d.message_id.as_str()).collect();
        assert_eq!(ids, vec!["d", "a"]);

        let since = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        // The older copy of "a" falls outside the window, so the newer one is kept.
        let newer = src.extract_documents(Some(since)).await.unwrap();
        let ids: Vec<&str> = newer.iter().map(|d| d.message_id.as_str()).collect();
        assert_eq!(ids, vec!["d", "a"]);
        assert_eq!(newer[1].content.as_deref(), Some("dup"));
    }
}

// src/batch.rs
//! BatchAnalyzer: fan documents out to a worker pool in fixed-size batches.
//!
//! Each worker clones its own `MentionBuilder` (shared immutable universe and
//! classifier, no shared mutable state). Results are concatenated in batch order.

use metrics::{counter, histogram};
use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use crate::analyzer::{BatchOutput, MentionBuilder};
use crate::config::BatchConfig;
use crate::document::RawDocument;

pub struct BatchAnalyzer {
    builder: MentionBuilder,
    cfg: BatchConfig,
}

impl BatchAnalyzer {
    pub fn new(builder: MentionBuilder, cfg: BatchConfig) -> Self {
        Self { builder, cfg }
    }

    /// `min(max(1, cores - reserve), batches)`, or the configured maximum instead of cores.
    pub fn worker_count(&self, batches: usize) -> usize {
        let base = self.cfg.max_workers.unwrap_or_else(|| {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            cores.saturating_sub(self.cfg.reserve_cores)
        });
        base.max(1).min(batches.max(1))
    }

    /// Blocking; returns once every batch has finished.
    pub fn analyze(&self, docs: &[RawDocument]) -> BatchOutput {
        if docs.is_empty() {
            return BatchOutput::default();
        }
        if docs.len() < self.cfg.parallel_threshold {
            tracing::debug!(target: "batch", documents = docs.len(), "sequential analysis");
            return run_guarded(&self.builder, 0, docs);
        }

        let batches: Vec<&[RawDocument]> = docs.chunks(self.cfg.batch_size.max(1)).collect();
        let workers = self.worker_count(batches.len());
        tracing::info!(
            target: "batch",
            documents = docs.len(),
            batches = batches.len(),
            workers,
            "parallel analysis"
        );

        let results: Vec<BatchOutput> = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("mention-worker-{i}"))
            .build()
        {
            Ok(pool) => pool.install(|| {
                batches
                    .par_iter()
                    .enumerate()
                    .map_init(
                        || self.builder.clone(),
                        |builder, (idx, chunk)| run_guarded(builder, idx, chunk),
                    )
                    .collect()
            }),
            Err(e) => {
                tracing::warn!(target: "batch", error = ?e, "worker pool unavailable; analyzing sequentially");
                batches
                    .iter()
                    .enumerate()
                    .map(|(idx, chunk)| run_guarded(&self.builder, idx, chunk))
                    .collect()
            }
        };

        let mut out = BatchOutput::default();
        for r in results {
            out.extend(r);
        }
        out
    }
}

/// A panic inside one batch costs that batch only.
fn run_guarded(builder: &MentionBuilder, idx: usize, chunk: &[RawDocument]) -> BatchOutput {
    let started = Instant::now();
    match catch_unwind(AssertUnwindSafe(|| builder.analyze(chunk))) {
        Ok(out) => {
            let ms = started.elapsed().as_secs_f64() * 1000.0;
            histogram!("mention_batch_ms").record(ms);
            tracing::debug!(
                target: "batch",
                batch = idx,
                documents = chunk.len(),
                mentions = out.mentions.len(),
                ms,
                "batch done"
            );
            out
        }
        Err(_) => {
            counter!("mention_batch_panics_total").increment(1);
            tracing::error!(target: "batch", batch = idx, documents = chunk.len(), "batch panicked; its mentions are dropped");
            BatchOutput {
                mentions: Vec::new(),
                documents: chunk.len(),
                skipped: chunk.len(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::extract::TickerUniverse;
    use crate::sentiment::NeutralClassifier;
    use std::sync::Arc;

    fn analyzer(cfg: BatchConfig) -> BatchAnalyzer {
        let b = MentionBuilder::new(
            &EngineConfig::default(),
            TickerUniverse::builtin(),
            Arc::new(NeutralClassifier),
        )
        .unwrap();
        BatchAnalyzer::new(b, cfg)
    }

    #[test]
    fn worker_count_is_bounded_by_batches() {
        let a = analyzer(BatchConfig {
            max_workers: Some(8),
            ..BatchConfig::default()
        });
        assert_eq!(a.worker_count(3), 3);
        assert_eq!(a.worker_count(20), 8);
        assert_eq!(a.worker_count(0), 1);
    }

    #[test]
    fn reserve_never_drops_below_one_worker() {
        let a = analyzer(BatchConfig {
            reserve_cores: 10_000,
            ..BatchConfig::default()
        });
        assert_eq!(a.worker_count(5), 1);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let out = analyzer(BatchConfig::default()).analyze(&[]);
        assert!(out.mentions.is_empty());
        assert_eq!(out.documents, 0);
    }
}

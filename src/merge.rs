// src/merge.rs
//! Reconciles freshly computed summaries with previously persisted ones.
//!
//! Policies:
//! - `replace`: the fresh summary wins unchanged.
//! - `additive`: counters and histograms are summed; averages and top contexts stay fresh.
//! - `reweighted`: additive, plus averages recomputed over both populations and
//!   top contexts re-ranked over the union.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::Summary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    #[default]
    Replace,
    Additive,
    Reweighted,
}

#[derive(Debug, Clone, Copy)]
pub struct IncrementalMerger {
    policy: MergePolicy,
    top_n: usize,
}

impl IncrementalMerger {
    pub fn new(policy: MergePolicy, top_n: usize) -> Self {
        Self {
            policy,
            top_n: top_n.max(1),
        }
    }

    /// Merge one fresh summary with its prior (if any). Deterministic for equal inputs.
    pub fn merge<S: Summary>(&self, fresh: S, prior: Option<&S>) -> S {
        let Some(prior) = prior else {
            return fresh;
        };
        if self.policy == MergePolicy::Replace {
            return fresh;
        }
        let mut out = fresh;
        out.core_mut()
            .absorb(prior.core(), self.policy == MergePolicy::Reweighted);
        out.absorb_details(prior, self.policy, self.top_n);
        out
    }

    /// Merge a whole run. Returns the merged list (fresh order) and how many had a prior.
    pub fn merge_all<S: Summary>(
        &self,
        fresh: Vec<S>,
        priors: &BTreeMap<S::Key, S>,
    ) -> (Vec<S>, usize) {
        let mut merged = 0usize;
        let out: Vec<S> = fresh
            .into_iter()
            .map(|s| {
                let prior = priors.get(&s.key());
                if prior.is_some() && self.policy != MergePolicy::Replace {
                    merged += 1;
                }
                self.merge(s, prior)
            })
            .collect();

        let granularity = S::GRANULARITY.as_str();
        counter!("summary_merged_total", "granularity" => granularity).increment(merged as u64);
        tracing::debug!(
            target: "merge",
            granularity,
            policy = ?self.policy,
            summaries = out.len(),
            merged,
            "merged with prior summaries"
        );
        (out, merged)
    }
}

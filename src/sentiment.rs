// src/sentiment.rs
//! Sentiment capability: classifier abstraction, local classifiers, caching wrapper,
//! and the adapter that turns `{label, score}` into per-mention sentiment fields.

use anyhow::{anyhow, Result};
use metrics::counter;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::any::Any;
use std::fmt::Write as _;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::document::truncate_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Positive,
    Negative,
    Neutral,
}

/// Raw classifier output. `score` is the classifier's confidence in `label`, in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    pub score: f64,
}

impl Classification {
    pub fn neutral() -> Self {
        Self {
            label: Label::Neutral,
            score: 1.0,
        }
    }
}

/// A text classifier usable from worker threads.
pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Classification>;

    /// Same-length output as input. Override when the backend amortizes batches.
    fn classify_batch(&self, texts: &[&str]) -> Result<Vec<Classification>> {
        texts.iter().map(|t| self.classify(t)).collect()
    }

    /// Name for logs.
    fn name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn SentimentClassifier>;

/// Per-mention sentiment fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    pub compound: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl SentimentScores {
    pub fn from_classification(c: &Classification) -> Self {
        let s = if c.score.is_nan() {
            0.0
        } else {
            c.score.clamp(0.0, 1.0)
        };
        match c.label {
            Label::Positive => Self {
                compound: s,
                positive: s,
                ..Self::default()
            },
            Label::Negative => Self {
                compound: -s,
                negative: s,
                ..Self::default()
            },
            Label::Neutral => Self {
                neutral: s,
                ..Self::default()
            },
        }
    }
}

/// Short SHA-256 prefix used to identify a text in logs without logging the text.
pub fn text_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Runs a classifier call, turning a panic into an error for that call.
fn guarded<T>(call: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|p| Err(anyhow!("classifier panicked: {}", panic_message(p.as_ref()))))
}

/// Wraps a classifier so that a failure (error or panic) never aborts a batch.
#[derive(Clone)]
pub struct SentimentAdapter {
    classifier: DynClassifier,
    max_chars: usize,
}

impl SentimentAdapter {
    pub fn new(classifier: DynClassifier, max_chars: usize) -> Self {
        Self {
            classifier,
            max_chars: max_chars.max(1),
        }
    }

    /// One result per input, in order. A failed or panicking batch call is retried
    /// item by item; items that still fail get zero sentiment.
    pub fn score_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<SentimentScores> {
        let inputs: Vec<&str> = texts
            .iter()
            .map(|t| truncate_chars(t.as_ref(), self.max_chars))
            .collect();
        if inputs.is_empty() {
            return Vec::new();
        }

        match guarded(|| self.classifier.classify_batch(&inputs)) {
            Ok(v) if v.len() == inputs.len() => {
                return v.iter().map(SentimentScores::from_classification).collect();
            }
            Ok(v) => {
                tracing::warn!(
                    target: "sentiment",
                    classifier = self.classifier.name(),
                    expected = inputs.len(),
                    got = v.len(),
                    "batch classification returned wrong length; retrying per item"
                );
            }
            Err(e) => {
                tracing::warn!(
                    target: "sentiment",
                    error = ?e,
                    classifier = self.classifier.name(),
                    "batch classification failed; retrying per item"
                );
            }
        }

        inputs.iter().map(|t| self.score_one(t)).collect()
    }

    pub fn score_one(&self, text: &str) -> SentimentScores {
        let text = truncate_chars(text, self.max_chars);
        match guarded(|| self.classifier.classify(text)) {
            Ok(c) => SentimentScores::from_classification(&c),
            Err(e) => {
                counter!("mention_classification_failures_total").increment(1);
                tracing::warn!(
                    target: "sentiment",
                    error = ?e,
                    classifier = self.classifier.name(),
                    text_id = %text_hash(text),
                    "classification failed; using zero sentiment"
                );
                SentimentScores::default()
            }
        }
    }
}

// ------------------------------------------------------------
// Local classifiers
// ------------------------------------------------------------

/// Always NEUTRAL. Used when no model is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralClassifier;

impl SentimentClassifier for NeutralClassifier {
    fn classify(&self, _text: &str) -> Result<Classification> {
        Ok(Classification::neutral())
    }
    fn name(&self) -> &'static str {
        "neutral"
    }
}

static LEXICON: Lazy<HashMap<&'static str, i32>> = Lazy::new(|| {
    [
        // positive
        ("buy", 2),
        ("bought", 1),
        ("bull", 2),
        ("bullish", 3),
        ("moon", 3),
        ("mooning", 3),
        ("rocket", 2),
        ("gain", 2),
        ("gains", 2),
        ("green", 1),
        ("up", 1),
        ("rally", 2),
        ("rallying", 2),
        ("soar", 3),
        ("soaring", 3),
        ("surge", 2),
        ("beat", 2),
        ("beats", 2),
        ("strong", 2),
        ("growth", 2),
        ("profit", 2),
        ("profitable", 2),
        ("undervalued", 2),
        ("cheap", 1),
        ("love", 3),
        ("great", 3),
        ("good", 2),
        ("win", 2),
        ("winning", 2),
        ("upgrade", 2),
        ("outperform", 2),
        ("breakout", 2),
        ("squeeze", 1),
        ("tendies", 2),
        ("calls", 1),
        ("hodl", 1),
        ("confident", 2),
        ("amazing", 3),
        ("awesome", 3),
        ("record", 1),
        // negative
        ("sell", -2),
        ("sold", -1),
        ("bear", -2),
        ("bearish", -3),
        ("crash", -3),
        ("crashing", -3),
        ("dump", -2),
        ("dumping", -2),
        ("tank", -2),
        ("tanking", -3),
        ("drop", -2),
        ("dropping", -2),
        ("loss", -2),
        ("losses", -2),
        ("red", -1),
        ("down", -1),
        ("miss", -2),
        ("missed", -2),
        ("weak", -2),
        ("overvalued", -2),
        ("bubble", -2),
        ("bagholder", -2),
        ("bagholding", -2),
        ("puts", -1),
        ("scam", -3),
        ("fraud", -3),
        ("bankrupt", -3),
        ("bankruptcy", -3),
        ("downgrade", -2),
        ("underperform", -2),
        ("lawsuit", -2),
        ("hate", -3),
        ("bad", -2),
        ("terrible", -3),
        ("awful", -3),
        ("worst", -3),
        ("fear", -2),
        ("panic", -3),
        ("rekt", -3),
        ("recession", -2),
    ]
    .into_iter()
    .collect()
});

static EMOJI: &[(char, i32)] = &[
    ('🚀', 2),
    ('💎', 1),
    ('🙌', 1),
    ('📈', 2),
    ('📉', -2),
    ('🐻', -2),
    ('🐂', 2),
];

/// Finance-tuned word lexicon with a 3-token negation window.
///
/// The summed score `s` is squashed as `|s| / sqrt(s^2 + 15)`; the label follows its sign.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Returns (raw score, token count).
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for (i, w) in tokens.iter().enumerate() {
            let base = *LEXICON.get(w.as_str()).unwrap_or(&0);
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(&tokens[i - k]));
            score += if negated { -base } else { base };
        }

        for c in text.chars() {
            if let Some((_, v)) = EMOJI.iter().find(|(e, _)| *e == c) {
                score += v;
            }
        }

        (score, tokens.len())
    }
}

impl SentimentClassifier for LexiconClassifier {
    fn classify(&self, text: &str) -> Result<Classification> {
        let (raw, _) = self.score_text(text);
        if raw == 0 {
            return Ok(Classification::neutral());
        }
        let s = raw as f64;
        let strength = s.abs() / (s * s + 15.0).sqrt();
        let label = if raw > 0 {
            Label::Positive
        } else {
            Label::Negative
        };
        Ok(Classification {
            label,
            score: strength,
        })
    }
    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Alphanumeric tokens, lower-case. Apostrophes stay inside tokens so "isn't" survives.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "don't"
            | "didn't"
            | "cannot"
            | "without"
    )
}

// ------------------------------------------------------------
// Caching wrapper
// ------------------------------------------------------------

struct CacheState {
    map: HashMap<String, Classification>,
    order: VecDeque<String>,
}

/// Bounded, FIFO-evicting result cache in front of any classifier. Keys are SHA-256 hex.
pub struct CachingClassifier<C: SentimentClassifier> {
    inner: C,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl<C: SentimentClassifier> CachingClassifier<C> {
    pub fn new(inner: C, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            state: Mutex::new(CacheState {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // A poisoned cache is still a valid cache.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn key(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            let _ = write!(&mut out, "{b:02x}");
        }
        out
    }

    fn insert(&self, key: String, value: Classification) {
        if self.capacity == 0 {
            return;
        }
        let mut g = self.lock();
        if g.map.insert(key.clone(), value).is_none() {
            g.order.push_back(key);
            while g.order.len() > self.capacity {
                if let Some(old) = g.order.pop_front() {
                    g.map.remove(&old);
                }
            }
        }
    }
}

impl<C: SentimentClassifier> SentimentClassifier for CachingClassifier<C> {
    fn classify(&self, text: &str) -> Result<Classification> {
        let key = Self::key(text);
        if let Some(hit) = self.lock().map.get(&key).copied() {
            return Ok(hit);
        }
        let fresh = self.inner.classify(text)?;
        self.insert(key, fresh);
        Ok(fresh)
    }

    fn classify_batch(&self, texts: &[&str]) -> Result<Vec<Classification>> {
        let keys: Vec<String> = texts.iter().map(|t| Self::key(t)).collect();
        let mut out: Vec<Option<Classification>> = {
            let g = self.lock();
            keys.iter().map(|k| g.map.get(k).copied()).collect()
        };

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| out[i].is_none()).collect();
        if !missing.is_empty() {
            let batch: Vec<&str> = missing.iter().map(|&i| texts[i]).collect();
            let fresh = self.inner.classify_batch(&batch)?;
            if fresh.len() != batch.len() {
                anyhow::bail!(
                    "{} returned {} results for {} texts",
                    self.inner.name(),
                    fresh.len(),
                    batch.len()
                );
            }
            for (&i, c) in missing.iter().zip(fresh) {
                self.insert(keys[i].clone(), c);
                out[i] = Some(c);
            }
        }
        Ok(out.into_iter().map(|c| c.unwrap_or_else(Classification::neutral)).collect())
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl SentimentClassifier for Counting {
        fn classify(&self, _text: &str) -> Result<Classification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Classification {
                label: Label::Positive,
                score: 0.9,
            })
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    /// Fails on any text containing "boom"; batch calls always fail.
    struct Flaky;

    impl SentimentClassifier for Flaky {
        fn classify(&self, text: &str) -> Result<Classification> {
            if text.contains("boom") {
                anyhow::bail!("model error");
            }
            Ok(Classification {
                label: Label::Negative,
                score: 0.5,
            })
        }
        fn classify_batch(&self, _texts: &[&str]) -> Result<Vec<Classification>> {
            anyhow::bail!("batch endpoint down")
        }
        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[test]
    fn label_mapping() {
        let pos = SentimentScores::from_classification(&Classification {
            label: Label::Positive,
            score: 0.8,
        });
        assert_eq!((pos.compound, pos.positive, pos.negative), (0.8, 0.8, 0.0));
        let neg = SentimentScores::from_classification(&Classification {
            label: Label::Negative,
            score: 0.6,
        });
        assert_eq!((neg.compound, neg.negative), (-0.6, 0.6));
        let neu = SentimentScores::from_classification(&Classification::neutral());
        assert_eq!((neu.compound, neu.neutral), (0.0, 1.0));
    }

    #[test]
    fn failures_degrade_to_zero_per_item() {
        let a = SentimentAdapter::new(Arc::new(Flaky), 512);
        let out = a.score_batch(&["fine", "boom here", "also fine"]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].compound, -0.5);
        assert_eq!(out[1], SentimentScores::default());
        assert_eq!(out[2].negative, 0.5);
    }

    /// Panics on any text containing "boom", including through the default batch call.
    struct Panicky;

    impl SentimentClassifier for Panicky {
        fn classify(&self, text: &str) -> Result<Classification> {
            if text.contains("boom") {
                panic!("tensor shape mismatch");
            }
            Ok(Classification {
                label: Label::Positive,
                score: 0.9,
            })
        }
        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    #[test]
    fn panics_degrade_to_zero_per_item() {
        let a = SentimentAdapter::new(Arc::new(Panicky), 512);
        let out = a.score_batch(&["fine", "boom here", "also fine"]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].compound, 0.9);
        assert_eq!(out[1], SentimentScores::default());
        assert_eq!(out[2].positive, 0.9);
        assert_eq!(a.score_one("boom"), SentimentScores::default());
    }

    #[test]
    fn lexicon_handles_negation() {
        let lx = LexiconClassifier::new();
        let up = lx.classify("very bullish, going to the moon").unwrap();
        assert_eq!(up.label, Label::Positive);
        let neg = lx.classify("I am not bullish on this at all").unwrap();
        assert_eq!(neg.label, Label::Negative);
        let flat = lx.classify("the quarterly call is on tuesday").unwrap();
        assert_eq!(flat.label, Label::Neutral);
        assert!(up.score > 0.0 && up.score < 1.0);
    }

    #[test]
    fn cache_hits_skip_inner_and_evict_fifo() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = CachingClassifier::new(
            Counting {
                calls: calls.clone(),
            },
            2,
        );
        c.classify("a").unwrap();
        c.classify("a").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        c.classify_batch(&["b", "c", "a"]).unwrap();
        assert_eq!(c.len(), 2);
        // "a" was evicted first, so it is fetched again.
        c.classify("a").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn text_hash_is_short_and_stable() {
        assert_eq!(text_hash("abc").len(), 12);
        assert_eq!(text_hash("abc"), text_hash("abc"));
    }
}

//! Output scoring and ranking.
//!
//! `score` derives the four rubric components from structural features of
//! the text alone (character count, whitespace-token count). It is an
//! illustrative quality proxy so the leaderboard has deterministic numbers
//! to rank — it says nothing about whether an answer is actually good.
//! `rank` is the real contract: a cheap, stable, re-runnable weighting step
//! over cached score records.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Exclusive upper bound for every rubric component.
pub const SCORE_CEILING: f64 = 10.0;

/// Substituted for the weight total when every slider sits at zero.
pub const DEFAULT_WEIGHT_TOTAL: f64 = 100.0;

const ACCURACY_HALF_CHARS: f64 = 600.0;
const COMPLETENESS_HALF_TOKENS: f64 = 120.0;
const CONCISENESS_HALF_TOKENS: f64 = 200.0;
const TONE_HALF_AVG_LEN: f64 = 6.0;

/// Four bounded sub-scores for one agent output, each in `[0, 10)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreCard {
    pub accuracy: f64,
    pub completeness: f64,
    pub conciseness: f64,
    pub tone: f64,
}

/// One agent's cached score, kept in first-scored order for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub agent: String,
    pub scores: ScoreCard,
}

/// User-adjustable rubric weights. Applied at ranking time only; changing
/// them never requires re-scoring the underlying text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RubricWeights {
    pub accuracy: f64,
    pub completeness: f64,
    pub conciseness: f64,
    pub tone: f64,
}

impl Default for RubricWeights {
    fn default() -> Self {
        Self {
            accuracy: 25.0,
            completeness: 25.0,
            conciseness: 25.0,
            tone: 25.0,
        }
    }
}

impl RubricWeights {
    pub fn new(accuracy: f64, completeness: f64, conciseness: f64, tone: f64) -> Self {
        Self {
            accuracy,
            completeness,
            conciseness,
            tone,
        }
    }

    fn total(&self) -> f64 {
        let total = self.accuracy + self.completeness + self.conciseness + self.tone;
        if total > 0.0 {
            total
        } else {
            DEFAULT_WEIGHT_TOTAL
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedAgent {
    pub agent: String,
    pub overall: f64,
    pub scores: ScoreCard,
}

/// Score one output text. Deterministic in the text alone.
pub fn score(text: &str) -> ScoreCard {
    let chars = text.chars().count() as f64;
    let tokens = text.split_whitespace().count() as f64;
    let avg_token_len = if tokens > 0.0 { chars / tokens } else { 0.0 };

    ScoreCard {
        accuracy: saturating(chars, ACCURACY_HALF_CHARS),
        completeness: saturating(tokens, COMPLETENESS_HALF_TOKENS),
        // Inverted axis: fewer tokens score higher. The +1 keeps the empty
        // string strictly under the ceiling.
        conciseness: saturating(CONCISENESS_HALF_TOKENS, tokens + 1.0),
        tone: saturating(avg_token_len, TONE_HALF_AVG_LEN),
    }
}

/// Weighted overall for one card: `Σ(sub·w) / Σw`.
pub fn overall(scores: &ScoreCard, weights: &RubricWeights) -> f64 {
    let weighted = scores.accuracy * weights.accuracy
        + scores.completeness * weights.completeness
        + scores.conciseness * weights.conciseness
        + scores.tone * weights.tone;
    weighted / weights.total()
}

/// Rank cached score records under the given weights. Descending by overall;
/// exact ties keep first-scored order.
pub fn rank(records: &[ScoreRecord], weights: &RubricWeights) -> Vec<RankedAgent> {
    let mut ranked: Vec<RankedAgent> = records
        .iter()
        .map(|record| RankedAgent {
            agent: record.agent.clone(),
            overall: overall(&record.scores, weights),
            scores: record.scores,
        })
        .collect();
    ranked.sort_by(|a, b| b.overall.partial_cmp(&a.overall).unwrap_or(Ordering::Equal));
    ranked
}

/// Maps `[0, ∞)` onto `[0, 10)`, hitting half scale at `half`.
fn saturating(value: f64, half: f64) -> f64 {
    if value <= 0.0 && half <= 0.0 {
        return 0.0;
    }
    SCORE_CEILING * value / (value + half)
}

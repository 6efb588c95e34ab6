//! Mapping registry and best-match selection.
//!
//! Selection order for a request:
//! 1. Drop mappings whose scenario is not in the required state
//! 2. Keep perfect matches (or any non-zero score with partial matching)
//! 3. Lowest priority number wins
//! 4. With partial matching, highest score wins
//! 5. Among the remaining tie, a weighted draw if any mapping carries a weight,
//!    otherwise the configured insertion-order policy

use super::model::MappingModel;
use super::predicate::{PredicateResult, RequestMatcher};
use crate::config::TieBreak;
use crate::error::ConfigError;
use crate::request::RequestMessage;
use crate::scenario::ScenarioTable;
use rand::distributions::WeightedIndex;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Priority of mappings that do not declare one (mid-range).
pub const DEFAULT_PRIORITY: i32 = 0x7FFF_FFFF / 2;

const SCORE_EPSILON: f64 = 1e-9;

/// A registered, compiled mapping.
#[derive(Debug)]
pub struct Mapping {
    guid: Uuid,
    model: MappingModel,
    matcher: RequestMatcher,
    seq: u64,
    usage: AtomicU64,
}

impl Mapping {
    pub fn guid(&self) -> Uuid {
        self.guid
    }

    pub fn title(&self) -> Option<&str> {
        self.model.title.as_deref()
    }

    pub fn priority(&self) -> i32 {
        self.model.priority.unwrap_or(DEFAULT_PRIORITY)
    }

    /// Mapping document with its guid filled in.
    pub fn model(&self) -> &MappingModel {
        &self.model
    }

    pub fn scenario(&self) -> Option<&str> {
        self.model.scenario.as_deref()
    }

    pub fn when_state_is(&self) -> Option<&str> {
        self.model.when_state_is.as_deref()
    }

    pub fn set_state_to(&self) -> Option<&str> {
        self.model.set_state_to.as_deref()
    }

    /// Number of requests this mapping has been selected for.
    pub fn usage_count(&self) -> u64 {
        self.usage.load(Ordering::Relaxed)
    }

    pub fn evaluate(&self, request: &RequestMessage) -> PredicateResult {
        self.matcher.evaluate(request)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub allow_partial: bool,
    pub tie_break: TieBreak,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub mapping: Arc<Mapping>,
    pub score: f64,
}

/// Outcome of `find_best_match`: the selected mapping, or the closest miss.
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    pub selected: Option<Candidate>,
    pub closest: Option<Candidate>,
}

#[derive(Debug, Default)]
pub struct MappingRegistry {
    /// Kept in insertion order
    mappings: Vec<Arc<Mapping>>,
    next_seq: u64,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, compile and insert a mapping. An existing mapping with the same
    /// guid is replaced and counts as newly registered.
    pub fn register(&mut self, mut model: MappingModel) -> Result<Arc<Mapping>, ConfigError> {
        model.validate()?;
        let guid = *model.guid.get_or_insert_with(Uuid::new_v4);
        let matcher = RequestMatcher::compile(&model.request)?;

        let replaced = self.remove(guid).is_some();
        let mapping = Arc::new(Mapping {
            guid,
            model,
            matcher,
            seq: self.next_seq,
            usage: AtomicU64::new(0),
        });
        self.next_seq += 1;
        self.mappings.push(Arc::clone(&mapping));
        debug!(
            "Mapping {} {} (priority {})",
            guid,
            if replaced { "replaced" } else { "registered" },
            mapping.priority()
        );
        Ok(mapping)
    }

    pub fn remove(&mut self, guid: Uuid) -> Option<Arc<Mapping>> {
        let index = self.mappings.iter().position(|m| m.guid == guid)?;
        Some(self.mappings.remove(index))
    }

    pub fn get(&self, guid: Uuid) -> Option<Arc<Mapping>> {
        self.mappings.iter().find(|m| m.guid == guid).cloned()
    }

    pub fn contains(&self, guid: Uuid) -> bool {
        self.mappings.iter().any(|m| m.guid == guid)
    }

    /// All mappings in registration order.
    pub fn list(&self) -> Vec<Arc<Mapping>> {
        self.mappings.clone()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn reset(&mut self) {
        self.mappings.clear();
    }

    /// Whether any mapping is bound to a scenario.
    pub fn has_scenarios(&self) -> bool {
        self.mappings.iter().any(|m| m.scenario().is_some())
    }

    /// Pick the mapping that serves `request`, bumping its usage counter.
    pub fn find_best_match<R: Rng>(
        &self,
        request: &RequestMessage,
        scenarios: &ScenarioTable,
        options: MatchOptions,
        rng: &mut R,
    ) -> MatchReport {
        let evaluated: Vec<(Arc<Mapping>, PredicateResult)> = self
            .mappings
            .iter()
            .filter(|m| scenarios.is_eligible(m.scenario(), m.when_state_is()))
            .map(|m| (Arc::clone(m), m.evaluate(request)))
            .collect();

        let accepted: Vec<&(Arc<Mapping>, PredicateResult)> = evaluated
            .iter()
            .filter(|(_, result)| {
                result.perfect || (options.allow_partial && result.score > SCORE_EPSILON)
            })
            .collect();

        let Some(best_priority) = accepted.iter().map(|(m, _)| m.priority()).min() else {
            return MatchReport {
                selected: None,
                closest: closest(&evaluated),
            };
        };
        let mut tied: Vec<&(Arc<Mapping>, PredicateResult)> = accepted
            .into_iter()
            .filter(|(m, _)| m.priority() == best_priority)
            .collect();
        if options.allow_partial {
            let best_score = tied
                .iter()
                .map(|(_, r)| r.score)
                .fold(f64::MIN, f64::max);
            tied.retain(|(_, r)| (r.score - best_score).abs() < SCORE_EPSILON);
        }

        let chosen = choose(&tied, options.tie_break, rng);
        chosen.map(|(mapping, result)| {
            mapping.usage.fetch_add(1, Ordering::Relaxed);
            MatchReport {
                selected: Some(Candidate {
                    mapping: Arc::clone(mapping),
                    score: result.score,
                }),
                closest: None,
            }
        })
        .unwrap_or_default()
    }
}

fn choose<'a, R: Rng>(
    tied: &[&'a (Arc<Mapping>, PredicateResult)],
    tie_break: TieBreak,
    rng: &mut R,
) -> Option<&'a (Arc<Mapping>, PredicateResult)> {
    let weighted: Vec<&'a (Arc<Mapping>, PredicateResult)> = tied
        .iter()
        .copied()
        .filter(|(m, _)| m.model.weight.is_some())
        .collect();
    if !weighted.is_empty() {
        let weights = weighted.iter().map(|(m, _)| m.model.weight.unwrap_or(0.0));
        if let Ok(distribution) = WeightedIndex::new(weights) {
            return Some(weighted[rng.sample(distribution)]);
        }
    }
    let by_seq = tied.iter().copied();
    match tie_break {
        TieBreak::LastRegistered => by_seq.max_by_key(|(m, _)| m.seq),
        TieBreak::FirstRegistered => by_seq.min_by_key(|(m, _)| m.seq),
    }
}

/// Best-scoring non-zero miss, preferring lower priority numbers on equal scores.
fn closest(evaluated: &[(Arc<Mapping>, PredicateResult)]) -> Option<Candidate> {
    evaluated
        .iter()
        .filter(|(_, r)| r.score > SCORE_EPSILON)
        .max_by(|(a, ra), (b, rb)| {
            ra.score
                .total_cmp(&rb.score)
                .then_with(|| b.priority().cmp(&a.priority()))
        })
        .map(|(mapping, result)| Candidate {
            mapping: Arc::clone(mapping),
            score: result.score,
        })
}

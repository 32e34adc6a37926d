//! Price-history span engine
//!
//! Pure planner over the stored span set for one `(product, vendor)` pair.
//! Given a new observation it computes the minimal set of mutations that
//! keeps the invariants:
//!
//! - spans are non-overlapping and totally ordered by `valid_from`
//! - at most one span is open (`valid_to = NULL`)
//! - `valid_from < valid_to` whenever both are present
//! - no two adjacent spans share `(price, currency)`
//!
//! The repository applies the plan inside the caller's transaction, so a
//! failed batch leaves the stored set untouched.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use uuid::Uuid;

use pricebot_store::{PriceSpan, SpanMutation};

use crate::error::{CatalogError, Result};

/// One incoming price observation
#[derive(Debug, Clone)]
pub struct Observation {
    pub product_id: Uuid,
    pub vendor_id: Uuid,
    pub price: Decimal,
    pub currency: String,
    pub at: NaiveDateTime,
    pub source_offer_id: Uuid,
}

/// Plan the mutations for one observation against the ordered span set.
///
/// `existing` must be sorted by `valid_from` (the repository guarantees it).
/// Re-planning the same `(product, vendor, at, price)` yields an empty plan.
pub fn plan(existing: &[PriceSpan], observation: &Observation) -> Result<Vec<SpanMutation>> {
    let mut spans: Vec<PriceSpan> = existing.to_vec();

    if let Some(clash) = spans
        .iter()
        .find(|s| s.valid_from == observation.at && !same_price(s, observation))
    {
        return Err(CatalogError::HistoryConflict(format!(
            "span starting {} already holds price {} {}",
            clash.valid_from, clash.price, clash.currency
        )));
    }

    apply_observation(&mut spans, observation);
    merge_adjacent(&mut spans);
    Ok(diff(existing, &spans))
}

fn same_price(span: &PriceSpan, observation: &Observation) -> bool {
    span.price == observation.price && span.currency == observation.currency
}

fn new_span(observation: &Observation, valid_to: Option<NaiveDateTime>) -> PriceSpan {
    let mut span = PriceSpan::open(
        observation.product_id,
        observation.vendor_id,
        observation.price,
        observation.currency.clone(),
        observation.at,
        observation.source_offer_id,
    );
    span.valid_to = valid_to;
    span
}

fn apply_observation(spans: &mut Vec<PriceSpan>, observation: &Observation) {
    let t = observation.at;

    if spans.is_empty() {
        spans.push(new_span(observation, None));
        return;
    }

    // Before the first span: a closed prefix span ending where history begins
    if t < spans[0].valid_from {
        let first_start = spans[0].valid_from;
        spans.insert(0, new_span(observation, Some(first_start)));
        return;
    }

    // Covering span: the unique one with valid_from <= t < valid_to (or open)
    let idx = spans
        .iter()
        .rposition(|s| s.valid_from <= t)
        .expect("t is not before the first span");
    let covering = &spans[idx];

    let inside = match covering.valid_to {
        None => true,
        Some(end) => t < end,
    };

    if inside {
        if same_price(covering, observation) {
            return;
        }
        if covering.valid_from == t {
            // Caught by the clash check in plan(); nothing to do here
            return;
        }
        // Split: close the covering span at t, the new span takes over
        // until where the covering span used to end
        let original_end = covering.valid_to;
        spans[idx].valid_to = Some(t);
        spans.insert(idx + 1, new_span(observation, original_end));
    } else {
        // Past the end of a fully closed history: open a fresh span
        spans.push(new_span(observation, None));
    }
}

/// Collapse adjacent spans with identical `(price, currency)`
fn merge_adjacent(spans: &mut Vec<PriceSpan>) {
    let mut i = 0;
    while i + 1 < spans.len() {
        let mergeable = spans[i].valid_to == Some(spans[i + 1].valid_from)
            && spans[i].price == spans[i + 1].price
            && spans[i].currency == spans[i + 1].currency;
        if mergeable {
            spans[i].valid_to = spans[i + 1].valid_to;
            spans.remove(i + 1);
        } else {
            i += 1;
        }
    }
}

/// Express the final list as mutations against the original
fn diff(existing: &[PriceSpan], target: &[PriceSpan]) -> Vec<SpanMutation> {
    let before: HashMap<Uuid, &PriceSpan> = existing.iter().map(|s| (s.id, s)).collect();
    let after: HashMap<Uuid, &PriceSpan> = target.iter().map(|s| (s.id, s)).collect();

    let mut mutations = Vec::new();

    // Re-bound surviving spans first so inserts land in a consistent set
    for span in target {
        if let Some(original) = before.get(&span.id)
            && original.valid_to != span.valid_to
        {
            mutations.push(SpanMutation::SetValidTo {
                id: span.id,
                valid_to: span.valid_to,
            });
        }
    }
    for span in target {
        if !before.contains_key(&span.id) {
            mutations.push(SpanMutation::Insert(span.clone()));
        }
    }
    for span in existing {
        if !after.contains_key(&span.id) {
            mutations.push(SpanMutation::Delete { id: span.id });
        }
    }
    mutations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn observation(day: u32, price: &str) -> Observation {
        Observation {
            product_id: Uuid::nil(),
            vendor_id: Uuid::nil(),
            price: price.parse().unwrap(),
            currency: "USD".into(),
            at: at(day),
            source_offer_id: Uuid::new_v4(),
        }
    }

    /// Run a plan and apply it to an in-memory list for the next step
    fn step(spans: &mut Vec<PriceSpan>, obs: &Observation) -> Vec<SpanMutation> {
        let mutations = plan(spans, obs).unwrap();
        for mutation in &mutations {
            match mutation {
                SpanMutation::Insert(span) => {
                    spans.push(span.clone());
                    spans.sort_by_key(|s| s.valid_from);
                }
                SpanMutation::SetValidTo { id, valid_to } => {
                    spans.iter_mut().find(|s| s.id == *id).unwrap().valid_to = *valid_to;
                }
                SpanMutation::Delete { id } => {
                    spans.retain(|s| s.id != *id);
                }
            }
        }
        mutations
    }

    fn check_invariants(spans: &[PriceSpan]) {
        let open = spans.iter().filter(|s| s.is_open()).count();
        assert!(open <= 1, "more than one open span");
        for window in spans.windows(2) {
            let end = window[0].valid_to.expect("non-final span must be closed");
            assert!(end <= window[1].valid_from, "overlapping spans");
            if end == window[1].valid_from {
                assert!(
                    window[0].price != window[1].price
                        || window[0].currency != window[1].currency,
                    "adjacent equal-price spans survived merge"
                );
            }
        }
        for span in spans {
            if let Some(end) = span.valid_to {
                assert!(span.valid_from < end, "empty or inverted span");
            }
        }
    }

    #[test]
    fn test_first_observation_opens_a_span() {
        let mut spans = Vec::new();
        step(&mut spans, &observation(10, "100"));
        assert_eq!(spans.len(), 1);
        assert!(spans[0].is_open());
        assert_eq!(spans[0].valid_from, at(10));
        check_invariants(&spans);
    }

    #[test]
    fn test_same_price_continues() {
        let mut spans = Vec::new();
        step(&mut spans, &observation(10, "100"));
        let mutations = step(&mut spans, &observation(15, "100"));
        assert!(mutations.is_empty());
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn test_price_change_closes_and_opens() {
        let mut spans = Vec::new();
        step(&mut spans, &observation(10, "100"));
        step(&mut spans, &observation(20, "120"));

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].valid_to, Some(at(20)));
        assert_eq!(spans[1].valid_from, at(20));
        assert!(spans[1].is_open());
        check_invariants(&spans);
    }

    #[test]
    fn test_out_of_order_split() {
        // The §8 scenario: 10 @ 100, 20 @ 120, then 15 @ 110 lands between
        let mut spans = Vec::new();
        step(&mut spans, &observation(10, "100"));
        step(&mut spans, &observation(20, "120"));
        step(&mut spans, &observation(15, "110"));

        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].valid_from, at(10));
        assert_eq!(spans[0].valid_to, Some(at(15)));
        assert_eq!(spans[0].price, "100".parse().unwrap());
        assert_eq!(spans[1].valid_from, at(15));
        assert_eq!(spans[1].valid_to, Some(at(20)));
        assert_eq!(spans[1].price, "110".parse().unwrap());
        assert_eq!(spans[2].valid_from, at(20));
        assert!(spans[2].is_open());
        assert_eq!(spans[2].price, "120".parse().unwrap());
        check_invariants(&spans);
    }

    #[test]
    fn test_before_first_span_inserts_closed_prefix() {
        // Insert at T, then T-1 with a different price
        let mut spans = Vec::new();
        step(&mut spans, &observation(10, "100"));
        step(&mut spans, &observation(9, "90"));

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].valid_from, at(9));
        assert_eq!(spans[0].valid_to, Some(at(10)));
        assert_eq!(spans[0].price, "90".parse().unwrap());
        assert!(spans[1].is_open());
        check_invariants(&spans);
    }

    #[test]
    fn test_before_first_span_with_equal_price_merges() {
        let mut spans = Vec::new();
        step(&mut spans, &observation(10, "100"));
        step(&mut spans, &observation(9, "100"));

        // The prefix merges into the open span
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].valid_from, at(9));
        assert!(spans[0].is_open());
        check_invariants(&spans);
    }

    #[test]
    fn test_split_with_equal_price_inside_is_noop() {
        let mut spans = Vec::new();
        step(&mut spans, &observation(10, "100"));
        step(&mut spans, &observation(20, "120"));
        let mutations = step(&mut spans, &observation(12, "100"));
        assert!(mutations.is_empty());
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn test_idempotent_reinsert() {
        let mut spans = Vec::new();
        step(&mut spans, &observation(10, "100"));
        step(&mut spans, &observation(20, "120"));
        step(&mut spans, &observation(15, "110"));
        let snapshot: Vec<_> = spans.iter().map(|s| (s.valid_from, s.valid_to, s.price)).collect();

        // Same (t, p) again: no mutations, same final set
        let mutations = step(&mut spans, &observation(15, "110"));
        assert!(mutations.is_empty());
        let after: Vec<_> = spans.iter().map(|s| (s.valid_from, s.valid_to, s.price)).collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_same_instant_different_price_is_a_conflict() {
        let mut spans = Vec::new();
        step(&mut spans, &observation(10, "100"));
        let err = plan(&spans, &observation(10, "140")).unwrap_err();
        assert!(matches!(err, CatalogError::HistoryConflict(_)));
    }

    #[test]
    fn test_currency_difference_blocks_continuation_and_merge() {
        let mut spans = Vec::new();
        step(&mut spans, &observation(10, "100"));
        let mut eur = observation(20, "100");
        eur.currency = "EUR".into();
        step(&mut spans, &eur);

        assert_eq!(spans.len(), 2, "same amount, new currency opens a span");
        check_invariants(&spans);
    }

    #[test]
    fn test_long_out_of_order_sequence_keeps_invariants() {
        let mut spans = Vec::new();
        for (day, price) in [
            (20, "120"), (10, "100"), (15, "110"), (12, "100"), (25, "125"),
            (11, "105"), (18, "110"), (9, "95"), (22, "120"),
        ] {
            step(&mut spans, &observation(day, price));
            check_invariants(&spans);
        }
    }
}

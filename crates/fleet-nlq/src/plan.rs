//! Query plan synthesis.
//!
//! Combines the routed archetype, the extracted entities and the schema
//! registry into the final plan. The plan names logical dimensions and
//! metrics only; resolving them to storage paths is the executor's job.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CanonicalQuestion;
use crate::config::RouterConfig;
use crate::extract::resolves_in_dictionaries;
use crate::normalize::normalize;
use crate::schema::{dim, SchemaRegistry};
use crate::types::{
    EntityBag, FilterValue, QuestionType, RelativeWindow, SortSpec, TimeRange,
};

// ============================================================================
// Outcomes
// ============================================================================

/// The structured, backend-agnostic query description handed to the
/// downstream executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub group_by: Vec<String>,
    pub metrics: Vec<String>,
    pub filters: BTreeMap<String, FilterValue>,
    /// Absolute span, inclusive start and exclusive end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    /// Trailing window ("son 6 ay") the executor anchors against the event
    /// store's latest date; never present together with `time_range`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_window: Option<RelativeWindow>,
    pub sort: SortSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// A routed archetype whose mandatory entity is absent from the question.
/// Surfaced so the caller can ask for the missing value instead of running
/// a meaningless aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompletePlan {
    pub question_type: QuestionType,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Complete(QueryPlan),
    Incomplete(IncompletePlan),
}

// ============================================================================
// Synthesis
// ============================================================================

pub fn synthesize(
    question: &CanonicalQuestion,
    entities: &EntityBag,
    schema: &SchemaRegistry,
    config: &RouterConfig,
) -> PlanOutcome {
    let missing: Vec<String> = question
        .required_entities
        .iter()
        .filter(|dimension| !entities.satisfies(dimension.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return PlanOutcome::Incomplete(IncompletePlan {
            question_type: question.question_type,
            missing,
        });
    }

    let mut group_by = question.required_dimensions.clone();
    for dimension in &question.optional_dimensions {
        if entities.satisfies(dimension) && !group_by.contains(dimension) {
            group_by.push(dimension.clone());
        }
    }

    // A trailing window outranks any year-derived span; the executor anchors
    // it against the event store's latest date, not the host clock.
    let (time_range, narrowed_month, narrowed_season) = if entities.relative_window.is_some() {
        (None, false, false)
    } else {
        build_time_range(entities)
    };

    let mut filters = question.default_filters.clone();
    {
        let mut apply = |dimension: &str, value: Option<FilterValue>| {
            if let Some(value) = value {
                if schema.dimension(dimension).is_some() {
                    filters.insert(dimension.to_string(), value);
                }
            }
        };
        apply(dim::VEHICLE_ID, membership(entities.vehicle_ids.iter().cloned()));
        apply(dim::CUSTOMER_ID, membership(entities.customer_ids.iter().cloned()));
        apply(dim::SERVICE_LOCATION, membership(entities.service_ids.iter().cloned()));
        apply(dim::FAULT_CODE, membership(entities.fault_codes.iter().cloned()));
        apply(
            dim::VEHICLE_TYPE,
            membership(entities.vehicle_types.iter().map(|v| v.as_str().to_string())),
        );
        apply(
            dim::MANUFACTURER,
            membership(entities.manufacturers.iter().map(|m| m.as_str().to_string())),
        );
        apply(
            dim::VEHICLE_MODEL,
            membership(entities.vehicle_models.iter().cloned()),
        );
        apply(dim::MATERIAL_NAME, contains_membership(&entities.material_keywords));
        if !narrowed_month {
            apply(dim::MONTH, int_membership(&entities.months));
        }
        if !narrowed_season {
            apply(
                dim::SEASON,
                membership(entities.seasons.iter().map(|s| s.as_str().to_string())),
            );
        }
    }

    if question.question_type == QuestionType::Comparison {
        merge_unresolved_comparison_sides(entities, &mut filters);
    }

    let limit = if entities.has_top_signal {
        Some(entities.top_limit.unwrap_or(config.matching.default_top_limit))
    } else {
        None
    };

    let ranking_context = entities.has_top_signal
        || question.question_type == QuestionType::Comparison
        || entities.comparison_entities.len() >= 2;
    let sort = match question.metrics.first() {
        Some(metric) if ranking_context => SortSpec::desc(metric),
        _ => question.default_sort.clone(),
    };

    PlanOutcome::Complete(QueryPlan {
        group_by,
        metrics: question.metrics.clone(),
        filters,
        time_range,
        relative_window: entities.relative_window,
        sort,
        limit,
    })
}

// ============================================================================
// Time Range
// ============================================================================

/// Years become an absolute span. A single month or season narrows it only
/// when exactly one year is present; with several years the combination is
/// ambiguous and the month or season stays a filter. Returns the range and
/// whether month or season narrowing consumed the respective entity.
fn build_time_range(entities: &EntityBag) -> (Option<TimeRange>, bool, bool) {
    let (Some(&first), Some(&last)) = (entities.years.first(), entities.years.last()) else {
        return (None, false, false);
    };

    if entities.years.len() == 1 {
        if entities.months.len() == 1 {
            if let Some(&month) = entities.months.first() {
                let (end_year, end_month) = if month == 12 {
                    (first + 1, 1)
                } else {
                    (first, month + 1)
                };
                if let (Some(start), Some(end)) =
                    (month_start(first, month), month_start(end_year, end_month))
                {
                    return (Some(TimeRange { start, end }), true, false);
                }
            }
        }
        // Winter wraps the year boundary and has no contiguous span.
        if entities.seasons.len() == 1 {
            if let Some((from, to)) = entities.seasons.first().and_then(|s| s.month_span()) {
                if let (Some(start), Some(end)) = (month_start(first, from), month_start(first, to))
                {
                    return (Some(TimeRange { start, end }), false, true);
                }
            }
        }
    }

    match (month_start(first, 1), month_start(last + 1, 1)) {
        (Some(start), Some(end)) => (Some(TimeRange { start, end }), false, false),
        _ => (None, false, false),
    }
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    Some(
        NaiveDate::from_ymd_opt(year, month, 1)?
            .and_hms_opt(0, 0, 0)?
            .and_utc(),
    )
}

// ============================================================================
// Filters
// ============================================================================

fn membership<I: IntoIterator<Item = String>>(values: I) -> Option<FilterValue> {
    let mut values: Vec<String> = values.into_iter().collect();
    match values.len() {
        0 => None,
        1 => Some(FilterValue::Eq(values.swap_remove(0))),
        _ => Some(FilterValue::In(values)),
    }
}

fn int_membership(values: &BTreeSet<u32>) -> Option<FilterValue> {
    let mut values: Vec<i64> = values.iter().map(|&v| i64::from(v)).collect();
    match values.len() {
        0 => None,
        1 => Some(FilterValue::EqInt(values.swap_remove(0))),
        _ => Some(FilterValue::InInt(values)),
    }
}

fn contains_membership(values: &BTreeSet<String>) -> Option<FilterValue> {
    let mut values: Vec<String> = values.iter().cloned().collect();
    match values.len() {
        0 => None,
        1 => Some(FilterValue::Contains(values.swap_remove(0))),
        _ => Some(FilterValue::ContainsAny(values)),
    }
}

/// Comparison sides no dictionary resolves are kept as raw manufacturer
/// filter values instead of being dropped, so one unrecognized name does
/// not erase the user's intent.
fn merge_unresolved_comparison_sides(
    entities: &EntityBag,
    filters: &mut BTreeMap<String, FilterValue>,
) {
    let unresolved: Vec<String> = entities
        .comparison_entities
        .iter()
        .filter(|span| !resolves_in_dictionaries(&normalize(span.as_str()).text))
        .cloned()
        .collect();
    if unresolved.is_empty() {
        return;
    }
    let mut values = match filters.remove(dim::MANUFACTURER) {
        Some(FilterValue::Eq(value)) => vec![value],
        Some(FilterValue::In(values)) => values,
        _ => Vec::new(),
    };
    for span in unresolved {
        if !values.contains(&span) {
            values.push(span);
        }
    }
    let filter = if values.len() == 1 {
        FilterValue::Eq(values.swap_remove(0))
    } else {
        FilterValue::In(values)
    };
    filters.insert(dim::MANUFACTURER.to_string(), filter);
}

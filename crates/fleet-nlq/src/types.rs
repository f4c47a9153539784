//! Shared value types for the question analysis pipeline.
//!
//! Everything here is plain data passed between pipeline stages: extracted
//! entities, canonical categorical values and the building blocks of a query
//! plan. The stages themselves live in their own modules.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::dim;

// ============================================================================
// Question Archetypes
// ============================================================================

/// The twelve canonical question archetypes.
///
/// Declaration order doubles as priority order: when two archetypes tie on
/// score and feasibility, the one declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MaintenanceHistory,
    FaultAnalysis,
    MaterialUsage,
    CostAnalysis,
    VehicleBased,
    CustomerBased,
    ServiceBased,
    TimeSeries,
    Seasonal,
    TopEntities,
    Distribution,
    Comparison,
}

impl QuestionType {
    /// Every archetype, in declaration (priority) order.
    pub const ALL: [QuestionType; 12] = [
        QuestionType::MaintenanceHistory,
        QuestionType::FaultAnalysis,
        QuestionType::MaterialUsage,
        QuestionType::CostAnalysis,
        QuestionType::VehicleBased,
        QuestionType::CustomerBased,
        QuestionType::ServiceBased,
        QuestionType::TimeSeries,
        QuestionType::Seasonal,
        QuestionType::TopEntities,
        QuestionType::Distribution,
        QuestionType::Comparison,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MaintenanceHistory => "maintenance_history",
            QuestionType::FaultAnalysis => "fault_analysis",
            QuestionType::MaterialUsage => "material_usage",
            QuestionType::CostAnalysis => "cost_analysis",
            QuestionType::VehicleBased => "vehicle_based",
            QuestionType::CustomerBased => "customer_based",
            QuestionType::ServiceBased => "service_based",
            QuestionType::TimeSeries => "time_series",
            QuestionType::Seasonal => "seasonal",
            QuestionType::TopEntities => "top_entities",
            QuestionType::Distribution => "distribution",
            QuestionType::Comparison => "comparison",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Categorical Values
// ============================================================================

/// Season referenced by a question. Canonical values are English; the
/// extractor maps the Turkish surface forms onto them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }

    /// Month span `[start, end)` when the season sits inside a single
    /// calendar year. Winter (Dec-Feb) straddles the year boundary and
    /// returns `None`.
    pub fn month_span(&self) -> Option<(u32, u32)> {
        match self {
            Season::Winter => None,
            Season::Spring => Some((3, 6)),
            Season::Summer => Some((6, 9)),
            Season::Autumn => Some((9, 12)),
        }
    }
}

/// Vehicle class from the fleet's type dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Bus,
    Truck,
    Minibus,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Bus => "bus",
            VehicleType::Truck => "truck",
            VehicleType::Minibus => "minibus",
        }
    }
}

/// Manufacturer from the fleet's brand dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Manufacturer {
    Man,
    Mercedes,
    Iveco,
    Ford,
    Temsa,
}

impl Manufacturer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Manufacturer::Man => "man",
            Manufacturer::Mercedes => "mercedes",
            Manufacturer::Iveco => "iveco",
            Manufacturer::Ford => "ford",
            Manufacturer::Temsa => "temsa",
        }
    }
}

// ============================================================================
// Temporal Values
// ============================================================================

/// Unit of a trailing time window ("son 6 ay", "son 2 yıl").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeUnit {
    Month,
    Year,
}

/// A trailing window ("son 6 ay"), left unresolved so the executing layer
/// can anchor it against the event store's latest date rather than a wall
/// clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeWindow {
    pub unit: RelativeUnit,
    pub value: u32,
}

/// Absolute half-open instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ============================================================================
// Extracted Entities
// ============================================================================

/// Everything the extractor pulled out of a single question.
///
/// Every collection is empty when nothing matched; extraction never fails.
/// Ordered collections keep output deterministic regardless of match order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityBag {
    pub years: BTreeSet<i32>,
    pub months: BTreeSet<u32>,
    pub seasons: BTreeSet<Season>,
    pub vehicle_ids: BTreeSet<String>,
    pub customer_ids: BTreeSet<String>,
    pub service_ids: BTreeSet<String>,
    pub vehicle_types: BTreeSet<VehicleType>,
    pub manufacturers: BTreeSet<Manufacturer>,
    pub fault_codes: BTreeSet<String>,
    pub material_keywords: BTreeSet<String>,
    /// Model designations in mention order, most specific first.
    pub vehicle_models: Vec<String>,
    pub relative_window: Option<RelativeWindow>,
    pub has_top_signal: bool,
    /// Explicit "top N" count; business defaults are applied at plan
    /// synthesis, never here.
    pub top_limit: Option<u32>,
    /// Raw text spans joined by "ve"/"ile"; two or more means the question
    /// asks for a comparison.
    pub comparison_entities: Vec<String>,
}

impl EntityBag {
    /// Whether the extracted entities can back a grouping dimension. Drives
    /// the matcher's feasibility tie-break and the synthesizer's optional
    /// dimension selection.
    pub fn satisfies(&self, dimension: &str) -> bool {
        match dimension {
            dim::VEHICLE_ID => !self.vehicle_ids.is_empty(),
            dim::CUSTOMER_ID => !self.customer_ids.is_empty(),
            dim::SERVICE_LOCATION => !self.service_ids.is_empty(),
            dim::VEHICLE_TYPE => !self.vehicle_types.is_empty(),
            dim::MANUFACTURER => !self.manufacturers.is_empty(),
            dim::VEHICLE_MODEL => !self.vehicle_models.is_empty(),
            dim::MATERIAL_NAME => !self.material_keywords.is_empty(),
            dim::FAULT_CODE => !self.fault_codes.is_empty(),
            dim::YEAR => !self.years.is_empty(),
            dim::MONTH => !self.months.is_empty(),
            dim::SEASON => !self.seasons.is_empty(),
            _ => false,
        }
    }
}

// ============================================================================
// Plan Building Blocks
// ============================================================================

/// A single filter predicate, keyed in the plan by a schema dimension name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    /// Exact string equality.
    Eq(String),
    /// Set membership over strings.
    In(Vec<String>),
    /// Exact integer equality (year, month).
    EqInt(i64),
    /// Set membership over integers.
    InInt(Vec<i64>),
    /// Substring containment, for free-form dimensions such as material name.
    Contains(String),
    /// Containment of any of the given substrings.
    ContainsAny(Vec<String>),
    /// Boolean flag dimension.
    Flag(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort key plus direction; the key names either a metric or a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(key: &str) -> Self {
        Self {
            key: key.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(key: &str) -> Self {
        Self {
            key: key.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

//! Storage schema registry for the maintenance event store.
//!
//! Maps logical dimension and metric names onto their storage paths inside
//! xAPI maintenance statements. The pipeline reasons only in logical names;
//! the registry is what a downstream query builder needs to turn a plan into
//! an actual aggregation.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical dimension names used across the catalogue, plans and filters.
pub mod dim {
    pub const VEHICLE_ID: &str = "vehicleId";
    pub const VEHICLE_TYPE: &str = "vehicleType";
    pub const VEHICLE_MODEL: &str = "vehicleModel";
    pub const MANUFACTURER: &str = "manufacturer";
    pub const CUSTOMER_ID: &str = "customerId";
    pub const SERVICE_LOCATION: &str = "serviceLocation";
    pub const MATERIAL_NAME: &str = "materialName";
    pub const FAULT_CODE: &str = "faultCode";
    pub const HAS_FAULT: &str = "hasFault";
    pub const VERB_TYPE: &str = "verbType";
    pub const WORK_ORDER_ID: &str = "workOrderId";
    pub const OPERATION_DATE: &str = "operationDate";
    pub const YEAR: &str = "year";
    pub const MONTH: &str = "month";
    pub const SEASON: &str = "season";
    pub const DAY_OF_WEEK: &str = "dayOfWeek";
}

/// Logical metric names.
pub mod metric {
    pub const COUNT: &str = "count";
    pub const SUM_QUANTITY: &str = "sum_quantity";
    pub const AVG_QUANTITY: &str = "avg_quantity";
    pub const SUM_COST: &str = "sum_cost";
    pub const AVG_COST: &str = "avg_cost";
    pub const SUM_DISCOUNT: &str = "sum_discount";
    pub const AVG_KM: &str = "avg_km";
    pub const MIN_KM: &str = "min_km";
    pub const MAX_KM: &str = "max_km";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Str,
    Enum,
    Int,
    Date,
    Bool,
}

/// Rough value-count class of a dimension, as documented for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// One groupable/filterable field of the event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionSpec {
    pub name: String,
    /// Dot path into a statement, or a derivation expression such as
    /// `year(operationDate)`.
    pub storage_path: String,
    pub data_type: DataType,
    pub cardinality: Cardinality,
}

/// One aggregatable measure of the event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSpec {
    pub name: String,
    pub aggregation: Aggregation,
    /// Path aggregated over; `None` for plain statement counts.
    pub source_path: Option<String>,
    /// Display unit ("adet", "TL", "km").
    pub unit: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("{context} references unknown dimension: {name}")]
    UnknownDimension { context: String, name: String },
    #[error("{context} references unknown metric: {name}")]
    UnknownMetric { context: String, name: String },
    #[error("invalid registry: {0}")]
    Invalid(String),
}

/// Immutable dimension/metric registry, loaded once and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    pub dimensions: Vec<DimensionSpec>,
    pub metrics: Vec<MetricSpec>,
}

fn context_extension(name: &str) -> String {
    format!("context.extensions.https://promptever.com/extensions/{name}")
}

fn result_extension(name: &str) -> String {
    format!("result.extensions.https://promptever.com/extensions/{name}")
}

fn dimension(name: &str, storage_path: String, data_type: DataType, cardinality: Cardinality) -> DimensionSpec {
    DimensionSpec {
        name: name.to_string(),
        storage_path,
        data_type,
        cardinality,
    }
}

fn measure(name: &str, aggregation: Aggregation, source_path: Option<String>, unit: &str) -> MetricSpec {
    MetricSpec {
        name: name.to_string(),
        aggregation,
        source_path,
        unit: unit.to_string(),
    }
}

impl SchemaRegistry {
    pub fn dimension(&self, name: &str) -> Option<&DimensionSpec> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn metric(&self, name: &str) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Checks internal consistency: unique names, non-empty paths, and a
    /// source path on every metric that aggregates values.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut seen = std::collections::BTreeSet::new();
        for d in &self.dimensions {
            if !seen.insert(d.name.as_str()) {
                return Err(RegistryError::Duplicate {
                    kind: "dimension",
                    name: d.name.clone(),
                });
            }
            if d.storage_path.is_empty() {
                return Err(RegistryError::Invalid(format!(
                    "dimension {} has an empty storage path",
                    d.name
                )));
            }
        }
        let mut seen = std::collections::BTreeSet::new();
        for m in &self.metrics {
            if !seen.insert(m.name.as_str()) {
                return Err(RegistryError::Duplicate {
                    kind: "metric",
                    name: m.name.clone(),
                });
            }
            if m.aggregation != Aggregation::Count && m.source_path.is_none() {
                return Err(RegistryError::Invalid(format!(
                    "metric {} aggregates values but has no source path",
                    m.name
                )));
            }
        }
        Ok(())
    }

    /// Loads a registry from a JSON file, for deployments that override the
    /// built-in statement layout.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema registry {}", path.display()))?;
        let registry: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse schema registry {}", path.display()))?;
        registry.validate()?;
        Ok(registry)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let dimensions = vec![
            dimension(dim::VEHICLE_ID, "actor.account.name".into(), DataType::Str, Cardinality::High),
            dimension(dim::VEHICLE_TYPE, context_extension("vehicleType"), DataType::Enum, Cardinality::Low),
            dimension(dim::VEHICLE_MODEL, context_extension("modelNo"), DataType::Str, Cardinality::Medium),
            dimension(dim::MANUFACTURER, context_extension("manufacturer"), DataType::Enum, Cardinality::Low),
            dimension(dim::CUSTOMER_ID, "context.contextActivities.grouping".into(), DataType::Str, Cardinality::High),
            dimension(dim::SERVICE_LOCATION, "context.contextActivities.grouping".into(), DataType::Str, Cardinality::Low),
            dimension(dim::WORK_ORDER_ID, "context.contextActivities.parent".into(), DataType::Str, Cardinality::High),
            dimension(dim::MATERIAL_NAME, "object.definition.name.tr-TR".into(), DataType::Str, Cardinality::High),
            dimension(dim::FAULT_CODE, result_extension("faultCode"), DataType::Str, Cardinality::Medium),
            dimension(dim::HAS_FAULT, format!("exists({})", result_extension("faultCode")), DataType::Bool, Cardinality::Low),
            dimension(dim::VERB_TYPE, "verb.id".into(), DataType::Enum, Cardinality::Low),
            dimension(dim::OPERATION_DATE, context_extension("operationDate"), DataType::Date, Cardinality::High),
            dimension(dim::YEAR, "year(operationDate)".into(), DataType::Int, Cardinality::Low),
            dimension(dim::MONTH, "month(operationDate)".into(), DataType::Int, Cardinality::Low),
            dimension(dim::SEASON, "season(operationDate)".into(), DataType::Enum, Cardinality::Low),
            dimension(dim::DAY_OF_WEEK, "dayOfWeek(operationDate)".into(), DataType::Enum, Cardinality::Low),
        ];

        let metrics = vec![
            measure(metric::COUNT, Aggregation::Count, None, "adet"),
            measure(metric::SUM_QUANTITY, Aggregation::Sum, Some(result_extension("materialQuantity")), "adet"),
            measure(metric::AVG_QUANTITY, Aggregation::Avg, Some(result_extension("materialQuantity")), "adet"),
            measure(metric::SUM_COST, Aggregation::Sum, Some(result_extension("materialCost")), "TL"),
            measure(metric::AVG_COST, Aggregation::Avg, Some(result_extension("materialCost")), "TL"),
            measure(metric::SUM_DISCOUNT, Aggregation::Sum, Some(result_extension("discountAmount")), "TL"),
            measure(metric::AVG_KM, Aggregation::Avg, Some(result_extension("odometerReading")), "km"),
            measure(metric::MIN_KM, Aggregation::Min, Some(result_extension("odometerReading")), "km"),
            measure(metric::MAX_KM, Aggregation::Max, Some(result_extension("odometerReading")), "km"),
        ];

        Self { dimensions, metrics }
    }
}

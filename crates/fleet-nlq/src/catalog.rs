//! The canonical question catalog.
//!
//! Each entry is one answerable question archetype: its trigger vocabulary,
//! the dimensions a query needs, the metrics worth computing and how to sort
//! them. Catalog order is priority order; ties in trigger score fall to the
//! earlier entry. The built-in catalog covers the twelve archetypes of the
//! fleet maintenance domain, and [`QuestionCatalog::from_file`] swaps in a
//! custom one without recompiling.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::schema::{dim, metric, RegistryError, SchemaRegistry};
use crate::types::{FilterValue, QuestionType, SortSpec};

// ============================================================================
// Catalog Entry
// ============================================================================

/// One answerable question archetype.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalQuestion {
    pub question_type: QuestionType,
    /// Folded trigger phrases; the match score is the fraction that hit.
    pub triggers: Vec<String>,
    /// Dimensions every query of this archetype groups by.
    pub required_dimensions: Vec<String>,
    /// Dimensions the question text must pin to a concrete value before a
    /// plan can be produced at all.
    #[serde(default)]
    pub required_entities: Vec<String>,
    /// Dimensions appended to the grouping only when the question supplies
    /// a matching entity.
    #[serde(default)]
    pub optional_dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub default_sort: SortSpec,
    #[serde(default)]
    pub default_filters: BTreeMap<String, FilterValue>,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl CanonicalQuestion {
    fn new(
        question_type: QuestionType,
        triggers: &[&str],
        required_dimensions: &[&str],
        metrics: &[&str],
        default_sort: SortSpec,
    ) -> Self {
        Self {
            question_type,
            triggers: to_strings(triggers),
            required_dimensions: to_strings(required_dimensions),
            required_entities: Vec::new(),
            optional_dimensions: Vec::new(),
            metrics: to_strings(metrics),
            default_sort,
            default_filters: BTreeMap::new(),
            examples: Vec::new(),
        }
    }

    fn optional(mut self, dimensions: &[&str]) -> Self {
        self.optional_dimensions = to_strings(dimensions);
        self
    }

    fn requires_entity(mut self, dimension: &str) -> Self {
        self.required_entities.push(dimension.to_string());
        self
    }

    fn filter(mut self, dimension: &str, value: FilterValue) -> Self {
        self.default_filters.insert(dimension.to_string(), value);
        self
    }

    fn example(mut self, text: &str) -> Self {
        self.examples.push(text.to_string());
        self
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionCatalog {
    /// Priority order: earlier entries win score ties.
    pub questions: Vec<CanonicalQuestion>,
}

impl QuestionCatalog {
    pub fn get(&self, question_type: QuestionType) -> Option<&CanonicalQuestion> {
        self.questions.iter().find(|q| q.question_type == question_type)
    }

    /// Position in priority order.
    pub fn priority_rank(&self, question_type: QuestionType) -> Option<usize> {
        self.questions.iter().position(|q| q.question_type == question_type)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Checks that every entry is internally consistent, that every
    /// dimension and metric it names exists in the registry, and that each
    /// of the twelve archetypes appears exactly once.
    pub fn validate(&self, registry: &SchemaRegistry) -> Result<(), RegistryError> {
        if self.questions.is_empty() {
            return Err(RegistryError::Invalid("catalog has no questions".into()));
        }
        let mut seen = BTreeSet::new();
        for question in &self.questions {
            let context = question.question_type.as_str();
            if !seen.insert(question.question_type) {
                return Err(RegistryError::Duplicate {
                    kind: "question",
                    name: context.to_string(),
                });
            }
            if question.triggers.is_empty() {
                return Err(RegistryError::Invalid(format!("{context} has no triggers")));
            }
            if question.metrics.is_empty() {
                return Err(RegistryError::Invalid(format!("{context} has no metrics")));
            }
            let dimension_refs = question
                .required_dimensions
                .iter()
                .chain(&question.required_entities)
                .chain(&question.optional_dimensions)
                .chain(question.default_filters.keys());
            for name in dimension_refs {
                if registry.dimension(name).is_none() {
                    return Err(RegistryError::UnknownDimension {
                        context: context.to_string(),
                        name: name.clone(),
                    });
                }
            }
            for name in &question.metrics {
                if registry.metric(name).is_none() {
                    return Err(RegistryError::UnknownMetric {
                        context: context.to_string(),
                        name: name.clone(),
                    });
                }
            }
            let sort_key = &question.default_sort.key;
            if registry.dimension(sort_key).is_none() && registry.metric(sort_key).is_none() {
                return Err(RegistryError::Invalid(format!(
                    "{context} sorts by unknown key {sort_key}"
                )));
            }
        }
        for question_type in QuestionType::ALL {
            if !seen.contains(&question_type) {
                return Err(RegistryError::Invalid(format!(
                    "catalog is missing {question_type}"
                )));
            }
        }
        Ok(())
    }

    /// Loads a catalog from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog file: {}", path.display()))?;
        let catalog: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse catalog file: {}", path.display()))?;
        Ok(catalog)
    }
}

impl Default for QuestionCatalog {
    fn default() -> Self {
        let questions = vec![
            CanonicalQuestion::new(
                QuestionType::MaintenanceHistory,
                &[
                    "gecmis",
                    "servis gecmisi",
                    "bakim gecmisi",
                    "bakim kaydi",
                    "bakim kayitlari",
                    "kayit",
                    "bakim",
                    "periyodik bakim",
                    "bakim islemi",
                ],
                &[dim::VEHICLE_ID, dim::OPERATION_DATE],
                &[metric::COUNT, metric::SUM_COST],
                SortSpec::desc(dim::OPERATION_DATE),
            )
            .requires_entity(dim::VEHICLE_ID)
            .optional(&[dim::VERB_TYPE])
            .example("70886 plakalı aracın bakım geçmişi"),
            CanonicalQuestion::new(
                QuestionType::FaultAnalysis,
                &[
                    "ariza",
                    "hata",
                    "sorun",
                    "problem",
                    "ariza kodu",
                    "en sik ariza",
                    "tekrar eden",
                    "tekrarlayan",
                    "fault",
                ],
                &[dim::FAULT_CODE],
                &[metric::COUNT],
                SortSpec::desc(metric::COUNT),
            )
            .optional(&[dim::VEHICLE_TYPE, dim::MANUFACTURER, dim::SEASON])
            .filter(dim::HAS_FAULT, FilterValue::Flag(true))
            .example("en sık görülen arıza kodları"),
            CanonicalQuestion::new(
                QuestionType::MaterialUsage,
                &[
                    "malzeme",
                    "parca",
                    "malzeme kullanimi",
                    "kullanilan malzemeler",
                    "malzeme tuketimi",
                    "parca kullanimi",
                    "kullanim dagilimi",
                    "malzeme dagilimi",
                    "hangi malzemeler",
                    "degisen",
                    "degistirilen",
                    "kullanilan",
                    "yedek parca",
                ],
                &[dim::MATERIAL_NAME],
                &[metric::COUNT, metric::SUM_QUANTITY, metric::SUM_COST],
                SortSpec::desc(metric::SUM_QUANTITY),
            )
            .optional(&[dim::VEHICLE_TYPE, dim::MANUFACTURER, dim::SEASON])
            .example("en çok kullanılan malzemeler"),
            CanonicalQuestion::new(
                QuestionType::CostAnalysis,
                &[
                    "maliyet",
                    "harcama",
                    "tutar",
                    "ucret",
                    "fiyat",
                    "butce",
                    "toplam maliyet",
                    "bakim maliyeti",
                    "ne kadar",
                    "kac lira",
                    "kac tl",
                ],
                &[],
                &[metric::SUM_COST, metric::AVG_COST, metric::COUNT],
                SortSpec::desc(metric::SUM_COST),
            )
            .optional(&[dim::VEHICLE_TYPE, dim::MANUFACTURER, dim::MATERIAL_NAME])
            .example("2023 yılı toplam bakım maliyeti"),
            CanonicalQuestion::new(
                QuestionType::VehicleBased,
                &[
                    "arac",
                    "araclar",
                    "kamyon",
                    "otobus",
                    "bus",
                    "vehicle",
                    "plaka",
                    "arac tipi",
                    "arac modeli",
                ],
                &[dim::VEHICLE_MODEL],
                &[metric::COUNT, metric::SUM_COST],
                SortSpec::desc(metric::COUNT),
            )
            .optional(&[dim::VEHICLE_TYPE, dim::MANUFACTURER])
            .example("hangi araçlar en çok servise geliyor"),
            CanonicalQuestion::new(
                QuestionType::CustomerBased,
                &["musteri", "musteriler", "customer", "firma", "sirket"],
                &[dim::CUSTOMER_ID],
                &[metric::COUNT, metric::SUM_COST],
                SortSpec::desc(metric::COUNT),
            )
            .optional(&[dim::VEHICLE_TYPE])
            .example("müşteri 159485 için yapılan işlemler"),
            CanonicalQuestion::new(
                QuestionType::ServiceBased,
                &["servis", "lokasyon", "location", "sube", "servis noktasi"],
                &[dim::SERVICE_LOCATION],
                &[metric::COUNT, metric::SUM_COST],
                SortSpec::desc(metric::COUNT),
            )
            .optional(&[dim::VEHICLE_TYPE])
            .example("R540 servisindeki işlem sayısı"),
            CanonicalQuestion::new(
                QuestionType::TimeSeries,
                &[
                    "yillara",
                    "aylara",
                    "haftalara",
                    "gunlere",
                    "zamana gore",
                    "zaman icinde",
                    "nasil degisti",
                    "nasil degisiyor",
                    "degisim",
                    "trend",
                    "gun bazinda",
                    "haftanin gunleri",
                ],
                &[dim::YEAR],
                &[metric::COUNT, metric::SUM_COST],
                SortSpec::asc(dim::YEAR),
            )
            .optional(&[dim::MONTH, dim::MATERIAL_NAME])
            .example("bakım sayısı yıllara göre nasıl değişti"),
            CanonicalQuestion::new(
                QuestionType::Seasonal,
                &[
                    "mevsim",
                    "sezon",
                    "kis",
                    "yaz",
                    "bahar",
                    "ilkbahar",
                    "sonbahar",
                    "mevsimsel",
                    "seasonal",
                ],
                &[dim::SEASON],
                &[metric::COUNT],
                SortSpec::desc(metric::COUNT),
            )
            .optional(&[dim::VEHICLE_TYPE, dim::MATERIAL_NAME])
            .example("mevsimsel malzeme kullanımı"),
            CanonicalQuestion::new(
                QuestionType::TopEntities,
                &[
                    "en cok",
                    "en fazla",
                    "en sik",
                    "en yuksek",
                    "en dusuk",
                    "en az",
                    "ilk",
                    "top",
                    "sirala",
                    "siralama",
                    "listele",
                ],
                &[dim::MATERIAL_NAME],
                &[metric::COUNT, metric::SUM_QUANTITY],
                SortSpec::desc(metric::COUNT),
            )
            .optional(&[dim::VEHICLE_TYPE])
            .example("ilk 10 kalemi sırala"),
            CanonicalQuestion::new(
                QuestionType::Distribution,
                &[
                    "dagilim",
                    "dagilimi",
                    "oran",
                    "yuzde",
                    "distribution",
                    "nasil dagiliyor",
                    "sayisi",
                    "adet",
                ],
                &[dim::VERB_TYPE],
                &[metric::COUNT],
                SortSpec::desc(metric::COUNT),
            )
            .optional(&[dim::VEHICLE_TYPE, dim::SEASON])
            .example("işlem türlerinin dağılımı"),
            CanonicalQuestion::new(
                QuestionType::Comparison,
                &[
                    "karsilastir",
                    "compare",
                    "fark",
                    "kiyasla",
                    "arasinda",
                    "vs",
                    "versus",
                ],
                &[],
                &[metric::SUM_COST, metric::AVG_COST, metric::COUNT],
                SortSpec::desc(metric::SUM_COST),
            )
            .optional(&[
                dim::MANUFACTURER,
                dim::VEHICLE_TYPE,
                dim::SERVICE_LOCATION,
                dim::SEASON,
                dim::YEAR,
            ])
            .example("MAN ve Mercedes bakım maliyetlerini karşılaştır"),
        ];
        Self { questions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_validates_against_default_registry() {
        let catalog = QuestionCatalog::default();
        let registry = SchemaRegistry::default();
        catalog.validate(&registry).unwrap();
        assert_eq!(catalog.len(), 12);
    }

    #[test]
    fn test_priority_order_starts_with_history() {
        let catalog = QuestionCatalog::default();
        assert_eq!(catalog.priority_rank(QuestionType::MaintenanceHistory), Some(0));
        assert_eq!(catalog.priority_rank(QuestionType::Comparison), Some(11));
    }

    #[test]
    fn test_only_history_demands_an_entity() {
        let catalog = QuestionCatalog::default();
        for question in &catalog.questions {
            if question.question_type == QuestionType::MaintenanceHistory {
                assert_eq!(question.required_entities, vec![dim::VEHICLE_ID]);
            } else {
                assert!(question.required_entities.is_empty());
            }
        }
    }

    #[test]
    fn test_unknown_dimension_is_rejected() {
        let mut catalog = QuestionCatalog::default();
        catalog.questions[0].required_dimensions.push("odometre".to_string());
        let registry = SchemaRegistry::default();
        assert!(matches!(
            catalog.validate(&registry),
            Err(RegistryError::UnknownDimension { .. })
        ));
    }

    #[test]
    fn test_duplicate_question_type_is_rejected() {
        let mut catalog = QuestionCatalog::default();
        let duplicate = catalog.questions[0].clone();
        catalog.questions.push(duplicate);
        let registry = SchemaRegistry::default();
        assert!(matches!(
            catalog.validate(&registry),
            Err(RegistryError::Duplicate { kind: "question", .. })
        ));
    }

    #[test]
    fn test_missing_archetype_is_rejected() {
        let mut catalog = QuestionCatalog::default();
        catalog
            .questions
            .retain(|q| q.question_type != QuestionType::TimeSeries);
        assert_eq!(catalog.len(), 11);
        let registry = SchemaRegistry::default();
        match catalog.validate(&registry) {
            Err(RegistryError::Invalid(message)) => {
                assert!(message.contains("time_series"));
            }
            other => panic!("expected a coverage error, got {other:?}"),
        }
    }

    #[test]
    fn test_catalog_round_trips_through_json() {
        let catalog = QuestionCatalog::default();
        let json = serde_json::to_string(&catalog).unwrap();
        let reloaded: QuestionCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.len(), catalog.len());
        assert_eq!(
            reloaded.questions[1].default_filters.get(dim::HAS_FAULT),
            Some(&FilterValue::Flag(true))
        );
    }
}

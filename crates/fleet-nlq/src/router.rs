//! The question router: normalization, extraction, matching, refinement and
//! plan synthesis behind one entry point.
//!
//! A router is immutable once built and holds no per-question state, so one
//! instance can serve any number of threads concurrently.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::QuestionCatalog;
use crate::config::RouterConfig;
use crate::extract::EntityExtractor;
use crate::matcher::match_question;
use crate::normalize::normalize;
use crate::plan::{synthesize, IncompletePlan, PlanOutcome, QueryPlan};
use crate::refine::{default_rules, refine, RefineContext, RefineRule};
use crate::schema::{RegistryError, SchemaRegistry};
use crate::types::{EntityBag, QuestionType};

// ============================================================================
// Outcomes
// ============================================================================

/// Everything the router decided about one successfully planned question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedQuery {
    pub question_type: QuestionType,
    /// Trigger score plus any override boost, in [0, 1].
    pub confidence: f64,
    /// True when confidence sits below the configured floor; the plan is
    /// still valid, acting on it is the caller's decision.
    pub low_confidence: bool,
    /// Name of the override rule that decided the archetype, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fired_rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_up: Option<RunnerUp>,
    pub entities: EntityBag,
    pub plan: QueryPlan,
}

/// Second-best catalog entry, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerUp {
    pub question_type: QuestionType,
    pub score: f64,
}

/// Router outcome for one question. Callers pattern-match; none of the
/// variants is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Analysis {
    /// Input normalized to no tokens at all.
    EmptyQuestion,
    /// The routed archetype needs an entity the text does not supply; ask
    /// the user for the named dimensions.
    Incomplete(IncompletePlan),
    Planned(PlannedQuery),
}

impl Analysis {
    pub fn plan(&self) -> Option<&QueryPlan> {
        match self {
            Analysis::Planned(planned) => Some(&planned.plan),
            _ => None,
        }
    }

    pub fn question_type(&self) -> Option<QuestionType> {
        match self {
            Analysis::Planned(planned) => Some(planned.question_type),
            Analysis::Incomplete(incomplete) => Some(incomplete.question_type),
            Analysis::EmptyQuestion => None,
        }
    }

    /// One-line human-readable account of the outcome, for logs and demos.
    pub fn summary(&self) -> String {
        match self {
            Analysis::EmptyQuestion => "empty question".to_string(),
            Analysis::Incomplete(incomplete) => format!(
                "{} is missing {}",
                incomplete.question_type,
                incomplete.missing.join(", ")
            ),
            Analysis::Planned(planned) => {
                let mut parts = vec![format!(
                    "{} at confidence {:.2}",
                    planned.question_type, planned.confidence
                )];
                if let Some(rule) = &planned.fired_rule {
                    parts.push(format!("via rule {rule}"));
                }
                if let Some(runner_up) = &planned.runner_up {
                    parts.push(format!(
                        "runner-up {} at {:.2}",
                        runner_up.question_type, runner_up.score
                    ));
                }
                parts.join(", ")
            }
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub struct QuestionRouter {
    config: RouterConfig,
    catalog: QuestionCatalog,
    schema: SchemaRegistry,
    rules: Vec<RefineRule>,
    extractor: EntityExtractor,
}

impl QuestionRouter {
    /// Builds a router over explicitly injected registries with the built-in
    /// override chain.
    pub fn new(
        config: RouterConfig,
        catalog: QuestionCatalog,
        schema: SchemaRegistry,
    ) -> Result<Self, RegistryError> {
        Self::with_rules(config, catalog, schema, default_rules())
    }

    /// Same, with a custom override chain. Every piece is cross-checked here
    /// so analysis itself can never hit a dangling name: a validated catalog
    /// covers all twelve archetypes, which makes every rule's forced
    /// archetype resolvable.
    pub fn with_rules(
        config: RouterConfig,
        catalog: QuestionCatalog,
        schema: SchemaRegistry,
        rules: Vec<RefineRule>,
    ) -> Result<Self, RegistryError> {
        config.validate().map_err(RegistryError::Invalid)?;
        schema.validate()?;
        catalog.validate(&schema)?;
        let extractor = EntityExtractor::new(
            config.temporal.min_year,
            config.temporal.effective_reference_year(),
            config.matching.max_top_limit,
        );
        Ok(Self {
            config,
            catalog,
            schema,
            rules,
            extractor,
        })
    }

    /// Built-in catalog, schema and config.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        Self::new(
            RouterConfig::default(),
            QuestionCatalog::default(),
            SchemaRegistry::default(),
        )
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Logs what the router was built with.
    pub fn log_summary(&self) {
        info!(
            questions = self.catalog.len(),
            dimensions = self.schema.dimensions.len(),
            metrics = self.schema.metrics.len(),
            rules = self.rules.len(),
            "question router ready"
        );
    }

    /// Routes one free-text question to a plan or a clarification outcome.
    /// Pure computation over the static registries; never panics.
    pub fn analyze(&self, question: &str) -> Analysis {
        let normalized = normalize(question);
        if normalized.tokens.is_empty() {
            debug!("question normalized to nothing");
            return Analysis::EmptyQuestion;
        }

        let entities = self.extractor.extract(question, &normalized);
        let Some(matched) = match_question(&self.catalog, &normalized, &entities) else {
            // Construction guarantees a non-empty catalog.
            return Analysis::EmptyQuestion;
        };
        let context = RefineContext {
            score: matched.primary_score,
            min_confidence: self.config.matching.min_confidence,
        };
        let refined = refine(
            &self.catalog,
            &self.rules,
            &matched,
            &entities,
            &normalized,
            &context,
        );
        debug!(
            question_type = refined.question.question_type.as_str(),
            confidence = refined.confidence,
            fired_rule = refined.fired_rule.unwrap_or("none"),
            "routed question"
        );

        match synthesize(refined.question, &entities, &self.schema, &self.config) {
            PlanOutcome::Incomplete(incomplete) => Analysis::Incomplete(incomplete),
            PlanOutcome::Complete(plan) => Analysis::Planned(PlannedQuery {
                question_type: refined.question.question_type,
                confidence: refined.confidence,
                low_confidence: refined.confidence < self.config.matching.min_confidence,
                fired_rule: refined.fired_rule.map(str::to_string),
                runner_up: matched.runner_up.map(|(question, score)| RunnerUp {
                    question_type: question.question_type,
                    score,
                }),
                entities,
                plan,
            }),
        }
    }

    /// Routes a batch of questions in parallel, preserving input order.
    pub fn analyze_many<S: AsRef<str> + Sync>(&self, questions: &[S]) -> Vec<Analysis> {
        questions
            .par_iter()
            .map(|question| self.analyze(question.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::dim;
    use crate::types::{
        FilterValue, RelativeUnit, RelativeWindow, Season, SortDirection, VehicleType,
    };
    use chrono::{TimeZone, Utc};

    fn router() -> QuestionRouter {
        let mut config = RouterConfig::default();
        config.temporal.reference_year = Some(2025);
        QuestionRouter::new(config, QuestionCatalog::default(), SchemaRegistry::default())
            .unwrap()
    }

    fn planned(analysis: Analysis) -> PlannedQuery {
        match analysis {
            Analysis::Planned(planned) => planned,
            other => panic!("expected a planned query, got {other:?}"),
        }
    }

    #[test]
    fn test_top_materials_of_a_year() {
        let router = router();
        let result = planned(router.analyze("2023 yılında en çok kullanılan 10 malzeme"));
        assert_eq!(result.question_type, QuestionType::MaterialUsage);
        assert_eq!(result.entities.years, [2023].into());
        assert!(result.entities.has_top_signal);
        assert_eq!(result.entities.top_limit, Some(10));
        assert_eq!(result.plan.limit, Some(10));
        assert_eq!(result.plan.sort.key, "count");
        assert_eq!(result.plan.sort.direction, SortDirection::Desc);
        assert!(!result.low_confidence);
    }

    #[test]
    fn test_vehicle_history_over_one_year() {
        let router = router();
        let result = planned(router.analyze("70886 plakalı aracın 2023 yılı bakım geçmişi"));
        assert_eq!(result.question_type, QuestionType::MaintenanceHistory);
        assert_eq!(result.fired_rule.as_deref(), Some("vehicle-history"));
        assert_eq!(
            result.plan.filters.get(dim::VEHICLE_ID),
            Some(&FilterValue::Eq("70886".to_string()))
        );
        let range = result.plan.time_range.unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_winter_faults_route_to_fault_analysis() {
        let router = router();
        let result = planned(router.analyze("Kış aylarında en sık görülen arızalar"));
        assert_eq!(result.question_type, QuestionType::FaultAnalysis);
        assert_eq!(result.entities.seasons, [Season::Winter].into());
        assert!(result.entities.has_top_signal);
        assert!(result.plan.group_by.contains(&dim::FAULT_CODE.to_string()));
        assert!(result.plan.group_by.contains(&dim::SEASON.to_string()));
        assert_eq!(
            result.plan.filters.get(dim::HAS_FAULT),
            Some(&FilterValue::Flag(true))
        );
        assert_eq!(
            result.plan.filters.get(dim::SEASON),
            Some(&FilterValue::Eq("winter".to_string()))
        );
    }

    #[test]
    fn test_empty_input_short_circuits() {
        let router = router();
        assert_eq!(router.analyze(""), Analysis::EmptyQuestion);
        assert_eq!(router.analyze("   \t  "), Analysis::EmptyQuestion);
        assert_eq!(router.analyze("?!."), Analysis::EmptyQuestion);
    }

    #[test]
    fn test_foreign_scripts_do_not_panic() {
        let router = router();
        // Non-Latin letters fold to separators, so these are empty questions.
        assert_eq!(router.analyze("Привет 你好 😀"), Analysis::EmptyQuestion);
        let long = "arıza ".repeat(5000);
        match router.analyze(&long) {
            Analysis::Planned(planned) => {
                assert_eq!(planned.question_type, QuestionType::FaultAnalysis);
            }
            other => panic!("expected a planned query, got {other:?}"),
        }
    }

    #[test]
    fn test_manufacturer_comparison() {
        let router = router();
        let result = planned(router.analyze("MAN ve Mercedes otobüs maliyetlerini karşılaştır"));
        assert_eq!(result.question_type, QuestionType::Comparison);
        assert_eq!(result.fired_rule.as_deref(), Some("comparison-pair"));
        assert_eq!(result.entities.comparison_entities, vec!["MAN", "Mercedes"]);
        assert_eq!(result.entities.vehicle_types, [VehicleType::Bus].into());
        assert_eq!(
            result.plan.filters.get(dim::MANUFACTURER),
            Some(&FilterValue::In(vec!["man".to_string(), "mercedes".to_string()]))
        );
        assert!(result.plan.group_by.contains(&dim::MANUFACTURER.to_string()));
        assert!(result.plan.group_by.contains(&dim::VEHICLE_TYPE.to_string()));
    }

    #[test]
    fn test_history_without_vehicle_asks_for_it() {
        let router = router();
        match router.analyze("bakım geçmişini göster") {
            Analysis::Incomplete(incomplete) => {
                assert_eq!(incomplete.question_type, QuestionType::MaintenanceHistory);
                assert_eq!(incomplete.missing, vec![dim::VEHICLE_ID]);
            }
            other => panic!("expected an incomplete outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_all_zero_scores_still_route_deterministically() {
        let router = router();
        // Nothing matches; catalog order decides, and the history archetype
        // then reports its missing vehicle.
        match router.analyze("hmm") {
            Analysis::Incomplete(incomplete) => {
                assert_eq!(incomplete.question_type, QuestionType::MaintenanceHistory);
            }
            other => panic!("expected an incomplete outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_low_confidence_is_flagged_not_failed() {
        let router = router();
        let result = planned(router.analyze("kaç adet"));
        assert_eq!(result.question_type, QuestionType::Distribution);
        assert!(result.low_confidence);
        assert!(result.confidence < 0.2);
        assert!(result.plan.group_by.contains(&dim::VERB_TYPE.to_string()));
    }

    #[test]
    fn test_service_code_routes_to_service_archetype() {
        let router = router();
        let result = planned(router.analyze("R540 servisindeki işlem sayısı"));
        assert_eq!(result.question_type, QuestionType::ServiceBased);
        assert_eq!(result.fired_rule.as_deref(), Some("service-id"));
        assert_eq!(
            result.plan.filters.get(dim::SERVICE_LOCATION),
            Some(&FilterValue::Eq("R540".to_string()))
        );
    }

    #[test]
    fn test_relative_window_outranks_explicit_year() {
        let router = router();
        let result = planned(router.analyze("2023 yılında son 6 ayda en çok kullanılan malzemeler"));
        assert_eq!(result.question_type, QuestionType::MaterialUsage);
        assert_eq!(
            result.plan.relative_window,
            Some(RelativeWindow {
                unit: RelativeUnit::Month,
                value: 6,
            })
        );
        assert!(result.plan.time_range.is_none());
        assert_eq!(result.plan.limit, Some(10));
    }

    #[test]
    fn test_every_catalog_example_routes_to_its_archetype() {
        let router = router();
        for question in &router.catalog().questions {
            assert!(
                !question.examples.is_empty(),
                "{} has no example phrasing",
                question.question_type
            );
            for example in &question.examples {
                let analysis = router.analyze(example);
                assert_eq!(
                    analysis.question_type(),
                    Some(question.question_type),
                    "{example:?} should route to {}",
                    question.question_type
                );
            }
        }
    }

    #[test]
    fn test_summary_names_the_outcome() {
        let router = router();
        let summary = router.analyze("bakım geçmişini göster").summary();
        assert!(summary.contains("maintenance_history"));
        assert!(summary.contains(dim::VEHICLE_ID));
        let summary = router.analyze("R540 servisindeki işlem sayısı").summary();
        assert!(summary.contains("service_based"));
        assert!(summary.contains("service-id"));
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let router = router();
        let question = "2023 yılında en çok kullanılan 10 malzeme";
        let first = serde_json::to_string(&router.analyze(question)).unwrap();
        for _ in 0..5 {
            let again = serde_json::to_string(&router.analyze(question)).unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_batch_matches_sequential() {
        let router = router();
        let questions = [
            "2023 yılında en çok kullanılan 10 malzeme",
            "R540 servisindeki işlem sayısı",
            "",
            "müşteri 159485 için toplam maliyet",
        ];
        let batch = router.analyze_many(&questions);
        let sequential: Vec<Analysis> = questions.iter().map(|q| router.analyze(q)).collect();
        assert_eq!(batch, sequential);
    }

    #[test]
    fn test_partial_catalog_fails_construction() {
        let mut catalog = QuestionCatalog::default();
        catalog
            .questions
            .retain(|q| q.question_type != QuestionType::Comparison);
        let result = QuestionRouter::new(
            RouterConfig::default(),
            catalog,
            SchemaRegistry::default(),
        );
        assert!(result.is_err());
    }
}

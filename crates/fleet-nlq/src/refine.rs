//! Heuristic overrides applied after trigger matching.
//!
//! The matcher only counts words; it cannot tell that a plate number next to
//! a history cue outweighs any vocabulary overlap. These rules encode that
//! kind of entity evidence as an ordered list of overrides. The first rule
//! whose predicate holds forces its archetype and boosts the confidence;
//! when none fires, the matcher's primary stands. The order of the list is
//! part of the routing contract, not an implementation detail.

use crate::catalog::{CanonicalQuestion, QuestionCatalog};
use crate::matcher::MatchResult;
use crate::normalize::{has_any_phrase, NormalizedText};
use crate::types::{EntityBag, QuestionType};

const MATERIAL_CUES: &[&str] = &["malzeme", "parca", "yedek parca"];
const HISTORY_CUES: &[&str] = &["gecmis", "kayit"];
const FAULT_CUES: &[&str] = &["ariza", "hata", "sorun", "problem", "fault"];
const COST_CUES: &[&str] = &["maliyet", "harcama", "tutar", "ucret", "fiyat", "para", "butce"];

/// Matcher facts a rule predicate may consult alongside the entities.
#[derive(Debug, Clone, Copy)]
pub struct RefineContext {
    /// The matcher's primary score.
    pub score: f64,
    /// The caller's confidence floor.
    pub min_confidence: f64,
}

/// One override rule: when `applies` holds, the routed archetype becomes
/// `forces` and the trigger score gains `boost` (capped at 1.0).
pub struct RefineRule {
    pub name: &'static str,
    pub forces: QuestionType,
    pub boost: f64,
    pub applies: fn(&EntityBag, &NormalizedText, &RefineContext) -> bool,
}

/// The routed archetype after overrides, with the rule that decided it.
#[derive(Debug, Clone)]
pub struct Refinement<'a> {
    pub question: &'a CanonicalQuestion,
    pub confidence: f64,
    pub fired_rule: Option<&'static str>,
}

fn material_cue(entities: &EntityBag, text: &NormalizedText) -> bool {
    !entities.material_keywords.is_empty() || has_any_phrase(&text.tokens, MATERIAL_CUES)
}

/// The built-in override chain, strongest evidence first.
pub fn default_rules() -> Vec<RefineRule> {
    vec![
        // A concrete vehicle asking about parts is a material question even
        // when history vocabulary also appears.
        RefineRule {
            name: "vehicle-material",
            forces: QuestionType::MaterialUsage,
            boost: 0.4,
            applies: |entities, text, _| {
                !entities.vehicle_ids.is_empty() && material_cue(entities, text)
            },
        },
        RefineRule {
            name: "vehicle-history",
            forces: QuestionType::MaintenanceHistory,
            boost: 0.4,
            applies: |entities, text, _| {
                !entities.vehicle_ids.is_empty()
                    && has_any_phrase(&text.tokens, HISTORY_CUES)
                    && !material_cue(entities, text)
            },
        },
        // Two comparable sides outrank whatever vocabulary the sides carry,
        // so this sits above the fault and cost rules.
        RefineRule {
            name: "comparison-pair",
            forces: QuestionType::Comparison,
            boost: 0.3,
            applies: |entities, _, _| entities.comparison_entities.len() >= 2,
        },
        RefineRule {
            name: "season-material",
            forces: QuestionType::MaterialUsage,
            boost: 0.3,
            applies: |entities, text, _| {
                !entities.seasons.is_empty() && material_cue(entities, text)
            },
        },
        RefineRule {
            name: "top-material",
            forces: QuestionType::MaterialUsage,
            boost: 0.3,
            applies: |entities, text, _| entities.has_top_signal && material_cue(entities, text),
        },
        RefineRule {
            name: "fault-signal",
            forces: QuestionType::FaultAnalysis,
            boost: 0.3,
            applies: |entities, text, _| {
                !entities.fault_codes.is_empty() || has_any_phrase(&text.tokens, FAULT_CUES)
            },
        },
        RefineRule {
            name: "cost-signal",
            forces: QuestionType::CostAnalysis,
            boost: 0.3,
            applies: |_, text, _| has_any_phrase(&text.tokens, COST_CUES),
        },
        RefineRule {
            name: "customer-id",
            forces: QuestionType::CustomerBased,
            boost: 0.3,
            applies: |entities, _, _| !entities.customer_ids.is_empty(),
        },
        RefineRule {
            name: "service-id",
            forces: QuestionType::ServiceBased,
            boost: 0.3,
            applies: |entities, _, _| !entities.service_ids.is_empty(),
        },
        // A bare superlative with nothing else convincing becomes a ranking
        // question instead of a zero-confidence mismatch.
        RefineRule {
            name: "weak-top",
            forces: QuestionType::TopEntities,
            boost: 0.3,
            applies: |entities, _, context| {
                entities.has_top_signal && context.score < context.min_confidence
            },
        },
    ]
}

/// Runs the override chain; the first rule that applies wins. A rule whose
/// target archetype is absent from the catalog is skipped, which router
/// construction rules out for the built-in chain.
pub fn refine<'a>(
    catalog: &'a QuestionCatalog,
    rules: &[RefineRule],
    matched: &MatchResult<'a>,
    entities: &EntityBag,
    text: &NormalizedText,
    context: &RefineContext,
) -> Refinement<'a> {
    for rule in rules {
        if !(rule.applies)(entities, text, context) {
            continue;
        }
        if let Some(question) = catalog.get(rule.forces) {
            return Refinement {
                question,
                confidence: (context.score + rule.boost).min(1.0),
                fired_rule: Some(rule.name),
            };
        }
    }
    Refinement {
        question: matched.primary,
        confidence: context.score,
        fired_rule: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn matched(catalog: &QuestionCatalog, question_type: QuestionType, score: f64) -> MatchResult<'_> {
        MatchResult {
            primary: catalog.get(question_type).unwrap(),
            primary_score: score,
            runner_up: None,
        }
    }

    fn context(score: f64) -> RefineContext {
        RefineContext {
            score,
            min_confidence: 0.2,
        }
    }

    #[test]
    fn test_vehicle_with_history_cue_forces_history() {
        let catalog = QuestionCatalog::default();
        let rules = default_rules();
        let text = normalize("70886 plakalı aracın bakım geçmişi");
        let mut entities = EntityBag::default();
        entities.vehicle_ids.insert("70886".to_string());

        let result = refine(
            &catalog,
            &rules,
            &matched(&catalog, QuestionType::VehicleBased, 0.25),
            &entities,
            &text,
            &context(0.25),
        );
        assert_eq!(result.question.question_type, QuestionType::MaintenanceHistory);
        assert_eq!(result.fired_rule, Some("vehicle-history"));
        assert!((result.confidence - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_material_cue_beats_history_for_a_vehicle() {
        let catalog = QuestionCatalog::default();
        let rules = default_rules();
        let text = normalize("70886 aracında değişen malzeme kayıtları");
        let mut entities = EntityBag::default();
        entities.vehicle_ids.insert("70886".to_string());

        let result = refine(
            &catalog,
            &rules,
            &matched(&catalog, QuestionType::MaintenanceHistory, 0.3),
            &entities,
            &text,
            &context(0.3),
        );
        assert_eq!(result.question.question_type, QuestionType::MaterialUsage);
        assert_eq!(result.fired_rule, Some("vehicle-material"));
    }

    #[test]
    fn test_comparison_pair_overrides_cost_vocabulary() {
        let catalog = QuestionCatalog::default();
        let rules = default_rules();
        let text = normalize("MAN ve Mercedes otobüs maliyetlerini karşılaştır");
        let mut entities = EntityBag::default();
        entities.comparison_entities = vec!["MAN".to_string(), "Mercedes".to_string()];

        let result = refine(
            &catalog,
            &rules,
            &matched(&catalog, QuestionType::Comparison, 1.0 / 7.0),
            &entities,
            &text,
            &context(1.0 / 7.0),
        );
        assert_eq!(result.question.question_type, QuestionType::Comparison);
        assert_eq!(result.fired_rule, Some("comparison-pair"));
    }

    #[test]
    fn test_fault_cue_fires_without_codes() {
        let catalog = QuestionCatalog::default();
        let rules = default_rules();
        let text = normalize("kış aylarında en sık görülen arızalar");

        let result = refine(
            &catalog,
            &rules,
            &matched(&catalog, QuestionType::FaultAnalysis, 2.0 / 9.0),
            &EntityBag::default(),
            &text,
            &context(2.0 / 9.0),
        );
        assert_eq!(result.question.question_type, QuestionType::FaultAnalysis);
        assert_eq!(result.fired_rule, Some("fault-signal"));
    }

    #[test]
    fn test_weak_top_rescues_a_bare_superlative() {
        let catalog = QuestionCatalog::default();
        let rules = default_rules();
        let text = normalize("ilk 10 kaydı listele");
        let mut entities = EntityBag::default();
        entities.has_top_signal = true;
        entities.top_limit = Some(10);

        let result = refine(
            &catalog,
            &rules,
            &matched(&catalog, QuestionType::TopEntities, 0.1),
            &entities,
            &text,
            &context(0.1),
        );
        assert_eq!(result.question.question_type, QuestionType::TopEntities);
        assert_eq!(result.fired_rule, Some("weak-top"));
    }

    #[test]
    fn test_no_rule_leaves_primary_untouched() {
        let catalog = QuestionCatalog::default();
        let rules = default_rules();
        let text = normalize("mevsimlere göre dağılım");

        let result = refine(
            &catalog,
            &rules,
            &matched(&catalog, QuestionType::Seasonal, 0.4),
            &EntityBag::default(),
            &text,
            &context(0.4),
        );
        assert_eq!(result.question.question_type, QuestionType::Seasonal);
        assert_eq!(result.fired_rule, None);
        assert_eq!(result.confidence, 0.4);
    }

    #[test]
    fn test_confidence_is_capped() {
        let catalog = QuestionCatalog::default();
        let rules = default_rules();
        let text = normalize("70886 aracının malzeme kullanımı");
        let mut entities = EntityBag::default();
        entities.vehicle_ids.insert("70886".to_string());

        let result = refine(
            &catalog,
            &rules,
            &matched(&catalog, QuestionType::MaterialUsage, 0.9),
            &entities,
            &text,
            &context(0.9),
        );
        assert_eq!(result.confidence, 1.0);
    }
}

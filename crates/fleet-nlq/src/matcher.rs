//! Trigger-overlap scoring of a question against the catalog.

use crate::catalog::{CanonicalQuestion, QuestionCatalog};
use crate::normalize::{has_phrase, NormalizedText};
use crate::types::EntityBag;

/// The best catalog entry for one question, with its runner-up when any
/// other entry scored above zero.
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    pub primary: &'a CanonicalQuestion,
    pub primary_score: f64,
    pub runner_up: Option<(&'a CanonicalQuestion, f64)>,
}

/// Scores every catalog entry and ranks them.
///
/// An entry's score is the fraction of its triggers found among the tokens;
/// a multi-word trigger counts as one hit only when all of its words
/// co-occur. Ties fall to the entry whose required dimensions are better
/// covered by the extracted entities, then to catalog order, so an all-zero
/// scoreboard still yields a deterministic primary with score 0. Returns
/// `None` only for an empty catalog.
pub fn match_question<'a>(
    catalog: &'a QuestionCatalog,
    text: &NormalizedText,
    entities: &EntityBag,
) -> Option<MatchResult<'a>> {
    let mut ranked: Vec<(usize, f64, usize)> = catalog
        .questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let score = trigger_score(question, &text.tokens);
            (index, score, feasibility(question, entities))
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| b.2.cmp(&a.2))
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut ranked = ranked.into_iter();
    let (index, score, _) = ranked.next()?;
    let runner_up = ranked
        .next()
        .filter(|&(_, score, _)| score > 0.0)
        .map(|(index, score, _)| (&catalog.questions[index], score));
    Some(MatchResult {
        primary: &catalog.questions[index],
        primary_score: score,
        runner_up,
    })
}

/// Fraction of the entry's triggers present in the token set.
pub fn trigger_score(question: &CanonicalQuestion, tokens: &[String]) -> f64 {
    if question.triggers.is_empty() {
        return 0.0;
    }
    let hits = question
        .triggers
        .iter()
        .filter(|trigger| has_phrase(tokens, trigger.as_str()))
        .count();
    hits as f64 / question.triggers.len() as f64
}

/// How many of the entry's required dimensions the extracted entities can
/// already pin down.
fn feasibility(question: &CanonicalQuestion, entities: &EntityBag) -> usize {
    question
        .required_dimensions
        .iter()
        .filter(|dimension| entities.satisfies(dimension.as_str()))
        .count()
}

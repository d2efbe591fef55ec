//! Turns a graded submission into per-concept score observations.
//!
//! Quizzes contribute one 1.0/0.0 outcome per answered question to every
//! concept tag on that question. Rubric-graded work contributes
//! `score / max_points` per feedback item, using the criterion as the
//! concept name.

use std::collections::HashMap;

use dskg_common::{AnsweredQuestion, CourseworkType, FeedbackItem, GradedSubmission};

/// Concept -> ordered list of scores in [0, 1], concepts in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observations {
    entries: Vec<(String, Vec<f64>)>,
    index: HashMap<String, usize>,
}

impl Observations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, concept: &str, score: f64) {
        match self.index.get(concept) {
            Some(&i) => self.entries[i].1.push(score),
            None => {
                self.index.insert(concept.to_string(), self.entries.len());
                self.entries.push((concept.to_string(), vec![score]));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct concepts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, concept: &str) -> Option<&[f64]> {
        self.index
            .get(concept)
            .map(|&i| self.entries[i].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.entries
            .iter()
            .map(|(c, scores)| (c.as_str(), scores.as_slice()))
    }
}

pub fn extract_observations(submission: &GradedSubmission) -> Observations {
    match submission.coursework_type {
        CourseworkType::Quiz => from_answers(&submission.answers),
        _ => from_feedback(&submission.ai_feedback),
    }
}

fn from_answers(answers: &[AnsweredQuestion]) -> Observations {
    let mut obs = Observations::new();
    for answer in answers {
        let outcome = if answer.is_correct() { 1.0 } else { 0.0 };
        for tag in &answer.concept_tags {
            if tag.trim().is_empty() {
                continue;
            }
            obs.record(tag, outcome);
        }
    }
    obs
}

fn from_feedback(feedback: &[FeedbackItem]) -> Observations {
    let mut obs = Observations::new();
    for item in feedback {
        let (Some(score), Some(max)) = (item.score, item.max_points) else {
            continue;
        };
        if max <= 0.0 || item.criterion.trim().is_empty() {
            continue;
        }
        // Graders occasionally exceed the rubric maximum.
        obs.record(&item.criterion, (score / max).clamp(0.0, 1.0));
    }
    obs
}

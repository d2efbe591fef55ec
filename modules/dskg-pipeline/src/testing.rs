// Test mocks for the DSKG pipeline.
//
// One mock per collaborator seam:
// - MockSubmissionStore (SubmissionSource): in-memory submissions with a status log
// - MockQuizRepository (QuizRepository): in-memory remedial quizzes with per-quiz locks
// - ScriptedGenerator (QuizGenerator): concept -> canned quiz
// - ScriptedRubricGrader (RubricGrader): canned rubric result
//
// The mastery graph mock is dskg_graph::InMemoryMasteryGraph.
//
// Plus builders for submissions and quizzes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OwnedMutexGuard;

use dskg_common::{
    AnsweredQuestion, CourseworkType, EssaySubmission, FeedbackItem, GeneratedOption,
    GeneratedQuestion, GeneratedQuiz, GradedCriterion, GradedRubric, GradedSubmission,
    NewRemedialQuiz, QuestionOption, RemedialOption, RemedialQuestion, RemedialQuiz,
    RubricCriterion, StudentId, SubmissionStatus,
};

use crate::evaluation::RubricGrader;
use crate::generator::QuizGenerator;
use crate::traits::{OpenQuiz, QuizRepository, SubmissionSource};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

// ---------------------------------------------------------------------------
// MockSubmissionStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SubmissionState {
    submissions: HashMap<i64, GradedSubmission>,
    essays: HashMap<i64, EssaySubmission>,
    status_log: HashMap<i64, Vec<SubmissionStatus>>,
    scores: HashMap<i64, f64>,
    feedback: HashMap<i64, Vec<FeedbackItem>>,
    fail_writes: bool,
}

/// In-memory submissions. Every status change is logged per submission.
#[derive(Default)]
pub struct MockSubmissionStore {
    state: Mutex<SubmissionState>,
}

impl MockSubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submission(self, submission: GradedSubmission) -> Self {
        {
            let mut s = lock(&self.state);
            s.status_log
                .entry(submission.id)
                .or_default()
                .push(submission.status);
            s.submissions.insert(submission.id, submission);
        }
        self
    }

    pub fn with_essay(self, essay: EssaySubmission) -> Self {
        {
            let mut s = lock(&self.state);
            s.status_log
                .entry(essay.id)
                .or_default()
                .push(SubmissionStatus::Submitted);
            s.essays.insert(essay.id, essay);
        }
        self
    }

    /// Make every write fail, as a lost database connection would.
    pub fn fail_writes(&self) {
        lock(&self.state).fail_writes = true;
    }

    pub fn status(&self, submission_id: i64) -> Option<SubmissionStatus> {
        lock(&self.state)
            .status_log
            .get(&submission_id)
            .and_then(|log| log.last().copied())
    }

    pub fn status_log(&self, submission_id: i64) -> Vec<SubmissionStatus> {
        lock(&self.state)
            .status_log
            .get(&submission_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn score(&self, submission_id: i64) -> Option<f64> {
        lock(&self.state).scores.get(&submission_id).copied()
    }

    pub fn feedback(&self, submission_id: i64) -> Vec<FeedbackItem> {
        lock(&self.state)
            .feedback
            .get(&submission_id)
            .cloned()
            .unwrap_or_default()
    }

    fn push_status(s: &mut SubmissionState, submission_id: i64, status: SubmissionStatus) {
        if let Some(sub) = s.submissions.get_mut(&submission_id) {
            sub.status = status;
        }
        if s.submissions.contains_key(&submission_id) || s.essays.contains_key(&submission_id) {
            s.status_log.entry(submission_id).or_default().push(status);
        }
    }
}

#[async_trait]
impl SubmissionSource for MockSubmissionStore {
    async fn load(&self, submission_id: i64) -> Result<Option<GradedSubmission>> {
        Ok(lock(&self.state).submissions.get(&submission_id).cloned())
    }

    async fn load_essay(&self, submission_id: i64) -> Result<Option<EssaySubmission>> {
        Ok(lock(&self.state).essays.get(&submission_id).cloned())
    }

    async fn set_status(&self, submission_id: i64, status: SubmissionStatus) -> Result<()> {
        let mut s = lock(&self.state);
        if s.fail_writes {
            bail!("MockSubmissionStore: writes disabled");
        }
        Self::push_status(&mut s, submission_id, status);
        Ok(())
    }

    async fn record_score(&self, submission_id: i64, score: f64) -> Result<()> {
        let mut s = lock(&self.state);
        if s.fail_writes {
            bail!("MockSubmissionStore: writes disabled");
        }
        s.scores.insert(submission_id, score);
        Ok(())
    }

    async fn record_evaluation(
        &self,
        submission_id: i64,
        feedback: &[FeedbackItem],
        score: f64,
    ) -> Result<()> {
        let mut s = lock(&self.state);
        if s.fail_writes {
            bail!("MockSubmissionStore: writes disabled");
        }
        s.feedback.insert(submission_id, feedback.to_vec());
        s.scores.insert(submission_id, score);
        Self::push_status(&mut s, submission_id, SubmissionStatus::PendingReview);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockQuizRepository
// ---------------------------------------------------------------------------

#[derive(Default)]
struct QuizState {
    quizzes: Vec<RemedialQuiz>,
    next_id: i64,
    fail_creates: bool,
    reject_creates: bool,
    locks: HashMap<i64, Arc<tokio::sync::Mutex<()>>>,
}

impl QuizState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory remedial quizzes.
///
/// `begin_completion` holds a per-quiz lock until the returned quiz is
/// completed or dropped, so concurrent submissions of one quiz serialize
/// the way a row lock would.
#[derive(Clone, Default)]
pub struct MockQuizRepository {
    state: Arc<Mutex<QuizState>>,
}

impl MockQuizRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quiz(self, quiz: RemedialQuiz) -> Self {
        {
            let mut s = lock(&self.state);
            let max_id = quiz
                .questions
                .iter()
                .flat_map(|q| std::iter::once(q.id).chain(q.options.iter().map(|o| o.id)))
                .fold(quiz.id, i64::max);
            s.next_id = s.next_id.max(max_id);
            s.quizzes.push(quiz);
        }
        self
    }

    /// Every create fails as a broken transaction would, leaving nothing behind.
    pub fn fail_creates(&self) {
        lock(&self.state).fail_creates = true;
    }

    /// Every create is refused as a duplicate outstanding quiz.
    pub fn reject_creates_as_duplicate(&self) {
        lock(&self.state).reject_creates = true;
    }

    pub fn quiz_count(&self) -> usize {
        lock(&self.state).quizzes.len()
    }

    pub fn quiz(&self, quiz_id: i64) -> Option<RemedialQuiz> {
        lock(&self.state)
            .quizzes
            .iter()
            .find(|q| q.id == quiz_id)
            .cloned()
    }

    pub fn outstanding_for(&self, student_id: StudentId) -> Vec<RemedialQuiz> {
        lock(&self.state)
            .quizzes
            .iter()
            .filter(|q| q.student_id == student_id && !q.is_completed)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl QuizRepository for MockQuizRepository {
    async fn has_outstanding(&self, student_id: StudentId) -> Result<bool> {
        Ok(!self.outstanding_for(student_id).is_empty())
    }

    async fn create(&self, quiz: &NewRemedialQuiz) -> Result<Option<i64>> {
        let mut s = lock(&self.state);
        if s.fail_creates {
            bail!("MockQuizRepository: create failed");
        }
        if s.reject_creates {
            return Ok(None);
        }

        let id = s.next_id();
        let mut questions = Vec::with_capacity(quiz.questions.len());
        for q in &quiz.questions {
            let question_id = s.next_id();
            let mut options = Vec::with_capacity(q.options.len());
            for o in &q.options {
                options.push(RemedialOption {
                    id: s.next_id(),
                    option_text: o.option_text.clone(),
                    is_correct: o.is_correct,
                });
            }
            questions.push(RemedialQuestion {
                id: question_id,
                question_text: q.question_text.clone(),
                question_type: q.question_type.clone(),
                options,
            });
        }

        s.quizzes.push(RemedialQuiz {
            id,
            student_id: quiz.student_id,
            concept: quiz.concept.clone(),
            is_completed: false,
            created_at: Utc::now(),
            questions,
        });
        Ok(Some(id))
    }

    async fn outstanding(&self, student_id: StudentId) -> Result<Vec<RemedialQuiz>> {
        Ok(self.outstanding_for(student_id))
    }

    async fn begin_completion(
        &self,
        quiz_id: i64,
        student_id: StudentId,
    ) -> Result<Option<Box<dyn OpenQuiz>>> {
        let quiz_lock = lock(&self.state)
            .locks
            .entry(quiz_id)
            .or_default()
            .clone();
        let guard = quiz_lock.lock_owned().await;

        let quiz = self
            .quiz(quiz_id)
            .filter(|q| q.student_id == student_id && !q.is_completed);
        Ok(quiz.map(|quiz| {
            Box::new(MockOpenQuiz {
                state: self.state.clone(),
                quiz,
                _guard: guard,
            }) as Box<dyn OpenQuiz>
        }))
    }
}

struct MockOpenQuiz {
    state: Arc<Mutex<QuizState>>,
    quiz: RemedialQuiz,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl OpenQuiz for MockOpenQuiz {
    fn quiz(&self) -> &RemedialQuiz {
        &self.quiz
    }

    async fn complete(self: Box<Self>) -> Result<()> {
        let mut s = lock(&self.state);
        if let Some(q) = s.quizzes.iter_mut().find(|q| q.id == self.quiz.id) {
            q.is_completed = true;
        }
        Ok(())
    }

    async fn abandon(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Returns the quiz registered for a concept, `None` for anything else.
#[derive(Default)]
pub struct ScriptedGenerator {
    quizzes: HashMap<String, GeneratedQuiz>,
    failing: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_concept(mut self, concept: &str, quiz: GeneratedQuiz) -> Self {
        self.quizzes.insert(concept.to_string(), quiz);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuizGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        concept: &str,
        _question_count: usize,
    ) -> Result<Option<GeneratedQuiz>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            bail!("ScriptedGenerator: model unavailable");
        }
        Ok(self.quizzes.get(concept).cloned())
    }
}

// ---------------------------------------------------------------------------
// ScriptedRubricGrader
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedRubricGrader {
    result: Option<GradedRubric>,
    failing: bool,
}

impl ScriptedRubricGrader {
    pub fn returning(result: GradedRubric) -> Self {
        Self {
            result: Some(result),
            failing: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            result: None,
            failing: true,
        }
    }
}

#[async_trait]
impl RubricGrader for ScriptedRubricGrader {
    async fn grade(
        &self,
        _submission_text: &str,
        _rubric: &[RubricCriterion],
    ) -> Result<Option<GradedRubric>> {
        if self.failing {
            bail!("ScriptedRubricGrader: model unavailable");
        }
        Ok(self.result.clone())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// `count` well-formed questions; the first option of each is correct.
pub fn generated_quiz(count: usize) -> GeneratedQuiz {
    GeneratedQuiz {
        questions: (0..count)
            .map(|i| GeneratedQuestion {
                question_text: format!("Question {}", i + 1),
                question_type: "multiple_choice".to_string(),
                options: (0..4)
                    .map(|j| GeneratedOption {
                        option_text: format!("Option {}", j + 1),
                        is_correct: j == 0,
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// A stored quiz whose question `q` has options `q+1..=q+4`, `q+1` correct.
pub fn remedial_quiz(
    id: i64,
    student_id: StudentId,
    concept: &str,
    question_ids: &[i64],
) -> RemedialQuiz {
    RemedialQuiz {
        id,
        student_id,
        concept: concept.to_string(),
        is_completed: false,
        created_at: Utc::now(),
        questions: question_ids
            .iter()
            .map(|&q| RemedialQuestion {
                id: q,
                question_text: format!("Question {q}"),
                question_type: "multiple_choice".to_string(),
                options: (1..=4)
                    .map(|j| RemedialOption {
                        id: q + j,
                        option_text: format!("Option {j}"),
                        is_correct: j == 1,
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// An answered single-answer question: option 1 is correct.
pub fn tagged_answer(question_id: i64, tags: &[&str], correct: bool) -> AnsweredQuestion {
    AnsweredQuestion {
        question_id,
        concept_tags: tags.iter().map(|t| t.to_string()).collect(),
        options: vec![
            QuestionOption {
                id: 1,
                is_correct: true,
            },
            QuestionOption {
                id: 2,
                is_correct: false,
            },
        ],
        selected_option_ids: vec![if correct { 1 } else { 2 }],
    }
}

/// A GRADED quiz submission with one question per answer.
pub fn quiz_submission(
    id: i64,
    student_id: StudentId,
    answers: Vec<AnsweredQuestion>,
) -> GradedSubmission {
    GradedSubmission {
        id,
        student_id,
        coursework_type: CourseworkType::Quiz,
        status: SubmissionStatus::Graded,
        question_count: answers.len(),
        answers,
        ai_feedback: vec![],
    }
}

pub fn essay_submission(
    id: i64,
    student_id: StudentId,
    text: Option<&str>,
    rubric: &[(&str, f64)],
) -> EssaySubmission {
    EssaySubmission {
        id,
        student_id,
        submission_text: text.map(str::to_string),
        rubric: rubric
            .iter()
            .map(|(c, max)| RubricCriterion {
                criterion: c.to_string(),
                max_points: *max,
            })
            .collect(),
    }
}

pub fn graded_rubric(scores: &[(&str, i64)]) -> GradedRubric {
    GradedRubric {
        feedback: scores
            .iter()
            .map(|(c, s)| GradedCriterion {
                criterion: c.to_string(),
                score: *s,
                justification: format!("{c} scored {s}."),
            })
            .collect(),
    }
}

//! Integration tests for the Postgres stores.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::sync::atomic::{AtomicI64, Ordering};

use sqlx::PgPool;

use dskg_common::{
    FeedbackItem, GeneratedOption, GeneratedQuestion, NewRemedialQuiz, RemedialAnswer,
    SubmissionStatus, TaskRequest,
};
use dskg_store::{publish_task, RemedialQuizStore, SubmissionStore, TaskListener};

/// Get a migrated test database pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    dskg_store::migrate(&pool).await.ok()?;
    Some(pool)
}

/// Tests share one database, so each one works on its own student.
fn fresh_student() -> i64 {
    static NEXT: AtomicI64 = AtomicI64::new(0);
    let base = chrono::Utc::now().timestamp_micros();
    base + NEXT.fetch_add(1, Ordering::SeqCst)
}

fn generated_question(text: &str, correct: usize) -> GeneratedQuestion {
    GeneratedQuestion {
        question_text: text.to_string(),
        question_type: "multiple_choice".to_string(),
        options: (0..4)
            .map(|i| GeneratedOption {
                option_text: format!("{text} option {i}"),
                is_correct: i == correct,
            })
            .collect(),
    }
}

fn new_quiz(student_id: i64, concept: &str) -> NewRemedialQuiz {
    NewRemedialQuiz {
        student_id,
        concept: concept.to_string(),
        questions: vec![
            generated_question("Q1", 0),
            generated_question("Q2", 2),
            generated_question("Q3", 3),
        ],
    }
}

async fn question_count(pool: &PgPool, student_id: i64) -> i64 {
    sqlx::query_scalar(
        "SELECT count(*) FROM remedial_questions q
         JOIN remedial_quizzes z ON z.id = q.quiz_id
         WHERE z.student_id = $1",
    )
    .bind(student_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

// =========================================================================
// Remedial quizzes
// =========================================================================

#[tokio::test]
async fn created_quiz_is_outstanding_with_ordered_questions() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = RemedialQuizStore::new(pool);
    let student = fresh_student();

    assert!(!store.has_outstanding(student).await.unwrap());
    let quiz_id = store.create(&new_quiz(student, "Recursion")).await.unwrap();
    assert!(store.has_outstanding(student).await.unwrap());

    let outstanding = store.outstanding(student).await.unwrap();
    assert_eq!(outstanding.len(), 1);
    let quiz = &outstanding[0];
    assert_eq!(quiz.id, quiz_id);
    assert_eq!(quiz.concept, "Recursion");
    assert!(!quiz.is_completed);

    let texts: Vec<&str> = quiz.questions.iter().map(|q| q.question_text.as_str()).collect();
    assert_eq!(texts, vec!["Q1", "Q2", "Q3"]);
    for q in &quiz.questions {
        assert_eq!(q.options.len(), 4);
        assert_eq!(q.options.iter().filter(|o| o.is_correct).count(), 1);
    }
    assert_eq!(quiz.questions[1].correct_option_id(), Some(quiz.questions[1].options[2].id));
}

#[tokio::test]
async fn second_outstanding_quiz_is_rejected_without_orphans() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = RemedialQuizStore::new(pool.clone());
    let student = fresh_student();

    store.create(&new_quiz(student, "Recursion")).await.unwrap();
    let before = question_count(&pool, student).await;

    let second = store.create(&new_quiz(student, "Loops")).await;
    assert!(second.is_err());
    assert_eq!(question_count(&pool, student).await, before);
    assert_eq!(store.outstanding(student).await.unwrap().len(), 1);
}

#[tokio::test]
async fn completion_is_scoped_to_owner_and_happens_once() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = RemedialQuizStore::new(pool);
    let student = fresh_student();
    let quiz_id = store.create(&new_quiz(student, "Recursion")).await.unwrap();

    assert!(store
        .begin_completion(quiz_id, student + 1_000_000)
        .await
        .unwrap()
        .is_none());

    let completion = store.begin_completion(quiz_id, student).await.unwrap().unwrap();
    assert_eq!(completion.quiz().questions.len(), 3);
    completion.complete().await.unwrap();

    assert!(store.begin_completion(quiz_id, student).await.unwrap().is_none());
    assert!(!store.has_outstanding(student).await.unwrap());

    // Completed quizzes free the slot for the next one.
    store.create(&new_quiz(student, "Loops")).await.unwrap();
}

#[tokio::test]
async fn abandoned_completion_leaves_quiz_open() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = RemedialQuizStore::new(pool);
    let student = fresh_student();
    let quiz_id = store.create(&new_quiz(student, "Recursion")).await.unwrap();

    let completion = store.begin_completion(quiz_id, student).await.unwrap().unwrap();
    completion.abandon().await.unwrap();

    assert!(store.has_outstanding(student).await.unwrap());
    assert!(store.begin_completion(quiz_id, student).await.unwrap().is_some());
}

// =========================================================================
// Submissions
// =========================================================================

async fn seed_quiz_submission(pool: &PgPool, student_id: i64) -> i64 {
    let coursework_id: i64 = sqlx::query_scalar(
        "INSERT INTO coursework (name, coursework_type) VALUES ('Week 3', 'quiz') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    let question_id: i64 = sqlx::query_scalar(
        "INSERT INTO questions (coursework_id, question_text, concept_tags)
         VALUES ($1, 'Base case?', ARRAY['Recursion', 'Induction']) RETURNING id",
    )
    .bind(coursework_id)
    .fetch_one(pool)
    .await
    .unwrap();

    let mut option_ids = Vec::new();
    for (text, correct) in [("a", true), ("b", false), ("c", true)] {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO options (question_id, option_text, is_correct) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(question_id)
        .bind(text)
        .bind(correct)
        .fetch_one(pool)
        .await
        .unwrap();
        option_ids.push(id);
    }

    let submission_id: i64 = sqlx::query_scalar(
        "INSERT INTO submissions (coursework_id, student_id, status) VALUES ($1, $2, 'GRADED') RETURNING id",
    )
    .bind(coursework_id)
    .bind(student_id)
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO submission_answers (submission_id, question_id, selected_option_ids)
         VALUES ($1, $2, $3)",
    )
    .bind(submission_id)
    .bind(question_id)
    .bind(vec![option_ids[0], option_ids[2]])
    .execute(pool)
    .await
    .unwrap();

    submission_id
}

#[tokio::test]
async fn load_joins_answers_with_tags_and_answer_key() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = SubmissionStore::new(pool.clone());
    let student = fresh_student();
    let submission_id = seed_quiz_submission(&pool, student).await;

    let submission = store.load(submission_id).await.unwrap().unwrap();
    assert_eq!(submission.student_id, student);
    assert_eq!(submission.status, SubmissionStatus::Graded);
    assert_eq!(submission.question_count, 1);
    assert_eq!(submission.answers.len(), 1);

    let answer = &submission.answers[0];
    assert_eq!(answer.concept_tags, vec!["Recursion", "Induction"]);
    assert_eq!(answer.options.len(), 3);
    assert!(answer.is_correct());
}

#[tokio::test]
async fn record_evaluation_moves_submission_to_review() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = SubmissionStore::new(pool.clone());
    let student = fresh_student();
    let submission_id = seed_quiz_submission(&pool, student).await;

    let feedback = vec![FeedbackItem {
        criterion: "Clarity".to_string(),
        score: Some(3.0),
        max_points: Some(5.0),
        justification: Some("Mostly clear.".to_string()),
    }];
    store.record_evaluation(submission_id, &feedback, 0.6).await.unwrap();

    let submission = store.load(submission_id).await.unwrap().unwrap();
    assert_eq!(submission.status, SubmissionStatus::PendingReview);
    assert_eq!(submission.ai_feedback, feedback);
}

#[tokio::test]
async fn missing_submission_loads_as_none() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = SubmissionStore::new(pool);
    assert!(store.load(i64::MAX).await.unwrap().is_none());
}

// =========================================================================
// Task channel
// =========================================================================

#[tokio::test]
async fn published_task_reaches_listener_past_garbage() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let channel = format!("dskg_tasks_{}", fresh_student());
    let mut listener = TaskListener::connect(&pool, &channel).await.unwrap();
    assert_eq!(listener.channel(), channel);

    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(&channel)
        .bind("not a task")
        .execute(&pool)
        .await
        .unwrap();
    let task = TaskRequest::GradeRemedial {
        quiz_id: 7,
        student_id: 42,
        answers: vec![RemedialAnswer {
            question_id: 1,
            selected_option_id: 3,
        }],
    };
    publish_task(&pool, &channel, &task).await.unwrap();

    let received = tokio::time::timeout(std::time::Duration::from_secs(5), listener.next_task())
        .await
        .expect("no task within 5s")
        .unwrap();
    assert_eq!(received, task);
}

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use placement_core::catalog::{CATEGORIES, TestBlueprint};
use placement_core::model::{
    Category, Difficulty, Identity, QuestionDraft, QuestionId, TestSessionId, UserId,
};
use placement_core::time::fixed_now;
use services::{AppServices, Clock, TestError, TestService};
use storage::repository::{InMemoryRepository, QuestionRepository, ResultRepository, Storage};

fn storage_over(repo: &InMemoryRepository) -> Storage {
    Storage {
        questions: Arc::new(repo.clone()),
        sessions: Arc::new(repo.clone()),
        results: Arc::new(repo.clone()),
    }
}

async fn seed_bucket(repo: &InMemoryRepository, category: Category, difficulty: Difficulty, n: u32) {
    let batch: Vec<_> = (0..n)
        .map(|i| {
            QuestionDraft {
                category,
                difficulty,
                question_text: format!("{category} {difficulty} #{i}"),
                options: vec!["alpha".into(), "beta".into(), "gamma".into()],
                correct_answer: "beta".into(),
                source: None,
            }
            .validate()
            .unwrap()
        })
        .collect();
    repo.insert_questions(&batch).await.unwrap();
}

async fn seeded(per_bucket: u32) -> (AppServices, InMemoryRepository) {
    let repo = InMemoryRepository::new();
    for (category, difficulty) in TestBlueprint::default().buckets() {
        seed_bucket(&repo, category, difficulty, per_bucket).await;
    }
    let app = AppServices::from_storage(
        &storage_over(&repo),
        Clock::fixed(fixed_now()),
        TestBlueprint::default(),
    );
    (app, repo)
}

fn student(id: u64) -> Identity {
    Identity::student(UserId::new(id))
}

#[tokio::test]
async fn resume_returns_identical_session() {
    let (app, _) = seeded(8).await;
    let tests = app.tests();

    let first = tests.start_or_resume(student(1)).await.unwrap();
    let second = tests.start_or_resume(student(1)).await.unwrap();
    assert_eq!(first.id(), second.id());
    assert_eq!(first.entries(), second.entries());

    let other = tests.start_or_resume(student(2)).await.unwrap();
    assert_ne!(other.id(), first.id());
}

#[tokio::test]
async fn fresh_session_has_five_per_bucket() {
    let (app, _) = seeded(9).await;
    let session = app.tests().start_or_resume(student(1)).await.unwrap();

    assert_eq!(session.total_questions(), 60);
    let mut per_bucket: HashMap<(Category, Difficulty), usize> = HashMap::new();
    for entry in session.entries() {
        *per_bucket
            .entry((entry.category(), entry.difficulty()))
            .or_default() += 1;
    }
    assert_eq!(per_bucket.len(), 12);
    assert!(per_bucket.values().all(|&n| n == 5));
}

#[tokio::test]
async fn short_bucket_contributes_what_it_has() {
    let repo = InMemoryRepository::new();
    for (category, difficulty) in TestBlueprint::default().buckets() {
        let n = if (category, difficulty) == (Category::Database, Difficulty::Hard) {
            3
        } else {
            5
        };
        seed_bucket(&repo, category, difficulty, n).await;
    }
    let app = AppServices::from_storage(
        &storage_over(&repo),
        Clock::fixed(fixed_now()),
        TestBlueprint::default(),
    );

    let session = app.tests().start_or_resume(student(1)).await.unwrap();
    assert_eq!(session.total_questions(), 58);
    let hard_db = session
        .entries()
        .iter()
        .filter(|e| e.category() == Category::Database && e.difficulty() == Difficulty::Hard)
        .count();
    assert_eq!(hard_db, 3);
}

#[tokio::test]
async fn completed_session_rejects_answers_without_mutation() {
    let (app, repo) = seeded(5).await;
    let tests = app.tests();
    let me = student(1);
    let session = tests.start_or_resume(me).await.unwrap();
    let first = session.entries()[0].question_id();
    tests
        .record_answer(me, session.id(), first, "alpha")
        .await
        .unwrap();
    tests.finalize(me, session.id()).await.unwrap();

    let err = tests
        .record_answer(me, session.id(), first, "beta")
        .await
        .unwrap_err();
    assert!(matches!(err, TestError::AlreadyCompleted));

    let view = tests.questions_view(me, session.id()).await.unwrap();
    assert!(view.completed);
    assert_eq!(view.questions[0].answer.as_deref(), Some("alpha"));
    let stored = repo.list_results(10).await.unwrap();
    assert_eq!(stored[0].score(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_finalize_records_one_result() {
    let (app, repo) = seeded(5).await;
    let me = student(1);
    let session_id = app.tests().start_or_resume(me).await.unwrap().id();

    let a = tokio::spawn({
        let tests = app.tests();
        async move { tests.finalize(me, session_id).await }
    });
    let b = tokio::spawn({
        let tests = app.tests();
        async move { tests.finalize(me, session_id).await }
    });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let loser = if let Err(e) = a { e } else { b.unwrap_err() };
    assert!(matches!(loser, TestError::AlreadyCompleted));
    assert_eq!(repo.list_results(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn score_matches_breakdown_and_totals() {
    let (app, _) = seeded(5).await;
    let me = student(3);
    let tests = TestService::clone(&app.tests())
        .with_clock(Clock::fixed(fixed_now() + Duration::seconds(1_234)));
    let session = tests.start_or_resume(me).await.unwrap();

    // Answer every third question correctly and leave some unanswered.
    for (i, entry) in session.entries().iter().enumerate() {
        let answer = match i % 3 {
            0 => "beta",
            1 => "gamma",
            _ => continue,
        };
        tests
            .record_answer(me, session.id(), entry.question_id(), answer)
            .await
            .unwrap();
    }

    let result = tests.finalize(me, session.id()).await.unwrap();
    let breakdown = result.category_breakdown();
    assert_eq!(result.score(), 20);
    assert_eq!(result.score(), breakdown.total());
    assert_eq!(result.total_questions(), 60);
    assert_eq!(result.elapsed_seconds(), 1_234);
    for category in CATEGORIES {
        assert_eq!(breakdown.get(category), 5);
    }
}

#[tokio::test]
async fn question_outside_the_session_is_not_found() {
    let (app, _) = seeded(5).await;
    let me = student(1);
    let session = app.tests().start_or_resume(me).await.unwrap();

    let err = app
        .tests()
        .record_answer(me, session.id(), QuestionId::new(9_999), "beta")
        .await
        .unwrap_err();
    assert!(matches!(err, TestError::QuestionNotInSession(_)));

    let err = app
        .tests()
        .record_answer(me, TestSessionId::new(9_999), QuestionId::new(1), "beta")
        .await
        .unwrap_err();
    assert!(matches!(err, TestError::SessionNotFound));
}

#[tokio::test]
async fn results_flow_through_reporting() {
    let (app, _) = seeded(5).await;
    let me = student(1);
    let tests = app.tests();
    let session = tests.start_or_resume(me).await.unwrap();
    for entry in session.entries().iter().take(15) {
        tests
            .record_answer(me, session.id(), entry.question_id(), "beta")
            .await
            .unwrap();
    }
    let result = tests.finalize(me, session.id()).await.unwrap();

    let results = app.results();
    let mine = results.list_results(me, 10).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, result.id());

    let stats = results.performance_stats(me).await.unwrap().unwrap();
    assert_eq!(stats.total_tests, 1);
    assert!((stats.category_accuracy[0].accuracy_percent - 100.0).abs() < f64::EPSILON);
    assert!((stats.category_accuracy[1].accuracy_percent).abs() < f64::EPSILON);

    let analysis = results.test_analysis(me, result.id()).await.unwrap();
    assert_eq!(analysis.questions.len(), 60);
    assert!(analysis.questions.iter().all(|q| q.correct_answer == "beta"));

    // A new test can be started once the previous one is finalized.
    let next = tests.start_or_resume(me).await.unwrap();
    assert_ne!(next.id(), session.id());
}

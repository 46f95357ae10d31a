use chrono::Duration;
use placement_core::model::{
    Category, CategoryBreakdown, Difficulty, NewTestSession, QuestionDraft, QuestionSource,
    ResultDraft, UserId, ValidatedQuestion,
};
use placement_core::time::fixed_now;
use storage::repository::{
    Page, QuestionFilter, QuestionRepository, ResultRepository, SessionWrite, StorageError,
    TestSessionRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn question(category: Category, difficulty: Difficulty, n: u32) -> ValidatedQuestion {
    QuestionDraft {
        category,
        difficulty,
        question_text: format!("{category} {difficulty} #{n}"),
        options: vec!["10".into(), "12".into(), "14".into()],
        correct_answer: "12".into(),
        source: Some(QuestionSource::LeetCode),
    }
    .validate()
    .unwrap()
}

#[tokio::test]
async fn questions_roundtrip_with_ordered_options() {
    let repo = connect("memdb_questions").await;

    let id = repo
        .insert_question(&question(Category::Mathematics, Difficulty::Easy, 1))
        .await
        .unwrap();
    let fetched = repo.get_question(id).await.unwrap();

    assert_eq!(fetched.id(), id);
    assert_eq!(fetched.category(), Category::Mathematics);
    assert_eq!(fetched.options(), ["10", "12", "14"]);
    assert_eq!(fetched.source(), Some(QuestionSource::LeetCode));
    assert_eq!(repo.correct_answer(id).await.unwrap(), "12");
    assert!(matches!(
        repo.get_question(placement_core::model::QuestionId::new(999)).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sample_and_bucket_counts_follow_the_bank() {
    let repo = connect("memdb_sample").await;

    let batch: Vec<_> = (0..7)
        .map(|i| question(Category::Database, Difficulty::Hard, i))
        .chain((0..3).map(|i| question(Category::Reasoning, Difficulty::Easy, i)))
        .collect();
    let ids = repo.insert_questions(&batch).await.unwrap();
    assert_eq!(ids.len(), 10);

    let hard_db = repo
        .sample(Category::Database, Difficulty::Hard, 5)
        .await
        .unwrap();
    assert_eq!(hard_db.len(), 5);
    assert!(hard_db.iter().all(|q| q.category == Category::Database));

    let short = repo
        .sample(Category::Reasoning, Difficulty::Easy, 5)
        .await
        .unwrap();
    assert_eq!(short.len(), 3);

    let counts = repo.bucket_counts().await.unwrap();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].category, Category::Reasoning);
    assert_eq!(counts[0].count, 3);
    assert_eq!(counts[1].count, 7);

    let reversed: Vec<_> = ids.iter().rev().copied().collect();
    let fetched = repo.get_questions(&reversed).await.unwrap();
    assert_eq!(fetched.first().map(|q| q.id()), reversed.first().copied());
}

#[tokio::test]
async fn sessions_enforce_one_open_test_and_freeze_on_completion() {
    let repo = connect("memdb_sessions").await;

    let batch: Vec<_> = (0..3)
        .map(|i| question(Category::Technical, Difficulty::Medium, i))
        .collect();
    repo.insert_questions(&batch).await.unwrap();
    let refs = repo
        .sample(Category::Technical, Difficulty::Medium, 3)
        .await
        .unwrap();

    let user = UserId::new(7);
    let new = NewTestSession::new(user, refs.clone(), fixed_now(), 7_200);
    let session = repo.insert_session(&new).await.unwrap();
    assert_eq!(session.total_questions(), 3);

    assert!(matches!(
        repo.insert_session(&new).await,
        Err(StorageError::Conflict)
    ));
    let open = repo.find_open_session(user).await.unwrap().unwrap();
    assert_eq!(open.id(), session.id());

    let first = refs[0].id;
    assert_eq!(
        repo.record_answer(session.id(), first, "12", true)
            .await
            .unwrap(),
        SessionWrite::Applied
    );
    assert!(matches!(
        repo.record_answer(session.id(), placement_core::model::QuestionId::new(999), "x", false)
            .await,
        Err(StorageError::NotFound)
    ));

    let ended = fixed_now() + Duration::minutes(30);
    assert_eq!(
        repo.complete_session(session.id(), ended).await.unwrap(),
        SessionWrite::Applied
    );
    assert_eq!(
        repo.complete_session(session.id(), ended).await.unwrap(),
        SessionWrite::AlreadyCompleted
    );
    assert_eq!(
        repo.record_answer(session.id(), first, "10", false)
            .await
            .unwrap(),
        SessionWrite::AlreadyCompleted
    );

    let stored = repo.get_session(session.id()).await.unwrap();
    assert!(stored.is_completed());
    assert_eq!(stored.ended_at(), Some(ended));
    assert_eq!(stored.entry(first).and_then(|e| e.answer()), Some("12"));
    assert!(repo.find_open_session(user).await.unwrap().is_none());

    // A new test may start once the previous one is closed.
    repo.insert_session(&new).await.unwrap();
}

#[tokio::test]
async fn results_are_unique_per_session_and_listed_newest_first() {
    let repo = connect("memdb_results").await;

    let user = UserId::new(3);
    let mut session_ids = Vec::new();
    for i in 0..2 {
        let started = fixed_now() + Duration::hours(i);
        let session = repo
            .insert_session(&NewTestSession::new(user, Vec::new(), started, 7_200))
            .await
            .unwrap();
        repo.complete_session(session.id(), started).await.unwrap();
        session_ids.push(session.id());
    }

    let breakdown = CategoryBreakdown {
        mathematics: 2,
        ..CategoryBreakdown::default()
    };
    let older = ResultDraft::new(user, session_ids[0], 2, 3, 90, breakdown, fixed_now()).unwrap();
    let newer = ResultDraft::new(
        user,
        session_ids[1],
        2,
        3,
        45,
        breakdown,
        fixed_now() + Duration::hours(1),
    )
    .unwrap();

    let first = repo.insert_result(&older).await.unwrap();
    let second = repo.insert_result(&newer).await.unwrap();
    assert!(matches!(
        repo.insert_result(&older).await,
        Err(StorageError::Conflict)
    ));

    let fetched = repo.get_result(first.id()).await.unwrap();
    assert_eq!(fetched.category_breakdown().mathematics, 2);
    assert_eq!(fetched.elapsed_seconds(), 90);

    let listed = repo.list_user_results(user, 10).await.unwrap();
    let ids: Vec<_> = listed.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![second.id(), first.id()]);
    assert_eq!(repo.list_results(1).await.unwrap().len(), 1);

    let by_session = repo.result_for_session(session_ids[1]).await.unwrap();
    assert_eq!(by_session.map(|r| r.id()), Some(second.id()));
    assert!(
        repo.list_user_results(UserId::new(99), 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn listings_filter_sort_and_page() {
    let repo = connect("memdb_listings").await;

    let mut batch: Vec<_> = (0..3)
        .map(|i| question(Category::Technical, Difficulty::Easy, i))
        .collect();
    batch.extend((0..4).map(|i| question(Category::Database, Difficulty::Hard, i)));
    batch.extend((0..2).map(|i| question(Category::Database, Difficulty::Easy, i)));
    repo.insert_questions(&batch).await.unwrap();

    let all = repo
        .list_questions(QuestionFilter::default(), Page::new(1, 100))
        .await
        .unwrap();
    assert_eq!(all.total, 9);
    assert_eq!(
        (all.items[0].category(), all.items[0].difficulty()),
        (Category::Database, Difficulty::Easy)
    );
    assert_eq!(all.items[8].category(), Category::Technical);

    let hard_db = QuestionFilter {
        category: Some(Category::Database),
        difficulty: Some(Difficulty::Hard),
    };
    let page = repo.list_questions(hard_db, Page::new(2, 3)).await.unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].difficulty(), Difficulty::Hard);

    let mut ids = Vec::new();
    for user in 1..=3_u64 {
        let started = fixed_now() + Duration::minutes(i64::try_from(user).unwrap());
        let new = NewTestSession::new(UserId::new(user), Vec::new(), started, 60);
        ids.push(repo.insert_session(&new).await.unwrap().id());
    }
    repo.complete_session(ids[1], fixed_now() + Duration::hours(1))
        .await
        .unwrap();

    let newest = repo.list_sessions(None, Page::new(1, 2)).await.unwrap();
    assert_eq!(newest.total, 3);
    let order: Vec<_> = newest.items.iter().map(|s| s.id()).collect();
    assert_eq!(order, vec![ids[2], ids[1]]);

    let open = repo.list_sessions(Some(false), Page::default()).await.unwrap();
    assert_eq!(open.total, 2);
    assert!(open.items.iter().all(|s| !s.is_completed()));
    let done = repo.list_sessions(Some(true), Page::default()).await.unwrap();
    assert_eq!(done.items[0].id(), ids[1]);
}

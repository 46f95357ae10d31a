//! The `start`, `view`, `answer`, `submit` and `sessions` commands.

use anyhow::Result;
use placement_core::model::{Identity, QuestionId, TestSessionId};
use services::{AppServices, Page, ResultSummary};

use super::print_json;

pub async fn start(app: &AppServices, identity: Identity) -> Result<()> {
    let tests = app.tests();
    let session = tests.start_or_resume(identity).await?;
    let view = tests.questions_view(identity, session.id()).await?;
    print_json(&view)
}

pub async fn view(app: &AppServices, identity: Identity, session: TestSessionId) -> Result<()> {
    let view = app.tests().questions_view(identity, session).await?;
    print_json(&view)
}

pub async fn answer(
    app: &AppServices,
    identity: Identity,
    session: TestSessionId,
    question: QuestionId,
    answer: &str,
) -> Result<()> {
    let verdict = app
        .tests()
        .record_answer(identity, session, question, answer)
        .await?;
    print_json(&verdict)
}

pub async fn submit(app: &AppServices, identity: Identity, session: TestSessionId) -> Result<()> {
    let result = app.tests().finalize(identity, session).await?;
    print_json(&ResultSummary::from(&result))
}

pub async fn list(
    app: &AppServices,
    identity: Identity,
    completed: Option<bool>,
    page: Page,
) -> Result<()> {
    let listed = app.tests().list_sessions(identity, completed, page).await?;
    print_json(&listed)
}

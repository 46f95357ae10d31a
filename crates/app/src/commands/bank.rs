//! The `seed`, `import`, `bank-stats`, `questions` and `question` commands.

use std::path::Path;

use anyhow::{Context, Result};
use placement_core::model::{Identity, QuestionDraft, QuestionId};
use serde_json::json;
use services::{AppServices, Page, QuestionFilter};

use super::print_json;

pub async fn seed(app: &AppServices, per_bucket: u64) -> Result<()> {
    let questions = app.questions();
    let added = questions.seed_bank(per_bucket).await?;
    let bank = questions.bank_stats().await?;
    print_json(&json!({ "added": added, "bank": bank }))
}

pub async fn import(app: &AppServices, identity: Identity, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let drafts: Vec<QuestionDraft> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", file.display()))?;

    let imported = app.questions().import_questions(identity, drafts).await?;
    print_json(&json!({ "imported": imported }))
}

pub async fn stats(app: &AppServices) -> Result<()> {
    let bank = app.questions().bank_stats().await?;
    if !bank.is_complete() {
        tracing::warn!("some buckets cannot fill a full test");
    }
    print_json(&bank)
}

pub async fn list(
    app: &AppServices,
    identity: Identity,
    filter: QuestionFilter,
    page: Page,
) -> Result<()> {
    let listed = app.questions().list_questions(identity, filter, page).await?;
    print_json(&listed)
}

pub async fn show(app: &AppServices, identity: Identity, id: QuestionId) -> Result<()> {
    let question = app.questions().get_question(identity, id).await?;
    print_json(&question)
}

//! The `results`, `result`, `stats` and `analysis` commands.

use anyhow::Result;
use placement_core::model::{Identity, ResultId};
use services::AppServices;

use super::print_json;

pub async fn list(app: &AppServices, identity: Identity, limit: u32, all: bool) -> Result<()> {
    let results = app.results();
    let summaries = if all {
        results.list_all_results(identity, limit).await?
    } else {
        results.list_results(identity, limit).await?
    };
    print_json(&summaries)
}

pub async fn details(app: &AppServices, identity: Identity, result: ResultId) -> Result<()> {
    let summary = app.results().result_details(identity, result).await?;
    print_json(&summary)
}

pub async fn stats(app: &AppServices, identity: Identity) -> Result<()> {
    let stats = app.results().performance_stats(identity).await?;
    if stats.is_none() {
        tracing::info!(user = %identity.user_id, "no results yet");
    }
    print_json(&stats)
}

pub async fn analysis(app: &AppServices, identity: Identity, result: ResultId) -> Result<()> {
    let analysis = app.results().test_analysis(identity, result).await?;
    print_json(&analysis)
}

//! `placement` CLI: run mock placement tests against a local `SQLite` bank.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use placement_core::model::{
    Category, Difficulty, Identity, QuestionId, ResultId, TestSessionId, UserId,
};
use services::{
    AppServices, Clock, ErrorKind, Page, QuestionFilter, QuestionServiceError,
    ResultServiceError, TestError,
};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

const DEFAULT_LOG_FILTER: &str = "warn,placement=info,services=info";

#[derive(Parser)]
#[command(name = "placement", version, about = "Mock placement test engine")]
struct Cli {
    /// `SQLite` database URL or path
    #[arg(long, global = true, env = config::DB_URL_ENV, default_value = config::DEFAULT_DB_URL)]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

/// One-based page of a listing.
#[derive(Args, Clone, Copy)]
struct Paging {
    #[arg(long, default_value = "1")]
    page: u32,

    /// Rows per page
    #[arg(long, default_value = "10")]
    limit: u32,
}

impl From<Paging> for Page {
    fn from(paging: Paging) -> Self {
        Page::new(paging.page, paging.limit)
    }
}

/// Who is making the request.
#[derive(Args, Clone, Copy)]
struct Caller {
    /// Acting user id
    #[arg(long)]
    user: u64,

    /// Act with administrator rights
    #[arg(long)]
    admin: bool,
}

impl Caller {
    fn identity(self) -> Identity {
        let user = UserId::new(self.user);
        if self.admin {
            Identity::admin(user)
        } else {
            Identity::student(user)
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Top up every question bucket with generated questions
    Seed {
        /// Questions each (category, difficulty) bucket should hold
        #[arg(long, default_value = "5")]
        per_bucket: u64,
    },

    /// Import questions from a JSON array of drafts (admin)
    Import {
        #[command(flatten)]
        caller: Caller,

        /// JSON file to read
        #[arg(long)]
        file: PathBuf,
    },

    /// Show question bank inventory
    BankStats,

    /// Browse stored questions with their answers (admin)
    Questions {
        #[command(flatten)]
        caller: Caller,

        /// Only this category, e.g. Database
        #[arg(long)]
        category: Option<Category>,

        /// Only this difficulty, e.g. Hard
        #[arg(long)]
        difficulty: Option<Difficulty>,

        #[command(flatten)]
        paging: Paging,
    },

    /// Show one stored question with its answer (admin)
    Question {
        #[command(flatten)]
        caller: Caller,

        #[arg(long)]
        id: QuestionId,
    },

    /// Start a test, or resume the open one
    Start {
        #[command(flatten)]
        caller: Caller,
    },

    /// Show a session's questions and progress
    View {
        #[command(flatten)]
        caller: Caller,

        #[arg(long)]
        session: TestSessionId,
    },

    /// Record an answer for one question
    Answer {
        #[command(flatten)]
        caller: Caller,

        #[arg(long)]
        session: TestSessionId,

        #[arg(long)]
        question: QuestionId,

        #[arg(long)]
        answer: String,
    },

    /// List every user's test sessions, newest first (admin)
    Sessions {
        #[command(flatten)]
        caller: Caller,

        /// Only completed (true) or open (false) sessions
        #[arg(long)]
        completed: Option<bool>,

        #[command(flatten)]
        paging: Paging,
    },

    /// Finish a session and record its result
    Submit {
        #[command(flatten)]
        caller: Caller,

        #[arg(long)]
        session: TestSessionId,
    },

    /// List results, newest first
    Results {
        #[command(flatten)]
        caller: Caller,

        /// Maximum number of results
        #[arg(long, default_value = "20")]
        limit: u32,

        /// Every user's results (admin)
        #[arg(long)]
        all: bool,
    },

    /// Show one result
    Result {
        #[command(flatten)]
        caller: Caller,

        #[arg(long)]
        result: ResultId,
    },

    /// Aggregate performance over all of the caller's results
    Stats {
        #[command(flatten)]
        caller: Caller,
    },

    /// Per-question review of a completed test
    Analysis {
        #[command(flatten)]
        caller: Caller,

        #[arg(long)]
        result: ResultId,
    },
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let db_url = config::normalize_sqlite_url(&cli.db);
    config::prepare_sqlite_file(&db_url)?;
    let app = AppServices::new_sqlite(&db_url, Clock::System)
        .await
        .with_context(|| format!("opening {db_url}"))?;
    tracing::debug!(db = %db_url, "storage ready");

    match cli.command {
        Commands::Seed { per_bucket } => commands::bank::seed(&app, per_bucket).await,
        Commands::Import { caller, file } => {
            commands::bank::import(&app, caller.identity(), &file).await
        }
        Commands::BankStats => commands::bank::stats(&app).await,
        Commands::Questions {
            caller,
            category,
            difficulty,
            paging,
        } => {
            let filter = QuestionFilter {
                category,
                difficulty,
            };
            commands::bank::list(&app, caller.identity(), filter, paging.into()).await
        }
        Commands::Question { caller, id } => {
            commands::bank::show(&app, caller.identity(), id).await
        }
        Commands::Sessions {
            caller,
            completed,
            paging,
        } => commands::session::list(&app, caller.identity(), completed, paging.into()).await,
        Commands::Start { caller } => commands::session::start(&app, caller.identity()).await,
        Commands::View { caller, session } => {
            commands::session::view(&app, caller.identity(), session).await
        }
        Commands::Answer {
            caller,
            session,
            question,
            answer,
        } => commands::session::answer(&app, caller.identity(), session, question, &answer).await,
        Commands::Submit { caller, session } => {
            commands::session::submit(&app, caller.identity(), session).await
        }
        Commands::Results { caller, limit, all } => {
            commands::report::list(&app, caller.identity(), limit, all).await
        }
        Commands::Result { caller, result } => {
            commands::report::details(&app, caller.identity(), result).await
        }
        Commands::Stats { caller } => commands::report::stats(&app, caller.identity()).await,
        Commands::Analysis { caller, result } => {
            commands::report::analysis(&app, caller.identity(), result).await
        }
    }
}

/// Exit status for a failed command, derived from the service error kind.
fn exit_code(err: &anyhow::Error) -> i32 {
    let kind = err.chain().find_map(|cause| {
        cause
            .downcast_ref::<TestError>()
            .map(TestError::kind)
            .or_else(|| {
                cause
                    .downcast_ref::<ResultServiceError>()
                    .map(ResultServiceError::kind)
            })
            .or_else(|| {
                cause
                    .downcast_ref::<QuestionServiceError>()
                    .map(QuestionServiceError::kind)
            })
    });

    match kind {
        Some(ErrorKind::Invalid) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Unauthorized) => 4,
        Some(ErrorKind::AlreadyCompleted | ErrorKind::Conflict) => 5,
        Some(ErrorKind::Internal) | None => 1,
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(exit_code(&e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn answer_parses_typed_ids() {
        let cli = Cli::try_parse_from([
            "placement",
            "--db",
            "sqlite::memory:",
            "answer",
            "--user",
            "7",
            "--session",
            "3",
            "--question",
            "12",
            "--answer",
            "O(n)",
        ])
        .unwrap();
        assert_eq!(cli.db, "sqlite::memory:");
        let Commands::Answer {
            caller,
            session,
            question,
            answer,
        } = cli.command
        else {
            panic!("expected answer command");
        };
        assert_eq!(caller.identity(), Identity::student(UserId::new(7)));
        assert_eq!(session, TestSessionId::new(3));
        assert_eq!(question, QuestionId::new(12));
        assert_eq!(answer, "O(n)");
    }

    #[test]
    fn admin_flag_grants_admin_identity() {
        let cli =
            Cli::try_parse_from(["placement", "results", "--user", "1", "--admin", "--all"])
                .unwrap();
        let Commands::Results { caller, all, limit } = cli.command else {
            panic!("expected results command");
        };
        assert!(caller.identity().is_admin());
        assert!(all);
        assert_eq!(limit, 20);
    }

    #[test]
    fn question_listing_parses_filters_and_paging() {
        let cli = Cli::try_parse_from([
            "placement",
            "questions",
            "--user",
            "1",
            "--admin",
            "--category",
            "Database",
            "--page",
            "2",
        ])
        .unwrap();
        let Commands::Questions {
            category,
            difficulty,
            paging,
            ..
        } = cli.command
        else {
            panic!("expected questions command");
        };
        assert_eq!(category, Some(Category::Database));
        assert_eq!(difficulty, None);
        assert_eq!(Page::from(paging), Page::new(2, 10));

        assert!(
            Cli::try_parse_from(["placement", "questions", "--user", "1", "--category", "Art"])
                .is_err()
        );
    }

    #[test]
    fn session_listing_takes_an_explicit_state() {
        let cli = Cli::try_parse_from([
            "placement",
            "sessions",
            "--user",
            "1",
            "--admin",
            "--completed",
            "false",
        ])
        .unwrap();
        let Commands::Sessions { completed, .. } = cli.command else {
            panic!("expected sessions command");
        };
        assert_eq!(completed, Some(false));
    }

    #[test]
    fn error_kinds_map_to_exit_codes() {
        let not_found = anyhow::Error::new(TestError::SessionNotFound);
        assert_eq!(exit_code(&not_found), 3);

        let wrapped = anyhow::Error::new(ResultServiceError::Unauthorized).context("loading");
        assert_eq!(exit_code(&wrapped), 4);

        assert_eq!(exit_code(&anyhow::Error::new(TestError::AlreadyCompleted)), 5);
        assert_eq!(exit_code(&anyhow::Error::new(QuestionServiceError::NotFound)), 3);
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
    }
}

use std::fmt;

use chrono::{Days, NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use disciple_core::model::{
    AttendanceStatus, Cadence, ClassSchedule, ContentId, ContentItem, CreationKey, EnrollmentId,
    MemberId, SessionId,
};
use serde_json::json;
use services::{AppServices, ClassDraft, ClassService, Clock};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_DB_URL: &str = "sqlite://discipleship.sqlite3";

/// Creation key of the demo class, so repeated seeding is a no-op.
const SEED_CLASS_KEY: Uuid = Uuid::from_u128(0x5eed_c1a5_0000_4000_8000_0000_0000_0001);

const SEED_LESSONS: [(&str, u32); 6] = [
    ("Why discipleship", 1),
    ("Reading scripture together", 2),
    ("Prayer as a habit", 3),
    ("Life in community", 4),
    ("Serving others", 5),
    ("Sharing your story", 6),
];

#[derive(Debug)]
enum ArgsError {
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Parser)]
#[command(name = "disciple")]
#[command(about = "Schedule classes and track lesson progress for discipleship groups", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database URL or file path
    #[arg(long = "db", global = true, env = "DISCIPLE_DB_URL", default_value = DEFAULT_DB_URL)]
    db_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the session plan a schedule would produce, as JSON
    Schedule(ScheduleArgs),
    /// Create a demo class with lessons and an approved enrollment
    Seed {
        /// Member to enroll in the demo class
        #[arg(long, default_value_t = 1)]
        member: u64,
    },
    /// Show lesson states and metrics for an enrollment, as JSON
    Progress {
        #[arg(long)]
        enrollment: u64,
    },
    /// Mark a lesson complete (or not) for an enrollment
    Complete {
        #[arg(long)]
        enrollment: u64,
        #[arg(long)]
        content: u64,
        /// Clear the completion instead of setting it
        #[arg(long)]
        undo: bool,
        /// Skip the lock check (staff override)
        #[arg(long = "override")]
        force: bool,
    },
    /// Record attendance at a session
    Attend {
        #[arg(long)]
        enrollment: u64,
        #[arg(long)]
        session: u64,
        /// present, absent or excused
        #[arg(long, default_value = "present")]
        status: AttendanceStatus,
    },
}

#[derive(Args)]
struct ScheduleArgs {
    /// weekly, biweekly, monthly or custom
    #[arg(long, default_value = "weekly")]
    cadence: Cadence,
    /// First eligible date (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long, default_value_t = 8)]
    weeks: u32,
    /// Weekday to meet on (weekly and biweekly only)
    #[arg(long)]
    weekday: Option<Weekday>,
    /// Last eligible date, inclusive
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Session topic; repeat once per session
    #[arg(long = "topic")]
    topics: Vec<String>,
    /// Session note; matched to sessions by position
    #[arg(long = "note")]
    notes: Vec<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn normalize_sqlite_url(raw: &str) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw.to_string();
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn open_services(raw_db_url: &str) -> Result<AppServices, Box<dyn std::error::Error>> {
    if raw_db_url.trim().is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: raw_db_url.to_string(),
        }
        .into());
    }
    let db_url = normalize_sqlite_url(raw_db_url);
    prepare_sqlite_file(&db_url)?;
    debug!(%db_url, "opening database");
    Ok(AppServices::new_sqlite(&db_url, Clock::default_clock()).await?)
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn preview(args: ScheduleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut schedule = ClassSchedule::new(args.cadence, args.start, args.weeks)?;
    if let Some(weekday) = args.weekday {
        schedule = schedule.with_target_weekday(weekday);
    }
    if let Some(end) = args.end {
        schedule = schedule.with_end_date(end);
    }

    let topics = (!args.topics.is_empty()).then_some(args.topics.as_slice());
    let notes = (!args.notes.is_empty()).then_some(args.notes.as_slice());
    let plan = ClassService::preview_sessions(&schedule, topics, notes);
    print_json(&plan)
}

/// Demo lessons not yet in the class, matched by title.
fn missing_lessons(existing: &[ContentItem]) -> Vec<(&'static str, u32)> {
    SEED_LESSONS
        .into_iter()
        .filter(|(title, _)| !existing.iter().any(|item| item.title() == *title))
        .collect()
}

async fn seed(app: &AppServices, member: MemberId) -> Result<(), Box<dyn std::error::Error>> {
    let today = Clock::default_clock().today();
    let start = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let schedule = ClassSchedule::new(Cadence::Weekly, Some(start), 6)?
        .with_target_weekday(Weekday::Thu);

    let mut draft = ClassDraft::new("Foundations", schedule);
    draft.description = Some("Six weeks through the basics of following Jesus".into());
    draft.topics = Some(SEED_LESSONS.iter().map(|(t, _)| (*t).to_string()).collect());
    draft.creation_key = CreationKey::from_uuid(SEED_CLASS_KEY);
    draft.require_sessions = true;

    let created = app.classes().create_class(draft).await?;
    let class_id = created.class.id();

    let existing = app.content().list_content(class_id).await?;
    for (title, week) in missing_lessons(&existing) {
        app.content()
            .add_content(class_id, title, Some(week), 0, true)
            .await?;
    }

    let enrollment = match app
        .enrollments()
        .list(class_id)
        .await?
        .into_iter()
        .find(|e| e.member_id() == member)
    {
        Some(existing) => existing,
        None => {
            let pending = app.enrollments().enroll(class_id, member).await?;
            app.enrollments().approve(pending.id()).await?
        }
    };

    let content = app.content().published_content(class_id).await?;
    info!(%class_id, created = created.created, "seed complete");
    print_json(&json!({
        "class_id": class_id,
        "created": created.created,
        "sessions": created.sessions,
        "content": content.iter().map(|c| json!({ "id": c.id(), "title": c.title() })).collect::<Vec<_>>(),
        "enrollment_id": enrollment.id(),
        "status": enrollment.status(),
    }))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Schedule(args) => preview(args),
        Command::Seed { member } => {
            let app = open_services(&cli.db_url).await?;
            seed(&app, MemberId::new(member)).await
        }
        Command::Progress { enrollment } => {
            let app = open_services(&cli.db_url).await?;
            let overview = app
                .progress()
                .content_overview(EnrollmentId::new(enrollment))
                .await?;
            print_json(&overview)
        }
        Command::Complete {
            enrollment,
            content,
            undo,
            force,
        } => {
            let app = open_services(&cli.db_url).await?;
            let enrollment = EnrollmentId::new(enrollment);
            let content = ContentId::new(content);
            let progress = app.progress();
            let outcome = if force {
                progress
                    .override_completion(enrollment, content, !undo)
                    .await?
            } else {
                progress.set_completion(enrollment, content, !undo).await?
            };
            print_json(&outcome)
        }
        Command::Attend {
            enrollment,
            session,
            status,
        } => {
            let app = open_services(&cli.db_url).await?;
            let summary = app
                .attendance()
                .record(EnrollmentId::new(enrollment), SessionId::new(session), status)
                .await?;
            print_json(&summary)
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run(Cli::parse()).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

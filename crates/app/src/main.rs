use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use exam_core::catalog::{CatalogQuery, TestStatus};
use exam_core::model::{AnswerRecord, NavDirection, QuestionBody, TestId};
use exam_core::scoring::{Submission, TestResult};
use exam_core::time::wire_date;
use services::config::parse_base_url;
use services::{
    AppServices, Attempt, BackendConfig, Clock, Countdown, SessionError, Tick, share,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    InvalidPage { raw: String },
    InvalidStatus { raw: String },
    InvalidDate { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidPage { raw } => write!(f, "invalid --page value: {raw}"),
            ArgsError::InvalidStatus { raw } => write!(f, "invalid --status value: {raw}"),
            ArgsError::InvalidDate { flag, raw } => write!(f, "invalid {flag} date: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [global flags] directions");
    eprintln!("  app [global flags] tests <direction> [--search <text>] [--status <s>]");
    eprintln!("                      [--from <date>] [--until <date>] [--page <n>]");
    eprintln!("  app [global flags] take [<test-id>] [--practice]");
    eprintln!("  app [global flags] status");
    eprintln!("  app [global flags] abandon");
    eprintln!();
    eprintln!("Global flags:");
    eprintln!("  --db <sqlite_url>   default sqlite://exam-local.sqlite3");
    eprintln!("  --api <url>         default http://localhost:5000/api");
    eprintln!("  --student <id>");
    eprintln!();
    eprintln!("Statuses: upcoming, available, missed, completed");
    eprintln!("Dates: RFC 3339, YYYY-MM-DDTHH:MM or YYYY-MM-DD (UTC)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_API_URL, EXAM_API_TIMEOUT_SECS, EXAM_STUDENT_ID, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Directions,
    Tests {
        direction: String,
        query: CatalogQuery,
    },
    Take {
        test_id: Option<TestId>,
        practice: bool,
    },
    Status,
    Abandon,
}

struct Args {
    db_url: String,
    api_url: Option<String>,
    student: Option<String>,
    command: Command,
}

fn parse_status(raw: &str) -> Result<TestStatus, ArgsError> {
    match raw.trim().to_lowercase().as_str() {
        "upcoming" => Ok(TestStatus::Upcoming),
        "available" => Ok(TestStatus::Available),
        "missed" => Ok(TestStatus::Missed),
        "completed" => Ok(TestStatus::Completed),
        _ => Err(ArgsError::InvalidStatus { raw: raw.to_owned() }),
    }
}

fn parse_date(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<DateTime<Utc>, ArgsError> {
    let raw = require_value(args, flag)?;
    wire_date::parse(&raw).ok_or(ArgsError::InvalidDate { flag, raw })
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("EXAM_DB_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| "sqlite://exam-local.sqlite3".into(), normalize_sqlite_url);
        let mut api_url = None;
        let mut student = None;
        let mut search = None;
        let mut status = None;
        let mut from = None;
        let mut until = None;
        let mut page = 1;
        let mut practice = false;
        let mut positional = Vec::new();

        let mut args = args;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--api" => api_url = Some(require_value(&mut args, "--api")?),
                "--student" => student = Some(require_value(&mut args, "--student")?),
                "--search" => search = Some(require_value(&mut args, "--search")?),
                "--status" => status = Some(parse_status(&require_value(&mut args, "--status")?)?),
                "--from" => from = Some(parse_date(&mut args, "--from")?),
                "--until" => until = Some(parse_date(&mut args, "--until")?),
                "--page" => {
                    let value = require_value(&mut args, "--page")?;
                    page = value
                        .parse::<usize>()
                        .map_err(|_| ArgsError::InvalidPage { raw: value.clone() })?;
                }
                "--practice" => practice = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match positional.next().as_deref() {
            Some("directions") => Command::Directions,
            Some("tests") => {
                let direction = positional
                    .next()
                    .ok_or(ArgsError::MissingArgument { name: "direction" })?;
                Command::Tests {
                    direction,
                    query: CatalogQuery {
                        search,
                        from,
                        until,
                        status,
                        ..CatalogQuery::page(page)
                    },
                }
            }
            Some("take") => Command::Take {
                test_id: positional.next().map(TestId::new),
                practice,
            },
            Some("status") => Command::Status,
            Some("abandon") => Command::Abandon,
            Some(other) => return Err(ArgsError::UnknownArg(other.to_owned())),
            None => return Err(ArgsError::MissingArgument { name: "command" }),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self {
            db_url,
            api_url,
            student,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
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

// ─── Output ────────────────────────────────────────────────────────────────────

fn print_result(result: &TestResult) {
    println!("== {} ==", result.test_title);
    println!(
        "points {}/{}  correct {}/{}  accuracy {}%  score {}%  time {} min",
        result.total_points,
        result.max_points,
        result.correct_answers,
        result.total_questions,
        result.accuracy,
        result.rating_score,
        result.time_spent_minutes,
    );
    for answer in &result.answers {
        let mark = if answer.is_correct { "+" } else { "-" };
        println!("  {mark} question {} ({} pts)", answer.question_id, answer.points);
    }
    match &result.submission {
        Submission::Skipped => println!("practice attempt: not recorded"),
        Submission::Pending => {}
        Submission::Accepted(id) => println!("recorded as attempt {id}"),
        Submission::Failed(reason) => {
            println!("warning: result could not be sent ({reason}); shown locally only");
        }
    }
}

fn render_question(attempt: &Attempt, remaining_seconds: u32) {
    let session = attempt.session();
    let Some(question) = attempt.current_question() else {
        return;
    };
    println!();
    println!(
        "[{}/{}] {:02}:{:02} left{}",
        session.current_question_index() + 1,
        attempt.question_count(),
        remaining_seconds / 60,
        remaining_seconds % 60,
        if session.is_practice_mode() { " (practice)" } else { "" },
    );
    println!("{} ({})", question.text, question.kind());
    for option in question.options() {
        println!("  {}) {}", option.id, option.text);
    }
    if let Some(answer) = session.answer(question.id()) {
        match answer {
            AnswerRecord::Text { text_answer } => println!("your answer: {text_answer}"),
            other => {
                let ids: Vec<&str> = other.selected_ids().iter().map(|id| id.as_str()).collect();
                println!("your answer: {}", ids.join(" "));
            }
        }
    }
}

/// Build a record for the current question from user input.
fn answer_from_input(attempt: &Attempt, input: &str) -> Option<AnswerRecord> {
    let question = attempt.current_question()?;
    let record = match &question.body {
        QuestionBody::Single { .. } => AnswerRecord::single(input.split_whitespace().next()),
        QuestionBody::Multiple { .. } => AnswerRecord::multiple(input.split_whitespace()),
        QuestionBody::Text { .. } => AnswerRecord::text(input.trim()),
    };
    Some(record)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

async fn take(
    services: &AppServices,
    test_id: Option<TestId>,
    practice: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let flow = services.flow();
    let attempt = match test_id {
        Some(id) => match flow.start_test(&id, practice).await {
            Err(SessionError::AlreadyCompleted(id)) => {
                println!("test {id} is already completed; use --practice to retake it");
                return Ok(());
            }
            other => other?,
        },
        None => match flow.resume_test().await? {
            Some(attempt) => attempt,
            None => {
                println!("no test in progress");
                return Ok(());
            }
        },
    };

    let engine = flow.engine().clone();
    let shared = share(attempt);
    let time_up = Arc::new(Notify::new());
    let on_tick = {
        let time_up = Arc::clone(&time_up);
        move |tick: &Tick| {
            if let Some(result) = &tick.completed {
                println!("\ntime is up");
                print_result(result);
                time_up.notify_one();
            }
        }
    };
    let countdown = Countdown::spawn(
        engine.clone(),
        Arc::clone(&shared),
        Duration::from_secs(1),
        on_tick,
    );

    println!("commands: n(ext), p(rev), a <answer>, submit, back, quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        {
            let guard = shared.lock().await;
            if guard.is_completed() {
                break;
            }
            render_question(&guard, guard.session().remaining_seconds(engine.clock().now()));
        }

        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = time_up.notified() => break,
        };
        let Some(line) = line else {
            break;
        };
        let mut guard = shared.lock().await;
        if guard.is_completed() {
            break;
        }

        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let outcome = match cmd {
            "n" | "next" => engine.navigate(&mut guard, NavDirection::Next).await.map(|_| ()),
            "p" | "prev" => engine.navigate(&mut guard, NavDirection::Prev).await.map(|_| ()),
            "a" | "answer" => match (
                guard.current_question().map(|q| q.id()),
                answer_from_input(&guard, rest),
            ) {
                (Some(question_id), Some(record)) => {
                    engine.record_answer(&mut guard, question_id, record).await
                }
                _ => Ok(()),
            },
            "submit" => {
                let result = engine.complete(&mut guard).await;
                print_result(&result);
                break;
            }
            "back" => {
                countdown.cancel();
                let attempt = guard.clone();
                drop(guard);
                flow.back_to_tests(attempt).await?;
                println!("attempt discarded");
                return Ok(());
            }
            "quit" => {
                countdown.cancel();
                println!("progress saved; run `take` again to continue");
                return Ok(());
            }
            _ => {
                println!("commands: n(ext), p(rev), a <answer>, submit, back, quit");
                Ok(())
            }
        };

        match outcome {
            Ok(()) => {}
            Err(SessionError::Expired) => {
                let result = engine.complete(&mut guard).await;
                println!("time is up");
                print_result(&result);
                break;
            }
            Err(err) => println!("{err}"),
        }
    }

    countdown.cancel();
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = BackendConfig::from_env()?;
    if let Some(api) = &parsed.api_url {
        config.base_url = parse_base_url(api)?;
    }
    if let Some(student) = &parsed.student {
        config.student_id = Some(student.parse()?);
    }

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), &config).await?;
    tracing::debug!(student_id = %services.student_id(), db = %parsed.db_url, "services ready");

    match parsed.command {
        Command::Directions => {
            for direction in services.catalog().directions().await? {
                println!("{}", direction.name);
            }
        }
        Command::Tests { direction, query } => {
            let page = services.catalog().view(&direction, &query).await?;
            let counts = page.counts;
            println!(
                "upcoming {}  available {}  missed {}  completed {}",
                counts.upcoming, counts.available, counts.missed, counts.completed
            );
            for entry in &page.entries {
                let score = entry
                    .attempt
                    .as_ref()
                    .map(|a| format!("  score {}%  {} min", a.score, a.time_spent_minutes))
                    .unwrap_or_default();
                println!(
                    "{:<10} {}  {}  ({} min){score}",
                    entry.status.to_string(),
                    entry.test.id,
                    entry.test.title,
                    entry.test.time_limit_minutes,
                );
            }
            println!("page {}/{}", page.page, page.total_pages.max(1));
        }
        Command::Take { test_id, practice } => take(&services, test_id, practice).await?,
        Command::Status => match services.flow().resume_test().await? {
            Some(attempt) => {
                let session = attempt.session();
                println!(
                    "{}: question {}/{}, {} answered, {}s left",
                    session.test_title(),
                    session.current_question_index() + 1,
                    attempt.question_count(),
                    session.answers().len(),
                    session.remaining_seconds(Clock::default_clock().now()),
                );
            }
            None => println!("no test in progress"),
        },
        Command::Abandon => {
            services.flow().engine().discard().await?;
            println!("persisted test session cleared");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

use std::fmt;
use std::sync::Arc;

use assess_core::model::{AssessmentId, CandidateId, JobId, SubmissionResult};
use services::config::settings_from_env;
use services::{
    Clock, GatingService, HttpApiClient, RunnerError, SessionEvent, SessionEvents, SessionHandle,
    SessionRunner,
};
use storage::repository::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_DB_URL: &str = "ASSESS_DB_URL";
const MEMORY_DB_URL: &str = "sqlite::memory:";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
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

fn parse_id(args: &mut impl Iterator<Item = String>, flag: &'static str) -> Result<u64, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app take      --assessment <id> [--api <url>] [--token <t>] [--db <sqlite_url>]");
    eprintln!("  app preselect --job <id> --candidate <id> [--api <url>] [--token <t>] [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Commands while a session runs:");
    eprintln!("  n next, p previous, g <num> go to, a <option> answer, c clear,");
    eprintln!("  o overview, s submit, q quit");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ASSESS_API_BASE_URL, ASSESS_API_TOKEN, ASSESS_WARNING_THRESHOLDS, ASSESS_DB_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Assessment(AssessmentId),
    Preselection { job: JobId, candidate: CandidateId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    target: Target,
    api: Option<String>,
    token: Option<String>,
    db_url: String,
}

impl Args {
    fn parse(command: &str, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut assessment = None;
        let mut job = None;
        let mut candidate = None;
        let mut api = None;
        let mut token = None;
        let mut db_url = std::env::var(ENV_DB_URL)
            .ok()
            .map_or_else(|| MEMORY_DB_URL.to_string(), normalize_sqlite_url);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--assessment" => assessment = Some(parse_id(args, "--assessment")?),
                "--job" => job = Some(parse_id(args, "--job")?),
                "--candidate" => candidate = Some(parse_id(args, "--candidate")?),
                "--api" => api = Some(require_value(args, "--api")?),
                "--token" => token = Some(require_value(args, "--token")?),
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let target = match command {
            "take" => Target::Assessment(AssessmentId::new(
                assessment.ok_or(ArgsError::MissingFlag {
                    flag: "--assessment",
                })?,
            )),
            "preselect" => Target::Preselection {
                job: JobId::new(job.ok_or(ArgsError::MissingFlag { flag: "--job" })?),
                candidate: CandidateId::new(candidate.ok_or(ArgsError::MissingFlag {
                    flag: "--candidate",
                })?),
            },
            other => return Err(ArgsError::UnknownArg(other.to_string())),
        };

        Ok(Self {
            target,
            api,
            token,
            db_url,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == MEMORY_DB_URL || raw.starts_with("sqlite://") {
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

// A pooled in-memory SQLite database is per connection, so the default
// uses the in-process repository instead.
async fn open_storage(db_url: &str) -> Result<Storage, Box<dyn std::error::Error>> {
    if db_url == MEMORY_DB_URL {
        return Ok(Storage::in_memory());
    }
    prepare_sqlite_file(db_url)?;
    Ok(Storage::sqlite(db_url).await?)
}

/// One line typed by the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Next,
    Previous,
    GoTo(usize),
    Answer(usize),
    Clear,
    Overview,
    Submit,
    Quit,
}

impl Input {
    // Positions are 1-based on the terminal.
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let word = parts.next()?;
        let number = parts
            .next()
            .and_then(|raw| raw.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1));
        match (word, number) {
            ("n", _) => Some(Self::Next),
            ("p", _) => Some(Self::Previous),
            ("g", Some(index)) => Some(Self::GoTo(index)),
            ("a", Some(index)) => Some(Self::Answer(index)),
            ("c", _) => Some(Self::Clear),
            ("o", _) => Some(Self::Overview),
            ("s", _) => Some(Self::Submit),
            ("q", _) => Some(Self::Quit),
            _ => None,
        }
    }
}

fn format_remaining(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn show_question(handle: &SessionHandle) {
    let snapshot = handle.snapshot();
    let Some(question) = handle.current_question() else {
        return;
    };
    println!();
    println!(
        "[{}/{}] {}   ({} left)",
        snapshot.current_index + 1,
        snapshot.total,
        question.prompt(),
        format_remaining(snapshot.remaining_seconds)
    );
    if question.options().is_empty() {
        println!("    (no options available)");
    }
    let selected = handle.selected(question.id());
    for (index, option) in question.options().iter().enumerate() {
        let mark = if selected.as_deref() == Some(option.as_str()) {
            '*'
        } else {
            ' '
        };
        println!("  {mark} {}. {option}", index + 1);
    }
}

fn show_overview(handle: &SessionHandle) {
    let cells: Vec<String> = handle
        .overview()
        .into_iter()
        .map(|cell| {
            let state = if cell.answered { 'x' } else { ' ' };
            let marker = if cell.current { '>' } else { ' ' };
            format!("{marker}{}[{state}]", cell.index + 1)
        })
        .collect();
    println!("{}", cells.join(" "));
}

fn show_result(result: &SubmissionResult) {
    let verdict = if result.is_passed { "passed" } else { "not passed" };
    println!("Score: {:.1} ({verdict})", result.score);
    if let Some(code) = &result.certificate_code {
        println!("Certificate: {code}");
    }
    if let Some(url) = &result.certificate_url {
        println!("Certificate URL: {url}");
    }
}

fn apply_input(handle: &SessionHandle, input: Input) {
    match input {
        Input::Next => {
            handle.next();
            show_question(handle);
        }
        Input::Previous => {
            handle.previous();
            show_question(handle);
        }
        Input::GoTo(index) => {
            handle.go_to(index);
            show_question(handle);
        }
        Input::Answer(index) => {
            let Some(question) = handle.current_question() else {
                return;
            };
            let Some(option) = question.options().get(index) else {
                println!("No option {} on this question", index + 1);
                return;
            };
            match handle.answer(question.id(), option) {
                Ok(()) => show_question(handle),
                Err(err) => println!("{err}"),
            }
        }
        Input::Clear => {
            let Some(question) = handle.current_question() else {
                return;
            };
            match handle.clear_answer(question.id()) {
                Ok(_) => show_question(handle),
                Err(err) => println!("{err}"),
            }
        }
        Input::Overview => show_overview(handle),
        Input::Submit | Input::Quit => {}
    }
}

// A failed grading is announced once, by the `Failed` event.
fn submit_notice(
    outcome: &Result<Option<SubmissionResult>, RunnerError>,
) -> Option<&'static str> {
    match outcome {
        Ok(None) => Some("Submission already in progress."),
        Ok(Some(_)) | Err(_) => None,
    }
}

/// Run the interactive loop until the session is graded or the candidate quits.
async fn drive(
    handle: &SessionHandle,
    mut events: SessionEvents,
) -> Result<Option<SubmissionResult>, Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return Ok(None);
                };
                match event {
                    SessionEvent::Started { remaining_seconds, .. } => {
                        println!(
                            "{} questions, {} on the clock",
                            handle.questions().len(),
                            format_remaining(remaining_seconds)
                        );
                        show_question(handle);
                    }
                    SessionEvent::Tick { .. } => {}
                    SessionEvent::ThresholdCrossed { seconds } => {
                        println!("!! {} remaining", format_remaining(seconds));
                    }
                    SessionEvent::Expired => println!("Time is up."),
                    SessionEvent::Submitting { answered, .. } => {
                        println!(
                            "Submitting {answered} of {} answers...",
                            handle.questions().len()
                        );
                    }
                    SessionEvent::Submitted(result) => {
                        show_result(&result);
                        return Ok(Some(result));
                    }
                    SessionEvent::Failed { reason } => {
                        println!("Grading failed: {reason}. Type s to retry.");
                    }
                }
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    stdin_open = false;
                    continue;
                };
                match Input::parse(&line) {
                    Some(Input::Quit) => {
                        handle.abandon();
                        return Ok(None);
                    }
                    Some(Input::Submit) => {
                        let outcome = handle.submit().await;
                        if let Some(notice) = submit_notice(&outcome) {
                            println!("{notice}");
                        }
                        match outcome {
                            Ok(Some(result)) => {
                                show_result(&result);
                                return Ok(Some(result));
                            }
                            Ok(None) => {}
                            Err(err) => debug!(error = %err, "manual submit failed"),
                        }
                    }
                    Some(input) => apply_input(handle, input),
                    None => println!("Unknown command"),
                }
            }
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut argv = std::env::args().skip(1);
    let command = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => first,
    };
    let parsed = Args::parse(&command, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut draft = settings_from_env();
    if parsed.api.is_some() {
        draft.api_base_url = parsed.api.clone();
    }
    if parsed.token.is_some() {
        draft.api_token = parsed.token.clone();
    }
    let settings = draft.validate()?;

    let storage = open_storage(&parsed.db_url).await?;
    let clock = Clock::default();
    let client = Arc::new(HttpApiClient::from_settings(&settings)?);
    let runner = SessionRunner::new(clock, client.clone())
        .with_settings(&settings)
        .with_receipts(Arc::clone(&storage.receipts));

    match parsed.target {
        Target::Assessment(assessment_id) => {
            let (handle, events) = runner
                .start_assessment(client.as_ref(), assessment_id)
                .await?;
            drive(&handle, events).await?;
        }
        Target::Preselection { job, candidate } => {
            let gating = GatingService::new(clock, client.clone(), Arc::clone(&storage.gating));
            let (handle, events) = runner
                .start_preselection(&gating, client.as_ref(), job, candidate)
                .await?;
            if let Some(result) = drive(&handle, events).await? {
                let decision = gating
                    .record_submission(
                        job,
                        candidate,
                        handle.questions().passing_threshold(),
                        &result,
                    )
                    .await;
                info!(verdict = decision.verdict.as_str(), "pre-selection recorded");
                if decision.verdict.may_apply() {
                    println!("You may now apply to this job.");
                } else {
                    println!("The application for this job is closed.");
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

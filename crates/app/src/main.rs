use std::fmt;

use assess_core::model::{
    AssessmentDefinition, AssessmentId, Percent, Precision, ScoredResult, UserId,
};
use assess_core::results::{SortConfig, SortDirection, SortKey};
use services::config::DEFAULT_BASE_URL;
use services::{
    ApiConfig, AppServices, Clock, ConfigError, QuizCommand, QuizEvent, QuizSessionService,
    RunOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingAssessmentId,
    UnknownArg(String),
    InvalidAssessmentId { raw: String },
    InvalidUserId { raw: String },
    InvalidSortKey { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingAssessmentId => write!(f, "an assessment id is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidAssessmentId { raw } => write!(f, "invalid assessment id: {raw}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidSortKey { raw } => write!(f, "invalid --sort value: {raw}"),
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
    eprintln!("  learn-quiz take    <assessment-id> [connection flags]");
    eprintln!("  learn-quiz results <assessment-id> [--sort <key>] [--desc] [connection flags]");
    eprintln!();
    eprintln!("Connection flags:");
    eprintln!("  --base-url <url>   default {DEFAULT_BASE_URL}");
    eprintln!("  --token <token>");
    eprintln!("  --user <user-id>");
    eprintln!("  --db <sqlite_url>  keep the submission cache in SQLite (default: in memory)");
    eprintln!();
    eprintln!("Sort keys: name, score, attemptTimestamp");
    eprintln!();
    eprintln!("While taking an assessment:");
    eprintln!("  <question> <option>   select an option (both 1-based)");
    eprintln!("  clear <question>      clear a selection");
    eprintln!("  submit | retry | quit");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_API_BASE_URL, LEARN_API_TOKEN, LEARN_USER_ID, LEARN_API_TIMEOUT_SECS,");
    eprintln!("  LEARN_CACHE_DB, LEARN_LOG");
}

//
// ─── ARGUMENTS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    Results,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "results" => Some(Self::Results),
            _ => None,
        }
    }
}

struct Args {
    assessment_id: AssessmentId,
    db_url: Option<String>,
    base_url: Option<String>,
    token: Option<String>,
    user_id: Option<UserId>,
    sort: SortConfig,
}

impl Args {
    fn parse(
        command: Command,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let mut assessment_id = None;
        let mut db_url = std::env::var("LEARN_CACHE_DB")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(normalize_sqlite_url);
        let mut base_url = None;
        let mut token = None;
        let mut user_id = None;
        let mut sort_key: Option<String> = None;
        let mut descending = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(normalize_sqlite_url(value));
                }
                "--base-url" => base_url = Some(require_value(args, "--base-url")?),
                "--token" => token = Some(require_value(args, "--token")?),
                "--user" => {
                    let value = require_value(args, "--user")?;
                    let parsed = value
                        .parse::<UserId>()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = Some(parsed);
                }
                "--sort" if command == Command::Results => {
                    let value = require_value(args, "--sort")?;
                    if value.parse::<SortKey>().is_err() {
                        return Err(ArgsError::InvalidSortKey { raw: value });
                    }
                    sort_key = Some(value);
                }
                "--desc" if command == Command::Results => descending = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other if !other.starts_with("--") && assessment_id.is_none() => {
                    let parsed = other
                        .parse::<AssessmentId>()
                        .map_err(|_| ArgsError::InvalidAssessmentId { raw: arg.clone() })?;
                    assessment_id = Some(parsed);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let sort = match sort_key {
            Some(key) => {
                let direction = if descending {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                };
                SortConfig::new(key, direction)
            }
            None => SortConfig::default(),
        };

        Ok(Self {
            assessment_id: assessment_id.ok_or(ArgsError::MissingAssessmentId)?,
            db_url,
            base_url,
            token,
            user_id,
            sort,
        })
    }

    /// Environment configuration with command-line flags layered on top.
    fn api_config(&self) -> Result<ApiConfig, ConfigError> {
        let from_env = ApiConfig::from_env_with_token(self.token.as_deref())?;
        Ok(self.layer_flags(from_env))
    }

    fn layer_flags(&self, from_env: ApiConfig) -> ApiConfig {
        let base_url = self.base_url.clone().unwrap_or(from_env.base_url);
        let mut config = ApiConfig::new(base_url, &from_env.token).with_timeout(from_env.timeout);
        if let Some(user_id) = self.user_id.or(from_env.user_id) {
            config = config.with_user(user_id);
        }
        config
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

//
// ─── TAKE ──────────────────────────────────────────────────────────────────────
//

/// Map one line of console input to a session command. Numbers are 1-based.
fn parse_command(line: &str) -> Option<QuizCommand> {
    let mut words = line.split_whitespace();
    let first = words.next()?;
    let command = match first {
        "submit" => QuizCommand::Submit,
        "retry" => QuizCommand::Retry,
        "quit" | "exit" => QuizCommand::Quit,
        "clear" => QuizCommand::Clear {
            question: one_based(words.next()?)?,
        },
        question => QuizCommand::Select {
            question: one_based(question)?,
            option: one_based(words.next()?)?,
        },
    };
    words.next().is_none().then_some(command)
}

fn one_based(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok()?.checked_sub(1)
}

fn print_assessment(definition: &AssessmentDefinition) {
    println!(
        "{} ({} questions, {} min)",
        definition.title(),
        definition.question_count(),
        definition.duration_minutes()
    );
    for (index, question) in definition.questions().iter().enumerate() {
        println!();
        println!("{}. {}", index + 1, question.text());
        for (option, text) in question.options().iter().enumerate() {
            println!("   {}) {text}", option + 1);
        }
    }
    println!();
}

fn print_event(event: &QuizEvent) {
    match event {
        QuizEvent::Tick { remaining_secs } => {
            if remaining_secs % 60 == 0 || *remaining_secs <= 10 {
                println!(
                    "time left {:02}:{:02}",
                    remaining_secs / 60,
                    remaining_secs % 60
                );
            }
        }
        QuizEvent::AnswerRecorded { question, option } => {
            println!("q{} -> {}", question + 1, option + 1);
        }
        QuizEvent::AnswerCleared { question } => println!("q{} cleared", question + 1),
        QuizEvent::Rejected { message } => println!("! {message}"),
        QuizEvent::Submitting { auto: true } => println!("time is up, submitting..."),
        QuizEvent::Submitting { auto: false } => println!("submitting..."),
        QuizEvent::Resumed => println!("resumed"),
        QuizEvent::Completed(_) => println!("submitted"),
        QuizEvent::Failed { message, retryable } => {
            if *retryable {
                println!("! {message} (type `retry`)");
            } else {
                println!("! {message}");
            }
        }
    }
}

async fn take(
    app: &AppServices,
    quiz: &QuizSessionService,
    assessment_id: AssessmentId,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = quiz.start(assessment_id).await?;
    if let Some(definition) = session.definition() {
        print_assessment(definition);
    }

    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, mut event_rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Some(command) => {
                    if command_tx.send(command).await.is_err() {
                        break;
                    }
                }
                None => eprintln!("expected `<question> <option>`, `clear <q>`, submit, retry or quit"),
            }
        }
        debug!("console input closed");
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event);
        }
    });

    let outcome = quiz.run(&mut session, command_rx, event_tx).await;
    printer.await?;

    match outcome {
        RunOutcome::Completed(submitted) => {
            // Read back through the results path; a fresh submission is served from
            // the local cache while the backend catches up.
            let shown = app
                .results()
                .attempt_result(assessment_id, Some(app.user_id()))
                .await
                .unwrap_or(*submitted);
            print_result(&shown);
            Ok(())
        }
        RunOutcome::Failed(err) => Err(err.user_message().into()),
        RunOutcome::Quit => {
            info!(assessment_id = %assessment_id, "session closed before submission");
            Ok(())
        }
    }
}

fn display_percent(percent: Percent) -> String {
    format!("{:.1}%", percent.rounded(Precision::Display))
}

fn print_result(result: &ScoredResult) {
    let details = result.details();
    println!();
    if let Some(title) = &result.context().title {
        println!("{title}");
    }
    println!(
        "score      {}% ({} / {} points)",
        result.score(),
        result.points(),
        result.max_points()
    );
    println!(
        "answered   {} of {}, {} correct",
        result.questions_attempted(),
        result.total_questions(),
        result.correct_answers()
    );
    println!("completion {}", display_percent(details.completion_rate));
    println!("accuracy   {}", display_percent(details.accuracy));
    if let Some(minutes) = result.context().time_taken_minutes {
        println!("time       {minutes} min");
    }
    println!("attempted  {}", result.attempt_date_display());
}

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

async fn results(
    app: &AppServices,
    assessment_id: AssessmentId,
    sort: SortConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut view = app.results().results_for_assessment(assessment_id).await?;
    if view.is_empty() {
        println!("no attempts yet");
        return Ok(());
    }
    view.set_sort(sort);

    println!("{:<24} {:>6} {:>9}  attempted", "name", "score", "correct");
    for result in &view.results {
        println!(
            "{:<24} {:>5}% {:>4}/{:<4}  {}",
            result.user().name,
            result.score(),
            result.correct_answers(),
            result.total_questions(),
            result.attempt_date_display()
        );
    }

    let stats = view.statistics;
    println!();
    println!(
        "attempts {}  average {:.2}%  highest {:.2}%  lowest {:.2}%",
        stats.total_attempts, stats.average, stats.highest, stats.lowest
    );
    Ok(())
}

//
// ─── ENTRY ─────────────────────────────────────────────────────────────────────
//

fn init_tracing() {
    let filter = std::env::var("LEARN_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let mut iter = argv.into_iter().skip(1);
    let parsed = Args::parse(cmd, &mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let config = parsed.api_config()?;
    let clock = Clock::default_clock();
    let app = match &parsed.db_url {
        Some(db_url) => {
            prepare_sqlite_file(db_url)?;
            AppServices::new_sqlite(db_url, config, clock).await?
        }
        None => AppServices::new_in_memory(config, clock)?,
    };

    match cmd {
        Command::Take => take(&app, &app.quiz(), parsed.assessment_id).await,
        Command::Results => results(&app, parsed.assessment_id, parsed.sort).await,
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            2
        }
    };
    // The console reader may still be parked on a blocking stdin read.
    std::process::exit(code);
}

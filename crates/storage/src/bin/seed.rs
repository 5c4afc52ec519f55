use std::fmt;

use chrono::{DateTime, Utc};
use learncheck_core::model::{
    OptionId, Question, QuestionId, QuestionOption, Session, TutorialId, UserId, UserPreferences,
};
use storage::repository::{SessionRecord, SessionStore};
use storage::sqlite::SqliteSessionStore;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: UserId,
    tutorial_id: TutorialId,
    questions: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidQuestions { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidQuestions { raw } => write!(f, "invalid --questions value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LEARNCHECK_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut user_id = UserId::new(
            std::env::var("LEARNCHECK_USER_ID").unwrap_or_else(|_| "demo-user".into()),
        );
        let mut tutorial_id = TutorialId::new(
            std::env::var("LEARNCHECK_TUTORIAL_ID").unwrap_or_else(|_| "demo-tutorial".into()),
        );
        let mut questions = std::env::var("LEARNCHECK_QUESTIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user_id = UserId::new(value);
                }
                "--tutorial" => {
                    let value = require_value(&mut args, "--tutorial")?;
                    tutorial_id = TutorialId::new(value);
                }
                "--questions" => {
                    let value = require_value(&mut args, "--questions")?;
                    questions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidQuestions { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            tutorial_id,
            questions,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --user <id>               User id to seed (default: demo-user)");
    eprintln!("  --tutorial <id>           Tutorial id to seed (default: demo-tutorial)");
    eprintln!("  --questions <n>           Number of sample questions (default: 3)");
    eprintln!("  --now <rfc3339>           Fixed save timestamp for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!(
        "  LEARNCHECK_DB_URL, LEARNCHECK_USER_ID, LEARNCHECK_TUTORIAL_ID, LEARNCHECK_QUESTIONS"
    );
}

fn sample_question(index: u32) -> Question {
    let samples = [
        (
            "Which pragma turns on write-ahead logging?",
            [("journal_mode = WAL", true), ("synchronous = OFF", false)],
            "WAL journals changes before applying them to the main database.",
        ),
        (
            "Which statements are DML?",
            [("INSERT", true), ("CREATE TABLE", false)],
            "Data manipulation statements change rows, not schema.",
        ),
        (
            "What does a primary key guarantee?",
            [("Uniqueness", true), ("Compression", false)],
            "A primary key uniquely identifies each row.",
        ),
    ];
    let (text, options, feedback) = &samples[(index as usize) % samples.len()];

    Question {
        id: QuestionId::new(format!("seed-q{}", index + 1)),
        question: (*text).to_string(),
        options: options
            .iter()
            .enumerate()
            .map(|(i, &(text, is_correct))| QuestionOption {
                id: OptionId::new(format!("seed-q{}-o{}", index + 1, i + 1)),
                text: text.to_string(),
                is_correct,
            })
            .collect(),
        feedback: (*feedback).to_string(),
        hint: None,
        pre_hint: Some("Re-read the section above the quiz.".to_string()),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let store = SqliteSessionStore::open(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let questions = (0..args.questions).map(sample_question).collect();
    let session = Session::new(
        args.user_id.clone(),
        args.tutorial_id.clone(),
        "Seeded demo module",
        "This module was seeded for local development.",
        questions,
        UserPreferences::default(),
    );

    store.write(&SessionRecord::new(session, now)).await?;

    println!(
        "Seeded session for {}:{} with {} questions into {}",
        args.user_id, args.tutorial_id, args.questions, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

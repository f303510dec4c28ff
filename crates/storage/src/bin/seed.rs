use std::fmt;

use chrono::{DateTime, Utc};
use qbank_core::model::{FileType, NewQuestionBank, UserId};
use storage::fixtures::sample_questions;
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    docs_url: String,
    user: String,
    bank_name: String,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid database url: {raw:?}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
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

fn non_blank_url(value: String) -> Result<String, ArgsError> {
    if value.trim().is_empty() {
        return Err(ArgsError::InvalidDbUrl { raw: value });
    }
    Ok(value)
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QBANK_DB_URL").unwrap_or_else(|_| "sqlite://qbank.sqlite3?mode=rwc".into());
        let mut docs_url = std::env::var("QBANK_DOCS_DB_URL")
            .unwrap_or_else(|_| "sqlite://qbank-docs.sqlite3?mode=rwc".into());
        let mut user = std::env::var("QBANK_SEED_USER").unwrap_or_else(|_| "demo-user".into());
        let mut bank_name = "Sample Step 1 Bank".to_owned();
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => db_url = non_blank_url(require_value(&mut args, "--db")?)?,
                "--docs-db" => docs_url = non_blank_url(require_value(&mut args, "--docs-db")?)?,
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidUser { raw: value });
                    }
                    user = value;
                }
                "--bank-name" => bank_name = require_value(&mut args, "--bank-name")?,
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
            docs_url,
            user,
            bank_name,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         Primary database (default: sqlite://qbank.sqlite3)");
    eprintln!("  --docs-db <sqlite_url>    Document database (default: sqlite://qbank-docs.sqlite3)");
    eprintln!("  --user <id>               Owner of the seeded bank (default: demo-user)");
    eprintln!("  --bank-name <name>        Bank name (default: Sample Step 1 Bank)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QBANK_DB_URL, QBANK_DOCS_DB_URL, QBANK_SEED_USER");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url, &args.docs_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let owner = UserId::new(args.user.clone())?;
    let mut bank = storage
        .banks
        .insert_bank(&NewQuestionBank::new(owner, args.bank_name.clone(), FileType::Pdf, now)?)
        .await?;
    bank.start_processing(now)?;

    let mut inserted = 0_u32;
    for draft in sample_questions(bank.id) {
        storage.questions.insert_question(&draft.validate(now)?).await?;
        inserted += 1;
    }

    bank.complete(inserted, now)?;
    storage.banks.update_bank(&bank).await?;

    println!(
        "Seeded bank {} ({}) with {} questions into {}",
        bank.id, bank.name, inserted, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

use std::fmt;

use server::{config::Config, init_tracing, start_server};

#[derive(Debug, Default)]
struct Args {
    port: Option<u16>,
    db_url: Option<String>,
    docs_url: Option<String>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidPort { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidPort { raw } => write!(f, "invalid --port value: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid database url: {raw:?}"),
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
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Args::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--port" => {
                    let value = require_value(&mut args, "--port")?;
                    let port = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidPort { raw: value.clone() })?;
                    parsed.port = Some(port);
                }
                "--db" => parsed.db_url = Some(non_blank_url(require_value(&mut args, "--db")?)?),
                "--docs-db" => {
                    parsed.docs_url = Some(non_blank_url(require_value(&mut args, "--docs-db")?)?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(parsed)
    }

    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(db_url) = self.db_url {
            config.db_url = db_url;
        }
        if let Some(docs_url) = self.docs_url {
            config.docs_db_url = docs_url;
        }
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  qbank [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --port <port>             Listen port (default: 3000)");
    eprintln!("  --db <sqlite_url>         Primary database (default: sqlite://qbank.sqlite3)");
    eprintln!("  --docs-db <sqlite_url>    Document database (default: sqlite://qbank-docs.sqlite3)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QBANK_JWT_SECRET (required), QBANK_PORT, QBANK_DB_URL, QBANK_DOCS_DB_URL,");
    eprintln!("  QBANK_UPLOAD_DIR, QBANK_MAX_UPLOAD_BYTES, QBANK_ENV, QBANK_CORS_ORIGIN, RUST_LOG");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();
    let mut config = Config::load()?;
    args.apply(&mut config);
    tracing::debug!(?config, "configuration loaded");

    start_server(config).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

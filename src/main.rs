//! CLI for tei-csl - Extract CSL-JSON records from TEI-XML documents.

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tei_csl::{parse_tei, server, ServiceError, Settings, TeiParseRequest};
use tei_csl::{config::ConfigError, Extractor};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Extract CSL-JSON citation records from TEI-XML documents
#[derive(Parser)]
#[command(name = "tei-csl")]
#[command(version)]
#[command(after_help = "\
Examples:
  tei-csl extract paper.tei.xml
  tei-csl extract paper.tei.xml --compact -o paper.json
  curl -s http://grobid:8070/api/processFulltextDocument -F input=@paper.pdf | tei-csl extract -
  tei-csl serve --port 8000")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the document record, abstract and citations from a TEI file
    #[command(after_help = "\
Output is a JSON object with the fields csl_json, abstract and citations.")]
    Extract {
        /// Input TEI-XML file (use '-' for stdin)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write single-line JSON instead of pretty-printed JSON
        #[arg(long)]
        compact: bool,
    },

    /// Serve the extractor over HTTP
    Serve {
        /// TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Interface to bind (overrides the settings file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the settings file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Allowed CORS origin (overrides the settings file)
        #[arg(long)]
        cors_origin: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// AppError: semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10: input file not found / unreadable
    InputFile(String),
    /// Exit 11: input is not well-formed XML
    InvalidTei(String),
    /// Exit 12: query construct not supported by the engine
    Query(String),
    /// Exit 13: settings file unreadable or invalid
    Config(String),
    /// Exit 14: server failed to start or stopped with an error
    Server(String),
    /// Exit 15: cannot write output file
    OutputFile(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::InputFile(_) => 10,
            AppError::InvalidTei(_) => 11,
            AppError::Query(_) => 12,
            AppError::Config(_) => 13,
            AppError::Server(_) => 14,
            AppError::OutputFile(_) => 15,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputFile(msg) => {
                write!(f, "{}\n  hint: verify the file path is correct", msg)
            }
            AppError::InvalidTei(msg) => {
                write!(
                    f,
                    "{}\n  hint: the input must be a well-formed TEI-XML document, e.g. GROBID output",
                    msg
                )
            }
            AppError::Query(msg) => write!(f, "{}", msg),
            AppError::Config(msg) => {
                write!(
                    f,
                    "{}\n  hint: settings are TOML with the keys host, port, cors_origin, max_body_bytes",
                    msg
                )
            }
            AppError::Server(msg) => write!(f, "{}", msg),
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::InvalidXml(_) => AppError::InvalidTei(e.to_string()),
            ServiceError::UnsupportedQuery(_) | ServiceError::Query(_) => {
                AppError::Query(e.to_string())
            }
            ServiceError::Internal(_) => AppError::Server(e.to_string()),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tei_csl=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            input,
            output,
            compact,
        } => {
            extract_command(&input, output.as_deref(), compact)?;
        }
        Commands::Serve {
            config,
            host,
            port,
            cors_origin,
        } => {
            let mut settings = match config {
                Some(path) => Settings::load(&path)?,
                None => Settings::default(),
            };
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(origin) = cors_origin {
                settings.cors_origin = origin;
            }
            serve_command(settings)?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Extract records from a TEI file and write them as JSON.
fn extract_command(input: &Path, output: Option<&Path>, compact: bool) -> Result<(), AppError> {
    // 1. Read the TEI document (support '-' for stdin)
    let tei_xml = if input == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| AppError::InputFile(format!("failed to read from stdin: {}", e)))?;
        buf
    } else {
        fs::read_to_string(input)
            .map_err(|e| AppError::InputFile(format!("'{}': {}", input.display(), e)))?
    };

    // 2. Extract
    let response = parse_tei(&Extractor::new(), &TeiParseRequest { tei_xml })?;
    debug!(citations = response.citations.len(), "extraction finished");

    // 3. Serialize
    let json = if compact {
        serde_json::to_string(&response)
    } else {
        serde_json::to_string_pretty(&response)
    }
    .map_err(|e| AppError::OutputFile(format!("failed to serialize result: {}", e)))?;

    // 4. Write to file or stdout
    if let Some(output_path) = output {
        fs::write(output_path, format!("{}\n", json)).map_err(|e| {
            AppError::OutputFile(format!("'{}': {}", output_path.display(), e))
        })?;
        eprintln!(
            "extracted {} citation(s), wrote {}",
            response.citations.len(),
            output_path.display()
        );
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", json)
            .map_err(|e| AppError::OutputFile(format!("stdout: {}", e)))?;
    }

    Ok(())
}

/// Run the HTTP server on a multi-threaded runtime.
fn serve_command(settings: Settings) -> Result<(), AppError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::Server(format!("failed to start runtime: {}", e)))?;

    runtime.block_on(server::run(settings)).map_err(|e| match e {
        server::ServerError::Config(e) => AppError::from(e),
        other => AppError::Server(other.to_string()),
    })
}

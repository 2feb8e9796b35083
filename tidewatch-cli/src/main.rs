//! Tidewatch CLI
//!
//! Maritime situation report extraction and live contact serving.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tidewatch_core::{render_structured_report, Contact, ContactAssembler, VesselVocabulary};
use tidewatch_intake::{create_ocr, OcrConfig, PushClient, PushConfig, ReportSource, SharedOcr};
use tidewatch_rag::{RetrievalConfig, RetrievedDocument, Retriever, SharedRetriever};
use tidewatch_runtime::{serve, DistributionHub, IngestService, ServerConfig};
use tidewatch_store::{MemoryContactStore, SharedStore, SqliteContactStore};

#[derive(Parser)]
#[command(name = "tidewatch")]
#[command(author, version, about = "Tidewatch: maritime contact extraction and distribution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the processing API and live contact stream
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:8000", env = "TIDEWATCH_BIND")]
        bind: String,

        /// Contact database URL
        #[arg(long, default_value = "sqlite://maritime.db", env = "TIDEWATCH_DATABASE_URL")]
        database: String,

        /// Keep contacts in memory instead of a database
        #[arg(long)]
        memory: bool,

        /// Seconds between latest-contact pushes on each live connection
        #[arg(long, default_value = "5")]
        poll_secs: u64,

        /// Allowed CORS origin (repeatable; default allows any)
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,

        /// Vessel vocabulary TOML file (default: built-in table)
        #[arg(long, env = "TIDEWATCH_VOCABULARY")]
        vocabulary: Option<PathBuf>,

        #[command(flatten)]
        ocr: OcrArgs,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Extract contacts from a report file, image or inline text
    Extract {
        /// Report path or literal report text
        input: String,

        /// Vessel vocabulary TOML file (default: built-in table)
        #[arg(long, env = "TIDEWATCH_VOCABULARY")]
        vocabulary: Option<PathBuf>,

        #[command(flatten)]
        ocr: OcrArgs,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Extract locally and upload the contacts to a server
    Push {
        /// Report path or literal report text
        input: String,

        /// Server base URL
        #[arg(short, long, default_value = "http://localhost:8000", env = "TIDEWATCH_SERVER")]
        server: String,

        /// Vessel vocabulary TOML file (default: built-in table)
        #[arg(long, env = "TIDEWATCH_VOCABULARY")]
        vocabulary: Option<PathBuf>,

        #[command(flatten)]
        ocr: OcrArgs,
    },

    /// Check a server's health
    Status {
        /// Server base URL
        #[arg(short, long, default_value = "http://localhost:8000", env = "TIDEWATCH_SERVER")]
        server: String,
    },
}

#[derive(Args)]
struct OcrArgs {
    /// OCR executable
    #[arg(long, default_value = "tesseract", env = "TIDEWATCH_OCR_COMMAND")]
    ocr_command: String,

    /// OCR language pack
    #[arg(long)]
    ocr_lang: Option<String>,
}

impl OcrArgs {
    fn engine(&self) -> SharedOcr {
        create_ocr(OcrConfig {
            command: self.ocr_command.clone(),
            language: self.ocr_lang.clone(),
            ..Default::default()
        })
    }
}

#[derive(Args)]
struct RetrievalArgs {
    /// Retrieval index directory (enables related-document lookup)
    #[arg(long, env = "TIDEWATCH_RAG_DIR")]
    rag_dir: Option<PathBuf>,

    /// OpenAI-compatible embeddings endpoint
    #[arg(long, env = "TIDEWATCH_EMBEDDING_URL")]
    embedding_url: Option<String>,

    /// Embedding model (default: the one the index was built with)
    #[arg(long, env = "TIDEWATCH_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Embedding API key
    #[arg(long, env = "TIDEWATCH_EMBEDDING_KEY")]
    embedding_key: Option<String>,

    /// Related documents per report
    #[arg(long, default_value = "3")]
    top_k: usize,

    /// Retrieval timeout in seconds
    #[arg(long, default_value = "3")]
    retrieval_timeout: u64,
}

impl RetrievalArgs {
    /// Load the retriever when an index directory is configured
    fn load(&self) -> Result<Option<SharedRetriever>> {
        let Some(dir) = &self.rag_dir else {
            return Ok(None);
        };

        let defaults = RetrievalConfig::default();
        let config = RetrievalConfig {
            artifact_dir: dir.clone(),
            embedding_url: self.embedding_url.clone(),
            embedding_model: self.embedding_model.clone(),
            api_key: self.embedding_key.clone().unwrap_or(defaults.api_key),
            top_k: self.top_k,
            timeout_secs: self.retrieval_timeout,
        };

        let retriever = Retriever::from_config(&config)
            .with_context(|| format!("Failed to load retrieval index from {}", dir.display()))?;
        Ok(Some(Arc::new(retriever)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve {
            bind,
            database,
            memory,
            poll_secs,
            cors_origins,
            vocabulary,
            ocr,
            retrieval,
        } => {
            let config = ServerConfig {
                bind,
                poll_secs,
                cors_origins,
                ..Default::default()
            };
            run_serve(config, &database, memory, vocabulary, ocr, retrieval).await?;
        }
        Commands::Extract {
            input,
            vocabulary,
            ocr,
            retrieval,
        } => {
            run_extract(&input, vocabulary, ocr, retrieval).await?;
        }
        Commands::Push {
            input,
            server,
            vocabulary,
            ocr,
        } => {
            run_push(&input, &server, vocabulary, ocr).await?;
        }
        Commands::Status { server } => {
            check_status(&server).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    if std::env::var_os("RUST_LOG").is_some() {
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(false)
            .compact()
            .init();
        return;
    }

    let log_level = match verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}

fn load_assembler(vocabulary: Option<PathBuf>) -> Result<ContactAssembler> {
    match vocabulary {
        Some(path) => {
            let vocabulary = VesselVocabulary::load_from_file(&path)
                .with_context(|| format!("Failed to load vocabulary {}", path.display()))?;
            Ok(ContactAssembler::new(vocabulary))
        }
        None => Ok(ContactAssembler::default()),
    }
}

async fn load_report(input: &str, ocr: &OcrArgs) -> Result<(ReportSource, String)> {
    let source = ReportSource::from_input(input);
    let engine = ocr.engine();
    let text = source
        .load(engine.as_ref())
        .await
        .with_context(|| format!("Failed to load report {}", source.label()))?;
    Ok((source, text))
}

async fn run_serve(
    config: ServerConfig,
    database: &str,
    memory: bool,
    vocabulary: Option<PathBuf>,
    ocr: OcrArgs,
    retrieval: RetrievalArgs,
) -> Result<()> {
    println!("🌊 Tidewatch - Maritime Contact Server\n");

    let store: SharedStore = if memory {
        println!("🗄️  Store: in-memory");
        Arc::new(MemoryContactStore::new())
    } else {
        println!("🗄️  Store: {}", database);
        Arc::new(
            SqliteContactStore::connect(database)
                .await
                .with_context(|| format!("Failed to open database {}", database))?,
        )
    };

    let assembler = load_assembler(vocabulary)?;
    println!("🚢 Vocabulary: {} phrases", assembler.vocabulary().len());

    let mut ingest = IngestService::new(
        assembler,
        store,
        Arc::new(DistributionHub::new()),
        ocr.engine(),
    );

    if let Some(retriever) = retrieval.load()? {
        println!(
            "📚 Retrieval: {} documents, top {}",
            retriever.document_count(),
            retriever.top_k()
        );
        ingest = ingest.with_retriever(retriever);
    }

    println!("📡 Listening on {} (poll every {}s)\n", config.bind, config.poll_secs);
    serve(Arc::new(ingest), config).await
}

async fn run_extract(
    input: &str,
    vocabulary: Option<PathBuf>,
    ocr: OcrArgs,
    retrieval: RetrievalArgs,
) -> Result<()> {
    let assembler = load_assembler(vocabulary)?;
    let retriever = retrieval.load()?;
    let (source, text) = load_report(input, &ocr).await?;

    let contacts = assembler.extract_report(&text);
    for contact in &contacts {
        println!("{}", serde_json::to_string_pretty(contact)?);
    }

    print_summary(&source, &contacts);

    if let Some(retriever) = retriever {
        print_related(&retriever.related(&text).await);
    }

    Ok(())
}

fn print_summary(source: &ReportSource, contacts: &[Contact]) {
    println!("\n{}", "=".repeat(60));
    println!("📄 Source: {}", source.label());
    println!("🚢 Total contacts: {}", contacts.len());

    if contacts.is_empty() {
        return;
    }

    let average = contacts.iter().map(|c| c.confidence).sum::<f64>() / contacts.len() as f64;
    let positioned = contacts.iter().filter(|c| c.is_valid()).count();
    println!("📍 With position: {}", positioned);
    println!("📊 Average confidence: {:.2}", average);
}

fn print_related(documents: &[RetrievedDocument]) {
    if documents.is_empty() {
        println!("\n📚 No related documents");
        return;
    }

    println!("\n📚 Related documents:");
    for doc in documents {
        let preview: String = doc.text.chars().take(200).collect();
        println!("   {}. (distance {:.4}) {}", doc.rank, doc.distance, preview);
        if !doc.metadata.is_empty() {
            println!("      {}", serde_json::Value::Object(doc.metadata.clone()));
        }
    }
}

async fn run_push(
    input: &str,
    server: &str,
    vocabulary: Option<PathBuf>,
    ocr: OcrArgs,
) -> Result<()> {
    let assembler = load_assembler(vocabulary)?;
    let (source, text) = load_report(input, &ocr).await?;

    let contacts = assembler.extract_report(&text);
    println!("🚢 Extracted {} contacts from {}", contacts.len(), source.label());

    let report = render_structured_report(&format!("Contacts from {}", source.label()), &contacts);

    let client = PushClient::new(&PushConfig {
        server_url: server.to_string(),
        ..Default::default()
    })?;

    let reply = client
        .upload_report("structured_report.md", report)
        .await
        .with_context(|| format!("Upload to {} failed", client.base_url()))?;

    println!("✅ Server reply:\n{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

async fn check_status(server: &str) -> Result<()> {
    println!("🔌 Checking {}...\n", server);

    let client = PushClient::new(&PushConfig {
        server_url: server.to_string(),
        ..Default::default()
    })?;

    match client.health().await {
        Ok(health) => {
            let healthy = health["status"] == "healthy";
            if healthy {
                println!("✅ Server is healthy");
            } else {
                println!("❌ Server reports a problem");
            }
            println!("{}", serde_json::to_string_pretty(&health)?);
            if !healthy {
                anyhow::bail!("server unhealthy");
            }
        }
        Err(e) => {
            println!("❌ Server not reachable: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}

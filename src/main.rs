// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::*;
use ragforsql::utils::logging::{
    format_error, format_heading, format_info, format_step, format_success, format_warning,
};
use ragforsql::utils::telemetry::{check_lancedb, check_llm, check_source_file};
use ragforsql::utils::validation::{PDF_EXTENSIONS, SQLITE_EXTENSIONS};
use ragforsql::{
    Answer, Config, HealthReport, JsonExporter, LanceDbClient, OperationTimer, PdfLoader,
    ProgressDisplay, QueryMode, RagError, RagSession, SchemaManager, SourceKind, SourceResolver,
    SourceSelection, SqlDatabaseReader,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "ragforsql")]
#[command(version)]
#[command(about = "Ask questions over a PDF and a SQLite database with LanceDB vector indexes", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "RAGFORSQL_CONFIG",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct SourceArgs {
    /// Use the preloaded sample PDF and database (default)
    #[arg(long, conflicts_with_all = ["pdf", "db"])]
    sample: bool,

    /// PDF file to upload
    #[arg(long, value_name = "FILE", requires = "db")]
    pdf: Option<PathBuf>,

    /// SQLite database to upload
    #[arg(long, value_name = "FILE", requires = "pdf")]
    db: Option<PathBuf>,
}

impl SourceArgs {
    fn selection(&self) -> SourceSelection {
        match (&self.pdf, &self.db) {
            (Some(pdf), Some(db)) if !self.sample => SourceSelection::Upload {
                pdf: pdf.clone(),
                db: db.clone(),
            },
            _ => SourceSelection::Sample,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download the sample PDF and SQLite database if missing
    Fetch,

    /// Load both sources and build the PDF and SQL indexes
    Index {
        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Ask one question against the built indexes
    Ask {
        question: String,

        #[arg(short, long, default_value_t = QueryMode::Both)]
        mode: QueryMode,

        #[arg(long)]
        show_sources: bool,
    },

    /// Interactive question loop; `exit` or `quit` ends it
    Chat {
        #[arg(short, long, default_value_t = QueryMode::Both)]
        mode: QueryMode,

        #[arg(long)]
        show_sources: bool,
    },

    /// Show PDF pages and database tables without indexing
    Preview {
        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Node counts per index
    Stats,

    Reset {
        #[arg(long)]
        confirm: bool,
    },

    Export {
        #[arg(short, long, default_value = "./exports")]
        output: PathBuf,

        #[arg(short, long)]
        pretty: bool,

        /// Export a single index (pdf or sql)
        #[arg(long)]
        index: Option<SourceKind>,
    },

    /// Health report for LanceDB, the LLM settings and the sample files
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    colored::control::set_override(cli.color);
    ragforsql::utils::logging::init_logger(cli.color, cli.verbose);

    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    match cli.command {
        Commands::Fetch => {
            cmd_fetch(&config).await?;
        }
        Commands::Index { sources } => {
            cmd_index(&config, &sources.selection(), cli.color).await?;
        }
        Commands::Ask {
            question,
            mode,
            show_sources,
        } => {
            cmd_ask(&config, &question, mode, show_sources).await?;
        }
        Commands::Chat { mode, show_sources } => {
            cmd_chat(&config, mode, show_sources).await?;
        }
        Commands::Preview { sources } => {
            cmd_preview(&config, &sources.selection()).await?;
        }
        Commands::Stats => {
            cmd_stats(&config).await?;
        }
        Commands::Reset { confirm } => {
            cmd_reset(&config, confirm).await?;
        }
        Commands::Export {
            output,
            pretty,
            index,
        } => {
            cmd_export(&config, output, pretty, index).await?;
        }
        Commands::Verify => {
            cmd_verify(&config).await?;
        }
    }

    Ok(())
}

async fn cmd_fetch(config: &Config) -> Result<()> {
    let paths = SourceResolver::new(config.clone())
        .fetch_samples()
        .await
        .context("Failed to download sample files")?;

    println!("{}", format_success(&format!("Sample PDF: {}", paths.pdf.display())));
    println!("{}", format_success(&format!("Sample DB: {}", paths.db.display())));
    Ok(())
}

async fn cmd_index(config: &Config, selection: &SourceSelection, color: bool) -> Result<()> {
    let timer = OperationTimer::new("index");

    println!("{}", format_step(1, 3, "Resolving source files"));
    let paths = SourceResolver::new(config.clone())
        .resolve(selection)
        .await
        .context("Failed to resolve source files")?;

    println!("{}", format_step(2, 3, "Connecting to LanceDB"));
    let mut session = RagSession::new(config.clone())
        .await
        .context("Failed to start session")?
        .with_progress(ProgressDisplay::from_flags(true, color));

    println!("{}", format_step(3, 3, "Building PDF and SQL indexes"));
    let report = session
        .index(&paths)
        .await
        .context("Failed to build indexes")?;

    println!();
    println!("{}", format_heading("Indexed sources"));
    println!("  PDF: {} ({} pages)", report.pdf_path.display(), report.pdf_pages);
    println!("  DB:  {} ({} tables)", report.db_path.display(), report.tables.len());
    for table in &report.tables {
        println!("    - {} ({} rows)", table.name, table.row_count);
    }
    println!(
        "{}",
        format_success(&format!(
            "{} PDF nodes and {} SQL nodes indexed ({:.1} nodes/sec)",
            report.pdf_nodes,
            report.sql_nodes,
            report.stats.nodes_per_second()
        ))
    );

    timer.finish();
    Ok(())
}

async fn open_session(config: &Config) -> Result<RagSession> {
    let mut session = RagSession::new(config.clone())
        .await
        .context("Failed to start session")?;

    if !session.restore().await.context("Failed to reopen indexes")? {
        warn!("One or both indexes are missing; run `index` first");
    }

    Ok(session)
}

async fn cmd_ask(config: &Config, question: &str, mode: QueryMode, show_sources: bool) -> Result<()> {
    let session = open_session(config).await?;

    match answer_question(&session, question, mode, show_sources).await {
        Err(e) if is_user_error(&e) => {
            println!("{}", format_warning(&e.to_string()));
            Ok(())
        }
        other => other.map_err(anyhow::Error::from),
    }
}

async fn cmd_chat(config: &Config, mode: QueryMode, show_sources: bool) -> Result<()> {
    let session = open_session(config).await?;

    println!("{}", format_heading("RAG over your PDF and SQL database"));
    println!(
        "{}",
        format_info(&format!("Mode: {}. Type `exit` or `quit` to leave.", mode))
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if matches!(question.to_ascii_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        if let Err(e) = answer_question(&session, question, mode, show_sources).await {
            if is_user_error(&e) {
                println!("{}", format_warning(&e.to_string()));
            } else {
                error!("Question failed: {}", e);
                println!("{}", format_error(&e.to_string()));
            }
        }
    }

    println!("{}", format_info("Bye"));
    Ok(())
}

async fn answer_question(
    session: &RagSession,
    question: &str,
    mode: QueryMode,
    show_sources: bool,
) -> std::result::Result<(), RagError> {
    let timer = OperationTimer::new("ask");
    let answer = session.ask(question, mode).await?;
    timer.warn_if_slow(Duration::from_secs(30), "answering");

    println!("\n{}", answer.render());

    if show_sources {
        print_sources(&answer);
    }

    Ok(())
}

fn print_sources(answer: &Answer) {
    println!("\n{}", "Sources".bold());
    for response in answer.responses() {
        for (idx, node) in response.source_nodes.iter().enumerate() {
            println!(
                "  {}. [{} | {}] score {:.4}",
                idx + 1,
                response.source,
                node.location(),
                node.score
            );
            println!("     {}", node.format_summary(200).dimmed());
        }
    }
}

/// Errors the user can fix by indexing or rephrasing; shown as warnings.
fn is_user_error(e: &RagError) -> bool {
    matches!(e, RagError::IndexNotBuilt(_) | RagError::Validation(_))
}

async fn cmd_preview(config: &Config, selection: &SourceSelection) -> Result<()> {
    let paths = SourceResolver::new(config.clone())
        .resolve(selection)
        .await
        .context("Failed to resolve source files")?;

    let pages = PdfLoader::new()
        .page_count(&paths.pdf)
        .context("Failed to read PDF")?;

    let reader = SqlDatabaseReader::open(&paths.db, config.index.max_rows_per_table)
        .context("Failed to open SQLite database")?;
    let tables = reader.preview()?;

    println!("{}", format_heading("PDF"));
    println!("  {} ({} pages)", paths.pdf.display(), pages);

    println!("{}", format_heading("SQLite database"));
    println!("  {}", paths.db.display());
    if tables.is_empty() {
        println!("{}", format_warning("No tables found"));
    }
    for table in &tables {
        println!("  {}", table.describe());
    }

    Ok(())
}

async fn connect(config: &Config) -> Result<LanceDbClient> {
    let client = LanceDbClient::new(config.database.clone())
        .await
        .context("Failed to create LanceDB client")?;

    if !client.ping().await? {
        error!("Cannot connect to LanceDB");
        return Err(anyhow::anyhow!("Database connection failed"));
    }

    Ok(client)
}

async fn cmd_stats(config: &Config) -> Result<()> {
    info!("Gathering statistics");
    let client = connect(config).await?;

    println!("{}", format_heading("Index statistics"));
    for source in [SourceKind::Pdf, SourceKind::Sql] {
        let table = client.table_for(source);
        if client.table_exists(table).await? {
            let count = client.count_rows(table).await?;
            println!("  {} ({}): {} nodes", source, table, count);
        } else {
            println!("  {} ({}): {}", source, table, "not built".yellow());
        }
    }

    if !SchemaManager::new(&client).verify_schema().await? {
        println!("{}", format_warning("Run `index` to build the missing indexes"));
    }

    Ok(())
}

async fn cmd_reset(config: &Config, confirm: bool) -> Result<()> {
    if !confirm {
        error!("This will delete both indexes. Use --confirm to proceed");
        return Ok(());
    }

    warn!("Resetting indexes - all indexed nodes will be lost");

    let client = connect(config).await?;
    SchemaManager::new(&client)
        .drop_all_tables()
        .await
        .context("Failed to drop tables")?;

    println!("{}", format_success("Indexes deleted"));
    Ok(())
}

async fn cmd_export(
    config: &Config,
    output: PathBuf,
    pretty: bool,
    index: Option<SourceKind>,
) -> Result<()> {
    info!("Initializing JSON export");

    let client = connect(config).await?;
    let exporter = JsonExporter::new(output)?;

    let manifest = match index {
        Some(source) => {
            exporter
                .export_index(&client, client.table_for(source), pretty)
                .await?
        }
        None => exporter.export_all(&client, pretty).await?,
    };

    println!(
        "{}",
        format_success(&format!(
            "Exported {} nodes to {} ({} files)",
            manifest.total_nodes,
            exporter.output_dir().display(),
            manifest.tables.len()
        ))
    );
    Ok(())
}

async fn cmd_verify(config: &Config) -> Result<()> {
    info!("Running health checks");

    let mut checks = Vec::new();

    let client = LanceDbClient::new(config.database.clone())
        .await
        .context("Failed to create LanceDB client")?;
    checks.push(check_lancedb(&client).await);
    checks.push(check_llm(&config.llm));
    checks.push(check_source_file(
        "sample_pdf",
        &config.sample_pdf_path(),
        PDF_EXTENSIONS,
    ));
    checks.push(check_source_file(
        "sample_db",
        &config.sample_db_path(),
        SQLITE_EXTENSIONS,
    ));

    let report = HealthReport::new(checks, env!("CARGO_PKG_VERSION").to_string());
    println!("{}", report.format());

    if !report.is_healthy() {
        return Err(anyhow::anyhow!("Health check failed"));
    }

    Ok(())
}

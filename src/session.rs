// file: src/session.rs
// description: interactive session holding the pdf and sql indexes between questions
// reference: application orchestration

use crate::config::Config;
use crate::database::{LanceDbClient, SchemaManager};
use crate::error::{RagError, Result};
use crate::index::{
    QueryEngine, QueryEngineTool, Response, RoutedResponse, RouterQueryEngine, Selection,
    VectorStoreIndex,
};
use crate::llm::{CompletionClient, EmbeddingClient};
use crate::loader::{PdfLoader, SqlDatabaseReader, TableSummary, TextChunker};
use crate::models::{Document, Node, SourceKind};
use crate::pipeline::{PipelineStats, ProgressDisplay, ProgressTracker};
use crate::sources::SourcePaths;
use crate::utils::Validator;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::sync::OnceCell;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Ask both indexes and show the answers side by side.
    #[default]
    Both,
    Pdf,
    Sql,
    /// Let the router pick one index.
    Auto,
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "both" => Ok(QueryMode::Both),
            "pdf" => Ok(QueryMode::Pdf),
            "sql" | "db" => Ok(QueryMode::Sql),
            "auto" | "route" => Ok(QueryMode::Auto),
            other => Err(format!(
                "unknown mode '{}', expected one of: both, pdf, sql, auto",
                other
            )),
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryMode::Both => "both",
            QueryMode::Pdf => "pdf",
            QueryMode::Sql => "sql",
            QueryMode::Auto => "auto",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum Answer {
    Combined { pdf: Response, sql: Response },
    Single(Response),
    Routed(RoutedResponse),
}

impl Answer {
    pub fn render(&self) -> String {
        match self {
            Answer::Combined { pdf, sql } => {
                format!("📄 **From PDF**: {}\n\n🗄️ **From SQL DB**: {}", pdf, sql)
            }
            Answer::Single(response) => response.to_string(),
            Answer::Routed(RoutedResponse {
                response,
                selection,
            }) => format!(
                "{}\n\n(answered from the {} index: {})",
                response, selection.tool, selection.reason
            ),
        }
    }

    pub fn responses(&self) -> Vec<&Response> {
        match self {
            Answer::Combined { pdf, sql } => vec![pdf, sql],
            Answer::Single(response) => vec![response],
            Answer::Routed(routed) => vec![&routed.response],
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            Answer::Routed(routed) => Some(&routed.selection),
            _ => None,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub pdf_path: PathBuf,
    pub db_path: PathBuf,
    pub pdf_pages: usize,
    pub tables: Vec<TableSummary>,
    pub pdf_nodes: u64,
    pub sql_nodes: u64,
    #[serde(skip)]
    pub stats: PipelineStats,
}

pub struct RagSession {
    config: Config,
    client: LanceDbClient,
    embedder: EmbeddingClient,
    llm: CompletionClient,
    pdf_index: Option<VectorStoreIndex>,
    sql_index: Option<VectorStoreIndex>,
    /// Built on the first routed question and cleared whenever the indexes change.
    router: OnceCell<RouterQueryEngine>,
    progress: ProgressDisplay,
}

impl RagSession {
    pub async fn new(config: Config) -> Result<Self> {
        let client = LanceDbClient::new(config.database.clone()).await?;
        let embedder = EmbeddingClient::new(&config.llm)?;
        let llm = CompletionClient::new(&config.llm)?;

        Ok(Self::with_clients(config, client, embedder, llm))
    }

    pub fn with_clients(
        config: Config,
        client: LanceDbClient,
        embedder: EmbeddingClient,
        llm: CompletionClient,
    ) -> Self {
        Self {
            config,
            client,
            embedder,
            llm,
            pdf_index: None,
            sql_index: None,
            router: OnceCell::new(),
            progress: ProgressDisplay::Hidden,
        }
    }

    pub fn with_progress(mut self, progress: ProgressDisplay) -> Self {
        self.progress = progress;
        self
    }

    pub fn client(&self) -> &LanceDbClient {
        &self.client
    }

    pub fn is_indexed(&self) -> bool {
        self.pdf_index.is_some() && self.sql_index.is_some()
    }

    /// Reopens indexes persisted by an earlier run. Returns whether both exist.
    pub async fn restore(&mut self) -> Result<bool> {
        self.router = OnceCell::new();
        self.pdf_index = VectorStoreIndex::open(&self.client, &self.embedder, SourceKind::Pdf).await?;
        self.sql_index = VectorStoreIndex::open(&self.client, &self.embedder, SourceKind::Sql).await?;
        Ok(self.is_indexed())
    }

    /// Loads both sources and rebuilds both indexes.
    ///
    /// Sources that yield no nodes are rejected before anything is touched,
    /// leaving the previous indexes in place. Once rebuilding starts both
    /// tables are dropped, so a failure part way leaves no index at all.
    pub async fn index(&mut self, paths: &SourcePaths) -> Result<IndexReport> {
        paths.validate()?;

        let (pdf_documents, sql_documents, tables) = self.load_sources(paths)?;
        let pdf_pages = pdf_documents.len();

        let chunker = TextChunker::from_config(&self.config.index);
        let pdf_nodes = chunker.split_documents(&pdf_documents);
        let sql_nodes = chunker.split_documents(&sql_documents);

        if pdf_nodes.is_empty() {
            return Err(RagError::Validation(format!(
                "No extractable text in {}",
                paths.pdf.display()
            )));
        }
        if sql_nodes.is_empty() {
            return Err(RagError::Validation(format!(
                "No user tables in {}",
                paths.db.display()
            )));
        }

        let total_nodes = pdf_nodes.len() + sql_nodes.len();
        let progress = ProgressTracker::with_display("indexing", total_nodes, self.progress);
        progress.add_documents(pdf_documents.len() + sql_documents.len());

        self.pdf_index = None;
        self.sql_index = None;
        self.router = OnceCell::new();
        SchemaManager::new(&self.client).drop_all_tables().await?;

        let built = self.build_indexes(&pdf_nodes, &sql_nodes, &progress).await;
        let (pdf_index, sql_index) = match built {
            Ok(indexes) => indexes,
            Err(e) => {
                if let Err(cleanup) = SchemaManager::new(&self.client).drop_all_tables().await {
                    warn!("Could not drop partial index tables: {}", cleanup);
                }
                return Err(e);
            }
        };
        progress.finish();

        self.pdf_index = Some(pdf_index);
        self.sql_index = Some(sql_index);

        Ok(IndexReport {
            pdf_path: paths.pdf.clone(),
            db_path: paths.db.clone(),
            pdf_pages,
            tables,
            pdf_nodes: pdf_nodes.len() as u64,
            sql_nodes: sql_nodes.len() as u64,
            stats: progress.get_stats(),
        })
    }

    async fn build_indexes(
        &self,
        pdf_nodes: &[Node],
        sql_nodes: &[Node],
        progress: &ProgressTracker,
    ) -> Result<(VectorStoreIndex, VectorStoreIndex)> {
        let pdf_index = VectorStoreIndex::from_nodes(
            &self.client,
            &self.embedder,
            SourceKind::Pdf,
            pdf_nodes,
            Some(progress),
        )
        .await?;
        let sql_index = VectorStoreIndex::from_nodes(
            &self.client,
            &self.embedder,
            SourceKind::Sql,
            sql_nodes,
            Some(progress),
        )
        .await?;

        Ok((pdf_index, sql_index))
    }

    fn load_sources(
        &self,
        paths: &SourcePaths,
    ) -> Result<(Vec<Document>, Vec<Document>, Vec<TableSummary>)> {
        let pdf_documents = PdfLoader::new().load(&paths.pdf)?;

        let reader = SqlDatabaseReader::open(&paths.db, self.config.index.max_rows_per_table)?;
        let tables = reader.preview()?;
        let sql_documents = reader.load_data()?;

        info!(
            "Loaded {} PDF pages and {} SQL documents from {} tables",
            pdf_documents.len(),
            sql_documents.len(),
            tables.len()
        );
        Ok((pdf_documents, sql_documents, tables))
    }

    pub async fn ask(&self, question: &str, mode: QueryMode) -> Result<Answer> {
        Validator::validate_question(question)?;
        let top_k = self.config.index.similarity_top_k;

        match mode {
            QueryMode::Both => {
                let pdf = self.engine(SourceKind::Pdf)?;
                let sql = self.engine(SourceKind::Sql)?;
                Ok(Answer::Combined {
                    pdf: pdf.query(question).await?,
                    sql: sql.query(question).await?,
                })
            }
            QueryMode::Pdf => Ok(Answer::Single(self.engine(SourceKind::Pdf)?.query(question).await?)),
            QueryMode::Sql => Ok(Answer::Single(self.engine(SourceKind::Sql)?.query(question).await?)),
            QueryMode::Auto => {
                let router = self.router.get_or_try_init(|| self.build_router(top_k)).await?;
                Ok(Answer::Routed(router.query(question).await?))
            }
        }
    }

    async fn build_router(&self, top_k: usize) -> Result<RouterQueryEngine> {
        let mut tools = Vec::new();
        for index in [&self.pdf_index, &self.sql_index].into_iter().flatten() {
            tools.push(QueryEngineTool::from_engine(index.as_query_engine(&self.llm, top_k)).await?);
        }
        if tools.is_empty() {
            return Err(RagError::IndexNotBuilt("pdf and sql".to_string()));
        }

        RouterQueryEngine::new(tools, self.llm.clone())
    }

    fn engine(&self, source: SourceKind) -> Result<QueryEngine> {
        let index = match source {
            SourceKind::Pdf => &self.pdf_index,
            SourceKind::Sql => &self.sql_index,
        };

        index
            .as_ref()
            .map(|index| index.as_query_engine(&self.llm, self.config.index.similarity_top_k))
            .ok_or_else(|| RagError::IndexNotBuilt(source.to_string()))
    }

    pub async fn node_counts(&self) -> Result<(u64, u64)> {
        Ok((
            self.client.count_rows(self.client.table_for(SourceKind::Pdf)).await?,
            self.client.count_rows(self.client.table_for(SourceKind::Sql)).await?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::pdf::write_test_pdf;
    use crate::models::Metadata;
    use pretty_assertions::assert_eq;
    use rusqlite::Connection;
    use std::path::Path;
    use tempfile::TempDir;

    async fn session(dir: &TempDir) -> RagSession {
        let mut config = Config::default_config();
        config.database.uri = dir.path().join("lancedb").display().to_string();
        config.llm.embedding_dim = 4096;
        config.index.similarity_top_k = 1;

        let client = LanceDbClient::new(config.database.clone()).await.unwrap();
        RagSession::with_clients(
            config,
            client,
            EmbeddingClient::offline(4096),
            CompletionClient::unconfigured(),
        )
    }

    async fn build(session: &mut RagSession) {
        let pdf_docs = vec![
            Document::new(
                SourceKind::Pdf,
                "The annual report says revenue growth reached twelve percent.".to_string(),
                Metadata::new(),
            )
            .with_metadata("page_label", "1")
            .with_metadata("file_name", "report.pdf"),
        ];
        let sql_docs = vec![
            Document::new(
                SourceKind::Sql,
                "Table employees has columns: name (TEXT), salary (REAL). It contains 1 rows."
                    .to_string(),
                Metadata::new(),
            )
            .with_metadata("table", "employees"),
            Document::new(SourceKind::Sql, "name: Grace, salary: 95000".to_string(), Metadata::new())
                .with_metadata("table", "employees")
                .with_metadata("row", "1"),
        ];

        let chunker = TextChunker::new(256, 16);
        session.pdf_index = Some(
            VectorStoreIndex::from_documents(&session.client, &session.embedder, SourceKind::Pdf, &pdf_docs, &chunker, None)
                .await
                .unwrap(),
        );
        session.sql_index = Some(
            VectorStoreIndex::from_documents(&session.client, &session.embedder, SourceKind::Sql, &sql_docs, &chunker, None)
                .await
                .unwrap(),
        );
    }

    fn write_db(path: &Path, sql: &str) {
        Connection::open(path).unwrap().execute_batch(sql).unwrap();
    }

    fn sources(dir: &TempDir) -> SourcePaths {
        let paths = SourcePaths {
            pdf: dir.path().join("report.pdf"),
            db: dir.path().join("staff.db"),
        };
        write_test_pdf(
            &paths.pdf,
            &[
                "The annual report says revenue growth reached twelve percent",
                "Headcount stayed flat across all regions",
            ],
        );
        write_db(
            &paths.db,
            "CREATE TABLE employees (name TEXT, salary INTEGER);
             INSERT INTO employees VALUES ('Ada', 120000);
             INSERT INTO employees VALUES ('Grace', 95000);",
        );
        paths
    }

    #[test]
    fn test_query_mode_parse() {
        assert_eq!("both".parse::<QueryMode>(), Ok(QueryMode::Both));
        assert_eq!("ROUTE".parse::<QueryMode>(), Ok(QueryMode::Auto));
        assert!("everything".parse::<QueryMode>().is_err());
        assert_eq!(QueryMode::default().to_string(), "both");
    }

    #[test]
    fn test_combined_render() {
        let response = |source, text: &str| Response {
            source,
            text: text.to_string(),
            source_nodes: vec![],
        };
        let answer = Answer::Combined {
            pdf: response(SourceKind::Pdf, "twelve percent"),
            sql: response(SourceKind::Sql, "95000"),
        };

        assert_eq!(
            answer.render(),
            "📄 **From PDF**: twelve percent\n\n🗄️ **From SQL DB**: 95000"
        );
        assert_eq!(answer.responses().len(), 2);
    }

    #[tokio::test]
    async fn test_ask_before_index_warns() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir).await;

        let result = session.ask("anything?", QueryMode::Both).await;
        assert!(matches!(result, Err(RagError::IndexNotBuilt(_))));

        let result = session.ask("anything?", QueryMode::Auto).await;
        assert!(matches!(result, Err(RagError::IndexNotBuilt(_))));
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir).await;
        assert!(matches!(
            session.ask("  ", QueryMode::Pdf).await,
            Err(RagError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_ask_both_and_routed() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir).await;
        build(&mut session).await;

        let answer = session.ask("What is Grace's salary?", QueryMode::Both).await.unwrap();
        let rendered = answer.render();
        assert!(rendered.starts_with("📄 **From PDF**: "));
        assert!(rendered.contains("🗄️ **From SQL DB**: "));
        assert!(rendered.contains("name: Grace, salary: 95000"));

        let routed = session
            .ask("How many employees have a salary?", QueryMode::Auto)
            .await
            .unwrap();
        assert_eq!(routed.selection().unwrap().tool, "sql");

        let routed = session
            .ask("What does the annual report say about revenue growth?", QueryMode::Auto)
            .await
            .unwrap();
        assert_eq!(routed.selection().unwrap().tool, "pdf");
        assert!(routed.render().contains("twelve percent"));
    }

    #[tokio::test]
    async fn test_restore_after_restart() {
        let dir = TempDir::new().unwrap();
        {
            let mut session = session(&dir).await;
            build(&mut session).await;
        }

        let mut restored = session(&dir).await;
        assert!(!restored.is_indexed());
        assert!(restored.restore().await.unwrap());
        assert_eq!(restored.node_counts().await.unwrap(), (1, 2));

        let answer = restored.ask("revenue growth", QueryMode::Pdf).await.unwrap();
        assert!(answer.render().contains("[page 1]"));
    }

    #[tokio::test]
    async fn test_index_loads_both_sources() {
        let dir = TempDir::new().unwrap();
        let paths = sources(&dir);
        let mut session = session(&dir).await.with_progress(ProgressDisplay::Hidden);

        let report = session.index(&paths).await.unwrap();

        assert_eq!(report.pdf_pages, 2);
        assert_eq!(report.tables.len(), 1);
        assert_eq!(report.tables[0].name, "employees");
        assert_eq!(report.tables[0].row_count, 2);
        assert_eq!((report.pdf_nodes, report.sql_nodes), (2, 3));
        assert_eq!(report.stats.nodes_indexed, 5);
        assert!(session.is_indexed());
        assert_eq!(session.node_counts().await.unwrap(), (2, 3));

        let answer = session.ask("What is Grace's salary?", QueryMode::Sql).await.unwrap();
        assert!(answer.render().contains("name: Grace, salary: 95000"));
    }

    #[tokio::test]
    async fn test_reindex_replaces_previous_rows() {
        let dir = TempDir::new().unwrap();
        let paths = sources(&dir);
        let mut session = session(&dir).await;
        session.index(&paths).await.unwrap();

        let other = SourcePaths {
            pdf: paths.pdf.clone(),
            db: dir.path().join("inventory.db"),
        };
        write_db(
            &other.db,
            "CREATE TABLE parts (sku TEXT);
             INSERT INTO parts VALUES ('A-1');",
        );
        session.index(&other).await.unwrap();

        assert_eq!(session.node_counts().await.unwrap(), (2, 2));
        let answer = session.ask("Which sku is stocked?", QueryMode::Sql).await.unwrap();
        assert!(answer.render().contains("sku: A-1"));
        assert!(!answer.render().contains("Grace"));
    }

    #[tokio::test]
    async fn test_reindex_with_empty_db_keeps_previous_pair() {
        let dir = TempDir::new().unwrap();
        let paths = sources(&dir);
        {
            let mut session = session(&dir).await;
            session.index(&paths).await.unwrap();

            let empty = SourcePaths {
                pdf: paths.pdf.clone(),
                db: dir.path().join("empty.db"),
            };
            write_db(&empty.db, "CREATE TABLE scratch (x); DROP TABLE scratch;");

            let result = session.index(&empty).await;
            assert!(matches!(result, Err(RagError::Validation(_))));
            assert!(session.is_indexed());
        }

        let mut restored = session(&dir).await;
        assert!(restored.restore().await.unwrap());
        assert_eq!(restored.node_counts().await.unwrap(), (2, 3));

        let answer = restored.ask("What is Grace's salary?", QueryMode::Sql).await.unwrap();
        assert!(answer.render().contains("Grace"));
    }

    #[tokio::test]
    async fn test_router_reused_until_indexes_change() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir).await;
        build(&mut session).await;
        assert!(session.router.get().is_none());

        session.ask("What is Grace's salary?", QueryMode::Auto).await.unwrap();
        assert!(session.router.get().is_some());

        session.ask("revenue growth", QueryMode::Auto).await.unwrap();
        assert!(session.router.get().is_some());

        assert!(session.restore().await.unwrap());
        assert!(session.router.get().is_none());
    }
}

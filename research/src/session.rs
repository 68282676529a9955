use crate::config::{Config, Connection};
use crate::export::Exporter;
use crate::research::{Review, ReviewRequest, Searcher};
use agent::Result;
use agent::callbacks::Progress;
use agent::llm;
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

type LLMFactory = Box<dyn Fn(&Connection) -> Result<Arc<dyn llm::LLM + Send + Sync>> + Send>;

/// Outcome of writing a finished search to disk. `None` when exports are off.
/// A failed export never discards the search result.
pub type Exported<T> = Option<Result<T>>;

/// State owned by one user session: credentials, the cached searcher and the
/// search counter.
pub struct Session {
    config: Config,
    transcript: Option<PathBuf>,
    exporter: Option<Exporter>,
    factory: LLMFactory,
    searcher: Option<(String, Arc<Searcher>)>,
    search_count: usize,
}

impl Session {
    pub fn new(config: Config, transcript: Option<PathBuf>, exporter: Option<Exporter>) -> Self {
        Self::with_factory(config, transcript, exporter, Box::new(Connection::llm))
    }

    pub fn with_factory(
        config: Config,
        transcript: Option<PathBuf>,
        exporter: Option<Exporter>,
        factory: LLMFactory,
    ) -> Self {
        Self {
            config,
            transcript,
            exporter,
            factory,
            searcher: None,
            search_count: 0,
        }
    }

    pub fn search_count(&self) -> usize {
        self.search_count
    }

    pub fn set_api_key(&mut self, key: String) {
        self.config.api_key = Some(key);
    }

    /// Fails with a configuration error when no usable key is available.
    /// The searcher is rebuilt only when the key changed.
    pub fn searcher(&mut self) -> Result<Arc<Searcher>> {
        let conn = self.config.resolve()?;

        if let Some((key, searcher)) = &self.searcher {
            if *key == conn.api_key {
                return Ok(searcher.clone());
            }
        }

        debug!(provider = ?conn.provider, model = %conn.model, "creating searcher");
        let mut searcher = Searcher::new((self.factory)(&conn)?);
        if let Some(path) = &self.transcript {
            searcher = searcher.with_transcript(path.clone());
        }

        let searcher = Arc::new(searcher);
        self.searcher = Some((conn.api_key, searcher.clone()));
        Ok(searcher)
    }

    pub async fn quick(
        &mut self,
        question: &str,
        progress: Option<&mut dyn Progress>,
    ) -> Result<(String, Exported<PathBuf>)> {
        let searcher = self.searcher()?;
        let findings = searcher.simple_query(question, progress).await?;

        let exported = self
            .exporter
            .as_ref()
            .map(|exporter| exporter.quick(&findings, Local::now()));
        if let Some(Err(err)) = &exported {
            warn!(%err, "quick search export failed");
        }

        self.search_count += 1;
        info!(searches = self.search_count, "quick search done");
        Ok((findings, exported))
    }

    pub async fn review(
        &mut self,
        request: &ReviewRequest,
        progress: Option<&mut dyn Progress>,
    ) -> Result<(Review, Exported<(PathBuf, PathBuf)>)> {
        let searcher = self.searcher()?;
        let review = searcher.iterative_review(request, progress).await?;

        let exported = self
            .exporter
            .as_ref()
            .map(|exporter| exporter.review(&review, Local::now()));
        if let Some(Err(err)) = &exported {
            warn!(%err, "review export failed");
        }

        self.search_count += 1;
        info!(searches = self.search_count, "review done");
        Ok((review, exported))
    }
}

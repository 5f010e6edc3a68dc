//! The QA agent service: ingestion, test-case generation and script
//! synthesis behind one handle shared by the CLI and the HTTP server.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::QaError;
use crate::ingest::ingest_files;
use crate::llm::{create_llm, LanguageModel};
use crate::models::{Answer, IngestReport, UploadedFile};
use crate::prompt::{join_context, script_prompt, test_case_prompt};
use crate::store::{KnowledgeBase, KnowledgeBaseStatus};

/// Where language model clients come from.
enum ModelSource {
    /// Built per request from `[llm]`, using the request's API key if given.
    Configured,
    /// A fixed client; request keys are ignored.
    Fixed(Arc<dyn LanguageModel>),
}

pub struct QaAgent {
    config: Config,
    kb: KnowledgeBase,
    embedder: Arc<dyn EmbeddingProvider>,
    models: ModelSource,
    ingest_lock: Mutex<()>,
}

impl QaAgent {
    /// Build an agent with the embedding backend named in `config`.
    pub fn from_config(config: Config) -> Result<Self, QaError> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
        Ok(Self::new(config, embedder))
    }

    pub fn new(config: Config, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            kb: KnowledgeBase::new(config.store.path.clone()),
            config,
            embedder,
            models: ModelSource::Configured,
            ingest_lock: Mutex::new(()),
        }
    }

    /// Use `model` for every generation instead of the configured provider.
    pub fn with_language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.models = ModelSource::Fixed(model);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Replace the knowledge base with the contents of `files`.
    ///
    /// Batches are applied one at a time in arrival order.
    pub async fn ingest(&self, files: &[UploadedFile]) -> Result<IngestReport, QaError> {
        let _guard = self.ingest_lock.lock().await;
        ingest_files(&self.kb, self.embedder.as_ref(), &self.config, files).await
    }

    /// Generate a test-case table for `query`, grounded in retrieved chunks.
    ///
    /// Without a knowledge base the model is not called and
    /// [`Answer::KnowledgeBaseMissing`] is returned.
    pub async fn answer_query(&self, query: &str, api_key: Option<&str>) -> Result<Answer, QaError> {
        if !self.kb.exists().await? {
            tracing::info!("query without knowledge base");
            return Ok(Answer::KnowledgeBaseMissing);
        }

        let model = self.model(api_key)?;
        let hits = self
            .kb
            .search(self.embedder.as_ref(), query, self.config.retrieval.query_k)
            .await?;
        tracing::debug!(hits = hits.len(), "retrieved context for query");

        let prompt = test_case_prompt(&join_context(&hits), query);
        let text = model.generate(&prompt).await?;
        Ok(Answer::Generated(text))
    }

    /// Write a Selenium script for `test_case` against `html`.
    ///
    /// Retrieved rules are added when a knowledge base exists; otherwise the
    /// script is generated from the test case and HTML alone.
    pub async fn synthesize_script(
        &self,
        test_case: &str,
        html: &str,
        api_key: Option<&str>,
    ) -> Result<String, QaError> {
        let model = self.model(api_key)?;
        let hits = self
            .kb
            .search(
                self.embedder.as_ref(),
                test_case,
                self.config.retrieval.script_k,
            )
            .await?;
        tracing::debug!(hits = hits.len(), "retrieved rules for script");

        let prompt = script_prompt(test_case, &join_context(&hits), html);
        Ok(model.generate(&prompt).await?)
    }

    pub async fn status(&self) -> Result<Option<KnowledgeBaseStatus>, QaError> {
        Ok(self.kb.status().await?)
    }

    pub async fn clear(&self) -> Result<bool, QaError> {
        let _guard = self.ingest_lock.lock().await;
        Ok(self.kb.clear().await?)
    }

    fn model(&self, api_key: Option<&str>) -> Result<Arc<dyn LanguageModel>, QaError> {
        match &self.models {
            ModelSource::Fixed(model) => Ok(Arc::clone(model)),
            ModelSource::Configured => Ok(Arc::from(create_llm(&self.config.llm, api_key)?)),
        }
    }
}

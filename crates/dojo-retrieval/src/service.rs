//! Retrieval service.

use std::sync::Arc;

use dojo_core::{
    CompanyId, DEFAULT_MAX_RESULTS, DEFAULT_SIMILARITY_THRESHOLD, Embedder, Result, ScoredEntry,
    SearchQuery, VectorStore,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Returned by [`RetrievalService::search`] when nothing clears the threshold.
pub const NO_KNOWLEDGE_FOUND: &str = "No specific information found in the knowledge base.";

/// Returned by [`RetrievalService::search`] when embedding or search failed.
pub const RETRIEVAL_FAILED: &str = "Error retrieving information from the knowledge base.";

/// Search defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Minimum similarity (exclusive) for a hit to count
    pub similarity_threshold: f32,
    /// Results returned by a plain search
    pub max_results: usize,
    /// Results folded into an enriched prompt
    pub enrich_limit: usize,
    /// Trailing conversation turns added to the enrichment query
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_results: DEFAULT_MAX_RESULTS,
            enrich_limit: 2,
            history_turns: 3,
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Tenant-scoped knowledge search.
pub struct RetrievalService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl RetrievalService {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Search and render the hits as context text.
    ///
    /// Returns [`NO_KNOWLEDGE_FOUND`] when nothing matches and
    /// [`RETRIEVAL_FAILED`] when the embedder or the store fails.
    pub async fn search(
        &self,
        query: &str,
        company_id: &CompanyId,
        threshold: Option<f32>,
        limit: Option<usize>,
    ) -> String {
        match self.run_search(query, company_id, threshold, limit).await {
            Ok(hits) if hits.is_empty() => {
                info!("No relevant knowledge found for company {}", company_id);
                NO_KNOWLEDGE_FOUND.to_string()
            }
            Ok(hits) => {
                info!(
                    "Found {} relevant entries for company {}",
                    hits.len(),
                    company_id
                );
                format_context(&hits)
            }
            Err(e) => {
                error!("Knowledge search failed for company {}: {}", company_id, e);
                RETRIEVAL_FAILED.to_string()
            }
        }
    }

    /// Same search as [`search`](Self::search), structured. Failures yield
    /// an empty vector.
    pub async fn search_detailed(
        &self,
        query: &str,
        company_id: &CompanyId,
        threshold: Option<f32>,
        limit: Option<usize>,
    ) -> Vec<ScoredEntry> {
        self.run_search(query, company_id, threshold, limit)
            .await
            .unwrap_or_else(|e| {
                error!(
                    "Detailed knowledge search failed for company {}: {}",
                    company_id, e
                );
                Vec::new()
            })
    }

    /// Wrap a user message in a prompt carrying relevant knowledge.
    ///
    /// The last few history turns are prepended to the message to steer the
    /// search toward the current topic; the prompt itself quotes only the
    /// original message.
    pub async fn enrich_prompt(
        &self,
        user_message: &str,
        company_id: &CompanyId,
        history: &[ConversationTurn],
    ) -> String {
        let query = enrichment_query(user_message, history, self.config.history_turns);
        let context = self
            .search(&query, company_id, None, Some(self.config.enrich_limit))
            .await;
        render_prompt(&context, user_message)
    }

    async fn run_search(
        &self,
        query: &str,
        company_id: &CompanyId,
        threshold: Option<f32>,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredEntry>> {
        let threshold = threshold.unwrap_or(self.config.similarity_threshold);
        let limit = limit.unwrap_or(self.config.max_results);

        debug!(
            "Searching knowledge for company {} (threshold: {}, limit: {})",
            company_id, threshold, limit
        );

        let embedding = self.embedder.embed(query).await?;
        let query = SearchQuery::new(embedding)
            .with_threshold(threshold)
            .with_limit(limit);

        Ok(self.store.similarity_search(company_id, &query).await?)
    }
}

fn enrichment_query(user_message: &str, history: &[ConversationTurn], turns: usize) -> String {
    if history.is_empty() || turns == 0 {
        return user_message.to_string();
    }

    let recent = &history[history.len().saturating_sub(turns)..];
    let context = recent
        .iter()
        .map(|turn| turn.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    format!("{context} {user_message}")
}

/// Render ranked hits as numbered, attributed blocks.
pub fn format_context(hits: &[ScoredEntry]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[Document {} - {}: {}] (relevance: {:.2}%)\n{}",
                i + 1,
                hit.entry.source_type,
                hit.entry.source_name,
                hit.similarity * 100.0,
                hit.entry.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill the enrichment template.
pub fn render_prompt(context: &str, user_message: &str) -> String {
    format!(
        "Knowledge base context:\n{context}\n\n---\n\nUser message: {user_message}\n\n\
         Answer based on the provided context whenever possible."
    )
}

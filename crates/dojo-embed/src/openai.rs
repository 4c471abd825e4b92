//! OpenAI-compatible embeddings client.

use std::time::Duration;

use async_trait::async_trait;
use dojo_core::{EmbedError, Embedder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::EmbedderSettings;

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// Inputs larger than `max_batch_size` are sent as sequential sub-batches
/// and reassembled in input order. Failures are reported, never retried.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
    max_batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedder {
    /// Build a client from settings. Fails if `api_key` is missing.
    pub fn new(settings: &EmbedderSettings) -> Result<Self, EmbedError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| EmbedError::Provider("no API key configured".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| EmbedError::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", settings.base_url.trim_end_matches('/')),
            api_key,
            model: settings.model.clone(),
            dimension: settings.dimension,
            max_batch_size: settings.max_batch_size.max(1),
        })
    }

    async fn embed_single_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            encoding_format: "float",
        };

        debug!(
            "Embedding batch of {} texts (model: {})",
            texts.len(),
            self.model
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedError::Provider(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Embedding request failed: {} - {}", status, body);
            return Err(EmbedError::Provider(format!(
                "provider returned {status}: {body}"
            )));
        }

        let mut result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Provider(format!("invalid response body: {e}")))?;

        if result.data.len() != texts.len() {
            return Err(EmbedError::BatchMismatch {
                sent: texts.len(),
                received: result.data.len(),
            });
        }

        result.data.sort_by_key(|d| d.index);

        result
            .data
            .into_iter()
            .map(|d| {
                if d.embedding.len() == self.dimension {
                    Ok(d.embedding)
                } else {
                    Err(EmbedError::DimensionMismatch {
                        expected: self.dimension,
                        actual: d.embedding.len(),
                    })
                }
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_batch_size) {
            embeddings.extend(self.embed_single_batch(batch).await?);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIM: usize = 4;

    /// Encodes each input's length in the first component, and returns the
    /// data array reversed so callers must reorder by `index`.
    async fn spawn_provider(calls: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/embeddings",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let authorized = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        == Some("Bearer test-key");
                    if !authorized {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
                    }

                    let inputs = body["input"].as_array().cloned().unwrap_or_default();
                    let mut data: Vec<Value> = inputs
                        .iter()
                        .enumerate()
                        .map(|(index, text)| {
                            let len = text.as_str().unwrap_or_default().len() as f32;
                            json!({"embedding": [len, 0.0, 0.0, 1.0], "index": index})
                        })
                        .collect();
                    data.reverse();
                    (StatusCode::OK, Json(json!({"data": data})))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn settings(base_url: String, api_key: &str, max_batch_size: usize) -> EmbedderSettings {
        EmbedderSettings {
            api_key: Some(api_key.to_string()),
            base_url,
            dimension: DIM,
            max_batch_size,
            ..EmbedderSettings::default()
        }
    }

    #[test]
    fn test_new_requires_api_key() {
        let s = EmbedderSettings {
            api_key: Some("   ".to_string()),
            ..EmbedderSettings::default()
        };
        assert!(matches!(
            OpenAiEmbedder::new(&s),
            Err(EmbedError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_input_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_provider(calls.clone()).await;
        let embedder = OpenAiEmbedder::new(&settings(base, "test-key", 16)).unwrap();

        let vectors = embedder.embed_batch(&["a", "bbb", "cc"]).await.unwrap();
        let lengths: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 3.0, 2.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_embed_batch_splits_into_sub_batches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_provider(calls.clone()).await;
        let embedder = OpenAiEmbedder::new(&settings(base, "test-key", 2)).unwrap();

        let texts = ["1", "22", "333", "4444", "55555"];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        let lengths: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_embed_single_text() {
        let base = spawn_provider(Arc::new(AtomicUsize::new(0))).await;
        let embedder = OpenAiEmbedder::new(&settings(base, "test-key", 8)).unwrap();

        let vector = embedder.embed("hello").await.unwrap();
        assert_eq!(vector, vec![5.0, 0.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_rejected_key_is_provider_error() {
        let base = spawn_provider(Arc::new(AtomicUsize::new(0))).await;
        let embedder = OpenAiEmbedder::new(&settings(base, "wrong-key", 8)).unwrap();

        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbedError::Provider(ref msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_reported() {
        let base = spawn_provider(Arc::new(AtomicUsize::new(0))).await;
        let mut s = settings(base, "test-key", 8);
        s.dimension = 1536;
        let embedder = OpenAiEmbedder::new(&s).unwrap();

        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(
            err,
            EmbedError::DimensionMismatch {
                expected: 1536,
                actual: 4
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_provider_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let embedder =
            OpenAiEmbedder::new(&settings(format!("http://{addr}"), "test-key", 8)).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbedError::Provider(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_provider(calls.clone()).await;
        let embedder = OpenAiEmbedder::new(&settings(base, "test-key", 8)).unwrap();

        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

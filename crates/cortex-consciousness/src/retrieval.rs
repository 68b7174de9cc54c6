//! Retrieval and rendering collaborators
//!
//! Ingestion, embeddings and media generation live outside Cortex. The
//! engine only sees these traits.

use crate::error::{ConsciousnessError, Result};
use serde::{Deserialize, Serialize};

/// A retrieved chunk of ingested data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// Where the passage came from (document path, URL, chat export).
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub score: f32,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), source: None, score: 0.0 }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `top_k` passages relevant to `query`, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>>;
}

/// Retriever for deployments without an ingestion pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRetriever;

#[async_trait::async_trait]
impl Retriever for NoopRetriever {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<Passage>> {
        Ok(Vec::new())
    }
}

/// Fixed passages filtered by shared words. Useful for demos and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticRetriever {
    passages: Vec<Passage>,
}

impl StaticRetriever {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self { passages }
    }
}

#[async_trait::async_trait]
impl Retriever for StaticRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>> {
        let terms = crate::store::terms(query);
        let mut hits: Vec<Passage> = self
            .passages
            .iter()
            .filter_map(|p| {
                let overlap = crate::store::terms(&p.text).intersection(&terms).count();
                (overlap > 0).then(|| Passage { score: overlap as f32, ..p.clone() })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Markdown,
    Html,
    Image,
    Audio,
}

/// Rendered output of a [`Renderer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub modality: Modality,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Turns agent content into a deliverable (page, image, audio clip).
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, content: &str, modality: Modality) -> Result<Artifact>;
}

/// Renders textual modalities as-is and rejects media.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

#[async_trait::async_trait]
impl Renderer for TextRenderer {
    async fn render(&self, content: &str, modality: Modality) -> Result<Artifact> {
        let mime_type = match modality {
            Modality::Text => "text/plain; charset=utf-8",
            Modality::Markdown => "text/markdown; charset=utf-8",
            Modality::Html => "text/html; charset=utf-8",
            Modality::Image | Modality::Audio => {
                return Err(ConsciousnessError::Render(format!("{:?} needs a media renderer", modality)))
            }
        };
        Ok(Artifact { modality, mime_type: mime_type.to_string(), bytes: content.as_bytes().to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_retriever_ranks_by_overlap() {
        let retriever = StaticRetriever::new(vec![
            Passage::new("rust borrow checker notes"),
            Passage::new("gardening tips for spring"),
            Passage::new("rust async runtime and borrow rules").with_source("notes.md"),
        ]);
        let hits = retriever.search("rust borrow runtime", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source.as_deref(), Some("notes.md"));
        assert!(retriever.search("rust", 1).await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn text_renderer_rejects_media() {
        let artifact = TextRenderer.render("# hi", Modality::Markdown).await.unwrap();
        assert_eq!(artifact.bytes, b"# hi");
        assert!(artifact.mime_type.starts_with("text/markdown"));
        assert!(matches!(TextRenderer.render("x", Modality::Image).await, Err(ConsciousnessError::Render(_))));
    }
}

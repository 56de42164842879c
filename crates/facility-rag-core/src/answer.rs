//! Retrieval-augmented answering.
//!
//! [`Answerer::ask`] runs one retrieval + generation round trip:
//!
//! 1. Reject a blank query before touching any backend.
//! 2. Fetch the `top_k` nearest documents from the [`VectorIndex`].
//! 3. Drop repeated content hashes, keeping first-seen rank order.
//! 4. "Stuff" every remaining document into a single prompt.
//! 5. Call the [`Generator`] once and return its answer with the sources.
//!
//! Nothing is cached; asking the same question twice makes two round trips.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::RagError;
use crate::generation::Generator;
use crate::models::{NormalizedDocument, QaResult, ScoredDocument};
use crate::store::VectorIndex;

/// Default number of documents retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Answers questions against a vector index.
///
/// Cheap to clone; all state is shared and read-only.
#[derive(Clone)]
pub struct Answerer {
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl Answerer {
    pub fn new(index: Arc<dyn VectorIndex>, generator: Arc<dyn Generator>, top_k: usize) -> Self {
        Self {
            index,
            generator,
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn ask(&self, query: &str) -> Result<QaResult, RagError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".into()));
        }

        let retrieved = self.index.query(query, self.top_k).await?;
        let retrieved_count = retrieved.len();
        let sources = dedup_sources(retrieved);

        tracing::debug!(
            retrieved = retrieved_count,
            unique = sources.len(),
            "retrieved context for query"
        );

        let prompt = build_prompt(query, &sources);
        let answer = self.generator.generate(&prompt).await?;

        Ok(QaResult {
            answer: answer.trim().to_string(),
            sources,
        })
    }
}

/// Drop documents whose content hash already appeared at a better rank.
pub fn dedup_sources(retrieved: Vec<ScoredDocument>) -> Vec<NormalizedDocument> {
    let mut seen = HashSet::new();
    retrieved
        .into_iter()
        .filter(|s| seen.insert(s.document.metadata.content_hash.clone()))
        .map(|s| s.document)
        .collect()
}

/// Build the single "stuff" prompt: instructions, every source's canonical
/// text separated by blank lines, then the question.
pub fn build_prompt(query: &str, sources: &[NormalizedDocument]) -> String {
    let context = if sources.is_empty() {
        "(no matching log records)".to_string()
    } else {
        sources
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    format!(
        "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        PROMPT_PREAMBLE, context, query
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::ProcessedHashSet;
    use crate::models::DocumentMetadata;
    use crate::store::UpsertReport;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn doc(content: &str, hash: &str) -> NormalizedDocument {
        NormalizedDocument {
            content: content.to_string(),
            metadata: DocumentMetadata {
                timestamp: "2024-01-01T10:00:00".into(),
                occupancy_count: 5,
                content_hash: hash.to_string(),
            },
        }
    }

    fn scored(content: &str, hash: &str, score: f32) -> ScoredDocument {
        ScoredDocument {
            document: doc(content, hash),
            score,
        }
    }

    /// Returns a canned result list regardless of the query.
    struct FixedIndex(Vec<ScoredDocument>);

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn upsert(&self, _: &[NormalizedDocument]) -> Result<UpsertReport, RagError> {
            Ok(UpsertReport::default())
        }
        async fn query(&self, _: &str, k: usize) -> Result<Vec<ScoredDocument>, RagError> {
            Ok(self.0.iter().take(k).cloned().collect())
        }
        async fn reset(&self) -> Result<(), RagError> {
            Ok(())
        }
        async fn len(&self) -> Result<usize, RagError> {
            Ok(self.0.len())
        }
        async fn content_hashes(&self) -> Result<ProcessedHashSet, RagError> {
            Ok(ProcessedHashSet::new())
        }
    }

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        fn model_name(&self) -> &str {
            "recording"
        }
        async fn generate(&self, prompt: &str) -> Result<String, RagError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("  Five people were present.\n".into())
        }
    }

    #[test]
    fn test_dedup_keeps_first_rank() {
        let out = dedup_sources(vec![
            scored("a", "h1", 0.9),
            scored("b", "h2", 0.8),
            scored("a again", "h1", 0.7),
            scored("c", "h3", 0.6),
        ]);
        let contents: Vec<&str> = out.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("How many?", &[doc("first", "h1"), doc("second", "h2")]);
        assert!(prompt.starts_with(PROMPT_PREAMBLE));
        assert!(prompt.contains("\n\nfirst\n\nsecond\n\n"));
        assert!(prompt.ends_with("Question: How many?\nHelpful Answer:"));
    }

    #[test]
    fn test_prompt_without_context() {
        let prompt = build_prompt("Anything?", &[]);
        assert!(prompt.contains("(no matching log records)"));
    }

    #[tokio::test]
    async fn test_empty_query_never_generates() {
        let generator = Arc::new(RecordingGenerator::default());
        let answerer = Answerer::new(
            Arc::new(FixedIndex(vec![scored("a", "h1", 1.0)])),
            generator.clone(),
            4,
        );
        for q in ["", "   \n"] {
            let err = answerer.ask(q).await.unwrap_err();
            assert!(matches!(err, RagError::InvalidInput(_)));
        }
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ask_dedups_sources_and_generates_once() {
        let generator = Arc::new(RecordingGenerator::default());
        let answerer = Answerer::new(
            Arc::new(FixedIndex(vec![
                scored("ten o'clock, five people", "h1", 0.9),
                scored("ten o'clock, five people", "h1", 0.9),
                scored("eleven o'clock, three people", "h2", 0.5),
            ])),
            generator.clone(),
            3,
        );

        let result = answerer.ask("  How many at 10am? ").await.unwrap();
        assert_eq!(result.answer, "Five people were present.");
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.sources[0].metadata.content_hash, "h1");

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].matches("ten o'clock").count(), 1);
        assert!(prompts[0].contains("Question: How many at 10am?"));
    }
}

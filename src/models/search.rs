use serde::{Deserialize, Serialize};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Query passed to every discovery provider
///
/// An empty request (no task description, no keywords) asks a provider for
/// everything it knows, unranked and untruncated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub task_description: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub min_similarity: Option<f64>,
}

impl SearchRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_task(task_description: impl Into<String>) -> Self {
        Self {
            task_description: Some(task_description.into()),
            ..Self::default()
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = Some(keywords);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_min_similarity(mut self, min_similarity: f64) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    /// Trimmed, lowercased task description, if any
    pub fn query(&self) -> Option<String> {
        self.task_description
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }

    /// Non-blank keywords, lowercased
    pub fn normalized_keywords(&self) -> Vec<String> {
        self.keywords
            .iter()
            .flatten()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.query().is_none() && self.normalized_keywords().is_empty()
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
    }

    pub fn effective_min_similarity(&self) -> f64 {
        self.min_similarity.unwrap_or(0.0)
    }
}

//! Keyword relevance scoring shared by providers that rank locally

use std::cmp::Ordering;

use crate::models::search::SearchRequest;
use crate::models::server::Server;

const QUERY_MATCH: f64 = 1.0;
const KEYWORD_MATCH: f64 = 0.5;
const NAME_MATCH_BONUS: f64 = 0.5;

/// Scores one server against the request.
///
/// +1.0 when the query is a substring of `name + " " + description`,
/// +0.5 per keyword found there, +0.5 more when the query is in the name.
pub fn relevance_score(server: &Server, request: &SearchRequest) -> f64 {
    let text = format!("{} {}", server.name, server.description).to_lowercase();
    let mut score = 0.0;

    if let Some(query) = request.query() {
        if text.contains(&query) {
            score += QUERY_MATCH;
        }
        if server.name.to_lowercase().contains(&query) {
            score += NAME_MATCH_BONUS;
        }
    }

    for keyword in request.normalized_keywords() {
        if text.contains(&keyword) {
            score += KEYWORD_MATCH;
        }
    }

    score
}

/// Scores, filters and truncates `servers` for `request`.
///
/// An empty request returns every server untouched.
pub fn rank(servers: Vec<Server>, request: &SearchRequest) -> Vec<Server> {
    if request.is_empty() {
        return servers;
    }

    let scored = servers
        .into_iter()
        .map(|mut server| {
            server.relevance_score = relevance_score(&server, request);
            server
        })
        .collect();

    filter_and_sort(scored, request)
}

/// Applies `minSimilarity` and `limit` to already-scored servers.
pub fn filter_and_sort(servers: Vec<Server>, request: &SearchRequest) -> Vec<Server> {
    let min = request.effective_min_similarity();

    let mut kept: Vec<Server> = servers
        .into_iter()
        .filter(|server| server.relevance_score >= min)
        .collect();

    kept.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
    });
    kept.truncate(request.effective_limit());
    kept
}

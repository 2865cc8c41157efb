//! Deterministic service-name matching against URL tokens.
//!
//! Matching is purely lexical: known service names are compared against the
//! host and path segments of the resolved URL using exact normalized hits,
//! Jaro-Winkler similarity and token overlap. No inference model involved.

use std::collections::HashSet;

use strsim::jaro_winkler;

/// Canonical form used for identity comparisons: lowercase with separator
/// characters collapsed to `_`.
pub fn normalize(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '-' | '.' | ' ' => '_',
            other => other,
        })
        .collect()
}

/// Splits on every non-alphanumeric character, lowercased.
pub(crate) fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Host and path segments of a URL, plus the `.`-separated labels of each,
/// in order of appearance.
fn url_segments(url: &str) -> Vec<String> {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);

    let mut segments = Vec::new();
    for segment in without_scheme.split(|c| matches!(c, '/' | ':' | '?' | '#' | '&' | '=')) {
        if segment.is_empty() {
            continue;
        }
        segments.push(segment.to_string());
        if segment.contains('.') {
            for label in segment.split('.').filter(|l| !l.is_empty()) {
                segments.push(label.to_string());
            }
        }
    }
    segments
}

/// Fraction of the service name's tokens that appear among the URL's
/// tokens, in [0,1]. Used both for match scoring and as the confidence
/// heuristic on inferred resolutions.
pub(crate) fn token_overlap(service: &str, url: &str) -> f64 {
    let service_tokens = tokenize(service);
    if service_tokens.is_empty() {
        return 0.0;
    }
    let url_tokens: HashSet<String> = tokenize(url).into_iter().collect();
    let hits = service_tokens
        .iter()
        .filter(|t| url_tokens.contains(*t))
        .count();
    hits as f64 / service_tokens.len() as f64
}

/// Similarity of one known service name to the URL.
pub(crate) fn match_score(service: &str, url: &str) -> f64 {
    let service_norm = normalize(service);
    if service_norm.is_empty() {
        return 0.0;
    }

    let mut best: f64 = 0.0;
    for segment in url_segments(url) {
        let segment_norm = normalize(&segment);
        if segment_norm == service_norm {
            return 1.0;
        }
        best = best.max(jaro_winkler(&service_norm, &segment_norm));
    }

    best.max(token_overlap(service, url))
}

/// Length of the longest service-name token present in the URL. Tie-break
/// criterion between equally scored candidates.
fn longest_matched_token(service: &str, url: &str) -> usize {
    let url_tokens: HashSet<String> = tokenize(url).into_iter().collect();
    tokenize(service)
        .into_iter()
        .filter(|t| url_tokens.contains(t))
        .map(|t| t.len())
        .max()
        .unwrap_or(0)
}

/// The winning directory match for a URL, if any candidate clears the
/// threshold. Ties break by longest matched token, then lexical order, so
/// the result is deterministic for a given directory snapshot.
pub(crate) fn best_match(known: &[String], url: &str, threshold: f64) -> Option<String> {
    let mut candidates: Vec<(f64, usize, &String)> = known
        .iter()
        .map(|name| (match_score(name, url), longest_matched_token(name, url), name))
        .filter(|(score, _, _)| *score >= threshold)
        .collect();

    candidates.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.1.cmp(&a.1))
            .then(a.2.cmp(b.2))
    });

    candidates.first().map(|(_, _, name)| (*name).clone())
}

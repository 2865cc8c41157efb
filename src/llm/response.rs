//! Parsing model answers into a service name.
//!
//! Models answer in one of two shapes: a JSON object
//! (`{"service": "billing", "confidence": 0.9}`) or free text containing
//! the name. Both are handled; anything else classifies as malformed.

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// A parsed model answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceAnswer {
    pub service: String,
    /// Model's self-reported confidence, when it gave one.
    pub confidence: Option<f32>,
}

#[derive(Debug, Error)]
pub enum AnswerParseError {
    #[error("empty response")]
    Empty,

    #[error("no service name found in response: {0}")]
    NoServiceName(String),
}

#[derive(Debug, Deserialize)]
struct JsonAnswer {
    #[serde(alias = "name", alias = "callee")]
    service: Option<String>,
    confidence: Option<f32>,
}

/// Extracts a service name (and optional confidence) from raw model output.
pub fn parse_service_answer(raw: &str) -> Result<ServiceAnswer, AnswerParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AnswerParseError::Empty);
    }

    if let Some(json) = extract_json_object(trimmed) {
        if let Ok(answer) = serde_json::from_str::<JsonAnswer>(&json) {
            if let Some(service) = answer.service {
                if let Some(name) = clean_service_token(&service) {
                    return Ok(ServiceAnswer {
                        service: name,
                        confidence: answer.confidence.map(|c| c.clamp(0.0, 1.0)),
                    });
                }
            }
        }
    }

    // Plain-text fallback: the first line usually carries the answer,
    // wrapped in markdown emphasis or quotes.
    let first_line = trimmed.lines().next().unwrap_or_default();
    match clean_service_token(first_line) {
        Some(name) => Ok(ServiceAnswer {
            service: name,
            confidence: None,
        }),
        None => Err(AnswerParseError::NoServiceName(
            trimmed.chars().take(120).collect(),
        )),
    }
}

/// Finds the outermost `{...}` span, tolerating markdown fences around it.
fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| text[start..=end].to_string())
}

/// Strips decoration and validates that what remains is a plausible service
/// identifier.
fn clean_service_token(text: &str) -> Option<String> {
    let mut stripped = text.replace("**", "").replace('`', "");
    // Quotes and trailing periods nest in either order (`"name".`, `"name."`),
    // so strip until a fixpoint.
    loop {
        let next = stripped
            .trim()
            .trim_matches('"')
            .trim_matches('\'')
            .trim_end_matches('.')
            .to_string();
        if next == stripped {
            break;
        }
        stripped = next;
    }

    let re = Regex::new(r"^[A-Za-z][A-Za-z0-9_\-]{0,63}$").ok()?;
    re.is_match(&stripped).then_some(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_answer() {
        let answer =
            parse_service_answer(r#"{"service": "payment_gateway", "confidence": 0.9}"#).unwrap();
        assert_eq!(answer.service, "payment_gateway");
        assert_eq!(answer.confidence, Some(0.9));
    }

    #[test]
    fn test_json_answer_in_markdown_fence() {
        let raw = "```json\n{\"service\": \"billing\"}\n```";
        let answer = parse_service_answer(raw).unwrap();
        assert_eq!(answer.service, "billing");
        assert_eq!(answer.confidence, None);
    }

    #[test]
    fn test_json_confidence_clamped() {
        let answer =
            parse_service_answer(r#"{"service": "billing", "confidence": 1.7}"#).unwrap();
        assert_eq!(answer.confidence, Some(1.0));
    }

    #[test]
    fn test_plain_text_answer() {
        let answer = parse_service_answer("payment_gateway\n\nBecause the URL ...").unwrap();
        assert_eq!(answer.service, "payment_gateway");
        assert_eq!(answer.confidence, None);
    }

    #[test]
    fn test_decorated_text_answer() {
        let answer = parse_service_answer(r#"**"order-service"**."#).unwrap();
        assert_eq!(answer.service, "order-service");
    }

    #[test]
    fn test_quotes_and_periods_nest_either_way() {
        let answer = parse_service_answer(r#""billing"."#).unwrap();
        assert_eq!(answer.service, "billing");

        let answer = parse_service_answer(r#""billing.""#).unwrap();
        assert_eq!(answer.service, "billing");

        let answer = parse_service_answer("'payment_gateway'.").unwrap();
        assert_eq!(answer.service, "payment_gateway");
    }

    #[test]
    fn test_empty_response() {
        assert!(matches!(
            parse_service_answer("   "),
            Err(AnswerParseError::Empty)
        ));
    }

    #[test]
    fn test_sentence_is_not_a_name() {
        let result = parse_service_answer("I think it calls the payment service maybe");
        assert!(matches!(result, Err(AnswerParseError::NoServiceName(_))));
    }
}

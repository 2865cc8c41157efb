//! Call Extractor: static extraction of HTTP call sites.
//!
//! Each file is parsed independently with tree-sitter; a file that fails to
//! parse is skipped with a warning and never aborts the run. Output is
//! ordered by (file path, line number), so identical input yields an
//! identical call-site sequence.

mod url;
mod visitor;

pub use url::PLACEHOLDER;

use std::path::{Component, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;
use tree_sitter::Parser;

use crate::config::AnalyzerConfig;
use crate::source::{SourceFile, SourceTree};
use visitor::FileVisitor;

/// HTTP verbs the extractor recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Maps a method name (`"get"`, `"POST"`) to a verb, if it is one.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One HTTP client invocation found in source. Immutable once produced;
/// identified by (file, line) within a run.
#[derive(Debug, Clone, Serialize)]
pub struct CallSite {
    /// Service the call was found in; empty when the file sits outside any
    /// service directory.
    pub caller: String,
    pub method: HttpMethod,
    /// Source text of the URL argument as written.
    pub raw_expr: String,
    /// Best-effort resolved URL; unresolvable segments appear as `{?}`.
    pub url: String,
    /// False when `url` contains placeholder segments.
    pub fully_resolved: bool,
    pub file: PathBuf,
    pub line: usize,
}

impl CallSite {
    /// A call can only enter resolution when it is attributable to a
    /// calling service.
    pub fn is_attributed(&self) -> bool {
        !self.caller.is_empty()
    }
}

/// Result of running extraction over a source tree.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub call_sites: Vec<CallSite>,
    pub files_parsed: usize,
    pub files_skipped: usize,
    pub unattributed: usize,
    pub warnings: Vec<String>,
}

/// Stateless per-file extractor; safe to reuse across runs.
pub struct CallExtractor {
    client_modules: Vec<String>,
}

impl CallExtractor {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            client_modules: config.http_client_modules.clone(),
        }
    }

    /// Extracts call sites from every file in the tree.
    ///
    /// Files parse in parallel; results are reassembled into (path, line)
    /// order before being returned, so parallelism never changes output.
    pub fn extract(&self, tree: &SourceTree) -> ExtractionReport {
        let per_file: Vec<Result<Vec<CallSite>, String>> = tree
            .files()
            .par_iter()
            .map(|file| self.extract_file(file))
            .collect();

        let mut report = ExtractionReport::default();
        for outcome in per_file {
            match outcome {
                Ok(calls) => {
                    report.files_parsed += 1;
                    report.call_sites.extend(calls);
                }
                Err(warning) => {
                    report.files_skipped += 1;
                    report.warnings.push(warning);
                }
            }
        }

        report
            .call_sites
            .sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));

        for site in &report.call_sites {
            if !site.is_attributed() {
                report.unattributed += 1;
                report.warnings.push(format!(
                    "call at {}:{} is outside any service directory and cannot be attributed",
                    site.file.display(),
                    site.line
                ));
            }
        }

        debug!(
            files_parsed = report.files_parsed,
            files_skipped = report.files_skipped,
            calls = report.call_sites.len(),
            "extraction complete"
        );

        report
    }

    /// Extracts call sites from one file. `Err` carries the warning text for
    /// a file that could not be parsed.
    pub fn extract_file(&self, file: &SourceFile) -> Result<Vec<CallSite>, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::language())
            .map_err(|e| format!("failed to load python grammar: {e}"))?;

        let tree = parser
            .parse(&file.content, None)
            .ok_or_else(|| format!("failed to parse {}", file.path.display()))?;
        if tree.root_node().has_error() {
            return Err(format!(
                "failed to parse {}: file contains syntax errors",
                file.path.display()
            ));
        }

        let caller = caller_service(&file.path);
        let raw_calls =
            FileVisitor::new(file.content.as_bytes(), &self.client_modules).visit(&tree);

        Ok(raw_calls
            .into_iter()
            .map(|call| CallSite {
                caller: caller.clone(),
                method: call.method,
                raw_expr: call.raw_expr,
                url: call.url,
                fully_resolved: call.complete,
                file: file.path.clone(),
                line: call.line,
            })
            .collect())
    }
}

/// Directory-as-service convention: the first path segment under the source
/// root names the calling service. Files directly at the root have no
/// service to attribute to.
fn caller_service(path: &std::path::Path) -> String {
    let mut components = path.components();
    let first = components.next();
    if components.next().is_none() {
        return String::new();
    }
    match first {
        Some(Component::Normal(segment)) => segment.to_string_lossy().into_owned(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_source(files: Vec<(&str, &str)>) -> ExtractionReport {
        let tree = SourceTree::from_pairs("/repo", files);
        CallExtractor::new(&AnalyzerConfig::default()).extract(&tree)
    }

    #[test]
    fn test_requests_module_call() {
        let report = extract_source(vec![(
            "orders/api.py",
            r#"
import requests

def charge():
    requests.post("http://payment-gateway.internal/api/charge")
"#,
        )]);

        assert_eq!(report.call_sites.len(), 1);
        let site = &report.call_sites[0];
        assert_eq!(site.caller, "orders");
        assert_eq!(site.method, HttpMethod::Post);
        assert_eq!(site.url, "http://payment-gateway.internal/api/charge");
        assert!(site.fully_resolved);
        assert_eq!(site.line, 5);
    }

    #[test]
    fn test_client_receiver_requires_url_shape() {
        let report = extract_source(vec![(
            "svc/app.py",
            r#"
client.get("/api/items")
cache.get("some_key")
"#,
        )]);

        assert_eq!(report.call_sites.len(), 1);
        assert_eq!(report.call_sites[0].url, "/api/items");
    }

    #[test]
    fn test_request_method_call_with_explicit_verb() {
        let report = extract_source(vec![(
            "svc/app.py",
            r#"client.request("DELETE", "http://inventory.internal/items/1")"#,
        )]);

        assert_eq!(report.call_sites.len(), 1);
        assert_eq!(report.call_sites[0].method, HttpMethod::Delete);
        assert_eq!(report.call_sites[0].url, "http://inventory.internal/items/1");
    }

    #[test]
    fn test_constant_folding_across_module() {
        let report = extract_source(vec![(
            "svc/app.py",
            r#"
BASE_URL = "http://billing.internal"

def fetch():
    return httpx.get(BASE_URL + "/invoices")
"#,
        )]);

        assert_eq!(report.call_sites.len(), 1);
        assert_eq!(report.call_sites[0].url, "http://billing.internal/invoices");
        assert!(report.call_sites[0].fully_resolved);
    }

    #[test]
    fn test_partial_resolution_tags_call_site() {
        let report = extract_source(vec![(
            "svc/app.py",
            r#"requests.get(f"http://users.internal/users/{user_id}")"#,
        )]);

        assert_eq!(report.call_sites.len(), 1);
        assert!(!report.call_sites[0].fully_resolved);
        assert_eq!(report.call_sites[0].url, "http://users.internal/users/{?}");
    }

    #[test]
    fn test_parse_failure_is_warning_not_error() {
        let report = extract_source(vec![
            ("svc/broken.py", "def broken(:\n  pass"),
            ("svc/ok.py", r#"requests.get("http://a.internal/x")"#),
        ]);

        assert_eq!(report.files_parsed, 1);
        assert_eq!(report.files_skipped, 1);
        assert!(report.warnings.iter().any(|w| w.contains("svc/broken.py")));
        assert!(report
            .call_sites
            .iter()
            .any(|s| s.file == PathBuf::from("svc/ok.py")));
    }

    #[test]
    fn test_root_level_file_is_unattributed() {
        let report = extract_source(vec![(
            "conftest.py",
            r#"requests.get("http://svc.internal/health")"#,
        )]);

        assert_eq!(report.call_sites.len(), 1);
        assert!(!report.call_sites[0].is_attributed());
        assert_eq!(report.unattributed, 1);
        assert!(report.warnings.iter().any(|w| w.contains("conftest.py")));
    }

    #[test]
    fn test_deterministic_ordering() {
        let files = vec![
            (
                "b_svc/app.py",
                r#"
requests.get("http://one.internal/a")
requests.get("http://two.internal/b")
"#,
            ),
            ("a_svc/app.py", r#"requests.get("http://three.internal/c")"#),
        ];

        let first = extract_source(files.clone());
        let second = extract_source(files);

        let keys = |report: &ExtractionReport| {
            report
                .call_sites
                .iter()
                .map(|s| (s.file.clone(), s.line))
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(&first), keys(&second));
        assert_eq!(first.call_sites[0].file, PathBuf::from("a_svc/app.py"));
    }
}

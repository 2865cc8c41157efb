//! Syntax-tree visitor that finds HTTP client invocations.
//!
//! The walk dispatches on a closed set of node kinds rather than matching
//! kind strings ad hoc at every site; everything the extractor does not
//! understand falls through [`SyntaxKind::Other`].

use std::collections::HashMap;

use tree_sitter::{Node, Tree};

use super::url::{resolve_expr, ResolvedText};
use super::HttpMethod;

/// Node kinds the extractor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyntaxKind {
    Call,
    Assignment,
    Other,
}

fn classify(kind: &str) -> SyntaxKind {
    match kind {
        "call" => SyntaxKind::Call,
        "assignment" => SyntaxKind::Assignment,
        _ => SyntaxKind::Other,
    }
}

/// One matched HTTP invocation, before caller attribution.
#[derive(Debug, Clone)]
pub(crate) struct RawCall {
    pub method: HttpMethod,
    pub raw_expr: String,
    pub url: String,
    pub complete: bool,
    pub line: usize,
}

pub(crate) struct FileVisitor<'a> {
    src: &'a [u8],
    client_modules: &'a [String],
    consts: HashMap<String, String>,
    calls: Vec<RawCall>,
}

impl<'a> FileVisitor<'a> {
    pub fn new(src: &'a [u8], client_modules: &'a [String]) -> Self {
        Self {
            src,
            client_modules,
            consts: HashMap::new(),
            calls: Vec::new(),
        }
    }

    pub fn visit(mut self, tree: &Tree) -> Vec<RawCall> {
        self.collect_constants(tree.root_node());
        self.walk(tree.root_node());
        self.calls
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.src).unwrap_or_default()
    }

    /// Collects module-level string assignments (`BASE_URL = "http://..."`)
    /// so later expressions can fold them in. Assignments are processed in
    /// order, so a constant may reference an earlier one.
    fn collect_constants(&mut self, root: Node<'_>) {
        let mut cursor = root.walk();
        let statements: Vec<_> = root.named_children(&mut cursor).collect();
        for stmt in statements {
            if stmt.kind() != "expression_statement" {
                continue;
            }
            let Some(inner) = stmt.named_child(0) else {
                continue;
            };
            if classify(inner.kind()) != SyntaxKind::Assignment {
                continue;
            }
            let (Some(left), Some(right)) = (
                inner.child_by_field_name("left"),
                inner.child_by_field_name("right"),
            ) else {
                continue;
            };
            if left.kind() != "identifier" {
                continue;
            }
            let value = resolve_expr(right, self.src, &self.consts);
            if value.complete && !value.text.is_empty() {
                self.consts.insert(self.text(left).to_string(), value.text);
            }
        }
    }

    fn walk(&mut self, root: Node<'_>) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if classify(node.kind()) == SyntaxKind::Call {
                self.match_call(node);
            }
            // Reverse push keeps source order once popped.
            for i in (0..node.named_child_count()).rev() {
                if let Some(child) = node.named_child(i) {
                    stack.push(child);
                }
            }
        }
    }

    fn match_call(&mut self, node: Node<'_>) {
        let (Some(function), Some(args)) = (
            node.child_by_field_name("function"),
            node.child_by_field_name("arguments"),
        ) else {
            return;
        };
        if function.kind() != "attribute" {
            return;
        }
        let (Some(object), Some(attr)) = (
            function.child_by_field_name("object"),
            function.child_by_field_name("attribute"),
        ) else {
            return;
        };

        let attr_name = self.text(attr);
        let (positional, keyword) = self.split_arguments(args);

        let is_client_module = object.kind() == "identifier"
            && self.client_modules.iter().any(|m| m == self.text(object));

        let (method, url_node) = if let Some(method) = HttpMethod::from_name(attr_name) {
            // `requests.get(url)` / `client.post(url)` style.
            let url_node = positional
                .first()
                .copied()
                .or_else(|| keyword.get("url").copied());
            (Some(method), url_node)
        } else if attr_name == "request" {
            // `client.request("GET", url)` style: the verb is an argument.
            let method_node = positional
                .first()
                .copied()
                .or_else(|| keyword.get("method").copied());
            let method = method_node.and_then(|n| {
                let resolved = resolve_expr(n, self.src, &self.consts);
                resolved
                    .complete
                    .then(|| HttpMethod::from_name(&resolved.text))
                    .flatten()
            });
            let url_node = positional
                .get(1)
                .copied()
                .or_else(|| keyword.get("url").copied());
            (method, url_node)
        } else {
            return;
        };

        let (Some(method), Some(url_node)) = (method, url_node) else {
            return;
        };

        let resolved = resolve_expr(url_node, self.src, &self.consts);
        if resolved.text.is_empty() {
            return;
        }
        // Verb calls on arbitrary receivers match only when the argument is
        // URL-shaped; known client modules match unconditionally.
        if !is_client_module && !looks_like_url(&resolved) {
            return;
        }

        self.calls.push(RawCall {
            method,
            raw_expr: self.text(url_node).to_string(),
            url: resolved.text,
            complete: resolved.complete,
            line: node.start_position().row + 1,
        });
    }

    fn split_arguments<'t>(
        &self,
        args: Node<'t>,
    ) -> (Vec<Node<'t>>, HashMap<&'a str, Node<'t>>) {
        let mut positional = Vec::new();
        let mut keyword = HashMap::new();
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            if arg.kind() == "keyword_argument" {
                if let (Some(name), Some(value)) = (
                    arg.child_by_field_name("name"),
                    arg.child_by_field_name("value"),
                ) {
                    keyword.insert(self.text(name), value);
                }
            } else if arg.kind() != "comment" {
                positional.push(arg);
            }
        }
        (positional, keyword)
    }
}

fn looks_like_url(resolved: &ResolvedText) -> bool {
    resolved.text.starts_with("http") || resolved.text.contains('/')
}

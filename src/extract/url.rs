//! Static resolution of URL argument expressions.
//!
//! A URL argument is resolved as far as the syntax tree allows: string
//! literals, `+` concatenation, implicit literal concatenation, f-string
//! interpolations and `str.format` calls over literals and module-level
//! constants fold to their full text. Any segment that needs runtime data
//! becomes the `{?}` placeholder and marks the result incomplete.

use std::collections::HashMap;

use tree_sitter::Node;

/// Marker inserted for a URL segment that cannot be resolved at parse time.
pub const PLACEHOLDER: &str = "{?}";

/// Outcome of resolving one expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedText {
    pub text: String,
    pub complete: bool,
}

impl ResolvedText {
    fn literal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            complete: true,
        }
    }

    fn placeholder() -> Self {
        Self {
            text: PLACEHOLDER.to_string(),
            complete: false,
        }
    }

    fn join(parts: Vec<ResolvedText>) -> Self {
        let complete = parts.iter().all(|p| p.complete);
        Self {
            text: parts.into_iter().map(|p| p.text).collect(),
            complete,
        }
    }
}

fn node_text<'a>(node: Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or_default()
}

/// Resolves an expression node to its best-effort string value.
pub(crate) fn resolve_expr(
    node: Node,
    src: &[u8],
    consts: &HashMap<String, String>,
) -> ResolvedText {
    match node.kind() {
        "string" => resolve_string(node, src, consts),
        "concatenated_string" => {
            let mut cursor = node.walk();
            let parts = node
                .named_children(&mut cursor)
                .map(|child| resolve_expr(child, src, consts))
                .collect();
            ResolvedText::join(parts)
        }
        "binary_operator" => resolve_binary(node, src, consts),
        "parenthesized_expression" => match node.named_child(0) {
            Some(inner) => resolve_expr(inner, src, consts),
            None => ResolvedText::placeholder(),
        },
        "identifier" => match consts.get(node_text(node, src)) {
            Some(value) => ResolvedText::literal(value.clone()),
            None => ResolvedText::placeholder(),
        },
        // `settings.BASE_URL` style access: fall back to the attribute name
        // against the constant table, the object is opaque.
        "attribute" => {
            let name = node
                .child_by_field_name("attribute")
                .map(|n| node_text(n, src))
                .unwrap_or_default();
            match consts.get(name) {
                Some(value) => ResolvedText::literal(value.clone()),
                None => ResolvedText::placeholder(),
            }
        }
        "call" => resolve_format_call(node, src, consts),
        _ => ResolvedText::placeholder(),
    }
}

fn resolve_string(node: Node, src: &[u8], consts: &HashMap<String, String>) -> ResolvedText {
    let mut text = String::new();
    let mut complete = true;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "string_content" | "escape_sequence" => text.push_str(node_text(child, src)),
            "interpolation" => match child.named_child(0) {
                Some(expr) => {
                    let inner = resolve_expr(expr, src, consts);
                    if inner.complete {
                        text.push_str(&inner.text);
                    } else {
                        text.push_str(PLACEHOLDER);
                        complete = false;
                    }
                }
                None => {
                    text.push_str(PLACEHOLDER);
                    complete = false;
                }
            },
            _ => {}
        }
    }

    ResolvedText { text, complete }
}

fn resolve_binary(node: Node, src: &[u8], consts: &HashMap<String, String>) -> ResolvedText {
    let operator = node
        .child_by_field_name("operator")
        .map(|n| node_text(n, src))
        .unwrap_or_default();
    if operator != "+" {
        return ResolvedText::placeholder();
    }

    let left = node.child_by_field_name("left");
    let right = node.child_by_field_name("right");
    match (left, right) {
        (Some(l), Some(r)) => ResolvedText::join(vec![
            resolve_expr(l, src, consts),
            resolve_expr(r, src, consts),
        ]),
        _ => ResolvedText::placeholder(),
    }
}

/// Handles `"...".format(...)`. Any other call is opaque.
fn resolve_format_call(
    node: Node,
    src: &[u8],
    consts: &HashMap<String, String>,
) -> ResolvedText {
    let Some(function) = node.child_by_field_name("function") else {
        return ResolvedText::placeholder();
    };
    if function.kind() != "attribute" {
        return ResolvedText::placeholder();
    }
    let attr = function
        .child_by_field_name("attribute")
        .map(|n| node_text(n, src))
        .unwrap_or_default();
    let Some(object) = function.child_by_field_name("object") else {
        return ResolvedText::placeholder();
    };
    if attr != "format" {
        return ResolvedText::placeholder();
    }

    let base = resolve_expr(object, src, consts);

    let mut positional: Vec<ResolvedText> = Vec::new();
    let mut named: HashMap<String, ResolvedText> = HashMap::new();
    if let Some(args) = node.child_by_field_name("arguments") {
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            if arg.kind() == "keyword_argument" {
                let name = arg
                    .child_by_field_name("name")
                    .map(|n| node_text(n, src).to_string())
                    .unwrap_or_default();
                if let Some(value) = arg.child_by_field_name("value") {
                    named.insert(name, resolve_expr(value, src, consts));
                }
            } else if arg.kind() != "comment" {
                positional.push(resolve_expr(arg, src, consts));
            }
        }
    }

    substitute_format_slots(&base, &positional, &named)
}

fn substitute_format_slots(
    base: &ResolvedText,
    positional: &[ResolvedText],
    named: &HashMap<String, ResolvedText>,
) -> ResolvedText {
    let mut out = String::new();
    let mut complete = base.complete;
    let mut next_positional = 0usize;

    let mut chars = base.text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        // Literal `{{`.
        if chars.peek() == Some(&'{') {
            chars.next();
            out.push('{');
            continue;
        }

        let mut slot = String::new();
        for inner in chars.by_ref() {
            if inner == '}' {
                break;
            }
            slot.push(inner);
        }
        let name = slot.split(':').next().unwrap_or_default();

        let value = if name.is_empty() {
            let value = positional.get(next_positional);
            next_positional += 1;
            value
        } else if let Ok(index) = name.parse::<usize>() {
            positional.get(index)
        } else {
            named.get(name)
        };

        match value {
            Some(v) if v.complete => out.push_str(&v.text),
            _ => {
                out.push_str(PLACEHOLDER);
                complete = false;
            }
        }
    }

    ResolvedText { text: out, complete }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn resolve_first_arg(source: &str, consts: &HashMap<String, String>) -> ResolvedText {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::language())
            .unwrap();
        let tree = parser.parse(source, None).unwrap();
        let root = tree.root_node();

        // Find the outermost call's first argument.
        let stmt = root.named_child(0).unwrap();
        let call = stmt.named_child(0).unwrap();
        assert_eq!(call.kind(), "call");
        let args = call.child_by_field_name("arguments").unwrap();
        let arg = args.named_child(0).unwrap();
        resolve_expr(arg, source.as_bytes(), consts)
    }

    #[test]
    fn test_plain_literal() {
        let resolved = resolve_first_arg(r#"requests.get("http://svc/api")"#, &HashMap::new());
        assert_eq!(resolved.text, "http://svc/api");
        assert!(resolved.complete);
    }

    #[test]
    fn test_concatenation_of_literals() {
        let resolved =
            resolve_first_arg(r#"requests.get("http://svc" + "/api")"#, &HashMap::new());
        assert_eq!(resolved.text, "http://svc/api");
        assert!(resolved.complete);
    }

    #[test]
    fn test_concatenation_with_constant() {
        let mut consts = HashMap::new();
        consts.insert("BASE".to_string(), "http://svc".to_string());
        let resolved = resolve_first_arg(r#"requests.get(BASE + "/api")"#, &consts);
        assert_eq!(resolved.text, "http://svc/api");
        assert!(resolved.complete);
    }

    #[test]
    fn test_fstring_with_unknown_variable() {
        let resolved = resolve_first_arg(
            r#"requests.get(f"http://svc/items/{item_id}")"#,
            &HashMap::new(),
        );
        assert_eq!(resolved.text, "http://svc/items/{?}");
        assert!(!resolved.complete);
    }

    #[test]
    fn test_fstring_with_known_constant() {
        let mut consts = HashMap::new();
        consts.insert("HOST".to_string(), "billing.internal".to_string());
        let resolved = resolve_first_arg(r#"requests.get(f"http://{HOST}/api")"#, &consts);
        assert_eq!(resolved.text, "http://billing.internal/api");
        assert!(resolved.complete);
    }

    #[test]
    fn test_format_call_positional() {
        let resolved = resolve_first_arg(
            r#"requests.get("http://{}/api".format("billing"))"#,
            &HashMap::new(),
        );
        assert_eq!(resolved.text, "http://billing/api");
        assert!(resolved.complete);
    }

    #[test]
    fn test_format_call_with_runtime_value() {
        let resolved = resolve_first_arg(
            r#"requests.get("http://svc/items/{}".format(item.id))"#,
            &HashMap::new(),
        );
        assert_eq!(resolved.text, "http://svc/items/{?}");
        assert!(!resolved.complete);
    }

    #[test]
    fn test_opaque_expression_is_placeholder() {
        let resolved = resolve_first_arg(r#"requests.get(build_url())"#, &HashMap::new());
        assert_eq!(resolved.text, PLACEHOLDER);
        assert!(!resolved.complete);
    }
}

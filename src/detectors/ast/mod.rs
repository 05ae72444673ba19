//! detectors/ast
//!
//! Structural extraction: parse a source file into a summary of its
//! callables and types without executing it.
//!
//! Parsing never fails outward. A file the grammar rejects comes back
//! with `parse_failed = true`, no functions or types, and its raw text
//! intact so the caller can still prompt from content alone.

mod python;
mod rust;

use std::cell::RefCell;

use tree_sitter::{Node, Parser, Tree};

use crate::detectors::language::Language;
use crate::state::StructuralSummary;

thread_local! {
    static PY_PARSER: RefCell<Option<Parser>> = RefCell::new(make_parser(&tree_sitter_python::language()));
    static RS_PARSER: RefCell<Option<Parser>> = RefCell::new(make_parser(&tree_sitter_rust::language()));
}

fn make_parser(language: &tree_sitter::Language) -> Option<Parser> {
    let mut p = Parser::new();
    p.set_language(language).ok()?;
    Some(p)
}

pub fn parse_source(language: Language, source: &str) -> Option<Tree> {
    let parse = |cell: &RefCell<Option<Parser>>| {
        cell.borrow_mut().as_mut().and_then(|p| p.parse(source, None))
    };

    match language {
        Language::Python => PY_PARSER.with(parse),
        Language::Rust => RS_PARSER.with(parse),
        Language::Unknown => None,
    }
}

pub fn extract_summary(filepath: &str, content: String) -> StructuralSummary {
    let language = Language::from_path(filepath);

    let tree = match parse_source(language, &content) {
        Some(t) if !t.root_node().has_error() => t,
        _ => return StructuralSummary::unparsed(filepath, content),
    };

    let root = tree.root_node();
    let (functions, types) = match language {
        Language::Python => python::collect(root, &content),
        Language::Rust => rust::collect(root, &content),
        Language::Unknown => (Vec::new(), Vec::new()),
    };

    StructuralSummary {
        filepath: filepath.to_string(),
        functions,
        types,
        raw_content: content,
        parse_failed: false,
    }
}

pub(crate) fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

pub(crate) fn field_text(node: Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source).to_string())
}

/// Strip shared indentation and surrounding blank lines from a doc block.
pub(crate) fn clean_doc(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let first = lines[0].trim();
    let indent = lines[1..]
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out = vec![first.to_string()];
    for l in lines.drain(1..) {
        let cut = l.len().min(indent);
        let body = if l.is_char_boundary(cut) { &l[cut..] } else { l.trim_start() };
        out.push(body.trim_end().to_string());
    }

    while out.first().is_some_and(|l| l.is_empty()) {
        out.remove(0);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_python_keeps_raw_content() {
        let src = "def broken(:\n    return\n".to_string();
        let s = extract_summary("app/broken.py", src.clone());

        assert!(s.parse_failed);
        assert!(s.functions.is_empty());
        assert!(s.types.is_empty());
        assert_eq!(s.raw_content, src);
    }

    #[test]
    fn unknown_extension_is_raw_only() {
        let s = extract_summary("app/page.html", "<p>hi</p>".into());
        assert!(s.parse_failed);
        assert_eq!(s.raw_content, "<p>hi</p>");
    }

    #[test]
    fn empty_module_has_no_surface() {
        let s = extract_summary("app/__init__.py", "# package\nVERSION = '1'\n".into());
        assert!(!s.parse_failed);
        assert!(!s.has_testable_surface());
    }

    #[test]
    fn clean_doc_dedents_continuation_lines() {
        let raw = "Summary line.\n\n        Details here.\n          nested\n    ";
        assert_eq!(clean_doc(raw), "Summary line.\n\nDetails here.\n  nested");
    }
}

use tree_sitter::Node;

use super::{clean_doc, field_text, node_text};
use crate::state::{FunctionInfo, TypeInfo};

/// Top-level functions and classes, in source order.
pub(super) fn collect(root: Node, src: &str) -> (Vec<FunctionInfo>, Vec<TypeInfo>) {
    let mut functions = Vec::new();
    let mut types = Vec::new();

    let mut w = root.walk();
    for node in root.named_children(&mut w) {
        let node = unwrap_decorated(node);
        match node.kind() {
            "function_definition" => functions.push(function_info(node, src, false)),
            "class_definition" => types.push(class_info(node, src)),
            _ => {}
        }
    }

    (functions, types)
}

fn unwrap_decorated(node: Node) -> Node {
    if node.kind() == "decorated_definition" {
        node.child_by_field_name("definition").unwrap_or(node)
    } else {
        node
    }
}

fn class_info(node: Node, src: &str) -> TypeInfo {
    let mut methods = Vec::new();

    if let Some(body) = node.child_by_field_name("body") {
        let mut w = body.walk();
        for child in body.named_children(&mut w) {
            let child = unwrap_decorated(child);
            if child.kind() == "function_definition" {
                methods.push(function_info(child, src, true));
            }
        }
    }

    TypeInfo {
        name: field_text(node, "name", src).unwrap_or_default(),
        doc: docstring(node, src),
        methods,
    }
}

fn function_info(node: Node, src: &str, is_method: bool) -> FunctionInfo {
    let mut params = node
        .child_by_field_name("parameters")
        .map(|p| param_names(p, src))
        .unwrap_or_default();

    if is_method && params.first().is_some_and(|p| p == "self" || p == "cls") {
        params.remove(0);
    }

    FunctionInfo {
        name: field_text(node, "name", src).unwrap_or_default(),
        params,
        doc: docstring(node, src),
    }
}

/// Named parameters only; `*args`, `**kwargs` and bare separators are skipped.
fn param_names(params: Node, src: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut w = params.walk();

    for p in params.named_children(&mut w) {
        let name = match p.kind() {
            "identifier" => Some(node_text(p, src).to_string()),
            "default_parameter" | "typed_default_parameter" => field_text(p, "name", src),
            "typed_parameter" => p
                .named_child(0)
                .filter(|n| n.kind() == "identifier")
                .map(|n| node_text(n, src).to_string()),
            _ => None,
        };
        if let Some(n) = name {
            out.push(n);
        }
    }

    out
}

fn docstring(def: Node, src: &str) -> String {
    let Some(body) = def.child_by_field_name("body") else {
        return String::new();
    };
    let Some(first) = body.named_child(0) else {
        return String::new();
    };
    if first.kind() != "expression_statement" {
        return String::new();
    }

    first
        .named_child(0)
        .filter(|n| n.kind() == "string")
        .map(|n| clean_doc(&string_value(node_text(n, src))))
        .unwrap_or_default()
}

fn string_value(literal: &str) -> String {
    let s = literal.trim_start_matches(|c: char| "rRuUbBfF".contains(c));
    for q in ["\"\"\"", "'''", "\"", "'"] {
        if s.len() >= 2 * q.len() && s.starts_with(q) && s.ends_with(q) {
            return s[q.len()..s.len() - q.len()].to_string();
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use crate::detectors::ast::extract_summary;

    const MODELS: &str = r#"import uuid

class Task:
    """Task model representing a task in the system."""

    def __init__(self, title, description="", status="pending"):
        """Initialize a new task."""
        self.title = title

    @staticmethod
    def from_row(row: dict, strict: bool = False):
        return Task(row["title"])

def add_sample_data(count, *args, **kwargs):
    '''
    Seed the store.

        Used by the demo app.
    '''
    pass
"#;

    #[test]
    fn extracts_classes_methods_and_functions() {
        let s = extract_summary("app/models.py", MODELS.to_string());
        assert!(!s.parse_failed);

        assert_eq!(s.types.len(), 1);
        let task = &s.types[0];
        assert_eq!(task.name, "Task");
        assert_eq!(task.doc, "Task model representing a task in the system.");

        let names: Vec<_> = task.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["__init__", "from_row"]);
        assert_eq!(task.methods[0].params, ["title", "description", "status"]);
        assert_eq!(task.methods[0].doc, "Initialize a new task.");
        assert_eq!(task.methods[1].params, ["row", "strict"]);

        assert_eq!(s.functions.len(), 1);
        assert_eq!(s.functions[0].name, "add_sample_data");
        assert_eq!(s.functions[0].params, ["count"]);
        assert_eq!(s.functions[0].doc, "Seed the store.\n\n    Used by the demo app.");
    }

    #[test]
    fn methods_are_not_reported_as_functions() {
        let s = extract_summary("app/models.py", MODELS.to_string());
        assert!(s.functions.iter().all(|f| f.name != "__init__"));
    }

    #[test]
    fn decorated_route_handlers_are_functions() {
        let src = "@api_bp.route('/tasks')\ndef get_tasks():\n    return []\n";
        let s = extract_summary("app/routes.py", src.to_string());
        assert_eq!(s.functions.len(), 1);
        assert_eq!(s.functions[0].name, "get_tasks");
        assert!(s.functions[0].params.is_empty());
    }
}

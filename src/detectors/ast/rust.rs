use tree_sitter::Node;

use super::{clean_doc, field_text, node_text};
use crate::state::{FunctionInfo, TypeInfo};

/// Free functions, plus structs/enums/traits with their `impl` methods.
pub(super) fn collect(root: Node, src: &str) -> (Vec<FunctionInfo>, Vec<TypeInfo>) {
    let mut functions = Vec::new();
    let mut types: Vec<TypeInfo> = Vec::new();

    let mut w = root.walk();
    for node in root.named_children(&mut w) {
        match node.kind() {
            "function_item" => functions.push(function_info(node, src)),
            "struct_item" | "enum_item" | "trait_item" => {
                let name = field_text(node, "name", src).unwrap_or_default();
                let methods = node
                    .child_by_field_name("body")
                    .filter(|_| node.kind() == "trait_item")
                    .map(|b| methods_in(b, src))
                    .unwrap_or_default();
                let doc = doc_comment(node, src);

                let entry = type_entry(&mut types, &name);
                entry.doc = doc;
                entry.methods.extend(methods);
            }
            "impl_item" => {
                // `impl Trait for Foo` methods belong to Foo
                let name = node
                    .child_by_field_name("type")
                    .map(|t| base_type_name(node_text(t, src)))
                    .unwrap_or_default();
                let methods = node
                    .child_by_field_name("body")
                    .map(|b| methods_in(b, src))
                    .unwrap_or_default();

                type_entry(&mut types, &name).methods.extend(methods);
            }
            _ => {}
        }
    }

    (functions, types)
}

fn type_entry<'t>(types: &'t mut Vec<TypeInfo>, name: &str) -> &'t mut TypeInfo {
    let idx = match types.iter().position(|t| t.name == name) {
        Some(i) => i,
        None => {
            types.push(TypeInfo {
                name: name.to_string(),
                doc: String::new(),
                methods: Vec::new(),
            });
            types.len() - 1
        }
    };
    &mut types[idx]
}

fn base_type_name(text: &str) -> String {
    text.split('<').next().unwrap_or(text).trim().to_string()
}

fn methods_in(body: Node, src: &str) -> Vec<FunctionInfo> {
    let mut out = Vec::new();
    let mut w = body.walk();
    for child in body.named_children(&mut w) {
        if matches!(child.kind(), "function_item" | "function_signature_item") {
            out.push(function_info(child, src));
        }
    }
    out
}

fn function_info(node: Node, src: &str) -> FunctionInfo {
    let mut params = Vec::new();

    if let Some(list) = node.child_by_field_name("parameters") {
        let mut w = list.walk();
        for p in list.named_children(&mut w) {
            if p.kind() != "parameter" {
                continue;
            }
            if let Some(pat) = field_text(p, "pattern", src) {
                params.push(pat.trim_start_matches("mut ").trim().to_string());
            }
        }
    }

    FunctionInfo {
        name: field_text(node, "name", src).unwrap_or_default(),
        params,
        doc: doc_comment(node, src),
    }
}

/// Outer `///` lines directly above an item; attributes in between are skipped.
fn doc_comment(item: Node, src: &str) -> String {
    let mut lines = Vec::new();
    let mut cur = item.prev_named_sibling();

    while let Some(n) = cur {
        match n.kind() {
            "attribute_item" => {}
            "line_comment" => {
                let text = node_text(n, src).trim();
                if !text.starts_with("///") || text.starts_with("////") {
                    break;
                }
                lines.push(text.trim_start_matches("///").to_string());
            }
            _ => break,
        }
        cur = n.prev_named_sibling();
    }

    lines.reverse();
    clean_doc(&format!("\n{}", lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use crate::detectors::ast::extract_summary;

    const SRC: &str = r#"
/// A queued job.
#[derive(Debug)]
pub struct Job {
    id: u64,
}

impl Job {
    /// Build a job.
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn bump(&mut self, by: u64) {
        self.id += by;
    }
}

// not a doc comment
pub fn schedule(jobs: &[Job], mut limit: usize) -> usize {
    limit = limit.min(jobs.len());
    limit
}
"#;

    #[test]
    fn groups_impl_methods_under_their_type() {
        let s = extract_summary("src/jobs.rs", SRC.to_string());
        assert!(!s.parse_failed);

        assert_eq!(s.types.len(), 1);
        let job = &s.types[0];
        assert_eq!(job.name, "Job");
        assert_eq!(job.doc, "A queued job.");
        assert_eq!(job.methods.len(), 2);
        assert_eq!(job.methods[0].name, "new");
        assert_eq!(job.methods[0].params, ["id"]);
        assert_eq!(job.methods[0].doc, "Build a job.");
        assert_eq!(job.methods[1].params, ["by"]);
    }

    #[test]
    fn free_functions_skip_plain_comments() {
        let s = extract_summary("src/jobs.rs", SRC.to_string());
        assert_eq!(s.functions.len(), 1);
        assert_eq!(s.functions[0].name, "schedule");
        assert_eq!(s.functions[0].params, ["jobs", "limit"]);
        assert!(s.functions[0].doc.is_empty());
    }
}

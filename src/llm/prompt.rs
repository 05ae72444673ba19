use crate::detectors::language::Language;
use crate::state::{FunctionInfo, StructuralSummary};

/// Files longer than this (in characters) are cut to head + tail.
pub const TRUNCATE_THRESHOLD: usize = 6000;
/// Characters kept from each end of a truncated file.
pub const EXCERPT_HALF: usize = 3000;
pub const TRUNCATION_MARKER: &str = "\n...[content truncated]...\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub filepath: String,
    pub excerpt: String,
    pub text: String,
}

pub fn build_prompt(summary: &StructuralSummary) -> PromptRequest {
    let excerpt = excerpt(&summary.raw_content);
    let text = render(summary, &excerpt);

    PromptRequest {
        filepath: summary.filepath.clone(),
        excerpt,
        text,
    }
}

/// First and last `EXCERPT_HALF` characters around the marker, or the
/// whole content when it is at most `TRUNCATE_THRESHOLD` characters.
/// Just above the threshold the marker makes the excerpt slightly longer
/// than the input; the shape stays fixed regardless.
pub fn excerpt(content: &str) -> String {
    let total = content.chars().count();
    if total <= TRUNCATE_THRESHOLD {
        return content.to_string();
    }

    let head: String = content.chars().take(EXCERPT_HALF).collect();
    let tail: String = content.chars().skip(total - EXCERPT_HALF).collect();
    format!("{head}{TRUNCATION_MARKER}{tail}")
}

/* ============================================================
   Template
   ============================================================ */

fn render(s: &StructuralSummary, excerpt: &str) -> String {
    let language = Language::from_path(&s.filepath);
    let framework = language.test_framework();
    let fence = language.fence_tag();

    let mut out = String::new();

    out.push_str(&format!(
        "You are a code generation assistant. Generate only a valid test file for the source file below, using {framework}.\n\n"
    ));
    out.push_str(&format!("File Path: {}\n\n", s.filepath));

    out.push_str(&surface(s));

    out.push_str("File Content:\n");
    out.push_str(&format!("```{fence}\n{excerpt}\n```\n\n"));

    out.push_str("Instructions:\n");
    out.push_str("- Write tests for every function and method listed above.\n");
    out.push_str("- Put all imports the tests need at the top.\n");
    out.push_str(&format!(
        "- Follow {framework} conventions for fixtures and test isolation; every test must be independent.\n"
    ));
    out.push_str("- Cover edge cases and invalid inputs.\n");
    out.push_str("- Output only test code. No prose, no explanations, no commentary outside the code.\n\n");

    out.push_str("Output Format:\n");
    out.push_str(&format!("```{fence}\n<test code>\n```\n"));

    out
}

fn surface(s: &StructuralSummary) -> String {
    if s.parse_failed {
        return "Structure: unavailable (file could not be parsed); infer it from the content.\n\n"
            .into();
    }

    let mut out = String::from("Testable Surface:\n");
    for f in &s.functions {
        out.push_str(&format!("- function {}\n", signature(f)));
    }
    for t in &s.types {
        out.push_str(&format!("- type {}\n", t.name));
        for m in &t.methods {
            out.push_str(&format!("  - method {}\n", signature(m)));
        }
    }
    out.push('\n');
    out
}

fn signature(f: &FunctionInfo) -> String {
    let mut sig = format!("{}({})", f.name, f.params.join(", "));
    if let Some(line) = f.doc.lines().next().filter(|l| !l.is_empty()) {
        sig.push_str(&format!(": {line}"));
    }
    sig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TypeInfo;

    fn summary(content: String) -> StructuralSummary {
        StructuralSummary {
            filepath: "app/models.py".into(),
            functions: vec![FunctionInfo {
                name: "add_sample_data".into(),
                params: vec![],
                doc: "Seed the store.\nMore.".into(),
            }],
            types: vec![TypeInfo {
                name: "Task".into(),
                doc: String::new(),
                methods: vec![FunctionInfo {
                    name: "update".into(),
                    params: vec!["data".into()],
                    doc: String::new(),
                }],
            }],
            raw_content: content,
            parse_failed: false,
        }
    }

    #[test]
    fn short_content_is_embedded_whole() {
        let p = build_prompt(&summary("class Task: pass\n".into()));
        assert_eq!(p.excerpt, "class Task: pass\n");
        assert!(p.text.contains("File Path: app/models.py"));
        assert!(p.text.contains("class Task: pass"));
        assert!(p.text.contains("pytest"));
    }

    #[test]
    fn exactly_threshold_is_not_truncated() {
        let content = "x".repeat(TRUNCATE_THRESHOLD);
        assert_eq!(excerpt(&content), content);
    }

    #[test]
    fn long_content_keeps_head_and_tail() {
        let content = format!("{}{}{}", "a".repeat(3000), "m".repeat(1500), "z".repeat(3000));
        let ex = excerpt(&content);

        assert_eq!(ex, format!("{}{}{}", "a".repeat(3000), TRUNCATION_MARKER, "z".repeat(3000)));
        assert!(ex.chars().count() < content.chars().count());
    }

    #[test]
    fn just_over_threshold_is_cut_even_when_marker_outweighs_savings() {
        // 6001 chars: head + marker + tail is 6027, longer than the input
        let content = format!("{}b{}", "a".repeat(3000), "z".repeat(3000));
        let ex = excerpt(&content);

        assert_eq!(ex, format!("{}{}{}", "a".repeat(3000), TRUNCATION_MARKER, "z".repeat(3000)));
        assert_eq!(ex.chars().count(), 6000 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let content = "é".repeat(TRUNCATE_THRESHOLD + 1);
        let ex = excerpt(&content);
        assert_eq!(ex, format!("{}{}{}", "é".repeat(3000), TRUNCATION_MARKER, "é".repeat(3000)));
    }

    #[test]
    fn rendering_is_deterministic() {
        let s = summary("def f(): pass\n".into());
        assert_eq!(build_prompt(&s), build_prompt(&s));
    }

    #[test]
    fn lists_surface_with_doc_summary() {
        let p = build_prompt(&summary(String::new()));
        assert!(p.text.contains("- function add_sample_data(): Seed the store.\n"));
        assert!(p.text.contains("- type Task\n  - method update(data)\n"));
    }

    #[test]
    fn unparsed_files_still_get_content() {
        let s = StructuralSummary::unparsed("app/broken.py", "def (".into());
        let p = build_prompt(&s);
        assert!(p.text.contains("could not be parsed"));
        assert!(p.text.contains("def ("));
    }
}

// src/testgen/sanitize.rs
//
// Turns raw model output into test code: reasoning regions, merge
// conflict debris and markdown fences are removed. Pure and idempotent.

use std::sync::OnceLock;

use regex::Regex;

use crate::detectors::language::Language;
use crate::testgen::deps::infer_dependencies;

const REASONING_TAGS: [(&str, &str); 2] = [("<think>", "</think>"), ("<thinking>", "</thinking>")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub content: String,
    pub dependencies: Vec<String>,
}

pub fn sanitize_output(raw: &str, language: Language) -> Sanitized {
    let content = sanitize(raw);
    let dependencies = infer_dependencies(&content, language);
    Sanitized {
        content,
        dependencies,
    }
}

/// Apply every pass until nothing changes. Each pass only ever shortens
/// the text, so this terminates.
pub fn sanitize(raw: &str) -> String {
    let mut cur = raw.to_string();
    loop {
        let next = sanitize_once(&cur);
        if next == cur {
            return next;
        }
        cur = next;
    }
}

fn sanitize_once(text: &str) -> String {
    let text = strip_reasoning(text);
    let text = resolve_conflicts(&text);
    let text = extract_fenced(&text);
    text.trim().to_string()
}

/* ============================================================
   Reasoning regions
   ============================================================ */

fn reasoning_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<think>.*?</think>|<thinking>.*?</thinking>")
            .expect("reasoning pattern is valid")
    })
}

/// Matched pairs go first (non-greedy). Then a close with no opener means
/// everything before it was reasoning, and an opener with no close means
/// the reasoning ran to the end of the response.
fn strip_reasoning(text: &str) -> String {
    let mut out = reasoning_re().replace_all(text, "").into_owned();

    for (open, close) in REASONING_TAGS {
        if let Some(i) = out.find(close) {
            if !out[..i].contains(open) {
                out = out[i + close.len()..].to_string();
            }
        }
        if let Some(i) = out.find(open) {
            if !out[i..].contains(close) {
                out.truncate(i);
            }
        }
    }

    out
}

/* ============================================================
   Merge conflicts
   ============================================================ */

fn is_marker(line: &str, c: char) -> bool {
    let rest = match line.strip_prefix(&c.to_string().repeat(7)) {
        Some(r) => r,
        None => return false,
    };
    if c == '=' {
        rest.trim().is_empty()
    } else {
        rest.is_empty() || rest.starts_with(char::is_whitespace)
    }
}

fn is_any_marker(line: &str) -> bool {
    ['<', '|', '=', '>'].into_iter().any(|c| is_marker(line, c))
}

/// For `<<<<<<< ... ======= ... >>>>>>>`, keep only the part after the
/// separator. Unpaired marker lines are dropped on their own.
fn resolve_conflicts(text: &str) -> String {
    if !text.lines().any(is_any_marker) {
        return text.to_string();
    }

    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if is_marker(line, '<') {
            if let Some((sep, end)) = conflict_block(&lines, i) {
                out.extend(&lines[sep + 1..end]);
                i = end + 1;
                continue;
            }
        }

        if !is_any_marker(line) {
            out.push(line);
        }
        i += 1;
    }

    out.join("\n")
}

fn conflict_block(lines: &[&str], start: usize) -> Option<(usize, usize)> {
    let mut sep = None;
    for (j, line) in lines.iter().enumerate().skip(start + 1) {
        if is_marker(line, '<') {
            return None;
        }
        match sep {
            None if is_marker(line, '=') => sep = Some(j),
            Some(s) if is_marker(line, '>') => return Some((s, j)),
            _ => {}
        }
    }
    None
}

/* ============================================================
   Markdown fences
   ============================================================ */

/// When the reply wraps code in fences, keep only the fenced bodies.
fn extract_fenced(text: &str) -> String {
    if !text.lines().any(|l| l.trim_start().starts_with("```")) {
        return text.to_string();
    }

    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        let fence = line.trim_start().starts_with("```");
        match (&mut current, fence) {
            (None, true) => current = Some(Vec::new()),
            (Some(body), true) => {
                blocks.push(body.join("\n"));
                current = None;
            }
            (Some(body), false) => body.push(line),
            (None, false) => {}
        }
    }
    if let Some(body) = current {
        blocks.push(body.join("\n"));
    }

    blocks
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

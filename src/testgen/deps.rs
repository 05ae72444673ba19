// src/testgen/deps.rs
//
// Import scanning for generated tests, and the line-oriented
// dependency manifest it feeds. Names are a heuristic: an import does
// not prove an installable package exists under that name.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::detectors::language::Language;
use crate::error::ManifestError;

// Top-level names from CPython's `sys.stdlib_module_names` (3.11).
const PYTHON_STDLIB: &[&str] = &[
    "__future__", "abc", "aifc", "antigravity", "argparse", "array", "ast", "asynchat",
    "asyncio", "asyncore", "atexit", "audioop", "base64", "bdb", "binascii", "bisect",
    "builtins", "bz2", "calendar", "cgi", "cgitb", "chunk", "cmath", "cmd", "code", "codecs",
    "codeop", "collections", "colorsys", "compileall", "concurrent", "configparser",
    "contextlib", "contextvars", "copy", "copyreg", "cProfile", "crypt", "csv", "ctypes",
    "curses", "dataclasses", "datetime", "dbm", "decimal", "difflib", "dis", "distutils",
    "doctest", "email", "encodings", "ensurepip", "enum", "errno", "faulthandler", "fcntl",
    "filecmp", "fileinput", "fnmatch", "fractions", "ftplib", "functools", "gc", "genericpath",
    "getopt", "getpass", "gettext", "glob", "graphlib", "grp", "gzip", "hashlib", "heapq",
    "hmac", "html", "http", "idlelib", "imaplib", "imghdr", "imp", "importlib", "inspect", "io",
    "ipaddress", "itertools", "json", "keyword", "lib2to3", "linecache", "locale", "logging",
    "lzma", "mailbox", "mailcap", "marshal", "math", "mimetypes", "mmap", "modulefinder",
    "msilib", "msvcrt", "multiprocessing", "netrc", "nis", "nntplib", "nt", "ntpath",
    "nturl2path", "numbers", "opcode", "operator", "optparse", "os", "ossaudiodev", "pathlib",
    "pdb", "pickle", "pickletools", "pipes", "pkgutil", "platform", "plistlib", "poplib",
    "posix", "posixpath", "pprint", "profile", "pstats", "pty", "pwd", "py_compile", "pyclbr",
    "pydoc", "pydoc_data", "pyexpat", "queue", "quopri", "random", "re", "readline", "reprlib",
    "resource", "rlcompleter", "runpy", "sched", "secrets", "select", "selectors", "shelve",
    "shlex", "shutil", "signal", "site", "smtpd", "smtplib", "sndhdr", "socket", "socketserver",
    "spwd", "sqlite3", "sre_compile", "sre_constants", "sre_parse", "ssl", "stat", "statistics",
    "string", "stringprep", "struct", "subprocess", "sunau", "symtable", "sys", "sysconfig",
    "syslog", "tabnanny", "tarfile", "telnetlib", "tempfile", "termios", "textwrap", "this",
    "threading", "time", "timeit", "tkinter", "token", "tokenize", "tomllib", "trace",
    "traceback", "tracemalloc", "tty", "turtle", "turtledemo", "types", "typing", "unicodedata",
    "unittest", "urllib", "uu", "uuid", "venv", "warnings", "wave", "weakref", "webbrowser",
    "winreg", "winsound", "wsgiref", "xdrlib", "xml", "xmlrpc", "zipapp", "zipfile",
    "zipimport", "zlib", "zoneinfo",
];

const RUST_BUILTIN: &[&str] = &["crate", "self", "super", "std", "core", "alloc"];

fn python_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?:import\s+([^#\n]+)|from\s+([A-Za-z_][\w.]*)\s+import\b)")
            .expect("python import pattern is valid")
    })
}

fn rust_use_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?:pub\s+)?(?:use\s+(?:::)?|extern\s+crate\s+)([A-Za-z_]\w*)")
            .expect("rust use pattern is valid")
    })
}

/// First path segment of every top-of-line import, deduplicated in order.
pub fn infer_dependencies(code: &str, language: Language) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim();
        let valid = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    match language {
        Language::Python => {
            for cap in python_import_re().captures_iter(code) {
                if let Some(list) = cap.get(1) {
                    for item in list.as_str().split(',') {
                        let module = item.split_whitespace().next().unwrap_or("");
                        push(module.split('.').next().unwrap_or(""));
                    }
                } else if let Some(module) = cap.get(2) {
                    push(module.as_str().split('.').next().unwrap_or(""));
                }
            }
        }
        Language::Rust => {
            for cap in rust_use_re().captures_iter(code) {
                if let Some(m) = cap.get(1).filter(|m| !RUST_BUILTIN.contains(&m.as_str())) {
                    push(m.as_str());
                }
            }
        }
        Language::Unknown => {}
    }

    names
}

/// Drop names that are clearly not third-party: standard library
/// modules and the project's own top-level packages.
pub fn external_candidates(names: &[String], local_roots: &[String], language: Language) -> Vec<String> {
    names
        .iter()
        .filter(|n| !local_roots.iter().any(|r| r == *n))
        .filter(|n| match language {
            Language::Python => !PYTHON_STDLIB.contains(&n.as_str()),
            Language::Rust | Language::Unknown => true,
        })
        .cloned()
        .collect()
}

/// Names compare case-insensitively with `-`, `_` and `.` equivalent.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .replace(['_', '.'], "-")
}

/// Requirement name on a manifest line, ignoring versions, extras,
/// markers and comments. Option lines (`-r`, `-e`, ...) have none.
fn requirement_name(line: &str) -> Option<&str> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() || line.starts_with('-') {
        return None;
    }
    let end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(line.len());
    let name = &line[..end];
    (!name.is_empty()).then_some(name)
}

pub fn declared_names(manifest: &str) -> HashSet<String> {
    manifest
        .lines()
        .filter_map(requirement_name)
        .map(normalize_name)
        .collect()
}

/// Append names not yet declared; never rewrites or removes a line.
/// Returns the names actually added.
pub fn update_manifest(path: &Path, names: &[String]) -> Result<Vec<String>, ManifestError> {
    let err = |source| ManifestError {
        path: path.to_path_buf(),
        source,
    };

    let existing = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(err(e)),
    };

    let mut seen = declared_names(&existing);
    let added: Vec<String> = names
        .iter()
        .filter(|n| seen.insert(normalize_name(n)))
        .cloned()
        .collect();

    if added.is_empty() {
        return Ok(added);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(err)?;
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(err)?;

    let mut text = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        text.push('\n');
    }
    for name in &added {
        text.push_str(name);
        text.push('\n');
    }
    file.write_all(text.as_bytes()).map_err(err)?;

    Ok(added)
}

use std::collections::VecDeque;
use std::io::Write;

use chrono::{DateTime, Local};

pub const MAX_LOGS: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Success => "ok",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Clone, Debug)]
pub struct LogLine {
    pub level: LogLevel,
    pub text: String,
    pub at: DateTime<Local>,
}

/// Bounded in-memory log of one run, optionally echoed to stderr.
#[derive(Debug, Default)]
pub struct RunLog {
    pub lines: VecDeque<LogLine>,
    echo: bool,
}

impl RunLog {
    pub fn new(echo: bool) -> Self {
        Self {
            lines: VecDeque::new(),
            echo,
        }
    }

    /// Silent log, used by tests and library callers.
    pub fn quiet() -> Self {
        Self::new(false)
    }

    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines
            .iter()
            .any(|l| l.level == level && l.text.contains(needle))
    }
}

pub fn log(run: &mut RunLog, level: LogLevel, msg: impl Into<String>) {
    if run.lines.len() >= MAX_LOGS {
        run.lines.pop_front();
    }

    let line = LogLine {
        level,
        text: msg.into(),
        at: Local::now(),
    };

    if run.echo {
        let _ = writeln!(
            std::io::stderr(),
            "{} [{}] {}",
            line.at.format("%H:%M:%S"),
            level.tag(),
            line.text
        );
    }

    run.lines.push_back(line);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_drops_oldest() {
        let mut run = RunLog::quiet();
        for i in 0..MAX_LOGS + 5 {
            log(&mut run, LogLevel::Info, format!("line {i}"));
        }
        assert_eq!(run.lines.len(), MAX_LOGS);
        assert_eq!(run.lines.front().map(|l| l.text.as_str()), Some("line 5"));
    }

    #[test]
    fn contains_matches_level() {
        let mut run = RunLog::quiet();
        log(&mut run, LogLevel::Warn, "backend slow");
        assert!(run.contains(LogLevel::Warn, "slow"));
        assert!(!run.contains(LogLevel::Error, "slow"));
    }
}

//! The leveled message stream every stage reports into.

use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    fn as_log_level(self) -> log::Level {
        match self {
            Level::Debug => log::Level::Debug,
            Level::Info | Level::Success => log::Level::Info,
            Level::Warning => log::Level::Warn,
            Level::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Success => "SUCCESS",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Lexer,
    Parser,
    Ast,
    Semantic,
    CodeGen,
}

impl Stage {
    fn log_target(self) -> &'static str {
        match self {
            Stage::Lexer => "blockc::lexer",
            Stage::Parser => "blockc::parser",
            Stage::Ast => "blockc::ast",
            Stage::Semantic => "blockc::semantic",
            Stage::CodeGen => "blockc::codegen",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Lexer => "Lexer",
            Stage::Parser => "Parser",
            Stage::Ast => "AST",
            Stage::Semantic => "Semantic",
            Stage::CodeGen => "CodeGen",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} - {}", self.level, self.stage, self.message)
    }
}

/// Ordered diagnostics of one program unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    /// Records a message and forwards it to the `log` facade.
    pub fn push(&mut self, level: Level, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        log::log!(target: stage.log_target(), level.as_log_level(), "{message}");
        self.entries.push(Diagnostic {
            level,
            stage,
            message,
        });
    }

    pub fn debug(&mut self, stage: Stage, message: impl Into<String>) {
        self.push(Level::Debug, stage, message);
    }

    pub fn info(&mut self, stage: Stage, message: impl Into<String>) {
        self.push(Level::Info, stage, message);
    }

    pub fn success(&mut self, stage: Stage, message: impl Into<String>) {
        self.push(Level::Success, stage, message);
    }

    pub fn warning(&mut self, stage: Stage, message: impl Into<String>) {
        self.push(Level::Warning, stage, message);
    }

    pub fn error(&mut self, stage: Stage, message: impl Into<String>) {
        self.push(Level::Error, stage, message);
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries.iter().filter(|d| d.level == level).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Level::Error) > 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    /// Messages at or above `min`, in production order.
    pub fn at_least(&self, min: Level) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.level >= min)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Pluralizes `word` for `n`, as in `1 error` / `2 errors`.
pub(crate) fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_level() {
        let mut d = Diagnostics::new();
        d.debug(Stage::Lexer, "a");
        d.warning(Stage::Semantic, "b");
        d.error(Stage::Parser, "c");
        d.error(Stage::Parser, "d");
        assert_eq!(d.count(Level::Error), 2);
        assert_eq!(d.count(Level::Warning), 1);
        assert!(d.has_errors());
        assert_eq!(d.at_least(Level::Warning).count(), 3);
    }

    #[test]
    fn display_format() {
        let mut d = Diagnostics::new();
        d.info(Stage::CodeGen, "hello");
        let line = d.iter().next().map(ToString::to_string);
        assert_eq!(line.as_deref(), Some("INFO CodeGen - hello"));
    }

    #[test]
    fn plural_words() {
        assert_eq!(plural(1, "error"), "1 error");
        assert_eq!(plural(0, "warning"), "0 warnings");
    }
}

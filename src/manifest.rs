//! Project manifest (`cue.mod/module.cue`).
//!
//! The manifest is a CUE document. Only the top-level `module` and
//! `packages` fields matter here, so this decoder reads the small subset of
//! CUE that a module file uses: `field: value` declarations whose values are
//! string literals, lists of string literals, or anything else (structs,
//! numbers, references) which is skipped.
//! Comments (`//`), commas and newlines between declarations are accepted.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MODULE_DIR: &str = "cue.mod";
pub const MODULE_FILE: &str = "module.cue";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Empty when the manifest has no `module` field.
    pub module: String,
    pub packages: Vec<String>,
}

/// Location inside the manifest source, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{at}: {message}")]
    Syntax { at: Position, message: String },

    #[error("field '{field}' is defined more than once")]
    DuplicateField { field: String },

    #[error("field 'packages' is missing")]
    MissingPackages,

    #[error("field '{field}' must be {expected}")]
    Type {
        field: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    List(Vec<Value>),
    /// Structs, numbers, booleans and references; not needed here.
    Other,
}

fn is_label_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '#'
}

impl Manifest {
    /// Path of the manifest inside a project directory.
    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(MODULE_DIR).join(MODULE_FILE)
    }

    pub fn load(project_dir: &Path) -> Result<Self, ManifestError> {
        let path = Self::path(project_dir);
        let source = fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&source)
    }

    pub fn parse(source: &str) -> Result<Self, ManifestError> {
        let fields = Parser::new(source).fields()?;

        let mut module = String::new();
        let mut packages = None;
        for (name, value) in fields {
            match name.as_str() {
                "module" => match value {
                    Value::Str(s) => module = s,
                    _ => {
                        return Err(ManifestError::Type {
                            field: "module",
                            expected: "a string",
                        });
                    }
                },
                "packages" => packages = Some(string_list(value)?),
                _ => {}
            }
        }

        Ok(Self {
            module,
            packages: packages.ok_or(ManifestError::MissingPackages)?,
        })
    }
}

fn string_list(value: Value) -> Result<Vec<String>, ManifestError> {
    let type_err = ManifestError::Type {
        field: "packages",
        expected: "a list of strings",
    };
    let Value::List(items) = value else {
        return Err(type_err);
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Str(s) => Ok(s),
            _ => Err(ManifestError::Type {
                field: "packages",
                expected: "a list of strings",
            }),
        })
        .collect()
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn pos(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ManifestError> {
        Err(ManifestError::Syntax {
            at: self.pos(),
            message: message.into(),
        })
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Skip whitespace, commas and comments.
    fn skip_trivia(&mut self) {
        while let Some(&c) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' | ',' => {
                    self.bump();
                }
                '/' => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    if ahead.peek() != Some(&'/') {
                        return;
                    }
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return,
            }
        }
    }

    fn fields(mut self) -> Result<Vec<(String, Value)>, ManifestError> {
        self.declarations(None)
    }

    /// Parse `name: value` declarations up to `close` (or end of input).
    fn declarations(&mut self, close: Option<char>) -> Result<Vec<(String, Value)>, ManifestError> {
        let mut fields: Vec<(String, Value)> = Vec::new();
        loop {
            self.skip_trivia();
            match (self.chars.peek().copied(), close) {
                (None, None) => return Ok(fields),
                (None, Some(c)) => return self.error(format!("expected '{}'", c)),
                (Some(c), Some(end)) if c == end => {
                    self.bump();
                    return Ok(fields);
                }
                _ => {}
            }

            let name = self.label()?;
            let value = self.field_value(&name)?;
            if fields.iter().any(|(n, _)| *n == name) {
                return Err(ManifestError::DuplicateField { field: name });
            }
            fields.push((name, value));
        }
    }

    /// Parse `: value` after a label. `a: b: 1` nests `b` inside `a`.
    fn field_value(&mut self, name: &str) -> Result<Value, ManifestError> {
        self.skip_inline_space();
        if self.bump() != Some(':') {
            return self.error(format!("expected ':' after '{}'", name));
        }
        self.skip_inline_space();

        if self.starts_nested_field() {
            let inner = self.label()?;
            self.field_value(&inner)?;
            return Ok(Value::Other);
        }
        self.skip_trivia();
        self.value()
    }

    fn starts_nested_field(&self) -> bool {
        let mut ahead = self.chars.clone();
        let mut saw_label = false;
        while let Some(&c) = ahead.peek() {
            if is_label_char(c) {
                saw_label = true;
                ahead.next();
            } else {
                break;
            }
        }
        while matches!(ahead.peek().copied(), Some(' ' | '\t')) {
            ahead.next();
        }
        saw_label && ahead.peek() == Some(&':')
    }

    fn skip_inline_space(&mut self) {
        while matches!(self.chars.peek().copied(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    fn label(&mut self) -> Result<String, ManifestError> {
        if self.chars.peek() == Some(&'"') {
            return self.string();
        }
        let mut name = String::new();
        while let Some(&c) = self.chars.peek() {
            if is_label_char(c) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return self.error("expected a field name");
        }
        Ok(name)
    }

    fn value(&mut self) -> Result<Value, ManifestError> {
        match self.chars.peek().copied() {
            Some('"') => Ok(Value::Str(self.string()?)),
            Some('[') => self.list(),
            Some('{') => {
                self.bump();
                self.declarations(Some('}'))?;
                Ok(Value::Other)
            }
            Some(c) => {
                if !self.scalar() {
                    return self.error(format!("unexpected '{}'", c));
                }
                Ok(Value::Other)
            }
            None => self.error("expected a value"),
        }
    }

    fn list(&mut self) -> Result<Value, ManifestError> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.chars.peek().copied() {
                Some(']') => {
                    self.bump();
                    return Ok(Value::List(items));
                }
                Some(_) => items.push(self.value()?),
                None => return self.error("unterminated list"),
            }
        }
    }

    /// Skip a bare value; false if nothing was consumed.
    fn scalar(&mut self) -> bool {
        let mut consumed = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || c == ',' || c == ']' || c == '}' {
                break;
            }
            self.bump();
            consumed = true;
        }
        consumed
    }

    fn string(&mut self) -> Result<String, ManifestError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('/') => out.push('/'),
                    Some(other) => return self.error(format!("unknown escape '\\{}'", other)),
                    None => return self.error("unterminated string"),
                },
                Some('\n') | None => return self.error("unterminated string"),
                Some(c) => out.push(c),
            }
        }
    }
}

/// Render `s` as a CUE string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

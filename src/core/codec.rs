//! core::codec
//!
//! Member-line encoding shared by every stored record.
//!
//! Content is a newline separated list of member lines. Each line is a
//! token followed by fields, all joined with [`DELIMITER`]:
//!
//! ```text
//! CONTAINER::>>1
//! CO::>>src::>>2fd4e1c67a2d28fced849ee1bb76e7391b93eb12
//! IT::>>README::>>da39a3ee5e6b4b0d3255bfef95601890afd80709
//! ```
//!
//! Free text fields (messages, authors) go through [`escape`] so they can
//! never introduce a line break.

use thiserror::Error;

/// Field delimiter inside a member line.
pub const DELIMITER: &str = "::>>";

/// Errors from decoding member lines.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown token '{0}'")]
    UnknownToken(String),

    #[error("malformed {token} line: expected {expected} fields, got {actual}")]
    FieldCount {
        token: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("content is not valid UTF-8")]
    NotUtf8,

    #[error("missing {0} line")]
    Missing(&'static str),

    #[error("invalid field: {0}")]
    InvalidField(String),
}

/// Line tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    /// Fixed container header.
    ContainerHeader,
    /// Artifact entry.
    Artifact,
    /// Container entry.
    Container,
    /// State header / state entry.
    State,
    /// Previous link.
    Previous,
    /// Valid-path previous link.
    ValidPrevious,
    /// State metadata.
    Metadata,
    /// Logical unit reference.
    LogicalUnit,
    /// Stage reference.
    Stage,
    /// Head pointer.
    Head,
    /// Current pointer.
    Current,
    /// Extra parent recorded after the fact.
    Graft,
    /// Replacement of one state by another.
    Replacement,
}

impl Token {
    const ALL: [Token; 13] = [
        Token::ContainerHeader,
        Token::Artifact,
        Token::Container,
        Token::State,
        Token::Previous,
        Token::ValidPrevious,
        Token::Metadata,
        Token::LogicalUnit,
        Token::Stage,
        Token::Head,
        Token::Current,
        Token::Graft,
        Token::Replacement,
    ];

    /// The on-disk spelling of the token.
    pub fn as_str(self) -> &'static str {
        match self {
            Token::ContainerHeader => "CONTAINER",
            Token::Artifact => "IT",
            Token::Container => "CO",
            Token::State => "CS",
            Token::Previous => "PS",
            Token::ValidPrevious => "VP",
            Token::Metadata => "MD",
            Token::LogicalUnit => "LS",
            Token::Stage => "ST",
            Token::Head => "HD",
            Token::Current => "CU",
            Token::Graft => "GR",
            Token::Replacement => "RE",
        }
    }

    /// Look a token up by its spelling.
    pub fn parse(s: &str) -> Result<Self, CodecError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CodecError::UnknownToken(s.to_string()))
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded member line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLine {
    pub token: Token,
    pub fields: Vec<String>,
}

impl MemberLine {
    /// Build a member line from a token and its fields.
    pub fn new<I, S>(token: Token, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            token,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a single line. The last field absorbs any further delimiters
    /// when `max_fields` is given.
    pub fn parse(line: &str, max_fields: Option<usize>) -> Result<Self, CodecError> {
        let mut parts: Vec<&str> = match max_fields {
            Some(n) => line.splitn(n + 1, DELIMITER).collect(),
            None => line.split(DELIMITER).collect(),
        };
        let token = Token::parse(parts.remove(0))?;
        Ok(Self {
            token,
            fields: parts.into_iter().map(str::to_string).collect(),
        })
    }

    /// Require an exact field count.
    pub fn expect_fields(&self, token: &'static str, n: usize) -> Result<(), CodecError> {
        if self.fields.len() != n {
            return Err(CodecError::FieldCount {
                token,
                expected: n,
                actual: self.fields.len(),
            });
        }
        Ok(())
    }

    /// Encode to a single line.
    pub fn encode(&self) -> String {
        let mut out = String::from(self.token.as_str());
        for field in &self.fields {
            out.push_str(DELIMITER);
            out.push_str(field);
        }
        out
    }
}

impl std::fmt::Display for MemberLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Split stored bytes into non-empty text lines.
pub fn lines(content: &[u8]) -> Result<Vec<&str>, CodecError> {
    let text = std::str::from_utf8(content).map_err(|_| CodecError::NotUtf8)?;
    Ok(text.lines().filter(|l| !l.is_empty()).collect())
}

/// Join member lines into stored content.
pub fn join(lines: &[MemberLine]) -> String {
    lines
        .iter()
        .map(MemberLine::encode)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape a free text field. The result holds no line break and no
/// [`DELIMITER`].
///
/// ```
/// use strata::core::codec::{escape, unescape, DELIMITER};
///
/// let msg = "first line\nsecond \\ line ::>> tail";
/// assert!(!escape(msg).contains('\n'));
/// assert!(!escape(msg).contains(DELIMITER));
/// assert_eq!(unescape(&escape(msg)), msg);
/// ```
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '>' => out.push_str("\\>"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape`].
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

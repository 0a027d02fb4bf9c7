//! Shell Reply Types
//!
//! Every command the shell runs answers with a [`Reply`]. The variants
//! mirror the shapes a Redis client prints:
//!
//! - Status: `OK`
//! - Error: `(error) ERR unknown command 'FOO'`
//! - Integer: `(integer) 1000`
//! - Bulk: `"hello"`
//! - Nil: `(nil)`
//! - Array: numbered lines, `(empty array)` when empty

use std::fmt;

/// A command reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Short status text such as `OK` or `PONG`
    Status(String),

    /// Failure message, conventionally starting with an upper-case code
    Error(String),

    Integer(i64),

    /// A string value
    Bulk(String),

    /// Missing value
    Nil,

    /// Ordered list of replies, possibly nested
    Array(Vec<Reply>),
}

impl Reply {
    /// Common response for successful operations
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    /// Common response for PING
    pub fn pong() -> Self {
        Reply::Status("PONG".to_string())
    }

    /// Creates a new error response.
    ///
    /// # Example
    /// ```
    /// use keystash::protocol::Reply;
    /// let err = Reply::error("ERR unknown command");
    /// assert!(err.is_error());
    /// ```
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    pub fn bulk(s: impl Into<String>) -> Self {
        Reply::Bulk(s.into())
    }

    pub fn integer(n: i64) -> Self {
        Reply::Integer(n)
    }

    /// Integer reply for a count. Saturates at `i64::MAX`.
    pub fn count(n: usize) -> Self {
        Reply::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }

    /// `1` for true, `0` for false.
    pub fn boolean(b: bool) -> Self {
        Reply::Integer(b as i64)
    }

    /// Bulk string or nil.
    pub fn optional(value: Option<String>) -> Self {
        value.map(Reply::Bulk).unwrap_or(Reply::Nil)
    }

    /// Array of bulk strings.
    pub fn bulk_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Reply::Array(items.into_iter().map(|s| Reply::Bulk(s.into())).collect())
    }

    /// Returns true if this value is nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Returns true if this value is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Attempts to extract the inner string from Status or Bulk.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::Status(s) | Reply::Bulk(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to extract the inner integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract the inner array.
    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(s) => write!(f, "{:?}", s),
            Reply::Nil => write!(f, "(nil)"),
            Reply::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Reply::Array(items) => {
                // Index width so nested items line up under their parent
                let width = items.len().to_string().len();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                        write!(f, "{:indent$}", "")?;
                    }
                    write!(f, "{:>width$}) ", i + 1)?;
                    item.fmt_indented(f, indent + width + 2)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl From<Option<String>> for Reply {
    fn from(value: Option<String>) -> Self {
        Reply::optional(value)
    }
}

//! Inline Command Tokenizer
//!
//! Splits one line of shell input into command arguments.
//!
//! ## Syntax
//!
//! - Arguments are separated by whitespace
//! - `"double quoted"` arguments understand `\n`, `\t`, `\r`, `\\`, `\"` and
//!   `\xHH`; any other escaped character stands for itself
//! - `'single quoted'` arguments are literal, except `\'`
//! - A closing quote must be followed by whitespace or the end of the line
//!
//! ```text
//! SET greeting "hello\tworld"   →  ["SET", "greeting", "hello<TAB>world"]
//! HSET user name 'O\'Brien'     →  ["HSET", "user", "name", "O'Brien"]
//! ```

use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// Errors that can occur while tokenizing a line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A quoted argument was still open at the end of the line
    #[error("unbalanced quotes in request")]
    UnterminatedQuote,

    /// `\x` not followed by two hex digits
    #[error("invalid escape sequence: {0}")]
    InvalidEscape(String),

    /// A closing quote was followed by something other than whitespace
    #[error("closing quote must be followed by a space")]
    TrailingCharacters,

    /// `\xHH` escapes produced bytes that are not UTF-8
    #[error("argument is not valid UTF-8")]
    InvalidUtf8,
}

/// Result type for tokenizing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Tokenizes one line into arguments.
///
/// Returns an empty vector for a blank line.
///
/// # Example
///
/// ```
/// use keystash::protocol::parse_line;
///
/// let args = parse_line(r#"SET name "Ariz Kamizuki""#).unwrap();
/// assert_eq!(args, vec!["SET", "name", "Ariz Kamizuki"]);
/// ```
pub fn parse_line(line: &str) -> ParseResult<Vec<String>> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let Some(&first) = chars.peek() else {
            return Ok(args);
        };

        let arg = match first {
            '"' => {
                chars.next();
                parse_double_quoted(&mut chars)?
            }
            '\'' => {
                chars.next();
                parse_single_quoted(&mut chars)?
            }
            _ => {
                let mut arg = String::new();
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    arg.push(c);
                }
                arg
            }
        };

        if matches!(first, '"' | '\'') {
            if let Some(c) = chars.peek() {
                if !c.is_whitespace() {
                    return Err(ParseError::TrailingCharacters);
                }
            }
        }

        args.push(arg);
    }
}

fn parse_double_quoted(chars: &mut Peekable<Chars<'_>>) -> ParseResult<String> {
    // Bytes, because \xHH may spell out a multi-byte character
    let mut buf = Vec::new();

    loop {
        let c = chars.next().ok_or(ParseError::UnterminatedQuote)?;
        match c {
            '"' => break,
            '\\' => {
                let escaped = chars.next().ok_or(ParseError::UnterminatedQuote)?;
                match escaped {
                    'n' => buf.push(b'\n'),
                    't' => buf.push(b'\t'),
                    'r' => buf.push(b'\r'),
                    'x' => buf.push(parse_hex_byte(chars)?),
                    other => push_char(&mut buf, other),
                }
            }
            other => push_char(&mut buf, other),
        }
    }

    String::from_utf8(buf).map_err(|_| ParseError::InvalidUtf8)
}

fn parse_single_quoted(chars: &mut Peekable<Chars<'_>>) -> ParseResult<String> {
    let mut arg = String::new();

    loop {
        let c = chars.next().ok_or(ParseError::UnterminatedQuote)?;
        match c {
            '\'' => return Ok(arg),
            '\\' if chars.peek() == Some(&'\'') => {
                chars.next();
                arg.push('\'');
            }
            other => arg.push(other),
        }
    }
}

fn parse_hex_byte(chars: &mut Peekable<Chars<'_>>) -> ParseResult<u8> {
    let hi = chars.next_if(char::is_ascii_hexdigit);
    let lo = chars.next_if(char::is_ascii_hexdigit);

    match (hi, lo) {
        (Some(hi), Some(lo)) => {
            let digits: String = [hi, lo].iter().collect();
            u8::from_str_radix(&digits, 16)
                .map_err(|_| ParseError::InvalidEscape(format!("\\x{}", digits)))
        }
        _ => {
            let seen: String = [hi, lo].iter().flatten().collect();
            Err(ParseError::InvalidEscape(format!("\\x{}", seen)))
        }
    }
}

#[inline]
fn push_char(buf: &mut Vec<u8>, c: char) {
    let mut tmp = [0u8; 4];
    buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
}

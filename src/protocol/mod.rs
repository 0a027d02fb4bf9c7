//! Shell Protocol
//!
//! The interactive shell reads one command per line and prints one reply
//! per command.
//!
//! ## Modules
//!
//! - `parser`: Tokenizes an input line into arguments
//! - `types`: Defines the `Reply` enum and its redis-cli style rendering
//!
//! ## Example
//!
//! ```
//! use keystash::protocol::{parse_line, Reply};
//!
//! let args = parse_line("GET name").unwrap();
//! assert_eq!(args, vec!["GET", "name"]);
//!
//! let reply = Reply::bulk("Ariz");
//! assert_eq!(reply.to_string(), "\"Ariz\"");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_line, ParseError, ParseResult};
pub use types::Reply;

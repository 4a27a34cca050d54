//! CGM reading collector.
//!
//! Turns free-text submissions into validated glucose readings and tracks
//! the bounded retry protocol of one conversation. Pure and synchronous:
//! persistence happens elsewhere, through a [`ReadingSink`].

pub mod config;
pub mod error;
pub mod parser;
pub mod session;
pub mod sink;

pub use config::CollectorConfig;
pub use error::CollectorError;
pub use parser::{parse_readings, InvalidToken, TokenProblem};
pub use session::{CollectionSession, CollectorContext, ReadingBatch, SessionState};
pub use sink::ReadingSink;

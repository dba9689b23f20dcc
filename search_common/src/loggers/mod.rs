/// Structured logger with console and size-rotating file sinks.
pub mod logger;
/// Size-based log file rotation with backup, age and compression limits.
pub mod rotation;

pub use logger::{parse_level, Logger, LoggerError};
pub use rotation::SizeRotatingFile;

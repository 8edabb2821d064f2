use thiserror::Error;

/// Errors raised while converting between records and property maps.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("cannot convert {found} value into {expected}")]
    Unconvertible {
        expected: &'static str,
        found: &'static str,
    },

    #[error("malformed result: {0}")]
    MalformedResult(String),
}

use thiserror::Error;

/// Failure kinds surfaced by the precomputation pipeline. Generation-time
/// errors are always returned as values; the per-fragment evaluators cannot
/// fail (guards and clamps keep them total).
#[derive(Debug, Error)]
pub enum LightingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A pass plan disagrees with the target it is supposed to fill, e.g. a
    /// mip index past the end of the chain.
    #[error("render target mismatch: {0}")]
    TargetMismatch(String),

    #[error("cache format error: {0}")]
    CacheFormat(String),

    #[error("cache is for a different environment (hash mismatch)")]
    CacheHashMismatch,
}

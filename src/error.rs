//! Crate-wide error kinds. One variant per failure mode; there is no
//! local recovery. Callers see these immediately, propagated with `?`
//! throughout.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DynError {
    /// HT construction or an attachment received an array of unsupported
    /// dimensions.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Numeric evaluation called with argument lengths inconsistent with
    /// the model's joint count.
    #[error("shape mismatch: expected {expected} values, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    /// A dynamics query was made before `calculate_dynamics` populated
    /// the derived symbolic state.
    #[error("dynamic model is uninitialized: call calculate_dynamics() first")]
    Uninitialized,

    /// `M(q)` is not invertible at derivation time and is not the
    /// literal zero matrix.
    #[error("singular matrix: M(q) has no inverse at this configuration")]
    SingularMatrix,

    /// Propagated unchanged from the symbolic algebra backend.
    #[error("CAS backend error: {0}")]
    CasBackendError(String),
}

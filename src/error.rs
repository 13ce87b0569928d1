use thiserror::Error;

/// Errors raised when a problem is set up with inconsistent inputs.
///
/// Numerical trouble during the minimization is not an error; it is reported
/// through [`Termination`](enum.Termination.html).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Two quantities that must be defined on the same discretization differ in size.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    /// The samples and the operator grid have the same size but different nodes.
    #[error("sample nodes differ from the nodes of the operator grid")]
    GridMismatch,
    /// An axis of a grid has fewer than three nodes, so it has no interior.
    #[error("a grid axis needs at least 3 nodes, got {0}")]
    GridTooSmall(usize),
    /// The interval `$[a, b]$` is empty or not finite.
    #[error("invalid domain [{a}, {b}]")]
    EmptyDomain { a: f64, b: f64 },
    /// Explicit grid nodes are not uniformly spaced.
    #[error("grid nodes are not uniformly spaced")]
    NonUniformGrid,
    /// The network input dimension does not match the grid dimension.
    #[error("network takes {network} inputs but the grid is {grid}-dimensional")]
    InputDimension { network: usize, grid: usize },
    /// An initialization scheme name that is not `he`, `xavier` or `random`.
    #[error("unknown initialization `{0}`, use `he`, `xavier` or `random`")]
    UnknownInitialization(String),
    /// A parameter vector of the wrong length for the network.
    #[error("network has {expected} parameters, got {actual}")]
    ParameterCount { expected: usize, actual: usize },
    /// A network with a zero-sized layer.
    #[error("invalid architecture: {0}")]
    InvalidArchitecture(&'static str),
    /// A boundary penalty weight that is negative or not finite.
    #[error("penalty weight must be finite and >= 0, got {0}")]
    InvalidPenalty(f64),
    /// Coarsening block size of zero.
    #[error("block size must be at least 1")]
    InvalidBlockSize,
}

pub type Result<T> = core::result::Result<T, Error>;

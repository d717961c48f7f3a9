use std::error::Error;
use std::fmt;

#[derive(Debug, Eq, PartialEq)]
pub enum NetworkError {
    /// The data's rows or columns don't fit the declared architecture or the
    /// frozen label domain. Raised before any optimizer work.
    ShapeMismatch(&'static str),
    /// A packed parameter vector's length doesn't match the layout.
    LayoutMismatch { expected: usize, actual: usize },
    /// Inference was requested before the model was ever trained.
    Untrained,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch(message) => write!(f, "shape mismatch: {message}"),
            Self::LayoutMismatch { expected, actual } => write!(
                f,
                "packed vector holds {actual} values but the layout expects {expected}"
            ),
            Self::Untrained => write!(f, "the model has not been trained"),
        }
    }
}

impl Error for NetworkError {}

//! Tri-state value for UI observers.

use crate::error::ApiError;

/// State of a value that is fetched remotely.
///
/// Starts as `Idle`. A call moves it to `Loaded` or `Failed`; there is no
/// in-progress state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loadable<T> {
    Idle,
    Loaded(T),
    Failed(ApiError),
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Loadable::Idle
    }
}

impl<T> Loadable<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Loadable::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Loadable::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Loadable::Idle)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Loadable<U> {
        match self {
            Loadable::Idle => Loadable::Idle,
            Loadable::Loaded(value) => Loadable::Loaded(f(value)),
            Loadable::Failed(error) => Loadable::Failed(error),
        }
    }
}

impl<T> From<Result<T, ApiError>> for Loadable<T> {
    fn from(outcome: Result<T, ApiError>) -> Self {
        match outcome {
            Ok(value) => Loadable::Loaded(value),
            Err(error) => Loadable::Failed(error),
        }
    }
}

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    #[error("path no longer resolves against the current snapshot")]
    PathNotFound,
    #[error("target is not an object")]
    NotAnObject,
    #[error("target is not an array")]
    NotAnArray,
}

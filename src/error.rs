//! Coordinator errors
//!
//! Rejecting a transaction during selection is never an error; it only shows
//! up in the returned profile. Errors are lifecycle misuse or failures raised
//! by a collaborator, which pass through untouched.

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Coordinator was interrupted")]
    Interrupted,
    #[error("Coordinator is already publishing")]
    AlreadyPublishing,
    #[error("Coordinator was already interrupted")]
    AlreadyInterrupted,
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

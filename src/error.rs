//! Errors raised when reaching into a `Handle`.
//!
//! Casting never fails with an error: a cast that the view registry cannot
//! satisfy yields an empty handle instead.

use thiserror::Error;

/// Access to the contained object of an empty handle.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[error("Tried to access uninitialized pointer object.")]
pub struct UninitializedAccess;

/// State of the borrow flag shared by every handle of one allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorrowState
{
    /// No guard is alive.
    Free,
    /// This many `Reading` guards are alive.
    Reading(usize),
    /// A single `Writing` guard is alive.
    Writing,
}

/// Failure of `Handle::read`, `Handle::write` or `Handle::get`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError
{
    /// The handle is empty.
    #[error(transparent)]
    Uninitialized(#[from] UninitializedAccess),

    /// Another handle to the same object holds a conflicting guard.
    #[error("object is already borrowed ({held:?})")]
    Borrowed
    {
        /// What was held at the time of the attempt.
        held: BorrowState,
    },
}

impl AccessError
{
    /// Whether the access failed because the handle was empty.
    pub fn is_uninitialized(&self) -> bool { matches!(self, Self::Uninitialized(_)) }
}

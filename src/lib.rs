//! A single-threaded shared-ownership handle with runtime-checked casting.
//!
//! A [`Handle<T>`] owns one heap object together with every other handle that
//! was cloned or cast from the same origin. The object is dropped exactly once,
//! when the last of those handles goes away. A handle may also be empty, and
//! every attempt to reach into an empty handle fails with
//! [`UninitializedAccess`] rather than panicking.
//!
//! Handles can be cast between views of one object, for example from a
//! concrete type to a trait object it implements, back down again, or across
//! to another trait object. Which views exist is decided at runtime by the
//! view registry, filled in with [`relate!`]. A cast the registry cannot
//! satisfy is not an error: it just yields an empty handle.
//!
//! ```
//! use std::cell::Cell;
//! use sharedptr::Handle;
//!
//! let h1 = Handle::new(Cell::new(100));
//! let h2 = h1.clone();
//! assert_eq!(h1.ref_count(), 2);
//!
//! h2.write().unwrap().set(200);
//! assert_eq!(h1.read().unwrap().get(), 200);
//!
//! drop(h2);
//! assert!(h1.is_unique());
//! ```
//!
//! Counting is plain, non-atomic arithmetic. Handles are `!Send` and `!Sync`
//! and there is no weak variant, so reference cycles leak.

mod access;
mod block;
mod error;
mod handle;
pub mod registry;
mod stats;


pub use access::{Reading, Writing};
pub use error::{AccessError, BorrowState, UninitializedAccess};
pub use handle::{Handle, NULL_TYPE_NAME};
pub use registry::{is_related, register_view, ViewFn};
pub use stats::{stats, Stats};

//! Ttline is a key-value based in-memory cache library where every entry carries
//! an expiration deadline.
//!
//! Entries are kept in a deadline-ordered queue next to a hash index, so lookups
//! are `O(1)` and expired entries are reclaimed by a lazy sweep from the head of
//! the queue, amortized `O(1)` per operation. There is no background task.
//!
//! - [`Line`] : the expiring cache.
//! - [`LineSet`] : an expiring set built on [`Line`].
//! - [`SyncLine`] : a [`Line`] behind a single lock, for sharing between threads.
//!
//! Time is read through a [`Clock`]. [`SystemClock`] is the default, and
//! [`ManualClock`] lets tests move time by hand.
//!
//! # Examples
//! ```
//! use std::thread::sleep;
//! use std::time::Duration;
//!
//! use ttline::Line;
//!
//! fn main() -> ttline::Result<()> {
//!     let mut cache = Line::new(Duration::from_millis(100))?;
//!
//!     cache.store_for("Still", "Alive", Duration::from_secs(3));
//!     cache.store("Gonna", "Die");
//!
//!     sleep(Duration::from_millis(100));
//!
//!     assert_eq!(cache.get("Still"), Ok(&"Alive"));
//!     assert!(cache.get("Gonna").is_err());
//!     Ok(())
//! }
//! ```

// for internal use.
pub(crate) mod entry;
pub(crate) mod hash;

// for external use.

/// The expiring cache.
pub mod line;

/// An expiring set built on [`Line`].
pub mod set;

/// Thread-safe wrapper around [`Line`].
pub mod sync;

/// Time sources.
pub mod clock;

mod error;

#[cfg(test)]
mod property_tests;

#[doc(inline)]
pub use crate::line::Line;

#[doc(inline)]
pub use crate::set::LineSet;

#[doc(inline)]
pub use crate::sync::SyncLine;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::error::{Error, Result};

//! ROSETTA Events - Change Notification and State Observers
//!
//! The ports through which the record cache talks to the rest of a client:
//!
//! - [`CacheChangeSink`]: told synchronously after each cache mutation
//! - [`ValueObserver`]: told before and after each load batch so fetching and
//!   loading flags can be recomputed
//!
//! [`EventEmitter`] and [`StateObserver`] are in-memory implementations of
//! these ports.

mod change;
mod emitter;
mod observer;

pub use change::{CacheChange, CacheChangeSink, KeyUpdateFilter, NoopSink};
pub use emitter::{EventEmitter, Listener};
pub use observer::{NoopObserver, StateObserver, ValueObserver};

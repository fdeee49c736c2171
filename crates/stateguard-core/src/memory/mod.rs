//! # In-Memory Host
//!
//! A small mutable element tree implementing the [`Host`](crate::Host)
//! contract. Used by the CLI simulation and throughout the test suites.
//!
//! | Mode | Behaviour |
//! |------|-----------|
//! | [`DeliveryMode::Batched`] | Records queue per subscription until [`MemoryDocument::deliver`] |
//! | [`DeliveryMode::Immediate`] | Records are delivered synchronously from inside the write |

mod document;
mod selector;

pub use document::{DeliveryMode, MemoryDocument, MemoryElement, MAX_DELIVERY_ROUNDS};

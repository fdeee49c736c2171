//! # StateGuard Core
//!
//! Attribute integrity guards for live, mutable element trees. A guard
//! snapshots an element's attributes, reverts any change that did not go
//! through its authorized path, counts the attempts, and invokes a callback
//! once the count reaches a limit.
//!
//! ## Threat Coverage
//!
//! | Threat | Defense |
//! |--------|---------|
//! | Re-enabling a disabled control | Revert to snapshot value |
//! | Injected attributes (`onclick`, `href`) | Remove attributes absent from the snapshot |
//! | Repeated tampering | Per-element violation count + threshold callback |
//! | Hiding evidence by clearing the console | Opt-in audit mode |
//!
//! Detection is reactive: a change is observed after it takes effect and is
//! undone at the next notification checkpoint. An attacker who controls the
//! notification channel itself is out of reach.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        Registry                           │
//! │   protect(selector) · update(el, fn) · destruct()         │
//! │                           │                               │
//! │        ┌──────────────────┼──────────────────┐            │
//! │        ▼                  ▼                  ▼            │
//! │   ┌─────────┐        ┌─────────┐        ┌─────────┐       │
//! │   │  Guard  │        │  Guard  │        │  Guard  │       │
//! │   │ snapshot│        │ snapshot│        │ snapshot│       │
//! │   └────┬────┘        └────┬────┘        └────┬────┘       │
//! └────────┼──────────────────┼──────────────────┼────────────┘
//!          ▼                  ▼                  ▼
//!    ┌──────────────────────────────────────────────────┐
//!    │  Host: elements, selectors, change notifications  │
//!    └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use stateguard_core::{Element, GuardOptions, MemoryDocument, Registry};
//!
//! let doc = Arc::new(MemoryDocument::new());
//! let button = doc.create_element("button");
//! button.set_attribute("id", "btn");
//! button.set_attribute("disabled", "");
//!
//! let reported = Arc::new(AtomicU32::new(0));
//! let sink = Arc::clone(&reported);
//!
//! let registry = Registry::new(Arc::clone(&doc));
//! registry.protect(
//!     "#btn",
//!     GuardOptions::new()
//!         .with_attributes(["disabled"])
//!         .with_max_attempts(1)
//!         .on_violation(move |_el, count| sink.store(count, Ordering::SeqCst)),
//! );
//!
//! button.remove_attribute("disabled");
//! doc.deliver();
//!
//! assert!(button.attribute("disabled").is_some());
//! assert_eq!(registry.violation_count(&button), Some(1));
//! assert_eq!(reported.load(Ordering::SeqCst), 1);
//! ```
//!
//! ## Security Notes
//!
//! - Only the synchronous body of an authorized update is trusted
//! - The threshold callback runs inside notification handling; hand slow work
//!   off to a queue
//! - Re-protecting an element discards its previous violation count

mod config;
mod error;
mod guard;
mod host;
mod lifecycle;
pub mod memory;
mod registry;
mod snapshot;

pub use config::{
    AttributeFilter, GuardConfig, GuardOptions, RegistryConfig, ViolationCallback,
    DEFAULT_MAX_ATTEMPTS,
};
pub use error::GuardError;
pub use guard::{Guard, GuardPhase, GuardStatus};
pub use host::{Element, Host, MutationCallback, MutationRecord, ObserveOptions, Observer};
pub use lifecycle::GuardBinding;
pub use memory::{DeliveryMode, MemoryDocument, MemoryElement};
pub use registry::Registry;
pub use snapshot::{Revert, Snapshot};

/// Core result type for configuration decoding.
pub type Result<T> = std::result::Result<T, GuardError>;

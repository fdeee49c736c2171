//! # Host Contract
//!
//! The tree being protected is not owned by StateGuard. A host exposes its
//! elements, resolves selectors, and delivers attribute change notifications
//! through the traits in this module.
//!
//! ## Delivery Model
//!
//! Notifications are reactive: a record is produced after the write has taken
//! effect. Hosts may deliver records in batches at a later checkpoint, or
//! synchronously from inside the write. Guards handle both:
//!
//! | Host style | Self-originated echo handled by |
//! |------------|---------------------------------|
//! | Batched | [`Observer::take_records`] drains the echo before the next checkpoint |
//! | Immediate | The guard ignores re-entrant batches while it is writing |
//!
//! ## Threat Model
//!
//! An attacker able to intercept or suppress the notification channel itself
//! cannot be detected by a guard built on that channel.

use std::fmt::Debug;
use std::hash::Hash;

/// An addressable node with mutable attributes.
///
/// Handles are cheap to clone and share the underlying node; the host keeps
/// ownership of the node's lifecycle.
pub trait Element: Clone + Send + Sync + 'static {
    /// Stable identity used to key the registry.
    type Key: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    /// Returns the element's identity.
    fn key(&self) -> Self::Key;

    /// Returns the element's tag name.
    fn tag_name(&self) -> String;

    /// Returns the value of one attribute.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Returns every attribute as `(name, value)` pairs.
    fn attributes(&self) -> Vec<(String, String)>;

    /// Sets one attribute.
    fn set_attribute(&self, name: &str, value: &str);

    /// Removes one attribute. Removing an absent attribute is a no-op.
    fn remove_attribute(&self, name: &str);
}

/// A single attribute change notification.
#[derive(Debug, Clone)]
pub struct MutationRecord<E> {
    /// Name of the attribute that changed.
    pub attribute_name: String,
    /// Element whose attribute changed.
    pub target: E,
}

impl<E> MutationRecord<E> {
    /// Creates a record.
    pub fn new(attribute_name: impl Into<String>, target: E) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            target,
        }
    }
}

/// What a subscription asks the host to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Report attribute changes.
    pub attributes: bool,
}

impl ObserveOptions {
    /// Options reporting attribute changes only.
    pub const fn attributes() -> Self {
        Self { attributes: true }
    }
}

/// An open subscription.
pub trait Observer<E>: Send + Sync {
    /// Removes and returns records queued for this subscription but not yet
    /// delivered.
    fn take_records(&self) -> Vec<MutationRecord<E>>;

    /// Stops delivery. Idempotent.
    fn disconnect(&self);
}

/// Batch handler registered with [`Host::observe`]. Receives the records of
/// one delivery and the subscription they were delivered on.
pub type MutationCallback<E> = Box<dyn Fn(Vec<MutationRecord<E>>, &dyn Observer<E>) + Send + Sync>;

/// The environment owning the protected tree.
pub trait Host: Send + Sync + 'static {
    /// Element handle type.
    type Element: Element;

    /// Resolves a selector to matching elements in tree order. Selectors the
    /// host cannot resolve match nothing.
    fn query_selector_all(&self, selector: &str) -> Vec<Self::Element>;

    /// Subscribes to change notifications for `target`.
    fn observe(
        &self,
        target: &Self::Element,
        options: ObserveOptions,
        callback: MutationCallback<Self::Element>,
    ) -> Box<dyn Observer<Self::Element>>;

    /// Registers one audit holder. The host's console-clear diagnostic stays
    /// blocked while at least one holder is registered. Hosts without such a
    /// diagnostic ignore the request.
    fn acquire_console_audit(&self) {}

    /// Releases a holder registered with [`Host::acquire_console_audit`].
    fn release_console_audit(&self) {}
}

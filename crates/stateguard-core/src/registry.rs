//! # Guard Registry
//!
//! Maps element identity to its [`Guard`]. The registry is the entry point
//! for bulk protection, routed authorized updates, and teardown.
//!
//! ## Ownership
//!
//! A registry is an ordinary value owned by whatever owns the protected tree.
//! Dropping it disarms every guard and releases the audit hook.
//!
//! ## Concurrency
//!
//! The map is behind a mutex and only `protect`, `protect_element`,
//! `unprotect` and `destruct` change it. Guards are looked up and the lock
//! released before any closure or host call runs, so callbacks may call back
//! into the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::config::{GuardOptions, RegistryConfig};
use crate::guard::{Guard, GuardStatus};
use crate::host::{Element, Host};

type Key<H> = <<H as Host>::Element as Element>::Key;
type GuardMap<H> = HashMap<Key<H>, Arc<Guard<<H as Host>::Element>>>;

/// Registry of guards over one host.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use stateguard_core::{Element, GuardOptions, MemoryDocument, Registry};
///
/// let doc = Arc::new(MemoryDocument::new());
/// let button = doc.create_element("button");
/// button.set_attribute("id", "btn");
/// button.set_attribute("disabled", "");
///
/// let registry = Registry::new(Arc::clone(&doc));
/// let protected = registry.protect("#btn", GuardOptions::new().with_attributes(["disabled"]));
/// assert_eq!(protected, 1);
///
/// button.remove_attribute("disabled");
/// doc.deliver();
/// assert!(button.attribute("disabled").is_some());
///
/// registry.update(&button, |b| b.remove_attribute("disabled"));
/// doc.deliver();
/// assert!(button.attribute("disabled").is_none());
/// ```
pub struct Registry<H: Host> {
    host: Arc<H>,
    config: RegistryConfig,
    guards: Mutex<GuardMap<H>>,
}

impl<H: Host> Registry<H> {
    /// Creates a registry with default configuration.
    pub fn new(host: Arc<H>) -> Self {
        Self::with_config(host, RegistryConfig::default())
    }

    /// Creates a registry. With audit mode on, the host's console-clear
    /// diagnostic is blocked until the registry is dropped.
    pub fn with_config(host: Arc<H>, config: RegistryConfig) -> Self {
        if config.audit_mode {
            host.acquire_console_audit();
            info!("audit mode enabled: console clearing blocked");
        }
        Self {
            host,
            config,
            guards: Mutex::new(HashMap::new()),
        }
    }

    /// The host this registry protects.
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Installs a guard on every element matching `selector`.
    ///
    /// An element that is already guarded gets a fresh guard; the old one is
    /// disarmed and its violation count discarded. A selector matching
    /// nothing protects nothing.
    ///
    /// Returns the number of elements protected.
    pub fn protect(&self, selector: &str, options: GuardOptions<H::Element>) -> usize {
        let elements = self.host.query_selector_all(selector);
        if elements.is_empty() {
            debug!(selector, "selector matched no elements");
            return 0;
        }

        let count = elements.len();
        for element in elements {
            self.protect_element(element, options.clone());
        }
        debug!(selector, count, "elements protected");
        count
    }

    /// Installs a guard on one element, replacing any existing guard.
    pub fn protect_element(
        &self,
        element: H::Element,
        options: GuardOptions<H::Element>,
    ) -> Arc<Guard<H::Element>> {
        let key = element.key();

        // Disarm first so the old guard cannot fight the new one.
        let previous = self.guards().remove(&key);
        if let Some(previous) = previous {
            debug!(
                tag = %element.tag_name(),
                discarded_violations = previous.violation_count(),
                "replacing existing guard"
            );
            previous.disarm();
        }

        let guard = Arc::new(Guard::new(self.host.as_ref(), element, options));
        let replaced = self.guards().insert(key, Arc::clone(&guard));
        if let Some(replaced) = replaced {
            replaced.disarm();
        }
        guard
    }

    /// Runs an authorized mutation on a guarded element.
    ///
    /// Returns `None` without running `f` if the element is not guarded.
    pub fn update<R, F>(&self, element: &H::Element, f: F) -> Option<R>
    where
        F: FnOnce(&H::Element) -> R,
    {
        let Some(guard) = self.guard(element) else {
            debug!(tag = %element.tag_name(), "update on unguarded element ignored");
            return None;
        };
        guard.exec(f)
    }

    /// Runs a fallible authorized mutation, passing its error through.
    pub fn try_update<T, Err, F>(&self, element: &H::Element, f: F) -> Result<Option<T>, Err>
    where
        F: FnOnce(&H::Element) -> Result<T, Err>,
    {
        self.update(element, f).transpose()
    }

    /// Disarms and forgets the guard for one element.
    ///
    /// Returns true if the element was guarded.
    pub fn unprotect(&self, element: &H::Element) -> bool {
        let removed = self.guards().remove(&element.key());
        match removed {
            Some(guard) => {
                guard.disarm();
                true
            }
            None => false,
        }
    }

    /// Disarms every guard and empties the registry. Idempotent.
    pub fn destruct(&self) {
        let guards: Vec<_> = self.guards().drain().map(|(_, guard)| guard).collect();
        if guards.is_empty() {
            return;
        }
        for guard in &guards {
            guard.disarm();
        }
        info!(count = guards.len(), "registry destructed");
    }

    /// The guard for `element`, if any.
    pub fn guard(&self, element: &H::Element) -> Option<Arc<Guard<H::Element>>> {
        self.guards().get(&element.key()).cloned()
    }

    /// Returns true if `element` is guarded.
    pub fn is_protected(&self, element: &H::Element) -> bool {
        self.guards().contains_key(&element.key())
    }

    /// Violations counted for `element`, if guarded.
    pub fn violation_count(&self, element: &H::Element) -> Option<u32> {
        self.guard(element).map(|guard| guard.violation_count())
    }

    /// Number of guarded elements.
    pub fn len(&self) -> usize {
        self.guards().len()
    }

    /// Returns true if nothing is guarded.
    pub fn is_empty(&self) -> bool {
        self.guards().is_empty()
    }

    /// Status of every guard, in no particular order.
    pub fn status_report(&self) -> Vec<GuardStatus> {
        let guards: Vec<_> = self.guards().values().cloned().collect();
        guards.iter().map(|guard| guard.status()).collect()
    }

    fn guards(&self) -> MutexGuard<'_, GuardMap<H>> {
        self.guards.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H: Host> Drop for Registry<H> {
    fn drop(&mut self) {
        self.destruct();
        if self.config.audit_mode {
            self.host.release_console_audit();
            debug!("audit mode released");
        }
    }
}

impl<H: Host> std::fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("guards", &self.len())
            .field("audit_mode", &self.config.audit_mode)
            .finish()
    }
}

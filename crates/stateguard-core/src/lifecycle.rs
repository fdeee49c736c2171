//! Binds a guard to a component's mount/unmount lifecycle.
//!
//! UI components typically create their guard when mounted and must release
//! the subscription when unmounted. [`GuardBinding`] holds the options between
//! those points and forwards authorized updates to the live guard.

use tracing::debug;

use crate::config::GuardOptions;
use crate::guard::Guard;
use crate::host::{Element, Host};

/// A guard tied to a component lifecycle.
///
/// # Example
///
/// ```rust
/// use stateguard_core::{Element, GuardBinding, GuardOptions, MemoryDocument};
///
/// let doc = MemoryDocument::new();
/// let toggle = doc.create_element("input");
/// toggle.set_attribute("checked", "");
///
/// let mut binding = GuardBinding::new(GuardOptions::new().with_attributes(["checked"]));
/// binding.mount(&doc, toggle.clone());
///
/// binding.update(|t| t.remove_attribute("checked"));
/// doc.deliver();
/// assert!(toggle.attribute("checked").is_none());
///
/// binding.unmount();
/// assert_eq!(doc.observer_count(), 0);
/// ```
pub struct GuardBinding<E: Element> {
    options: GuardOptions<E>,
    guard: Option<Guard<E>>,
}

impl<E: Element> GuardBinding<E> {
    /// Creates an unmounted binding.
    pub fn new(options: GuardOptions<E>) -> Self {
        Self {
            options,
            guard: None,
        }
    }

    /// Creates the guard for `element`. Remounting replaces the previous
    /// guard.
    pub fn mount<H>(&mut self, host: &H, element: E)
    where
        H: Host<Element = E> + ?Sized,
    {
        self.unmount();
        self.guard = Some(Guard::new(host, element, self.options.clone()));
    }

    /// Forwards an authorized mutation to the mounted guard.
    ///
    /// Returns `None` when nothing is mounted.
    pub fn update<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&E) -> R,
    {
        self.guard.as_ref().and_then(|guard| guard.exec(f))
    }

    /// Disarms the guard. Safe to call when nothing is mounted.
    pub fn unmount(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.disarm();
            debug!(tag = %guard.element().tag_name(), "observer disconnected for component unmount");
        }
    }

    /// The mounted guard, if any.
    pub fn guard(&self) -> Option<&Guard<E>> {
        self.guard.as_ref()
    }

    /// Returns true while a guard is mounted.
    pub fn is_mounted(&self) -> bool {
        self.guard.is_some()
    }
}

impl<E: Element> Drop for GuardBinding<E> {
    fn drop(&mut self) {
        self.unmount();
    }
}

//! Document, elements, and subscriptions of the in-memory host.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

use super::selector::SelectorList;
use crate::host::{Element, Host, MutationCallback, MutationRecord, ObserveOptions, Observer};

/// Upper bound on checkpoint rounds in one [`MemoryDocument::deliver`] call.
///
/// A callback that keeps writing to observed elements could otherwise keep
/// the checkpoint alive forever.
pub const MAX_DELIVERY_ROUNDS: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// When change records reach their subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Records queue until the next [`MemoryDocument::deliver`] checkpoint.
    #[default]
    Batched,
    /// Each record is delivered synchronously from inside the write.
    Immediate,
}

struct Node {
    id: u64,
    tag: String,
    attributes: Mutex<Vec<(String, String)>>,
    document: Weak<DocumentInner>,
}

/// Handle to an element of a [`MemoryDocument`].
///
/// Clones share the same node. Equality is node identity.
#[derive(Clone)]
pub struct MemoryElement {
    node: Arc<Node>,
}

struct Slot {
    id: u64,
    target: u64,
    callback: MutationCallback<MemoryElement>,
    queue: Mutex<Vec<MutationRecord<MemoryElement>>>,
    connected: AtomicBool,
    document: Weak<DocumentInner>,
}

struct SlotHandle(Arc<Slot>);

struct DocumentInner {
    mode: DeliveryMode,
    next_id: AtomicU64,
    elements: Mutex<Vec<MemoryElement>>,
    slots: Mutex<Vec<Arc<Slot>>>,
    /// Live audit holders; clearing is blocked while non-zero.
    console_audit_holders: AtomicUsize,
}

/// An in-memory element tree with attribute change notifications.
///
/// # Example
///
/// ```rust
/// use stateguard_core::{Element, Host, MemoryDocument};
///
/// let doc = MemoryDocument::new();
/// let button = doc.create_element("button");
/// button.set_attribute("id", "pay");
///
/// let found = doc.query_selector_all("#pay");
/// assert_eq!(found, vec![button]);
/// ```
#[derive(Clone)]
pub struct MemoryDocument {
    inner: Arc<DocumentInner>,
}

impl MemoryDocument {
    /// Creates an empty document with batched delivery.
    pub fn new() -> Self {
        Self::with_mode(DeliveryMode::Batched)
    }

    /// Creates an empty document with the given delivery mode.
    pub fn with_mode(mode: DeliveryMode) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                mode,
                next_id: AtomicU64::new(1),
                elements: Mutex::new(Vec::new()),
                slots: Mutex::new(Vec::new()),
                console_audit_holders: AtomicUsize::new(0),
            }),
        }
    }

    /// Delivery mode of this document.
    pub fn mode(&self) -> DeliveryMode {
        self.inner.mode
    }

    /// Appends a new element with no attributes.
    pub fn create_element(&self, tag: &str) -> MemoryElement {
        let element = MemoryElement {
            node: Arc::new(Node {
                id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
                tag: tag.to_ascii_lowercase(),
                attributes: Mutex::new(Vec::new()),
                document: Arc::downgrade(&self.inner),
            }),
        };
        lock(&self.inner.elements).push(element.clone());
        element
    }

    /// Detaches an element from the tree. Existing handles stay usable but
    /// selectors no longer find it.
    pub fn remove_element(&self, element: &MemoryElement) -> bool {
        let mut elements = lock(&self.inner.elements);
        let before = elements.len();
        elements.retain(|e| e != element);
        elements.len() != before
    }

    /// Number of elements in the tree.
    pub fn len(&self) -> usize {
        lock(&self.inner.elements).len()
    }

    /// Returns true if the tree has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of open subscriptions.
    pub fn observer_count(&self) -> usize {
        lock(&self.inner.slots).len()
    }

    /// Number of records queued across all subscriptions.
    pub fn pending_records(&self) -> usize {
        lock(&self.inner.slots)
            .iter()
            .map(|slot| lock(&slot.queue).len())
            .sum()
    }

    /// Runs a notification checkpoint.
    ///
    /// Every non-empty queue is handed to its callback as one batch. Batches
    /// are collected before any callback runs, so a callback that disconnects
    /// another subscription does not stop that subscription's batch from
    /// being delivered in the same round. Rounds repeat until no records
    /// remain, up to [`MAX_DELIVERY_ROUNDS`].
    ///
    /// Returns the number of batches delivered.
    pub fn deliver(&self) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_DELIVERY_ROUNDS {
            let slots: Vec<Arc<Slot>> = lock(&self.inner.slots).clone();
            let batches: Vec<(Arc<Slot>, Vec<MutationRecord<MemoryElement>>)> = slots
                .into_iter()
                .filter_map(|slot| {
                    let records = std::mem::take(&mut *lock(&slot.queue));
                    (!records.is_empty()).then_some((slot, records))
                })
                .collect();

            if batches.is_empty() {
                return delivered;
            }

            for (slot, records) in batches {
                (slot.callback)(records, slot.as_ref());
                delivered += 1;
            }
        }

        warn!(
            rounds = MAX_DELIVERY_ROUNDS,
            pending = self.pending_records(),
            "delivery stopped with records still queued"
        );
        delivered
    }

    /// Clears the diagnostic console unless audit mode blocked it.
    ///
    /// Returns true if the console was cleared.
    pub fn clear_console(&self) -> bool {
        if self.console_clear_blocked() {
            warn!("console clearing is disabled for security auditing");
            false
        } else {
            debug!("console cleared");
            true
        }
    }

    /// Returns true while audit mode blocks console clearing.
    pub fn console_clear_blocked(&self) -> bool {
        self.console_audit_holders() > 0
    }

    /// Number of registered audit holders.
    pub fn console_audit_holders(&self) -> usize {
        self.inner.console_audit_holders.load(Ordering::SeqCst)
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("mode", &self.inner.mode)
            .field("elements", &self.len())
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl DocumentInner {
    fn notify(&self, target: &MemoryElement, attribute_name: &str) {
        let slots: Vec<Arc<Slot>> = lock(&self.slots)
            .iter()
            .filter(|slot| slot.target == target.node.id)
            .cloned()
            .collect();

        for slot in slots {
            let record = MutationRecord::new(attribute_name, target.clone());
            match self.mode {
                DeliveryMode::Batched => lock(&slot.queue).push(record),
                DeliveryMode::Immediate => (slot.callback)(vec![record], slot.as_ref()),
            }
        }
    }
}

impl Host for MemoryDocument {
    type Element = MemoryElement;

    fn query_selector_all(&self, selector: &str) -> Vec<MemoryElement> {
        let Some(list) = SelectorList::parse(selector) else {
            debug!(selector, "unsupported selector matches nothing");
            return Vec::new();
        };

        lock(&self.inner.elements)
            .iter()
            .filter(|element| {
                let attributes = lock(&element.node.attributes).clone();
                list.matches(&element.node.tag, |name: &str| {
                    attributes
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.as_str())
                })
            })
            .cloned()
            .collect()
    }

    fn observe(
        &self,
        target: &MemoryElement,
        _options: ObserveOptions,
        callback: MutationCallback<MemoryElement>,
    ) -> Box<dyn Observer<MemoryElement>> {
        let slot = Arc::new(Slot {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            target: target.node.id,
            callback,
            queue: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            document: Arc::downgrade(&self.inner),
        });
        lock(&self.inner.slots).push(Arc::clone(&slot));
        Box::new(SlotHandle(slot))
    }

    fn acquire_console_audit(&self) {
        self.inner
            .console_audit_holders
            .fetch_add(1, Ordering::SeqCst);
    }

    fn release_console_audit(&self) {
        let released = self.inner.console_audit_holders.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |holders| holders.checked_sub(1),
        );
        if released.is_err() {
            warn!("console audit released without a holder");
        }
    }
}

impl Observer<MemoryElement> for Slot {
    fn take_records(&self) -> Vec<MutationRecord<MemoryElement>> {
        std::mem::take(&mut *lock(&self.queue))
    }

    fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        lock(&self.queue).clear();
        if let Some(document) = self.document.upgrade() {
            lock(&document.slots).retain(|slot| slot.id != self.id);
        }
    }
}

impl Observer<MemoryElement> for SlotHandle {
    fn take_records(&self) -> Vec<MutationRecord<MemoryElement>> {
        self.0.take_records()
    }

    fn disconnect(&self) {
        self.0.disconnect();
    }
}

impl MemoryElement {
    /// Returns true if the element has the attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    fn notify(&self, name: &str) {
        if let Some(document) = self.node.document.upgrade() {
            document.notify(self, name);
        }
    }
}

impl Element for MemoryElement {
    type Key = u64;

    fn key(&self) -> u64 {
        self.node.id
    }

    fn tag_name(&self) -> String {
        self.node.tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        lock(&self.node.attributes)
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn attributes(&self) -> Vec<(String, String)> {
        lock(&self.node.attributes).clone()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        {
            let mut attributes = lock(&self.node.attributes);
            match attributes.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
        self.notify(name);
    }

    fn remove_attribute(&self, name: &str) {
        let removed = {
            let mut attributes = lock(&self.node.attributes);
            let before = attributes.len();
            attributes.retain(|(k, _)| k != name);
            attributes.len() != before
        };
        if removed {
            self.notify(name);
        }
    }
}

impl PartialEq for MemoryElement {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for MemoryElement {}

impl std::fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tag = format!("<{}", self.node.tag);
        for (name, value) in self.attributes() {
            if value.is_empty() {
                tag.push_str(&format!(" {name}"));
            } else {
                tag.push_str(&format!(" {name}=\"{value}\""));
            }
        }
        tag.push('>');
        f.write_str(&tag)
    }
}

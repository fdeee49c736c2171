//! # Guard
//!
//! Per-element state machine: snapshot, detect, revert, count, and report.
//!
//! ## Lifecycle
//!
//! ```text
//!   new() ──▶ Armed ◀──────▶ Locked      (exec toggles)
//!               │               │
//!               └──── disarm ───┴──▶ Disarmed (terminal)
//! ```
//!
//! ## Re-entrancy
//!
//! Two kinds of write must never be counted: the guard's own reverts and
//! authorized writes made through [`Guard::exec`]. Both are covered for
//! either host delivery style:
//!
//! - While a revert or an authorized write is in progress, any batch the
//!   host delivers re-entrantly is ignored in full.
//! - When the write completes, the records it queued on the subscription are
//!   drained with [`Observer::take_records`] so they are never delivered.
//!   After a revert, a drained record counts as an echo only if its
//!   attribute already matches the snapshot; anything else was written by
//!   someone else in the meantime and is handled as a violation.
//!
//! Records queued *before* an authorized write starts are handled as
//! external changes first, so draining never swallows a real violation.
//!
//! No mutex is held while calling into the host, the element, or caller
//! code.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::config::{AttributeFilter, GuardOptions, ViolationCallback};
use crate::host::{Element, Host, MutationRecord, ObserveOptions, Observer};
use crate::snapshot::Snapshot;

/// Observable phase of a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    /// Watching for unauthorized changes.
    Armed,
    /// An authorized mutation is in progress; notifications are ignored.
    Locked,
    /// Subscription released. Terminal.
    Disarmed,
}

/// Point-in-time summary of a guard, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardStatus {
    /// Tag name of the guarded element.
    pub tag_name: String,
    /// Violations counted so far.
    pub violations: u32,
    /// Attempt limit.
    pub max_attempts: u32,
    /// Current phase.
    pub phase: GuardPhase,
    /// Attributes in the snapshot.
    pub snapshot_len: usize,
}

struct GuardState<E> {
    filter: AttributeFilter,
    max_attempts: u32,
    violations: u32,
    /// Nesting depth of authorized mutations in progress.
    lock_depth: u32,
    /// Set while the handler writes a revert.
    reverting: bool,
    armed: bool,
    snapshot: Snapshot,
    callback: Option<ViolationCallback<E>>,
}

struct Shared<E> {
    element: E,
    state: Mutex<GuardState<E>>,
}

impl<E: Element> Shared<E> {
    fn state(&self) -> MutexGuard<'_, GuardState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self) {
        let snapshot = Snapshot::capture(&self.element);
        self.state().snapshot = snapshot;
    }

    /// Handles one delivered batch.
    fn handle(&self, records: Vec<MutationRecord<E>>, observer: &dyn Observer<E>) {
        let mut pending: VecDeque<_> = records.into();
        while let Some(record) = pending.pop_front() {
            let (revert, count, callback) = {
                let mut state = self.state();
                if !state.armed || state.lock_depth > 0 || state.reverting {
                    return;
                }
                if !state.filter.matches(&record.attribute_name) {
                    continue;
                }
                state.violations += 1;
                state.reverting = true;
                let callback = state
                    .callback
                    .clone()
                    .filter(|_| state.violations >= state.max_attempts);
                (
                    state.snapshot.revert_for(&record.attribute_name),
                    state.violations,
                    callback,
                )
            };

            warn!(
                tag = %self.element.tag_name(),
                attribute = %record.attribute_name,
                violations = count,
                "unauthorized attribute change reverted"
            );

            revert.apply(&self.element);
            let drained = observer.take_records();
            let external = self.unexplained(drained);
            self.state().reverting = false;
            pending.extend(external);

            if let Some(callback) = callback {
                callback(&self.element, count);
            }
        }
    }

    /// Splits drained records into echoes and foreign writes, returning the
    /// latter.
    fn unexplained(&self, drained: Vec<MutationRecord<E>>) -> Vec<MutationRecord<E>> {
        if drained.is_empty() {
            return drained;
        }
        let current: Vec<Option<String>> = drained
            .iter()
            .map(|record| self.element.attribute(&record.attribute_name))
            .collect();
        let snapshot = self.state().snapshot.clone();

        // One record per drifted attribute; the revert's echo folds into it.
        let total = drained.len();
        let mut seen = BTreeSet::new();
        let external: Vec<_> = drained
            .into_iter()
            .zip(current)
            .filter(|(record, value)| snapshot.get(&record.attribute_name) != value.as_deref())
            .filter(|(record, _)| seen.insert(record.attribute_name.clone()))
            .map(|(record, _)| record)
            .collect();
        let echoed = total - external.len();
        if echoed > 0 {
            debug!(echoed, "discarded records produced by revert");
        }
        external
    }
}

/// Watches one element and reverts unauthorized attribute changes.
///
/// # Example
///
/// ```rust
/// use stateguard_core::{Element, Guard, GuardOptions, MemoryDocument};
///
/// let doc = MemoryDocument::new();
/// let button = doc.create_element("button");
/// button.set_attribute("disabled", "");
///
/// let guard = Guard::new(&doc, button.clone(), GuardOptions::new().with_attributes(["disabled"]));
///
/// // Tampering is undone at the next notification checkpoint.
/// button.remove_attribute("disabled");
/// doc.deliver();
/// assert!(button.attribute("disabled").is_some());
/// assert_eq!(guard.violation_count(), 1);
///
/// // Authorized changes go through exec.
/// guard.exec(|b| b.remove_attribute("disabled"));
/// doc.deliver();
/// assert!(button.attribute("disabled").is_none());
/// assert_eq!(guard.violation_count(), 1);
/// ```
pub struct Guard<E: Element> {
    shared: Arc<Shared<E>>,
    observer: Mutex<Option<Arc<dyn Observer<E>>>>,
}

impl<E: Element> Guard<E> {
    /// Snapshots `element` and subscribes to its attribute changes.
    ///
    /// A `max_attempts` below 1 is treated as 1.
    pub fn new<H>(host: &H, element: E, options: GuardOptions<E>) -> Self
    where
        H: Host<Element = E> + ?Sized,
    {
        let GuardOptions {
            config,
            on_violation,
        } = options;

        let shared = Arc::new(Shared {
            state: Mutex::new(GuardState {
                filter: config.attributes,
                max_attempts: config.max_attempts.max(1),
                violations: 0,
                lock_depth: 0,
                reverting: false,
                armed: true,
                snapshot: Snapshot::capture(&element),
                callback: on_violation,
            }),
            element,
        });

        let handler = Arc::clone(&shared);
        let observer = host.observe(
            &shared.element,
            ObserveOptions::attributes(),
            Box::new(
                move |records: Vec<MutationRecord<E>>, observer: &dyn Observer<E>| {
                    handler.handle(records, observer)
                },
            ),
        );

        {
            let state = shared.state();
            debug!(
                tag = %shared.element.tag_name(),
                filter = %state.filter,
                max_attempts = state.max_attempts,
                snapshot_len = state.snapshot.len(),
                "guard armed"
            );
        }

        Self {
            shared,
            observer: Mutex::new(Some(Arc::from(observer))),
        }
    }

    /// Re-captures the snapshot from the element's current attributes.
    pub fn save(&self) {
        self.shared.save();
    }

    /// Runs an authorized mutation.
    ///
    /// Changes made by `f` are never reverted or counted, and the snapshot is
    /// re-taken afterwards. The lock is released and the snapshot re-taken
    /// even if `f` panics. Returns `None` without running `f` if the guard
    /// is disarmed.
    ///
    /// Only the synchronous body of `f` is authorized. Writes performed after
    /// `f` returns (for example from a spawned task) are treated as
    /// violations.
    pub fn exec<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&E) -> R,
    {
        if !self.is_armed() {
            debug!("exec on disarmed guard ignored");
            return None;
        }

        // Anything queued so far predates the authorization.
        let pending = self.take_records();
        if !pending.is_empty() {
            self.with_observer(|observer| self.shared.handle(pending, observer));
        }

        self.shared.state().lock_depth += 1;
        let _authorization = Authorization { guard: self };
        Some(f(&self.shared.element))
    }

    /// Runs a fallible authorized mutation, passing its error through.
    ///
    /// Returns `Ok(None)` if the guard is disarmed.
    pub fn try_exec<T, Err, F>(&self, f: F) -> Result<Option<T>, Err>
    where
        F: FnOnce(&E) -> Result<T, Err>,
    {
        self.exec(f).transpose()
    }

    /// Releases the subscription. Idempotent.
    ///
    /// Batches already queued or in flight are ignored when delivered.
    pub fn disarm(&self) {
        let was_armed = std::mem::replace(&mut self.shared.state().armed, false);
        let observer = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(observer) = observer {
            observer.disconnect();
        }
        if was_armed {
            debug!(tag = %self.shared.element.tag_name(), "guard disarmed");
        }
    }

    /// The guarded element.
    pub fn element(&self) -> &E {
        &self.shared.element
    }

    /// Violations counted so far.
    pub fn violation_count(&self) -> u32 {
        self.shared.state().violations
    }

    /// Attempt limit after clamping.
    pub fn max_attempts(&self) -> u32 {
        self.shared.state().max_attempts
    }

    /// The attribute filter.
    pub fn filter(&self) -> AttributeFilter {
        self.shared.state().filter.clone()
    }

    /// A copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.state().snapshot.clone()
    }

    /// Returns true until the guard is disarmed.
    pub fn is_armed(&self) -> bool {
        self.shared.state().armed
    }

    /// Current phase.
    pub fn phase(&self) -> GuardPhase {
        let state = self.shared.state();
        if !state.armed {
            GuardPhase::Disarmed
        } else if state.lock_depth > 0 {
            GuardPhase::Locked
        } else {
            GuardPhase::Armed
        }
    }

    /// Summary for logging.
    pub fn status(&self) -> GuardStatus {
        let tag_name = self.shared.element.tag_name();
        let phase = self.phase();
        let state = self.shared.state();
        GuardStatus {
            tag_name,
            violations: state.violations,
            max_attempts: state.max_attempts,
            phase,
            snapshot_len: state.snapshot.len(),
        }
    }

    fn take_records(&self) -> Vec<MutationRecord<E>> {
        self.with_observer(|observer| observer.take_records())
            .unwrap_or_default()
    }

    fn with_observer<R>(&self, f: impl FnOnce(&dyn Observer<E>) -> R) -> Option<R> {
        // Cloned out so caller code run by `f` can re-enter the guard.
        let observer = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        observer.as_deref().map(f)
    }
}

impl<E: Element> Drop for Guard<E> {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl<E: Element> std::fmt::Debug for Guard<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status();
        f.debug_struct("Guard")
            .field("tag_name", &status.tag_name)
            .field("violations", &status.violations)
            .field("max_attempts", &status.max_attempts)
            .field("phase", &status.phase)
            .finish()
    }
}

/// Closes an authorization window on drop, including during unwinding.
struct Authorization<'a, E: Element> {
    guard: &'a Guard<E>,
}

impl<E: Element> Drop for Authorization<'_, E> {
    fn drop(&mut self) {
        let echoed = self.guard.take_records().len();
        self.guard.save();
        self.guard.shared.state().lock_depth -= 1;
        debug!(echoed, "authorized mutation committed");
    }
}

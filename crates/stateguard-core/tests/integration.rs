//! # StateGuard Integration Tests
//!
//! End-to-end checks of the guard/registry contract against the in-memory
//! host.
//!
//! | Property | Test |
//! |----------|------|
//! | Detection and revert | `test_detection_and_revert` |
//! | Foreign writes never swallowed | `test_foreign_write_during_revert_is_not_discarded` |
//! | Authorized bypass | `test_authorized_bypass` |
//! | Threshold callback | `test_threshold_callback` |
//! | Filter selectivity | `test_filter_selectivity` |
//! | Teardown finality | `test_teardown_*` |
//! | Re-protect resets state | `test_reprotect_resets_count` |

use std::sync::{Arc, Mutex};

use stateguard_core::{
    DeliveryMode, Element, GuardOptions, GuardPhase, MemoryDocument, MemoryElement, Registry,
};

/// Creates `<button id="btn" disabled>` in a fresh document.
fn button_fixture(mode: DeliveryMode) -> (Arc<MemoryDocument>, MemoryElement) {
    let doc = Arc::new(MemoryDocument::with_mode(mode));
    let button = doc.create_element("button");
    button.set_attribute("id", "btn");
    button.set_attribute("disabled", "");
    (doc, button)
}

/// Options that record every callback invocation.
fn recording_options(max_attempts: u32) -> (GuardOptions<MemoryElement>, Arc<Mutex<Vec<u32>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let options = GuardOptions::new()
        .with_attributes(["disabled"])
        .with_max_attempts(max_attempts)
        .on_violation(move |_el: &MemoryElement, count| sink.lock().unwrap().push(count));
    (options, calls)
}

// =============================================================================
// DETECTION
// =============================================================================

#[test]
fn test_example_scenario() {
    let (doc, button) = button_fixture(DeliveryMode::Batched);
    let registry = Registry::new(Arc::clone(&doc));

    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    registry.protect(
        "#btn",
        GuardOptions::new()
            .with_attributes(["disabled"])
            .with_max_attempts(1)
            .on_violation(move |el: &MemoryElement, count| {
                sink.lock().unwrap().push((el.clone(), count));
            }),
    );

    button.remove_attribute("disabled");
    doc.deliver();

    assert!(button.has_attribute("disabled"));
    assert_eq!(registry.violation_count(&button), Some(1));
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], (button.clone(), 1));
}

#[test]
fn test_detection_and_revert() {
    for mode in [DeliveryMode::Batched, DeliveryMode::Immediate] {
        let (doc, button) = button_fixture(mode);
        let registry = Registry::new(Arc::clone(&doc));
        registry.protect("#btn", GuardOptions::new());

        button.set_attribute("id", "hijacked");
        doc.deliver();
        assert_eq!(button.attribute("id").as_deref(), Some("btn"), "{mode:?}");
        assert_eq!(registry.violation_count(&button), Some(1), "{mode:?}");

        button.set_attribute("formaction", "https://evil.example");
        doc.deliver();
        assert!(!button.has_attribute("formaction"), "{mode:?}");
        assert_eq!(registry.violation_count(&button), Some(2), "{mode:?}");

        // Quiet afterwards: reverts never echo back as violations.
        assert_eq!(doc.deliver(), 0);
        assert_eq!(registry.violation_count(&button), Some(2), "{mode:?}");
    }
}

#[test]
fn test_authorized_bypass() {
    for mode in [DeliveryMode::Batched, DeliveryMode::Immediate] {
        let (doc, button) = button_fixture(mode);
        let registry = Registry::new(Arc::clone(&doc));
        registry.protect("#btn", GuardOptions::new().with_attributes(["disabled"]));

        registry.update(&button, |b| b.remove_attribute("disabled"));
        doc.deliver();
        assert!(!button.has_attribute("disabled"), "{mode:?}");
        assert_eq!(registry.violation_count(&button), Some(0), "{mode:?}");

        // The new state is now the baseline.
        button.set_attribute("disabled", "");
        doc.deliver();
        assert!(!button.has_attribute("disabled"), "{mode:?}");
        assert_eq!(registry.violation_count(&button), Some(1), "{mode:?}");
    }
}

#[test]
fn test_threshold_callback() {
    let (doc, button) = button_fixture(DeliveryMode::Batched);
    let registry = Registry::new(Arc::clone(&doc));
    let (options, calls) = recording_options(3);
    registry.protect("#btn", options);

    for _ in 0..2 {
        button.remove_attribute("disabled");
        doc.deliver();
    }
    assert!(calls.lock().unwrap().is_empty());

    for _ in 0..3 {
        button.remove_attribute("disabled");
        doc.deliver();
    }
    assert_eq!(*calls.lock().unwrap(), vec![3, 4, 5]);
}

#[test]
fn test_threshold_fires_per_record_in_one_batch() {
    let (doc, button) = button_fixture(DeliveryMode::Batched);
    let registry = Registry::new(Arc::clone(&doc));
    let (options, calls) = recording_options(2);
    registry.protect("#btn", options);

    button.remove_attribute("disabled");
    button.set_attribute("disabled", "x");
    button.remove_attribute("disabled");
    doc.deliver();

    assert_eq!(*calls.lock().unwrap(), vec![2, 3]);
    assert_eq!(button.attribute("disabled").as_deref(), Some(""));
}

#[test]
fn test_filter_selectivity() {
    let (doc, button) = button_fixture(DeliveryMode::Batched);
    let registry = Registry::new(Arc::clone(&doc));
    registry.protect("#btn", GuardOptions::new().with_attributes(["disabled"]));

    button.set_attribute("class", "btn-primary");
    button.set_attribute("id", "renamed");
    doc.deliver();

    assert_eq!(button.attribute("class").as_deref(), Some("btn-primary"));
    assert_eq!(button.attribute("id").as_deref(), Some("renamed"));
    assert_eq!(registry.violation_count(&button), Some(0));
}

#[test]
fn test_callback_may_reenter_registry() {
    let (doc, button) = button_fixture(DeliveryMode::Batched);
    let registry = Arc::new(Registry::new(Arc::clone(&doc)));
    let weak = Arc::downgrade(&registry);

    // On the second attempt, lock the button for good by marking it.
    registry.protect(
        "#btn",
        GuardOptions::new()
            .with_attributes(["disabled"])
            .with_max_attempts(2)
            .on_violation(move |el: &MemoryElement, _| {
                if let Some(registry) = weak.upgrade() {
                    registry.update(el, |b| b.set_attribute("data-locked", "true"));
                }
            }),
    );

    for _ in 0..2 {
        button.remove_attribute("disabled");
        doc.deliver();
    }

    assert_eq!(button.attribute("data-locked").as_deref(), Some("true"));
    assert_eq!(registry.violation_count(&button), Some(2));
    assert!(registry
        .guard(&button)
        .unwrap()
        .snapshot()
        .contains("data-locked"));
}

#[test]
fn test_foreign_write_during_revert_is_not_discarded() {
    let doc = Arc::new(MemoryDocument::new());
    let first = doc.create_element("button");
    first.set_attribute("id", "b");
    let second = doc.create_element("button");
    second.set_attribute("id", "a");
    second.set_attribute("disabled", "");

    let registry = Registry::new(Arc::clone(&doc));
    // `#b` is subscribed first, so its callback runs before `#a` handles
    // its own batch in the same checkpoint.
    let target = second.clone();
    registry.protect(
        "#b",
        GuardOptions::new()
            .with_max_attempts(1)
            .on_violation(move |_: &MemoryElement, _| {
                target.set_attribute("onclick", "steal()");
            }),
    );
    registry.protect("#a", GuardOptions::new());

    first.set_attribute("title", "x");
    second.remove_attribute("disabled");
    doc.deliver();
    doc.deliver();

    assert!(second.has_attribute("disabled"));
    assert!(!second.has_attribute("onclick"));
    assert_eq!(registry.violation_count(&second), Some(2));
    assert!(!first.has_attribute("title"));
    assert_eq!(doc.deliver(), 0);
}

// =============================================================================
// TEARDOWN
// =============================================================================

#[test]
fn test_teardown_stops_reverting() {
    let (doc, button) = button_fixture(DeliveryMode::Batched);
    let registry = Registry::new(Arc::clone(&doc));
    registry.protect("#btn", GuardOptions::new().with_attributes(["disabled"]));
    let guard = registry.guard(&button).unwrap();

    registry.destruct();
    button.remove_attribute("disabled");
    doc.deliver();

    assert!(!button.has_attribute("disabled"));
    assert_eq!(guard.violation_count(), 0);
    assert_eq!(guard.phase(), GuardPhase::Disarmed);
    assert!(!registry.is_protected(&button));
    assert_eq!(registry.update(&button, |_| ()), None);
}

#[test]
fn test_teardown_discards_queued_records() {
    let (doc, button) = button_fixture(DeliveryMode::Batched);
    let registry = Registry::new(Arc::clone(&doc));
    registry.protect("#btn", GuardOptions::new().with_attributes(["disabled"]));
    let guard = registry.guard(&button).unwrap();

    // Mutation lands in the same delivery window as teardown.
    button.remove_attribute("disabled");
    registry.destruct();
    doc.deliver();

    assert!(!button.has_attribute("disabled"));
    assert_eq!(guard.violation_count(), 0);
}

#[test]
fn test_teardown_during_checkpoint() {
    let doc = Arc::new(MemoryDocument::new());
    let first = doc.create_element("button");
    first.set_attribute("class", "locked");
    first.set_attribute("disabled", "");
    let second = doc.create_element("button");
    second.set_attribute("class", "locked");
    second.set_attribute("disabled", "");

    let registry = Arc::new(Registry::new(Arc::clone(&doc)));
    let weak = Arc::downgrade(&registry);
    registry.protect(
        ".locked",
        GuardOptions::new()
            .with_max_attempts(1)
            .on_violation(move |_: &MemoryElement, _| {
                if let Some(registry) = weak.upgrade() {
                    registry.destruct();
                }
            }),
    );
    let second_guard = registry.guard(&second).unwrap();

    // Both batches are collected before the first callback tears everything
    // down; the second guard must ignore its already collected batch.
    first.remove_attribute("disabled");
    second.remove_attribute("disabled");
    doc.deliver();

    assert!(first.has_attribute("disabled"));
    assert!(!second.has_attribute("disabled"));
    assert_eq!(second_guard.violation_count(), 0);
    assert!(registry.is_empty());
}

#[test]
fn test_drop_registry_disarms_guards() {
    let (doc, button) = button_fixture(DeliveryMode::Batched);
    {
        let registry = Registry::new(Arc::clone(&doc));
        registry.protect("#btn", GuardOptions::new());
        assert_eq!(doc.observer_count(), 1);
    }
    assert_eq!(doc.observer_count(), 0);

    button.remove_attribute("disabled");
    doc.deliver();
    assert!(!button.has_attribute("disabled"));
}

// =============================================================================
// REPLACEMENT
// =============================================================================

#[test]
fn test_reprotect_resets_count() {
    let (doc, button) = button_fixture(DeliveryMode::Batched);
    let registry = Registry::new(Arc::clone(&doc));
    registry.protect("#btn", GuardOptions::new());

    for _ in 0..4 {
        button.remove_attribute("disabled");
        doc.deliver();
    }
    assert_eq!(registry.violation_count(&button), Some(4));

    registry.protect("#btn", GuardOptions::new());
    assert_eq!(registry.violation_count(&button), Some(0));

    button.remove_attribute("disabled");
    doc.deliver();
    assert_eq!(registry.violation_count(&button), Some(1));
    assert!(button.has_attribute("disabled"));
}

#[test]
fn test_reprotect_snapshots_current_state() {
    let (doc, button) = button_fixture(DeliveryMode::Batched);
    let registry = Registry::new(Arc::clone(&doc));
    registry.protect("#btn", GuardOptions::new());

    registry.update(&button, |b| b.set_attribute("aria-label", "Pay"));
    registry.protect("#btn", GuardOptions::new());

    let snapshot = registry.guard(&button).unwrap().snapshot();
    assert_eq!(snapshot.get("aria-label"), Some("Pay"));
    assert_eq!(snapshot.len(), 3);
}

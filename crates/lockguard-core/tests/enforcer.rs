use std::sync::Arc;
use std::thread;

use lockguard_core::enforcer::{EnforceMode, EnforceOutcome, PolicyEnforcer, PolicyRule};
use lockguard_core::memory::MemoryRegistry;
use lockguard_core::target::WatchTarget;

const VALUE: &str = "NoChangingLockScreen";

fn key() -> WatchTarget {
    WatchTarget::parse("HKLM\\SOFTWARE\\Policies\\Microsoft\\Windows\\Personalization").expect("parse key")
}

fn rule(mode: EnforceMode) -> PolicyRule {
    PolicyRule {
        key: key(),
        value_name: VALUE.to_string(),
        baseline: 0,
        mode,
    }
}

#[test]
fn absent_value_is_left_alone() {
    let registry = MemoryRegistry::new();
    let enforcer = PolicyEnforcer::new(registry.clone(), rule(EnforceMode::SetThenDelete));
    assert_eq!(enforcer.enforce(), EnforceOutcome::Compliant);
    assert_eq!(registry.stats().writes, 0);
    assert_eq!(registry.stats().deletes, 0);

    registry.create_key(&key());
    assert_eq!(enforcer.enforce(), EnforceOutcome::Compliant);
    assert_eq!(registry.stats().writes, 0);
}

#[test]
fn baseline_value_is_left_alone() {
    let registry = MemoryRegistry::new();
    registry.set(&key(), VALUE, 0);
    let enforcer = PolicyEnforcer::new(registry.clone(), rule(EnforceMode::SetThenDelete));
    assert_eq!(enforcer.enforce(), EnforceOutcome::Compliant);
    assert_eq!(registry.stats().writes, 0);
    assert_eq!(registry.get(&key(), VALUE), Some(0));
}

#[test]
fn deviating_value_is_set_then_deleted() {
    let registry = MemoryRegistry::new();
    registry.set(&key(), VALUE, 1);
    let enforcer = PolicyEnforcer::new(registry.clone(), rule(EnforceMode::SetThenDelete));
    assert_eq!(enforcer.enforce(), EnforceOutcome::Reset { previous: 1 });
    assert_eq!(registry.get(&key(), VALUE), None);
    assert_eq!(registry.stats().writes, 1);
    assert_eq!(registry.stats().deletes, 1);

    assert_eq!(enforcer.enforce(), EnforceOutcome::Compliant);
}

#[test]
fn value_names_are_case_insensitive() {
    let registry = MemoryRegistry::new();
    registry.set(&key(), "nochanginglockscreen", 1);
    let enforcer = PolicyEnforcer::new(registry.clone(), rule(EnforceMode::SetThenDelete));
    assert_eq!(enforcer.enforce(), EnforceOutcome::Reset { previous: 1 });
    assert_eq!(registry.get(&key(), VALUE), None);
}

#[test]
fn set_only_mode_leaves_baseline_present() {
    let registry = MemoryRegistry::new();
    registry.set(&key(), VALUE, 7);
    let enforcer = PolicyEnforcer::new(registry.clone(), rule(EnforceMode::SetOnly));
    assert_eq!(enforcer.enforce(), EnforceOutcome::Reset { previous: 7 });
    assert_eq!(registry.get(&key(), VALUE), Some(0));
    assert_eq!(registry.stats().deletes, 0);
}

#[test]
fn store_failures_are_swallowed_and_retried_next_time() {
    let registry = MemoryRegistry::new();
    registry.set(&key(), VALUE, 1);
    registry.set_store_failure(true);
    let enforcer = PolicyEnforcer::new(registry.clone(), rule(EnforceMode::SetThenDelete));
    assert_eq!(enforcer.enforce(), EnforceOutcome::Failed);
    assert_eq!(registry.get(&key(), VALUE), Some(1));

    registry.set_store_failure(false);
    assert_eq!(enforcer.enforce(), EnforceOutcome::Reset { previous: 1 });
    assert_eq!(registry.get(&key(), VALUE), None);
}

#[test]
fn concurrent_enforcement_converges_to_absent() {
    for _ in 0..50 {
        let registry = MemoryRegistry::new();
        registry.set(&key(), VALUE, 1);
        let enforcer = Arc::new(PolicyEnforcer::new(registry.clone(), rule(EnforceMode::SetThenDelete)));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let e = Arc::clone(&enforcer);
                thread::spawn(move || e.enforce())
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().expect("join")).collect();

        assert!(outcomes.iter().all(|o| *o != EnforceOutcome::Failed), "{outcomes:?}");
        assert!(outcomes.iter().any(|o| matches!(o, EnforceOutcome::Reset { previous: 1 })));
        assert_eq!(registry.get(&key(), VALUE), None);
    }
}

#![cfg(windows)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use uuid::Uuid;
use winreg::enums::HKEY_CURRENT_USER;
use winreg::RegKey;

use lockguard_core::backend::PolicyStore;
use lockguard_core::enforcer::{EnforceMode, EnforceOutcome, PolicyEnforcer, PolicyRule};
use lockguard_core::target::{RootScope, WatchTarget};
use lockguard_core::watcher::{KeyWatcher, WatcherState};
use lockguard_windows::notify::RegistryNotifyBackend;
use lockguard_windows::store::RegistryPolicyStore;

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn read_missing_key_and_value_is_none() {
    let (key_path, _guard) = create_test_key();
    let target = WatchTarget::new(RootScope::CurrentUser, &key_path).expect("target");
    let store = RegistryPolicyStore;

    assert_eq!(store.read_dword(&target, "NoChangingLockScreen").expect("read"), None);

    RegKey::predef(HKEY_CURRENT_USER).create_subkey(&key_path).expect("create subkey");
    assert_eq!(store.read_dword(&target, "NoChangingLockScreen").expect("read"), None);
    store.delete_value(&target, "NoChangingLockScreen").expect("delete absent value");
}

#[test]
fn write_creates_key_and_delete_removes_value() {
    let (key_path, _guard) = create_test_key();
    let target = WatchTarget::new(RootScope::CurrentUser, &key_path).expect("target");
    let store = RegistryPolicyStore;

    store.write_dword(&target, "NoChangingLockScreen", 1).expect("write");
    assert_eq!(store.read_dword(&target, "NoChangingLockScreen").expect("read"), Some(1));

    store.delete_value(&target, "NoChangingLockScreen").expect("delete");
    assert_eq!(store.read_dword(&target, "NoChangingLockScreen").expect("read"), None);
}

#[test]
fn enforcer_resets_live_value() {
    let (key_path, _guard) = create_test_key();
    let target = WatchTarget::new(RootScope::CurrentUser, &key_path).expect("target");
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let (key, _disp) = hkcu.create_subkey(&key_path).expect("create subkey");
    key.set_value("NoChangingLockScreen", &1u32).expect("set dword");

    let enforcer = PolicyEnforcer::new(
        RegistryPolicyStore,
        PolicyRule {
            key: target,
            value_name: "NoChangingLockScreen".to_string(),
            baseline: 0,
            mode: EnforceMode::SetThenDelete,
        },
    );
    assert_eq!(enforcer.enforce(), EnforceOutcome::Reset { previous: 1 });
    assert!(key.get_raw_value("NoChangingLockScreen").is_err());
    assert_eq!(enforcer.enforce(), EnforceOutcome::Compliant);
}

#[test]
fn watcher_observes_value_change_and_stops_promptly() {
    let (key_path, _guard) = create_test_key();
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let (key, _disp) = hkcu.create_subkey(&key_path).expect("create subkey");
    let target = WatchTarget::new(RootScope::CurrentUser, &key_path).expect("target");

    let watcher = KeyWatcher::new(RegistryNotifyBackend, target);
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    watcher.on_changed(move || {
        h.fetch_add(1, Ordering::SeqCst);
    });
    watcher.start().expect("start");
    assert_eq!(watcher.state(), WatcherState::Monitoring);

    // 给监视线程完成首次布防的时间。
    let mut observed = false;
    let deadline = Instant::now() + TIMEOUT;
    let mut n = 0u32;
    while Instant::now() < deadline {
        n += 1;
        key.set_value("Probe", &n).expect("set probe");
        thread::sleep(Duration::from_millis(50));
        if hits.load(Ordering::SeqCst) > 0 {
            observed = true;
            break;
        }
    }
    assert!(observed, "change callback not invoked");

    let started = Instant::now();
    watcher.stop().expect("stop");
    assert!(started.elapsed() < TIMEOUT);
    assert_eq!(watcher.state(), WatcherState::Idle);
    watcher.dispose().expect("dispose");
}

#[test]
fn watcher_start_on_missing_key_reports_error_and_returns_to_idle() {
    let (key_path, _guard) = create_test_key();
    let target = WatchTarget::new(RootScope::CurrentUser, &key_path).expect("target");

    let watcher = KeyWatcher::new(RegistryNotifyBackend, target);
    let errors = Arc::new(AtomicUsize::new(0));
    let e = Arc::clone(&errors);
    watcher.on_error(move |_err| {
        e.fetch_add(1, Ordering::SeqCst);
    });
    watcher.start().expect("start");

    let deadline = Instant::now() + TIMEOUT;
    while watcher.state() != WatcherState::Idle && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(watcher.state(), WatcherState::Idle);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

fn create_test_key() -> (String, CleanupKey) {
    let path = format!("Software\\LockguardTest\\{}", Uuid::new_v4());
    (path.clone(), CleanupKey(path))
}

struct CleanupKey(String);

impl Drop for CleanupKey {
    fn drop(&mut self) {
        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let _ = hkcu.delete_subkey_all(&self.0);
    }
}

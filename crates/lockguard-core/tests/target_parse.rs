use lockguard_core::error::WatchError;
use lockguard_core::memory::MemoryRegistry;
use lockguard_core::target::{RootScope, WatchTarget};
use lockguard_core::watcher::{KeyWatcher, WatcherState};

const ALIASES: &[(&str, RootScope)] = &[
    ("HKLM", RootScope::LocalMachine),
    ("HKEY_LOCAL_MACHINE", RootScope::LocalMachine),
    ("HKCU", RootScope::CurrentUser),
    ("HKEY_CURRENT_USER", RootScope::CurrentUser),
    ("HKU", RootScope::Users),
    ("HKEY_USERS", RootScope::Users),
    ("HKCR", RootScope::ClassesRoot),
    ("HKEY_CLASSES_ROOT", RootScope::ClassesRoot),
    ("HKCC", RootScope::CurrentConfig),
    ("HKEY_CURRENT_CONFIG", RootScope::CurrentConfig),
    ("HKDD", RootScope::DynData),
    ("HKEY_DYN_DATA", RootScope::DynData),
    ("HKPD", RootScope::PerformanceData),
    ("HKEY_PERFORMANCE_DATA", RootScope::PerformanceData),
];

#[test]
fn every_alias_resolves_to_its_scope_and_sub_path() {
    for (alias, scope) in ALIASES {
        let full = format!("{alias}\\Sub\\Path");
        let target = WatchTarget::parse(&full).unwrap_or_else(|e| panic!("parse {full} failed: {e}"));
        assert_eq!(target.scope(), *scope, "alias {alias}");
        assert_eq!(target.sub_path(), "Sub\\Path", "alias {alias}");
    }
}

#[test]
fn aliases_are_case_insensitive() {
    let target = WatchTarget::parse("hkey_local_machine\\Software").expect("parse");
    assert_eq!(target.scope(), RootScope::LocalMachine);
    let target = WatchTarget::parse("Hkcu\\Software").expect("parse");
    assert_eq!(target.scope(), RootScope::CurrentUser);
}

#[test]
fn watcher_from_path_uses_the_resolved_target() {
    for (alias, scope) in ALIASES {
        let watcher = KeyWatcher::from_path(MemoryRegistry::new(), &format!("{alias}\\Sub\\Path"))
            .expect("construct watcher");
        assert_eq!(watcher.target().scope(), *scope);
        assert_eq!(watcher.target().sub_path(), "Sub\\Path");
        assert_eq!(watcher.state(), WatcherState::Idle);
    }
}

#[test]
fn unknown_alias_and_empty_paths_are_rejected() {
    for bad in ["", "   ", "HKXX\\Software", "HKLM", "HKLM\\", "HKLM\\\\", "Software\\Policies"] {
        match WatchTarget::parse(bad) {
            Err(WatchError::InvalidArgument(_)) => {}
            other => panic!("{bad:?} should be rejected, got {other:?}"),
        }
    }
    assert!(matches!(
        WatchTarget::new(RootScope::CurrentUser, ""),
        Err(WatchError::InvalidArgument(_))
    ));
}

#[test]
fn failed_construction_allocates_nothing() {
    let registry = MemoryRegistry::new();
    let result = KeyWatcher::from_path(registry.clone(), "NOPE\\Software");
    assert!(matches!(result, Err(WatchError::InvalidArgument(_))));
    assert_eq!(registry.stats().opens, 0);
    assert_eq!(registry.open_watches(), 0);
}

#[test]
fn display_uses_canonical_root_name() {
    let target = WatchTarget::parse("HKLM\\SOFTWARE\\Policies\\").expect("parse");
    assert_eq!(target.to_string(), "HKEY_LOCAL_MACHINE\\SOFTWARE\\Policies");
    let round: WatchTarget = target.to_string().parse().expect("reparse");
    assert_eq!(round, target);
}

#[test]
fn contains_matches_subtree_only() {
    let root = WatchTarget::parse("HKLM\\Software\\Policies").expect("parse");
    let child = WatchTarget::parse("HKLM\\SOFTWARE\\policies\\Microsoft").expect("parse");
    let sibling = WatchTarget::parse("HKLM\\Software\\PoliciesX").expect("parse");
    let other_root = WatchTarget::parse("HKCU\\Software\\Policies").expect("parse");
    assert!(root.contains(&root));
    assert!(root.contains(&child));
    assert!(!root.contains(&sibling));
    assert!(!root.contains(&other_root));
}

#[test]
fn short_and_canonical_names_parse_back_to_the_same_scope() {
    for scope in RootScope::ALL {
        assert_eq!(RootScope::from_alias(scope.short_name()), Some(scope));
        assert_eq!(RootScope::from_alias(scope.canonical_name()), Some(scope));
    }
}

// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::BTreeSet;

use hpk_config::Config;
use hpk_schema::{ConcreteSpec, spec};
use rstest::rstest;

use super::Store;
use crate::fixtures::*;
use crate::{Error, InstallStatus, InstallStatuses, Query};

fn query_set(store: &Store, installed: InstallStatuses) -> BTreeSet<ConcreteSpec> {
    store
        .db()
        .query(&Query::new().with_installed(installed))
        .unwrap()
        .into_iter()
        .collect()
}

#[rstest]
fn test_install_lays_out_prefixes(store: TempStore, libelf: ConcreteSpec, libdwarf: ConcreteSpec) {
    init_logging();
    let prefix = store.install(&libdwarf, true).unwrap();
    assert_eq!(prefix, store.layout().path_for_spec(&libdwarf));
    assert!(store.layout().check_installed(&libelf).unwrap().is_some());
    assert!(store.layout().check_installed(&libdwarf).unwrap().is_some());

    let dwarf = store.db().get_record(libdwarf.dag_hash()).unwrap();
    assert!(dwarf.explicit && dwarf.installed);
    let elf = store.db().get_record(libelf.dag_hash()).unwrap();
    assert!(!elf.explicit && elf.installed);
    assert_eq!(elf.ref_count, 1);
    store.db().check_ref_counts().unwrap();
}

#[rstest]
fn test_install_keeps_explicit_dependencies(
    store: TempStore,
    libelf: ConcreteSpec,
    libdwarf: ConcreteSpec,
) {
    store.install(&libelf, true).unwrap();
    store.install(&libdwarf, true).unwrap();
    assert!(store.db().get_record(libelf.dag_hash()).unwrap().explicit);

    store.install(&libdwarf, false).unwrap();
    assert!(
        store.db().get_record(libdwarf.dag_hash()).unwrap().explicit,
        "installing again as a dependency keeps an explicit install"
    );
}

#[rstest]
fn test_install_records_build_dependencies(store: TempStore, libelf: ConcreteSpec) {
    let tool = build_only("libtool", "2.4", &libelf);
    store.install(&tool, true).unwrap();
    let elf = store.db().get_record(libelf.dag_hash()).unwrap();
    assert!(elf.installed);
    assert_eq!(elf.ref_count, 0, "build dependencies are not referenced");
    assert_eq!(store.db().unused_specs().unwrap(), vec![libelf]);
}

#[rstest]
fn test_install_external_dependency(store: TempStore) {
    let prefix = store.tmpdir.path().join("usr");
    std::fs::create_dir_all(&prefix).unwrap();
    let elf = external("libelf", "0.8.12", &prefix);
    let dwarf = concrete("libdwarf", "20130729", &[&elf]);
    store.install(&dwarf, true).unwrap();

    let record = store.db().get_record(elf.dag_hash()).unwrap();
    assert!(record.installed);
    assert_eq!(record.path, Some(prefix.clone()));
    assert!(
        !prefix.join(crate::METADATA_DIR).exists(),
        "nothing is written into an external prefix"
    );
}

#[rstest]
fn test_uninstall(store: TempStore, libelf: ConcreteSpec, libdwarf: ConcreteSpec) {
    store.install(&libdwarf, true).unwrap();
    let res = store.uninstall(&libelf);
    assert!(
        matches!(res, Err(Error::HasDependents { ref dependents, .. }) if dependents.len() == 1),
        "got {res:?}"
    );

    store.uninstall(&libdwarf).unwrap();
    assert!(store.layout().check_installed(&libdwarf).unwrap().is_none());
    store.uninstall(&libelf).unwrap();
    assert!(
        query_set(&store, InstallStatuses::any()).is_empty(),
        "{:?}",
        query_set(&store, InstallStatuses::any())
    );
}

#[rstest]
fn test_uninstall_deprecator_is_refused(
    store: TempStore,
    libelf: ConcreteSpec,
    old_libelf: ConcreteSpec,
) {
    store.install(&libelf, true).unwrap();
    store.install(&old_libelf, true).unwrap();
    store.deprecate(&old_libelf, &libelf).unwrap();
    let res = store.uninstall(&libelf);
    assert!(matches!(res, Err(Error::HasDependents { .. })), "got {res:?}");
}

#[rstest]
fn test_deprecate_then_reindex(store: TempStore, libelf: ConcreteSpec, old_libelf: ConcreteSpec) {
    init_logging();
    store.install(&libelf, true).unwrap();
    store.install(&old_libelf, true).unwrap();
    store.deprecate(&old_libelf, &libelf).unwrap();

    assert!(store.layout().check_installed(&old_libelf).unwrap().is_none());
    let all_before = query_set(&store, InstallStatuses::any());
    let installed_before = query_set(&store, InstallStatuses::installed());
    assert_eq!(all_before.len(), 2);
    assert_eq!(installed_before, BTreeSet::from([libelf.clone()]));

    std::fs::remove_file(store.db().index_path()).unwrap();
    let report = store.reindex().unwrap();
    assert_eq!(report.installed, 1);
    assert_eq!(report.deprecated, 1);
    assert!(report.skipped.is_empty());

    let old = store.db().get_record(old_libelf.dag_hash()).unwrap();
    assert_eq!(old.deprecated_for.as_ref(), Some(libelf.dag_hash()));
    assert_eq!(old.status(), InstallStatus::Deprecated);
    let new = store.db().get_record(libelf.dag_hash()).unwrap();
    assert_eq!(new.deprecated_for, None);
    assert_eq!(new.ref_count, 1);

    assert_eq!(query_set(&store, InstallStatuses::any()), all_before);
    assert_eq!(query_set(&store, InstallStatuses::installed()), installed_before);
    store.db().check_ref_counts().unwrap();
}

#[rstest]
fn test_deprecate_again(store: TempStore, libelf: ConcreteSpec, old_libelf: ConcreteSpec) {
    let newest = concrete("libelf", "0.8.14", &[]);
    for spec in [&libelf, &old_libelf, &newest] {
        store.install(spec, true).unwrap();
    }
    store.deprecate(&old_libelf, &libelf).unwrap();
    store.deprecate(&old_libelf, &newest).unwrap();

    let layout = store.layout();
    assert!(!layout.deprecated_file_path(&old_libelf, &libelf).exists());
    assert!(layout.deprecated_file_path(&old_libelf, &newest).is_file());

    store.reindex().unwrap();
    assert_eq!(
        store.db().deprecator(&old_libelf).unwrap(),
        Some(newest.clone())
    );
    assert_eq!(store.db().get_record(libelf.dag_hash()).unwrap().ref_count, 0);
}

#[rstest]
fn test_deprecate_chain_survives_reindex(
    store: TempStore,
    libelf: ConcreteSpec,
    old_libelf: ConcreteSpec,
) {
    init_logging();
    let oldest = concrete("libelf", "0.8.11", &[]);
    for spec in [&oldest, &old_libelf, &libelf] {
        store.install(spec, true).unwrap();
    }
    store.deprecate(&oldest, &old_libelf).unwrap();
    store.deprecate(&old_libelf, &libelf).unwrap();

    assert_eq!(store.db().deprecator(&oldest).unwrap(), Some(libelf.clone()));
    assert!(
        store
            .layout()
            .deprecated_file_path(&oldest, &libelf)
            .is_file()
    );
    store.db().check_ref_counts().unwrap();
    let all_before = query_set(&store, InstallStatuses::any());
    assert_eq!(all_before.len(), 3);

    std::fs::remove_file(store.db().index_path()).unwrap();
    let report = store.reindex().unwrap();
    assert_eq!((report.installed, report.deprecated), (1, 2));
    assert_eq!(query_set(&store, InstallStatuses::any()), all_before);
    assert_eq!(store.db().deprecator(&oldest).unwrap(), Some(libelf.clone()));
    assert_eq!(store.db().get_record(libelf.dag_hash()).unwrap().ref_count, 2);
    store.db().check_ref_counts().unwrap();
}

#[rstest]
fn test_reindex_keeps_missing_dependency_of_deprecated(store: TempStore, libelf: ConcreteSpec) {
    let zlib = concrete("zlib", "1.3", &[]);
    let old_libelf = concrete("libelf", "0.8.12", &[&zlib]);
    store.install(&old_libelf, true).unwrap();
    store.install(&libelf, true).unwrap();
    store.deprecate(&old_libelf, &libelf).unwrap();
    store.uninstall(&zlib).unwrap();

    let installed_before = query_set(&store, InstallStatuses::installed());
    assert_eq!(installed_before, BTreeSet::from([libelf.clone()]));
    let all_before = query_set(&store, InstallStatuses::any());

    std::fs::remove_file(store.db().index_path()).unwrap();
    store.reindex().unwrap();
    assert_eq!(query_set(&store, InstallStatuses::installed()), installed_before);
    assert_eq!(query_set(&store, InstallStatuses::any()), all_before);
    let record = store.db().get_record(zlib.dag_hash()).unwrap();
    assert_eq!(record.status(), InstallStatus::Missing);
    assert_eq!(store.reusable_specs().unwrap(), vec![libelf]);
    store.db().check_ref_counts().unwrap();
}

#[rstest]
fn test_deprecate_requires_installed(
    store: TempStore,
    libelf: ConcreteSpec,
    old_libelf: ConcreteSpec,
) {
    store.install(&libelf, true).unwrap();
    let res = store.deprecate(&old_libelf, &libelf);
    assert!(matches!(res, Err(ref err) if err.is_no_such_record()), "got {res:?}");

    store.install(&old_libelf, true).unwrap();
    store.deprecate(&libelf, &old_libelf).unwrap();
    let res = store.deprecate(&old_libelf, &libelf);
    assert!(matches!(res, Err(Error::NotInstalled(_))), "got {res:?}");

    let res = store.deprecate(&old_libelf, &old_libelf);
    assert!(matches!(res, Err(Error::SelfDeprecation(_))));
}

#[rstest]
fn test_reindex_skips_unreadable_prefixes(
    store: TempStore,
    libelf: ConcreteSpec,
    libdwarf: ConcreteSpec,
) {
    init_logging();
    store.install(&libdwarf, true).unwrap();
    let zlib = concrete("zlib", "1.3", &[]);
    store.install(&zlib, true).unwrap();
    std::fs::write(store.layout().spec_file_path(&zlib), "").unwrap();

    let report = store.reindex().unwrap();
    assert_eq!(report.installed, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, store.layout().path_for_spec(&zlib));

    let installed = query_set(&store, InstallStatuses::installed());
    assert_eq!(installed, BTreeSet::from([libelf, libdwarf]));
    store.db().check_ref_counts().unwrap();
}

#[rstest]
fn test_reindex_keeps_install_details(
    store: TempStore,
    libelf: ConcreteSpec,
    libdwarf: ConcreteSpec,
) {
    store.install(&libdwarf, true).unwrap();
    let before = store.db().get_record(libelf.dag_hash()).unwrap();

    store.reindex().unwrap();
    let after = store.db().get_record(libelf.dag_hash()).unwrap();
    assert!(!after.explicit, "the old index still says libelf is implicit");
    assert_eq!(after.installation_time, before.installation_time);

    std::fs::remove_file(store.db().index_path()).unwrap();
    store.reindex().unwrap();
    assert!(
        store.db().get_record(libelf.dag_hash()).unwrap().explicit,
        "without an old index, every prefix is taken as explicit"
    );
}

#[rstest]
fn test_reusable_specs(store: TempStore, libelf: ConcreteSpec, old_libelf: ConcreteSpec) {
    store.install(&libelf, true).unwrap();
    store.install(&old_libelf, true).unwrap();
    store.deprecate(&old_libelf, &libelf).unwrap();
    assert_eq!(store.reusable_specs().unwrap(), vec![libelf]);
}

#[rstest]
fn test_open_from_config(tmpdir: tempfile::TempDir) {
    let config = Config::from_yaml(format!(
        "store:\n  root: {}\n  lock_timeout_seconds: 1\n",
        tmpdir.path().display()
    ))
    .unwrap();
    let store = Store::from_config(&config).unwrap();
    assert_eq!(store.root(), tmpdir.path());
    assert!(
        store
            .db()
            .query_one(&Query::spec(spec!("libelf")))
            .unwrap()
            .is_none()
    );
}

// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use hpk_schema::ConcreteSpec;
use rstest::rstest;

use super::{DirectoryLayout, METADATA_DIR};
use crate::Error;
use crate::fixtures::*;

#[rstest]
fn test_path_for_spec(tmpdir: tempfile::TempDir, libelf: ConcreteSpec) {
    let layout = DirectoryLayout::new(tmpdir.path());
    let expected = tmpdir
        .path()
        .join("linux-ubuntu22.04-x86_64")
        .join("gcc-10.2.1")
        .join(format!("libelf-0.8.13-{}", libelf.dag_hash()));
    assert_eq!(layout.path_for_spec(&libelf), expected);
    assert_eq!(
        layout.spec_file_path(&libelf),
        expected.join(METADATA_DIR).join("spec.json")
    );
}

#[rstest]
fn test_external_prefix_is_not_managed(tmpdir: tempfile::TempDir) {
    let layout = DirectoryLayout::new(tmpdir.path().join("store"));
    let prefix = tmpdir.path().join("usr");
    let spec = external("libelf", "0.8.12", &prefix);
    assert_eq!(layout.path_for_spec(&spec), prefix);
    assert_eq!(layout.check_installed(&spec).unwrap(), None);

    std::fs::create_dir_all(&prefix).unwrap();
    assert_eq!(layout.check_installed(&spec).unwrap(), Some(prefix.clone()));
    layout.remove_install_directory(&spec).unwrap();
    assert!(prefix.exists(), "externals are never removed");
}

#[rstest]
fn test_create_and_check_installed(tmpdir: tempfile::TempDir, libdwarf: ConcreteSpec) {
    let layout = DirectoryLayout::new(tmpdir.path());
    assert_eq!(layout.check_installed(&libdwarf).unwrap(), None);

    let prefix = layout.create_install_directory(&libdwarf).unwrap();
    assert_eq!(layout.check_installed(&libdwarf).unwrap(), Some(prefix));

    let text = std::fs::read_to_string(layout.spec_file_path(&libdwarf)).unwrap();
    let recorded = ConcreteSpec::from_json(&text).unwrap();
    assert_eq!(recorded.dag_hash(), libdwarf.dag_hash());
    assert!(recorded.get("libelf").is_some(), "dependencies are recorded too");
}

#[rstest]
fn test_check_installed_detects_other_spec(
    tmpdir: tempfile::TempDir,
    libelf: ConcreteSpec,
    old_libelf: ConcreteSpec,
) {
    let layout = DirectoryLayout::new(tmpdir.path());
    layout.create_install_directory(&libelf).unwrap();
    layout.create_install_directory(&old_libelf).unwrap();
    std::fs::copy(
        layout.spec_file_path(&old_libelf),
        layout.spec_file_path(&libelf),
    )
    .unwrap();

    let res = layout.check_installed(&libelf);
    assert!(matches!(res, Err(Error::InconsistentPrefix(..))), "got {res:?}");
}

#[rstest]
fn test_deprecate_moves_metadata(
    tmpdir: tempfile::TempDir,
    libelf: ConcreteSpec,
    old_libelf: ConcreteSpec,
) {
    let layout = DirectoryLayout::new(tmpdir.path());
    layout.create_install_directory(&libelf).unwrap();
    let old_prefix = layout.create_install_directory(&old_libelf).unwrap();

    layout.deprecate(&old_libelf, &libelf).unwrap();
    assert!(!old_prefix.exists());
    assert!(layout.deprecated_file_path(&old_libelf, &libelf).is_file());

    let scan = layout.scan().unwrap();
    assert_eq!(scan.installed.len(), 1);
    assert_eq!(scan.installed[0].spec, libelf);
    assert_eq!(scan.deprecated.len(), 1);
    assert_eq!(scan.deprecated[0].spec, old_libelf);
    assert_eq!(scan.deprecated[0].deprecator, libelf);
    assert!(scan.skipped.is_empty());

    layout.remove_deprecated_file(&old_libelf, &libelf).unwrap();
    assert!(layout.scan().unwrap().deprecated.is_empty());
    layout
        .remove_deprecated_file(&old_libelf, &libelf)
        .expect("removing a missing file is not an error");
}

#[rstest]
fn test_scan_skips_unreadable_prefixes(
    tmpdir: tempfile::TempDir,
    libelf: ConcreteSpec,
    old_libelf: ConcreteSpec,
) {
    init_logging();
    let layout = DirectoryLayout::new(tmpdir.path());
    layout.create_install_directory(&libelf).unwrap();
    layout.create_install_directory(&old_libelf).unwrap();
    std::fs::write(layout.spec_file_path(&old_libelf), "{not json").unwrap();
    let empty = tmpdir
        .path()
        .join("linux-ubuntu22.04-x86_64")
        .join("gcc-10.2.1")
        .join("leftover");
    std::fs::create_dir_all(&empty).unwrap();

    let scan = layout.scan().unwrap();
    assert_eq!(scan.installed.len(), 1);
    assert_eq!(scan.installed[0].spec, libelf);
    let mut skipped: Vec<_> = scan.skipped.into_iter().map(|s| s.path).collect();
    skipped.sort();
    let mut expected = vec![layout.path_for_spec(&old_libelf), empty];
    expected.sort();
    assert_eq!(skipped, expected);
}

#[rstest]
fn test_scan_ignores_database_directory(tmpdir: tempfile::TempDir) {
    let layout = DirectoryLayout::new(tmpdir.path());
    std::fs::create_dir_all(tmpdir.path().join(METADATA_DIR).join("db").join("x")).unwrap();
    let scan = layout.scan().unwrap();
    assert!(scan.installed.is_empty());
    assert!(scan.skipped.is_empty());
}

// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

mod database;
mod error;
#[cfg(test)]
mod fixtures;
mod index;
mod layout;
mod lock;
mod record;
mod store;

pub use database::{Database, ReadTransaction, ReindexReport, WriteTransaction};
pub use error::{Error, Result};
pub use index::{Direction, INDEX_VERSION, Index};
pub use layout::{
    DeprecatedPrefix,
    DirectoryLayout,
    InstalledPrefix,
    LayoutScan,
    METADATA_DIR,
    SkippedPrefix,
};
pub use lock::{DatabaseLock, LockKind};
pub use record::{InstallRecord, InstallStatus, InstallStatuses, Query};
pub use store::Store;

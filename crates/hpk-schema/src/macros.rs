// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

/// Create a package definition from a json literal.
///
/// This will panic if the package is invalid,
/// and should only be used for testing.
///
/// package!({
///     "name": "fftw",
///     "versions": [{"version": "1.0"}],
///     "variants": [{"name": "mpi", "default": true}],
/// });
#[macro_export]
macro_rules! package {
    ($($json:tt)+) => {{
        let value = $crate::serde_json::json!($($json)+);
        let package: $crate::Package =
            $crate::serde_json::from_value(value).expect("Invalid package json");
        package.validate().expect("Invalid package");
        package
    }};
}

/// Parse a spec from a string, panicking if it is invalid.
///
/// spec!("quantum-espresso+invino ^fftw@1.0");
#[macro_export]
macro_rules! spec {
    ($spec:expr) => {
        $crate::Spec::parse($spec).expect("Invalid spec string")
    };
}

/// Creates an in-memory repository containing the given packages.
///
/// make_repo!([{"name": "zlib", "versions": [{"version": "1.3"}]}]);
#[macro_export]
macro_rules! make_repo {
    ( [ $( $package:tt ),* $(,)? ] ) => {{
        let repo = $crate::MemRepository::new();
        $(
            repo.publish($crate::package!($package));
        )*
        repo
    }};
}

// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use nom::IResult;
use nom::bytes::complete::take_while1;
use nom::combinator::{map_res, recognize, verify};
use nom::error::{ContextError, FromExternalError, ParseError};

use super::{PkgName, VariantName, is_pkg_name_char, is_variant_name_char};

/// Parse a package name, the leading token of a spec node.
pub fn pkg_name<'a, E>(input: &'a str) -> IResult<&'a str, PkgName, E>
where
    E: ParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, crate::Error>,
{
    map_res(
        recognize(verify(take_while1(is_pkg_name_char), |s: &str| {
            s.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
        })),
        PkgName::new,
    )(input)
}

/// Parse a variant name as it appears after `+`, `~` or before `=`.
pub fn variant_name<'a, E>(input: &'a str) -> IResult<&'a str, VariantName, E>
where
    E: ParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, crate::Error>,
{
    map_res(take_while1(is_variant_name_char), VariantName::new)(input)
}

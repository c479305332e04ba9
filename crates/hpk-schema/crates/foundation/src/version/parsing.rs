// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use nom::IResult;
use nom::bytes::complete::take_while1;
use nom::combinator::map_res;
use nom::error::{ContextError, FromExternalError, ParseError};

use super::{VERSION_SEPARATORS, Version, parse_version};

pub(crate) fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || VERSION_SEPARATORS.contains(&c)
}

/// Parse a single version, stopping at any character
/// that cannot be part of one (eg: `:`, `,`, `+`, `~`).
pub fn version<'a, E>(input: &'a str) -> IResult<&'a str, Version, E>
where
    E: ParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, crate::Error>,
{
    map_res(take_while1(is_version_char), parse_version)(input)
}

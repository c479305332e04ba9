// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use nom::IResult;
use nom::branch::alt;
use nom::character::complete::char;
use nom::combinator::{map, opt};
use nom::error::{ContextError, FromExternalError, ParseError, context};
use nom::multi::separated_list1;
use nom::sequence::{pair, preceded};

use super::{VersionConstraint, VersionRange};
use crate::version::parsing::version;

/// Parse one range: `=1.2`, `1.2`, `1.2:`, `:1.2` or `1.2:1.4`.
pub fn version_range<'a, E>(input: &'a str) -> IResult<&'a str, VersionRange, E>
where
    E: ParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, crate::Error>,
{
    alt((
        map(preceded(char('='), version), VersionRange::Exact),
        map(
            pair(opt(version), opt(preceded(char(':'), opt(version)))),
            |(lo, hi)| match hi {
                // no colon at all means a single prefix-matching version
                None => VersionRange::Span {
                    hi: lo.clone(),
                    lo,
                },
                Some(hi) => VersionRange::Span { lo, hi },
            },
        ),
    ))(input)
}

/// Parse a comma separated union of ranges.
pub fn version_constraint<'a, E>(input: &'a str) -> IResult<&'a str, VersionConstraint, E>
where
    E: ParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, crate::Error>,
{
    context(
        "version_constraint",
        map(separated_list1(char(','), version_range), |ranges| {
            VersionConstraint::from_ranges(ranges.into_iter().filter(|r| {
                !matches!(r, VersionRange::Span { lo: None, hi: None })
            }))
        }),
    )(input)
}

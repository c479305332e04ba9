// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

//! Parsing of textual specs such as `fftw@1.0:+mpi %gcc@10 ^mpich`.

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, multispace0};
use nom::combinator::{cut, map, map_res, not, opt};
use nom::error::{ContextError, FromExternalError, ParseError, context};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated, tuple};

use crate::foundation::arch::ArchConstraint;
use crate::foundation::compiler::CompilerConstraint;
use crate::foundation::compiler::parsing::compiler_constraint;
use crate::foundation::name::VariantName;
use crate::foundation::name::parsing::{pkg_name, variant_name};
use crate::foundation::variant::VariantValue;
use crate::foundation::version_range::VersionConstraint;
use crate::foundation::version_range::parsing::version_constraint;
use crate::{Error, NodeSpec, Result, Spec};

type FoundationError = crate::foundation::Error;

/// One attribute of a spec node.
enum Attr {
    Versions(VersionConstraint),
    Variant(VariantName, VariantValue),
    Compiler(CompilerConstraint),
    Arch(ArchConstraint),
}

/// `+` is allowed inside a value, as in `languages=c,c++`, so a
/// boolean flag after a value needs whitespace before it.
fn is_value_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_.-/:,+".contains(c)
}

fn key_value<'a, E>(input: &'a str) -> IResult<&'a str, Attr, E>
where
    E: ParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, FoundationError>,
{
    map_res(
        separated_pair(
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
            char('='),
            take_while1(is_value_char),
        ),
        |(key, value): (&str, &str)| -> std::result::Result<Attr, FoundationError> {
            let arch = |f: fn(&mut ArchConstraint, String)| {
                let mut arch = ArchConstraint::default();
                f(&mut arch, value.to_owned());
                Attr::Arch(arch)
            };
            Ok(match key {
                "arch" => Attr::Arch(ArchConstraint::from_triple(value)?),
                "platform" => arch(|a, v| a.platform = Some(v)),
                "os" => arch(|a, v| a.os = Some(v)),
                "target" => arch(|a, v| a.target = Some(v)),
                _ => Attr::Variant(VariantName::new(key)?, VariantValue::parse(value)),
            })
        },
    )(input)
}

fn attr<'a, E>(input: &'a str) -> IResult<&'a str, Attr, E>
where
    E: ParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, FoundationError>,
{
    alt((
        map(
            preceded(char('@'), context("versions", cut(version_constraint))),
            Attr::Versions,
        ),
        map(preceded(char('+'), cut(variant_name)), |name| {
            Attr::Variant(name, VariantValue::Bool(true))
        }),
        map(preceded(char('~'), cut(variant_name)), |name| {
            Attr::Variant(name, VariantValue::Bool(false))
        }),
        map(
            preceded(pair(char('%'), multispace0), cut(compiler_constraint)),
            Attr::Compiler,
        ),
        key_value,
    ))(input)
}

/// Parse a single node, with or without a leading package name.
pub fn node_spec<'a, E>(input: &'a str) -> IResult<&'a str, NodeSpec, E>
where
    E: ParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, FoundationError>,
{
    let (input, name) = opt(terminated(pkg_name, not(char('='))))(input)?;
    let (input, first) = match name {
        // an anonymous node must start directly with an attribute
        None => map(attr, Some)(input)?,
        Some(_) => (input, None),
    };
    let (input, rest) = many0(preceded(multispace0, attr))(input)?;
    let mut node = NodeSpec {
        name,
        ..Default::default()
    };
    for attr in first.into_iter().chain(rest) {
        apply_attr(&mut node, attr).map_err(|err| {
            nom::Err::Failure(E::from_external_error(
                input,
                nom::error::ErrorKind::Verify,
                err,
            ))
        })?;
    }
    Ok((input, node))
}

fn apply_attr(node: &mut NodeSpec, attr: Attr) -> std::result::Result<(), FoundationError> {
    let mut single = NodeSpec::default();
    match attr {
        Attr::Versions(v) => single.versions = v,
        Attr::Variant(name, value) => {
            single.variants.insert(name, value);
        }
        Attr::Compiler(c) => single.compiler = Some(c),
        Attr::Arch(a) => single.arch = a,
    }
    node.constrain(&single)
        .map_err(|err| FoundationError::String(err.to_string()))
}

/// Parse a full spec: a root node followed by `^dependency` nodes.
pub fn spec<'a, E>(input: &'a str) -> IResult<&'a str, Spec, E>
where
    E: ParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, FoundationError>,
{
    let (input, root) = delimited(multispace0, context("root", node_spec), multispace0)(input)?;
    let (input, deps) = many0(preceded(
        tuple((multispace0, char('^'), multispace0)),
        context(
            "dependency",
            cut(map(pair(pkg_name, node_tail), |(name, mut node)| {
                node.name = Some(name);
                node
            })),
        ),
    ))(input)?;
    let (input, _) = multispace0(input)?;
    let mut spec = Spec::new(root);
    for dep in deps {
        spec.add_dependency(dep).map_err(|err| {
            nom::Err::Failure(E::from_external_error(
                input,
                nom::error::ErrorKind::Verify,
                FoundationError::String(err.to_string()),
            ))
        })?;
    }
    Ok((input, spec))
}

/// The attributes that follow a dependency's name.
fn node_tail<'a, E>(input: &'a str) -> IResult<&'a str, NodeSpec, E>
where
    E: ParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, FoundationError>,
{
    let (input, attrs) = many0(preceded(multispace0, attr))(input)?;
    let mut node = NodeSpec::default();
    for attr in attrs {
        apply_attr(&mut node, attr).map_err(|err| {
            nom::Err::Failure(E::from_external_error(
                input,
                nom::error::ErrorKind::Verify,
                err,
            ))
        })?;
    }
    Ok((input, node))
}

/// Parse a spec string, requiring that all input is consumed.
pub fn parse_spec<S: AsRef<str>>(source: S) -> Result<Spec> {
    use nom::combinator::all_consuming;

    let source = source.as_ref();
    all_consuming(spec::<nom_supreme::error::ErrorTree<_>>)(source)
        .map(|(_, spec)| spec)
        .map_err(|err| match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => Error::InvalidSpec {
                spec: source.to_owned(),
                message: e.to_string(),
            },
            nom::Err::Incomplete(_) => unreachable!(),
        })
}

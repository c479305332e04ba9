// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::fmt::Write;

use hpk_schema::foundation::variant::format_assignment;
use hpk_schema::{NodeSpec, PkgName};
use hpk_solve_graph::{Conflict, ConflictKind, Origin, Requirement};
use itertools::Itertools;

use crate::UnsatisfiableSpecError;

#[cfg(test)]
#[path = "./explain_test.rs"]
mod explain_test;

const DETAIL_INDENT: usize = 8;
const NESTED_INDENT: usize = 2;

/// Describe why no solution exists, one numbered reason per
/// distinct failure, in the order that they were found.
pub fn explain(failures: &[Conflict]) -> UnsatisfiableSpecError {
    let reasons: Vec<String> = failures.iter().map(describe).unique().collect();
    let mut explanation = String::from("concretization failed for the following reasons:\n");
    for (index, reason) in reasons.iter().enumerate() {
        let _ = write!(explanation, "\n{:>4}. {reason}", index + 1);
    }
    UnsatisfiableSpecError {
        explanation,
        reasons,
    }
}

/// A headline for the conflict, followed by the indented details and
/// the chain of requirements that lead to it.
fn describe(conflict: &Conflict) -> String {
    let mut lines = Vec::new();
    let requirements = conflict.kind.requirements();
    match &conflict.kind {
        ConflictKind::Versions { .. } => {
            let constraints = requirements
                .iter()
                .map(|r| &r.constraint)
                .sorted_by(|a, b| a.versions.cmp_lower_bound(&b.versions))
                .map(NodeSpec::format_versions)
                .unique()
                .collect_vec();
            lines.push(format!("Cannot satisfy {}", quoted_list(&constraints)));
        }
        ConflictKind::Incompatible { .. } => {
            let constraints = requirements
                .iter()
                .map(|r| r.constraint.to_string())
                .unique()
                .collect_vec();
            lines.push(format!("Cannot satisfy {}", quoted_list(&constraints)));
        }
        ConflictKind::Variant { name, variant, .. } => {
            lines.push(format!(
                "'{name}' required multiple values for single-valued variant '{variant}'"
            ));
            let values = requirements
                .iter()
                .filter_map(|r| r.constraint.variants.get(variant))
                .sorted_by(|a, b| a.cmp_for_display(b))
                .map(|v| format_assignment(variant, v))
                .unique()
                .collect_vec();
            lines.push(format!("{}Requested {}", pad(), quoted_list(&values)));
        }
        ConflictKind::AlreadyResolved { node, .. } => {
            let constraints = requirements
                .iter()
                .map(|r| r.constraint.to_string())
                .unique()
                .collect_vec();
            lines.push(format!(
                "'{}' was resolved to '{node}', which does not satisfy {}",
                node.name,
                quoted_list(&constraints)
            ));
        }
        ConflictKind::NotBuildable {
            name, externals, ..
        } => {
            lines.push(format!(
                "Attempted to build package {name} which is not buildable and does not have a satisfying external"
            ));
            for external in externals.iter().unique() {
                lines.push(format!(
                    "{}'{external}' is an external constraint for {name} which was not satisfied",
                    pad()
                ));
            }
            // only the requirements that rule out every external are of interest
            let mut seen = Vec::new();
            for requirement in requirements
                .iter()
                .filter(|r| !externals.iter().any(|e| e.intersects(&r.constraint)))
            {
                lines.push(format!("{}'{}' required", pad(), requirement.constraint));
                write_origin(&mut lines, &requirement.origin, DETAIL_INDENT, &mut seen);
            }
            return lines.join("\n");
        }
        ConflictKind::NoVersion { name, .. } => {
            lines.push(format!(
                "No version of {name} satisfies '{}'",
                merged(name, requirements)
            ));
        }
        ConflictKind::NoCompiler { name, .. } => {
            lines.push(format!(
                "No available compiler for '{}'",
                merged(name, requirements)
            ));
        }
        ConflictKind::NoProvider { name, .. } => {
            let constraints = requirements
                .iter()
                .map(|r| r.constraint.to_string())
                .unique()
                .collect_vec();
            lines.push(format!(
                "No provider of '{name}' satisfies {}",
                quoted_list(&constraints)
            ));
        }
        ConflictKind::NoCandidate { name, reasons, .. } => {
            lines.push(format!(
                "No candidate for '{}' could be used",
                merged(name, requirements)
            ));
            for reason in reasons.iter().unique() {
                lines.push(format!("{}{reason}", pad()));
            }
        }
        ConflictKind::PackageConflict {
            node, description, ..
        } => {
            lines.push(format!("{}: {description}", node.name));
        }
        ConflictKind::NotADependency { name, .. } => {
            lines.push(format!(
                "'{name}' was requested as a dependency, but nothing depends on it"
            ));
        }
    }
    write_chains(&mut lines, requirements);
    lines.join("\n")
}

/// List the reason for each requirement, most recent first.
fn write_chains(lines: &mut Vec<String>, requirements: &[Requirement]) {
    let mut seen = Vec::new();
    for requirement in requirements.iter().rev() {
        write_origin(lines, &requirement.origin, DETAIL_INDENT, &mut seen);
    }
}

fn write_origin(lines: &mut Vec<String>, origin: &Origin, indent: usize, seen: &mut Vec<String>) {
    let line = format!("{:indent$}required because {origin}", "");
    if seen.contains(&line) {
        return;
    }
    seen.push(line.clone());
    lines.push(line);
    let mut nested = Vec::new();
    for cause in origin.because() {
        write_origin(lines, cause, indent + NESTED_INDENT, &mut nested);
    }
}

fn pad() -> String {
    " ".repeat(DETAIL_INDENT)
}

/// All requirements merged, as far as they agree.
fn merged(name: &PkgName, requirements: &[Requirement]) -> NodeSpec {
    let mut merged = NodeSpec::named(name.clone());
    for requirement in requirements {
        let mut next = merged.clone();
        if next.constrain(&requirement.constraint).is_ok() {
            merged = next;
        }
    }
    merged
}

/// `'a'`, `'a' and 'b'` or `'a', 'b' and 'c'`
fn quoted_list(items: &[String]) -> String {
    let quoted = items.iter().map(|i| format!("'{i}'")).collect_vec();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {last}", rest.join(", ")),
    }
}

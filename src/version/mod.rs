// src/version/mod.rs

//! Version handling for module releases
//!
//! Module versions are loose dotted strings (`1.2.0`, `v2.0.1`, occasionally
//! something stranger). This module provides:
//! - A canonical display form with a `v` prefix (`1.2.0` → `v1.2.0`)
//! - Dotted-numeric comparison with a lexical fallback for odd segments
//! - Version requirements (`>= 1.0.0 < 2.0.0`, `1.x`, `~> 1.2`) lowered to
//!   `semver::VersionReq` for matching

use crate::error::{Error, Result};
use semver::{Version, VersionReq};
use std::cmp::Ordering;
use std::fmt;

/// Version assumed for modules that do not declare one
pub const ZERO_VERSION: &str = "0.0.0";

/// Normalize a version string to its canonical display form
///
/// Absent or blank input is treated as `0.0.0`. Strings starting with a digit
/// get a `v` prefix; anything else is returned unchanged (trimmed), so the
/// operation is idempotent.
///
/// Examples:
/// - `Some("1.2.0")` → `"v1.2.0"`
/// - `Some("v1.2.0")` → `"v1.2.0"`
/// - `None` → `"v0.0.0"`
pub fn normalize(version: Option<&str>) -> String {
    let version = version.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(ZERO_VERSION);

    if version.starts_with(|c: char| c.is_ascii_digit()) {
        format!("v{}", version)
    } else {
        version.to_string()
    }
}

/// Compare two version strings
///
/// Both sides are normalized first, so `1.2.0` and `v1.2.0` are equal.
/// Segments are split on `.`; a missing segment counts as `0` (`1.2` equals
/// `1.2.0`). See [`compare_segment`] for how a single segment position is
/// ordered.
pub fn compare(a: &str, b: &str) -> Ordering {
    let a = normalize(Some(a));
    let b = normalize(Some(b));
    if a == b {
        return Ordering::Equal;
    }

    let a_parts: Vec<&str> = numeric_body(&a).split('.').collect();
    let b_parts: Vec<&str> = numeric_body(&b).split('.').collect();
    let len = a_parts.len().max(b_parts.len());

    for idx in 0..len {
        let a_seg = a_parts.get(idx).copied().unwrap_or("0");
        let b_seg = b_parts.get(idx).copied().unwrap_or("0");

        let ord = compare_segment(a_seg, b_seg);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

/// Order two segments at the same position
///
/// A segment is read as a leading number plus a suffix (`2-rc1` is `2` and
/// `-rc1`). Segments with a leading number sort before those without one and
/// compare by that number first. On equal numbers a `-` suffix (pre-release)
/// sorts before no suffix, which sorts before any other suffix. Remaining
/// ties compare the suffixes lexically.
fn compare_segment(a: &str, b: &str) -> Ordering {
    let (a_num, a_rest) = split_numeric(a);
    let (b_num, b_rest) = split_numeric(b);

    a_num
        .is_empty()
        .cmp(&b_num.is_empty())
        .then_with(|| compare_digits(a_num, b_num))
        .then_with(|| suffix_rank(a_rest).cmp(&suffix_rank(b_rest)))
        .then_with(|| a_rest.cmp(b_rest))
}

fn split_numeric(segment: &str) -> (&str, &str) {
    let end = segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(segment.len());
    segment.split_at(end)
}

/// Compare digit strings by value without parsing, so long runs cannot overflow
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn suffix_rank(suffix: &str) -> u8 {
    match suffix.chars().next() {
        Some('-') => 0,
        None => 1,
        Some(_) => 2,
    }
}

/// Strip the display prefix from a normalized version
fn numeric_body(display: &str) -> &str {
    match display.strip_prefix('v') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => display,
    }
}

/// Convert a loose version string into a `semver::Version`
///
/// Partial versions are padded with zeros (`1.2` → `1.2.0`). Returns `None`
/// when the string cannot be read as semver at all.
pub fn to_semver(version: &str) -> Option<Version> {
    let body = numeric_body(version.trim());
    let (core, suffix) = match body.find(['-', '+']) {
        Some(pos) => body.split_at(pos),
        None => (body, ""),
    };

    let padded = match core.split('.').count() {
        1 => format!("{}.0.0{}", core, suffix),
        2 => format!("{}.0{}", core, suffix),
        _ => body.to_string(),
    };
    Version::parse(&padded).ok()
}

/// A version in canonical display form, ordered with [`compare`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleVersion {
    display: String,
}

impl ModuleVersion {
    /// Build from a possibly absent version string
    pub fn new(version: Option<&str>) -> Self {
        Self {
            display: normalize(version),
        }
    }

    /// The canonical display form (`v1.2.0`)
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// The version without its display prefix (`1.2.0`)
    pub fn number(&self) -> &str {
        numeric_body(&self.display)
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl Ord for ModuleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.display, &other.display)
    }
}

impl PartialOrd for ModuleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A version requirement declared by a module or requested by the user
#[derive(Debug, Clone)]
pub struct VersionRequirement {
    raw: String,
    req: VersionReq,
}

impl VersionRequirement {
    /// Parse a requirement expression
    ///
    /// Accepted forms:
    /// - `*`, `x` or empty → any version
    /// - `1.2.3` or `v1.2.3` → exactly that version
    /// - `>= 1.0.0 < 2.0.0` → space-separated comparators, all must hold
    /// - `1.x`, `1.2.x` → wildcard ranges
    /// - `~> 1.2` → `>= 1.2.0, < 2.0.0`; `~> 1.2.3` → `>= 1.2.3, < 1.3.0`
    pub fn parse(s: &str) -> Result<Self> {
        let raw = s.trim().to_string();
        let lowered = lower_requirement(&raw)?;

        let req = VersionReq::parse(&lowered).map_err(|e| {
            Error::Parse(format!("Invalid version requirement '{}': {}", raw, e))
        })?;

        Ok(Self { raw, req })
    }

    /// Requirement that accepts any version
    pub fn any() -> Self {
        Self {
            raw: ">= 0.0.0".to_string(),
            req: VersionReq::STAR,
        }
    }

    /// Check whether a version satisfies this requirement
    ///
    /// Versions that cannot be read as semver never match.
    pub fn matches(&self, version: &str) -> bool {
        to_semver(version).is_some_and(|v| self.req.matches(&v))
    }

    /// The requirement as originally written
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Rewrite a module-style requirement into semver requirement syntax
fn lower_requirement(raw: &str) -> Result<String> {
    if raw.is_empty() || raw == "*" || raw.eq_ignore_ascii_case("x") {
        return Ok("*".to_string());
    }

    if let Some(rest) = raw.strip_prefix("~>") {
        return lower_pessimistic(rest.trim(), raw);
    }

    // Glue operators to their operands: ">= 1.0 < 2" -> [">=1.0", "<2"]
    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in raw.split([' ', ',']).filter(|t| !t.is_empty()) {
        let (op, operand) = split_operator(token);
        match (pending_op.take(), op.is_empty(), operand.is_empty()) {
            (Some(prev), true, false) => comparators.push(format!("{}{}", prev, lower_operand(operand))),
            (None, false, true) => pending_op = Some(op),
            (None, _, false) => comparators.push(lower_comparator(op, operand)),
            _ => {
                return Err(Error::Parse(format!(
                    "Invalid version requirement '{}'",
                    raw
                )));
            }
        }
    }

    if pending_op.is_some() || comparators.is_empty() {
        return Err(Error::Parse(format!(
            "Invalid version requirement '{}'",
            raw
        )));
    }

    Ok(comparators.join(", "))
}

/// Split a token like `>=1.0.0` into (`>=`, `1.0.0`)
fn split_operator(token: &str) -> (&str, &str) {
    let end = token
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '!' | '~' | '^'))
        .unwrap_or(token.len());
    token.split_at(end)
}

fn lower_comparator(op: &str, operand: &str) -> String {
    let operand = lower_operand(operand);
    if op.is_empty() && !operand.contains('*') {
        // A bare version pins exactly
        format!("={}", operand)
    } else {
        format!("{}{}", op, operand)
    }
}

/// Strip a `v` prefix and turn `x` wildcards into `*`
fn lower_operand(operand: &str) -> String {
    numeric_body(operand)
        .split('.')
        .map(|seg| if seg.eq_ignore_ascii_case("x") { "*" } else { seg })
        .collect::<Vec<_>>()
        .join(".")
}

/// Expand a pessimistic (`~>`) requirement into an explicit range
fn lower_pessimistic(operand: &str, raw: &str) -> Result<String> {
    let operand = numeric_body(operand);
    let parts: Vec<u64> = operand
        .split('.')
        .map(|p| p.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::Parse(format!("Invalid version requirement '{}': {}", raw, e)))?;

    let bump = |n: u64| {
        n.checked_add(1).ok_or_else(|| {
            Error::Parse(format!("Invalid version requirement '{}': {} is too large", raw, n))
        })
    };

    let (lower, upper) = match parts.as_slice() {
        [major] => (
            format!("{}.0.0", major),
            format!("{}.0.0", bump(*major)?),
        ),
        [major, minor] => (
            format!("{}.{}.0", major, minor),
            format!("{}.0.0", bump(*major)?),
        ),
        [major, minor, patch, ..] => (
            format!("{}.{}.{}", major, minor, patch),
            format!("{}.{}.0", major, bump(*minor)?),
        ),
        [] => {
            return Err(Error::Parse(format!(
                "Invalid version requirement '{}'",
                raw
            )));
        }
    };

    Ok(format!(">={}, <{}", lower, upper))
}

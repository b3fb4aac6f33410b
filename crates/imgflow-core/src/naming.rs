//! Derived key naming.
//!
//! The upload authorizer predicts artifact URLs before the original exists and the
//! processor later writes to exactly those keys. Both sides call into this module and
//! nothing else, so the two can never disagree.

use crate::models::{VariantKind, VariantSpec};

/// Split a key into `(stem, extension)`.
///
/// Only the last `.` of the final path segment counts, so `u1/a.b/c` has no extension and
/// `u1/a.tar.gz` keeps `a.tar` as its stem. A leading dot (`u1/.hidden`) is part of the stem.
pub fn split_extension(key: &str) -> (&str, Option<&str>) {
    let segment_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
    let segment = &key[segment_start..];
    match segment.rfind('.') {
        Some(dot) if dot > 0 => {
            let split = segment_start + dot;
            (&key[..split], Some(&key[split + 1..]))
        }
        _ => (key, None),
    }
}

/// Key of the artifact of `kind` derived from `source_key`.
pub fn derived_key(source_key: &str, kind: &VariantKind) -> String {
    let (stem, _) = split_extension(source_key);
    match kind {
        VariantKind::Thumbnail { width, .. } => {
            format!("{}_thumb_{}.{}", stem, width, kind.format().extension())
        }
        VariantKind::AlternateFormat => format!("{}.{}", stem, kind.format().extension()),
    }
}

/// Every artifact produced for one original, in the order they are reported: the
/// configured thumbnails, then the alternate-format encode.
pub fn artifact_kinds(variants: &[VariantSpec]) -> Vec<VariantKind> {
    variants
        .iter()
        .map(VariantSpec::kind)
        .chain(std::iter::once(VariantKind::AlternateFormat))
        .collect()
}

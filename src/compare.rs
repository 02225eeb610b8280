//! Comparing and merging component sets.
//!
//! Components are matched by id. A component present on both sides whose
//! [`SbomComponent::content_hash`] differs is a modification, so a version
//! bump under the same id never shows up as an add/remove pair.

use crate::model::{DifferenceType, SbomComponent, SbomDifference, NOASSERTION};
use crate::reports::{create_reporter, ReportError, ReportFormat};
use crate::utils::compare_versions;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Computes differences between two component sets.
#[derive(Debug, Clone, Copy)]
pub struct SbomComparator {
    include_unchanged: bool,
}

impl Default for SbomComparator {
    fn default() -> Self {
        Self {
            include_unchanged: true,
        }
    }
}

impl SbomComparator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `Unchanged` entries appear in the output.
    #[must_use]
    pub fn include_unchanged(mut self, include: bool) -> Self {
        self.include_unchanged = include;
        self
    }

    /// Differences from `old` to `new`.
    ///
    /// Entries for `new` come first in its order (added, modified or
    /// unchanged), followed by removals in `old` order. When an id repeats
    /// within one set the last occurrence wins.
    #[must_use]
    pub fn diff(&self, old: &[SbomComponent], new: &[SbomComponent]) -> Vec<SbomDifference> {
        let old_by_id = index_by_id(old);
        let new_by_id = index_by_id(new);
        let mut diffs = Vec::with_capacity(new_by_id.len());

        for (id, component) in &new_by_id {
            match old_by_id.get(id) {
                None => diffs.push(SbomDifference::new(DifferenceType::Added, (*component).clone())),
                Some(previous) if previous.content_hash() != component.content_hash() => {
                    diffs.push(SbomDifference::modified((*component).clone(), (*previous).clone()));
                }
                Some(_) if self.include_unchanged => {
                    diffs.push(SbomDifference::new(DifferenceType::Unchanged, (*component).clone()));
                }
                Some(_) => {}
            }
        }
        for (id, component) in &old_by_id {
            if !new_by_id.contains_key(id) {
                diffs.push(SbomDifference::new(DifferenceType::Removed, (*component).clone()));
            }
        }

        tracing::debug!(
            old = old.len(),
            new = new.len(),
            differences = diffs.len(),
            "Compared component sets"
        );
        diffs
    }
}

fn index_by_id(components: &[SbomComponent]) -> IndexMap<&str, &SbomComponent> {
    components.iter().map(|c| (c.id.as_str(), c)).collect()
}

/// Differences from `old` to `new`, including unchanged components.
#[must_use]
pub fn diff(old: &[SbomComponent], new: &[SbomComponent]) -> Vec<SbomDifference> {
    SbomComparator::new().diff(old, new)
}

/// Count entries per [`DifferenceType`]. All four keys are always present.
#[must_use]
pub fn diff_statistics(diffs: &[SbomDifference]) -> BTreeMap<String, usize> {
    let mut stats: BTreeMap<String, usize> = DifferenceType::ALL
        .iter()
        .map(|kind| (kind.as_str().to_string(), 0))
        .collect();
    for diff in diffs {
        *stats.entry(diff.kind.as_str().to_string()).or_insert(0) += 1;
    }
    stats
}

/// Render `diffs` with the named renderer (`text`, `json` or `csv`).
/// Unknown names render as text.
pub fn generate_diff_report(diffs: &[SbomDifference], renderer: &str) -> Result<String, ReportError> {
    create_reporter(ReportFormat::from_name(renderer)).generate_diff_report(diffs)
}

/// Versions without a value rank below every real version.
fn rank_versions(a: &str, b: &str) -> Ordering {
    let known = |v: &str| !v.is_empty() && v != NOASSERTION;
    match (known(a), known(b)) {
        (true, true) => compare_versions(a, b),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => Ordering::Equal,
    }
}

/// Fold several component sets into one, keeping one component per id.
///
/// When an id appears more than once the component with the highest version
/// is kept; on a tie the first one seen stays. Output order is the order in
/// which ids were first seen.
#[must_use]
pub fn merge(sets: &[Vec<SbomComponent>]) -> Vec<SbomComponent> {
    let mut merged: IndexMap<String, SbomComponent> = IndexMap::new();
    for component in sets.iter().flatten() {
        match merged.get_mut(&component.id) {
            Some(existing) => {
                if rank_versions(&component.version, &existing.version) == Ordering::Greater {
                    *existing = component.clone();
                }
            }
            None => {
                merged.insert(component.id.clone(), component.clone());
            }
        }
    }
    tracing::debug!(sets = sets.len(), components = merged.len(), "Merged component sets");
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[(&str, &str)]) -> Vec<SbomComponent> {
        items
            .iter()
            .map(|(id, version)| SbomComponent::new(*id, *id, *version))
            .collect()
    }

    fn count(diffs: &[SbomDifference], kind: DifferenceType) -> usize {
        diffs.iter().filter(|d| d.kind == kind).count()
    }

    #[test]
    fn test_version_bump_is_modification() {
        let diffs = diff(&set(&[("libc", "2.31")]), &set(&[("libc", "2.32")]));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DifferenceType::Modified);
        assert_eq!(diffs[0].component.version, "2.32");
        assert_eq!(diffs[0].old_component.as_ref().unwrap().version, "2.31");
    }

    #[test]
    fn test_added_removed_unchanged() {
        let old = set(&[("a", "1"), ("b", "1")]);
        let new = set(&[("b", "1"), ("c", "1")]);
        let diffs = diff(&old, &new);
        assert_eq!(count(&diffs, DifferenceType::Added), 1);
        assert_eq!(count(&diffs, DifferenceType::Removed), 1);
        assert_eq!(count(&diffs, DifferenceType::Unchanged), 1);
        assert_eq!(diffs.last().unwrap().component.id, "a");

        let changes = SbomComparator::new().include_unchanged(false).diff(&old, &new);
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_statistics_default_to_zero() {
        let stats = diff_statistics(&[]);
        assert_eq!(stats.len(), 4);
        assert!(stats.values().all(|n| *n == 0));
    }

    #[test]
    fn test_unknown_renderer_falls_back_to_text() {
        let diffs = diff(&set(&[("a", "1")]), &set(&[("a", "2")]));
        let text = generate_diff_report(&diffs, "yaml").unwrap();
        assert!(text.starts_with("SBOM Comparison Report"));
        let csv = generate_diff_report(&diffs, "CSV").unwrap();
        assert!(csv.starts_with("Change,ID"));
    }

    #[test]
    fn test_merge_keeps_highest_version() {
        let merged = merge(&[
            set(&[("libc", "2.31"), ("zlib", NOASSERTION)]),
            set(&[("libc", "2.9"), ("zlib", "1.3"), ("ssl", "3.0")]),
            set(&[("libc", "2.32")]),
        ]);
        let versions: Vec<_> = merged.iter().map(|c| (c.id.as_str(), c.version.as_str())).collect();
        assert_eq!(versions, [("libc", "2.32"), ("zlib", "1.3"), ("ssl", "3.0")]);
    }
}

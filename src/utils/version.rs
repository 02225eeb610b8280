//! Version comparison utilities.

use semver::Version;
use std::cmp::Ordering;

/// Compare two version strings.
///
/// Strict semver wins when both sides parse. Otherwise versions are compared
/// segment by segment on `.`, `-` and `_`, numerically where both segments are
/// numbers, so `2.9` < `2.31` and `1.1.1k` > `1.1.1`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if let (Ok(ver_a), Ok(ver_b)) = (Version::parse(a), Version::parse(b)) {
        return ver_a.cmp(&ver_b);
    }

    let mut left = a.split(['.', '-', '_']);
    let mut right = b.split(['.', '-', '_']);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

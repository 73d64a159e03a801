use std::collections::HashSet;

use crate::models::Listing;

/// Returns the listings in `current` whose name does not appear in `snapshot`,
/// keeping their order. An empty snapshot makes everything new.
///
/// Identity is the name alone: a listing whose price or link changed is not new,
/// and two different products sharing a name are indistinguishable.
pub fn detect_new(current: &[Listing], snapshot: &[Listing]) -> Vec<Listing> {
    let known: HashSet<&str> = snapshot.iter().map(|l| l.name.as_str()).collect();

    current
        .iter()
        .filter(|l| !known.contains(l.name.as_str()))
        .cloned()
        .collect()
}

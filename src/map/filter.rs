use std::collections::BTreeSet;

use crate::data::catalog::Location;
use crate::data::category::Category;

/// Locations whose category is in `chosen`, in catalog order.
/// An empty selection yields nothing; the whole state is too dense to show by default.
pub fn select(catalog: &[Location], chosen: &BTreeSet<Category>) -> Vec<Location> {
    if chosen.is_empty() {
        return Vec::new();
    }
    catalog
        .iter()
        .filter(|l| chosen.contains(&l.category))
        .cloned()
        .collect()
}

/// Names offered by the school selector: the filtered subset, or the whole catalog
/// while nothing is selected. Sorted by name.
pub fn selectable_names(catalog: &[Location], subset: &[Location]) -> Vec<String> {
    let source = if subset.is_empty() { catalog } else { subset };
    let mut names: Vec<String> = source.iter().map(|l| l.name.clone()).collect();
    names.sort();
    names
}

/// Parse a comma-separated list of category labels. Unknown labels are skipped.
pub fn parse_categories(raw: &str) -> BTreeSet<Category> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| match s.parse::<Category>() {
            Ok(category) => Some(category),
            Err(err) => {
                tracing::debug!(%err, "ignoring category filter");
                None
            }
        })
        .collect()
}

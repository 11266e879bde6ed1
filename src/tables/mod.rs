// Static per-version data
pub mod cybox;
pub mod stix;

use crate::rules::PrefixMap;

fn prefix_map(entries: &[(&'static str, &'static str)]) -> PrefixMap {
    entries.iter().copied().collect()
}

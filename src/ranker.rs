use std::cmp::Ordering;

use crate::aggregator::StockPackage;

// Hard cap on how many packages make it into a summary digest
pub const MAX_SELECTION: usize = 5;

/// Order packages by the size of their 1-day move, then by crowd mentions,
/// both descending, and keep the top [`MAX_SELECTION`].
///
/// `sort_by` is stable, so packages tied on both keys keep discovery order.
pub fn rank(mut packages: Vec<StockPackage>) -> Vec<StockPackage> {
    packages.sort_by(compare);
    packages.truncate(MAX_SELECTION);
    packages
}

fn compare(a: &StockPackage, b: &StockPackage) -> Ordering {
    b.pct_1d
        .magnitude()
        .total_cmp(&a.pct_1d.magnitude())
        .then_with(|| b.sentiment.mentions.cmp(&a.sentiment.mentions))
}

//! Fuzzer Input Collision Math
//!
//! The fuzz drivers decode raw bytes into small bounded integers. These
//! helpers estimate how likely two decoded array elements collide and how
//! fast the number of subsets a decomposition may select grows with the
//! array size.

/// Probability that at least two of `array_size` values drawn uniformly from
/// `array_element_range` distinct values are equal.
pub fn collision_probability(array_element_range: u64, array_size: u64) -> f64 {
    if array_size > array_element_range {
        return 1.0;
    }
    if array_element_range == 0 {
        return 0.0;
    }

    // P(no collision) = range! / (range - size)! / range^size
    let range = array_element_range as f64;
    let no_collision = (0..array_size)
        .map(|i| (range - i as f64) / range)
        .product::<f64>();

    1.0 - no_collision
}

/// Number of non-empty subsets of at most `max_select` elements of a set of
/// `set_size` elements.
pub fn subset_selection_complexity(set_size: u64, max_select: u64) -> u128 {
    (1..=max_select.min(set_size))
        .map(|select| binomial(set_size, select))
        .sum()
}

fn binomial(n: u64, k: u64) -> u128 {
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        result = result * (n - i) as u128 / (i + 1) as u128;
    }
    result
}

/// One line of the collision table
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionRow {
    /// Number of distinct values an element may take
    pub array_element_range: u64,
    /// Number of elements
    pub array_size: u64,
    /// Probability that two elements collide
    pub probability: f64,
    /// Subsets of at most `array_size` of `2 * array_size` elements
    pub subset_selection: u128,
    /// Growth factor over the previous row (0 for the first row)
    pub multiplier: f64,
}

/// Cartesian product of `ranges` × `sizes`, ranges outermost.
pub fn collision_table(ranges: &[u64], sizes: &[u64]) -> Vec<CollisionRow> {
    let mut rows = Vec::with_capacity(ranges.len() * sizes.len());
    let mut last_subset_selection: Option<u128> = None;

    for &range in ranges {
        for &size in sizes {
            let subset_selection = subset_selection_complexity(size * 2, size);
            let multiplier = match last_subset_selection {
                Some(last) if last > 0 => subset_selection as f64 / last as f64,
                _ => 0.0,
            };
            last_subset_selection = Some(subset_selection);

            rows.push(CollisionRow {
                array_element_range: range,
                array_size: size,
                probability: collision_probability(range, size),
                subset_selection,
                multiplier,
            });
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_probability() {
        assert!((collision_probability(9, 2) - 0.1111).abs() < 1e-4);
        assert!((collision_probability(50, 5) - 0.1864).abs() < 1e-4);
        assert!((collision_probability(1000, 14) - 0.0874).abs() < 1e-4);
        assert_eq!(collision_probability(9, 10), 1.0);
    }

    #[test]
    fn test_subset_selection_complexity() {
        assert_eq!(subset_selection_complexity(4, 2), 10);
        assert_eq!(subset_selection_complexity(6, 3), 41);
        assert_eq!(subset_selection_complexity(28, 14), 154_276_027);
    }

    #[test]
    fn test_table_multiplier_carries_across_ranges() {
        let rows = collision_table(&[9, 50], &[2, 3]);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].multiplier, 0.0);
        assert!((rows[1].multiplier - 4.1).abs() < 1e-9);
        // first row of the second range compares against the last of the first
        assert_eq!(rows[2].array_element_range, 50);
        assert!((rows[2].multiplier - 10.0 / 41.0).abs() < 1e-9);
    }
}

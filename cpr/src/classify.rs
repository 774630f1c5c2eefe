//! Mapping of laxities to the half-open ranges served by a [Group].
use crate::helpe::*;

/// How fast class widths grow past the first fixed classes `[1,2)`
/// and `[2,4)`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum GrowthPolicy {
    /// `w_max = 2 * w_min`: the usual power-of-two classes
    #[default]
    Constant,
    /// `w_max = w_min * floor(log2(w_min))`, edges rounded up to powers of two
    Logarithmic,
    /// `w_max = w_min^2`
    Quadratic,
}

/// A half-open laxity range `[w_min, w_max)`. Both ends are powers of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaxityClass {
    pub w_min: Laxity,
    pub w_max: Laxity,
}

impl LaxityClass {
    pub fn new(w_min: Laxity, w_max: Laxity) -> Self {
        debug_assert!(w_min.is_power_of_two() && w_max.is_power_of_two(), "Class edges must be powers of two");
        debug_assert!(w_min < w_max, "Empty class");
        Self {
            w_min,
            w_max,
        }
    }

    #[inline(always)]
    pub fn contains(&self, laxity: Laxity) -> bool {
        self.w_min <= laxity && laxity < self.w_max
    }

    /// Number of positions in each station tree, position 0 included.
    #[inline(always)]
    pub fn tree_width(&self) -> usize {
        self.w_max / self.w_min
    }

    /// Every tree level of the class, from the top (`w_min`) down to the
    /// leaves (`w_max / 2`).
    pub fn levels(&self) -> impl DoubleEndedIterator<Item = Laxity> + ExactSizeIterator {
        let w_min = self.w_min;
        (0..self.tree_width().ilog2()).map(move |k| w_min << k)
    }
}

impl fmt::Display for LaxityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})", self.w_min, self.w_max)
    }
}

/// Finds the class of `laxity` under `policy`.
///
/// The logarithmic policy grows unrounded edges (4, 8, 24, 96, 576, ...)
/// and rounds both ends of the final range up to a power of two, e.g.
/// `[1,2) [2,4) [4,8) [8,32) [32,128) [128,1024) [1024,8192)`. Since
/// consecutive unrounded edges are shared, the rounded ones are too.
pub fn classify(laxity: Laxity, policy: GrowthPolicy) -> Result<LaxityClass, LaxityError> {
    if !laxity.is_power_of_two() {
        return Err(LaxityError::NotPowerOfTwo(laxity));
    }
    if laxity < 2 {
        return Ok(LaxityClass::new(1, 2));
    }
    if laxity < 4 {
        return Ok(LaxityClass::new(2, 4));
    }

    let grow = |w: Laxity| -> Option<Laxity> {
        match policy {
            GrowthPolicy::Constant      => w.checked_mul(2),
            GrowthPolicy::Logarithmic   => w.checked_mul(w.ilog2() as Laxity),
            GrowthPolicy::Quadratic     => w.checked_mul(w),
        }
    };
    let overflow = LaxityError::Overflow(laxity);
    let mut w_min: Laxity = 4;
    let mut w_max = grow(w_min).ok_or(overflow)?;
    while laxity >= w_max {
        w_min = w_max;
        w_max = grow(w_min).ok_or(overflow)?;
    }
    if policy == GrowthPolicy::Logarithmic {
        w_min = w_min.checked_next_power_of_two().ok_or(overflow)?;
        w_max = w_max.checked_next_power_of_two().ok_or(overflow)?;
    }
    let res = LaxityClass::new(w_min, w_max);
    debug_assert!(res.contains(laxity), "Laxity {laxity} misclassified into {res}");

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(laxity: Laxity, policy: GrowthPolicy) -> (Laxity, Laxity) {
        let c = classify(laxity, policy).unwrap();
        (c.w_min, c.w_max)
    }

    #[test]
    fn constant_classes_double() {
        assert_eq!(bounds(1, GrowthPolicy::Constant), (1, 2));
        assert_eq!(bounds(2, GrowthPolicy::Constant), (2, 4));
        assert_eq!(bounds(4, GrowthPolicy::Constant), (4, 8));
        assert_eq!(bounds(64, GrowthPolicy::Constant), (64, 128));
    }

    #[test]
    fn logarithmic_edges_are_rounded_up() {
        let p = GrowthPolicy::Logarithmic;
        assert_eq!(bounds(4, p), (4, 8));
        assert_eq!(bounds(8, p), (8, 32));
        assert_eq!(bounds(16, p), (8, 32));
        assert_eq!(bounds(32, p), (32, 128));
        assert_eq!(bounds(64, p), (32, 128));
        assert_eq!(bounds(128, p), (128, 1024));
        assert_eq!(bounds(512, p), (128, 1024));
        assert_eq!(bounds(1024, p), (1024, 8192));
    }

    #[test]
    fn quadratic_classes_square() {
        let p = GrowthPolicy::Quadratic;
        assert_eq!(bounds(4, p), (4, 16));
        assert_eq!(bounds(8, p), (4, 16));
        assert_eq!(bounds(16, p), (16, 256));
        assert_eq!(bounds(256, p), (256, 65536));
    }

    #[test]
    fn classes_partition_the_powers_of_two() {
        for policy in [GrowthPolicy::Constant, GrowthPolicy::Logarithmic, GrowthPolicy::Quadratic] {
            let mut prev = classify(1, policy).unwrap();
            for k in 1..30 {
                let curr = classify(1 << k, policy).unwrap();
                assert!(curr.contains(1 << k));
                if curr != prev {
                    // A new class starts exactly where the last one ended.
                    assert_eq!(curr.w_min, prev.w_max, "{policy:?} at 2^{k}");
                    assert!(!prev.contains(1 << k));
                }
                prev = curr;
            }
        }
    }

    #[test]
    fn bad_laxities_are_rejected() {
        assert_eq!(classify(0, GrowthPolicy::Constant), Err(LaxityError::NotPowerOfTwo(0)));
        assert_eq!(classify(12, GrowthPolicy::Quadratic), Err(LaxityError::NotPowerOfTwo(12)));
        let huge = 1 << (Laxity::BITS - 1);
        assert_eq!(classify(huge, GrowthPolicy::Constant), Err(LaxityError::Overflow(huge)));
    }

    #[test]
    fn levels_run_top_down() {
        let c = LaxityClass::new(4, 32);
        assert_eq!(c.levels().collect::<Vec<_>>(), vec![4, 8, 16]);
        // Below the top, leaves first.
        assert_eq!(c.levels().skip(1).rev().collect::<Vec<_>>(), vec![16, 8]);
        assert_eq!(LaxityClass::new(2, 4).levels().skip(1).rev().count(), 0);
        assert_eq!(c.tree_width(), 8);
        assert_eq!(c.to_string(), "[4,32)");
    }
}

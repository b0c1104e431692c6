/// Minimum, maximum and mean of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DoubleStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl DoubleStats {
    /// Computes [`DoubleStats`] over `values`, or `None` if there are no values.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut count: usize = 0;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }

        if count == 0 {
            None
        } else {
            Some(Self {
                min,
                max,
                mean: sum / count as f64,
            })
        }
    }
}

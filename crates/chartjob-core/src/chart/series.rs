use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound (inclusive) of synthetic values.
pub const MAX_VALUE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub day: NaiveDate,
    pub value: u32,
}

/// `count` consecutive days starting at `start`, each with a value drawn
/// uniformly from `0..=MAX_VALUE`.
pub fn synthetic_series<R: Rng + ?Sized>(
    start: NaiveDate,
    count: usize,
    rng: &mut R,
) -> Vec<SeriesPoint> {
    start
        .iter_days()
        .take(count)
        .map(|day| SeriesPoint {
            day,
            value: rng.gen_range(0..=MAX_VALUE),
        })
        .collect()
}

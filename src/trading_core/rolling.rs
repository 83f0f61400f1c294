//! Trailing highest-high / lowest-low over a fixed number of bars.
//!
//! Monotonic deques give O(1) amortised updates. The window reported
//! for bar `i` covers `[i - length, i)` and never includes bar `i`.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingExtremes {
    length: usize,
    // Decreasing by high
    max_high: VecDeque<(usize, f64)>,
    // Increasing by low
    min_low: VecDeque<(usize, f64)>,
}

impl RollingExtremes {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            max_high: VecDeque::with_capacity(length + 1),
            min_low: VecDeque::with_capacity(length + 1),
        }
    }

    /// (highest high, lowest low) over the `length` bars preceding `index`.
    /// `None` until a full window exists.
    pub fn window_before(&mut self, index: usize) -> Option<(f64, f64)> {
        if index < self.length {
            return None;
        }
        let oldest = index - self.length;
        while matches!(self.max_high.front(), Some(&(i, _)) if i < oldest) {
            self.max_high.pop_front();
        }
        while matches!(self.min_low.front(), Some(&(i, _)) if i < oldest) {
            self.min_low.pop_front();
        }

        let (_, high) = *self.max_high.front()?;
        let (_, low) = *self.min_low.front()?;
        Some((high, low))
    }

    /// Record bar `index`. Indices must be pushed in increasing order.
    pub fn push(&mut self, index: usize, high: f64, low: f64) {
        while matches!(self.max_high.back(), Some(&(_, v)) if v <= high) {
            self.max_high.pop_back();
        }
        self.max_high.push_back((index, high));

        while matches!(self.min_low.back(), Some(&(_, v)) if v >= low) {
            self.min_low.pop_back();
        }
        self.min_low.push_back((index, low));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(highs: &[f64], lows: &[f64], length: usize, i: usize) -> Option<(f64, f64)> {
        if i < length {
            return None;
        }
        let h = highs[i - length..i].iter().copied().fold(f64::MIN, f64::max);
        let l = lows[i - length..i].iter().copied().fold(f64::MAX, f64::min);
        Some((h, l))
    }

    #[test]
    fn test_matches_naive_scan() {
        let highs = [5.0, 7.0, 6.0, 6.0, 9.0, 3.0, 4.0, 8.0, 2.0, 2.0, 10.0, 1.0];
        let lows: Vec<f64> = highs.iter().map(|h| h - 1.5).collect();

        for length in 1..5 {
            let mut window = RollingExtremes::new(length);
            for i in 0..highs.len() {
                assert_eq!(
                    window.window_before(i),
                    naive(&highs, &lows, length, i),
                    "length {} bar {}",
                    length,
                    i
                );
                window.push(i, highs[i], lows[i]);
            }
        }
    }

    #[test]
    fn test_excludes_current_bar() {
        let mut window = RollingExtremes::new(2);
        window.push(0, 10.0, 9.0);
        window.push(1, 11.0, 10.0);
        assert_eq!(window.window_before(2), Some((11.0, 9.0)));
        window.push(2, 50.0, 1.0);
        assert_eq!(window.window_before(3), Some((50.0, 1.0)));
        window.push(3, 5.0, 4.0);
        assert_eq!(window.window_before(4), Some((50.0, 1.0)));
        window.push(4, 5.0, 4.0);
        assert_eq!(window.window_before(5), Some((5.0, 4.0)));
    }
}

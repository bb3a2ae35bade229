use std::collections::VecDeque;

/// Rolling window of timestamped samples (timestamps in milliseconds).
#[derive(Debug, Clone)]
pub struct TimeSeries {
    data: VecDeque<f32>,
    timestamp: VecDeque<u128>,
    max_length: usize,
}

impl TimeSeries {
    pub fn new(max_length: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(max_length),
            timestamp: VecDeque::with_capacity(max_length),
            max_length: max_length.max(1),
        }
    }

    pub fn push(&mut self, value: f32, timestamp: u128) {
        self.data.push_back(value);
        self.timestamp.push_back(timestamp);

        if self.data.len() > self.max_length {
            self.data.pop_front();
            self.timestamp.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn last(&self) -> Option<f32> {
        self.data.back().copied()
    }

    pub fn mean(&self) -> Option<f32> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.iter().sum::<f32>() / self.data.len() as f32)
    }

    /// Samples per second over the window; needs two samples at distinct times.
    pub fn rate(&self) -> Option<f32> {
        let (first, last) = (self.timestamp.front()?, self.timestamp.back()?);
        let span_ms = last.checked_sub(*first).filter(|span| *span > 0)?;
        Some((self.timestamp.len() - 1) as f32 * 1000.0 / span_ms as f32)
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.timestamp.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_the_newest_samples() {
        let mut series = TimeSeries::new(3);
        for (i, value) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            series.push(value, i as u128 * 100);
        }
        assert_eq!(series.len(), 3);
        assert_eq!(series.mean(), Some(3.0));
        assert_eq!(series.last(), Some(4.0));
    }

    #[test]
    fn rate_counts_samples_per_second() {
        let mut series = TimeSeries::new(10);
        assert_eq!(series.rate(), None);
        for i in 0..5 {
            series.push(1.0, i * 250);
        }
        assert_eq!(series.rate(), Some(4.0));
    }

    #[test]
    fn empty_series_has_no_mean() {
        let mut series = TimeSeries::new(2);
        assert_eq!(series.mean(), None);
        series.push(1.0, 5);
        series.clear();
        assert!(series.is_empty());
        assert_eq!(series.rate(), None);
    }
}

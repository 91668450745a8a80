use std::collections::VecDeque;

/// Moving average over the last `window` samples. A window of 1 passes
/// samples through unchanged.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    buf: VecDeque<f64>,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            buf: VecDeque::with_capacity(window),
        }
    }

    /// Push a sample and return the current average.
    pub fn push(&mut self, value: f64) -> f64 {
        self.buf.push_back(value);
        if self.buf.len() > self.window {
            self.buf.pop_front();
        }
        self.buf.iter().sum::<f64>() / self.buf.len() as f64
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_last_window() {
        let mut ma = MovingAverage::new(3);
        ma.push(1.0);
        ma.push(2.0);
        assert_eq!(ma.push(3.0), 2.0);
        assert_eq!(ma.push(6.0), 11.0 / 3.0);
        assert_eq!(ma.len(), 3);
    }

    #[test]
    fn zero_window_behaves_as_one() {
        let mut ma = MovingAverage::new(0);
        ma.push(5.0);
        assert_eq!(ma.push(7.0), 7.0);
    }
}

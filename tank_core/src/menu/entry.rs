//! Numeric entry shared by every value-editing menu leaf.

use tank_traits::KeyEvent;

use crate::error::ValidationError;

/// Longest buffer accepted, decimal point included.
pub const MAX_ENTRY_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    Integer,
    /// Up to `places` digits after the decimal point.
    Decimal { places: u8 },
}

impl NumberFormat {
    fn places(self) -> usize {
        match self {
            NumberFormat::Integer => 0,
            NumberFormat::Decimal { places } => usize::from(places),
        }
    }
}

/// Applies a validated value. Returning an error keeps the entry open.
pub type CommitFn<C> = fn(&mut C, f64) -> Result<(), ValidationError>;

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Editing,
    /// Confirm failed; the buffer is kept for correction.
    Rejected(ValidationError),
    Committed(f64),
    Cancelled,
}

pub struct NumericEntryState<C> {
    prompt: &'static str,
    format: NumberFormat,
    min: f64,
    max: f64,
    commit: CommitFn<C>,
    buffer: String,
    error: Option<ValidationError>,
}

impl<C> std::fmt::Debug for NumericEntryState<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NumericEntryState")
            .field("prompt", &self.prompt)
            .field("format", &self.format)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("buffer", &self.buffer)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<C> NumericEntryState<C> {
    pub fn new(
        prompt: &'static str,
        format: NumberFormat,
        min: f64,
        max: f64,
        commit: CommitFn<C>,
    ) -> Self {
        Self {
            prompt,
            format,
            min,
            max,
            commit,
            buffer: String::with_capacity(MAX_ENTRY_LEN),
            error: None,
        }
    }

    pub fn prompt(&self) -> &'static str {
        self.prompt
    }

    pub fn format(&self) -> NumberFormat {
        self.format
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &mut C) -> EntryOutcome {
        match key {
            KeyEvent::Digit(d) if d <= 9 => {
                if self.accepts_digit() {
                    self.buffer.push(char::from(b'0' + d));
                    self.error = None;
                }
                EntryOutcome::Editing
            }
            KeyEvent::DecimalPoint => {
                if self.format.places() > 0
                    && !self.buffer.contains('.')
                    && self.buffer.len() < MAX_ENTRY_LEN
                {
                    self.buffer.push('.');
                    self.error = None;
                }
                EntryOutcome::Editing
            }
            KeyEvent::Clear => {
                self.buffer.clear();
                self.error = None;
                EntryOutcome::Editing
            }
            KeyEvent::Select => self.confirm(ctx),
            KeyEvent::Back => {
                self.buffer.clear();
                self.error = None;
                EntryOutcome::Cancelled
            }
            KeyEvent::Up | KeyEvent::Down | KeyEvent::Digit(_) => EntryOutcome::Editing,
        }
    }

    fn accepts_digit(&self) -> bool {
        if self.buffer.len() >= MAX_ENTRY_LEN {
            return false;
        }
        match self.buffer.split_once('.') {
            Some((_, frac)) => frac.len() < self.format.places(),
            None => true,
        }
    }

    /// Parse and range-check the buffer.
    pub fn parse(&self) -> Result<f64, ValidationError> {
        if self.buffer.is_empty() {
            return Err(ValidationError::Malformed);
        }
        let v: f64 = self
            .buffer
            .parse()
            .map_err(|_| ValidationError::Malformed)?;
        if !v.is_finite() {
            return Err(ValidationError::Malformed);
        }
        if v < self.min || v > self.max {
            return Err(ValidationError::OutOfRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(v)
    }

    fn confirm(&mut self, ctx: &mut C) -> EntryOutcome {
        let result = self.parse().and_then(|v| (self.commit)(ctx, v).map(|()| v));
        match result {
            Ok(v) => {
                self.buffer.clear();
                self.error = None;
                EntryOutcome::Committed(v)
            }
            Err(e) => {
                tracing::debug!(prompt = self.prompt, buffer = %self.buffer, error = %e, "entry rejected");
                self.error = Some(e.clone());
                EntryOutcome::Rejected(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(target: &mut f64, v: f64) -> Result<(), ValidationError> {
        *target = v;
        Ok(())
    }

    fn type_keys(e: &mut NumericEntryState<f64>, ctx: &mut f64, keys: &[KeyEvent]) {
        for &k in keys {
            e.handle_key(k, ctx);
        }
    }

    #[test]
    fn integer_format_ignores_decimal_point() {
        let mut target = 0.0;
        let mut e = NumericEntryState::new("n", NumberFormat::Integer, 0.0, 100.0, store);
        type_keys(&mut e, &mut target, &[KeyEvent::Digit(4), KeyEvent::DecimalPoint, KeyEvent::Digit(2)]);
        assert_eq!(e.buffer(), "42");
    }

    #[test]
    fn decimal_places_are_limited() {
        let mut target = 0.0;
        let mut e = NumericEntryState::new("n", NumberFormat::Decimal { places: 1 }, 0.0, 100.0, store);
        type_keys(
            &mut e,
            &mut target,
            &[KeyEvent::Digit(1), KeyEvent::DecimalPoint, KeyEvent::Digit(5), KeyEvent::Digit(7), KeyEvent::DecimalPoint],
        );
        assert_eq!(e.buffer(), "1.5");
    }

    #[test]
    fn buffer_length_is_capped() {
        let mut target = 0.0;
        let mut e = NumericEntryState::new("n", NumberFormat::Integer, 0.0, 1e12, store);
        for _ in 0..20 {
            e.handle_key(KeyEvent::Digit(9), &mut target);
        }
        assert_eq!(e.buffer().len(), MAX_ENTRY_LEN);
    }

    #[test]
    fn lone_decimal_point_is_malformed() {
        let mut target = 0.0;
        let mut e = NumericEntryState::new("n", NumberFormat::Decimal { places: 2 }, 0.0, 10.0, store);
        e.handle_key(KeyEvent::DecimalPoint, &mut target);
        assert_eq!(
            e.handle_key(KeyEvent::Select, &mut target),
            EntryOutcome::Rejected(ValidationError::Malformed)
        );
        assert_eq!(e.buffer(), ".");
    }
}

//! Window specification parsing and per-operation window state.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::error::{LimiterError, Result};

/// Unit suffix accepted in a window specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// `Sec`
    Second,
    /// `Min`
    Minute,
    /// `Hrs`
    Hour,
}

impl TimeUnit {
    /// Length of one unit.
    pub fn duration(&self) -> Duration {
        match self {
            TimeUnit::Second => Duration::from_secs(1),
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(3600),
        }
    }

    /// Parse the textual suffix. Matching is case-sensitive.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "Sec" => Some(TimeUnit::Second),
            "Min" => Some(TimeUnit::Minute),
            "Hrs" => Some(TimeUnit::Hour),
            _ => None,
        }
    }

    /// The textual suffix for this unit.
    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Second => "Sec",
            TimeUnit::Minute => "Min",
            TimeUnit::Hour => "Hrs",
        }
    }
}

/// A compact window specification such as `10Min` or `20Sec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowSpec {
    /// Number of units, always positive
    pub value: u64,
    /// The unit
    pub unit: TimeUnit,
}

impl WindowSpec {
    /// Resolve the specification to a duration.
    pub fn duration(&self) -> Result<Duration> {
        self.unit
            .duration()
            .as_secs()
            .checked_mul(self.value)
            .map(Duration::from_secs)
            .ok_or_else(|| LimiterError::Config(format!("Time window '{}' is too large", self)))
    }
}

impl FromStr for WindowSpec {
    type Err = LimiterError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || LimiterError::Config(format!("Incorrect time window specified: '{}'", s));

        let split = s
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        let (digits, suffix) = s.split_at(split);

        if digits.is_empty() {
            return Err(invalid());
        }
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        if value == 0 {
            return Err(invalid());
        }
        let unit = TimeUnit::from_suffix(suffix).ok_or_else(invalid)?;

        Ok(WindowSpec { value, unit })
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// Outcome of a single admission check against a [`WindowState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Permits left after this call; negative once the quota is exhausted
    pub remaining: i64,
    /// Whether this call started a fresh window
    pub reset: bool,
}

impl Decision {
    /// The call that brings `remaining` to exactly zero is still admitted.
    pub fn is_admitted(&self) -> bool {
        self.remaining >= 0
    }
}

/// Fixed-window state for one operation key.
///
/// Callers must hold exclusive access for the whole of [`WindowState::admit`];
/// the limiter keeps each state behind its own mutex.
#[derive(Debug, Clone)]
pub struct WindowState {
    window_start: Instant,
    remaining: i64,
    last_seen: Instant,
}

impl WindowState {
    /// Create a fresh window holding the full quota.
    pub fn new(now: Instant, limit: i64) -> Self {
        Self {
            window_start: now,
            remaining: limit,
            last_seen: now,
        }
    }

    /// Reset the window if it has expired, then spend one permit.
    ///
    /// A call at exactly `window` elapsed still belongs to the old window.
    pub fn admit(&mut self, now: Instant, limit: i64, window: Duration) -> Decision {
        let elapsed = now.saturating_duration_since(self.window_start);
        let reset = elapsed > window;
        if reset {
            self.window_start = now;
            self.remaining = limit;
        }

        self.remaining = self.remaining.saturating_sub(1);
        self.last_seen = now;

        Decision {
            remaining: self.remaining,
            reset,
        }
    }

    /// When the current window began.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Permits left in the current window, possibly negative.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Last time this state was created or admitted a call.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_unit_duration() {
        assert_eq!(TimeUnit::Second.duration(), Duration::from_secs(1));
        assert_eq!(TimeUnit::Minute.duration(), Duration::from_secs(60));
        assert_eq!(TimeUnit::Hour.duration(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_valid_windows() {
        let spec: WindowSpec = "1Min".parse().unwrap();
        assert_eq!(spec.duration().unwrap(), Duration::from_secs(60));

        let spec: WindowSpec = "20Sec".parse().unwrap();
        assert_eq!(spec.duration().unwrap(), Duration::from_secs(20));

        let spec: WindowSpec = "3Hrs".parse().unwrap();
        assert_eq!(spec.duration().unwrap(), Duration::from_secs(3 * 3600));
        assert_eq!(spec.to_string(), "3Hrs");
    }

    #[test]
    fn test_parse_invalid_windows() {
        for bad in [
            "1Minutes", "Min", "10", "", "0Sec", "-1Sec", "10 Min", "10min", "10Days", "1.5Min",
            " 10Min",
        ] {
            let result = bad.parse::<WindowSpec>();
            assert!(
                matches!(result, Err(LimiterError::Config(_))),
                "expected config error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_parse_overflowing_window() {
        assert!("99999999999999999999999Sec".parse::<WindowSpec>().is_err());

        let spec: WindowSpec = format!("{}Hrs", u64::MAX).parse().unwrap();
        assert!(spec.duration().is_err());
    }

    #[test]
    fn test_admit_spends_exactly_limit() {
        let start = Instant::now();
        let window = Duration::from_secs(60);
        let mut state = WindowState::new(start, 3);

        for expected in [2, 1, 0] {
            let decision = state.admit(start, 3, window);
            assert!(decision.is_admitted());
            assert_eq!(decision.remaining, expected);
        }

        let decision = state.admit(start, 3, window);
        assert!(!decision.is_admitted());
        assert_eq!(decision.remaining, -1);
    }

    #[test]
    fn test_boundary_belongs_to_old_window() {
        let start = Instant::now();
        let window = Duration::from_secs(20);
        let mut state = WindowState::new(start, 1);

        assert!(state.admit(start, 1, window).is_admitted());

        let decision = state.admit(start + window, 1, window);
        assert!(!decision.reset);
        assert!(!decision.is_admitted());

        let decision = state.admit(start + window + Duration::from_millis(1), 1, window);
        assert!(decision.reset);
        assert!(decision.is_admitted());
        assert_eq!(decision.remaining, 0);
        assert_eq!(state.window_start(), start + window + Duration::from_millis(1));
    }

    #[test]
    fn test_rejections_keep_decrementing() {
        let start = Instant::now();
        let window = Duration::from_secs(60);
        let mut state = WindowState::new(start, 1);

        state.admit(start, 1, window);
        state.admit(start, 1, window);
        state.admit(start, 1, window);
        assert_eq!(state.remaining(), -2);
    }
}

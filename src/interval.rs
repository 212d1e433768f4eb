//! Interval-sequence parser.
//!
//! Parses the compact pacing language used by the scripted message source:
//!
//! ```text
//! <delay>[{<repeat>}],<delay>[{<repeat>}],...
//!
//! Example:
//! 1000,1000,1000   three events, one 1s pause before each
//! 100{3},50        four 100ms pauses then an event, one 50ms pause then an event
//! ```
//!
//! Each event pauses for `delay` milliseconds `repeat + 1` times and then
//! produces exactly one outbound line.

use std::time::Duration;
use thiserror::Error;

/// A malformed interval spec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    /// The token does not start with a delay in milliseconds.
    #[error("interval token {index} ('{token}') must start with a delay in milliseconds")]
    MissingDelay { index: usize, token: String },
    /// The delay digits do not fit in a millisecond counter.
    #[error("interval token {index} ('{token}') has an out of range delay")]
    DelayOutOfRange { index: usize, token: String },
}

/// One timed emission event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalEvent {
    /// Position of the token in the interval string.
    pub index: usize,
    /// Pause length in milliseconds.
    pub delay_ms: u64,
    /// Extra pauses before the event fires (0 = pause once).
    pub repeat: u64,
    /// The token exactly as written.
    pub token: String,
}

impl IntervalEvent {
    /// Number of delay pulses before this event emits its line.
    pub fn pulses(&self) -> u64 {
        self.repeat.saturating_add(1)
    }

    /// Duration of a single pulse.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Total pacing time spent before this event emits.
    pub fn total_delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.saturating_mul(self.pulses()))
    }

    /// The outbound payload produced by this event: `<index> <token>`.
    pub fn payload(&self) -> String {
        format!("{} {}", self.index, self.token)
    }
}

/// Ordered list of events parsed from a spec string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSequence {
    events: Vec<IntervalEvent>,
}

impl IntervalSequence {
    /// Parse a comma-separated interval spec.
    ///
    /// An empty spec yields an empty sequence. Tokens are not trimmed.
    pub fn parse(spec: &str) -> Result<Self, IntervalError> {
        if spec.is_empty() {
            return Ok(Self::default());
        }

        let events = spec
            .split(',')
            .enumerate()
            .map(|(index, token)| parse_token(index, token))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { events })
    }

    pub fn events(&self) -> &[IntervalEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sum of all pacing across the sequence.
    pub fn total_delay(&self) -> Duration {
        self.events
            .iter()
            .fold(Duration::ZERO, |acc, event| acc.saturating_add(event.total_delay()))
    }
}

impl IntoIterator for IntervalSequence {
    type Item = IntervalEvent;
    type IntoIter = std::vec::IntoIter<IntervalEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// Parse one `<delay>[{<repeat>}]` token.
fn parse_token(index: usize, token: &str) -> Result<IntervalEvent, IntervalError> {
    let bytes = token.as_bytes();
    let digits = leading_digits(bytes);

    if digits == 0 {
        return Err(IntervalError::MissingDelay {
            index,
            token: token.to_string(),
        });
    }

    let delay_ms: u64 = token[..digits]
        .parse()
        .map_err(|_| IntervalError::DelayOutOfRange {
            index,
            token: token.to_string(),
        })?;

    Ok(IntervalEvent {
        index,
        delay_ms,
        repeat: parse_repeat(&token[digits..]),
        token: token.to_string(),
    })
}

/// Parse a `{<digits>}` suffix. Anything else means "fire once".
fn parse_repeat(rest: &str) -> u64 {
    let Some(inner) = rest.strip_prefix('{') else {
        return 0;
    };

    let digits = leading_digits(inner.as_bytes());
    if digits == 0 || inner.as_bytes().get(digits) != Some(&b'}') {
        return 0;
    }

    inner[..digits].parse().unwrap_or(0)
}

fn leading_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delays(seq: &IntervalSequence) -> Vec<(u64, u64)> {
        seq.events().iter().map(|e| (e.delay_ms, e.repeat)).collect()
    }

    #[test]
    fn test_parse_default_spec() {
        let seq = IntervalSequence::parse("1000,1000,1000").unwrap();
        assert_eq!(delays(&seq), vec![(1000, 0), (1000, 0), (1000, 0)]);
        assert_eq!(seq.total_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_repeat() {
        let seq = IntervalSequence::parse("100{2}").unwrap();
        assert_eq!(seq.len(), 1);

        let event = &seq.events()[0];
        assert_eq!(event.delay_ms, 100);
        assert_eq!(event.repeat, 2);
        assert_eq!(event.pulses(), 3);
        assert_eq!(event.total_delay(), Duration::from_millis(300));
    }

    #[test]
    fn test_order_and_tokens_preserved() {
        let seq = IntervalSequence::parse("30,10{1},20{0}").unwrap();
        assert_eq!(delays(&seq), vec![(30, 0), (10, 1), (20, 0)]);

        let payloads: Vec<String> = seq.events().iter().map(|e| e.payload()).collect();
        assert_eq!(payloads, vec!["0 30", "1 10{1}", "2 20{0}"]);
    }

    #[test]
    fn test_malformed_repeat_defaults_to_zero() {
        for spec in ["100{}", "100{abc}", "100{3", "100{", "100x", "100{99999999999999999999999}"] {
            let seq = IntervalSequence::parse(spec).unwrap();
            assert_eq!(delays(&seq), vec![(100, 0)], "spec {spec:?}");
        }
    }

    #[test]
    fn test_empty_spec() {
        let seq = IntervalSequence::parse("").unwrap();
        assert!(seq.is_empty());
        assert_eq!(seq.total_delay(), Duration::ZERO);
    }

    #[test]
    fn test_missing_delay_rejected() {
        assert_eq!(
            IntervalSequence::parse("abc"),
            Err(IntervalError::MissingDelay {
                index: 0,
                token: "abc".to_string()
            })
        );

        // Second token empty
        assert!(matches!(
            IntervalSequence::parse("100,"),
            Err(IntervalError::MissingDelay { index: 1, .. })
        ));

        // Whitespace is not trimmed
        assert!(matches!(
            IntervalSequence::parse("100, 200"),
            Err(IntervalError::MissingDelay { index: 1, .. })
        ));

        assert!(matches!(
            IntervalSequence::parse("{3}"),
            Err(IntervalError::MissingDelay { index: 0, .. })
        ));
    }

    #[test]
    fn test_delay_out_of_range() {
        assert!(matches!(
            IntervalSequence::parse("99999999999999999999999"),
            Err(IntervalError::DelayOutOfRange { index: 0, .. })
        ));
    }
}

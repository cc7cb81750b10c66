use anyhow::{anyhow, bail, ensure, Result};
use core::fmt;
use logos::{Lexer, Logos};
use std::{
    ops::{Add, AddAssign},
    str::FromStr,
    time::Duration,
};

/// A virtual instant on the simulation clock.
///
/// `SimTime` counts the time elapsed since the start of the simulation.
/// It only ever moves forward: the [`Simulation`] advances it when the
/// next scheduled process resumes, never in between.
///
/// [`Simulation`]: crate::sim::Simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(Duration);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: Self = Self(Duration::ZERO);

    #[inline]
    pub const fn new(since_start: Duration) -> Self {
        Self(since_start)
    }

    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    #[inline]
    pub const fn as_duration(self) -> Duration {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Time elapsed since `earlier`, saturating to zero if `earlier`
    /// is in the future.
    #[inline]
    pub fn elapsed_since(self, earlier: SimTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;
    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Duration as fmt::Debug>::fmt(&self.0, f)
    }
}

/// A [`Duration`] that can be parsed from a human readable string
/// such as `10s`, `250ms` or `1m 30s`.
///
/// Used for configuration surfaces (sampling intervals, bundle TTLs,
/// generator windows) where a plain number of nanoseconds would be
/// unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Interval(Duration);

impl Interval {
    pub const fn new(dur: Duration) -> Self {
        Self(dur)
    }

    #[inline]
    pub const fn into_duration(self) -> Duration {
        self.0
    }
}

impl From<Interval> for Duration {
    fn from(interval: Interval) -> Self {
        interval.into_duration()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Duration as fmt::Debug>::fmt(&self.0, f)
    }
}

impl FromStr for Interval {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::new(s);

        let mut durations = Vec::new();

        while let Some(next) = lex.next() {
            let number: Token = next.map_err(|()| anyhow!("Failed to parse: {s}"))?;

            ensure!(
                number == Token::Value,
                "Expecting duration to starts with number. Cannot parse {s}"
            );
            let number: u64 = lex.slice().parse()?;

            let Some(Ok(measure)) = lex.next() else {
                bail!("Expecting a measure, failed to parse: {s}")
            };
            let duration = match measure {
                Token::NanoSeconds => Duration::from_nanos(number),
                Token::MicroSeconds => Duration::from_micros(number),
                Token::MilliSeconds => Duration::from_millis(number),
                Token::Seconds => Duration::from_secs(number),
                Token::Minutes => Duration::from_secs(number * 60),
                Token::Hours => Duration::from_secs(number * 3_600),
                Token::Value => bail!("Failed to parse `{s}', expecting a measure."),
            };
            durations.push(duration);
        }

        Ok(Self(durations.into_iter().sum()))
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|μs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,
    #[token("h")]
    Hours,

    #[regex("[0-9]+")]
    Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logos_lexer() {
        let mut lex = Token::lexer("1ns");

        assert_eq!(lex.next(), Some(Ok(Token::Value)));
        assert_eq!(lex.span(), 0..1);
        assert_eq!(lex.slice(), "1");

        assert_eq!(lex.next(), Some(Ok(Token::NanoSeconds)));
        assert_eq!(lex.span(), 1..3);
        assert_eq!(lex.slice(), "ns");
    }

    #[test]
    fn parse() {
        let Interval(duration) = "123ms".parse().unwrap();
        assert_eq!(duration.as_millis(), 123);

        let Interval(duration) = "1s 2000ms 3000000us".parse().unwrap();
        assert_eq!(duration.as_secs(), 6);

        let Interval(duration) = "1h 1m".parse().unwrap();
        assert_eq!(duration.as_secs(), 3_660);
    }

    #[test]
    fn parse_invalid() {
        assert!("10".parse::<Interval>().is_err());
        assert!("s10".parse::<Interval>().is_err());
    }

    #[test]
    fn sim_time_ordering() {
        let t0 = SimTime::ZERO;
        let t1 = t0 + Duration::from_secs(1);
        let t2 = SimTime::from_secs(2);

        assert!(t0 < t1);
        assert!(t1 < t2);
        assert_eq!(t2.elapsed_since(t1), Duration::from_secs(1));
        assert_eq!(t1.elapsed_since(t2), Duration::ZERO);
    }
}

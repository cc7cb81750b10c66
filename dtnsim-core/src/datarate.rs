use anyhow::{bail, ensure};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr};

/// A radio transmission rate in bits per second.
///
/// Parsed from human readable strings (`"2mbps"`, `"512kbps"`) for
/// configuration, and overwritten at run time by the telemetry control
/// action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DataRate(
    /// bits per second
    u64,
);

const K: u64 = 1_024;
const M: u64 = 1_024 * 1_024;
const G: u64 = 1_024 * 1_024 * 1_024;

impl DataRate {
    pub const ZERO: Self = Self(0);

    pub const fn new(bits_per_sec: u64) -> Self {
        Self(bits_per_sec)
    }

    #[inline]
    pub const fn bits_per_sec(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;

        if v < K || v % K != 0 {
            write!(f, "{v}bps")
        } else if v < M || v % M != 0 {
            write!(f, "{}kbps", v / K)
        } else if v < G || v % G != 0 {
            write!(f, "{}mbps", v / M)
        } else {
            write!(f, "{}gbps", v / G)
        }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum DataRateToken {
    #[regex("bps")]
    Bps,
    #[regex("kbps")]
    Kbps,
    #[regex("mbps")]
    Mbps,
    #[regex("gbps")]
    Gbps,

    #[regex("[0-9]+")]
    Value,
}

impl FromStr for DataRate {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, DataRateToken>::new(s);

        let Some(Ok(DataRateToken::Value)) = lex.next() else {
            bail!("Expecting to parse a number")
        };
        let number: u64 = lex.slice().parse()?;
        let Some(Ok(token)) = lex.next() else {
            bail!("Expecting to parse a unit")
        };
        let bps = match token {
            DataRateToken::Bps => number,
            DataRateToken::Kbps => number * K,
            DataRateToken::Mbps => number * M,
            DataRateToken::Gbps => number * G,
            DataRateToken::Value => bail!("Expecting to parse a unit (bps, kbps, ...)"),
        };

        ensure!(
            lex.next().is_none(),
            "Not expecting any other tokens to parse a data rate"
        );

        Ok(Self::new(bps))
    }
}

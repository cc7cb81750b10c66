use crate::{sim::SimContext, time::SimTime};
use anyhow::anyhow;
use std::{fmt, str};

/// The identifier of a process registered with the [`Simulation`].
///
/// [`Simulation`]: crate::sim::Simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(C)]
pub struct ProcessId(u64);

impl ProcessId {
    pub const ZERO: Self = ProcessId::new(0);
    pub const ONE: Self = ProcessId::new(1);

    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use = "function does not modify the current value"]
    pub(crate) fn next(self) -> Self {
        Self::new(self.0 + 1)
    }
}

impl str::FromStr for ProcessId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self).map_err(|error| anyhow!("{error}"))
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a [`Process`] wants the scheduler to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Suspend and resume after the given virtual delay.
    After(std::time::Duration),
    /// The process is finished; it will not be resumed again.
    Done,
}

/// A resumable unit of work driven by the simulation clock.
///
/// Processes are cooperatively scheduled: the [`Simulation`] resumes one
/// process at a time and the clock only advances between resumes. A resume
/// runs to completion; any state a process shares with others is therefore
/// never observed mid-mutation.
///
/// Implementors suspend by returning [`Resume::After`] and terminate by
/// returning [`Resume::Done`]. Termination is final: the process is dropped
/// from the scheduler.
///
/// [`Simulation`]: crate::sim::Simulation
pub trait Process {
    /// The virtual instant of the first resume.
    ///
    /// Traffic generators return their window start here so that spawning
    /// a process and "suspending until `tstart`" are the same operation.
    fn start_time(&self) -> SimTime {
        SimTime::ZERO
    }

    /// Run one step of the process at the context's current time.
    fn resume(&mut self, ctx: &mut SimContext<'_>) -> Resume;

    /// Called once on every process still registered when the simulation
    /// is torn down. Reporting hook, not a destructor.
    fn finalize(&mut self, ctx: &mut SimContext<'_>) {
        let _ = ctx;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(format!("{}", ProcessId(42)), "42")
    }

    #[test]
    fn parse() {
        assert_eq!("42".parse::<ProcessId>().unwrap(), ProcessId(42));
    }
}

//! Chunk-size schedules.
//!
//! A schedule is a comma-separated list of entries, each either a single size
//! or an inclusive range with a step:
//!
//! ```text
//! 100,1k,64k
//! 100,1k,8k..=256k:8k
//! ```
//!
//! Sizes take an optional binary unit suffix: `k`/`KiB`, `m`/`MiB`, `g`/`GiB`.

use std::{fmt, num::NonZeroUsize, str::FromStr};

use itertools::Itertools;

const KIB: u64 = 1 << 10;
const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;

/// A byte count as written on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde_with::SerializeDisplay)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits_end = s
            .find(|c: char| !c.is_ascii_digit() && c != '_')
            .unwrap_or(s.len());
        let (digits, unit) = s.split_at(digits_end);
        let digits = digits.replace('_', "");
        if digits.is_empty() {
            return Err(format!("invalid size: no digits: {s:?}"));
        }
        let n: u64 = digits
            .parse()
            .map_err(|e| format!("invalid size: {e}: {s:?}"))?;
        let multiplier = match unit.to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kib" => KIB,
            "m" | "mib" => MIB,
            "g" | "gib" => GIB,
            _ => return Err(format!("invalid size unit {unit:?}: {s:?}")),
        };
        n.checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| format!("size overflows: {s:?}"))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => write!(f, "0"),
            n if n % GIB == 0 => write!(f, "{}GiB", n / GIB),
            n if n % MIB == 0 => write!(f, "{}MiB", n / MIB),
            n if n % KIB == 0 => write!(f, "{}KiB", n / KIB),
            n => write!(f, "{n}"),
        }
    }
}

fn parse_chunk_size(s: &str) -> Result<NonZeroUsize, String> {
    let size = s.parse::<ByteSize>()?.get();
    let size = usize::try_from(size).map_err(|e| format!("chunk size too large: {e}: {s:?}"))?;
    NonZeroUsize::new(size).ok_or_else(|| format!("chunk size must be positive: {s:?}"))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduleEntry {
    Fixed(NonZeroUsize),
    /// `start`, `start + step`, ... up to and including `end` if it is hit.
    Range {
        start: NonZeroUsize,
        end: NonZeroUsize,
        step: NonZeroUsize,
    },
}

impl ScheduleEntry {
    fn sizes(&self) -> impl Iterator<Item = NonZeroUsize> + '_ {
        let (start, end, step) = match *self {
            ScheduleEntry::Fixed(size) => (size, size, size),
            ScheduleEntry::Range { start, end, step } => (start, end, step),
        };
        (start.get()..=end.get())
            .step_by(step.get())
            .filter_map(NonZeroUsize::new)
    }
}

impl FromStr for ScheduleEntry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((start, rest)) = s.split_once("..=") else {
            return parse_chunk_size(s).map(ScheduleEntry::Fixed);
        };
        let (end, step) = rest
            .split_once(':')
            .ok_or_else(|| format!("range needs a step, e.g. 8k..=256k:8k: {s:?}"))?;
        let start = parse_chunk_size(start)?;
        let end = parse_chunk_size(end)?;
        let step = parse_chunk_size(step)?;
        if start > end {
            return Err(format!("range start is past its end: {s:?}"));
        }
        Ok(ScheduleEntry::Range { start, end, step })
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = |n: NonZeroUsize| ByteSize(n.get() as u64);
        match *self {
            ScheduleEntry::Fixed(n) => write!(f, "{}", size(n)),
            ScheduleEntry::Range { start, end, step } => {
                write!(f, "{}..={}:{}", size(start), size(end), size(step))
            }
        }
    }
}

/// Ordered chunk sizes a sweep runs through. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, serde_with::SerializeDisplay)]
pub struct ChunkSchedule {
    entries: Vec<ScheduleEntry>,
}

impl ChunkSchedule {
    pub fn new(entries: Vec<ScheduleEntry>) -> Result<Self, String> {
        if entries.is_empty() {
            return Err("empty chunk size schedule".to_owned());
        }
        Ok(ChunkSchedule { entries })
    }

    /// Chunk sizes in the order they are tested.
    pub fn chunk_sizes(&self) -> impl Iterator<Item = NonZeroUsize> + '_ {
        self.entries.iter().flat_map(|entry| entry.sizes())
    }

    /// `100 B, 1 KiB, 64 KiB`.
    pub fn small() -> Self {
        "100,1k,64k".parse().unwrap_or_else(|e| unreachable!("{e}"))
    }

    /// `100 B, 1 KiB`, then 8 KiB to 256 KiB in 8 KiB steps.
    pub fn large() -> Self {
        "100,1k,8k..=256k:8k"
            .parse()
            .unwrap_or_else(|e| unreachable!("{e}"))
    }
}

impl FromStr for ChunkSchedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries = s
            .split(',')
            .filter(|e| !e.trim().is_empty())
            .map(ScheduleEntry::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        ChunkSchedule::new(entries)
    }
}

impl fmt::Display for ChunkSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entries.iter().join(","))
    }
}

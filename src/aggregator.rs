//! Host-side accumulator for [`crate::profiler::Profiler::stream_next`]
//! frames.
//!
//! The profiler table resets (and its per-PC counters restart from zero)
//! every time [`crate::profiler::Profiler::start`] runs, so a long-lived
//! host view has to track its own running totals and fold in whatever the
//! target reports as a delta, not a replacement value.

use std::collections::HashMap;

/// Running totals the host has accumulated for one PC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    /// Samples accumulated across every `insert` call for this PC.
    pub samples: u64,
    /// Cycles accumulated across every `insert` call for this PC.
    pub cycles: u64,
    last_samples: u64,
    last_cycles: u64,
}

/// One parsed entry from a profiler stream frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hit {
    pub pc: u32,
    pub samples: u64,
    pub cycles: u64,
}

/// Accumulates profiler stream frames across the lifetime of a target
/// run, absorbing the target's epoch resets.
///
/// A target-side [`crate::profiler::Profiler::start`] zeroes its table, so
/// a freshly-reported `samples` value can be smaller than what this
/// aggregator last saw for the same PC. When that happens the whole new
/// value is treated as the delta (the table must have reset), rather than
/// going negative.
#[derive(Debug, Default)]
pub struct ProfileAggregator {
    map: HashMap<u32, Totals>,
}

impl ProfileAggregator {
    /// Constructs an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one `(pc, samples, cycles)` reading into the running totals.
    pub fn insert(&mut self, pc: u32, samples: u64, cycles: u64) {
        let entry = self.map.entry(pc).or_default();
        let delta_samples = samples.checked_sub(entry.last_samples).unwrap_or(samples);
        let delta_cycles = cycles.checked_sub(entry.last_cycles).unwrap_or(cycles);
        entry.samples += delta_samples;
        entry.cycles += delta_cycles;
        entry.last_samples = samples;
        entry.last_cycles = cycles;
    }

    /// Folds every hit in one parsed stream frame.
    pub fn insert_frame(&mut self, hits: &[Hit]) {
        for hit in hits {
            self.insert(hit.pc, hit.samples, hit.cycles);
        }
    }

    /// Running totals for one PC, if it has ever been reported.
    #[must_use]
    pub fn totals(&self, pc: u32) -> Option<Totals> {
        self.map.get(&pc).copied()
    }

    /// Number of distinct PCs ever reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Clears all accumulated state, e.g. when the host itself restarts a
    /// profiling session.
    pub fn reset(&mut self) {
        self.map.clear();
    }

    /// All `(pc, totals)` pairs, for rendering a report.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Totals)> + '_ {
        self.map.iter().map(|(&pc, &totals)| (pc, totals))
    }
}

/// Parses one `stream_next` JSON frame into a list of [`Hit`]s.
///
/// This is a hand-rolled scanner, not a general JSON parser: it expects
/// exactly the shape `Profiler::stream_next` emits and returns `None` on
/// anything else, since the host never needs to tolerate a foreign
/// producer here.
#[must_use]
pub fn parse_frame(text: &str) -> Option<Vec<Hit>> {
    let hits_start = text.find(r#""hits":["#)? + r#""hits":["#.len();
    let hits_end = text.rfind(']')?;
    if hits_end < hits_start {
        return None;
    }
    let body = &text[hits_start..hits_end];
    if body.is_empty() {
        return Some(Vec::new());
    }

    let mut hits = Vec::new();
    for entry in body.split("},") {
        let entry = entry.trim_end_matches('}').trim_start_matches('{');
        let pc = extract_hex(entry, r#""pc":"0x"#)?;
        let samples = extract_u64(entry, r#""samples":"#)?;
        let cycles = extract_u64(entry, r#""cycles":"#)?;
        hits.push(Hit {
            pc,
            samples,
            cycles,
        });
    }
    Some(hits)
}

fn extract_hex(entry: &str, key: &str) -> Option<u32> {
    let start = entry.find(key)? + key.len();
    let rest = &entry[start..];
    let end = rest.find('"')?;
    u32::from_str_radix(&rest[..end], 16).ok()
}

fn extract_u64(entry: &str, key: &str) -> Option<u64> {
    let start = entry.find(key)? + key.len();
    let rest = &entry[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

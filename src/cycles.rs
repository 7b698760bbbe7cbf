//! Cycle bookkeeping: the list of cycle times the server holds, and the
//! history of reduced cycles behind the time-series pages.

use chrono::NaiveDate;

use crate::averaging::{vis_quantity, VisQuantity};
use crate::header::{MetInfo, ScanHeader};
use crate::spectrum::{AmpPhaseOptions, CycleData, Pol, WindowOptions};
use crate::syscal::SyscalData;
use crate::utils::{date_from_mjd, format_mjd, SECONDS_PER_DAY};

/// Where a relative move lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    To(f64),
    /// Already at the first or last cycle.
    Clamped,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleIndex {
    mjds: Vec<f64>,
    /// Days.
    pub mjd_cycletime: f64,
    pub earliest_mjd: f64,
    pub latest_mjd: f64,
    have_times: bool,
    have_range: bool,
}

impl CycleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cycle time in seconds, earliest and latest MJD.
    pub fn set_range(&mut self, cycletime_seconds: f64, earliest: f64, latest: f64) {
        self.mjd_cycletime = cycletime_seconds / SECONDS_PER_DAY;
        self.earliest_mjd = earliest.min(latest);
        self.latest_mjd = earliest.max(latest);
        self.have_range = true;
    }

    pub fn set_times(&mut self, mut mjds: Vec<f64>) {
        mjds.retain(|m| m.is_finite());
        mjds.sort_by(|a, b| a.total_cmp(b));
        mjds.dedup();
        if !self.have_range {
            if let (Some(first), Some(last)) = (mjds.first(), mjds.last()) {
                self.earliest_mjd = *first;
                self.latest_mjd = *last;
            }
            if self.mjd_cycletime <= 0.0 && mjds.len() > 1 {
                self.mjd_cycletime = mjds[1] - mjds[0];
            }
        }
        self.mjds = mjds;
        self.have_times = true;
    }

    /// True once the server has sent the cycle list.
    pub fn is_known(&self) -> bool {
        self.have_times
    }

    pub fn len(&self) -> usize {
        self.mjds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mjds.is_empty()
    }

    pub fn earliest_date(&self) -> Option<NaiveDate> {
        self.mjds.first().map(|m| date_from_mjd(*m))
    }

    /// Index of the cycle within half a cycle time of `mjd`.
    pub fn locate(&self, mjd: f64) -> Option<usize> {
        let tolerance = self.mjd_cycletime / 2.0;
        self.mjds.iter().position(|m| (mjd - m).abs() < tolerance)
    }

    /// Without a current cycle, forward starts from the first one.
    pub fn step_forward(&self, current: Option<f64>) -> Option<Step> {
        if self.mjds.is_empty() {
            return None;
        }
        match current.and_then(|m| self.locate(m)) {
            None => Some(Step::To(self.mjds[0])),
            Some(i) if i + 1 < self.mjds.len() => Some(Step::To(self.mjds[i + 1])),
            Some(_) => Some(Step::Clamped),
        }
    }

    /// Without a current cycle, backward starts from the last one.
    pub fn step_backward(&self, current: Option<f64>) -> Option<Step> {
        let last = *self.mjds.last()?;
        match current.and_then(|m| self.locate(m)) {
            None => Some(Step::To(last)),
            Some(0) => Some(Step::Clamped),
            Some(i) => Some(Step::To(self.mjds[i - 1])),
        }
    }

    pub fn in_range(&self, mjd: f64) -> bool {
        let tolerance = self.mjd_cycletime;
        mjd >= self.earliest_mjd - tolerance && mjd <= self.latest_mjd + tolerance
    }

    /// The nearest cycle no more than two cycle times away.
    pub fn nearest_within(&self, mjd: f64) -> Option<f64> {
        let limit = 2.0 * self.mjd_cycletime;
        self.mjds
            .iter()
            .copied()
            .min_by(|a, b| (a - mjd).abs().total_cmp(&(b - mjd).abs()))
            .filter(|m| (m - mjd).abs() <= limit)
    }

    /// Cycle list for the operator. Runs of contiguous cycles show their
    /// first two and last two entries; a gap of more than two cycle times
    /// between runs is shown as its own line.
    pub fn listing(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.mjds.is_empty() {
            lines.push("no cycles available".to_string());
            return lines;
        }
        let gap = 2.0 * self.mjd_cycletime;
        let mut runs: Vec<(usize, usize)> = Vec::new();
        let mut start = 0;
        for i in 1..self.mjds.len() {
            if self.mjd_cycletime > 0.0 && self.mjds[i] - self.mjds[i - 1] > gap {
                runs.push((start, i - 1));
                start = i;
            }
        }
        runs.push((start, self.mjds.len() - 1));

        let entry = |i: usize| format!("{:6}  {}", i + 1, format_mjd(self.mjds[i]));
        for (r, &(first, last)) in runs.iter().enumerate() {
            if r > 0 {
                lines.push("  ......  gap  ......".to_string());
            }
            if last - first < 4 {
                lines.extend((first..=last).map(entry));
            } else {
                lines.push(entry(first));
                lines.push(entry(first + 1));
                lines.push("     ...".to_string());
                lines.push(entry(last - 1));
                lines.push(entry(last));
            }
        }
        lines
    }
}

/// One cycle reduced for the time-series pages.
#[derive(Debug, Clone, PartialEq)]
pub struct VisCycle {
    pub mjd: f64,
    pub header: ScanHeader,
    pub met: MetInfo,
    pub syscal: SyscalData,
    /// `[window][pol]`.
    pub quantities: Vec<Vec<VisQuantity>>,
}

impl VisCycle {
    pub fn from_cycle(cycle: &CycleData, options: &[AmpPhaseOptions]) -> Option<VisCycle> {
        let mjd = cycle.mjd()?;
        let default_options = WindowOptions::default();
        let quantities = cycle
            .windows
            .iter()
            .enumerate()
            .map(|(w, blocks)| {
                blocks
                    .iter()
                    .map(|block| {
                        let window_options = options
                            .get(block.options)
                            .and_then(|o| o.window(w))
                            .unwrap_or(&default_options);
                        vis_quantity(block, window_options)
                    })
                    .collect()
            })
            .collect();
        Some(VisCycle {
            mjd,
            header: cycle.header.clone(),
            met: cycle.met,
            syscal: cycle.syscal.clone(),
            quantities,
        })
    }

    pub fn num_windows(&self) -> usize {
        self.quantities.len()
    }

    pub fn window_index(&self, label: &str) -> Option<usize> {
        self.quantities.iter().position(|pols| {
            pols.first()
                .map(|q| q.window_name.eq_ignore_ascii_case(label))
                .unwrap_or(false)
        })
    }

    pub fn quantity(&self, window: usize, pol: Pol) -> Option<&VisQuantity> {
        self.quantities.get(window)?.iter().find(|q| q.pol == pol)
    }
}

/// Reduced cycles in time order, newest last.
#[derive(Debug, Clone, Default)]
pub struct VisHistory {
    cycles: Vec<VisCycle>,
}

/// Cycles kept no matter how long the history window is.
const MAX_HISTORY_CYCLES: usize = 20_000;

impl VisHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycles(&self) -> &[VisCycle] {
        &self.cycles
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn latest(&self) -> Option<&VisCycle> {
        self.cycles.last()
    }

    /// Inserts a cycle in time order; a cycle already held at the same time
    /// is replaced.
    pub fn push(&mut self, cycle: VisCycle) {
        let tolerance = 0.5 / SECONDS_PER_DAY;
        if let Some(existing) = self
            .cycles
            .iter_mut()
            .find(|c| (c.mjd - cycle.mjd).abs() < tolerance)
        {
            *existing = cycle;
            return;
        }
        let at = self.cycles.partition_point(|c| c.mjd < cycle.mjd);
        self.cycles.insert(at, cycle);
        if self.cycles.len() > MAX_HISTORY_CYCLES {
            let excess = self.cycles.len() - MAX_HISTORY_CYCLES;
            self.cycles.drain(..excess);
        }
    }

    /// Drops cycles older than `minutes` before the newest one.
    pub fn trim(&mut self, minutes: f64) {
        let Some(latest) = self.cycles.last().map(|c| c.mjd) else {
            return;
        };
        let cutoff = latest - minutes * 60.0 / SECONDS_PER_DAY;
        self.cycles.retain(|c| c.mjd >= cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn three_cycles() -> CycleIndex {
        let mut index = CycleIndex::new();
        index.set_range(864.0, 58000.0, 58000.02);
        index.set_times(vec![58000.02, 58000.0, 58000.01]);
        index
    }

    #[test]
    fn navigation_clamps_at_the_ends() {
        let index = three_cycles();
        assert_eq!(index.locate(58000.0101), Some(1));
        assert_eq!(index.step_forward(Some(58000.01)), Some(Step::To(58000.02)));
        assert_eq!(index.step_forward(Some(58000.02)), Some(Step::Clamped));
        assert_eq!(index.step_backward(Some(58000.0)), Some(Step::Clamped));
        assert_eq!(index.step_backward(None), Some(Step::To(58000.02)));
        assert_eq!(index.step_forward(None), Some(Step::To(58000.0)));
        assert_eq!(CycleIndex::new().step_forward(None), None);
    }

    #[test]
    fn time_requests_snap_to_nearby_cycles() {
        let index = three_cycles();
        assert_eq!(index.nearest_within(58000.0105), Some(58000.01));
        assert_eq!(index.nearest_within(58000.1), None);
        assert!(index.in_range(58000.015));
        assert!(!index.in_range(58001.0));
    }

    #[test]
    fn listing_compresses_runs() {
        let mut index = CycleIndex::new();
        index.set_range(864.0, 58000.0, 58000.2);
        let mut mjds: Vec<f64> = (0..6).map(|i| 58000.0 + i as f64 * 0.01).collect();
        mjds.push(58000.2);
        index.set_times(mjds);
        let lines = index.listing();
        assert_eq!(
            lines,
            vec![
                "     1  2017-09-04 00:00:00".to_string(),
                "     2  2017-09-04 00:14:24".to_string(),
                "     ...".to_string(),
                "     5  2017-09-04 00:57:36".to_string(),
                "     6  2017-09-04 01:12:00".to_string(),
                "  ......  gap  ......".to_string(),
                "     7  2017-09-04 04:48:00".to_string(),
            ]
        );
    }

    #[test]
    fn short_runs_are_listed_in_full() {
        let lines = three_cycles().listing();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].ends_with("00:28:48"));
    }

    #[test]
    fn history_keeps_time_order_and_trims() {
        let cycle = |mjd: f64| VisCycle {
            mjd,
            header: ScanHeader::default(),
            met: MetInfo::default(),
            syscal: SyscalData::default(),
            quantities: Vec::new(),
        };
        let mut history = VisHistory::new();
        history.push(cycle(58000.02));
        history.push(cycle(58000.0));
        history.push(cycle(58000.01));
        history.push(cycle(58000.01));
        let mjds: Vec<f64> = history.cycles().iter().map(|c| c.mjd).collect();
        assert_eq!(mjds, vec![58000.0, 58000.01, 58000.02]);
        // 0.01 day is 14.4 minutes
        history.trim(20.0);
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().unwrap().mjd, 58000.02);
    }
}

//! ==============================================================================
//! history.rs - bounded per-metric time series
//! ==============================================================================
//!
//! purpose:
//!     turns a stream of polled snapshots into one ordered sequence of
//!     HistoryPoints per metric, pruned after every append by a retention
//!     policy. a buffer uses exactly one policy for its whole life.
//!
//! retention policies:
//!     - FixedWindow: keep the newest N points, drop the oldest on overflow.
//!     - AgeTiered: the point's age picks the tier, the point's own
//!       timestamp (whole seconds) decides whether it survives the tier:
//!
//!         age < 60s           keep
//!         60s  <= age < 300s  keep if time % 5 == 0
//!         300s <= age <= 600s keep if time % 15 == 0
//!         age > 600s          drop
//!
//!       testing the timestamp rather than the age keeps the decision stable
//!       across prunes, so a point that survives once keeps surviving until
//!       it ages into the next tier.
//!
//! ordering:
//!     points are appended with non-decreasing times and pruning only
//!     removes, so every sequence stays sorted oldest-first.
//!
//! relationships:
//!     - used by: poller.rs (the merge task owns one buffer)
//!     - used by: server.rs (serialized for /api/history)
//!
//! ==============================================================================

use crate::domain::{HistoryPoint, Metric, SensorSnapshot};
use rand::Rng;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, VecDeque};

const FULL_RESOLUTION_SECS: u64 = 60;
const MEDIUM_RESOLUTION_SECS: u64 = 300;
const MAX_AGE_SECS: u64 = 600;

/// points created by `seed_placeholder`, one per minute
const SEED_POINTS: u64 = 10;

/// seed times sit on this boundary so every age tier keeps them
const SEED_ALIGN_MS: u64 = 15_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    FixedWindow { max_points: usize },
    AgeTiered,
}

impl RetentionPolicy {
    /// whether the age-tiered rule keeps a point stamped `time_ms` at `now_ms`
    pub fn age_tier_keeps(time_ms: u64, now_ms: u64) -> bool {
        let age = now_ms.saturating_sub(time_ms) / 1000;
        let stamp = time_ms / 1000;
        if age < FULL_RESOLUTION_SECS {
            true
        } else if age < MEDIUM_RESOLUTION_SECS {
            stamp % 5 == 0
        } else if age <= MAX_AGE_SECS {
            stamp % 15 == 0
        } else {
            false
        }
    }

    /// most points a sequence can hold, assuming at most one sample per
    /// second for the age-tiered policy
    pub fn max_len(&self) -> usize {
        match *self {
            RetentionPolicy::FixedWindow { max_points } => max_points,
            RetentionPolicy::AgeTiered => {
                let now = MAX_AGE_SECS * 1000;
                (0..=MAX_AGE_SECS)
                    .filter(|s| Self::age_tier_keeps(now - s * 1000, now))
                    .count()
            }
        }
    }

    fn prune(&self, points: &mut VecDeque<HistoryPoint>, now_ms: u64) {
        match *self {
            RetentionPolicy::FixedWindow { max_points } => {
                while points.len() > max_points {
                    points.pop_front();
                }
            }
            RetentionPolicy::AgeTiered => {
                points.retain(|p| Self::age_tier_keeps(p.time, now_ms));
            }
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::FixedWindow { max_points: 20 }
    }
}

/// per-metric history, owned by a single writer
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    policy: RetentionPolicy,
    series: BTreeMap<Metric, VecDeque<HistoryPoint>>,
}

impl HistoryBuffer {
    pub fn new(policy: RetentionPolicy) -> Self {
        let series = Metric::ALL
            .iter()
            .map(|&m| (m, VecDeque::with_capacity(policy.max_len().min(256))))
            .collect();
        Self { policy, series }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// append one point per metric at `now_ms`, then prune
    ///
    /// a `now_ms` earlier than the newest point is clamped up to it.
    pub fn record(&mut self, snapshot: &SensorSnapshot, now_ms: u64) {
        for (&metric, points) in self.series.iter_mut() {
            let time = points.back().map_or(now_ms, |last| last.time.max(now_ms));
            points.push_back(HistoryPoint {
                time,
                value: snapshot.value(metric),
            });
            self.policy.prune(points, time);
        }
    }

    /// fill with `SEED_POINTS` jittered placeholder samples spaced a minute
    /// apart, the last one at `now_ms` rounded down to a 15s boundary
    pub fn seed_placeholder<R: Rng>(&mut self, now_ms: u64, rng: &mut R) {
        let base = SensorSnapshot::PLACEHOLDER;
        let last = now_ms - now_ms % SEED_ALIGN_MS;
        for i in (0..SEED_POINTS).rev() {
            let time = last.saturating_sub(i * 60_000);
            for (&metric, points) in self.series.iter_mut() {
                let spread = metric.seed_jitter();
                let value = base.value(metric) + rng.gen_range(-spread..=spread);
                if points.back().map_or(true, |last| last.time <= time) {
                    points.push_back(HistoryPoint { time, value });
                }
            }
        }
        for points in self.series.values_mut() {
            self.policy.prune(points, now_ms);
        }
    }

    #[cfg(test)]
    pub fn series(&self, metric: Metric) -> impl Iterator<Item = &HistoryPoint> + '_ {
        self.series.get(&metric).into_iter().flatten()
    }

    pub fn len(&self, metric: Metric) -> usize {
        self.series.get(&metric).map_or(0, VecDeque::len)
    }

    /// oldest and newest point time, if any
    pub fn time_range(&self, metric: Metric) -> Option<(u64, u64)> {
        let points = self.series.get(&metric)?;
        Some((points.front()?.time, points.back()?.time))
    }
}

impl Serialize for HistoryBuffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.series.serialize(serializer)
    }
}

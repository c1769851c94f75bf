//! Laser beam filtering.
//!
//! Turns a status-laser response into the beams worth using:
//!
//! ```text
//! { "lasers": [ { "beams": [ { "angle": 0.0, "dist": 1.2, "valid": true }, ... ] }, ... ] }
//! ```
//!
//! A beam survives when it carries numeric `angle` and `dist`, the device
//! marked it `valid`, and `range_min <= dist <= range_max`. Groups are
//! flattened in order, so output order is source order.

use serde::Serialize;
use serde_json::Value;

/// One measurement that passed the filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilteredPoint {
    /// Beam angle in radians
    pub angle: f32,
    /// Measured distance in meters
    pub distance: f32,
}

/// Configuration for beam filtering.
#[derive(Debug, Clone, Copy)]
pub struct BeamFilterConfig {
    /// Minimum accepted distance in meters.
    ///
    /// Default: 0.1m
    pub range_min: f64,

    /// Maximum accepted distance in meters.
    ///
    /// Default: 5.0m
    pub range_max: f64,
}

impl Default for BeamFilterConfig {
    fn default() -> Self {
        Self {
            range_min: 0.1,
            range_max: 5.0,
        }
    }
}

/// Why beams were dropped, counted per scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Beam groups seen
    pub groups: usize,
    /// Beams seen across all groups
    pub beams: usize,
    /// Missing or non-numeric `angle` / `dist`
    pub malformed: usize,
    /// `valid` absent or false
    pub invalid: usize,
    /// Distance outside the configured range
    pub out_of_range: usize,
}

impl FilterStats {
    pub fn dropped(&self) -> usize {
        self.malformed + self.invalid + self.out_of_range
    }
}

/// Result of filtering one laser response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredScan {
    pub points: Vec<FilteredPoint>,
    pub stats: FilterStats,
}

impl FilteredScan {
    /// True when the response had no beams, or none survived.
    ///
    /// This is a soft outcome: the caller decides whether to retry the scan.
    pub fn no_valid_data(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Range gating filter for laser responses.
#[derive(Debug, Clone)]
pub struct BeamFilter {
    config: BeamFilterConfig,
}

impl BeamFilter {
    pub fn new(config: BeamFilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BeamFilterConfig {
        &self.config
    }

    /// Check if a distance lies within the configured range (inclusive).
    ///
    /// Compared at full JSON precision, before narrowing to `f32`.
    #[inline]
    pub fn accepts(&self, distance: f64) -> bool {
        distance.is_finite() && distance >= self.config.range_min && distance <= self.config.range_max
    }

    /// Filter a decoded status-laser body.
    pub fn apply(&self, body: &Value) -> FilteredScan {
        let mut scan = FilteredScan::default();

        let groups = match body.get("lasers").and_then(Value::as_array) {
            Some(groups) if !groups.is_empty() => groups,
            _ => {
                log::warn!("Laser response has no beam groups (sensor blocked or not running?)");
                return scan;
            }
        };

        for group in groups {
            scan.stats.groups += 1;
            let Some(beams) = group.get("beams").and_then(Value::as_array) else {
                log::debug!("Beam group without beams: {}", group);
                continue;
            };

            for beam in beams {
                scan.stats.beams += 1;
                if let Some(point) = self.check_beam(beam, &mut scan.stats) {
                    scan.points.push(point);
                }
            }
        }

        if scan.stats.dropped() > 0 {
            log::warn!(
                "Dropped {} of {} beams ({} malformed, {} invalid, {} out of range)",
                scan.stats.dropped(),
                scan.stats.beams,
                scan.stats.malformed,
                scan.stats.invalid,
                scan.stats.out_of_range
            );
        }
        if scan.no_valid_data() {
            log::warn!("Laser response contained no valid beams");
        } else {
            log::debug!("Kept {} beams", scan.points.len());
        }

        scan
    }

    fn check_beam(&self, beam: &Value, stats: &mut FilterStats) -> Option<FilteredPoint> {
        let angle = beam.get("angle").and_then(Value::as_f64);
        let dist = beam.get("dist").and_then(Value::as_f64);
        let (Some(angle), Some(dist)) = (angle, dist) else {
            stats.malformed += 1;
            log::debug!("Skipping beam without numeric angle/dist: {}", beam);
            return None;
        };

        if !beam.get("valid").and_then(Value::as_bool).unwrap_or(false) {
            stats.invalid += 1;
            log::debug!("Skipping beam flagged invalid: angle={} dist={}", angle, dist);
            return None;
        }

        if !self.accepts(dist) {
            stats.out_of_range += 1;
            log::debug!("Skipping beam out of range: angle={} dist={}", angle, dist);
            return None;
        }

        Some(FilteredPoint {
            angle: angle as f32,
            distance: dist as f32,
        })
    }
}

impl Default for BeamFilter {
    fn default() -> Self {
        Self::new(BeamFilterConfig::default())
    }
}

/// Filter `body` with an inclusive `[range_min, range_max]` window.
pub fn filter(body: &Value, range_min: f64, range_max: f64) -> FilteredScan {
    BeamFilter::new(BeamFilterConfig {
        range_min,
        range_max,
    })
    .apply(body)
}

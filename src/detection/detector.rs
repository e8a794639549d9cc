//! Stop-line violation detection over tracked vehicles.

use std::collections::{HashMap, VecDeque};

use image::RgbImage;

use super::geometry::{BoundingBox, StopLine};
use super::tracker::TrackedVehicle;
use crate::video::annotate::{self, BLUE, GREEN, RED};

/// Anchor points kept per track.
const HISTORY_LEN: usize = 5;

/// A vehicle's anchor point at one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackPoint {
    pub frame_index: usize,
    pub anchor: (i32, i32),
}

/// A vehicle crossing the stop line on red.
#[derive(Debug, Clone)]
pub struct ViolationEvent {
    pub track_id: i64,
    pub bbox: BoundingBox,
    pub anchor: (i32, i32),
    pub frame_index: usize,
    /// The vehicle crop, handed to OCR.
    pub roi: RgbImage,
}

/// Result of running one frame through the detector.
#[derive(Debug)]
pub struct FrameOutcome {
    pub annotated: RgbImage,
    pub violation: Option<ViolationEvent>,
}

/// Keeps a short motion history per track and flags stop-line crossings.
#[derive(Debug, Default)]
pub struct RedLightDetector {
    history: HashMap<i64, VecDeque<TrackPoint>>,
}

impl RedLightDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recent anchor points for a track, oldest first.
    #[cfg(test)]
    pub fn history(&self, track_id: i64) -> Option<&VecDeque<TrackPoint>> {
        self.history.get(&track_id)
    }

    fn record(&mut self, track_id: i64, point: TrackPoint) {
        let points = self.history.entry(track_id).or_default();
        points.push_back(point);
        if points.len() > HISTORY_LEN {
            points.pop_front();
        }
    }

    /// Whether the track's latest move crossed the stop line.
    ///
    /// Needs at least two points of history.
    pub fn check_violation(&self, track_id: i64, stop_line: &StopLine) -> bool {
        let Some(points) = self.history.get(&track_id) else {
            return false;
        };
        if points.len() < 2 {
            return false;
        }

        let current = points[points.len() - 1].anchor;
        let previous = points[points.len() - 2].anchor;
        stop_line.is_crossed(previous.1, current.1)
    }

    /// Update tracks for one frame and check for a crossing.
    ///
    /// Every vehicle's history is updated. Only the first vehicle found
    /// crossing while red is reported.
    pub fn process_frame(
        &mut self,
        frame: &RgbImage,
        frame_index: usize,
        stop_line: &StopLine,
        is_red: bool,
        vehicles: &[TrackedVehicle],
    ) -> FrameOutcome {
        let mut annotated = frame.clone();
        let mut violation = None;

        for vehicle in vehicles {
            let anchor = vehicle.bbox.anchor();
            self.record(
                vehicle.track_id,
                TrackPoint {
                    frame_index,
                    anchor,
                },
            );

            if is_red && violation.is_none() && self.check_violation(vehicle.track_id, stop_line)
            {
                let (x, y, w, h) = vehicle.bbox.clamped(frame.width(), frame.height());
                let roi = image::imageops::crop_imm(frame, x, y, w, h).to_image();

                tracing::debug!(
                    "VIOLATION track {} at frame {} anchor {:?}",
                    vehicle.track_id,
                    frame_index,
                    anchor
                );
                annotate::draw_box(&mut annotated, &vehicle.bbox, RED, 3);
                violation = Some(ViolationEvent {
                    track_id: vehicle.track_id,
                    bbox: vehicle.bbox,
                    anchor,
                    frame_index,
                    roi,
                });
                continue;
            }

            let color = if is_red { GREEN } else { BLUE };
            annotate::draw_box(&mut annotated, &vehicle.bbox, color, 2);
        }

        annotate::draw_stop_line(&mut annotated, stop_line, is_red);

        FrameOutcome {
            annotated,
            violation,
        }
    }
}

//! Tracked vehicle input.
//!
//! Detection and multi-object tracking are performed by an external model
//! (a YOLO detector with a ByteTrack/BoT-SORT style tracker). Its output is
//! consumed frame by frame through [`VehicleTracker`].

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::geometry::BoundingBox;
use crate::error::PipelineError;

/// COCO class ids treated as vehicles: car, motorbike, bus, truck.
pub const VEHICLE_CLASS_IDS: [u32; 4] = [2, 3, 5, 7];

/// One tracked vehicle in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TrackedVehicle {
    pub track_id: i64,
    pub class_id: u32,
    pub bbox: BoundingBox,
}

impl TrackedVehicle {
    pub fn is_vehicle(&self) -> bool {
        VEHICLE_CLASS_IDS.contains(&self.class_id)
    }
}

/// Source of tracked vehicles for each frame.
pub trait VehicleTracker {
    /// Vehicles visible in `frame_index`, in detection order.
    fn track(&mut self, frame_index: usize) -> Vec<TrackedVehicle>;
}

#[derive(Debug, Deserialize)]
struct TrackLine {
    frame: usize,
    #[serde(default)]
    detections: Vec<TrackedVehicle>,
}

/// Tracks read from a JSON-lines file, one object per frame:
///
/// ```json
/// {"frame": 12, "detections": [{"track_id": 4, "class_id": 2, "bbox": [100, 80, 260, 240]}]}
/// ```
///
/// Non-vehicle classes are dropped on load. Frames missing from the file have
/// no detections.
#[derive(Debug, Default)]
pub struct TrackFile {
    frames: HashMap<usize, Vec<TrackedVehicle>>,
}

impl TrackFile {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let tracks = Self::parse(&raw).map_err(|(line, reason)| PipelineError::TrackFile {
            path: path.display().to_string(),
            line,
            reason,
        })?;

        tracing::info!(
            "Loaded tracks for {} frames from {}",
            tracks.frames.len(),
            path.display()
        );
        Ok(tracks)
    }

    fn parse(raw: &str) -> Result<Self, (usize, String)> {
        let mut frames: HashMap<usize, Vec<TrackedVehicle>> = HashMap::new();

        for (n, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed: TrackLine =
                serde_json::from_str(line).map_err(|e| (n + 1, e.to_string()))?;
            frames
                .entry(parsed.frame)
                .or_default()
                .extend(parsed.detections.into_iter().filter(TrackedVehicle::is_vehicle));
        }

        Ok(Self { frames })
    }
}

impl VehicleTracker for TrackFile {
    fn track(&mut self, frame_index: usize) -> Vec<TrackedVehicle> {
        self.frames.remove(&frame_index).unwrap_or_default()
    }
}

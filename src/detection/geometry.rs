//! Stop line and bounding box primitives.

use std::str::FromStr;

use serde::Deserialize;

use crate::error::PipelineError;

/// The stop line painted across the approach, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopLine {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl StopLine {
    /// Mean y of the two endpoints.
    ///
    /// Stop lines are treated as roughly horizontal, with y growing toward
    /// the intersection.
    pub fn mean_y(&self) -> f64 {
        (self.y1 as f64 + self.y2 as f64) / 2.0
    }

    /// Whether an anchor moving from `prev_y` to `cur_y` just crossed the line.
    pub fn is_crossed(&self, prev_y: i32, cur_y: i32) -> bool {
        let line_y = self.mean_y();
        (prev_y as f64) <= line_y && (cur_y as f64) > line_y
    }
}

impl FromStr for StopLine {
    type Err = PipelineError;

    /// Parse `"x1,y1,x2,y2"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: String| PipelineError::StopLine {
            input: s.to_string(),
            reason,
        };

        let coords = s
            .split(',')
            .map(|c| c.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| fail(e.to_string()))?;

        match coords.as_slice() {
            &[x1, y1, x2, y2] => Ok(Self { x1, y1, x2, y2 }),
            _ => Err(fail(format!(
                "stop line must have 4 coordinates (x1,y1,x2,y2), got {}",
                coords.len()
            ))),
        }
    }
}

/// Axis-aligned box in `[x1, y1, x2, y2]` pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "[i32; 4]")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl From<[i32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [i32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl BoundingBox {
    /// Bottom-centre point, the part of the vehicle that meets the road.
    pub fn anchor(&self) -> (i32, i32) {
        ((self.x1 + self.x2).div_euclid(2), self.y2)
    }

    /// Clamp to a `width` x `height` frame, returning `(x, y, w, h)`.
    ///
    /// Boxes entirely outside the frame come back with zero size.
    pub fn clamped(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let clamp = |v: i32, max: u32| v.clamp(0, max as i32) as u32;
        let (x1, x2) = (clamp(self.x1.min(self.x2), width), clamp(self.x1.max(self.x2), width));
        let (y1, y2) = (clamp(self.y1.min(self.y2), height), clamp(self.y1.max(self.y2), height));
        (x1, y1, x2 - x1, y2 - y1)
    }
}

//! Drawing helpers for annotated frames.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::detection::geometry::{BoundingBox, StopLine};

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

/// Draw a box outline `thickness` pixels wide, growing outward.
pub fn draw_box(frame: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    let x = bbox.x1.min(bbox.x2);
    let y = bbox.y1.min(bbox.y2);
    let w = bbox.x1.abs_diff(bbox.x2);
    let h = bbox.y1.abs_diff(bbox.y2);
    if w == 0 || h == 0 {
        return;
    }

    for t in 0..thickness {
        let rect = Rect::at(x - t as i32, y - t as i32).of_size(w + 2 * t, h + 2 * t);
        draw_hollow_rect_mut(frame, rect, color);
    }
}

/// Draw the stop line, red while the signal is red and yellow otherwise.
pub fn draw_stop_line(frame: &mut RgbImage, line: &StopLine, is_red: bool) {
    let color = if is_red { RED } else { YELLOW };
    for dy in -1i32..=1 {
        draw_line_segment_mut(
            frame,
            (line.x1 as f32, (line.y1 + dy) as f32),
            (line.x2 as f32, (line.y2 + dy) as f32),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_outline_is_drawn_outward() {
        let mut frame = RgbImage::new(50, 50);
        draw_box(&mut frame, &BoundingBox::from([10, 10, 20, 20]), RED, 2);

        assert_eq!(*frame.get_pixel(10, 10), RED);
        assert_eq!(*frame.get_pixel(9, 9), RED);
        assert_eq!(*frame.get_pixel(15, 15), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(8, 8), Rgb([0, 0, 0]));
    }

    #[test]
    fn degenerate_box_is_skipped() {
        let mut frame = RgbImage::new(10, 10);
        draw_box(&mut frame, &BoundingBox::from([5, 5, 5, 9]), GREEN, 1);
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn stop_line_colour_follows_signal() {
        let line = StopLine {
            x1: 0,
            y1: 5,
            x2: 9,
            y2: 5,
        };

        let mut red = RgbImage::new(10, 10);
        draw_stop_line(&mut red, &line, true);
        assert_eq!(*red.get_pixel(4, 5), RED);
        assert_eq!(*red.get_pixel(4, 4), RED);

        let mut green = RgbImage::new(10, 10);
        draw_stop_line(&mut green, &line, false);
        assert_eq!(*green.get_pixel(4, 6), YELLOW);
    }
}

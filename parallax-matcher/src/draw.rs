//! Match visualization
//!
//! Composes a rendering of matched keypoints for eyeballing matcher output.
//! Purely presentational; no matching decision depends on anything here.

use std::str::FromStr;

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::frame::Frame;
use crate::matcher::FeaturePair;
use crate::MatchError;

const MARKER_RADIUS: i32 = 4;
const COLOR_FRAME1: Rgb<u8> = Rgb([64, 128, 255]);
const COLOR_FRAME2: Rgb<u8> = Rgb([255, 64, 64]);
const COLOR_LINK: Rgb<u8> = Rgb([64, 220, 64]);

/// How matched keypoints are composed into an output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawLayout {
    /// Both frames next to each other with link lines between matches
    SideBySide,
    /// Both endpoints of every match drawn onto the second frame's image,
    /// connected by a motion line
    Overlay,
}

impl FromStr for DrawLayout {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "side-by-side" | "sidebyside" => Ok(Self::SideBySide),
            "overlay" => Ok(Self::Overlay),
            other => Err(MatchError::UnknownDrawLayout(other.to_string())),
        }
    }
}

/// Render matched keypoints of two frames with the requested layout.
pub fn draw_matches(
    frame1: &Frame,
    frame2: &Frame,
    pairs: &[FeaturePair],
    layout: DrawLayout,
) -> RgbImage {
    match layout {
        DrawLayout::SideBySide => side_by_side(frame1, frame2, pairs),
        DrawLayout::Overlay => overlay(frame2, pairs),
    }
}

fn blit_gray(canvas: &mut RgbImage, source: &GrayImage, x_offset: u32) {
    for (x, y, pixel) in source.enumerate_pixels() {
        let v = pixel.0[0];
        canvas.put_pixel(x + x_offset, y, Rgb([v, v, v]));
    }
}

fn side_by_side(frame1: &Frame, frame2: &Frame, pairs: &[FeaturePair]) -> RgbImage {
    let (w1, h1) = frame1.image.dimensions();
    let (w2, h2) = frame2.image.dimensions();

    let mut canvas = RgbImage::new(w1 + w2, h1.max(h2));
    blit_gray(&mut canvas, &frame1.image, 0);
    blit_gray(&mut canvas, &frame2.image, w1);

    for pair in pairs {
        let p1 = (pair.point1.x as f32, pair.point1.y as f32);
        let p2 = (pair.point2.x as f32 + w1 as f32, pair.point2.y as f32);

        draw_line_segment_mut(&mut canvas, p1, p2, COLOR_LINK);
        draw_hollow_circle_mut(
            &mut canvas,
            (p1.0 as i32, p1.1 as i32),
            MARKER_RADIUS,
            COLOR_FRAME1,
        );
        draw_hollow_circle_mut(
            &mut canvas,
            (p2.0 as i32, p2.1 as i32),
            MARKER_RADIUS,
            COLOR_FRAME2,
        );
    }

    canvas
}

fn overlay(frame2: &Frame, pairs: &[FeaturePair]) -> RgbImage {
    let (w2, h2) = frame2.image.dimensions();

    let mut canvas = RgbImage::new(w2, h2);
    blit_gray(&mut canvas, &frame2.image, 0);

    for pair in pairs {
        let p1 = (pair.point1.x as f32, pair.point1.y as f32);
        let p2 = (pair.point2.x as f32, pair.point2.y as f32);

        draw_line_segment_mut(&mut canvas, p1, p2, COLOR_LINK);
        draw_hollow_circle_mut(
            &mut canvas,
            (p1.0 as i32, p1.1 as i32),
            MARKER_RADIUS,
            COLOR_FRAME1,
        );
        draw_hollow_circle_mut(
            &mut canvas,
            (p2.0 as i32, p2.1 as i32),
            MARKER_RADIUS,
            COLOR_FRAME2,
        );
    }

    canvas
}

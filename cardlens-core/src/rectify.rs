//! Card boundary detection and perspective rectification.
//!
//! Turns a raw camera or scanner frame into a canonical top-down card image
//! suitable for fingerprinting. Processing is stateless per frame:
//! preprocess, detect the card quadrilateral, order its corners, then warp it
//! onto a fixed portrait rectangle. Every stage can bail out with `None`; a
//! miss means "skip this frame", never a failure of the session.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use tracing::debug;

/// Canonical rectified card width in pixels.
pub const CARD_WIDTH: u32 = 300;
/// Canonical rectified card height in pixels (3:4 portrait).
pub const CARD_HEIGHT: u32 = 400;

/// Gaussian smoothing applied before edge detection.
const BLUR_SIGMA: f32 = 2.0;
/// Canny hysteresis thresholds.
const CANNY_LOW: f32 = 30.0;
const CANNY_HIGH: f32 = 150.0;
/// Polygon approximation tolerance, as a fraction of the contour perimeter.
const APPROX_EPSILON: f64 = 0.02;

/// Stateless frame-to-card rectifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameRectifier;

impl FrameRectifier {
    pub fn new() -> Self {
        Self
    }

    /// Run the full pipeline on one frame.
    ///
    /// Returns the canonical grayscale card image, or `None` when no card
    /// boundary could be found or the detected quadrilateral is degenerate.
    pub fn rectify(&self, frame: &DynamicImage) -> Option<DynamicImage> {
        let gray = self.preprocess(frame);
        let quad = self.detect_boundary(&gray)?;
        self.warp(&gray, quad)
    }

    /// Convert to single-channel intensity and suppress sensor noise.
    pub fn preprocess(&self, frame: &DynamicImage) -> GrayImage {
        gaussian_blur_f32(&frame.to_luma8(), BLUR_SIGMA)
    }

    /// Locate the card's quadrilateral boundary in a preprocessed frame.
    ///
    /// Extracts edges, takes the outer contour with the largest enclosed
    /// area, and approximates it to a polygon with a tolerance of ~2% of its
    /// perimeter. Anything but exactly four vertices is a miss.
    pub fn detect_boundary(&self, gray: &GrayImage) -> Option<[Point<i32>; 4]> {
        let edged = canny(gray, CANNY_LOW, CANNY_HIGH);

        let contours = find_contours::<i32>(&edged);
        let largest = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .map(|c| &c.points)
            .max_by(|a, b| contour_area(a).total_cmp(&contour_area(b)))?;

        let perimeter = arc_length(largest, true);
        let approx = approximate_polygon_dp(largest, APPROX_EPSILON * perimeter, true);

        if approx.len() != 4 {
            debug!(
                vertices = approx.len(),
                "card contour is not a quadrilateral"
            );
            return None;
        }

        Some([approx[0], approx[1], approx[2], approx[3]])
    }

    /// Perspective-warp the detected quadrilateral onto the canonical
    /// [`CARD_WIDTH`]x[`CARD_HEIGHT`] rectangle.
    ///
    /// Corners may arrive in any order; they are mapped deterministically to
    /// (top-left, top-right, bottom-right, bottom-left) first, since the
    /// projection needs a consistent vertex-to-corner correspondence.
    pub fn warp(&self, gray: &GrayImage, quad: [Point<i32>; 4]) -> Option<DynamicImage> {
        let src = order_corners(quad);
        let dst: [(f32, f32); 4] = [
            (0.0, 0.0),
            ((CARD_WIDTH - 1) as f32, 0.0),
            ((CARD_WIDTH - 1) as f32, (CARD_HEIGHT - 1) as f32),
            (0.0, (CARD_HEIGHT - 1) as f32),
        ];

        let projection = match Projection::from_control_points(src, dst) {
            Some(p) => p,
            None => {
                debug!("degenerate quadrilateral, cannot compute projection");
                return None;
            }
        };

        let mut warped = GrayImage::new(CARD_WIDTH, CARD_HEIGHT);
        warp_into(
            gray,
            &projection,
            Interpolation::Bilinear,
            Luma([0u8]),
            &mut warped,
        );

        Some(DynamicImage::ImageLuma8(warped))
    }
}

/// Order four vertices as (top-left, top-right, bottom-right, bottom-left).
///
/// Top-left minimizes x+y, bottom-right maximizes x+y, top-right maximizes
/// x−y, bottom-left minimizes x−y.
fn order_corners(quad: [Point<i32>; 4]) -> [(f32, f32); 4] {
    let as_tuple = |p: &Point<i32>| (p.x as f32, p.y as f32);

    let top_left = quad
        .iter()
        .min_by_key(|p| p.x + p.y)
        .expect("quad has four vertices");
    let bottom_right = quad
        .iter()
        .max_by_key(|p| p.x + p.y)
        .expect("quad has four vertices");
    let top_right = quad
        .iter()
        .max_by_key(|p| p.x - p.y)
        .expect("quad has four vertices");
    let bottom_left = quad
        .iter()
        .min_by_key(|p| p.x - p.y)
        .expect("quad has four vertices");

    [
        as_tuple(top_left),
        as_tuple(top_right),
        as_tuple(bottom_right),
        as_tuple(bottom_left),
    ]
}

/// Enclosed area of a closed contour via the shoelace formula.
fn contour_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x as f64 * points[j].y as f64;
        area -= points[j].x as f64 * points[i].y as f64;
    }
    area.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: i32, y: i32) -> Point<i32> {
        Point::new(x, y)
    }

    #[test]
    fn order_corners_axis_aligned() {
        // Shuffled input; the ordering must not depend on input order.
        let quad = [pt(100, 140), pt(0, 0), pt(0, 140), pt(100, 0)];
        let ordered = order_corners(quad);
        assert_eq!(ordered[0], (0.0, 0.0)); // top-left
        assert_eq!(ordered[1], (100.0, 0.0)); // top-right
        assert_eq!(ordered[2], (100.0, 140.0)); // bottom-right
        assert_eq!(ordered[3], (0.0, 140.0)); // bottom-left
    }

    #[test]
    fn order_corners_skewed() {
        let quad = [pt(90, 15), pt(12, 130), pt(105, 120), pt(10, 10)];
        let ordered = order_corners(quad);
        assert_eq!(ordered[0], (10.0, 10.0));
        assert_eq!(ordered[1], (90.0, 15.0));
        assert_eq!(ordered[2], (105.0, 120.0));
        assert_eq!(ordered[3], (12.0, 130.0));
    }

    #[test]
    fn contour_area_rectangle() {
        let points = [pt(0, 0), pt(10, 0), pt(10, 5), pt(0, 5)];
        assert!((contour_area(&points) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn blank_frame_has_no_boundary() {
        // A uniform frame produces no edges, hence no contours.
        let frame = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 300, Luma([128u8])));
        let rectifier = FrameRectifier::new();
        assert!(rectifier.rectify(&frame).is_none());
    }

    #[test]
    fn axis_aligned_quad_warps_to_canonical_size() {
        // White card region covering (0,0)..(100,140) on a larger dark frame.
        let mut gray = GrayImage::from_pixel(200, 200, Luma([0u8]));
        for y in 0..=140 {
            for x in 0..=100 {
                gray.put_pixel(x, y, Luma([255u8]));
            }
        }

        let rectifier = FrameRectifier::new();
        let quad = [pt(0, 0), pt(100, 0), pt(100, 140), pt(0, 140)];
        let warped = rectifier.warp(&gray, quad).expect("projection exists");

        assert_eq!(warped.width(), CARD_WIDTH);
        assert_eq!(warped.height(), CARD_HEIGHT);

        // An axis-aligned source rectangle should map with negligible
        // distortion: interior samples stay white.
        let out = warped.to_luma8();
        assert_eq!(out.get_pixel(CARD_WIDTH / 2, CARD_HEIGHT / 2).0[0], 255);
        assert_eq!(out.get_pixel(20, 20).0[0], 255);
        assert_eq!(out.get_pixel(CARD_WIDTH - 20, CARD_HEIGHT - 20).0[0], 255);
    }

    #[test]
    fn degenerate_quad_yields_none() {
        let gray = GrayImage::from_pixel(100, 100, Luma([200u8]));
        let rectifier = FrameRectifier::new();
        // All four points collinear: no projective transform exists.
        let quad = [pt(0, 0), pt(25, 25), pt(50, 50), pt(100, 100)];
        assert!(rectifier.warp(&gray, quad).is_none());
    }

    #[test]
    fn synthetic_card_frame_detects_or_skips_cleanly() {
        // A bright inset rectangle on a dark background. Whether or not edge
        // detection recovers a clean quadrilateral, the pipeline must not
        // panic and any produced image must be canonical-sized.
        let mut gray = GrayImage::from_pixel(240, 280, Luma([20u8]));
        for y in 50..190 {
            for x in 40..160 {
                gray.put_pixel(x, y, Luma([235u8]));
            }
        }

        let rectifier = FrameRectifier::new();
        if let Some(card) = rectifier.rectify(&DynamicImage::ImageLuma8(gray)) {
            assert_eq!(card.width(), CARD_WIDTH);
            assert_eq!(card.height(), CARD_HEIGHT);
        }
    }
}

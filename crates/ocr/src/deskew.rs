use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DeskewError {
    #[error("Deskew unavailable: {0}")]
    Unavailable(String),
}

/// Tuning for skew estimation. The defaults are the fixed values the
/// rectifier was calibrated with; the edge detector uses a 3×3 Sobel
/// aperture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskewConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Accumulator votes a Hough line needs.
    pub vote_threshold: u32,
    pub suppression_radius: u32,
    /// Shortest edge run, in pixels, counted as a baseline segment.
    pub min_segment_length: u32,
    /// Longest run of missing edge pixels bridged inside one segment.
    pub max_gap: u32,
    /// Segments steeper than this are structural lines, not text.
    pub max_angle_degrees: f32,
    /// Skew below this is left alone.
    pub min_correction_degrees: f32,
    /// Colour of the border exposed by rotation.
    pub fill: [u8; 3],
}

impl Default for DeskewConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            vote_threshold: 100,
            suppression_radius: 8,
            min_segment_length: 100,
            max_gap: 10,
            max_angle_degrees: 45.0,
            min_correction_degrees: 0.1,
            fill: [255, 255, 255],
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeskewOutcome {
    /// Bit-identical to the input when `changed` is false.
    pub image: DynamicImage,
    pub changed: bool,
    /// Median baseline angle in degrees, positive when text runs downhill
    /// to the right. `None` when no baseline segment survived.
    pub skew_degrees: Option<f32>,
}

/// Estimates the skew of a roughly upright page and rotates it level.
///
/// The rotated page is centered on a canvas large enough to hold all of it.
/// A rotated result is always RGB.
pub fn deskew(image: &DynamicImage, config: &DeskewConfig) -> Result<DeskewOutcome, DeskewError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(DeskewError::Unavailable("image has no pixels".into()));
    }
    let angles = baseline_angles(&image.to_luma8(), config);
    debug!(segments = angles.len(), "baseline segments detected");
    level(image, &angles, config)
}

/// Like [`deskew`], but never fails: on error the original image comes back
/// unchanged alongside the error for display.
pub fn deskew_or_keep(
    image: DynamicImage,
    config: &DeskewConfig,
) -> (DeskewOutcome, Option<DeskewError>) {
    match deskew(&image, config) {
        Ok(outcome) => (outcome, None),
        Err(e) => {
            warn!("keeping original image: {e}");
            (DeskewOutcome { image, changed: false, skew_degrees: None }, Some(e))
        }
    }
}

/// Median angle of the baseline segments found in `gray`, if any.
pub fn estimate_skew(gray: &GrayImage, config: &DeskewConfig) -> Option<f32> {
    median(&baseline_angles(gray, config))
}

fn level(
    image: &DynamicImage,
    angles: &[f32],
    config: &DeskewConfig,
) -> Result<DeskewOutcome, DeskewError> {
    let unchanged = |skew| DeskewOutcome { image: image.clone(), changed: false, skew_degrees: skew };

    let Some(skew) = median(angles) else {
        return Ok(unchanged(None));
    };
    if !skew.is_finite() {
        return Err(DeskewError::Unavailable(format!("skew estimate is {skew}")));
    }
    if skew.abs() < config.min_correction_degrees {
        debug!(skew, "already level");
        return Ok(unchanged(Some(skew)));
    }

    let rotated = rotate_expanded(&image.to_rgb8(), -skew.to_radians(), Rgb(config.fill))?;
    info!(
        skew,
        width = rotated.width(),
        height = rotated.height(),
        "deskewed"
    );
    Ok(DeskewOutcome {
        image: DynamicImage::ImageRgb8(rotated),
        changed: true,
        skew_degrees: Some(skew),
    })
}

/// Rotates by `theta` radians (clockwise in image coordinates) about the
/// center, onto a canvas sized to the rotated bounding box.
fn rotate_expanded(rgb: &RgbImage, theta: f32, fill: Rgb<u8>) -> Result<RgbImage, DeskewError> {
    let (w, h) = (rgb.width() as f32, rgb.height() as f32);
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let new_w = (w * cos + h * sin).ceil().max(w);
    let new_h = (w * sin + h * cos).ceil().max(h);

    let too_big = || DeskewError::Unavailable(format!("rotated canvas {new_w}x{new_h} too large"));
    if !(new_w.is_finite() && new_h.is_finite()) || new_w > u32::MAX as f32 || new_h > u32::MAX as f32 {
        return Err(too_big());
    }
    let (out_w, out_h) = (new_w as u32, new_h as u32);
    (out_w as usize)
        .checked_mul(out_h as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(too_big)?;

    let projection = Projection::translate(new_w / 2.0, new_h / 2.0)
        * Projection::rotate(theta)
        * Projection::translate(-w / 2.0, -h / 2.0);
    let mut out = RgbImage::from_pixel(out_w, out_h, fill);
    warp_into(rgb, &projection, Interpolation::Bicubic, fill, &mut out);
    Ok(out)
}

/// Angles, in degrees from horizontal, of the line segments that can be
/// text baselines.
fn baseline_angles(gray: &GrayImage, config: &DeskewConfig) -> Vec<f32> {
    if gray.width() < 3 || gray.height() < 3 {
        return Vec::new();
    }
    let edges = canny(gray, config.canny_low, config.canny_high);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: config.vote_threshold,
            suppression_radius: config.suppression_radius,
        },
    );
    debug!(lines = lines.len(), "hough lines detected");

    lines
        .iter()
        .flat_map(|line| segment_angles(&edges, line, config))
        .filter(|a| a.abs() <= config.max_angle_degrees)
        .collect()
}

/// Walks `line` across the edge map and splits the edge pixels along it
/// into segments at gaps wider than `max_gap`. Returns one angle per
/// segment at least `min_segment_length` long.
fn segment_angles(edges: &GrayImage, line: &PolarLine, config: &DeskewConfig) -> Vec<f32> {
    let (w, h) = (edges.width() as f32, edges.height() as f32);
    let theta = (line.angle_in_degrees as f32).to_radians();
    let (sin, cos) = theta.sin_cos();
    // Points on the line satisfy x·cosθ + y·sinθ = r.
    let (ox, oy) = (line.r * cos, line.r * sin);
    let (dx, dy) = (sin, -cos);
    let reach = (w * w + h * h).sqrt().ceil() as i32;

    let edge_at = |x: f32, y: f32| -> Option<(f32, f32)> {
        let (x, y) = (x.round(), y.round());
        if x < 0.0 || y < 0.0 || x >= w || y >= h {
            return None;
        }
        (edges.get_pixel(x as u32, y as u32)[0] > 0).then_some((x, y))
    };

    let mut angles = Vec::new();
    let mut run: Vec<(f32, f32)> = Vec::new();
    let mut last_step: Option<i32> = None;
    for step in -reach..=reach {
        let t = step as f32;
        let (px, py) = (ox + t * dx, oy + t * dy);
        // Tolerate one pixel of jitter either side of the ideal line.
        let Some(hit) = [0.0f32, -1.0, 1.0]
            .iter()
            .find_map(|k| edge_at(px + k * cos, py + k * sin))
        else {
            continue;
        };
        if last_step.is_some_and(|prev| step - prev > config.max_gap as i32) {
            angles.extend(run_angle(&run, config.min_segment_length as f32));
            run.clear();
        }
        run.push(hit);
        last_step = Some(step);
    }
    angles.extend(run_angle(&run, config.min_segment_length as f32));
    angles
}

/// Angle of one run of edge pixels, normalized to (-90, 90]. Near-horizontal
/// runs are refined with a least-squares fit.
fn run_angle(run: &[(f32, f32)], min_len: f32) -> Option<f32> {
    let (&(x0, y0), &(x1, y1)) = (run.first()?, run.last()?);
    if ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt() < min_len {
        return None;
    }
    let mut angle = (y1 - y0).atan2(x1 - x0).to_degrees();
    if angle > 90.0 {
        angle -= 180.0;
    } else if angle <= -90.0 {
        angle += 180.0;
    }
    if angle.abs() > 45.0 {
        return Some(angle);
    }

    let n = run.len() as f32;
    let mean_x = run.iter().map(|p| p.0).sum::<f32>() / n;
    let mean_y = run.iter().map(|p| p.1).sum::<f32>() / n;
    let (sxx, sxy) = run.iter().fold((0.0f32, 0.0f32), |(sxx, sxy), &(x, y)| {
        (sxx + (x - mean_x).powi(2), sxy + (x - mean_x) * (y - mean_y))
    });
    if sxx > 0.0 {
        angle = (sxy / sxx).atan().to_degrees();
    }
    Some(angle)
}

fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

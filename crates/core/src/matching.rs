//! Zero-mean normalised cross correlation over grayscale frames.

use crate::error::{CoreError, CoreResult};
use crate::platform::{MatchScore, Matcher};
use crate::types::{Frame, Point};

/// Per-pixel variance below which a window counts as flat.
const FLAT_EPSILON: f64 = 1e-6;

/// Exhaustive ZNCC matcher. Negative correlation is reported as 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct NccMatcher;

fn to_gray(frame: &Frame) -> Vec<f64> {
    let mut out = Vec::with_capacity((frame.width * frame.height) as usize);
    for y in 0..frame.height {
        for x in 0..frame.width {
            out.push(frame.luma(x, y));
        }
    }
    out
}

/// Summed-area table with one row/column of zero padding.
struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl Integral {
    fn new(gray: &[f64], width: usize, height: usize) -> Self {
        let stride = width + 1;
        let mut sum = vec![0.0; stride * (height + 1)];
        let mut sum_sq = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let (mut row, mut row_sq) = (0.0, 0.0);
            for x in 0..width {
                let v = gray[y * width + x];
                row += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row;
                sum_sq[i] = sum_sq[i - stride] + row_sq;
            }
        }
        Self { stride, sum, sum_sq }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let s = self.stride;
        let at = |t: &[f64], x: usize, y: usize| t[y * s + x];
        let area = |t: &[f64]| at(t, x + w, y + h) - at(t, x, y + h) - at(t, x + w, y) + at(t, x, y);
        (area(&self.sum), area(&self.sum_sq))
    }
}

impl Matcher for NccMatcher {
    fn best_match(&self, frame: &Frame, reference: &Frame) -> CoreResult<MatchScore> {
        let (fw, fh) = (frame.width as usize, frame.height as usize);
        let (tw, th) = (reference.width as usize, reference.height as usize);
        if tw == 0 || th == 0 {
            return Err(CoreError::Capture("reference image is empty".into()));
        }
        if tw > fw || th > fh {
            return Err(CoreError::Capture(format!(
                "reference {}x{} is larger than the search area {}x{}",
                tw, th, fw, fh
            )));
        }

        let image = to_gray(frame);
        let template = to_gray(reference);
        let n = (tw * th) as f64;
        let t_mean = template.iter().sum::<f64>() / n;
        let centered: Vec<f64> = template.iter().map(|v| v - t_mean).collect();
        let t_var: f64 = centered.iter().map(|v| v * v).sum();
        let flat_limit = FLAT_EPSILON * n;
        let t_flat = t_var < flat_limit;
        let integral = Integral::new(&image, fw, fh);

        let mut best = MatchScore { score: -1.0, location: Point::default() };
        for y in 0..=(fh - th) {
            for x in 0..=(fw - tw) {
                let (sum, sum_sq) = integral.window(x, y, tw, th);
                let w_var = (sum_sq - sum * sum / n).max(0.0);

                let score = if t_flat || w_var < flat_limit {
                    let both_flat = t_flat && w_var < flat_limit;
                    if both_flat && (sum / n - t_mean).abs() < 0.5 { 1.0 } else { 0.0 }
                } else {
                    let mut num = 0.0;
                    for ty in 0..th {
                        let row = (y + ty) * fw + x;
                        let trow = ty * tw;
                        for tx in 0..tw {
                            num += centered[trow + tx] * image[row + tx];
                        }
                    }
                    (num / (t_var * w_var).sqrt()).clamp(0.0, 1.0)
                };

                if score > best.score {
                    best = MatchScore { score, location: Point::new(x as i32, y as i32) };
                }
            }
        }
        Ok(best)
    }
}

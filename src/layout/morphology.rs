//! Binary image operations used by the raster detectors.
//!
//! Ink is foreground. Structuring elements are axis-aligned rectangles, which
//! are separable, so every operation runs as a horizontal pass followed by a
//! vertical pass of sliding-window counts.

use crate::config::Binarization;
use image::GrayImage;

/// A binarized image: `true` marks an ink pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl BinaryMask {
    /// Create an all-background mask.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    /// Mask width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Mask height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// True when the mask has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Read a pixel.
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x]
    }

    /// Write a pixel.
    pub fn set(&mut self, x: usize, y: usize, ink: bool) {
        self.data[y * self.width + x] = ink;
    }

    /// Fill an axis-aligned block with ink, clipped to the mask.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize) {
        for yy in y..(y + h).min(self.height) {
            for xx in x..(x + w).min(self.width) {
                self.set(xx, yy, true);
            }
        }
    }

    /// Copy out a sub-rectangle, clipped to the mask.
    pub fn crop(&self, x: usize, y: usize, w: usize, h: usize) -> BinaryMask {
        let x0 = x.min(self.width);
        let y0 = y.min(self.height);
        let x1 = (x + w).min(self.width);
        let y1 = (y + h).min(self.height);
        let mut out = BinaryMask::new(x1 - x0, y1 - y0);
        for yy in y0..y1 {
            let src = &self.data[yy * self.width + x0..yy * self.width + x1];
            let start = (yy - y0) * out.width;
            out.data[start..start + src.len()].copy_from_slice(src);
        }
        out
    }

    /// Number of ink pixels.
    pub fn ink_count(&self) -> usize {
        self.data.iter().filter(|&&p| p).count()
    }

    /// Ink count of every pixel column (vertical projection).
    pub fn column_sums(&self) -> Vec<u32> {
        let mut sums = vec![0u32; self.width];
        for row in self.data.chunks(self.width.max(1)) {
            for (sum, &p) in sums.iter_mut().zip(row) {
                *sum += p as u32;
            }
        }
        sums
    }

    /// Ink count of every pixel row (horizontal projection).
    pub fn row_sums(&self) -> Vec<u32> {
        if self.width == 0 {
            return vec![0; self.height];
        }
        self.data
            .chunks(self.width)
            .map(|row| row.iter().filter(|&&p| p).count() as u32)
            .collect()
    }

    /// Erosion with a `kw` x `kh` rectangle.
    pub fn erode(&self, kw: usize, kh: usize) -> BinaryMask {
        self.separable(kw, kh, Pass::Erode)
    }

    /// Dilation with a `kw` x `kh` rectangle.
    pub fn dilate(&self, kw: usize, kh: usize) -> BinaryMask {
        self.separable(kw, kh, Pass::Dilate)
    }

    /// Opening: removes ink structures that cannot contain the rectangle.
    pub fn open(&self, kw: usize, kh: usize) -> BinaryMask {
        self.erode(kw, kh).dilate(kw, kh)
    }

    /// Closing: bridges gaps narrower than the rectangle.
    pub fn close(&self, kw: usize, kh: usize) -> BinaryMask {
        self.dilate(kw, kh).erode(kw, kh)
    }

    fn separable(&self, kw: usize, kh: usize, pass: Pass) -> BinaryMask {
        if self.is_empty() {
            return self.clone();
        }
        let mut out = self.clone();
        if kw > 1 {
            let mut line = vec![false; self.width];
            for y in 0..self.height {
                let row = &mut out.data[y * self.width..(y + 1) * self.width];
                window_pass(row, &mut line, kw, pass);
                row.copy_from_slice(&line);
            }
        }
        if kh > 1 {
            let mut column = vec![false; self.height];
            let mut line = vec![false; self.height];
            for x in 0..self.width {
                for y in 0..self.height {
                    column[y] = out.data[y * self.width + x];
                }
                window_pass(&column, &mut line, kh, pass);
                for y in 0..self.height {
                    out.data[y * self.width + x] = line[y];
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Erode,
    Dilate,
}

/// One-dimensional erosion/dilation by sliding-window counting.
///
/// Erosion uses the window `[i - before, i + after]` and treats pixels
/// outside the line as ink; dilation uses the reflected window so that an
/// opening restores every run at least `k` long exactly.
fn window_pass(src: &[bool], dst: &mut [bool], k: usize, pass: Pass) {
    let n = src.len();
    let (before, after) = match pass {
        Pass::Erode => ((k - 1) / 2, k / 2),
        Pass::Dilate => (k / 2, (k - 1) / 2),
    };

    let mut prefix = vec![0usize; n + 1];
    for i in 0..n {
        prefix[i + 1] = prefix[i] + src[i] as usize;
    }

    for i in 0..n {
        let lo = i.saturating_sub(before);
        let hi = (i + after).min(n - 1);
        let ink = prefix[hi + 1] - prefix[lo];
        dst[i] = match pass {
            Pass::Erode => ink == hi + 1 - lo,
            Pass::Dilate => ink > 0,
        };
    }
}

/// Binarize a grayscale image so dark ink becomes foreground.
pub fn binarize(gray: &GrayImage, method: Binarization) -> BinaryMask {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return BinaryMask::new(w, h);
    }
    match method {
        Binarization::Otsu => {
            let mut mask = BinaryMask::new(w, h);
            let raw = gray.as_raw();
            let min = raw.iter().copied().min().unwrap_or(0);
            let max = raw.iter().copied().max().unwrap_or(0);
            if min == max {
                return mask;
            }
            let level = imageproc::contrast::otsu_level(gray);
            for (x, y, p) in gray.enumerate_pixels() {
                if p.0[0] <= level {
                    mask.set(x as usize, y as usize, true);
                }
            }
            mask
        },
        Binarization::AdaptiveMean { block_size, c } => {
            adaptive_threshold_mean(gray, block_size.max(1) as usize, c as f64)
        },
    }
}

/// Adaptive mean thresholding over an integral image.
///
/// A pixel is ink when it is darker than the mean of its `block_size`
/// neighbourhood minus `c`. Uniform regions (blank paper, solid fills)
/// therefore produce no ink.
fn adaptive_threshold_mean(gray: &GrayImage, block_size: usize, c: f64) -> BinaryMask {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let raw = gray.as_raw();

    let iw = w + 1;
    let mut integral = vec![0i64; iw * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0i64;
        for x in 0..w {
            row_sum += raw[y * w + x] as i64;
            integral[(y + 1) * iw + (x + 1)] = row_sum + integral[y * iw + (x + 1)];
        }
    }

    let half = (block_size / 2) as isize;
    let mut mask = BinaryMask::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let y0 = (y as isize - half).max(0) as usize;
            let x0 = (x as isize - half).max(0) as usize;
            let y1 = ((y as isize + half).min(h as isize - 1) + 1) as usize;
            let x1 = ((x as isize + half).min(w as isize - 1) + 1) as usize;

            let area = ((y1 - y0) * (x1 - x0)) as f64;
            let sum = integral[y1 * iw + x1] - integral[y0 * iw + x1] - integral[y1 * iw + x0]
                + integral[y0 * iw + x0];
            let mean = sum as f64 / area;

            if (raw[y * w + x] as f64) < mean - c {
                mask.data[y * w + x] = true;
            }
        }
    }
    mask
}

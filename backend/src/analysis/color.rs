//! Rule-based color descriptors.
//!
//! Pixel statistics follow 8-bit OpenCV conventions: hue on a 0–180 scale,
//! saturation and value on 0–255, and grayscale as the fixed-point
//! ITU-R BT.601 luma. The buckets are fixed thresholds on the per-image means.

use image::RgbImage;
use shared::{BrightnessBucket, HueBucket, SaturationBucket};

use crate::locale::{self, Locale};

// BT.601 luma weights scaled by 2^14.
const R2Y: u32 = 4899;
const G2Y: u32 = 9617;
const B2Y: u32 = 1868;
const GRAY_SHIFT: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorProfile {
    pub hue: HueBucket,
    pub brightness: BrightnessBucket,
    /// Mean grayscale level in [0, 255].
    pub brightness_value: f64,
    pub saturation: SaturationBucket,
}

impl ColorProfile {
    /// Profile reported when the pixels could not be analyzed.
    pub fn undefined() -> Self {
        Self {
            hue: HueBucket::Undefined,
            brightness: BrightnessBucket::Undefined,
            brightness_value: 0.0,
            saturation: SaturationBucket::Undefined,
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.brightness == BrightnessBucket::Undefined
    }

    /// "{brightness} {hue}", or "Undefined" for the fallback profile.
    pub fn color_name(&self) -> String {
        if self.is_undefined() {
            return HueBucket::Undefined.to_string();
        }
        format!("{} {}", self.brightness, self.hue)
    }

    pub fn brightness_category(&self) -> &'static str {
        locale::brightness_advisory(self.brightness, Locale::Ru)
    }
}

#[derive(Debug, thiserror::Error)]
enum AnalysisFailure {
    #[error("image has no pixels ({0}x{1})")]
    Empty(u32, u32),
    #[error("pixel buffer holds {found} bytes, {expected} expected for {width}x{height} RGB")]
    BufferLength {
        width: u32,
        height: u32,
        expected: usize,
        found: usize,
    },
    #[error("non-finite statistics")]
    NonFinite,
}

struct PixelStats {
    mean_hue: f64,
    mean_saturation: f64,
    mean_gray: f64,
}

/// Never fails: anything that cannot be measured yields [`ColorProfile::undefined`].
pub fn analyze(image: &RgbImage) -> ColorProfile {
    analyze_raw(image.width(), image.height(), image.as_raw())
}

/// Same as [`analyze`] for a packed RGB8 buffer of `width * height` pixels.
pub fn analyze_raw(width: u32, height: u32, pixels: &[u8]) -> ColorProfile {
    match pixel_stats(width, height, pixels) {
        Ok(stats) => profile_from_stats(&stats),
        Err(failure) => {
            log::warn!("Color analysis unavailable: {}", failure);
            ColorProfile::undefined()
        }
    }
}

fn pixel_stats(width: u32, height: u32, pixels: &[u8]) -> Result<PixelStats, AnalysisFailure> {
    let count = width as usize * height as usize;
    if count == 0 {
        return Err(AnalysisFailure::Empty(width, height));
    }
    let expected = count * 3;
    if pixels.len() != expected {
        return Err(AnalysisFailure::BufferLength {
            width,
            height,
            expected,
            found: pixels.len(),
        });
    }

    let (mut hue_sum, mut sat_sum, mut gray_sum) = (0u64, 0u64, 0u64);
    for rgb in pixels.chunks_exact(3) {
        let (h, s, _) = rgb_to_hsv(rgb[0], rgb[1], rgb[2]);
        hue_sum += u64::from(h);
        sat_sum += u64::from(s);
        gray_sum += u64::from(rgb_to_gray(rgb[0], rgb[1], rgb[2]));
    }

    let n = count as f64;
    let stats = PixelStats {
        mean_hue: hue_sum as f64 / n,
        mean_saturation: sat_sum as f64 / n,
        mean_gray: gray_sum as f64 / n,
    };
    if !(stats.mean_hue.is_finite()
        && stats.mean_saturation.is_finite()
        && stats.mean_gray.is_finite())
    {
        return Err(AnalysisFailure::NonFinite);
    }
    Ok(stats)
}

fn profile_from_stats(stats: &PixelStats) -> ColorProfile {
    ColorProfile {
        hue: hue_bucket(stats.mean_hue),
        brightness: brightness_bucket(stats.mean_gray),
        brightness_value: stats.mean_gray,
        saturation: saturation_bucket(stats.mean_saturation),
    }
}

/// 8-bit HSV: hue in [0, 180), saturation and value in [0, 255].
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = f64::from(v - min);

    let s = if v == 0 {
        0
    } else {
        (255.0 * diff / f64::from(v)).round() as u8
    };

    if diff == 0.0 {
        return (0, s, v);
    }

    // red wins ties, then green
    let (rf, gf, bf) = (f64::from(r), f64::from(g), f64::from(b));
    let raw = if v == r {
        30.0 * (gf - bf) / diff
    } else if v == g {
        30.0 * (bf - rf) / diff + 60.0
    } else {
        30.0 * (rf - gf) / diff + 120.0
    };
    let mut h = (raw + 0.5).floor();
    if h < 0.0 {
        h += 180.0;
    }
    (h as u8, s, v)
}

pub fn rgb_to_gray(r: u8, g: u8, b: u8) -> u8 {
    let weighted = u32::from(r) * R2Y + u32::from(g) * G2Y + u32::from(b) * B2Y;
    ((weighted + (1 << (GRAY_SHIFT - 1))) >> GRAY_SHIFT) as u8
}

/// Half-open, left-inclusive ranges on the 0–180 scale. Red wraps around
/// both ends.
pub fn hue_bucket(mean_hue: f64) -> HueBucket {
    match mean_hue {
        h if !h.is_finite() => HueBucket::Undefined,
        h if h < 15.0 || h >= 165.0 => HueBucket::Red,
        h if h < 45.0 => HueBucket::Orange,
        h if h < 75.0 => HueBucket::Yellow,
        h if h < 105.0 => HueBucket::Green,
        h if h < 135.0 => HueBucket::Cyan,
        _ => HueBucket::Blue,
    }
}

pub fn brightness_bucket(brightness: f64) -> BrightnessBucket {
    match brightness {
        b if !b.is_finite() => BrightnessBucket::Undefined,
        b if b < 85.0 => BrightnessBucket::Dark,
        b if b < 170.0 => BrightnessBucket::Medium,
        _ => BrightnessBucket::Light,
    }
}

pub fn saturation_bucket(saturation: f64) -> SaturationBucket {
    match saturation {
        s if !s.is_finite() => SaturationBucket::Undefined,
        s if s < 50.0 => SaturationBucket::Desaturated,
        s if s < 150.0 => SaturationBucket::Moderate,
        _ => SaturationBucket::Saturated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(rgb))
    }

    #[test]
    fn hsv_matches_8bit_conventions() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), (60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), (120, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 255), (90, 255, 255));
        assert_eq!(rgb_to_hsv(255, 0, 255), (150, 255, 255));
        assert_eq!(rgb_to_hsv(255, 0, 1), (0, 255, 255));
        assert_eq!(rgb_to_hsv(255, 0, 10), (179, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 0), (0, 0, 0));
        assert_eq!(rgb_to_hsv(128, 128, 128), (0, 0, 128));
    }

    #[test]
    fn gray_uses_bt601_weights() {
        assert_eq!(rgb_to_gray(255, 255, 255), 255);
        assert_eq!(rgb_to_gray(0, 0, 0), 0);
        assert_eq!(rgb_to_gray(100, 0, 0), 30);
        assert_eq!(rgb_to_gray(0, 255, 0), 150);
    }

    #[test]
    fn hue_boundaries_are_left_inclusive() {
        let cases = [
            (15.0, HueBucket::Red, HueBucket::Orange),
            (45.0, HueBucket::Orange, HueBucket::Yellow),
            (75.0, HueBucket::Yellow, HueBucket::Green),
            (105.0, HueBucket::Green, HueBucket::Cyan),
            (135.0, HueBucket::Cyan, HueBucket::Blue),
            (165.0, HueBucket::Blue, HueBucket::Red),
        ];
        for (boundary, below, above) in cases {
            assert_eq!(hue_bucket(boundary - 0.01), below, "just below {boundary}");
            assert_eq!(hue_bucket(boundary), above, "at {boundary}");
            assert_eq!(hue_bucket(boundary + 0.01), above, "just above {boundary}");
        }
        assert_eq!(hue_bucket(0.0), HueBucket::Red);
        assert_eq!(hue_bucket(179.5), HueBucket::Red);
        assert_eq!(hue_bucket(f64::NAN), HueBucket::Undefined);
    }

    #[test]
    fn brightness_and_saturation_buckets() {
        assert_eq!(brightness_bucket(84.99), BrightnessBucket::Dark);
        assert_eq!(brightness_bucket(85.0), BrightnessBucket::Medium);
        assert_eq!(brightness_bucket(169.99), BrightnessBucket::Medium);
        assert_eq!(brightness_bucket(170.0), BrightnessBucket::Light);
        assert_eq!(saturation_bucket(49.9), SaturationBucket::Desaturated);
        assert_eq!(saturation_bucket(50.0), SaturationBucket::Moderate);
        assert_eq!(saturation_bucket(150.0), SaturationBucket::Saturated);
    }

    #[test]
    fn solid_dark_red() {
        let profile = analyze(&solid(100, 100, [100, 0, 0]));
        assert_eq!(profile.hue, HueBucket::Red);
        assert_eq!(profile.brightness, BrightnessBucket::Dark);
        assert_eq!(profile.saturation, SaturationBucket::Saturated);
        assert_eq!(profile.brightness_value, 30.0);
        assert_eq!(profile.color_name(), "Dark Red");
        assert_eq!(profile.brightness_category(), "Затемнённо (лучше переделать фото)");
    }

    #[test]
    fn solid_bright_cyan() {
        // hue 106 on the 0-180 scale, luma 191
        let profile = analyze(&solid(50, 50, [150, 200, 255]));
        assert_eq!(profile.hue, HueBucket::Cyan);
        assert_eq!(profile.brightness, BrightnessBucket::Light);
        assert_eq!(profile.saturation, SaturationBucket::Moderate);
        assert_eq!(profile.color_name(), "Light Cyan");
    }

    #[test]
    fn gray_image_is_desaturated() {
        let profile = analyze(&solid(8, 8, [128, 128, 128]));
        assert_eq!(profile.saturation, SaturationBucket::Desaturated);
        assert_eq!(profile.brightness, BrightnessBucket::Medium);
        assert_eq!(profile.hue, HueBucket::Red);
    }

    #[test]
    fn single_pixel_image_is_analyzed() {
        let profile = analyze(&solid(1, 1, [255, 255, 255]));
        assert_eq!(profile.brightness, BrightnessBucket::Light);
        assert!(!profile.is_undefined());
    }

    #[test]
    fn mean_is_taken_over_all_pixels() {
        let mut image = solid(2, 1, [0, 0, 0]);
        image.put_pixel(1, 0, Rgb([255, 255, 255]));
        let profile = analyze(&image);
        assert_eq!(profile.brightness_value, 127.5);
        assert_eq!(profile.brightness, BrightnessBucket::Medium);
    }

    #[test]
    fn truncated_buffer_falls_back_to_undefined() {
        let pixels = vec![10u8; 4 * 4 * 3 - 1];
        let profile = analyze_raw(4, 4, &pixels);
        assert_eq!(profile, ColorProfile::undefined());
        assert_eq!(profile.color_name(), "Undefined");
        assert_eq!(profile.brightness_category(), "Неопределённо");
        assert_eq!(profile.brightness_value, 0.0);
    }

    #[test]
    fn empty_image_falls_back_to_undefined() {
        assert_eq!(analyze(&RgbImage::new(0, 3)), ColorProfile::undefined());
        assert_eq!(analyze_raw(0, 0, &[]), ColorProfile::undefined());
    }
}

//! Video profile: the timeline-level format properties.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpliceError};
use crate::time::FrameRate;

/// Color space enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ColorSpace {
    /// Rec. 601 (SD video)
    Rec601,
    /// Rec. 709 (HD video)
    #[default]
    Rec709,
    /// Rec. 2020 (UHD/HDR video)
    Rec2020,
}

/// Field order of the delivered picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ScanMode {
    #[default]
    Progressive,
    Interlaced,
}

/// Format properties shared by every track of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Profile {
    pub frame_rate: FrameRate,
    pub width: u32,
    pub height: u32,
    pub colorspace: ColorSpace,
    /// Display aspect ratio numerator
    pub aspect_numerator: u32,
    /// Display aspect ratio denominator
    pub aspect_denominator: u32,
    pub scan_mode: ScanMode,
}

impl Profile {
    /// Create a progressive profile whose display aspect follows the pixel size.
    pub fn new(width: u32, height: u32, frame_rate: FrameRate) -> Self {
        let divisor = gcd(width, height).max(1);
        Self {
            frame_rate,
            width,
            height,
            colorspace: if height > 576 {
                ColorSpace::Rec709
            } else {
                ColorSpace::Rec601
            },
            aspect_numerator: width / divisor,
            aspect_denominator: height / divisor,
            scan_mode: ScanMode::Progressive,
        }
    }

    /// Reject profiles no timeline can use.
    pub fn validate(&self) -> Result<()> {
        let rate = self.frame_rate;
        if rate.numerator == 0 || rate.denominator == 0 {
            return Err(SpliceError::InvalidRange(format!(
                "frame rate {}/{} is invalid",
                rate.numerator, rate.denominator
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SpliceError::InvalidRange(format!(
                "frame size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.aspect_numerator == 0 || self.aspect_denominator == 0 {
            return Err(SpliceError::InvalidRange(format!(
                "display aspect {}:{} is invalid",
                self.aspect_numerator, self.aspect_denominator
            )));
        }
        Ok(())
    }

    /// Display aspect ratio as f64.
    pub fn display_aspect(&self) -> f64 {
        if self.aspect_denominator == 0 {
            return 0.0;
        }
        self.aspect_numerator as f64 / self.aspect_denominator as f64
    }

    /// Sample (pixel) aspect ratio implied by the display aspect.
    pub fn sample_aspect(&self) -> f64 {
        if self.width == 0 || self.height == 0 {
            return 1.0;
        }
        self.display_aspect() * self.height as f64 / self.width as f64
    }

    pub const HD_1080P_25: Self = Self {
        frame_rate: FrameRate::FPS_25,
        width: 1920,
        height: 1080,
        colorspace: ColorSpace::Rec709,
        aspect_numerator: 16,
        aspect_denominator: 9,
        scan_mode: ScanMode::Progressive,
    };
}

impl Default for Profile {
    fn default() -> Self {
        Self::HD_1080P_25
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

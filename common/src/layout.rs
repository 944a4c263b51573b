//! Video surface layout resolution.
//!
//! Maps a video's native resolution, the per-axis measurement constraints
//! handed down by a layout host, and a [`ScaleMode`] to the final rendered
//! size. Everything here is pure: no state, no locking, and identical inputs
//! always produce identical outputs, so hosts may call it as often as they
//! like.
//!
//! All arithmetic truncates toward zero. The exact rounding matters: two
//! implementations must agree pixel for pixel.
//!
//! # Examples
//!
//! ```
//! use common::layout::{self, MeasureSpec, ScaleMode, VideoDimensions};
//!
//! let size = layout::resolve(
//!     VideoDimensions::new(16, 9),
//!     MeasureSpec::exact(100),
//!     MeasureSpec::exact(100),
//!     ScaleMode::FitAll,
//! );
//! assert_eq!((size.width, size.height), (100, 56));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the video is sized against the measurement constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleMode {
    /// Native size, shrunk (height first, then width) to fit `AtMost` bounds
    Center,
    /// Width is taken from the constraint, height follows the aspect ratio
    FitHorizontal,
    /// Height is taken from the constraint, width follows the aspect ratio
    FitVertical,
    /// Both constraints are authoritative, then corrected for aspect ratio
    FitAll,
}

impl ScaleMode {
    pub const ALL: [ScaleMode; 4] = [
        Self::Center,
        Self::FitHorizontal,
        Self::FitVertical,
        Self::FitAll,
    ];

    /// Map an external integer code (1-4) to a mode.
    ///
    /// Any other code, including 0, means "no mode selected".
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Center),
            2 => Some(Self::FitHorizontal),
            3 => Some(Self::FitVertical),
            4 => Some(Self::FitAll),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Center => 1,
            Self::FitHorizontal => 2,
            Self::FitVertical => 3,
            Self::FitAll => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::FitHorizontal => "fit-horizontal",
            Self::FitVertical => "fit-vertical",
            Self::FitAll => "fit-all",
        }
    }

    /// Parse a mode from its name or integer code.
    ///
    /// Returns `Ok(None)` for `"none"` and code `0`.
    pub fn parse(s: &str) -> Result<Option<Self>, ParseLayoutError> {
        let s = s.trim().to_lowercase();
        if let Ok(code) = s.parse::<i32>() {
            return match code {
                0 => Ok(None),
                _ => Self::from_code(code)
                    .map(Some)
                    .ok_or(ParseLayoutError::ScaleMode(s)),
            };
        }

        match s.as_str() {
            "none" => Ok(None),
            "center" => Ok(Some(Self::Center)),
            "fit-horizontal" | "fit_horizontal" | "horizontal" => Ok(Some(Self::FitHorizontal)),
            "fit-vertical" | "fit_vertical" | "vertical" => Ok(Some(Self::FitVertical)),
            "fit-all" | "fit_all" | "fit" => Ok(Some(Self::FitAll)),
            _ => Err(ParseLayoutError::ScaleMode(s)),
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from parsing layout values out of text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseLayoutError {
    #[error("unknown scale mode: {0} (expected none, center, fit-horizontal, fit-vertical, fit-all or 0-4)")]
    ScaleMode(String),

    #[error("invalid measure spec: {0} (expected exact:N, at-most:N or unspecified)")]
    MeasureSpec(String),

    #[error("invalid video dimensions: {0} (expected WIDTHxHEIGHT)")]
    Dimensions(String),
}

/// The kind of constraint a layout host places on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasureMode {
    /// The host has no opinion
    Unspecified,
    /// The size must be exactly this
    Exact,
    /// The size may be anything up to this
    AtMost,
}

/// One axis's measurement constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasureSpec {
    pub mode: MeasureMode,
    pub size: u32,
}

const MODE_SHIFT: u32 = 30;
const MODE_MASK: u32 = 0x3 << MODE_SHIFT;

impl MeasureSpec {
    pub fn new(mode: MeasureMode, size: u32) -> Self {
        Self { mode, size }
    }

    pub fn exact(size: u32) -> Self {
        Self::new(MeasureMode::Exact, size)
    }

    pub fn at_most(size: u32) -> Self {
        Self::new(MeasureMode::AtMost, size)
    }

    pub fn unspecified() -> Self {
        Self::new(MeasureMode::Unspecified, 0)
    }

    /// Encode as a packed 32-bit spec: mode in the top two bits, size below.
    ///
    /// Sizes wider than 30 bits are truncated.
    pub fn pack(self) -> u32 {
        let mode = match self.mode {
            MeasureMode::Unspecified => 0,
            MeasureMode::Exact => 1,
            MeasureMode::AtMost => 2,
        };
        (mode << MODE_SHIFT) | (self.size & !MODE_MASK)
    }

    /// Decode a packed 32-bit spec.
    ///
    /// The unused mode value `3` is read as `Unspecified`.
    pub fn unpack(packed: u32) -> Self {
        let mode = match (packed & MODE_MASK) >> MODE_SHIFT {
            1 => MeasureMode::Exact,
            2 => MeasureMode::AtMost,
            _ => MeasureMode::Unspecified,
        };
        Self::new(mode, packed & !MODE_MASK)
    }

    /// True when this constraint is an upper bound that `size` exceeds.
    fn exceeded_by(self, size: u32) -> bool {
        self.mode == MeasureMode::AtMost && size > self.size
    }
}

impl fmt::Display for MeasureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            MeasureMode::Unspecified => f.write_str("unspecified"),
            MeasureMode::Exact => write!(f, "exact:{}", self.size),
            MeasureMode::AtMost => write!(f, "at-most:{}", self.size),
        }
    }
}

impl FromStr for MeasureSpec {
    type Err = ParseLayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        if lowered == "unspecified" {
            return Ok(Self::unspecified());
        }

        let (mode, size) = lowered
            .split_once(':')
            .ok_or_else(|| ParseLayoutError::MeasureSpec(s.to_string()))?;
        let size: u32 = size
            .parse()
            .map_err(|_| ParseLayoutError::MeasureSpec(s.to_string()))?;

        match mode {
            "exact" | "exactly" => Ok(Self::exact(size)),
            "at-most" | "at_most" | "atmost" => Ok(Self::at_most(size)),
            _ => Err(ParseLayoutError::MeasureSpec(s.to_string())),
        }
    }
}

/// Native decode resolution of the video.
///
/// `(0, 0)` means the resolution is not known yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

impl VideoDimensions {
    pub const UNKNOWN: Self = Self::new(0, 0);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A dimension of zero on either axis carries no aspect ratio.
    pub fn is_unknown(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for VideoDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for VideoDimensions {
    type Err = ParseLayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| ParseLayoutError::Dimensions(s.to_string()))?;
        let width = w
            .parse()
            .map_err(|_| ParseLayoutError::Dimensions(s.to_string()))?;
        let height = h
            .parse()
            .map_err(|_| ParseLayoutError::Dimensions(s.to_string()))?;
        Ok(Self::new(width, height))
    }
}

/// Final rendered size produced by a measurement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedSize {
    pub width: u32,
    pub height: u32,
}

impl ResolvedSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ResolvedSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Size for one axis when no aspect ratio applies.
///
/// `Exact` and `AtMost` yield the constraint's size; `Unspecified` yields
/// `preferred`.
pub fn default_size(preferred: u32, spec: MeasureSpec) -> u32 {
    match spec.mode {
        MeasureMode::Unspecified => preferred,
        MeasureMode::Exact | MeasureMode::AtMost => spec.size,
    }
}

/// Size used when no scale mode is configured: the default on each axis.
pub fn resolve_unscaled(
    video: VideoDimensions,
    width_spec: MeasureSpec,
    height_spec: MeasureSpec,
) -> ResolvedSize {
    ResolvedSize::new(
        default_size(video.width, width_spec),
        default_size(video.height, height_spec),
    )
}

/// Resolve the rendered size for `video` under the given constraints.
pub fn resolve(
    video: VideoDimensions,
    width_spec: MeasureSpec,
    height_spec: MeasureSpec,
    mode: ScaleMode,
) -> ResolvedSize {
    if video.is_unknown() {
        return resolve_unscaled(video, width_spec, height_spec);
    }

    let (vw, vh) = (video.width, video.height);

    let (width, height) = match mode {
        ScaleMode::Center => {
            let (mut width, mut height) = (vw, vh);
            // Height correction runs first; the width correction may then
            // override it.
            if height_spec.exceeded_by(height) {
                height = height_spec.size;
                width = scale(height, vw, vh);
            }
            if width_spec.exceeded_by(width) {
                width = width_spec.size;
                height = scale(width, vh, vw);
            }
            (width, height)
        }

        ScaleMode::FitHorizontal => {
            let width = width_spec.size;
            let mut height = scale(width, vh, vw);
            // Aspect ratio is given up rather than shrinking the width.
            if height_spec.exceeded_by(height) {
                height = height_spec.size;
            }
            (width, height)
        }

        ScaleMode::FitVertical => {
            let height = height_spec.size;
            let mut width = scale(height, vw, vh);
            if width_spec.exceeded_by(width) {
                width = width_spec.size;
            }
            (width, height)
        }

        ScaleMode::FitAll => {
            let (mut width, mut height) = (width_spec.size, height_spec.size);
            let video_cross = u64::from(vw) * u64::from(height);
            let box_cross = u64::from(width) * u64::from(vh);
            if video_cross < box_cross {
                // box too wide
                width = scale(height, vw, vh);
            } else if video_cross > box_cross {
                // box too tall
                height = scale(width, vh, vw);
            }
            (width, height)
        }
    };

    ResolvedSize::new(width, height)
}

/// `value * num / den`, truncating, saturating at `u32::MAX`.
///
/// `den` is never zero: callers only reach this with known dimensions.
fn scale(value: u32, num: u32, den: u32) -> u32 {
    let scaled = u64::from(value) * u64::from(num) / u64::from(den);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(w: u32, h: u32) -> VideoDimensions {
        VideoDimensions::new(w, h)
    }

    #[test]
    fn test_unknown_video_uses_constraints() {
        for mode in ScaleMode::ALL {
            let size = resolve(
                VideoDimensions::UNKNOWN,
                MeasureSpec::exact(320),
                MeasureSpec::exact(240),
                mode,
            );
            assert_eq!(size, ResolvedSize::new(320, 240), "mode {mode}");
        }
    }

    #[test]
    fn test_unknown_video_unspecified_is_zero() {
        let size = resolve(
            VideoDimensions::UNKNOWN,
            MeasureSpec::unspecified(),
            MeasureSpec::at_most(480),
            ScaleMode::Center,
        );
        assert_eq!(size, ResolvedSize::new(0, 480));
    }

    #[test]
    fn test_half_known_video_does_not_divide_by_zero() {
        let size = resolve(
            dims(0, 720),
            MeasureSpec::exact(100),
            MeasureSpec::exact(100),
            ScaleMode::FitVertical,
        );
        assert_eq!(size, ResolvedSize::new(100, 100));
    }

    #[test]
    fn test_center_native_when_unbounded() {
        let size = resolve(
            dims(640, 360),
            MeasureSpec::unspecified(),
            MeasureSpec::unspecified(),
            ScaleMode::Center,
        );
        assert_eq!(size, ResolvedSize::new(640, 360));
    }

    #[test]
    fn test_center_exact_constraints_are_ignored() {
        let size = resolve(
            dims(640, 360),
            MeasureSpec::exact(100),
            MeasureSpec::exact(100),
            ScaleMode::Center,
        );
        assert_eq!(size, ResolvedSize::new(640, 360));
    }

    #[test]
    fn test_center_width_clamp() {
        let size = resolve(
            dims(1000, 500),
            MeasureSpec::at_most(400),
            MeasureSpec::at_most(1000),
            ScaleMode::Center,
        );
        assert_eq!(size, ResolvedSize::new(400, 200));
    }

    #[test]
    fn test_center_height_clamp() {
        let size = resolve(
            dims(500, 1000),
            MeasureSpec::at_most(1000),
            MeasureSpec::at_most(400),
            ScaleMode::Center,
        );
        assert_eq!(size, ResolvedSize::new(200, 400));
    }

    #[test]
    fn test_center_sequential_correction() {
        // Height pass: 1000x800 -> 625x500. Width pass: 625 > 300 ->
        // 300x240. The width pass gets the last word.
        let size = resolve(
            dims(1000, 800),
            MeasureSpec::at_most(300),
            MeasureSpec::at_most(500),
            ScaleMode::Center,
        );
        assert_eq!(size, ResolvedSize::new(300, 240));
    }

    #[test]
    fn test_center_truncates() {
        // 333 * 1920 / 1080 = 592.0, 100 * 1080 / 1920 = 56.25
        let size = resolve(
            dims(1920, 1080),
            MeasureSpec::at_most(100),
            MeasureSpec::at_most(333),
            ScaleMode::Center,
        );
        assert_eq!(size, ResolvedSize::new(100, 56));
    }

    #[test]
    fn test_fit_horizontal_follows_aspect() {
        let size = resolve(
            dims(1920, 1080),
            MeasureSpec::exact(640),
            MeasureSpec::unspecified(),
            ScaleMode::FitHorizontal,
        );
        assert_eq!(size, ResolvedSize::new(640, 360));
    }

    #[test]
    fn test_fit_horizontal_clamps_without_recompute() {
        let size = resolve(
            dims(1000, 2000),
            MeasureSpec::exact(100),
            MeasureSpec::at_most(150),
            ScaleMode::FitHorizontal,
        );
        assert_eq!(size, ResolvedSize::new(100, 150));
    }

    #[test]
    fn test_fit_horizontal_exact_height_not_clamped() {
        let size = resolve(
            dims(1000, 2000),
            MeasureSpec::exact(100),
            MeasureSpec::exact(150),
            ScaleMode::FitHorizontal,
        );
        assert_eq!(size, ResolvedSize::new(100, 200));
    }

    #[test]
    fn test_fit_vertical_follows_aspect() {
        let size = resolve(
            dims(1920, 1080),
            MeasureSpec::unspecified(),
            MeasureSpec::exact(540),
            ScaleMode::FitVertical,
        );
        assert_eq!(size, ResolvedSize::new(960, 540));
    }

    #[test]
    fn test_fit_vertical_clamps_without_recompute() {
        let size = resolve(
            dims(2000, 1000),
            MeasureSpec::at_most(150),
            MeasureSpec::exact(100),
            ScaleMode::FitVertical,
        );
        assert_eq!(size, ResolvedSize::new(150, 100));
    }

    #[test]
    fn test_fit_all_too_tall() {
        let size = resolve(
            dims(16, 9),
            MeasureSpec::exact(100),
            MeasureSpec::exact(100),
            ScaleMode::FitAll,
        );
        assert_eq!(size, ResolvedSize::new(100, 56));
    }

    #[test]
    fn test_fit_all_too_wide() {
        let size = resolve(
            dims(9, 16),
            MeasureSpec::exact(100),
            MeasureSpec::exact(100),
            ScaleMode::FitAll,
        );
        assert_eq!(size, ResolvedSize::new(56, 100));
    }

    #[test]
    fn test_fit_all_matching_aspect() {
        let size = resolve(
            dims(1920, 1080),
            MeasureSpec::at_most(1280),
            MeasureSpec::at_most(720),
            ScaleMode::FitAll,
        );
        assert_eq!(size, ResolvedSize::new(1280, 720));
    }

    #[test]
    fn test_large_values_do_not_overflow() {
        let size = resolve(
            dims(100_000, 1),
            MeasureSpec::unspecified(),
            MeasureSpec::exact(100_000),
            ScaleMode::FitVertical,
        );
        assert_eq!(size, ResolvedSize::new(u32::MAX, 100_000));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let inputs = (
            dims(1280, 720),
            MeasureSpec::at_most(500),
            MeasureSpec::at_most(300),
        );
        for mode in ScaleMode::ALL {
            let first = resolve(inputs.0, inputs.1, inputs.2, mode);
            for _ in 0..10 {
                assert_eq!(resolve(inputs.0, inputs.1, inputs.2, mode), first);
            }
        }
    }

    #[test]
    fn test_default_size() {
        assert_eq!(default_size(50, MeasureSpec::exact(10)), 10);
        assert_eq!(default_size(50, MeasureSpec::at_most(10)), 10);
        assert_eq!(default_size(50, MeasureSpec::unspecified()), 50);
    }

    #[test]
    fn test_resolve_unscaled_ignores_aspect() {
        let size = resolve_unscaled(
            dims(1920, 1080),
            MeasureSpec::exact(300),
            MeasureSpec::unspecified(),
        );
        assert_eq!(size, ResolvedSize::new(300, 1080));
    }

    #[test]
    fn test_measure_spec_packing() {
        let spec = MeasureSpec::at_most(1080);
        assert_eq!(spec.pack(), (2 << 30) | 1080);
        assert_eq!(MeasureSpec::unpack(spec.pack()), spec);
        assert_eq!(MeasureSpec::exact(7).pack(), (1 << 30) | 7);
        assert_eq!(MeasureSpec::unpack(0), MeasureSpec::unspecified());
        assert_eq!(MeasureSpec::unpack(3 << 30).mode, MeasureMode::Unspecified);
    }

    #[test]
    fn test_measure_spec_parse() {
        assert_eq!("exact:320".parse(), Ok(MeasureSpec::exact(320)));
        assert_eq!("AT-MOST:240".parse(), Ok(MeasureSpec::at_most(240)));
        assert_eq!("unspecified".parse(), Ok(MeasureSpec::unspecified()));
        assert!("exact".parse::<MeasureSpec>().is_err());
        assert!("wide:10".parse::<MeasureSpec>().is_err());
        assert!("exact:-1".parse::<MeasureSpec>().is_err());
        assert_eq!(MeasureSpec::at_most(5).to_string(), "at-most:5");
    }

    #[test]
    fn test_dimensions_parse() {
        assert_eq!("1920x1080".parse(), Ok(dims(1920, 1080)));
        assert_eq!("16X9".parse(), Ok(dims(16, 9)));
        assert!("1920".parse::<VideoDimensions>().is_err());
        assert!("ax9".parse::<VideoDimensions>().is_err());
    }

    #[test]
    fn test_scale_mode_codes() {
        for mode in ScaleMode::ALL {
            assert_eq!(ScaleMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(ScaleMode::from_code(0), None);
        assert_eq!(ScaleMode::from_code(5), None);
        assert_eq!(ScaleMode::from_code(-1), None);
    }

    #[test]
    fn test_scale_mode_parse() {
        assert_eq!(ScaleMode::parse("fit-all"), Ok(Some(ScaleMode::FitAll)));
        assert_eq!(ScaleMode::parse("Center"), Ok(Some(ScaleMode::Center)));
        assert_eq!(ScaleMode::parse("2"), Ok(Some(ScaleMode::FitHorizontal)));
        assert_eq!(ScaleMode::parse("none"), Ok(None));
        assert_eq!(ScaleMode::parse("0"), Ok(None));
        assert!(ScaleMode::parse("9").is_err());
        assert!(ScaleMode::parse("stretch").is_err());
    }
}

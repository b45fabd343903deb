//! Common types for wavescope
//!
//! Numeric storage types for sample buffers plus the small geometric value
//! types shared between the viewport and the drawing layer.

/// Numeric type a [`SampleBuffer`](crate::SampleBuffer) stores internally.
///
/// Values always enter and leave a buffer as `f64`; the storage type only
/// decides memory footprint and precision. Integer types round and saturate.
pub trait SampleValue: Copy + Send + Sync + 'static {
    /// Convert an incoming value to the storage type
    fn from_f64(value: f64) -> Self;

    /// Convert a stored value back to `f64`
    fn to_f64(self) -> f64;
}

impl SampleValue for f32 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl SampleValue for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

impl SampleValue for i16 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        // `as` saturates on overflow and maps NaN to 0
        value.round() as i16
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl SampleValue for i32 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value.round() as i32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

/// Size of the target draw area in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
        }
    }
}

/// A normalized range on the track axis (0.0 = first sample, 1.0 = last)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataRange {
    pub location: f64,
    pub length: f64,
}

impl DataRange {
    pub fn new(location: f64, length: f64) -> Self {
        Self { location, length }
    }

    /// End of the range (`location + length`)
    pub fn end(&self) -> f64 {
        self.location + self.length
    }

    /// Finite with a positive length
    pub fn is_valid(&self) -> bool {
        self.location.is_finite() && self.length.is_finite() && self.length > 0.0
    }
}

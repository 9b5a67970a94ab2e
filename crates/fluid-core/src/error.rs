//! Error types for configuration and the render registry.
//!
//! Configuration errors are raised when a parameter is set, before any state
//! is touched. A frame that cannot be rendered is not an error: the renderer
//! skips it and tries again next frame.

use std::fmt;

use crate::registry::{ObjectId, TargetId};

/// A rejected parameter mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Smoothing radius must be finite and strictly positive.
    InvalidSmoothingRadius(f32),
    /// A parameter that must be strictly positive was not.
    NonPositive { name: &'static str, value: f32 },
    /// A parameter received NaN or infinity.
    NonFinite { name: &'static str },
    /// A render map size of zero was requested.
    ZeroMapSize,
    /// Blur size divisor must be at least 1.
    InvalidSizeDivisor(u32),
    /// Blur kernel radius above [`MAX_BLUR_KERNEL_RADIUS`](crate::render::blur::MAX_BLUR_KERNEL_RADIUS).
    BlurKernelTooLarge(u32),
    /// A texel count that is negative or not a number.
    InvalidCount { name: String, value: f32 },
    /// No tunable with this name exists.
    UnknownParameter(String),
    /// A string-keyed parameter received the wrong number of values.
    WrongArity {
        name: String,
        expected: usize,
        got: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSmoothingRadius(r) => {
                write!(f, "Smoothing radius must be finite and > 0, got {}", r)
            }
            ConfigError::NonPositive { name, value } => {
                write!(f, "Parameter '{}' must be > 0, got {}", name, value)
            }
            ConfigError::NonFinite { name } => {
                write!(f, "Parameter '{}' must be a finite number", name)
            }
            ConfigError::ZeroMapSize => write!(f, "Render map size must be at least 1 texel"),
            ConfigError::InvalidSizeDivisor(d) => {
                write!(f, "Blur size divisor must be >= 1, got {}", d)
            }
            ConfigError::BlurKernelTooLarge(r) => write!(
                f,
                "Blur kernel radius must be <= {}, got {}",
                crate::render::blur::MAX_BLUR_KERNEL_RADIUS,
                r
            ),
            ConfigError::InvalidCount { name, value } => {
                write!(f, "Parameter '{}' must be a non-negative count, got {}", name, value)
            }
            ConfigError::UnknownParameter(name) => write!(f, "Unknown parameter '{}'", name),
            ConfigError::WrongArity {
                name,
                expected,
                got,
            } => write!(
                f,
                "Parameter '{}' expects {} value(s), got {}",
                name, expected, got
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors reported by the fluid registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The render object handle was never issued or has been removed.
    UnknownObject(ObjectId),
    /// The target renderer handle was never issued or has been removed.
    UnknownTarget(TargetId),
    /// A parameter value was rejected.
    Config(ConfigError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::UnknownObject(id) => write!(f, "Unknown render object {:?}", id),
            RenderError::UnknownTarget(id) => write!(f, "Unknown target renderer {:?}", id),
            RenderError::Config(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for RenderError {
    fn from(e: ConfigError) -> Self {
        RenderError::Config(e)
    }
}

/// Reject NaN and infinities.
pub(crate) fn ensure_finite(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonFinite { name })
    }
}

/// Reject values that are not finite and strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    let value = ensure_finite(name, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

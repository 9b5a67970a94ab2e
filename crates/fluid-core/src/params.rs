//! Runtime tunables of a registered fluid.
//!
//! Hosts with typed access build a [`Parameter`] directly; control panels
//! that only have a name and a list of numbers go through
//! [`Parameter::parse`].

use glam::Vec3;

use crate::error::ConfigError;
use crate::render::blur::MAX_BLUR_KERNEL_RADIUS;
use crate::render::channel::ChannelKind;
use crate::render::shading::DebugFeature;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Parameter {
    /// World-space particle diameter of one render object.
    ParticleSize(f32),
    ThicknessAlpha(f32),
    Priority(i32),
    FluidColor(Vec3),
    Density(f32),
    RefractionStrength(f32),
    IndexOfRefraction(f32),
    BlurKernel(ChannelKind, u32),
    BlurEnabled(ChannelKind, bool),
    /// `None` renders at output resolution.
    MapSize(ChannelKind, Option<u32>),
    GenerateDiffuse(bool),
    UseVelocity(bool),
    FixedThicknessMode(bool),
    /// `None` turns the debug overlay off.
    Debug(Option<DebugFeature>),
}

impl Parameter {
    /// Parameters stored on the render object rather than on its target.
    pub fn is_object_level(&self) -> bool {
        matches!(
            self,
            Parameter::ParticleSize(_) | Parameter::ThicknessAlpha(_) | Parameter::Priority(_)
        )
    }

    /// Parse `name` and its values.
    ///
    /// Channel-specific names are prefixed with the channel (`depth_`,
    /// `thickness_`, `diffuse_`). Booleans are non-zero for true. `*_map_size`
    /// and `debug` accept an empty list for `None`; `debug` otherwise takes
    /// an index into [`DebugFeature::ALL`].
    pub fn parse(name: &str, values: &[f32]) -> Result<Parameter, ConfigError> {
        let arity = |expected: usize| {
            if values.len() == expected {
                Ok(())
            } else {
                Err(ConfigError::WrongArity {
                    name: name.to_string(),
                    expected,
                    got: values.len(),
                })
            }
        };
        let scalar = || arity(1).map(|_| values[0]);
        let flag = || scalar().map(|v| v != 0.0);
        let optional = || match values {
            [] => Ok(None),
            [v] => Ok(Some(*v)),
            _ => Err(ConfigError::WrongArity {
                name: name.to_string(),
                expected: 1,
                got: values.len(),
            }),
        };

        let param = match name {
            "particle_size" => Parameter::ParticleSize(scalar()?),
            "thickness_alpha" => Parameter::ThicknessAlpha(scalar()?),
            "priority" => Parameter::Priority(scalar()? as i32),
            "fluid_color" => {
                arity(3)?;
                Parameter::FluidColor(Vec3::new(values[0], values[1], values[2]))
            }
            "density" => Parameter::Density(scalar()?),
            "refraction_strength" => Parameter::RefractionStrength(scalar()?),
            "index_of_refraction" => Parameter::IndexOfRefraction(scalar()?),
            "generate_diffuse" => Parameter::GenerateDiffuse(flag()?),
            "use_velocity" => Parameter::UseVelocity(flag()?),
            "fixed_thickness_mode" => Parameter::FixedThicknessMode(flag()?),
            "debug" => match optional()? {
                None => Parameter::Debug(None),
                Some(v) => {
                    let feature = DebugFeature::ALL
                        .get(v as usize)
                        .copied()
                        .filter(|_| v >= 0.0)
                        .ok_or_else(|| ConfigError::UnknownParameter(format!("debug feature {}", v)))?;
                    Parameter::Debug(Some(feature))
                }
            },
            _ => {
                let (kind, rest) = split_channel(name)
                    .ok_or_else(|| ConfigError::UnknownParameter(name.to_string()))?;
                match rest {
                    "blur_kernel" => {
                        let radius = whole(name, scalar()?)?;
                        if radius > MAX_BLUR_KERNEL_RADIUS {
                            return Err(ConfigError::BlurKernelTooLarge(radius));
                        }
                        Parameter::BlurKernel(kind, radius)
                    }
                    "blur_enabled" => Parameter::BlurEnabled(kind, flag()?),
                    "map_size" => match optional()? {
                        None => Parameter::MapSize(kind, None),
                        Some(v) => Parameter::MapSize(kind, Some(whole(name, v)?)),
                    },
                    _ => return Err(ConfigError::UnknownParameter(name.to_string())),
                }
            }
        };
        Ok(param)
    }
}

/// Texel counts arrive as floats; saturates above `u32::MAX`.
fn whole(name: &str, value: f32) -> Result<u32, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidCount {
            name: name.to_string(),
            value,
        });
    }
    Ok(value as u32)
}

fn split_channel(name: &str) -> Option<(ChannelKind, &str)> {
    [
        ("depth_", ChannelKind::Depth),
        ("thickness_", ChannelKind::Thickness),
        ("diffuse_", ChannelKind::Diffuse),
    ]
    .into_iter()
    .find_map(|(prefix, kind)| name.strip_prefix(prefix).map(|rest| (kind, rest)))
}

use crate::config::SphConfig;

/// Material preset for quick configuration of fluid behavior.
#[derive(Clone, Copy, Debug)]
pub struct MaterialPreset {
    pub density_reference: f32,
    pub pressure_constant: f32,
    pub viscosity: f32,
}

impl MaterialPreset {
    /// Water: the simulator defaults.
    pub const WATER: Self = Self {
        density_reference: 2000.0,
        pressure_constant: 20.0,
        viscosity: 0.005,
    };

    /// Honey: stiff and very viscous.
    pub const HONEY: Self = Self {
        density_reference: 2800.0,
        pressure_constant: 35.0,
        viscosity: 0.4,
    };

    /// Mist: light, soft, nearly inviscid.
    pub const MIST: Self = Self {
        density_reference: 400.0,
        pressure_constant: 6.0,
        viscosity: 0.001,
    };

    /// Look up a preset by its lowercase name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "water" => Some(Self::WATER),
            "honey" => Some(Self::HONEY),
            "mist" => Some(Self::MIST),
            _ => None,
        }
    }

    /// Apply this material preset to a simulator config.
    pub fn apply_to(&self, config: &mut SphConfig) {
        config.density_reference = self.density_reference;
        config.pressure_constant = self.pressure_constant;
        config.viscosity = self.viscosity;
    }
}

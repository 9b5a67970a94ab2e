//! SPH liquid simulation and screen-space fluid rendering.
//!
//! The simulation half ([`simulator::Simulator`]) advances particles under
//! pressure, viscosity and gravity with an adaptive time step. The rendering
//! half ([`registry::FluidRegistry`] and [`render`]) turns any particle
//! buffer into a shaded liquid surface through depth, thickness and diffuse
//! channels, without building a mesh.

pub mod boundary;
pub mod config;
pub mod error;
pub mod fluids;
pub mod grid;
pub mod materials;
pub mod math;
pub mod params;
pub mod particle;
pub mod registry;
pub mod render;
pub mod simulator;

pub use config::SphConfig;
pub use error::{ConfigError, RenderError};
pub use params::Parameter;
pub use registry::{FluidRegistry, FrameStats, ObjectId, Registration, TargetId};
pub use simulator::{Simulator, StepStats};

//! Screen-space fluid rendering.
//!
//! Particles are splatted into depth, thickness and (optionally) diffuse
//! channels, the channels are blurred, and a composite pass shades a liquid
//! surface over the scene color. GPU work goes through [`RenderBackend`];
//! [`SoftwareBackend`] runs the same passes on the CPU.

pub mod backend;
pub mod blur;
pub mod camera;
pub mod channel;
pub mod image;
pub mod object;
pub mod shading;
pub mod software;
pub mod target;

pub use backend::{
    CompositeTextures, ParticleBatch, ParticleShader, PassId, RenderBackend, TextureDesc, TextureFormat,
    TextureId,
};
pub use blur::{BlurAxis, BlurKernel, BlurPass, BlurSettings, BlurUniforms};
pub use camera::{Camera, CameraId};
pub use channel::{Channel, ChannelKind};
pub use image::Image;
pub use object::{BufferSource, ParticleSource, RenderObject, SimulationSource};
pub use shading::{CompositeDefines, CompositeUniforms, DebugFeature};
pub use software::SoftwareBackend;
pub use target::{TargetRenderer, TargetSettings, TargetState};

/// Clear value of depth textures: "no fluid here".
pub const FAR_DEPTH: f32 = 1.0e6;

//! fxchain applies chains of pixel filters to RGBA8 images.
//!
//! Filters ([`Invert`], [`Noise`], [`BlendImage`] and the [`Composed`] chain) share one contract,
//! [`Filter`]: an effect with matched CPU and GPU implementations, a neutrality check that lets
//! drivers skip no-op work, and a JSON record form that round-trips through
//! [`filter_from_object`].
//!
//! # Pipeline overview
//!
//! 1. **Build or load**: construct filters directly, or rebuild them from records with a
//!    [`FilterRegistry`]; embedded images load asynchronously and honor a cancellation token.
//! 2. **Drive**: a [`FilterBackend`] from [`create_backend`] elides neutral filters, counts the
//!    passes the chain needs and applies each filter to a fresh [`FilterContext`].
//! 3. **Read**: the backend returns a new [`PixelBuffer`]; the source is never mutated.
//!
//! The CPU backend is always available. The wgpu backend needs the `gpu` feature.
#![forbid(unsafe_code)]

/// Embedded image resources and their loaders.
pub mod assets;
/// The filter contract and the built-in effects.
pub mod filters;
mod foundation;
/// Drivers, execution context, caches and pixel buffers.
pub mod render;

pub use assets::image::{ImageRecord, ImageResource};
pub use assets::loader::{DecodedImage, FsImageLoader, ImageLoader, decode_image};
pub use filters::blend_image::{BlendImage, BlendMode};
pub use filters::composed::Composed;
pub use filters::invert::Invert;
pub use filters::noise::Noise;
pub use filters::registry::{
    FilterFuture, FilterRegistry, FromObjectFn, LoadOptions, erase_filter, filter_from_object,
};
pub use filters::{Filter, ParamValue, main_parameter_is_falsy};
pub use foundation::error::{FxError, FxResult};
pub use render::backend::{BackendKind, BackendOpts, FilterBackend, create_backend};
pub use render::cache::{CacheStats, ProgramCache, TextureCache};
pub use render::context::{CpuSurface, FilterContext};
pub use render::cpu::CpuBackend;
#[cfg(feature = "gpu")]
pub use render::gpu::GpuBackend;
pub use render::pixels::PixelBuffer;
pub use render::scratch_pool::{ScratchPool, ScratchPoolOpts, ScratchPoolStats};

pub use tokio_util::sync::CancellationToken;

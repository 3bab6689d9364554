//! Execution drivers and the state they share with filters.
//!
//! A driver owns the long-lived resources (scratch pool, program and texture caches), builds a
//! fresh [`context::FilterContext`] for each chain it runs and hands it to every filter in turn.

/// Backend selection, options and the driver trait.
pub mod backend;
/// Program and texture caches.
pub mod cache;
/// Per-run execution context.
pub mod context;
/// CPU driver.
pub mod cpu;
/// wgpu driver.
#[cfg(feature = "gpu")]
pub mod gpu;
/// RGBA8 pixel buffers.
pub mod pixels;
/// Named CPU scratch surfaces.
pub mod scratch_pool;
/// WGSL program sources.
#[cfg(feature = "gpu")]
pub mod shaders;

use crate::filters::Filter;
use crate::foundation::error::{FxError, FxResult};
use crate::render::pixels::PixelBuffer;
use crate::render::scratch_pool::ScratchPoolOpts;

/// Which implementation a filter run targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-place pixel arithmetic on [`PixelBuffer`]s.
    Cpu,
    /// wgpu fragment programs; only constructible with the `gpu` feature.
    Gpu,
}

/// Driver configuration shared by both backends.
#[derive(Clone, Debug)]
pub struct BackendOpts {
    /// Skip filters whose parameters make them a no-op.
    pub elide_neutral: bool,
    /// CPU scratch surface budget.
    pub pool: ScratchPoolOpts,
    /// Maximum number of image textures kept uploaded by the GPU backend.
    pub texture_cache_capacity: usize,
}

impl Default for BackendOpts {
    fn default() -> Self {
        Self {
            elide_neutral: true,
            pool: ScratchPoolOpts::default(),
            texture_cache_capacity: 32,
        }
    }
}

impl BackendOpts {
    /// Defaults overridden by `FXCHAIN_*` environment variables.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut opts = Self::default();
        if let Some(v) = std::env::var("FXCHAIN_ELIDE_NEUTRAL")
            .ok()
            .and_then(|v| parse_flag(&v))
        {
            opts.elide_neutral = v;
        }
        if let Some(n) = std::env::var("FXCHAIN_SCRATCH_POOL_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            opts.pool.max_retained_bytes = n;
        }
        if let Some(n) = std::env::var("FXCHAIN_TEXTURE_CACHE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
        {
            opts.texture_cache_capacity = n;
        }
        opts
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Runs a list of top-level filters over a source image.
pub trait FilterBackend {
    /// The implementation this backend drives.
    fn kind(&self) -> BackendKind;

    /// Apply `filters` in order and return the result; `source` is left untouched.
    fn apply_filters(
        &mut self,
        filters: &[Box<dyn Filter>],
        source: &PixelBuffer,
    ) -> FxResult<PixelBuffer>;
}

/// Construct the requested backend.
pub fn create_backend(kind: BackendKind, opts: BackendOpts) -> FxResult<Box<dyn FilterBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(crate::render::cpu::CpuBackend::new(opts))),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => Ok(Box::new(crate::render::gpu::GpuBackend::new(opts)?)),
        #[cfg(not(feature = "gpu"))]
        BackendKind::Gpu => Err(FxError::render(
            "gpu backend requested but fxchain was built without the `gpu` feature",
        )),
    }
}

/// The filters a driver will actually run, after optional neutral elision.
pub(crate) fn active_filters<'f>(
    filters: &'f [Box<dyn Filter>],
    elide_neutral: bool,
) -> Vec<&'f dyn Filter> {
    filters
        .iter()
        .filter(|f| {
            let skip = elide_neutral && f.is_neutral_state();
            if skip {
                tracing::debug!(filter = f.filter_type(), "skipping neutral filter");
            }
            !skip
        })
        .map(|f| f.as_ref())
        .collect()
}

pub(crate) fn initial_passes(active: &[&dyn Filter]) -> FxResult<i32> {
    i32::try_from(active.len()).map_err(|_| FxError::validation("too many filters in one chain"))
}

#[cfg(test)]
#[path = "../../tests/unit/render/backend.rs"]
mod tests;

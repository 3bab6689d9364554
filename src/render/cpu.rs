use crate::filters::Filter;
use crate::foundation::error::FxResult;
use crate::render::backend::{BackendKind, BackendOpts, FilterBackend, active_filters, initial_passes};
use crate::render::context::FilterContext;
use crate::render::pixels::PixelBuffer;
use crate::render::scratch_pool::{ScratchPool, ScratchPoolStats};

/// Applies filters by mutating a copy of the source buffer in place.
///
/// The scratch pool outlives individual runs so repeated chains of the same size allocate nothing.
pub struct CpuBackend {
    opts: BackendOpts,
    pool: ScratchPool,
}

impl CpuBackend {
    /// Create a backend with an empty scratch pool.
    pub fn new(opts: BackendOpts) -> Self {
        let pool = ScratchPool::new(opts.pool);
        Self { opts, pool }
    }

    /// Scratch pool counters.
    pub fn pool_stats(&self) -> ScratchPoolStats {
        self.pool.stats()
    }

    /// The scratch pool shared by every run on this backend.
    pub fn pool(&self) -> &ScratchPool {
        &self.pool
    }
}

impl FilterBackend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    #[tracing::instrument(skip_all, fields(backend = "cpu", filters = filters.len()))]
    fn apply_filters(
        &mut self,
        filters: &[Box<dyn Filter>],
        source: &PixelBuffer,
    ) -> FxResult<PixelBuffer> {
        let active = active_filters(filters, self.opts.elide_neutral);
        let mut image = source.clone();
        if active.is_empty() {
            return Ok(image);
        }

        let passes = initial_passes(&active)?;
        {
            let mut ctx = FilterContext::cpu(&mut image, &mut self.pool, passes);
            for filter in &active {
                filter.apply_to(&mut ctx)?;
            }
            tracing::debug!(passes = ctx.passes, "cpu chain finished");
        }
        self.pool.trim();
        Ok(image)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;

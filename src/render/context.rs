use crate::foundation::error::FxResult;
use crate::render::backend::BackendKind;
use crate::render::pixels::PixelBuffer;
use crate::render::scratch_pool::ScratchPool;

/// The CPU target of one filter-chain run: the pixels being filtered and the backend's scratch pool.
pub struct CpuSurface<'a> {
    /// Pixels mutated in place by each filter.
    pub image: &'a mut PixelBuffer,
    /// Named off-screen surfaces shared across filters and runs.
    pub resources: &'a mut ScratchPool,
}

pub(crate) enum Surface<'a> {
    Cpu(CpuSurface<'a>),
    #[cfg(feature = "gpu")]
    Gpu(crate::render::gpu::GpuSurface<'a>),
}

/// Execution context handed to [`crate::Filter::apply_to`].
///
/// Built fresh by a driver for each top-level run and never retained by filters.
pub struct FilterContext<'a> {
    /// Rendering passes the chain still requires.
    ///
    /// Starts at the number of top-level filters; a composed filter adds `len - 1` before running
    /// its members, and each GPU draw consumes one.
    pub passes: i32,
    /// GPU draws issued so far in this run.
    pub pass: u32,
    pub(crate) surface: Surface<'a>,
}

impl<'a> FilterContext<'a> {
    /// Context targeting a CPU pixel buffer.
    pub fn cpu(image: &'a mut PixelBuffer, resources: &'a mut ScratchPool, passes: i32) -> Self {
        Self {
            passes,
            pass: 0,
            surface: Surface::Cpu(CpuSurface { image, resources }),
        }
    }

    /// The backend this context targets.
    pub fn backend(&self) -> BackendKind {
        match self.surface {
            Surface::Cpu(_) => BackendKind::Cpu,
            #[cfg(feature = "gpu")]
            Surface::Gpu(_) => BackendKind::Gpu,
        }
    }

    /// Target surface width.
    pub fn width(&self) -> u32 {
        match &self.surface {
            Surface::Cpu(s) => s.image.width,
            #[cfg(feature = "gpu")]
            Surface::Gpu(s) => s.width(),
        }
    }

    /// Target surface height.
    pub fn height(&self) -> u32 {
        match &self.surface {
            Surface::Cpu(s) => s.image.height,
            #[cfg(feature = "gpu")]
            Surface::Gpu(s) => s.height(),
        }
    }

    /// The CPU surface, or a render error when the context targets the GPU.
    pub fn cpu_surface(&mut self) -> FxResult<&mut CpuSurface<'a>> {
        match &mut self.surface {
            Surface::Cpu(s) => Ok(s),
            #[cfg(feature = "gpu")]
            Surface::Gpu(_) => Err(crate::FxError::render(
                "cpu filter path invoked on a gpu execution context",
            )),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/context.rs"]
mod tests;

use std::collections::HashMap;

use crate::foundation::error::{FxError, FxResult};
use crate::render::pixels::PixelBuffer;

/// Pool configuration for CPU scratch surfaces.
#[derive(Debug, Clone, Copy)]
pub struct ScratchPoolOpts {
    /// Maximum bytes retained across all named surfaces once a chain finishes. Surfaces used by
    /// the chain that just finished are kept even when they alone exceed it.
    pub max_retained_bytes: usize,
}

impl Default for ScratchPoolOpts {
    fn default() -> Self {
        Self {
            max_retained_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Counters describing how the pool has been used.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScratchPoolStats {
    /// Surfaces created from nothing.
    pub allocations: u64,
    /// Existing surfaces resized in place because the requested dimensions changed.
    pub resizes: u64,
    /// Existing surfaces cleared and handed back at the same size.
    pub reuses: u64,
    /// Surfaces dropped by [`ScratchPool::trim`].
    pub dropped: u64,
    /// Bytes currently held.
    pub retained_bytes: usize,
}

/// Named off-screen pixel surfaces shared by every filter run on one CPU backend.
///
/// A name identifies a role (for example the blend-image staging surface), not a size: asking for
/// the same name with new dimensions resizes the existing surface instead of allocating another.
#[derive(Debug)]
pub struct ScratchPool {
    opts: ScratchPoolOpts,
    stats: ScratchPoolStats,
    surfaces: HashMap<String, Slot>,
    run: u64,
}

#[derive(Debug)]
struct Slot {
    surface: PixelBuffer,
    last_run: u64,
}

impl ScratchPool {
    /// Create an empty pool.
    pub fn new(opts: ScratchPoolOpts) -> Self {
        Self {
            opts,
            stats: ScratchPoolStats::default(),
            surfaces: HashMap::new(),
            run: 0,
        }
    }

    /// Usage counters.
    pub fn stats(&self) -> ScratchPoolStats {
        self.stats.clone()
    }

    /// Whether a surface with this name is currently retained.
    pub fn contains(&self, name: &str) -> bool {
        self.surfaces.contains_key(name)
    }

    /// Return the surface called `name`, cleared to transparent and sized `width x height`.
    pub fn acquire(&mut self, name: &str, width: u32, height: u32) -> FxResult<&mut PixelBuffer> {
        let run = self.run;
        if !self.surfaces.contains_key(name) {
            let surface = PixelBuffer::new(width, height)?;
            self.stats.allocations = self.stats.allocations.saturating_add(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(surface.data.len());
            tracing::debug!(name, width, height, "allocated scratch surface");
            let slot = self.surfaces.entry(name.to_string()).or_insert(Slot {
                surface,
                last_run: run,
            });
            return Ok(&mut slot.surface);
        }

        let slot = self
            .surfaces
            .get_mut(name)
            .ok_or_else(|| FxError::render(format!("scratch surface '{name}' vanished")))?;
        slot.last_run = run;
        let surface = &mut slot.surface;
        if surface.width != width || surface.height != height {
            let before = surface.data.len();
            surface.reset(width, height)?;
            self.stats.retained_bytes = self
                .stats
                .retained_bytes
                .saturating_sub(before)
                .saturating_add(surface.data.len());
            self.stats.resizes = self.stats.resizes.saturating_add(1);
            tracing::debug!(name, width, height, "resized scratch surface");
        } else {
            surface.clear();
            self.stats.reuses = self.stats.reuses.saturating_add(1);
        }
        Ok(surface)
    }

    /// End the current run: drop idle surfaces, largest first, until the pool fits its byte
    /// budget. A surface is idle when nothing acquired it since the previous `trim`.
    pub fn trim(&mut self) {
        let run = self.run;
        while self.stats.retained_bytes > self.opts.max_retained_bytes {
            let Some(name) = self
                .surfaces
                .iter()
                .filter(|(_, slot)| slot.last_run < run)
                .max_by_key(|(_, slot)| slot.surface.data.len())
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            if let Some(slot) = self.surfaces.remove(&name) {
                self.stats.retained_bytes = self
                    .stats
                    .retained_bytes
                    .saturating_sub(slot.surface.data.len());
                self.stats.dropped = self.stats.dropped.saturating_add(1);
                tracing::debug!(name = %name, "dropped idle scratch surface over budget");
            }
        }
        self.run = self.run.wrapping_add(1);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/scratch_pool.rs"]
mod tests;

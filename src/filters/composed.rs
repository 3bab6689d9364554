use serde::{Deserialize, Serialize};

use crate::filters::registry::LoadOptions;
use crate::filters::{Filter, expect_type};
use crate::foundation::cancel::guard;
use crate::foundation::error::{FxError, FxResult};
use crate::render::context::FilterContext;

/// An ordered chain of filters applied as one.
#[derive(Debug, Default)]
pub struct Composed {
    sub_filters: Vec<Box<dyn Filter>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComposedRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    sub_filters: Vec<serde_json::Value>,
}

impl Composed {
    /// Serialization tag.
    pub const TYPE: &'static str = "Composed";

    /// Chain `sub_filters` in order.
    pub fn new(sub_filters: Vec<Box<dyn Filter>>) -> Self {
        Self { sub_filters }
    }

    /// Append a filter to the end of the chain.
    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.sub_filters.push(filter);
    }

    /// Insert a filter at `index`; fails when `index > len`.
    pub fn insert(&mut self, index: usize, filter: Box<dyn Filter>) -> FxResult<()> {
        if index > self.sub_filters.len() {
            return Err(FxError::validation(format!(
                "insert index {index} out of range for {} sub-filters",
                self.sub_filters.len()
            )));
        }
        self.sub_filters.insert(index, filter);
        Ok(())
    }

    /// Remove and return the filter at `index`, if any.
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Filter>> {
        (index < self.sub_filters.len()).then(|| self.sub_filters.remove(index))
    }

    /// The chain, in application order.
    pub fn sub_filters(&self) -> &[Box<dyn Filter>] {
        &self.sub_filters
    }

    /// Number of sub-filters.
    pub fn len(&self) -> usize {
        self.sub_filters.len()
    }

    /// `true` for an empty chain.
    pub fn is_empty(&self) -> bool {
        self.sub_filters.is_empty()
    }

    /// Rebuild every sub-filter concurrently, then the chain.
    ///
    /// The first failure or a fired signal rejects the whole reconstruction; the remaining loads
    /// are dropped and no partial chain is returned.
    #[tracing::instrument(skip_all)]
    pub async fn from_object(object: serde_json::Value, opts: LoadOptions) -> FxResult<Self> {
        expect_type(&object, Self::TYPE)?;
        let record: ComposedRecord = serde_json::from_value(object)
            .map_err(|e| FxError::validation(format!("invalid Composed record: {e}")))?;

        let pending = record
            .sub_filters
            .into_iter()
            .map(|sub| opts.registry.from_object(sub, opts.clone()))
            .collect::<FxResult<Vec<_>>>()?;
        let sub_filters = guard(
            opts.signal.as_ref(),
            "composed filter load",
            futures::future::try_join_all(pending),
        )
        .await?;
        tracing::debug!(count = sub_filters.len(), "composed filter rebuilt");
        Ok(Self::new(sub_filters))
    }

    fn pass_delta(&self) -> FxResult<i32> {
        i32::try_from(self.sub_filters.len())
            .map(|n| n - 1)
            .map_err(|_| FxError::validation("too many sub-filters"))
    }

    // Both backend paths land here so the pass adjustment happens exactly once per chain.
    fn apply_members(&self, ctx: &mut FilterContext<'_>) -> FxResult<()> {
        ctx.passes += self.pass_delta()?;
        for filter in &self.sub_filters {
            filter.apply_to(ctx)?;
        }
        Ok(())
    }
}

impl Filter for Composed {
    fn filter_type(&self) -> &'static str {
        Self::TYPE
    }

    fn is_neutral_state(&self) -> bool {
        self.sub_filters.iter().all(|f| f.is_neutral_state())
    }

    fn apply_to_cpu(&self, ctx: &mut FilterContext<'_>) -> FxResult<()> {
        self.apply_members(ctx)
    }

    #[cfg(feature = "gpu")]
    fn apply_to_gpu(&self, ctx: &mut FilterContext<'_>) -> FxResult<()> {
        self.apply_members(ctx)
    }

    fn to_object(&self) -> FxResult<serde_json::Value> {
        let sub_filters = self
            .sub_filters
            .iter()
            .map(|f| f.to_object())
            .collect::<FxResult<Vec<_>>>()?;
        Ok(serde_json::to_value(ComposedRecord {
            kind: Self::TYPE.to_string(),
            sub_filters,
        })?)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/filters/composed.rs"]
mod tests;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::assets::loader::ImageLoader;
use crate::filters::Filter;
use crate::filters::blend_image::BlendImage;
use crate::filters::composed::Composed;
use crate::filters::invert::Invert;
use crate::filters::noise::Noise;
use crate::foundation::error::{FxError, FxResult};

/// A pending reconstruction of one filter.
pub type FilterFuture = BoxFuture<'static, FxResult<Box<dyn Filter>>>;

/// Associated `from_object` constructor stored per filter type.
pub type FromObjectFn = fn(serde_json::Value, LoadOptions) -> FilterFuture;

/// Everything a `from_object` call may need beyond the record itself.
#[derive(Clone)]
pub struct LoadOptions {
    /// Type lookup for nested records.
    pub registry: Arc<FilterRegistry>,
    /// Fetches pixels for embedded images.
    pub loader: Arc<dyn ImageLoader>,
    /// Aborts the whole reconstruction when cancelled.
    pub signal: Option<CancellationToken>,
}

impl LoadOptions {
    /// Options without a cancellation signal.
    pub fn new(registry: Arc<FilterRegistry>, loader: Arc<dyn ImageLoader>) -> Self {
        Self {
            registry,
            loader,
            signal: None,
        }
    }

    /// Attach a cancellation signal shared by every nested load.
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

impl std::fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOptions")
            .field("registry", &self.registry)
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

/// Maps serialized `type` tags to their constructors.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    constructors: HashMap<String, FromObjectFn>,
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.constructors.keys().collect();
        types.sort();
        f.debug_struct("FilterRegistry")
            .field("types", &types)
            .finish()
    }
}

/// Box a concrete `from_object` future as a registry constructor result.
pub fn erase_filter<T, Fut>(fut: Fut) -> FilterFuture
where
    T: Filter + 'static,
    Fut: Future<Output = FxResult<T>> + Send + 'static,
{
    async move { Ok(Box::new(fut.await?) as Box<dyn Filter>) }.boxed()
}

impl FilterRegistry {
    /// A registry with no types.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry knowing every filter this crate ships.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Invert::TYPE, |o, opts| erase_filter(Invert::from_object(o, opts)));
        registry.register(Noise::TYPE, |o, opts| erase_filter(Noise::from_object(o, opts)));
        registry.register(BlendImage::TYPE, |o, opts| {
            erase_filter(BlendImage::from_object(o, opts))
        });
        registry.register(Composed::TYPE, |o, opts| {
            erase_filter(Composed::from_object(o, opts))
        });
        registry
    }

    /// Add or replace the constructor for `filter_type`.
    pub fn register(&mut self, filter_type: impl Into<String>, ctor: FromObjectFn) {
        self.constructors.insert(filter_type.into(), ctor);
    }

    /// Whether `filter_type` can be reconstructed.
    pub fn contains(&self, filter_type: &str) -> bool {
        self.constructors.contains_key(filter_type)
    }

    /// Start reconstructing `object` with the constructor registered for its `type`.
    ///
    /// Unknown or missing types fail before any loading starts.
    pub fn from_object(&self, object: serde_json::Value, opts: LoadOptions) -> FxResult<FilterFuture> {
        let filter_type = object
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| FxError::validation("filter record is missing its type"))?;
        let ctor = self
            .constructors
            .get(filter_type)
            .ok_or_else(|| FxError::validation(format!("unknown filter type '{filter_type}'")))?;
        Ok(ctor(object, opts))
    }
}

/// Reconstruct any registered filter from its record.
#[tracing::instrument(skip_all)]
pub async fn filter_from_object(
    object: serde_json::Value,
    opts: LoadOptions,
) -> FxResult<Box<dyn Filter>> {
    let registry = Arc::clone(&opts.registry);
    registry.from_object(object, opts)?.await
}

#[cfg(test)]
#[path = "../../tests/unit/filters/registry.rs"]
mod tests;

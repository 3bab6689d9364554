//! The filter contract and the built-in effects.
//!
//! A filter is a named pixel effect with matched CPU and GPU implementations. Filters are applied
//! through [`Filter::apply_to`], which picks the implementation from the execution context, and
//! are serialized to plain JSON records tagged with their `type`.

pub mod blend_image;
pub mod composed;
pub mod invert;
pub mod noise;
pub mod registry;

use crate::foundation::error::FxResult;
use crate::render::backend::BackendKind;
use crate::render::context::FilterContext;

/// A parameter value as seen by the neutrality policy.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// Boolean switch.
    Bool(bool),
    /// Numeric magnitude.
    Number(f64),
    /// Enumerated or free-form text.
    Text(String),
    /// An embedded resource; `true` when one is attached.
    Resource(bool),
}

impl ParamValue {
    /// `false`, `0`, `NaN`, `""` and a missing resource are falsy.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Bool(b) => !b,
            Self::Number(n) => *n == 0.0 || n.is_nan(),
            Self::Text(s) => s.is_empty(),
            Self::Resource(present) => !present,
        }
    }
}

/// A single image effect.
pub trait Filter: std::fmt::Debug + Send + Sync {
    /// Unique discriminator; also the serialization tag and the default program cache key.
    fn filter_type(&self) -> &'static str;

    /// Name of the parameter whose value decides the default neutrality, if there is one.
    fn main_parameter(&self) -> Option<&'static str> {
        None
    }

    /// Current value of a named parameter.
    fn parameter(&self, name: &str) -> Option<ParamValue> {
        let _ = name;
        None
    }

    /// `true` when applying the filter would not change the output.
    ///
    /// Drivers may skip neutral filters; nothing else depends on this being called.
    fn is_neutral_state(&self) -> bool {
        main_parameter_is_falsy(self)
    }

    /// Apply to the context's surface, dispatching on the backend it targets.
    fn apply_to(&self, ctx: &mut FilterContext<'_>) -> FxResult<()> {
        match ctx.backend() {
            BackendKind::Cpu => self.apply_to_cpu(ctx),
            #[cfg(feature = "gpu")]
            BackendKind::Gpu => self.apply_to_gpu(ctx),
            #[cfg(not(feature = "gpu"))]
            BackendKind::Gpu => Err(crate::FxError::render("gpu support is not compiled in")),
        }
    }

    /// Mutate the context's CPU pixel buffer in place.
    fn apply_to_cpu(&self, ctx: &mut FilterContext<'_>) -> FxResult<()>;

    /// Draw the effect with the GPU backend.
    #[cfg(feature = "gpu")]
    fn apply_to_gpu(&self, ctx: &mut FilterContext<'_>) -> FxResult<()>;

    /// Plain record with `type` plus everything needed to rebuild the filter.
    fn to_object(&self) -> FxResult<serde_json::Value>;
}

/// Default neutrality policy: neutral iff the main parameter is falsy.
///
/// Filters without a main parameter are never neutral unless they override
/// [`Filter::is_neutral_state`].
pub fn main_parameter_is_falsy<F: Filter + ?Sized>(filter: &F) -> bool {
    let Some(name) = filter.main_parameter() else {
        return false;
    };
    filter.parameter(name).is_some_and(|v| v.is_falsy())
}

pub(crate) fn expect_type(record: &serde_json::Value, expected: &str) -> FxResult<()> {
    match record.get("type").and_then(|t| t.as_str()) {
        Some(t) if t == expected => Ok(()),
        Some(t) => Err(crate::FxError::validation(format!(
            "expected '{expected}' record, got type '{t}'"
        ))),
        None => Err(crate::FxError::validation(format!(
            "'{expected}' record is missing its type"
        ))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/filters/mod.rs"]
mod tests;

use super::*;

use crate::filters::blend_image::{BLEND_SURFACE, BlendImage, BlendMode};
use crate::filters::composed::Composed;
use crate::filters::invert::Invert;
use crate::filters::noise::Noise;
use crate::render::scratch_pool::ScratchPoolOpts;
use crate::{FxError, ImageResource};

fn source() -> PixelBuffer {
    PixelBuffer::from_rgba8(2, 1, vec![0, 50, 100, 255, 200, 150, 100, 50]).unwrap()
}

#[test]
fn empty_chain_returns_a_copy() {
    let mut backend = CpuBackend::new(BackendOpts::default());
    let out = backend.apply_filters(&[], &source()).unwrap();
    assert_eq!(out, source());
}

#[test]
fn source_is_never_mutated() {
    let src = source();
    let mut backend = CpuBackend::new(BackendOpts::default());
    let filters: Vec<Box<dyn Filter>> = vec![Box::new(Invert::new())];
    let out = backend.apply_filters(&filters, &src).unwrap();
    assert_eq!(src, source());
    assert_eq!(out.pixel(0, 0), Some([255, 205, 155, 255]));
}

#[test]
fn runs_filters_in_order() {
    let filters: Vec<Box<dyn Filter>> = vec![
        Box::new(Invert::new().with_alpha(true)),
        Box::new(Composed::new(vec![Box::new(Invert::new())])),
    ];
    let mut backend = CpuBackend::new(BackendOpts::default());
    let out = backend.apply_filters(&filters, &source()).unwrap();
    assert_eq!(out.pixel(0, 0), Some([0, 50, 100, 0]));
    assert_eq!(out.pixel(1, 0), Some([200, 150, 100, 205]));
}

#[test]
fn neutral_filters_are_skipped_when_eliding() {
    let filters: Vec<Box<dyn Filter>> = vec![
        Box::new(Noise::new(0.0)),
        Box::new(Invert {
            invert: false,
            alpha: false,
        }),
    ];
    for elide_neutral in [true, false] {
        let mut backend = CpuBackend::new(BackendOpts {
            elide_neutral,
            ..BackendOpts::default()
        });
        assert_eq!(backend.apply_filters(&filters, &source()).unwrap(), source());
    }
}

#[test]
fn pool_is_shared_across_runs_and_trimmed_to_budget() {
    let image = ImageResource::from_rgba8(1, 1, vec![255, 255, 255, 255]).unwrap();
    let filters: Vec<Box<dyn Filter>> = vec![Box::new(BlendImage::new(image, BlendMode::Multiply))];

    let mut backend = CpuBackend::new(BackendOpts::default());
    backend.apply_filters(&filters, &source()).unwrap();
    backend.apply_filters(&filters, &source()).unwrap();
    assert!(backend.pool().contains(BLEND_SURFACE));
    assert_eq!(backend.pool_stats().allocations, 1);
    assert_eq!(backend.pool_stats().reuses, 1);

    let mut tight = CpuBackend::new(BackendOpts {
        pool: ScratchPoolOpts {
            max_retained_bytes: 0,
        },
        ..BackendOpts::default()
    });
    tight.apply_filters(&filters, &source()).unwrap();
    tight.apply_filters(&filters, &source()).unwrap();
    assert!(tight.pool().contains(BLEND_SURFACE));
    assert_eq!(tight.pool_stats().allocations, 1);
    assert_eq!(tight.pool_stats().reuses, 1);
    assert_eq!(tight.pool_stats().dropped, 0);

    let invert_only: Vec<Box<dyn Filter>> = vec![Box::new(Invert::new())];
    tight.apply_filters(&invert_only, &source()).unwrap();
    assert!(!tight.pool().contains(BLEND_SURFACE));
    assert_eq!(tight.pool_stats().dropped, 1);
}

#[test]
fn staging_surface_over_budget_is_not_reallocated_per_frame() {
    let image = ImageResource::from_rgba8(1, 1, vec![255, 255, 255, 255]).unwrap();
    let filters: Vec<Box<dyn Filter>> = vec![Box::new(BlendImage::new(image, BlendMode::Multiply))];
    let src = PixelBuffer::filled(64, 64, [10, 20, 30, 255]).unwrap();
    let mut backend = CpuBackend::new(BackendOpts {
        pool: ScratchPoolOpts {
            max_retained_bytes: 32 * 32 * 4,
        },
        ..BackendOpts::default()
    });

    for _ in 0..3 {
        backend.apply_filters(&filters, &src).unwrap();
    }
    let st = backend.pool_stats();
    assert_eq!(st.allocations, 1);
    assert_eq!(st.reuses, 2);
    assert_eq!(st.dropped, 0);
}

#[derive(Debug)]
struct Failing;

impl Filter for Failing {
    fn filter_type(&self) -> &'static str {
        "Failing"
    }

    fn apply_to_cpu(&self, _ctx: &mut FilterContext<'_>) -> FxResult<()> {
        Err(FxError::render("boom"))
    }

    #[cfg(feature = "gpu")]
    fn apply_to_gpu(&self, _ctx: &mut FilterContext<'_>) -> FxResult<()> {
        Err(FxError::render("boom"))
    }

    fn to_object(&self) -> FxResult<serde_json::Value> {
        Ok(serde_json::json!({ "type": "Failing" }))
    }
}

#[test]
fn filter_errors_propagate() {
    let mut backend = CpuBackend::new(BackendOpts::default());
    let filters: Vec<Box<dyn Filter>> = vec![Box::new(Failing)];
    let err = backend.apply_filters(&filters, &source()).unwrap_err();
    assert!(matches!(err, FxError::Render(_)));
}

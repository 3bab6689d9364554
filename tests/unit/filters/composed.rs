use super::*;

use std::sync::Arc;

use futures::executor::block_on;

use crate::assets::loader::FsImageLoader;
use crate::filters::invert::Invert;
use crate::filters::noise::Noise;
use crate::filters::registry::FilterRegistry;
use crate::render::pixels::PixelBuffer;
use crate::render::scratch_pool::{ScratchPool, ScratchPoolOpts};

fn load_options() -> LoadOptions {
    LoadOptions::new(
        Arc::new(FilterRegistry::with_builtin()),
        Arc::new(FsImageLoader::default()),
    )
}

fn passes_after(filter: &dyn Filter, start: i32) -> i32 {
    let mut img = PixelBuffer::filled(2, 2, [1, 2, 3, 4]).unwrap();
    let mut pool = ScratchPool::new(ScratchPoolOpts::default());
    let mut ctx = FilterContext::cpu(&mut img, &mut pool, start);
    filter.apply_to(&mut ctx).unwrap();
    ctx.passes
}

#[test]
fn adds_len_minus_one_passes() {
    let chain = Composed::new(vec![
        Box::new(Invert::new()),
        Box::new(Noise::new(0.0)),
        Box::new(Invert::new()),
    ]);
    assert_eq!(passes_after(&chain, 1), 3);
    assert_eq!(passes_after(&chain, 5), 7);
}

#[test]
fn backend_entry_points_keep_pass_accounting() {
    let chain = Composed::new(vec![Box::new(Invert::new()), Box::new(Invert::new())]);
    let mut img = PixelBuffer::filled(1, 1, [10, 20, 30, 40]).unwrap();
    let mut pool = ScratchPool::new(ScratchPoolOpts::default());
    let mut ctx = FilterContext::cpu(&mut img, &mut pool, 1);
    chain.apply_to_cpu(&mut ctx).unwrap();
    assert_eq!(ctx.passes, 2);
    assert_eq!(img.pixel(0, 0), Some([10, 20, 30, 40]));
}

#[test]
fn nested_chains_accumulate_pass_adjustments() {
    let inner = Composed::new(vec![Box::new(Invert::new()), Box::new(Invert::new())]);
    let outer = Composed::new(vec![Box::new(inner), Box::new(Noise::new(1.0))]);
    // outer adds 1, inner adds 1
    assert_eq!(passes_after(&outer, 1), 3);
}

#[test]
fn applies_members_in_order() {
    let chain = Composed::new(vec![
        Box::new(Invert::new()),
        Box::new(Invert::new().with_alpha(true)),
    ]);
    let mut img = PixelBuffer::filled(1, 1, [10, 20, 30, 40]).unwrap();
    let mut pool = ScratchPool::new(ScratchPoolOpts::default());
    let mut ctx = FilterContext::cpu(&mut img, &mut pool, 1);
    chain.apply_to(&mut ctx).unwrap();
    assert_eq!(img.pixel(0, 0), Some([10, 20, 30, 215]));
}

#[test]
fn neutral_only_when_every_member_is() {
    let mut chain = Composed::new(vec![
        Box::new(Invert {
            invert: false,
            alpha: false,
        }),
        Box::new(Noise::new(0.0)),
    ]);
    assert!(chain.is_neutral_state());
    chain.push(Box::new(Invert::new()));
    assert!(!chain.is_neutral_state());
    assert!(Composed::default().is_neutral_state());
}

#[test]
fn list_operations() {
    let mut chain = Composed::default();
    assert!(chain.is_empty());
    chain.push(Box::new(Noise::new(1.0)));
    chain.insert(0, Box::new(Invert::new())).unwrap();
    assert!(chain.insert(5, Box::new(Invert::new())).is_err());
    assert_eq!(chain.len(), 2);
    let types: Vec<_> = chain.sub_filters().iter().map(|f| f.filter_type()).collect();
    assert_eq!(types, vec!["Invert", "Noise"]);

    let removed = chain.remove(0).unwrap();
    assert_eq!(removed.filter_type(), "Invert");
    assert!(chain.remove(3).is_none());
    assert_eq!(chain.len(), 1);
}

#[test]
fn record_nests_sub_filter_records() {
    let chain = Composed::new(vec![Box::new(Invert::new()), Box::new(Noise::new(4.0))]);
    let obj = chain.to_object().unwrap();
    assert_eq!(
        obj,
        serde_json::json!({
            "type": "Composed",
            "subFilters": [
                { "type": "Invert", "invert": true, "alpha": false },
                { "type": "Noise", "noise": 4.0 },
            ],
        })
    );

    let back = block_on(Composed::from_object(obj.clone(), load_options())).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back.to_object().unwrap(), obj);
}

#[test]
fn unknown_member_type_fails_whole_chain() {
    let obj = serde_json::json!({
        "type": "Composed",
        "subFilters": [{ "type": "Invert", "invert": true }, { "type": "Sepia" }],
    });
    let err = block_on(Composed::from_object(obj, load_options())).unwrap_err();
    assert!(matches!(err, FxError::Validation(_)));
}

#[test]
fn cancelled_signal_rejects_without_a_chain() {
    let token = tokio_util::sync::CancellationToken::new();
    token.cancel();
    let obj = serde_json::json!({
        "type": "Composed",
        "subFilters": [{ "type": "Invert", "invert": true }],
    });
    let err = block_on(Composed::from_object(obj, load_options().with_signal(token))).unwrap_err();
    assert!(err.is_cancelled());
}

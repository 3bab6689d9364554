use super::*;

use std::sync::Arc;

use crate::assets::loader::FsImageLoader;
use crate::filters::registry::FilterRegistry;
use crate::render::pixels::PixelBuffer;
use crate::render::scratch_pool::{ScratchPool, ScratchPoolOpts};

fn load_options() -> LoadOptions {
    LoadOptions::new(
        Arc::new(FilterRegistry::with_builtin()),
        Arc::new(FsImageLoader::default()),
    )
}

fn run(filter: &Invert, image: &mut PixelBuffer) {
    let mut pool = ScratchPool::new(ScratchPoolOpts::default());
    let mut ctx = FilterContext::cpu(image, &mut pool, 1);
    filter.apply_to(&mut ctx).unwrap();
}

fn sample() -> PixelBuffer {
    PixelBuffer::from_rgba8(2, 1, vec![0, 100, 255, 30, 7, 128, 200, 255]).unwrap()
}

#[test]
fn inverts_color_and_keeps_alpha() {
    let mut img = sample();
    run(&Invert::new(), &mut img);
    assert_eq!(img.data, vec![255, 155, 0, 30, 248, 127, 55, 255]);
}

#[test]
fn alpha_flag_inverts_alpha_too() {
    let mut img = sample();
    run(&Invert::new().with_alpha(true), &mut img);
    assert_eq!(img.pixel(0, 0), Some([255, 155, 0, 225]));
    assert_eq!(img.pixel(1, 0), Some([248, 127, 55, 0]));
}

#[test]
fn double_inversion_restores_every_byte() {
    let data: Vec<u8> = (0..=255u8).flat_map(|v| [v, 255 - v, v / 2, v]).collect();
    let mut img = PixelBuffer::from_rgba8(256, 1, data.clone()).unwrap();
    run(&Invert::new(), &mut img);
    run(&Invert::new(), &mut img);
    assert_eq!(img.data, data);
}

#[test]
fn disabled_invert_is_neutral_and_a_no_op() {
    let off = Invert {
        invert: false,
        alpha: true,
    };
    assert!(off.is_neutral_state());
    assert!(!Invert::new().is_neutral_state());
    assert!(!Invert::new().with_alpha(true).is_neutral_state());

    let mut img = sample();
    run(&off, &mut img);
    assert_eq!(img, sample());
}

#[test]
fn record_round_trip_and_defaults() {
    let f = Invert::new().with_alpha(true);
    let obj = f.to_object().unwrap();
    assert_eq!(
        obj,
        serde_json::json!({ "type": "Invert", "invert": true, "alpha": true })
    );

    let opts = load_options();
    let back = futures::executor::block_on(Invert::from_object(obj, opts.clone())).unwrap();
    assert_eq!(back, f);

    let partial = serde_json::json!({ "type": "Invert", "invert": true });
    let back = futures::executor::block_on(Invert::from_object(partial, opts.clone())).unwrap();
    assert!(!back.alpha);

    let missing = serde_json::json!({ "type": "Invert" });
    let err = futures::executor::block_on(Invert::from_object(missing, opts)).unwrap_err();
    assert!(matches!(err, FxError::Validation(_)));
}

use super::*;

use std::sync::atomic::AtomicUsize;

use futures::executor::block_on;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::assets::loader::{FsImageLoader, ImageLoader};
use crate::filters::registry::FilterRegistry;

fn checker() -> ImageResource {
    ImageResource::from_rgba8(2, 1, vec![255, 0, 0, 255, 0, 0, 255, 128]).unwrap()
}

struct NeverLoader {
    started: AtomicUsize,
}

impl ImageLoader for NeverLoader {
    fn load(&self, _src: &str) -> BoxFuture<'static, FxResult<DecodedImage>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Box::pin(futures::future::pending())
    }
}

#[test]
fn rejects_mismatched_pixel_buffers() {
    assert!(ImageResource::from_rgba8(2, 2, vec![0; 15]).is_err());
    assert!(ImageResource::from_rgba8(0, 0, vec![]).is_err());
}

#[test]
fn cache_key_tracks_pixels_and_transform() {
    let mut img = checker();
    let k0 = img.cache_key().to_string();

    img.set_position(3.0, 4.0);
    let k1 = img.cache_key().to_string();
    assert_ne!(k0, k1);

    img.set_scale(2.0, 2.0);
    let k2 = img.cache_key().to_string();
    assert_ne!(k1, k2);

    img.set_pixels(1, 1, vec![1, 2, 3, 4]).unwrap();
    assert_ne!(k2, img.cache_key());
    assert!(img.src().is_none());
}

#[test]
fn identical_content_in_distinct_images_keeps_distinct_keys() {
    let a = checker();
    let b = checker();
    assert_ne!(a.id(), b.id());
    assert_ne!(a.cache_key(), b.cache_key());
}

#[test]
fn placed_clones_keep_their_own_textures() {
    use crate::render::cache::TextureCache;

    let base = ImageResource::from_rgba8(2, 2, vec![7; 16]).unwrap();
    let a = base.clone().with_position(0.0, 0.0);
    let b = base.clone().with_position(1.0, 0.0);
    assert_ne!(a.id(), b.id());
    assert_eq!(a.rgba8(), b.rgba8());

    let mut cache = TextureCache::<u64>::new(8);
    let mut uploads = 0;
    for _ in 0..3 {
        for img in [&a, &b] {
            cache
                .get_or_try_upload(img.id(), img.cache_key(), || {
                    uploads += 1;
                    Ok(img.id())
                })
                .unwrap();
        }
    }
    assert_eq!(uploads, 2);
    let st = cache.stats();
    assert_eq!(st.hits, 4);
    assert_eq!(st.invalidations, 0);
}

#[test]
fn transform_is_scale_then_offset() {
    let img = checker().with_scale(2.0, 3.0).with_position(10.0, 20.0);
    let p = img.transform() * kurbo::Point::new(1.0, 1.0);
    assert_eq!((p.x, p.y), (12.0, 23.0));
}

#[test]
fn pixel_images_serialize_as_png_data_uri_and_reload() {
    let img = checker().with_position(1.0, 2.0).with_scale(0.5, 0.5);
    let obj = img.to_object().unwrap();
    assert_eq!(obj["type"], "image");
    assert_eq!(obj["scaleX"], 0.5);
    assert!(obj["src"].as_str().unwrap().starts_with("data:image/png;base64,"));

    let opts = LoadOptions::new(
        std::sync::Arc::new(FilterRegistry::with_builtin()),
        std::sync::Arc::new(FsImageLoader::default()),
    );
    let back = block_on(ImageResource::from_object(obj.clone(), opts)).unwrap();
    assert_eq!(back.rgba8(), img.rgba8());
    assert_eq!((back.left(), back.top()), (1.0, 2.0));
    assert_eq!(back.to_object().unwrap(), obj);
}

#[test]
fn wrong_record_type_is_a_validation_error() {
    let opts = LoadOptions::new(
        std::sync::Arc::new(FilterRegistry::with_builtin()),
        std::sync::Arc::new(FsImageLoader::default()),
    );
    let err = block_on(ImageResource::from_object(
        serde_json::json!({ "type": "video", "src": "a.png" }),
        opts,
    ))
    .unwrap_err();
    assert!(matches!(err, FxError::Validation(_)));
}

#[test]
fn cancelled_signal_rejects_image_load() {
    let loader = std::sync::Arc::new(NeverLoader {
        started: AtomicUsize::new(0),
    });
    let token = CancellationToken::new();
    token.cancel();
    let opts = LoadOptions::new(
        std::sync::Arc::new(FilterRegistry::with_builtin()),
        loader.clone(),
    )
    .with_signal(token);

    let err = block_on(ImageResource::from_object(
        serde_json::json!({ "type": "image", "src": "a.png" }),
        opts,
    ))
    .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(loader.started.load(Ordering::SeqCst), 0);
}

use super::*;

use futures::executor::block_on;

fn png_bytes(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(px));
    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

#[test]
fn normalize_path_slash_normalization() {
    assert_eq!(normalize_rel_path("a/b.png").unwrap(), "a/b.png");
    assert_eq!(normalize_rel_path("a\\b.png").unwrap(), "a/b.png");
    assert_eq!(normalize_rel_path("./a//b.png").unwrap(), "a/b.png");
    assert!(normalize_rel_path("../x.png").is_err());
    assert!(normalize_rel_path("/abs.png").is_err());
    assert!(normalize_rel_path("").is_err());
}

#[test]
fn data_uri_round_trips_png() {
    let png = png_bytes(3, 2, [10, 20, 30, 40]);
    let uri = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&png)
    );
    let decoded = block_on(FsImageLoader::default().load(&uri)).unwrap();
    assert_eq!((decoded.width, decoded.height), (3, 2));
    assert_eq!(&decoded.rgba8[..4], &[10, 20, 30, 40]);
}

#[test]
fn non_base64_data_uri_is_rejected() {
    let err = decode_data_uri("data:text/plain,hello").unwrap_err();
    assert!(matches!(err, FxError::ResourceLoad(_)));
}

#[test]
fn missing_file_is_a_resource_error() {
    let loader = FsImageLoader::new(std::env::temp_dir());
    let err = block_on(loader.load("fxchain-definitely-missing.png")).unwrap_err();
    assert!(matches!(err, FxError::ResourceLoad(_)));
}

#[test]
fn garbage_bytes_fail_to_decode() {
    let err = decode_image(b"not an image").unwrap_err();
    assert!(matches!(err, FxError::ResourceLoad(_)));
}

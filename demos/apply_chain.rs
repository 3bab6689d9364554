//! Apply a serialized filter chain to a PNG.
//!
//! `cargo run --example apply_chain -- in.png chain.json out.png [cpu|gpu]`

use std::sync::Arc;

use anyhow::Context;
use fxchain::{
    BackendKind, BackendOpts, FilterRegistry, FsImageLoader, LoadOptions, PixelBuffer,
    create_backend, decode_image, filter_from_object,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [input, chain, output, rest @ ..] = args.as_slice() else {
        anyhow::bail!("usage: apply_chain <in.png> <chain.json> <out.png> [cpu|gpu]");
    };
    let kind = match rest.first().map(String::as_str) {
        None | Some("cpu") => BackendKind::Cpu,
        Some("gpu") => BackendKind::Gpu,
        Some(other) => anyhow::bail!("unknown backend '{other}'"),
    };

    let decoded = decode_image(&std::fs::read(input).with_context(|| format!("read {input}"))?)?;
    let source = PixelBuffer::from_rgba8(decoded.width, decoded.height, decoded.rgba8)?;

    let record: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(chain).with_context(|| format!("read {chain}"))?,
    )?;
    let root = std::path::Path::new(chain)
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .to_path_buf();
    let opts = LoadOptions::new(
        Arc::new(FilterRegistry::with_builtin()),
        Arc::new(FsImageLoader::new(root)),
    );
    let filter = futures::executor::block_on(filter_from_object(record, opts))?;

    let mut backend = create_backend(kind, BackendOpts::from_env())?;
    let out = backend.apply_filters(&[filter], &source)?;

    image::RgbaImage::from_raw(out.width, out.height, out.data)
        .context("output buffer does not match its dimensions")?
        .save(output)
        .with_context(|| format!("write {output}"))?;
    println!("wrote {output} ({}x{})", out.width, out.height);
    Ok(())
}

//! WGSL sources for the filter programs.
//!
//! Every program shares [`VERTEX`], a single oversized triangle covering the target, and reads
//! the source with `textureLoad` at the fragment's integer pixel so results line up with the CPU
//! loops. Binding 0 is the source texture, binding 1 the uniform block and binding 2, when
//! present, the second image.

/// What a filter asks the GPU backend to draw.
#[derive(Clone, Debug)]
pub struct ProgramSpec {
    /// Program cache key: the filter type, plus a variant suffix for multi-mode filters.
    pub cache_key: String,
    /// Fragment stage source, appended to [`VERTEX`].
    pub fragment: &'static str,
    /// Whether the program samples a second image at binding 2.
    pub extra_texture: bool,
}

pub const VERTEX: &str = r#"
struct VsOut {
  @builtin(position) pos: vec4<f32>,
  @location(0) uv: vec2<f32>,
};

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> VsOut {
  var p = array<vec2<f32>, 3>(
    vec2<f32>(-1.0, -1.0),
    vec2<f32>( 3.0, -1.0),
    vec2<f32>(-1.0,  3.0),
  );
  let pos = p[vi];
  var o: VsOut;
  o.pos = vec4<f32>(pos, 0.0, 1.0);
  o.uv = vec2<f32>((pos.x + 1.0) * 0.5, (1.0 - pos.y) * 0.5);
  return o;
}

@group(0) @binding(0) var t_src: texture_2d<f32>;

fn load_src(pos: vec4<f32>) -> vec4<f32> {
  return textureLoad(t_src, vec2<i32>(floor(pos.xy)), 0);
}
"#;

pub const INVERT_FS: &str = r#"
struct Params {
  invert: u32,
  alpha: u32,
  _pad0: u32,
  _pad1: u32,
};

@group(0) @binding(1) var<uniform> params: Params;

@fragment
fn fs(in: VsOut) -> @location(0) vec4<f32> {
  var color = load_src(in.pos);
  if (params.invert == 1u) {
    let a = select(color.a, 1.0 - color.a, params.alpha == 1u);
    color = vec4<f32>(1.0 - color.rgb, a);
  }
  return color;
}
"#;

pub const NOISE_FS: &str = r#"
struct Params {
  amount: f32,
  seed: f32,
  step_h: f32,
  _pad: f32,
};

@group(0) @binding(1) var<uniform> params: Params;

fn rand(co: vec2<f32>, seed: f32, v_scale: f32) -> f32 {
  return fract(sin(dot(co * v_scale, vec2<f32>(12.9898, 78.233))) * 43758.5453 * (seed + 0.01) / 2.0);
}

@fragment
fn fs(in: VsOut) -> @location(0) vec4<f32> {
  let color = load_src(in.pos);
  let r = (0.5 - rand(in.uv, params.seed, 0.1 / params.step_h)) * params.amount;
  return vec4<f32>(color.rgb + vec3<f32>(r), color.a);
}
"#;

macro_rules! blend_common {
    () => {
        r#"
struct Params {
  c0: vec4<f32>,
  c1: vec4<f32>,
  c2: vec4<f32>,
};

@group(0) @binding(1) var<uniform> params: Params;
@group(0) @binding(2) var t_img: texture_2d<f32>;

fn load_blend(pos: vec4<f32>) -> vec4<f32> {
  let uv = pos.xy / vec2<f32>(textureDimensions(t_src));
  let m = mat3x3<f32>(params.c0.xyz, params.c1.xyz, params.c2.xyz);
  let uv2 = (m * vec3<f32>(uv, 1.0)).xy;
  if (uv2.x < 0.0 || uv2.y < 0.0 || uv2.x >= 1.0 || uv2.y >= 1.0) {
    return vec4<f32>(0.0);
  }
  let dims = vec2<i32>(textureDimensions(t_img));
  let texel = min(vec2<i32>(floor(uv2 * vec2<f32>(dims))), dims - vec2<i32>(1));
  return textureLoad(t_img, texel, 0);
}
"#
    };
}

pub const BLEND_MULTIPLY_FS: &str = concat!(
    blend_common!(),
    r#"
@fragment
fn fs(in: VsOut) -> @location(0) vec4<f32> {
  return load_src(in.pos) * load_blend(in.pos);
}
"#
);

pub const BLEND_MASK_FS: &str = concat!(
    blend_common!(),
    r#"
@fragment
fn fs(in: VsOut) -> @location(0) vec4<f32> {
  let color = load_src(in.pos);
  return vec4<f32>(color.rgb, load_blend(in.pos).a);
}
"#
);

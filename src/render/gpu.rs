use crate::assets::image::ImageResource;
use crate::filters::Filter;
use crate::foundation::error::{FxError, FxResult};
use crate::render::backend::{BackendKind, BackendOpts, FilterBackend, active_filters, initial_passes};
use crate::render::cache::{CacheStats, ProgramCache, TextureCache};
use crate::render::context::{FilterContext, Surface};
use crate::render::pixels::PixelBuffer;
use crate::render::shaders::{ProgramSpec, VERTEX};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const UNIFORM_BYTES: u64 = 64;
const OUTPUT: usize = 2;

pub(crate) struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

pub(crate) struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct Targets {
    width: u32,
    height: u32,
    // Two ping-pong textures followed by the output texture.
    textures: [GpuTexture; 3],
    readback: wgpu::Buffer,
    readback_bytes_per_row: u32,
}

/// The GPU side of a [`FilterContext`]: device handles, caches and the ping-pong state of one run.
pub(crate) struct GpuSurface<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    uniforms: &'a wgpu::Buffer,
    programs: &'a mut ProgramCache<GpuProgram>,
    textures: &'a mut TextureCache<GpuTexture>,
    targets: &'a Targets,
    source: usize,
}

impl GpuSurface<'_> {
    pub(crate) fn width(&self) -> u32 {
        self.targets.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.targets.height
    }

    fn draw(
        &mut self,
        spec: &ProgramSpec,
        uniforms: &[u8],
        image: Option<&ImageResource>,
        to_output: bool,
    ) -> FxResult<()> {
        if uniforms.len() as u64 > UNIFORM_BYTES {
            return Err(FxError::render(format!(
                "uniform block for '{}' exceeds {UNIFORM_BYTES} bytes",
                spec.cache_key
            )));
        }
        let target = if to_output { OUTPUT } else { 1 - self.source.min(1) };
        if target == self.source {
            return Err(FxError::render(
                "pass accounting mismatch: draw would read and write the output texture",
            ));
        }

        let device = self.device;
        let program = self
            .programs
            .get_or_try_compile(&spec.cache_key, || compile_program(device, spec))?;

        let extra = match (spec.extra_texture, image) {
            (true, Some(image)) => Some(
                self.textures
                    .get_or_try_upload(image.id(), image.cache_key(), || {
                        upload_image(device, self.queue, image)
                    })?,
            ),
            (true, None) => {
                return Err(FxError::render(format!(
                    "program '{}' needs an image texture",
                    spec.cache_key
                )));
            }
            (false, _) => None,
        };

        self.queue.write_buffer(self.uniforms, 0, uniforms);

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(
                    &self.targets.textures[self.source].view,
                ),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: self.uniforms.as_entire_binding(),
            },
        ];
        if let Some(extra) = extra {
            entries.push(wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&extra.view),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fxchain_filter_bg"),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("fxchain_filter_encoder"),
        });
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("fxchain_filter_rp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.textures[target].view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(&program.pipeline);
            rp.set_bind_group(0, &bind_group, &[]);
            rp.draw(0..3, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.source = target;
        Ok(())
    }
}

impl FilterContext<'_> {
    /// Draw one full-target pass with `spec`, consuming one pass from the budget.
    ///
    /// The draw made when at most one pass remains lands in the output texture.
    pub fn run_gpu_program(
        &mut self,
        spec: ProgramSpec,
        uniforms: &[u8],
        image: Option<&ImageResource>,
    ) -> FxResult<()> {
        let to_output = self.passes <= 1;
        let Surface::Gpu(surface) = &mut self.surface else {
            return Err(FxError::render("gpu program invoked on a cpu execution context"));
        };
        surface.draw(&spec, uniforms, image, to_output)?;
        self.passes -= 1;
        self.pass += 1;
        Ok(())
    }
}

/// Runs filter chains as fragment programs on a wgpu device.
pub struct GpuBackend {
    opts: BackendOpts,
    device: wgpu::Device,
    queue: wgpu::Queue,
    uniforms: wgpu::Buffer,
    programs: ProgramCache<GpuProgram>,
    textures: TextureCache<GpuTexture>,
    targets: Option<Targets>,
}

impl GpuBackend {
    /// Acquire an adapter and device; fails with a render error when none is available.
    #[tracing::instrument(skip_all)]
    pub fn new(opts: BackendOpts) -> FxResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                FxError::render("no gpu adapter available")
            }
            other => FxError::render(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("fxchain"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| FxError::render(format!("wgpu request_device failed: {e:?}")))?;
        tracing::debug!(adapter = ?adapter.get_info().name, "gpu device ready");

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fxchain_uniforms"),
            size: UNIFORM_BYTES,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            textures: TextureCache::new(opts.texture_cache_capacity),
            opts,
            device,
            queue,
            uniforms,
            programs: ProgramCache::new(),
            targets: None,
        })
    }

    /// Program cache counters.
    pub fn program_stats(&self) -> CacheStats {
        self.programs.stats()
    }

    /// Texture cache counters.
    pub fn texture_stats(&self) -> CacheStats {
        self.textures.stats()
    }

    /// Number of compiled programs.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Number of uploaded image textures.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Drop every uploaded image texture.
    pub fn clear_textures(&mut self) {
        self.textures.clear();
    }

    fn ensure_targets(&mut self, width: u32, height: u32) -> FxResult<()> {
        if let Some(t) = &self.targets
            && t.width == width
            && t.height == height
        {
            return Ok(());
        }

        let bytes_per_row_unpadded = width
            .checked_mul(4)
            .ok_or_else(|| FxError::render("render target width overflow"))?;
        let readback_bytes_per_row =
            align_to(bytes_per_row_unpadded, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer_size = u64::from(readback_bytes_per_row)
            .checked_mul(u64::from(height))
            .ok_or_else(|| FxError::render("readback buffer size overflow"))?;

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fxchain_readback"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let textures = [
            create_target(&self.device, width, height, "fxchain_ping"),
            create_target(&self.device, width, height, "fxchain_pong"),
            create_target(&self.device, width, height, "fxchain_output"),
        ];
        tracing::debug!(width, height, "allocated gpu targets");
        self.targets = Some(Targets {
            width,
            height,
            textures,
            readback,
            readback_bytes_per_row,
        });
        Ok(())
    }

    fn read_output(&self) -> FxResult<PixelBuffer> {
        let targets = self
            .targets
            .as_ref()
            .ok_or_else(|| FxError::render("gpu targets not initialized"))?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("fxchain_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &targets.textures[OUTPUT].texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &targets.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(targets.readback_bytes_per_row),
                    rows_per_image: Some(targets.height),
                },
            },
            extent(targets.width, targets.height),
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = targets.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| FxError::render(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| FxError::render("readback channel closed"))?
            .map_err(|e| FxError::render(format!("readback map failed: {e:?}")))?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = (targets.width as usize) * 4;
        let padded_row_bytes = targets.readback_bytes_per_row as usize;
        let mut out = Vec::with_capacity(row_bytes * targets.height as usize);
        for row in 0..targets.height as usize {
            let start = row * padded_row_bytes;
            out.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        targets.readback.unmap();

        PixelBuffer::from_rgba8(targets.width, targets.height, out)
    }
}

impl FilterBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    #[tracing::instrument(skip_all, fields(backend = "gpu", filters = filters.len()))]
    fn apply_filters(
        &mut self,
        filters: &[Box<dyn Filter>],
        source: &PixelBuffer,
    ) -> FxResult<PixelBuffer> {
        let active = active_filters(filters, self.opts.elide_neutral);
        if active.is_empty() || source.width == 0 || source.height == 0 {
            return Ok(source.clone());
        }
        self.ensure_targets(source.width, source.height)?;
        let passes = initial_passes(&active)?;

        let Self {
            device,
            queue,
            uniforms,
            programs,
            textures,
            targets,
            ..
        } = self;
        let targets = targets
            .as_ref()
            .ok_or_else(|| FxError::render("gpu targets not initialized"))?;
        write_rgba8(queue, &targets.textures[0].texture, source)?;

        let mut ctx = FilterContext {
            passes,
            pass: 0,
            surface: Surface::Gpu(GpuSurface {
                device,
                queue,
                uniforms,
                programs,
                textures,
                targets,
                source: 0,
            }),
        };
        for filter in &active {
            filter.apply_to(&mut ctx)?;
        }
        let (remaining, draws) = (ctx.passes, ctx.pass);
        drop(ctx);

        if draws == 0 {
            return Ok(source.clone());
        }
        if remaining != 0 {
            return Err(FxError::render(format!(
                "pass accounting mismatch: {remaining} passes left after {draws} draws"
            )));
        }
        tracing::debug!(draws, "gpu chain finished");
        self.read_output()
    }
}

fn compile_program(device: &wgpu::Device, spec: &ProgramSpec) -> FxResult<GpuProgram> {
    let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
        },
        count: None,
    };
    let mut layout_entries = vec![
        texture_entry(0),
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
    ];
    if spec.extra_texture {
        layout_entries.push(texture_entry(2));
    }

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("fxchain_filter_bgl"),
        entries: &layout_entries,
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(spec.cache_key.as_str()),
        source: wgpu::ShaderSource::Wgsl(format!("{VERTEX}{}", spec.fragment).into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("fxchain_filter_pl"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.cache_key.as_str()),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(FxError::render(format!(
            "compile program '{}': {err}",
            spec.cache_key
        )));
    }

    Ok(GpuProgram {
        pipeline,
        bind_group_layout,
    })
}

fn upload_image(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &ImageResource,
) -> FxResult<GpuTexture> {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("fxchain_image"),
        size: extent(image.width(), image.height()),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let pixels = PixelBuffer::from_rgba8(image.width(), image.height(), image.rgba8().to_vec())?;
    write_rgba8(queue, &texture, &pixels)?;
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(GpuTexture { texture, view })
}

fn write_rgba8(queue: &wgpu::Queue, texture: &wgpu::Texture, pixels: &PixelBuffer) -> FxResult<()> {
    let bytes_per_row = pixels
        .width
        .checked_mul(4)
        .ok_or_else(|| FxError::render("texture width overflow"))?;
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &pixels.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(bytes_per_row),
            rows_per_image: Some(pixels.height),
        },
        extent(pixels.width, pixels.height),
    );
    Ok(())
}

fn create_target(device: &wgpu::Device, width: u32, height: u32, label: &str) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(width, height),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

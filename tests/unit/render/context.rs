use super::*;

use crate::render::scratch_pool::ScratchPoolOpts;

#[test]
fn cpu_context_reports_backend_and_size() {
    let mut image = PixelBuffer::new(3, 2).unwrap();
    let mut pool = ScratchPool::new(ScratchPoolOpts::default());
    let mut ctx = FilterContext::cpu(&mut image, &mut pool, 1);

    assert_eq!(ctx.backend(), BackendKind::Cpu);
    assert_eq!((ctx.width(), ctx.height()), (3, 2));
    assert_eq!(ctx.passes, 1);
    assert_eq!(ctx.pass, 0);

    let surface = ctx.cpu_surface().unwrap();
    surface.image.data[0] = 42;
    assert_eq!(image.data[0], 42);
}

//! Integration tests of the forward renderer and the editor passes.
//!
//! Each case runs once per texture residency mode.

mod common;

use std::sync::Arc;

use glam::Mat4;
use rstest::rstest;

use common::{
    Residency, TestContext, outlined_mesh, shaded_pass, textured_material, triangle_mesh,
};
use tessera_graphics::backend::RecordedCommand;
use tessera_graphics::item::ItemFlags;
use tessera_graphics::material::Material;
use tessera_graphics::mesh::Mesh;
use tessera_graphics::pipeline::{PipelineState, VertexInputState};
use tessera_graphics::renderer::{EditorPassShaders, OutlineStyle, ViewportLayers};
use tessera_graphics::residency::pack_texture_unit;
use tessera_graphics::scene::{Camera, Light, LightProjections, LightType};
use tessera_graphics::texture::TextureHandle;
use tessera_graphics::{
    BufferDescriptor, BufferUsage, EditorPasses, GpuBackend, PassHook, RenderParameters,
    RenderPass, RendererConfig, TextureResidencyMode, TransferQueue, Viewport,
};

fn viewport() -> Viewport {
    Viewport::from_dimensions(320, 240)
}

#[rstest]
#[case::bindless(Residency::Bindless)]
#[case::bound(Residency::Bound)]
fn test_frame_draws_each_pass(#[case] residency: Residency) {
    let mut ctx = TestContext::new(residency);
    let camera = Camera::new("camera");
    let meshes = vec![
        triangle_mesh(ItemFlags::VISIBLE, 2),
        triangle_mesh(ItemFlags::VISIBLE, 1),
    ];
    let spans: Vec<&[Arc<Mesh>]> = vec![&meshes];
    let opaque = shaded_pass("opaque");
    let overlay = shaded_pass("overlay").with_depth_clamped_to_near();
    let passes = [&opaque, &overlay];

    ctx.renderer.render(
        &RenderParameters::new(viewport())
            .with_camera(&camera)
            .with_mesh_spans(&spans)
            .with_passes(&passes),
    );

    assert_eq!(ctx.indirect_draw_counts(), vec![3, 3]);
    let commands = ctx.backend.commands();
    assert_eq!(commands[0], RecordedCommand::SetViewport(viewport()));
    let depth_ranges = commands
        .iter()
        .filter(|command| matches!(command, RecordedCommand::SetDepthRange { .. }))
        .count();
    assert_eq!(depth_ranges, 2);
}

#[rstest]
#[case::bindless(Residency::Bindless)]
#[case::bound(Residency::Bound)]
fn test_empty_spans_are_skipped(#[case] residency: Residency) {
    let mut ctx = TestContext::new(residency);
    let camera = Camera::new("camera");
    let empty: Vec<Arc<Mesh>> = Vec::new();
    let hidden = vec![triangle_mesh(ItemFlags::empty(), 1)];
    let spans: Vec<&[Arc<Mesh>]> = vec![&empty, &hidden];
    let pass = shaded_pass("opaque");
    let passes = [&pass];

    ctx.renderer.render(
        &RenderParameters::new(viewport())
            .with_camera(&camera)
            .with_mesh_spans(&spans)
            .with_passes(&passes)
            .with_filter(tessera_graphics::renderer::tool_filter()),
    );

    assert!(ctx.indirect_draw_counts().is_empty());
    assert_eq!(ctx.backend.draw_call_count(), 0);
}

#[test]
fn test_bindless_textures_resident_only_during_frame() {
    let mut ctx = TestContext::new(Residency::Bindless);
    assert_eq!(ctx.renderer.residency_mode(), TextureResidencyMode::Bindless);
    let materials = vec![
        textured_material("a", 21),
        textured_material("b", 21),
        textured_material("c", 22),
        Arc::new(Material::new("plain")),
    ];
    let lights = vec![Arc::new(Light::new("sun", LightType::Directional))];

    ctx.renderer.render(
        &RenderParameters::new(viewport())
            .with_materials(&materials)
            .with_lights(&lights, None)
            .with_shadow_texture(TextureHandle::from_raw(30)),
    );

    let mut made_resident: Vec<u64> = ctx
        .backend
        .commands()
        .into_iter()
        .filter_map(|command| match command {
            RecordedCommand::MakeTextureResident(handle) => Some(handle.raw()),
            _ => None,
        })
        .collect();
    made_resident.sort_unstable();
    assert_eq!(made_resident, vec![21, 22, 30]);
    assert!(ctx.backend.resident_textures().is_empty());
}

#[test]
fn test_bound_shadow_reference_is_packed_unit() {
    let config = RendererConfig::default()
        .with_texture_units(0, 8)
        .with_shadow_texture_unit(9);
    let mut ctx = TestContext::with_config(Residency::Bound, &config);
    let lights = vec![Arc::new(Light::new("lamp", LightType::Point))];

    ctx.renderer.render(
        &RenderParameters::new(viewport())
            .with_lights(&lights, None)
            .with_shadow_texture(TextureHandle::from_raw(30)),
    );

    let light_ring = ctx.renderer.light_stream().ring();
    let bytes = ctx
        .backend
        .read_buffer(light_ring.current_buffer().gpu(), 0, 8);
    let reference: u64 = bytemuck::pod_read_unaligned(&bytes);
    assert_eq!(reference, pack_texture_unit(9));
}

#[test]
fn test_shadows_disabled_without_lights() {
    let mut ctx = TestContext::new(Residency::Bindless);

    ctx.renderer.render(
        &RenderParameters::new(viewport()).with_shadow_texture(TextureHandle::from_raw(30)),
    );

    assert!(!ctx.backend.commands().iter().any(|command| matches!(
        command,
        RecordedCommand::MakeTextureResident(_)
    )));
}

#[rstest]
#[case::bindless(Residency::Bindless)]
#[case::bound(Residency::Bound)]
fn test_frames_rotate_streams(#[case] residency: Residency) {
    let config = RendererConfig::default().with_frames_in_flight(3);
    let mut ctx = TestContext::with_config(residency, &config);
    let camera = Camera::new("camera");

    let mut camera_buffers = Vec::new();
    for _ in 0..4 {
        ctx.renderer
            .render(&RenderParameters::new(viewport()).with_camera(&camera));
        camera_buffers.push(ctx.renderer.camera_stream().ring().current_buffer().gpu().id());
        ctx.renderer.next_frame();
    }

    assert_eq!(ctx.renderer.frame_index(), 4);
    assert_ne!(camera_buffers[0], camera_buffers[1]);
    assert_ne!(camera_buffers[1], camera_buffers[2]);
    assert_eq!(camera_buffers[0], camera_buffers[3]);
}

#[rstest]
#[case::bindless(Residency::Bindless)]
#[case::bound(Residency::Bound)]
fn test_many_renders_within_one_frame(#[case] residency: Residency) {
    let config = RendererConfig::default()
        .with_max_materials(64)
        .with_max_renders_per_frame(4);
    let mut ctx = TestContext::with_config(residency, &config);
    let camera = Camera::new("camera");
    let materials: Vec<_> = (0..64)
        .map(|i| textured_material(&format!("m{i}"), 100 + i))
        .collect();
    let meshes = vec![triangle_mesh(ItemFlags::VISIBLE, 2)];
    let spans: Vec<&[Arc<Mesh>]> = vec![&meshes];
    let pass = shaded_pass("opaque");
    let passes = [&pass];
    let parameters = RenderParameters::new(viewport())
        .with_camera(&camera)
        .with_materials(&materials)
        .with_mesh_spans(&spans)
        .with_passes(&passes);

    for _ in 0..2 {
        for _ in 0..3 {
            ctx.renderer.render(&parameters);
        }
        ctx.renderer.render_fullscreen(&parameters, None);
        ctx.renderer.next_frame();
    }

    assert_eq!(ctx.indirect_draw_counts(), vec![2; 6]);
    assert!(ctx.backend.resident_textures().is_empty());
}

#[test]
fn test_custom_hooks_run_around_pass() {
    let mut ctx = TestContext::new(Residency::Bound);
    let pass = RenderPass::new(
        PipelineState::new("hooked")
            .with_shader(Arc::new(tessera_graphics::pipeline::ShaderProgram::new("s"))),
    )
    .with_begin(PassHook::Custom(Box::new(|backend: &dyn GpuBackend| {
        backend.set_depth_range(0.25, 0.75)
    })))
    .with_end(PassHook::DepthRange {
        near: 0.0,
        far: 1.0,
    });
    let passes = [&pass];

    ctx.renderer
        .render(&RenderParameters::new(viewport()).with_passes(&passes));

    let commands = ctx.backend.commands();
    let begin = commands
        .iter()
        .position(|command| {
            *command
                == RecordedCommand::SetDepthRange {
                    near: 0.25,
                    far: 0.75,
                }
        })
        .unwrap();
    let apply = commands
        .iter()
        .position(|command| *command == RecordedCommand::ApplyPipelineState("hooked".into()))
        .unwrap();
    let end = commands
        .iter()
        .position(|command| {
            *command
                == RecordedCommand::SetDepthRange {
                    near: 0.0,
                    far: 1.0,
                }
        })
        .unwrap();
    assert!(begin < apply && apply < end);
}

#[rstest]
#[case::bindless(Residency::Bindless)]
#[case::bound(Residency::Bound)]
fn test_editor_viewport_frame(#[case] residency: Residency) {
    let mut ctx = TestContext::new(residency);
    let passes = EditorPasses::new(
        &EditorPassShaders::named(),
        Arc::new(VertexInputState::position_normal_texcoord_color()),
        true,
    );
    let camera = Camera::new("camera");
    let opaque = ItemFlags::VISIBLE | ItemFlags::CONTENT | ItemFlags::OPAQUE;
    let content = vec![
        outlined_mesh(opaque, 2),
        outlined_mesh(opaque | ItemFlags::SELECTED, 1),
    ];
    let tool = vec![triangle_mesh(ItemFlags::VISIBLE | ItemFlags::TOOL, 3)];
    let sun = Arc::new(Light::new("sun", LightType::Directional));
    let lights = vec![sun.clone()];
    let mut projections = LightProjections::new();
    projections.push(sun, Mat4::IDENTITY);
    let layers = ViewportLayers {
        content: &content,
        tool: &tool,
        ..ViewportLayers::default()
    };

    passes.render_viewport(
        &mut ctx.renderer,
        &RenderParameters::new(viewport())
            .with_camera(&camera)
            .with_lights(&lights, Some(&projections))
            .with_shadow_texture(TextureHandle::from_raw(40)),
        &layers,
        &OutlineStyle::default(),
    );

    // Opaque fill of unselected and selected content, their edge lines,
    // then the six tool passes.
    assert_eq!(
        ctx.indirect_draw_counts(),
        vec![2, 1, 2, 1, 3, 3, 3, 3, 3, 3]
    );
    let fullscreen = ctx
        .backend
        .commands()
        .into_iter()
        .filter(|command| matches!(command, RecordedCommand::DrawArrays { .. }))
        .count();
    assert_eq!(fullscreen, 1);
    assert!(ctx.backend.resident_textures().is_empty());
}

#[test]
fn test_transfer_queue_uploads_before_render() {
    let ctx = TestContext::new(Residency::Bound);
    let queue = TransferQueue::new(ctx.backend.clone());
    let buffer = tessera_graphics::Buffer::create(
        ctx.backend.as_ref(),
        BufferDescriptor::new(16, BufferUsage::VERTEX | BufferUsage::COPY_DST),
    )
    .unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| queue.enqueue(&buffer, 0, vec![7; 8]).unwrap());
        scope.spawn(|| queue.enqueue(&buffer, 8, vec![9; 8]).unwrap());
    });
    queue.flush();

    let bytes = ctx.backend.read_buffer(buffer.gpu(), 0, 16);
    assert_eq!(&bytes[..8], &[7; 8]);
    assert_eq!(&bytes[8..], &[9; 8]);
}

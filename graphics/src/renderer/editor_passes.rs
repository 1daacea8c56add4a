//! The standard render passes of the editor viewport.
//!
//! A viewport frame draws opaque content, its outlines and the sky, then
//! translucent content, brush previews, render target meshes and finally
//! tool meshes (gizmos). Tool meshes stay visible through other geometry:
//! six passes tag hidden and visible tool pixels in the stencil buffer, then
//! draw visible parts normally and hidden parts blended at reduced opacity.

use std::sync::Arc;

use glam::Vec4;

use crate::item::{ItemFilter, ItemFlags};
use crate::mesh::{Mesh, PrimitiveMode};
use crate::pipeline::{
    ColorBlendState, CompareFunction, DepthStencilState, PipelineState, RasterizationState,
    ShaderProgram, StencilFaceState, StencilOp, VertexInputState,
};
use crate::streams::{PrimitiveColorSource, PrimitiveSizeSource};

use super::{ForwardRenderer, RenderParameters, RenderPass};

/// Stencil value of tool pixels behind other geometry.
pub const STENCIL_TOOL_MESH_HIDDEN: u32 = 1;
/// Stencil value of tool pixels in front of other geometry.
pub const STENCIL_TOOL_MESH_VISIBLE: u32 = 2;

/// Opacity of tool parts hidden behind other geometry.
pub const HIDDEN_TOOL_ALPHA: f32 = 0.6;
/// Opacity of hidden edge lines.
pub const HIDDEN_LINE_ALPHA: f32 = 0.2;

/// Whether content is drawn filled or as outlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Filled polygons.
    #[default]
    Fill,
    /// Edge lines, polygon centroids and corner points, per [`OutlineStyle`].
    Outline,
}

/// Which of the opaque or translucent items are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Items flagged opaque and not translucent.
    #[default]
    Opaque,
    /// Items flagged translucent and not opaque.
    Translucent,
}

/// Which items are drawn by selection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectionMode {
    /// Unselected items only.
    NotSelected,
    /// Selected items only.
    Selected,
    /// Every item.
    #[default]
    Any,
}

/// Restrict `filter` to the items of `blend_mode`.
pub fn apply_blend_mode(filter: ItemFilter, blend_mode: BlendMode) -> ItemFilter {
    match blend_mode {
        BlendMode::Opaque => filter
            .with_all_set(ItemFlags::OPAQUE)
            .with_all_clear(ItemFlags::TRANSLUCENT),
        BlendMode::Translucent => filter
            .with_all_set(ItemFlags::TRANSLUCENT)
            .with_all_clear(ItemFlags::OPAQUE),
    }
}

/// Restrict `filter` to the items of `selection_mode`.
pub fn apply_selection_mode(filter: ItemFilter, selection_mode: SelectionMode) -> ItemFilter {
    match selection_mode {
        SelectionMode::NotSelected => filter.with_all_clear(ItemFlags::SELECTED),
        SelectionMode::Selected => filter.with_all_set(ItemFlags::SELECTED),
        SelectionMode::Any => filter,
    }
}

/// Visible content and controller items of a blend and selection mode.
pub fn content_filter(blend_mode: BlendMode, selection_mode: SelectionMode) -> ItemFilter {
    let filter = ItemFilter::new()
        .with_all_set(ItemFlags::VISIBLE)
        .with_any_set(ItemFlags::CONTENT | ItemFlags::CONTROLLER);
    apply_selection_mode(apply_blend_mode(filter, blend_mode), selection_mode)
}

/// Visible tool items.
pub fn tool_filter() -> ItemFilter {
    ItemFilter::new().with_all_set(ItemFlags::VISIBLE | ItemFlags::TOOL)
}

/// Visible brush preview items.
pub fn brush_filter() -> ItemFilter {
    ItemFilter::new().with_all_set(ItemFlags::VISIBLE | ItemFlags::BRUSH)
}

/// Visible meshes showing a render target.
pub fn rendertarget_filter() -> ItemFilter {
    ItemFilter::new().with_all_set(ItemFlags::VISIBLE | ItemFlags::RENDERTARGET)
}

/// Which outline passes draw and with which color and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineStyle {
    /// Draw polygon edges.
    pub edge_lines: bool,
    /// Edge line color.
    pub line_color: Vec4,
    /// Edge line width.
    pub line_width: f32,
    /// Draw polygon centroids.
    pub polygon_centroids: bool,
    /// Centroid color.
    pub centroid_color: Vec4,
    /// Draw polygon corners.
    pub corner_points: bool,
    /// Corner color.
    pub corner_color: Vec4,
    /// Size of centroid and corner points.
    pub point_size: f32,
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self {
            edge_lines: true,
            line_color: Vec4::new(0.0, 0.0, 0.0, 0.5),
            line_width: 1.0,
            polygon_centroids: false,
            centroid_color: Vec4::new(0.0, 0.0, 1.0, 1.0),
            corner_points: false,
            corner_color: Vec4::new(0.0, 0.0, 1.0, 1.0),
            point_size: 4.0,
        }
    }
}

/// Shader programs of the editor passes.
#[derive(Debug, Clone)]
pub struct EditorPassShaders {
    /// Lit content.
    pub standard: Arc<ShaderProgram>,
    /// Tool meshes.
    pub tool: Arc<ShaderProgram>,
    /// Wide edge lines.
    pub wide_lines: Arc<ShaderProgram>,
    /// Corner points and centroids.
    pub points: Arc<ShaderProgram>,
    /// Brush previews.
    pub brush: Arc<ShaderProgram>,
    /// Render target meshes.
    pub textured: Arc<ShaderProgram>,
    /// Fullscreen sky.
    pub sky: Arc<ShaderProgram>,
}

impl EditorPassShaders {
    /// One program per pass family, named after it.
    pub fn named() -> Self {
        let program = |name: &str| Arc::new(ShaderProgram::new(name));
        Self {
            standard: program("standard"),
            tool: program("tool"),
            wide_lines: program("wide_lines"),
            points: program("points"),
            brush: program("brush"),
            textured: program("textured"),
            sky: program("sky"),
        }
    }
}

/// Meshes of one viewport, grouped by layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportLayers<'a> {
    /// Scene content.
    pub content: &'a [Arc<Mesh>],
    /// Input controllers, drawn with filled content.
    pub controllers: &'a [Arc<Mesh>],
    /// Brush previews.
    pub brush: &'a [Arc<Mesh>],
    /// Meshes showing render targets.
    pub rendertarget: &'a [Arc<Mesh>],
    /// Tool meshes.
    pub tool: &'a [Arc<Mesh>],
}

/// The editor viewport passes, built once and reused every frame.
#[derive(Debug)]
pub struct EditorPasses {
    /// Filled opaque content.
    pub polygon_fill_opaque: RenderPass,
    /// Filled translucent content.
    pub polygon_fill_translucent: RenderPass,
    /// Tags hidden tool pixels with [`STENCIL_TOOL_MESH_HIDDEN`].
    pub tool1_hidden_stencil: RenderPass,
    /// Tags visible tool pixels with [`STENCIL_TOOL_MESH_VISIBLE`].
    pub tool2_visible_stencil: RenderPass,
    /// Writes tool depth pinned to the near plane.
    pub tool3_depth_clear: RenderPass,
    /// Writes the real tool depth.
    pub tool4_depth: RenderPass,
    /// Draws visible tool parts.
    pub tool5_visible_color: RenderPass,
    /// Draws hidden tool parts blended.
    pub tool6_hidden_color: RenderPass,
    /// Hidden edge lines, blended.
    pub line_hidden_blend: RenderPass,
    /// Brush back faces.
    pub brush_back: RenderPass,
    /// Brush front faces.
    pub brush_front: RenderPass,
    /// Edge lines.
    pub edge_lines: RenderPass,
    /// Corner points.
    pub corner_points: RenderPass,
    /// Polygon centroids.
    pub polygon_centroids: RenderPass,
    /// Meshes showing render targets.
    pub rendertarget_meshes: RenderPass,
    /// Fullscreen sky behind everything.
    pub sky: RenderPass,
}

impl EditorPasses {
    /// Build the passes for meshes with `vertex_input`.
    pub fn new(
        shaders: &EditorPassShaders,
        vertex_input: Arc<VertexInputState>,
        reverse_depth: bool,
    ) -> Self {
        let mesh_pipeline = |name: &str, shader: &Arc<ShaderProgram>| {
            PipelineState::new(name)
                .with_shader(Arc::clone(shader))
                .with_vertex_input(Arc::clone(&vertex_input))
                .with_rasterization(RasterizationState::CULL_MODE_BACK_CCW)
                .with_depth_stencil(DepthStencilState::depth_test_enabled_stencil_test_disabled(
                    reverse_depth,
                ))
        };
        let depth = |compare: CompareFunction| compare.for_depth(reverse_depth);

        let polygon_fill_opaque = RenderPass::new(
            mesh_pipeline("Polygon Fill Opaque", &shaders.standard)
                .with_color_blend(ColorBlendState::color_blend_disabled()),
        );
        let polygon_fill_translucent = RenderPass::new(
            mesh_pipeline("Polygon Fill Translucent", &shaders.standard)
                .with_rasterization(RasterizationState::CULL_MODE_NONE)
                .with_color_blend(ColorBlendState::color_blend_premultiplied()),
        );

        let tool1_hidden_stencil = RenderPass::new(
            mesh_pipeline("Tool pass 1: Tag depth hidden with stencil", &shaders.tool)
                .with_depth_stencil(DepthStencilState::stencil(
                    depth(CompareFunction::Greater),
                    false,
                    StencilFaceState::tag(STENCIL_TOOL_MESH_HIDDEN),
                ))
                .with_color_blend(ColorBlendState::color_writes_disabled()),
        );
        let tool2_visible_stencil = RenderPass::new(
            mesh_pipeline("Tool pass 2: Tag visible tool parts with stencil", &shaders.tool)
                .with_depth_stencil(DepthStencilState::stencil(
                    depth(CompareFunction::LessEqual),
                    false,
                    StencilFaceState::tag(STENCIL_TOOL_MESH_VISIBLE),
                ))
                .with_color_blend(ColorBlendState::color_writes_disabled()),
        );
        let tool3_depth_clear = RenderPass::new(
            mesh_pipeline("Tool pass 3: Set depth to fixed value", &shaders.tool)
                .with_depth_stencil(DepthStencilState::depth_test_always_stencil_test_disabled())
                .with_color_blend(ColorBlendState::color_writes_disabled()),
        )
        .with_depth_clamped_to_near();
        let tool4_depth = RenderPass::new(
            mesh_pipeline("Tool pass 4: Set depth to proper tool depth", &shaders.tool)
                .with_color_blend(ColorBlendState::color_writes_disabled()),
        );
        let tool5_visible_color = RenderPass::new(
            mesh_pipeline("Tool pass 5: Render visible tool parts", &shaders.tool)
                .with_depth_stencil(DepthStencilState::stencil(
                    depth(CompareFunction::LessEqual),
                    true,
                    StencilFaceState::require(STENCIL_TOOL_MESH_VISIBLE),
                ))
                .with_color_blend(ColorBlendState::color_blend_disabled()),
        );
        // Back faces re-tag their pixels as hidden.
        let tool6_hidden_color = RenderPass::new(
            mesh_pipeline("Tool pass 6: Render hidden tool parts", &shaders.tool)
                .with_depth_stencil(DepthStencilState {
                    stencil_back: StencilFaceState::tag(STENCIL_TOOL_MESH_HIDDEN),
                    ..DepthStencilState::stencil(
                        depth(CompareFunction::LessEqual),
                        true,
                        StencilFaceState::require(STENCIL_TOOL_MESH_HIDDEN),
                    )
                })
                .with_color_blend(ColorBlendState::constant_alpha(HIDDEN_TOOL_ALPHA)),
        );

        // Lines are drawn once per pixel: the first line fragment bumps the
        // stencil away from zero.
        let first_line_fragment = StencilFaceState {
            pass_op: StencilOp::Increment,
            ..StencilFaceState::require(0)
        };
        let edge_lines = RenderPass::new(
            mesh_pipeline("Edge Lines", &shaders.wide_lines)
                .with_topology(PrimitiveMode::EdgeLines.topology())
                .with_depth_stencil(DepthStencilState::stencil(
                    depth(CompareFunction::LessEqual),
                    true,
                    first_line_fragment,
                ))
                .with_color_blend(ColorBlendState::color_blend_premultiplied()),
        )
        .with_primitive_mode(PrimitiveMode::EdgeLines);
        let line_hidden_blend = RenderPass::new(
            mesh_pipeline("Hidden lines with blending", &shaders.wide_lines)
                .with_topology(PrimitiveMode::EdgeLines.topology())
                .with_depth_stencil(DepthStencilState::stencil(
                    depth(CompareFunction::Greater),
                    false,
                    first_line_fragment,
                ))
                .with_color_blend(ColorBlendState::constant_alpha(HIDDEN_LINE_ALPHA)),
        )
        .with_primitive_mode(PrimitiveMode::EdgeLines);
        let corner_points = RenderPass::new(
            mesh_pipeline("Corner Points", &shaders.points)
                .with_topology(PrimitiveMode::CornerPoints.topology()),
        )
        .with_primitive_mode(PrimitiveMode::CornerPoints);
        let polygon_centroids = RenderPass::new(
            mesh_pipeline("Polygon Centroids", &shaders.points)
                .with_topology(PrimitiveMode::PolygonCentroids.topology()),
        )
        .with_primitive_mode(PrimitiveMode::PolygonCentroids);

        let brush_back = RenderPass::new(
            mesh_pipeline("Brush back faces", &shaders.brush)
                .with_rasterization(RasterizationState::CULL_MODE_FRONT_CCW)
                .with_color_blend(ColorBlendState::color_blend_premultiplied()),
        );
        let brush_front = RenderPass::new(
            mesh_pipeline("Brush front faces", &shaders.brush)
                .with_color_blend(ColorBlendState::color_blend_premultiplied()),
        );
        let rendertarget_meshes = RenderPass::new(
            mesh_pipeline("Rendertarget Meshes", &shaders.textured)
                .with_rasterization(RasterizationState::CULL_MODE_NONE)
                .with_color_blend(ColorBlendState::color_blend_premultiplied()),
        );

        // The depth buffer must be cleared to the far plane value: the sky is
        // drawn at the far plane and passes only where nothing else was.
        let sky = RenderPass::new(
            PipelineState::new("Sky")
                .with_shader(Arc::clone(&shaders.sky))
                .with_rasterization(RasterizationState::CULL_MODE_NONE)
                .with_depth_stencil(DepthStencilState {
                    depth_test_enabled: true,
                    depth_write_enabled: false,
                    depth_compare: CompareFunction::Equal,
                    ..DepthStencilState::depth_test_disabled_stencil_test_disabled()
                }),
        )
        .with_primitive_mode(PrimitiveMode::NotRendered)
        .with_depth_clamped_to_near();

        Self {
            polygon_fill_opaque,
            polygon_fill_translucent,
            tool1_hidden_stencil,
            tool2_visible_stencil,
            tool3_depth_clear,
            tool4_depth,
            tool5_visible_color,
            tool6_hidden_color,
            line_hidden_blend,
            brush_back,
            brush_front,
            edge_lines,
            corner_points,
            polygon_centroids,
            rendertarget_meshes,
            sky,
        }
    }

    /// The six tool passes in execution order.
    pub fn tool_passes(&self) -> [&RenderPass; 6] {
        [
            &self.tool1_hidden_stencil,
            &self.tool2_visible_stencil,
            &self.tool3_depth_clear,
            &self.tool4_depth,
            &self.tool5_visible_color,
            &self.tool6_hidden_color,
        ]
    }

    /// Draw content meshes of one fill, blend and selection mode.
    ///
    /// `parameters` supplies the camera, lights and materials. Filled
    /// content includes `layers.controllers`; outlines draw content only,
    /// unlit, with colors and sizes from `style`.
    #[allow(clippy::too_many_arguments)]
    pub fn render_content(
        &self,
        renderer: &mut ForwardRenderer,
        parameters: &RenderParameters<'_>,
        layers: &ViewportLayers<'_>,
        fill_mode: FillMode,
        blend_mode: BlendMode,
        selection_mode: SelectionMode,
        style: &OutlineStyle,
    ) {
        let filter = content_filter(blend_mode, selection_mode);
        match fill_mode {
            FillMode::Fill => {
                let pass = match blend_mode {
                    BlendMode::Opaque => &self.polygon_fill_opaque,
                    BlendMode::Translucent => &self.polygon_fill_translucent,
                };
                let spans = [layers.content, layers.controllers];
                let passes = [pass];
                renderer.render(
                    &parameters
                        .with_mesh_spans(&spans)
                        .with_passes(&passes)
                        .with_filter(filter),
                );
            }
            FillMode::Outline => {
                let spans = [layers.content];
                let unlit = RenderParameters {
                    lights: &[],
                    light_projections: None,
                    shadow_texture: None,
                    ..parameters.with_mesh_spans(&spans).with_filter(filter)
                };
                let outlines = [
                    (style.edge_lines, &self.edge_lines, style.line_color, style.line_width),
                    (
                        style.polygon_centroids,
                        &self.polygon_centroids,
                        style.centroid_color,
                        style.point_size,
                    ),
                    (
                        style.corner_points,
                        &self.corner_points,
                        style.corner_color,
                        style.point_size,
                    ),
                ];
                for (enabled, pass, color, size) in outlines {
                    if !enabled {
                        continue;
                    }
                    let settings = renderer.primitive_settings_mut();
                    settings.color_source = PrimitiveColorSource::Constant(color);
                    settings.size_source = PrimitiveSizeSource::Constant(size);
                    let passes = [pass];
                    renderer.render(&unlit.with_passes(&passes));
                }
            }
        }
    }

    /// Draw tool meshes with the six tool passes, unlit.
    pub fn render_tool_meshes(
        &self,
        renderer: &mut ForwardRenderer,
        parameters: &RenderParameters<'_>,
        tool_meshes: &[Arc<Mesh>],
    ) {
        if tool_meshes.is_empty() || parameters.camera.is_none() {
            return;
        }
        let spans = [tool_meshes];
        let passes = self.tool_passes();
        renderer.render(&RenderParameters {
            lights: &[],
            light_projections: None,
            shadow_texture: None,
            ..parameters
                .with_mesh_spans(&spans)
                .with_passes(&passes)
                .with_filter(tool_filter())
        });
    }

    /// Draw brush previews, back faces first.
    pub fn render_brush(
        &self,
        renderer: &mut ForwardRenderer,
        parameters: &RenderParameters<'_>,
        brush_meshes: &[Arc<Mesh>],
    ) {
        if brush_meshes.is_empty() || parameters.camera.is_none() {
            return;
        }
        let spans = [brush_meshes];
        let passes = [&self.brush_back, &self.brush_front];
        renderer.render(
            &parameters
                .with_mesh_spans(&spans)
                .with_passes(&passes)
                .with_filter(brush_filter()),
        );
    }

    /// Draw meshes showing render targets.
    pub fn render_rendertarget_meshes(
        &self,
        renderer: &mut ForwardRenderer,
        parameters: &RenderParameters<'_>,
        rendertarget_meshes: &[Arc<Mesh>],
    ) {
        if parameters.camera.is_none() {
            return;
        }
        let spans = [rendertarget_meshes];
        let passes = [&self.rendertarget_meshes];
        renderer.render(&RenderParameters {
            lights: &[],
            light_projections: None,
            shadow_texture: None,
            ..parameters
                .with_mesh_spans(&spans)
                .with_passes(&passes)
                .with_filter(rendertarget_filter())
        });
    }

    /// Draw the sky as a fullscreen triangle.
    pub fn render_sky(&self, renderer: &mut ForwardRenderer, parameters: &RenderParameters<'_>) {
        let passes = [&self.sky];
        let mut sky = RenderParameters::new(parameters.viewport).with_passes(&passes);
        sky.camera = parameters.camera;
        sky.fallback_texture = parameters.fallback_texture;
        renderer.render_fullscreen(&sky, None);
    }

    /// Draw a full viewport frame.
    ///
    /// The caller clears color, depth (to the far plane) and stencil (to 0)
    /// beforehand.
    ///
    /// Makes up to 13 render calls, within the default
    /// [`RendererConfig::max_renders_per_frame`](crate::config::RendererConfig::max_renders_per_frame).
    pub fn render_viewport(
        &self,
        renderer: &mut ForwardRenderer,
        parameters: &RenderParameters<'_>,
        layers: &ViewportLayers<'_>,
        style: &OutlineStyle,
    ) {
        for (fill_mode, selection_mode) in [
            (FillMode::Fill, SelectionMode::NotSelected),
            (FillMode::Fill, SelectionMode::Selected),
            (FillMode::Outline, SelectionMode::NotSelected),
            (FillMode::Outline, SelectionMode::Selected),
        ] {
            self.render_content(
                renderer,
                parameters,
                layers,
                fill_mode,
                BlendMode::Opaque,
                selection_mode,
                style,
            );
        }
        self.render_sky(renderer, parameters);

        self.render_content(
            renderer,
            parameters,
            layers,
            FillMode::Fill,
            BlendMode::Translucent,
            SelectionMode::Any,
            style,
        );
        self.render_brush(renderer, parameters, layers.brush);
        self.render_rendertarget_meshes(renderer, parameters, layers.rendertarget);
        self.render_tool_meshes(renderer, parameters, layers.tool);
    }
}

//! Render passes.

use crate::backend::GpuBackend;
use crate::item::ItemFilter;
use crate::mesh::PrimitiveMode;
use crate::pipeline::PipelineState;

/// Backend state change run before or after the draws of a pass.
pub enum PassHook {
    /// Set the depth range. `DepthRange { near: 0.0, far: 0.0 }` pins every
    /// fragment to the near plane; `{ 0.0, 1.0 }` restores the default.
    DepthRange {
        /// Window depth of the near plane.
        near: f32,
        /// Window depth of the far plane.
        far: f32,
    },
    /// Arbitrary backend calls.
    Custom(Box<dyn Fn(&dyn GpuBackend) + Send + Sync>),
}

impl PassHook {
    /// Run the hook.
    pub fn run(&self, backend: &dyn GpuBackend) {
        match self {
            Self::DepthRange { near, far } => backend.set_depth_range(*near, *far),
            Self::Custom(hook) => hook(backend),
        }
    }
}

impl std::fmt::Debug for PassHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DepthRange { near, far } => f
                .debug_struct("DepthRange")
                .field("near", near)
                .field("far", far)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A fixed-function configuration applied to a filtered subset of meshes.
///
/// Passes are built once and reused every frame.
#[derive(Debug)]
pub struct RenderPass {
    /// Pipeline state applied before drawing.
    pub pipeline: PipelineState,
    /// Index range of each primitive the pass draws.
    pub primitive_mode: PrimitiveMode,
    /// Mesh filter. `None` uses the filter of the render parameters.
    pub filter: Option<ItemFilter>,
    /// Hook run before the pipeline state is applied.
    pub begin: Option<PassHook>,
    /// Hook run after the last draw.
    pub end: Option<PassHook>,
}

impl RenderPass {
    /// Create a pass drawing filled polygons with `pipeline`.
    pub fn new(pipeline: PipelineState) -> Self {
        Self {
            pipeline,
            primitive_mode: PrimitiveMode::PolygonFill,
            filter: None,
            begin: None,
            end: None,
        }
    }

    /// Pass name, taken from the pipeline state.
    pub fn name(&self) -> &str {
        &self.pipeline.name
    }

    /// Set the primitive mode.
    #[must_use]
    pub fn with_primitive_mode(mut self, primitive_mode: PrimitiveMode) -> Self {
        self.primitive_mode = primitive_mode;
        self
    }

    /// Set a mesh filter overriding the one of the render parameters.
    #[must_use]
    pub fn with_filter(mut self, filter: ItemFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the begin hook.
    #[must_use]
    pub fn with_begin(mut self, hook: PassHook) -> Self {
        self.begin = Some(hook);
        self
    }

    /// Set the end hook.
    #[must_use]
    pub fn with_end(mut self, hook: PassHook) -> Self {
        self.end = Some(hook);
        self
    }

    /// Pin depth to the near plane for the duration of the pass.
    #[must_use]
    pub fn with_depth_clamped_to_near(self) -> Self {
        self.with_begin(PassHook::DepthRange {
            near: 0.0,
            far: 0.0,
        })
        .with_end(PassHook::DepthRange {
            near: 0.0,
            far: 1.0,
        })
    }

    /// Filter to use given the filter of the render parameters.
    pub fn effective_filter(&self, default: &ItemFilter) -> ItemFilter {
        self.filter.unwrap_or(*default)
    }

    pub(crate) fn run_begin(&self, backend: &dyn GpuBackend) {
        if let Some(hook) = &self.begin {
            hook.run(backend);
        }
    }

    pub(crate) fn run_end(&self, backend: &dyn GpuBackend) {
        if let Some(hook) = &self.end {
            hook.run(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, RecordedCommand};
    use crate::item::ItemFlags;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_depth_range_hooks() {
        let backend = DummyBackend::new();
        let pass = RenderPass::new(PipelineState::new("sky")).with_depth_clamped_to_near();

        pass.run_begin(&backend);
        pass.run_end(&backend);

        assert_eq!(
            backend.commands(),
            vec![
                RecordedCommand::SetDepthRange {
                    near: 0.0,
                    far: 0.0
                },
                RecordedCommand::SetDepthRange {
                    near: 0.0,
                    far: 1.0
                },
            ]
        );
    }

    #[test]
    fn test_custom_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let pass = RenderPass::new(PipelineState::new("custom")).with_begin(PassHook::Custom(
            Box::new(move |_: &dyn GpuBackend| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        ));

        let backend = DummyBackend::new();
        pass.run_begin(&backend);
        pass.run_end(&backend);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(format!("{:?}", pass.begin).contains("Custom"));
    }

    #[test]
    fn test_effective_filter() {
        let default = ItemFilter::new().with_all_set(ItemFlags::VISIBLE);
        let pass = RenderPass::new(PipelineState::new("p"));
        assert_eq!(pass.effective_filter(&default), default);

        let tool = ItemFilter::new().with_all_set(ItemFlags::TOOL);
        let pass = pass.with_filter(tool);
        assert_eq!(pass.effective_filter(&default), tool);
        assert_eq!(pass.name(), "p");
    }
}

use std::marker::PhantomData;

use nalgebra::Matrix4;

use crate::error::Result;
use crate::pipeline::{RenderInbox, RenderRequest};
use crate::renderer::gl::PointsGl;
use crate::renderer::{PointsRenderer, ResultGlRenderer};

/// Render-thread host for a result renderer.
///
/// Holds the latest render request and only lets draws through while attached
/// to a live context; ticks that arrive before `attach` or after `detach` are
/// dropped and their results are never drawn.
pub struct OverlaySurface<G: PointsGl, R: ResultGlRenderer<G> = PointsRenderer<G>> {
    renderer: R,
    inbox: RenderInbox,
    current: Option<RenderRequest>,
    attached: bool,
    _gl: PhantomData<fn(&G)>,
}

impl<G: PointsGl, R: ResultGlRenderer<G>> OverlaySurface<G, R> {
    pub fn new(renderer: R, inbox: RenderInbox) -> Self {
        Self {
            renderer,
            inbox,
            current: None,
            attached: false,
            _gl: PhantomData,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Sets the renderer up on `gl`. On error the surface stays detached.
    pub fn attach(&mut self, gl: &G) -> Result<()> {
        self.renderer.setup_rendering(gl)?;
        self.attached = true;
        tracing::info!("overlay surface attached");
        Ok(())
    }

    /// Takes the newest pending request, if any. While attached it becomes
    /// the current overlay; while detached only the caller gets it, so a
    /// preview can keep running without a renderer.
    pub fn poll(&mut self) -> Option<RenderRequest> {
        let latest = self.inbox.take_latest()?;
        if self.attached {
            self.current = Some(latest.clone());
        } else {
            tracing::trace!("surface detached, not keeping render data");
        }
        Some(latest)
    }

    /// Forgets the current result and everything still queued.
    pub fn clear(&mut self) {
        if self.inbox.take_latest().is_some() {
            tracing::debug!("discarded pending render requests");
        }
        self.current = None;
    }

    pub fn current(&self) -> Option<&RenderRequest> {
        self.current.as_ref()
    }

    /// One render tick: picks up the newest result and draws it with `projection`.
    pub fn draw(&mut self, gl: &G, projection: &Matrix4<f32>) -> Result<()> {
        self.poll();
        self.redraw(gl, projection)
    }

    /// Draws the current result again without looking for a newer one.
    pub fn redraw(&mut self, gl: &G, projection: &Matrix4<f32>) -> Result<()> {
        if !self.attached {
            tracing::trace!("surface detached, dropping render tick");
            return Ok(());
        }
        let result = self.current.as_ref().map(|request| &request.result);
        self.renderer.render_result(gl, result, projection)
    }

    /// Tears the renderer down. Pass `None` when the context is already gone.
    pub fn detach(&mut self, gl: Option<&G>) {
        match gl {
            Some(gl) => self.renderer.release(gl),
            None => self.renderer.invalidate(),
        }
        self.current = None;
        if self.attached {
            tracing::info!("overlay surface detached");
        }
        self.attached = false;
    }
}

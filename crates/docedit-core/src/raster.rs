//! Page rasterization with supersession
//!
//! Pixel production is delegated to a [`RenderBackend`]; this module owns the
//! bookkeeping around it. Every request bumps a generation counter, and a
//! finished render whose generation is no longer current is discarded
//! instead of painted. A backend is initialized once, explicitly, when the
//! rasterizer is constructed.

use crate::config::RenderConfig;
use crate::document::DocumentHandle;
use crate::error::RenderError;
use crate::geometry::{PageGeometry, ScreenRect};
use crate::viewport::PageViewport;
use serde::{Deserialize, Serialize};

pub trait RenderBackend {
    /// One-time setup, run before the first page is rendered
    fn initialize(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    fn render_page(
        &mut self,
        geometry: &PageGeometry,
        viewport: &PageViewport,
        surface: &mut Surface,
    ) -> Result<(), RenderError>;
}

impl<B: RenderBackend + ?Sized> RenderBackend for Box<B> {
    fn initialize(&mut self) -> Result<(), RenderError> {
        (**self).initialize()
    }

    fn render_page(
        &mut self,
        geometry: &PageGeometry,
        viewport: &PageViewport,
        surface: &mut Surface,
    ) -> Result<(), RenderError> {
        (**self).render_page(geometry, viewport, surface)
    }
}

/// Paints a blank sheet. Used where page pixels come from elsewhere (a
/// browser-side renderer) and only the surface bookkeeping is wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaperBackend;

impl RenderBackend for PaperBackend {
    fn render_page(
        &mut self,
        _geometry: &PageGeometry,
        _viewport: &PageViewport,
        surface: &mut Surface,
    ) -> Result<(), RenderError> {
        surface.fill([255, 255, 255, 255]);
        Ok(())
    }
}

/// RGBA8 pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32, max_pixels: u64) -> Result<Self, RenderError> {
        let count = width as u64 * height as u64;
        if count == 0 || count > max_pixels {
            return Err(RenderError::SurfaceUnavailable { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels: vec![0; count as usize * 4],
        })
    }

    pub fn for_viewport(viewport: &PageViewport, max_pixels: u64) -> Result<Self, RenderError> {
        let width = viewport.pixel_width.round();
        let height = viewport.pixel_height.round();
        if !(width >= 1.0 && height >= 1.0 && width <= u32::MAX as f64 && height <= u32::MAX as f64) {
            return Err(RenderError::SurfaceUnavailable {
                width: width.max(0.0) as u32,
                height: height.max(0.0) as u32,
            });
        }
        Self::new(width as u32, height as u32, max_pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Fill a rectangle, clipped to the surface. Negative extents are
    /// filled from the far edge back.
    pub fn fill_rect(&mut self, rect: &ScreenRect, rgba: [u8; 4]) {
        let clamp_x = |v: f64| v.round().clamp(0.0, self.width as f64) as usize;
        let clamp_y = |v: f64| v.round().clamp(0.0, self.height as f64) as usize;
        let (x0, x1) = ordered(clamp_x(rect.x), clamp_x(rect.right()));
        let (y0, y1) = ordered(clamp_y(rect.y), clamp_y(rect.bottom()));
        let stride = self.width as usize * 4;
        for y in y0..y1 {
            let row = &mut self.pixels[y * stride..(y + 1) * stride];
            for px in row[x0 * 4..x1 * 4].chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }
    }

    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| RenderError::Backend(format!("PNG header: {}", e)))?;
            writer
                .write_image_data(&self.pixels)
                .map_err(|e| RenderError::Backend(format!("PNG data: {}", e)))?;
        }
        Ok(out)
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Handle for one render request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderTicket {
    pub generation: u64,
    pub geometry: PageGeometry,
    pub viewport: PageViewport,
}

#[derive(Debug)]
pub struct RenderedPage {
    pub viewport: PageViewport,
    pub surface: Surface,
}

#[derive(Debug)]
pub enum RenderOutcome {
    Painted(RenderedPage),
    /// A newer request arrived before this one finished
    Superseded,
    /// The target has no measurable width yet
    Deferred,
}

pub struct PageRasterizer<B> {
    backend: B,
    generation: u64,
    max_surface_pixels: u64,
}

impl<B: RenderBackend> PageRasterizer<B> {
    pub fn initialize(mut backend: B, config: &RenderConfig) -> Result<Self, RenderError> {
        backend.initialize()?;
        tracing::debug!(
            "Rasterizer ready (max surface {} pixels)",
            config.max_surface_pixels
        );
        Ok(Self {
            backend,
            generation: 0,
            max_surface_pixels: config.max_surface_pixels,
        })
    }

    /// Start a render request, superseding every earlier one.
    ///
    /// Returns `Ok(None)` when the target width is not measurable yet.
    pub fn begin(
        &mut self,
        handle: &DocumentHandle,
        page: u32,
        pixel_width: f64,
    ) -> Result<Option<RenderTicket>, RenderError> {
        let geometry = *handle
            .page(page)
            .map_err(|_| RenderError::PageOutOfRange {
                page,
                count: handle.page_count(),
            })?;
        self.generation += 1;

        let Some(viewport) = PageViewport::measure(&geometry, pixel_width) else {
            tracing::debug!("Deferring render of page {}: container not measured", page);
            return Ok(None);
        };
        Ok(Some(RenderTicket {
            generation: self.generation,
            geometry,
            viewport,
        }))
    }

    pub fn is_current(&self, ticket: &RenderTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Drop every in-flight request, e.g. when the document is replaced
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn render(
        &mut self,
        handle: &DocumentHandle,
        page: u32,
        pixel_width: f64,
    ) -> Result<RenderOutcome, RenderError> {
        let Some(ticket) = self.begin(handle, page, pixel_width)? else {
            return Ok(RenderOutcome::Deferred);
        };
        self.paint(&ticket)
    }

    /// Paint the surface for a ticket from [`begin`](Self::begin). A ticket
    /// that a newer request has replaced is not painted.
    pub fn paint(&mut self, ticket: &RenderTicket) -> Result<RenderOutcome, RenderError> {
        if !self.is_current(ticket) {
            tracing::debug!("Discarding superseded render of page {}", ticket.geometry.page);
            return Ok(RenderOutcome::Superseded);
        }
        let mut surface = Surface::for_viewport(&ticket.viewport, self.max_surface_pixels)?;
        self.backend
            .render_page(&ticket.geometry, &ticket.viewport, &mut surface)?;
        Ok(RenderOutcome::Painted(RenderedPage {
            viewport: ticket.viewport,
            surface,
        }))
    }

    /// Render every page at one width. Pages that fail are logged and skipped.
    pub fn render_all(&mut self, handle: &DocumentHandle, pixel_width: f64) -> Vec<RenderedPage> {
        let mut rendered = Vec::new();
        for page in 1..=handle.page_count() {
            match self.render(handle, page, pixel_width) {
                Ok(RenderOutcome::Painted(result)) => rendered.push(result),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping page {}: {}", page, e),
            }
        }
        rendered
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

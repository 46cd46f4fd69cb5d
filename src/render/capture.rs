//! Whole-screen export: a serialized visual surface is cropped to one container,
//! stripped of interactive controls, rasterized, and embedded as a single image
//! on a page sized to the raster. The result has no text layer and no pagination.

use crate::render::pdf::{self, PageCanvas, RasterImage};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_IGNORE_MARKER: &str = "no-export";
const MAX_RASTER_PIXELS: u64 = 40_000_000;

/// A box in the captured visual tree. Coordinates are absolute, in CSS pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub markers: Vec<String>,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub fill: Option<[u8; 3]>,
    #[serde(default)]
    pub children: Vec<SurfaceNode>,
}

impl SurfaceNode {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read surface file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse surface file: {}", path.display()))
    }

    pub fn find(&self, id: &str) -> Option<&SurfaceNode> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }

        self.children.iter().find_map(|child| child.find(id))
    }

    /// Deep copy without any subtree carrying `marker`.
    pub fn without_marker(&self, marker: &str) -> SurfaceNode {
        SurfaceNode {
            children: self
                .children
                .iter()
                .filter(|child| !child.markers.iter().any(|value| value == marker))
                .map(|child| child.without_marker(marker))
                .collect(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub ignore_marker: String,
    pub scale: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            ignore_marker: DEFAULT_IGNORE_MARKER.to_string(),
            scale: 2,
        }
    }
}

pub fn render_from_element(
    surface: &SurfaceNode,
    root_id: &str,
    options: &CaptureOptions,
) -> Result<Vec<u8>> {
    let root = surface
        .find(root_id)
        .with_context(|| format!("Export container not found: #{root_id}"))?;

    let cleaned = root.without_marker(&options.ignore_marker);
    let raster = rasterize(&cleaned, options.scale)?;

    let mut page = PageCanvas::new(raster.width as f32, raster.height as f32);
    page.draw_image(raster);

    pdf::write_document(root_id, vec![page])
}

/// Paints node fills onto a white canvas; later siblings paint over earlier ones.
pub fn rasterize(root: &SurfaceNode, scale: u32) -> Result<RasterImage> {
    let scale = scale.max(1);
    let width = root.width.saturating_mul(scale);
    let height = root.height.saturating_mul(scale);

    if width == 0 || height == 0 {
        bail!("Export container has no visible area");
    }
    if u64::from(width) * u64::from(height) > MAX_RASTER_PIXELS {
        bail!("Export container is too large to capture: {width}x{height}");
    }

    let mut image = RasterImage {
        width,
        height,
        pixels: vec![255; width as usize * height as usize * 3],
    };
    paint(&mut image, root, (root.x, root.y), scale);

    Ok(image)
}

fn paint(image: &mut RasterImage, node: &SurfaceNode, origin: (i32, i32), scale: u32) {
    if let Some(color) = node.fill {
        let scale = i64::from(scale);
        let left = (i64::from(node.x) - i64::from(origin.0)) * scale;
        let top = (i64::from(node.y) - i64::from(origin.1)) * scale;
        let right = left + i64::from(node.width) * scale;
        let bottom = top + i64::from(node.height) * scale;

        let x_range = left.clamp(0, i64::from(image.width))..right.clamp(0, i64::from(image.width));
        let y_range = top.clamp(0, i64::from(image.height))..bottom.clamp(0, i64::from(image.height));

        for y in y_range {
            let row_start = y as usize * image.width as usize * 3;
            for x in x_range.clone() {
                let offset = row_start + x as usize * 3;
                image.pixels[offset..offset + 3].copy_from_slice(&color);
            }
        }
    }

    for child in &node.children {
        paint(image, child, origin, scale);
    }
}

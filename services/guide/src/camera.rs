//! A camera backed by an image file on disk.
//!
//! Stands in for a passthrough camera: the "scene" is whatever image was last
//! loaded, and swapping the file simulates the scene changing between steps.

use guide_core::collaborators::Camera;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("failed to load scene image {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Default)]
pub struct FileCamera {
    scene: Option<RgbaImage>,
    source: Option<PathBuf>,
}

impl FileCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, CameraError> {
        let mut camera = Self::new();
        camera.load(path)?;
        Ok(camera)
    }

    /// Replaces the current scene with the image at `path`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), CameraError> {
        let path = path.as_ref();
        let scene = image::open(path)
            .map_err(|source| CameraError::Load {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        info!(path = %path.display(), width = scene.width(), height = scene.height(), "Loaded scene image");
        self.scene = Some(scene);
        self.source = Some(path.to_path_buf());
        Ok(())
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl Camera for FileCamera {
    fn has_permission(&self) -> bool {
        true
    }

    fn is_playing(&self) -> bool {
        self.scene.is_some()
    }

    fn resolution(&self) -> (u32, u32) {
        self.scene
            .as_ref()
            .map(|scene| scene.dimensions())
            .unwrap_or((0, 0))
    }

    fn colors(&self) -> Vec<u8> {
        self.scene
            .as_ref()
            .map(|scene| scene.as_raw().clone())
            .unwrap_or_default()
    }
}

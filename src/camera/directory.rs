//! Replays JPEG files from a directory

use super::{Camera, Frame, FrameBufferPool, InitError};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Camera that cycles through `*.jpg` / `*.jpeg` files in name order
pub struct DirectoryCamera {
    pool: FrameBufferPool,
    files: Vec<PathBuf>,
    next: usize,
}

impl DirectoryCamera {
    pub fn open(dir: &Path, fb_count: usize) -> Result<Self, InitError> {
        let entries = std::fs::read_dir(dir).map_err(|source| InitError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_jpeg_name(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(InitError::NoImages(dir.to_path_buf()));
        }

        info!(directory = %dir.display(), images = files.len(), "Replaying images from directory");

        Ok(Self {
            pool: FrameBufferPool::new(fb_count),
            files,
            next: 0,
        })
    }

    /// Images found at startup
    pub fn image_count(&self) -> usize {
        self.files.len()
    }
}

fn is_jpeg_name(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}

impl Camera for DirectoryCamera {
    fn capture_frame(&mut self) -> Option<Frame> {
        // Keep the replay position while every buffer is lent out
        if self.pool.available() == 0 {
            return None;
        }

        let path = &self.files[self.next];
        self.next = (self.next + 1) % self.files.len();

        self.pool.fill(|buf| {
            match File::open(path).and_then(|mut file| file.read_to_end(buf)) {
                Ok(_) => true,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read image");
                    false
                }
            }
        })
    }

    fn release_frame(&mut self, frame: Frame) {
        self.pool.release(frame);
    }
}

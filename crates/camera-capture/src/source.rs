//! Pull-based frame sources

use std::collections::VecDeque;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::{CameraConfig, CameraError, VideoFrame};

const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// A camera-like source of frames.
///
/// `Ok(None)` means the stream has ended and the caller should shut down.
pub trait FrameSource {
    fn read(&mut self) -> Result<Option<VideoFrame>, CameraError>;

    /// Release the underlying device
    fn release(&mut self) {}
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn read(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        (**self).read()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Replays a directory of still images in file-name order
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    sequence: u32,
    interval_ns: u64,
    loop_playback: bool,
}

impl ImageSequenceSource {
    /// Open the directory named by the configuration
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let dir = &config.source_dir;
        if !dir.is_dir() {
            return Err(CameraError::Open(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if supported {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(CameraError::Open(format!(
                "no frames found in {}",
                dir.display()
            )));
        }

        info!("Opened image sequence {} ({} frames)", dir.display(), paths.len());

        Ok(Self {
            paths,
            next: 0,
            sequence: 0,
            interval_ns: config.frame_interval_ns(),
            loop_playback: config.loop_playback,
        })
    }

    /// Number of frames in one pass
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn read(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        if self.paths.is_empty() {
            return Ok(None);
        }
        if self.next >= self.paths.len() {
            if !self.loop_playback {
                return Ok(None);
            }
            debug!("Image sequence exhausted, looping");
            self.next = 0;
        }

        let path = &self.paths[self.next];
        let img = image::open(path).map_err(|e| CameraError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let frame = VideoFrame::from_rgb_image(
            img.to_rgb8(),
            u64::from(self.sequence) * self.interval_ns,
            self.sequence,
        );
        self.next += 1;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(Some(frame))
    }

    fn release(&mut self) {
        info!("Releasing image sequence after {} frames", self.sequence);
        self.paths.clear();
        self.next = 0;
    }
}

/// Replays frames held in memory
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<VideoFrame>,
}

impl MemorySource {
    pub fn new(frames: Vec<VideoFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for MemorySource {
    fn read(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        Ok(self.frames.pop_front())
    }

    fn release(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn write_frames(dir: &std::path::Path, names: &[&str]) {
        for (i, name) in names.iter().enumerate() {
            let img = RgbImage::from_pixel(4, 4, image::Rgb([i as u8 * 10, 0, 0]));
            img.save(dir.join(name)).unwrap();
        }
    }

    #[test]
    fn test_memory_source_drains() {
        let mut source = MemorySource::new(vec![
            VideoFrame::filled(2, 2, [0, 0, 0], 0),
            VideoFrame::filled(2, 2, [0, 0, 0], 1),
        ]);

        assert_eq!(source.read().unwrap().unwrap().sequence, 0);
        assert_eq!(source.read().unwrap().unwrap().sequence, 1);
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_sequence_sorted_and_ends() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), &["b.png", "a.png", "c.png"]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let config = CameraConfig {
            source_dir: dir.path().to_path_buf(),
            fps: 10,
            ..Default::default()
        };
        let mut source = ImageSequenceSource::open(&config).unwrap();
        assert_eq!(source.len(), 3);

        // a.png was written second, so its red channel is 10
        let first = source.read().unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0), Some([10, 0, 0]));
        assert_eq!(first.timestamp_ns, 0);

        let second = source.read().unwrap().unwrap();
        assert_eq!(second.timestamp_ns, 100_000_000);

        assert!(source.read().unwrap().is_some());
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_sequence_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), &["only.png"]);

        let config = CameraConfig {
            source_dir: dir.path().to_path_buf(),
            loop_playback: true,
            ..Default::default()
        };
        let mut source = ImageSequenceSource::open(&config).unwrap();
        for expected in 0..3 {
            assert_eq!(source.read().unwrap().unwrap().sequence, expected);
        }
    }

    #[test]
    fn test_read_after_release_ends_stream() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), &["a.png", "b.png"]);

        let config = CameraConfig {
            source_dir: dir.path().to_path_buf(),
            loop_playback: true,
            ..Default::default()
        };
        let mut source = ImageSequenceSource::open(&config).unwrap();
        assert!(source.read().unwrap().is_some());

        source.release();
        assert!(source.read().unwrap().is_none());
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_open_missing_dir() {
        let config = CameraConfig {
            source_dir: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        };
        assert!(matches!(
            ImageSequenceSource::open(&config),
            Err(CameraError::Open(_))
        ));
    }

    #[test]
    fn test_open_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = CameraConfig {
            source_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(ImageSequenceSource::open(&config).is_err());
    }

    #[test]
    fn test_undecodable_frame() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not a png").unwrap();

        let config = CameraConfig {
            source_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut source = ImageSequenceSource::open(&config).unwrap();
        assert!(matches!(source.read(), Err(CameraError::Decode { .. })));
    }
}

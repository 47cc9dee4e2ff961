//! Media acquisition and speech collaborators.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::encoder::{self, EncodeError};
use crate::location::Coordinates;

pub const VIDEO_MIME: &str = "video/mp4";

pub struct CapturedPhoto {
    pub image: DynamicImage,
    pub location: Option<Coordinates>,
}

#[derive(Debug, Clone)]
pub struct CapturedVideo {
    pub path: PathBuf,
    pub location: Option<Coordinates>,
}

impl CapturedVideo {
    /// File name sent in the multipart `video` part.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".into())
    }
}

/// Camera, photo library and video pickers. `None` means the user cancelled.
pub trait MediaAcquirer: Send + Sync {
    fn capture_photo(&self) -> Option<CapturedPhoto>;
    fn capture_video(&self) -> Option<CapturedVideo>;
}

/// Acquirer backed by files on disk.
#[derive(Debug, Clone, Default)]
pub struct FileAcquirer {
    pub photo: Option<PathBuf>,
    pub video: Option<PathBuf>,
    pub location: Option<Coordinates>,
}

impl FileAcquirer {
    pub fn load_photo(path: &Path, location: Option<Coordinates>) -> Result<CapturedPhoto, EncodeError> {
        Ok(CapturedPhoto {
            image: encoder::open_image(path)?,
            location,
        })
    }
}

impl MediaAcquirer for FileAcquirer {
    fn capture_photo(&self) -> Option<CapturedPhoto> {
        let path = self.photo.as_deref()?;
        match Self::load_photo(path, self.location) {
            Ok(photo) => Some(photo),
            Err(e) => {
                tracing::warn!("Could not load {}: {e}", path.display());
                None
            }
        }
    }

    fn capture_video(&self) -> Option<CapturedVideo> {
        let path = self.video.as_ref()?;
        path.is_file().then(|| CapturedVideo {
            path: path.clone(),
            location: self.location,
        })
    }
}

/// Text-to-speech playback.
pub trait Speaker: Send + Sync {
    fn speak(&self, text: &str);
    fn stop(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_file_name_comes_from_path() {
        let video = CapturedVideo {
            path: PathBuf::from("/tmp/clips/IMG_0042.MOV"),
            location: None,
        };
        assert_eq!(video.file_name(), "IMG_0042.MOV");
        let bare = CapturedVideo {
            path: PathBuf::from("/"),
            location: None,
        };
        assert_eq!(bare.file_name(), "video.mp4");
    }

    #[test]
    fn file_acquirer_reports_cancel_for_missing_media() {
        let acquirer = FileAcquirer {
            photo: Some(PathBuf::from("/definitely/not/here.jpg")),
            video: Some(PathBuf::from("/definitely/not/here.mp4")),
            location: None,
        };
        assert!(acquirer.capture_photo().is_none());
        assert!(acquirer.capture_video().is_none());
        assert!(FileAcquirer::default().capture_photo().is_none());
    }

    #[test]
    fn file_acquirer_loads_photo_with_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wall.png");
        image::RgbImage::new(8, 6).save(&path).unwrap();

        let location = Some(Coordinates {
            latitude: 30.0,
            longitude: -97.0,
        });
        let acquirer = FileAcquirer {
            photo: Some(path),
            video: None,
            location,
        };
        let photo = acquirer.capture_photo().unwrap();
        assert_eq!((photo.image.width(), photo.image.height()), (8, 6));
        assert_eq!(photo.location, location);
    }
}

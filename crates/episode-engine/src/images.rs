use crate::traits::ImageLoader;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rand::Rng;
use std::path::Path;

/// Random-noise stand-in for a missing frame image.
pub fn placeholder_image(size: (u32, u32)) -> RgbImage {
    let mut rng = rand::thread_rng();
    RgbImage::from_fn(size.0, size.1, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]))
}

/// Reads images from disk, converts to RGB and resizes with a Lanczos3 filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileImageLoader;

impl ImageLoader for FileImageLoader {
    fn load(&self, path: &Path, size: (u32, u32)) -> RgbImage {
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "image not found, using placeholder");
            return placeholder_image(size);
        }
        let img = match image::open(path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "image decode failed, using placeholder"
                );
                return placeholder_image(size);
            }
        };
        if img.dimensions() == size {
            img
        } else {
            imageops::resize(&img, size.0, size.1, FilterType::Lanczos3)
        }
    }
}

/// Never touches the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderImageLoader;

impl ImageLoader for PlaceholderImageLoader {
    fn load(&self, _path: &Path, size: (u32, u32)) -> RgbImage {
        placeholder_image(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_size() {
        let img = placeholder_image((32, 16));
        assert_eq!(img.dimensions(), (32, 16));
    }

    #[test]
    fn test_missing_file_yields_placeholder() {
        let img = FileImageLoader.load(Path::new("/definitely/not/here.jpg"), (224, 224));
        assert_eq!(img.dimensions(), (224, 224));
    }

    #[test]
    fn test_loads_and_resizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let src = RgbImage::from_pixel(64, 48, Rgb([200, 10, 10]));
        src.save(&path).unwrap();

        let img = FileImageLoader.load(&path, (16, 16));
        assert_eq!(img.dimensions(), (16, 16));
        let px = img.get_pixel(8, 8);
        assert!(px[0] > 150 && px[1] < 60);

        let same = FileImageLoader.load(&path, (64, 48));
        assert_eq!(same, src);
    }

    #[test]
    fn test_undecodable_file_yields_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let img = FileImageLoader.load(&path, (8, 8));
        assert_eq!(img.dimensions(), (8, 8));
    }
}

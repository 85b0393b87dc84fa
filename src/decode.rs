//! Decoders turning one slice file into a typed array
//!
//! The array engine never decodes files itself; it calls a [`Decoder`] that
//! was injected when the array was built. [`StandardImageDecoder`] reads the
//! formats supported by the `image` crate (TIFF, PNG, JPEG, BMP, ...).
//! Arbitrary functions can be plugged in with [`FnDecoder`].

use crate::error::{Result, VolpkgError};
use crate::probe::image_properties;
use crate::types::{ChunkData, ImageProperties};
use image::DynamicImage;
use ndarray::{ArrayD, IxDyn};
use std::fmt;
use std::path::Path;

/// Capability for decoding a slice file into an array
pub trait Decoder: Send + Sync {
    /// Fully decode the file at `path`
    fn decode(&self, path: &Path) -> Result<ChunkData>;

    /// Report the shape and element type of the file at `path`.
    ///
    /// The default decodes the whole file once and reports what came out.
    /// The answer is whatever the decoder produces; nothing checks it.
    fn probe(&self, path: &Path) -> Result<ImageProperties> {
        self.decode(path).map(|chunk| chunk.properties())
    }

    /// Short name used in logs
    fn name(&self) -> &str {
        "custom"
    }
}

/// Decoder backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardImageDecoder;

impl Decoder for StandardImageDecoder {
    fn decode(&self, path: &Path) -> Result<ChunkData> {
        let image = image::open(path).map_err(|e| VolpkgError::unreadable(path, e))?;
        dynamic_image_to_chunk(image, path)
    }

    /// Reads dimensions and color type from the file header only
    fn probe(&self, path: &Path) -> Result<ImageProperties> {
        image_properties(path)
    }

    fn name(&self) -> &str {
        "image"
    }
}

/// Convert a decoded image into `(height, width)` or `(height, width, channels)`
pub fn dynamic_image_to_chunk(image: DynamicImage, path: &Path) -> Result<ChunkData> {
    let height = image.height() as usize;
    let width = image.width() as usize;
    let channels = image.color().channel_count() as usize;
    let shape = if channels == 1 {
        vec![height, width]
    } else {
        vec![height, width, channels]
    };
    let shape = IxDyn(&shape);

    let chunk = match image {
        DynamicImage::ImageLuma8(buf) => ChunkData::U8(ArrayD::from_shape_vec(shape, buf.into_raw())?),
        DynamicImage::ImageLumaA8(buf) => ChunkData::U8(ArrayD::from_shape_vec(shape, buf.into_raw())?),
        DynamicImage::ImageRgb8(buf) => ChunkData::U8(ArrayD::from_shape_vec(shape, buf.into_raw())?),
        DynamicImage::ImageRgba8(buf) => ChunkData::U8(ArrayD::from_shape_vec(shape, buf.into_raw())?),
        DynamicImage::ImageLuma16(buf) => ChunkData::U16(ArrayD::from_shape_vec(shape, buf.into_raw())?),
        DynamicImage::ImageLumaA16(buf) => ChunkData::U16(ArrayD::from_shape_vec(shape, buf.into_raw())?),
        DynamicImage::ImageRgb16(buf) => ChunkData::U16(ArrayD::from_shape_vec(shape, buf.into_raw())?),
        DynamicImage::ImageRgba16(buf) => ChunkData::U16(ArrayD::from_shape_vec(shape, buf.into_raw())?),
        DynamicImage::ImageRgb32F(buf) => ChunkData::F32(ArrayD::from_shape_vec(shape, buf.into_raw())?),
        DynamicImage::ImageRgba32F(buf) => ChunkData::F32(ArrayD::from_shape_vec(shape, buf.into_raw())?),
        other => {
            return Err(VolpkgError::unreadable(
                path,
                format!("unsupported color type {:?}", other.color()),
            ))
        }
    };

    Ok(chunk)
}

/// Adapter turning any function into a [`Decoder`]
pub struct FnDecoder<F> {
    func: F,
    name: String,
}

impl<F> FnDecoder<F>
where
    F: Fn(&Path) -> Result<ChunkData> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            name: "custom".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> Decoder for FnDecoder<F>
where
    F: Fn(&Path) -> Result<ChunkData> + Send + Sync,
{
    fn decode(&self, path: &Path) -> Result<ChunkData> {
        (self.func)(path)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnDecoder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnDecoder").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use image::{ImageBuffer, Luma, Rgb};
    use tempfile::TempDir;

    #[test]
    fn test_decode_grayscale_16bit() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("slice.tif");
        let img: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(5, 3, |x, y| Luma([(y * 5 + x) as u16 * 100]));
        img.save(&path).unwrap();

        let chunk = StandardImageDecoder.decode(&path).unwrap();
        assert_eq!(chunk.data_type(), DataType::U16);
        assert_eq!(chunk.shape(), &[3, 5]);
        let view = chunk.view::<u16>().unwrap();
        assert_eq!(view[[1, 2]], 700);
    }

    #[test]
    fn test_decode_rgb_has_channel_axis() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("color.png");
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(4, 2, Rgb([1, 2, 3]));
        img.save(&path).unwrap();

        let chunk = StandardImageDecoder.decode(&path).unwrap();
        assert_eq!(chunk.shape(), &[2, 4, 3]);
        assert_eq!(chunk.view::<u8>().unwrap()[[1, 3, 2]], 3);
    }

    #[test]
    fn test_decode_missing_file() {
        let err = StandardImageDecoder
            .decode(Path::new("/definitely/not/here.tif"))
            .unwrap_err();
        assert!(matches!(err, VolpkgError::UnreadableFile { .. }));
    }

    #[test]
    fn test_fn_decoder_default_probe_decodes() {
        let decoder = FnDecoder::new(|_path: &Path| {
            Ok(ChunkData::F64(ArrayD::zeros(IxDyn(&[7, 2]))))
        })
        .with_name("zeros");
        let props = decoder.probe(Path::new("ignored")).unwrap();
        assert_eq!(props, ImageProperties::new(vec![7, 2], DataType::F64));
        assert_eq!(decoder.name(), "zeros");
    }
}

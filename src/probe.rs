//! Cheap shape and element type inspection of single files

use crate::decode::Decoder;
use crate::error::{Result, VolpkgError};
use crate::types::{DataType, ImageProperties};
use image::{ColorType, ImageDecoder as _, ImageReader};
use std::path::Path;

/// Capability for reporting a file's shape and element type
pub trait Prober: Send + Sync {
    fn probe(&self, path: &Path) -> Result<ImageProperties>;
}

impl<F> Prober for F
where
    F: Fn(&Path) -> Result<ImageProperties> + Send + Sync,
{
    fn probe(&self, path: &Path) -> Result<ImageProperties> {
        self(path)
    }
}

/// Shape and element type from the image header, without decoding pixels
pub fn image_properties(path: &Path) -> Result<ImageProperties> {
    let decoder = ImageReader::open(path)
        .map_err(|e| VolpkgError::unreadable(path, e))?
        .with_guessed_format()
        .map_err(|e| VolpkgError::unreadable(path, e))?
        .into_decoder()
        .map_err(|e| VolpkgError::unreadable(path, e))?;

    let (width, height) = decoder.dimensions();
    let color = decoder.color_type();
    let data_type = color_data_type(color).ok_or_else(|| {
        VolpkgError::unreadable(path, format!("unsupported color type {:?}", color))
    })?;

    let channels = color.channel_count() as usize;
    let mut shape = vec![height as usize, width as usize];
    if channels > 1 {
        shape.push(channels);
    }

    Ok(ImageProperties::new(shape, data_type))
}

/// Shape and element type obtained by decoding the whole file once
pub fn loaded_properties(decoder: &dyn Decoder, path: &Path) -> Result<ImageProperties> {
    decoder.decode(path).map(|chunk| chunk.properties())
}

/// Probe `path`, preferring an explicit prober over the decoder's own probe
pub fn probe(
    path: &Path,
    decoder: &dyn Decoder,
    prober: Option<&dyn Prober>,
) -> Result<ImageProperties> {
    let props = match prober {
        Some(prober) => prober.probe(path)?,
        None => decoder.probe(path)?,
    };
    tracing::debug!(
        path = %path.display(),
        shape = ?props.shape,
        dtype = %props.data_type,
        "probed slice"
    );
    Ok(props)
}

fn color_data_type(color: ColorType) -> Option<DataType> {
    match color {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => Some(DataType::U8),
        ColorType::L16 | ColorType::La16 | ColorType::Rgb16 | ColorType::Rgba16 => {
            Some(DataType::U16)
        }
        ColorType::Rgb32F | ColorType::Rgba32F => Some(DataType::F32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{FnDecoder, StandardImageDecoder};
    use crate::types::ChunkData;
    use image::{ImageBuffer, Luma};
    use ndarray::{ArrayD, IxDyn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn write_slice(path: &Path, width: u32, height: u32) {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(width, height, Luma([9]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_metadata_probe() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("000.tif");
        write_slice(&path, 12, 8);

        let props = image_properties(&path).unwrap();
        assert_eq!(props.shape, vec![8, 12]);
        assert_eq!(props.data_type, DataType::U16);
        assert_eq!(StandardImageDecoder.probe(&path).unwrap(), props);
    }

    #[test]
    fn test_probe_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("garbage.tif");
        std::fs::write(&path, b"not an image at all").unwrap();

        let err = image_properties(&path).unwrap_err();
        assert!(matches!(err, VolpkgError::UnreadableFile { .. }));
    }

    #[test]
    fn test_custom_decoder_probes_by_loading_once() {
        let calls = AtomicUsize::new(0);
        let decoder = FnDecoder::new(|_path: &Path| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChunkData::I32(ArrayD::zeros(IxDyn(&[3, 4]))))
        });

        let props = probe(Path::new("a.raw"), &decoder, None).unwrap();
        assert_eq!(props, ImageProperties::new(vec![3, 4], DataType::I32));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_prober_wins() {
        let decoder = FnDecoder::new(|path: &Path| {
            Err(VolpkgError::unreadable(path, "decoder should not be called"))
        });
        let prober = |_path: &Path| -> Result<ImageProperties> {
            Ok(ImageProperties::new(vec![2, 2], DataType::U8))
        };

        let props = probe(Path::new("a.raw"), &decoder, Some(&prober)).unwrap();
        assert_eq!(props.shape, vec![2, 2]);
        assert!(loaded_properties(&decoder, Path::new("a.raw")).is_err());
    }
}

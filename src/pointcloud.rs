//! Reader for Volume Cartographer point sets (`.vcps`)
//!
//! The file starts with an ASCII header terminated by `<>\n`. The header
//! carries `height: <n>`, `width: <n>` and `dim: <n>` in any order. The body
//! holds `height * width * dim` little-endian f64 values laid out as
//! `(height, width, dim)`.

use crate::error::{Result, VolpkgError};
use crate::utils::le_bytes_to_f64;
use ndarray::{Array2, Array3, Axis};
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::OnceLock;

/// End-of-header marker
pub const HEADER_TERMINATOR: &[u8] = b"<>\n";

/// Grid dimensions declared in a point set header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointCloudHeader {
    pub height: usize,
    pub width: usize,
    pub dim: usize,
}

impl PointCloudHeader {
    /// Number of f64 values in the body, `None` on overflow
    pub fn num_values(&self) -> Option<usize> {
        self.num_points()?.checked_mul(self.dim)
    }

    pub fn num_points(&self) -> Option<usize> {
        self.height.checked_mul(self.width)
    }

    /// Body length in bytes, `None` on overflow
    pub fn body_len(&self) -> Option<usize> {
        self.num_values()?.checked_mul(8)
    }
}

/// Decoded point set
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    /// `(height * width, dim)` coordinates, last axis reversed
    pub points: Array2<f64>,

    /// Name of the directory holding the file
    pub name: String,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    pub fn dim(&self) -> usize {
        self.points.ncols()
    }
}

/// Read a `.vcps` point set
pub fn read_point_cloud(path: impl AsRef<Path>) -> Result<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| VolpkgError::unreadable(path, e))?;
    let mut reader = BufReader::new(file);

    let header_text = read_header(&mut reader, path)?;
    let header = parse_header(&header_text).map_err(|reason| VolpkgError::malformed(path, reason))?;

    let body_len = header.body_len().ok_or_else(|| {
        VolpkgError::malformed(
            path,
            format!(
                "declared size {}x{}x{} overflows",
                header.height, header.width, header.dim
            ),
        )
    })?;

    // Never size the buffer from the header; a short file stops the read
    let mut body = Vec::new();
    reader
        .take(body_len as u64)
        .read_to_end(&mut body)
        .map_err(|e| VolpkgError::unreadable(path, e))?;

    let points = decode_points(&header, &body).map_err(|reason| VolpkgError::malformed(path, reason))?;
    let name = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    tracing::debug!(
        path = %path.display(),
        points = points.nrows(),
        dim = header.dim,
        "read point set"
    );

    Ok(PointCloud { points, name })
}

/// Read bytes one at a time until the terminator or end of file
fn read_header<R: Read>(reader: &mut R, path: &Path) -> Result<String> {
    let mut header = Vec::new();
    let mut byte = [0u8; 1];

    while !header.ends_with(HEADER_TERMINATOR) {
        let read = reader
            .read(&mut byte)
            .map_err(|e| VolpkgError::unreadable(path, e))?;
        if read == 0 {
            break;
        }
        header.push(byte[0]);
    }

    String::from_utf8(header)
        .map_err(|_| VolpkgError::malformed(path, "header is not valid UTF-8"))
}

fn field_regex() -> std::result::Result<&'static Regex, String> {
    static FIELD: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    FIELD
        .get_or_init(|| Regex::new(r"(height|width|dim): (\d+)"))
        .as_ref()
        .map_err(|e| e.to_string())
}

/// Extract the grid dimensions from header text. The first occurrence of
/// each field wins.
pub fn parse_header(text: &str) -> std::result::Result<PointCloudHeader, String> {
    let mut fields: [Option<usize>; 3] = [None; 3];

    for captures in field_regex()?.captures_iter(text) {
        let slot = match &captures[1] {
            "height" => 0,
            "width" => 1,
            _ => 2,
        };
        if fields[slot].is_some() {
            continue;
        }
        let value = captures[2]
            .parse()
            .map_err(|e| format!("invalid '{}' value: {}", &captures[1], e))?;
        fields[slot] = Some(value);
    }

    let [height, width, dim] = fields;
    Ok(PointCloudHeader {
        height: height.ok_or("missing 'height' field")?,
        width: width.ok_or("missing 'width' field")?,
        dim: dim.ok_or("missing 'dim' field")?,
    })
}

/// Reshape the body to `(height, width, dim)`, reverse the last axis and
/// flatten to `(height * width, dim)`
fn decode_points(header: &PointCloudHeader, body: &[u8]) -> std::result::Result<Array2<f64>, String> {
    let (count, byte_len) = header
        .num_values()
        .zip(header.body_len())
        .ok_or("declared size overflows")?;
    if body.len() < byte_len {
        return Err(format!(
            "body holds {} bytes, header declares {} values ({} bytes)",
            body.len(),
            count,
            byte_len
        ));
    }

    let values = le_bytes_to_f64(&body[..byte_len]);
    let mut grid = Array3::from_shape_vec((header.height, header.width, header.dim), values)
        .map_err(|e| e.to_string())?;
    grid.invert_axis(Axis(2));

    let flat: Vec<f64> = grid.iter().copied().collect();
    Array2::from_shape_vec((header.height * header.width, header.dim), flat)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_vcps(path: &Path, header: &str, values: &[f64]) {
        let mut bytes = header.as_bytes().to_vec();
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_parse_header_any_order() {
        let header = parse_header("dim: 3\nordered: true\nwidth: 7\nheight: 2\n").unwrap();
        assert_eq!(header, PointCloudHeader { height: 2, width: 7, dim: 3 });
        assert_eq!(header.num_values(), Some(42));
    }

    #[test]
    fn test_parse_header_missing_field() {
        let err = parse_header("height: 2\nwidth: 3\n<>\n").unwrap_err();
        assert!(err.contains("dim"));
    }

    #[test]
    fn test_read_point_cloud_flips_last_axis() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("segment-1").join("pointset.vcps");
        let values: Vec<f64> = (0..18).map(|i| i as f64).collect();
        write_vcps(&path, "height: 2\nwidth: 3\ndim: 3\n<>\n", &values);

        let cloud = read_point_cloud(&path).unwrap();
        assert_eq!(cloud.points.shape(), &[6, 3]);
        assert_eq!(cloud.name, "segment-1");
        for (i, row) in cloud.points.outer_iter().enumerate() {
            let base = (i * 3) as f64;
            assert_eq!(row.to_vec(), vec![base + 2.0, base + 1.0, base]);
        }
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("p").join("pointset.vcps");
        write_vcps(&path, "height: 1\nwidth: 1\ndim: 2\n<>\n", &[1.0, 2.0, 99.0]);

        let cloud = read_point_cloud(&path).unwrap();
        assert_eq!(cloud.points.row(0).to_vec(), vec![2.0, 1.0]);
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("p").join("pointset.vcps");
        write_vcps(&path, "height: 1\ndim: 3\n<>\n", &[0.0; 3]);

        let err = read_point_cloud(&path).unwrap_err();
        assert!(matches!(err, VolpkgError::MalformedHeader { .. }));
    }

    #[test]
    fn test_truncated_body_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("p").join("pointset.vcps");
        write_vcps(&path, "height: 2\nwidth: 2\ndim: 3\n<>\n", &[0.0; 5]);

        let err = read_point_cloud(&path).unwrap_err();
        assert!(matches!(err, VolpkgError::MalformedHeader { .. }));
    }

    #[test]
    fn test_overflowing_header_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("p").join("pointset.vcps");
        write_vcps(&path, "height: 4294967296\nwidth: 4294967296\ndim: 3\n<>\n", &[0.0; 3]);

        let err = read_point_cloud(&path).unwrap_err();
        assert!(matches!(err, VolpkgError::MalformedHeader { .. }));
    }

    #[test]
    fn test_huge_header_with_short_body_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("p").join("pointset.vcps");
        write_vcps(&path, "height: 1000000000\nwidth: 1000\ndim: 3\n<>\n", &[0.0; 6]);

        let err = read_point_cloud(&path).unwrap_err();
        assert!(matches!(err, VolpkgError::MalformedHeader { .. }));
    }

    #[test]
    fn test_first_field_occurrence_wins() {
        let header = parse_header("height: 2\nwidth: 3\ndim: 3\nheight: 9\n").unwrap();
        assert_eq!(header.height, 2);
        assert_eq!(header.num_points(), Some(6));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = read_point_cloud("/no/such/pointset.vcps").unwrap_err();
        assert!(matches!(err, VolpkgError::UnreadableFile { .. }));
    }
}

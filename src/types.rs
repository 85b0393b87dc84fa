//! Core data types for slice volumes

use ndarray::{ArrayD, ArrayViewD, Axis};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar element types of decoded slices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8 = 1,
    /// Unsigned 16-bit integer
    U16 = 2,
    /// Unsigned 32-bit integer
    U32 = 3,
    /// Unsigned 64-bit integer
    U64 = 4,
    /// Signed 8-bit integer
    I8 = 5,
    /// Signed 16-bit integer
    I16 = 6,
    /// Signed 32-bit integer
    I32 = 7,
    /// Signed 64-bit integer
    I64 = 8,
    /// 32-bit floating point
    F32 = 9,
    /// 64-bit floating point
    F64 = 10,
}

impl DataType {
    /// Size in bytes of this data type
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 => 8,
        }
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        !self.is_float()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::U8 => "uint8",
            DataType::U16 => "uint16",
            DataType::U32 => "uint32",
            DataType::U64 => "uint64",
            DataType::I8 => "int8",
            DataType::I16 => "int16",
            DataType::I32 => "int32",
            DataType::I64 => "int64",
            DataType::F32 => "float32",
            DataType::F64 => "float64",
        };
        f.write_str(name)
    }
}

/// Shape and element type of a single file's array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageProperties {
    pub shape: Vec<usize>,
    pub data_type: DataType,
}

impl ImageProperties {
    pub fn new(shape: Vec<usize>, data_type: DataType) -> Self {
        Self { shape, data_type }
    }

    /// Number of elements in one file's array
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }
}

/// A decoded, typed N-dimensional array
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkData {
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    U32(ArrayD<u32>),
    U64(ArrayD<u64>),
    I8(ArrayD<i8>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

/// Apply the same expression to whichever array a `ChunkData` holds.
macro_rules! with_chunk {
    ($chunk:expr, $arr:ident => $body:expr) => {
        match $chunk {
            ChunkData::U8($arr) => $body,
            ChunkData::U16($arr) => $body,
            ChunkData::U32($arr) => $body,
            ChunkData::U64($arr) => $body,
            ChunkData::I8($arr) => $body,
            ChunkData::I16($arr) => $body,
            ChunkData::I32($arr) => $body,
            ChunkData::I64($arr) => $body,
            ChunkData::F32($arr) => $body,
            ChunkData::F64($arr) => $body,
        }
    };
}

/// Like `with_chunk!`, but rewraps the result in the same variant.
macro_rules! map_chunk {
    ($chunk:expr, $arr:ident => $body:expr) => {
        match $chunk {
            ChunkData::U8($arr) => ChunkData::U8($body),
            ChunkData::U16($arr) => ChunkData::U16($body),
            ChunkData::U32($arr) => ChunkData::U32($body),
            ChunkData::U64($arr) => ChunkData::U64($body),
            ChunkData::I8($arr) => ChunkData::I8($body),
            ChunkData::I16($arr) => ChunkData::I16($body),
            ChunkData::I32($arr) => ChunkData::I32($body),
            ChunkData::I64($arr) => ChunkData::I64($body),
            ChunkData::F32($arr) => ChunkData::F32($body),
            ChunkData::F64($arr) => ChunkData::F64($body),
        }
    };
}

impl ChunkData {
    /// Element type of the held array
    pub fn data_type(&self) -> DataType {
        match self {
            ChunkData::U8(_) => DataType::U8,
            ChunkData::U16(_) => DataType::U16,
            ChunkData::U32(_) => DataType::U32,
            ChunkData::U64(_) => DataType::U64,
            ChunkData::I8(_) => DataType::I8,
            ChunkData::I16(_) => DataType::I16,
            ChunkData::I32(_) => DataType::I32,
            ChunkData::I64(_) => DataType::I64,
            ChunkData::F32(_) => DataType::F32,
            ChunkData::F64(_) => DataType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_chunk!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        with_chunk!(self, a => a.ndim())
    }

    pub fn len(&self) -> usize {
        with_chunk!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape and type of this array
    pub fn properties(&self) -> ImageProperties {
        ImageProperties::new(self.shape().to_vec(), self.data_type())
    }

    /// Size of the decoded samples in bytes
    pub fn size_in_bytes(&self) -> usize {
        self.len() * self.data_type().size_in_bytes()
    }

    /// Prepend `count` singleton axes
    pub fn with_leading_axes(self, count: usize) -> Self {
        map_chunk!(self, a => {
            let mut a = a;
            for _ in 0..count {
                a = a.insert_axis(Axis(0));
            }
            a
        })
    }

    /// Borrow the held array as `T`, if the element type matches
    pub fn view<T: Element>(&self) -> Option<ArrayViewD<'_, T>> {
        T::view(self)
    }
}

/// Scalar types that can be stored in a [`ChunkData`]
pub trait Element: Clone + Zero + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    /// Wrap an owned array
    fn into_chunk(array: ArrayD<Self>) -> ChunkData;

    /// Borrow from a chunk of the matching variant
    fn view(chunk: &ChunkData) -> Option<ArrayViewD<'_, Self>>;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DATA_TYPE: DataType = DataType::$variant;

                fn into_chunk(array: ArrayD<Self>) -> ChunkData {
                    ChunkData::$variant(array)
                }

                fn view(chunk: &ChunkData) -> Option<ArrayViewD<'_, Self>> {
                    match chunk {
                        ChunkData::$variant(a) => Some(a.view()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_element!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_data_type_sizes() {
        assert_eq!(DataType::U8.size_in_bytes(), 1);
        assert_eq!(DataType::U16.size_in_bytes(), 2);
        assert_eq!(DataType::F32.size_in_bytes(), 4);
        assert_eq!(DataType::F64.size_in_bytes(), 8);
        assert!(DataType::F32.is_float());
        assert!(DataType::U16.is_integer());
    }

    #[test]
    fn test_data_type_display_and_serde() {
        assert_eq!(DataType::U16.to_string(), "uint16");
        let json = serde_json::to_string(&DataType::F32).unwrap();
        assert_eq!(json, "\"f32\"");
        let back: DataType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DataType::F32);
    }

    #[test]
    fn test_leading_axes() {
        let chunk = ChunkData::U16(ArrayD::zeros(IxDyn(&[4, 5])));
        let chunk = chunk.with_leading_axes(2);
        assert_eq!(chunk.shape(), &[1, 1, 4, 5]);
        assert_eq!(chunk.data_type(), DataType::U16);
        assert_eq!(chunk.size_in_bytes(), 40);
    }

    #[test]
    fn test_typed_view() {
        let chunk = f32::into_chunk(ArrayD::zeros(IxDyn(&[2, 2])));
        assert!(chunk.view::<f32>().is_some());
        assert!(chunk.view::<u8>().is_none());
        assert_eq!(chunk.properties(), ImageProperties::new(vec![2, 2], DataType::F32));
    }
}

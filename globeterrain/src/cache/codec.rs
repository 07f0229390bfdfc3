//! Raw raster codec for elevation tiles.
//!
//! Tiles are headerless grids of int16 or float32 samples in a configured
//! byte order. Payloads that arrive gzip-wrapped are inflated first.

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use bytes::{Buf, BufMut};
use flate2::read::GzDecoder;

use super::types::CacheError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

/// Storage type of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    Int16,
    Float32,
}

impl SampleType {
    pub fn size(&self) -> usize {
        match self {
            SampleType::Int16 => 2,
            SampleType::Float32 => 4,
        }
    }
}

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl FromStr for ByteOrder {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "littleendian" | "little_endian" | "little" | "le" => Ok(ByteOrder::LittleEndian),
            "bigendian" | "big_endian" | "big" | "be" => Ok(ByteOrder::BigEndian),
            other => Err(CacheError::UnsupportedFormat(format!("byte order '{}'", other))),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::LittleEndian => write!(f, "LittleEndian"),
            ByteOrder::BigEndian => write!(f, "BigEndian"),
        }
    }
}

/// Sample layout of a raster tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterFormat {
    pub sample_type: SampleType,
    pub byte_order: ByteOrder,
}

impl RasterFormat {
    pub fn new(sample_type: SampleType, byte_order: ByteOrder) -> Self {
        Self {
            sample_type,
            byte_order,
        }
    }

    /// Parse a MIME-style data format such as `application/bil16`.
    pub fn from_mime(mime: &str, byte_order: ByteOrder) -> Result<Self, CacheError> {
        let sample_type = match mime.trim().to_ascii_lowercase().as_str() {
            "application/bil16" | "image/bil" | "application/bil" | "int16" => SampleType::Int16,
            "application/bil32" | "float32" => SampleType::Float32,
            other => return Err(CacheError::UnsupportedFormat(other.to_string())),
        };
        Ok(Self::new(sample_type, byte_order))
    }

    /// The MIME type to request from a service.
    pub fn mime_type(&self) -> &'static str {
        match self.sample_type {
            SampleType::Int16 => "application/bil16",
            SampleType::Float32 => "application/bil32",
        }
    }

    /// Expected payload size of a `width x height` tile.
    pub fn payload_len(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.sample_type.size()
    }

    /// Decode a payload into row-major samples.
    pub fn decode(&self, payload: &[u8], width: u32, height: u32) -> Result<Vec<f32>, CacheError> {
        if payload.starts_with(&ZIP_MAGIC) {
            return Err(CacheError::Decode(
                "zip-packaged tiles are not supported".to_string(),
            ));
        }

        let expected = self.payload_len(width, height);
        let inflated;
        let raw: &[u8] = if payload.starts_with(&GZIP_MAGIC) {
            inflated = inflate(payload, expected)?;
            &inflated
        } else {
            payload
        };

        if raw.len() != expected {
            return Err(CacheError::SizeMismatch {
                expected,
                actual: raw.len(),
            });
        }

        let count = width as usize * height as usize;
        let mut buf = raw;
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            let value = match (self.sample_type, self.byte_order) {
                (SampleType::Int16, ByteOrder::LittleEndian) => buf.get_i16_le() as f32,
                (SampleType::Int16, ByteOrder::BigEndian) => buf.get_i16() as f32,
                (SampleType::Float32, ByteOrder::LittleEndian) => buf.get_f32_le(),
                (SampleType::Float32, ByteOrder::BigEndian) => buf.get_f32(),
            };
            samples.push(value);
        }
        Ok(samples)
    }

    /// Encode samples in this format. Int16 values are rounded and saturated.
    pub fn encode(&self, samples: &[f32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(samples.len() * self.sample_type.size());
        for &sample in samples {
            match (self.sample_type, self.byte_order) {
                (SampleType::Int16, ByteOrder::LittleEndian) => out.put_i16_le(to_i16(sample)),
                (SampleType::Int16, ByteOrder::BigEndian) => out.put_i16(to_i16(sample)),
                (SampleType::Float32, ByteOrder::LittleEndian) => out.put_f32_le(sample),
                (SampleType::Float32, ByteOrder::BigEndian) => out.put_f32(sample),
            }
        }
        out
    }
}

impl Default for RasterFormat {
    fn default() -> Self {
        Self::new(SampleType::Int16, ByteOrder::LittleEndian)
    }
}

/// Inflate at most `limit` bytes; longer payloads are rejected unread.
fn inflate(payload: &[u8], limit: usize) -> Result<Vec<u8>, CacheError> {
    let mut out = Vec::with_capacity(limit);
    GzDecoder::new(payload)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| CacheError::Decode(format!("gzip: {}", e)))?;
    if out.len() > limit {
        return Err(CacheError::Decode(format!(
            "gzip payload inflates beyond {} bytes",
            limit
        )));
    }
    Ok(out)
}

fn to_i16(sample: f32) -> i16 {
    sample.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_decode_int16_little_endian() {
        let format = RasterFormat::default();
        let payload = [0x01, 0x00, 0xff, 0xff, 0x00, 0x80, 0xe8, 0x03];
        let samples = format.decode(&payload, 2, 2).unwrap();
        assert_eq!(samples, vec![1.0, -1.0, -32768.0, 1000.0]);
    }

    #[test]
    fn test_decode_int16_big_endian() {
        let format = RasterFormat::new(SampleType::Int16, ByteOrder::BigEndian);
        let payload = [0x03, 0xe8, 0xff, 0x38];
        assert_eq!(format.decode(&payload, 2, 1).unwrap(), vec![1000.0, -200.0]);
    }

    #[test]
    fn test_float32_encode_decode() {
        let format = RasterFormat::new(SampleType::Float32, ByteOrder::BigEndian);
        let samples = vec![1.5, -430.25, 8848.0, 0.0];
        let bytes = format.encode(&samples);
        assert_eq!(bytes.len(), 16);
        assert_eq!(format.decode(&bytes, 2, 2).unwrap(), samples);
    }

    #[test]
    fn test_int16_encode_saturates() {
        let format = RasterFormat::default();
        let bytes = format.encode(&[40000.0, -40000.0, 12.6]);
        let back = format.decode(&bytes, 3, 1).unwrap();
        assert_eq!(back, vec![32767.0, -32768.0, 13.0]);
    }

    #[test]
    fn test_gzip_payload_is_inflated() {
        let format = RasterFormat::default();
        let raw = format.encode(&[5.0, 6.0, 7.0, 8.0]);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let gz = encoder.finish().unwrap();

        assert_eq!(format.decode(&gz, 2, 2).unwrap(), vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_oversized_gzip_rejected_without_full_inflation() {
        let format = RasterFormat::default();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&vec![0u8; 16 * 1024 * 1024]).unwrap();
        let gz = encoder.finish().unwrap();

        match format.decode(&gz, 2, 2) {
            Err(CacheError::Decode(message)) => assert!(message.contains("beyond 8 bytes")),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_short_gzip_is_size_mismatch() {
        let format = RasterFormat::default();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[1, 0, 2, 0]).unwrap();
        let gz = encoder.finish().unwrap();

        assert!(matches!(
            format.decode(&gz, 2, 2),
            Err(CacheError::SizeMismatch {
                expected: 8,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_size_mismatch() {
        let format = RasterFormat::default();
        let err = format.decode(&[0u8; 6], 2, 2).unwrap_err();
        assert!(matches!(
            err,
            CacheError::SizeMismatch {
                expected: 8,
                actual: 6
            }
        ));
    }

    #[test]
    fn test_zip_rejected() {
        let format = RasterFormat::default();
        let payload = [b'P', b'K', 0x03, 0x04, 0, 0, 0, 0];
        assert!(matches!(
            format.decode(&payload, 2, 2),
            Err(CacheError::Decode(_))
        ));
    }

    #[test]
    fn test_from_mime() {
        let f = RasterFormat::from_mime("application/bil32", ByteOrder::BigEndian).unwrap();
        assert_eq!(f.sample_type, SampleType::Float32);
        assert_eq!(f.mime_type(), "application/bil32");
        assert_eq!(
            RasterFormat::from_mime("image/bil", ByteOrder::LittleEndian)
                .unwrap()
                .sample_type,
            SampleType::Int16
        );
        assert!(RasterFormat::from_mime("image/png", ByteOrder::LittleEndian).is_err());
    }

    #[test]
    fn test_byte_order_parse() {
        assert_eq!("BigEndian".parse::<ByteOrder>().unwrap(), ByteOrder::BigEndian);
        assert_eq!("little".parse::<ByteOrder>().unwrap(), ByteOrder::LittleEndian);
        assert!("middle".parse::<ByteOrder>().is_err());
    }
}

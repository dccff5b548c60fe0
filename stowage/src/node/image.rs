//! Image metadata extraction (dimensions, EXIF, IPTC)

use crate::error::{StowageError, StowageResult};
use image::ImageReader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;

const APP13: u8 = 0xED;
const START_OF_SCAN: u8 = 0xDA;
const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const IPTC_RESOURCE_ID: u16 = 0x0404;

/// Metadata read from encoded image bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// EXIF fields, tag name to display value
    pub exif: BTreeMap<String, String>,
    /// IPTC datasets, `record#dataset` to value
    pub iptc: BTreeMap<String, String>,
}

impl ImageMetadata {
    /// Reads metadata from encoded image bytes
    ///
    /// Only the header is decoded for dimensions. Missing EXIF or IPTC
    /// blocks yield empty maps.
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Image`] if the format is not recognized.
    pub fn read(bytes: &[u8]) -> StowageResult<Self> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| StowageError::Image(format!("Failed to read dimensions: {e}")))?;

        Ok(Self {
            width,
            height,
            exif: read_exif(bytes)?,
            iptc: read_iptc(bytes),
        })
    }

    /// Width divided by height
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Image`] for zero-height images.
    pub fn aspect_ratio(&self) -> StowageResult<f64> {
        if self.height == 0 {
            return Err(StowageError::Image("zero height image".to_string()));
        }
        Ok(f64::from(self.width) / f64::from(self.height))
    }
}

fn read_exif(bytes: &[u8]) -> StowageResult<BTreeMap<String, String>> {
    let reader = exif::Reader::new();
    match reader.read_from_container(&mut Cursor::new(bytes)) {
        Ok(data) => Ok(data
            .fields()
            .map(|field| {
                (
                    field.tag.to_string(),
                    field.display_value().with_unit(&data).to_string(),
                )
            })
            .collect()),
        Err(exif::Error::Io(e)) => Err(e.into()),
        Err(e) => {
            tracing::trace!(error = %e, "No readable EXIF block");
            Ok(BTreeMap::new())
        }
    }
}

/// Extracts IPTC-IIM datasets from a JPEG APP13 (Photoshop) segment
fn read_iptc(bytes: &[u8]) -> BTreeMap<String, String> {
    let mut datasets = BTreeMap::new();
    if let Some(block) = find_iptc_block(bytes) {
        parse_iptc_block(block, &mut datasets);
    }
    datasets
}

fn find_iptc_block(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.get(..2)? != [0xFF, 0xD8] {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        if marker == START_OF_SCAN {
            return None;
        }
        let len = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
        let segment = bytes.get(pos + 4..pos + 2 + len)?;
        if marker == APP13 {
            if let Some(resources) = segment.strip_prefix(PHOTOSHOP_HEADER) {
                if let Some(block) = find_photoshop_resource(resources, IPTC_RESOURCE_ID) {
                    return Some(block);
                }
            }
        }
        pos += 2 + len;
    }
    None
}

fn find_photoshop_resource(mut data: &[u8], wanted: u16) -> Option<&[u8]> {
    while data.len() >= 12 && data.starts_with(b"8BIM") {
        let id = u16::from_be_bytes([data[4], data[5]]);
        // Pascal name, padded so that length byte + name is even.
        let name_len = usize::from(data[6]);
        let name_total = (name_len + 1 + 1) & !1;
        let size_at = 6 + name_total;
        let size_bytes = data.get(size_at..size_at + 4)?;
        let size = u32::from_be_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]]);
        let size = usize::try_from(size).ok()?;
        let start = size_at + 4;
        let block = data.get(start..start + size)?;
        if id == wanted {
            return Some(block);
        }
        data = data.get(start + ((size + 1) & !1)..)?;
    }
    None
}

fn parse_iptc_block(mut block: &[u8], datasets: &mut BTreeMap<String, String>) {
    while block.len() >= 5 && block[0] == 0x1C {
        let record = block[1];
        let dataset = block[2];
        let size = usize::from(u16::from_be_bytes([block[3], block[4]]));
        // Extended datasets (high bit set) are not supported.
        if size & 0x8000 != 0 {
            return;
        }
        let Some(value) = block.get(5..5 + size) else {
            return;
        };
        let key = format!("{record}#{dataset:03}");
        let value = String::from_utf8_lossy(value).into_owned();
        datasets
            .entry(key)
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
        block = &block[5 + size..];
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Smallest valid 1x1 transparent PNG
    pub const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    /// Builds a JPEG prefix holding only an APP13 IPTC segment
    pub fn jpeg_with_iptc(datasets: &[(u8, u8, &str)]) -> Vec<u8> {
        let mut iptc = Vec::new();
        for (record, dataset, value) in datasets {
            iptc.extend_from_slice(&[0x1C, *record, *dataset]);
            iptc.extend_from_slice(&u16::try_from(value.len()).unwrap().to_be_bytes());
            iptc.extend_from_slice(value.as_bytes());
        }

        let mut resource = b"8BIM".to_vec();
        resource.extend_from_slice(&0x0404u16.to_be_bytes());
        resource.extend_from_slice(&[0, 0]);
        resource.extend_from_slice(&u32::try_from(iptc.len()).unwrap().to_be_bytes());
        resource.extend_from_slice(&iptc);
        if iptc.len() % 2 == 1 {
            resource.push(0);
        }

        let mut segment = b"Photoshop 3.0\0".to_vec();
        segment.extend_from_slice(&resource);

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xED];
        jpeg.extend_from_slice(&u16::try_from(segment.len() + 2).unwrap().to_be_bytes());
        jpeg.extend_from_slice(&segment);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }
}

/**
 * EXIF writer module
 *
 * Builds a TIFF-structured Exif block with kamadak-exif's writer and attaches
 * it to image containers:
 * - JPEG: the APP1 "Exif" segment is replaced without touching the scan data
 * - PNG: the image is re-encoded losslessly with an eXIf chunk
 */

use anyhow::{bail, Context, Result};
use exif::experimental::Writer;
use exif::{Exif, Field, In, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use log::debug;
use std::io::Cursor;

use crate::timestamp::CaptureTimestamp;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const JPEG_QUALITY: u8 = 90;

const MARKER_SOI: u8 = 0xD8;
const MARKER_SOS: u8 = 0xDA;
const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;

/// Image containers the writer knows how to attach Exif data to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Jpeg,
    Png,
}

impl ContainerFormat {
    /// Sniff the container from its magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 3 && bytes[0] == 0xFF && bytes[1] == MARKER_SOI && bytes[2] == 0xFF {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else {
            None
        }
    }

    /// Map a lower-cased file extension to a container.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

/// Build a raw Exif (TIFF) block carrying `timestamp` as DateTimeOriginal.
///
/// Writable fields of the primary IFD and its sub-IFDs are carried over from
/// `existing`. Thumbnail fields are dropped.
pub fn build_exif_blob(existing: Option<&Exif>, timestamp: CaptureTimestamp) -> Result<Vec<u8>> {
    let stamp = Field {
        tag: Tag::DateTimeOriginal,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![timestamp.to_string().into_bytes()]),
    };

    let mut writer = Writer::new();
    let mut little_endian = true;

    if let Some(exif) = existing {
        little_endian = exif.little_endian();
        for field in exif.fields() {
            if field.ifd_num != In::PRIMARY || field.tag == Tag::DateTimeOriginal {
                continue;
            }
            if matches!(field.value, Value::Unknown(..)) {
                debug!("Dropping unwritable field {}", field.tag);
                continue;
            }
            writer.push_field(field);
        }
    }
    writer.push_field(&stamp);

    let mut buf = Cursor::new(Vec::new());
    writer
        .write(&mut buf, little_endian)
        .context("Failed to serialize Exif block")?;
    Ok(buf.into_inner())
}

/// Replace (or insert) the Exif APP1 segment of a JPEG stream.
///
/// The new segment goes right after SOI/APP0. Other APP1 payloads such as XMP
/// are kept. Everything from SOS onward is copied verbatim.
pub fn splice_jpeg(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>> {
    if ContainerFormat::detect(jpeg) != Some(ContainerFormat::Jpeg) {
        bail!("not a JPEG stream");
    }
    let segment_len = EXIF_HEADER.len() + tiff.len() + 2;
    if segment_len > u16::MAX as usize {
        bail!("Exif block of {} bytes does not fit in a JPEG APP1 segment", tiff.len());
    }

    let mut segment = Vec::with_capacity(segment_len + 2);
    segment.extend_from_slice(&[0xFF, MARKER_APP1]);
    segment.extend_from_slice(&(segment_len as u16).to_be_bytes());
    segment.extend_from_slice(EXIF_HEADER);
    segment.extend_from_slice(tiff);

    let mut out = Vec::with_capacity(jpeg.len() + segment.len());
    out.extend_from_slice(&jpeg[..2]);
    let mut pos = 2;
    let mut inserted = false;

    loop {
        if pos + 2 > jpeg.len() || jpeg[pos] != 0xFF {
            bail!("corrupt JPEG structure at offset {}", pos);
        }
        let marker = jpeg[pos + 1];
        if marker == 0xFF {
            // fill byte
            pos += 1;
            continue;
        }
        if marker == MARKER_SOS {
            if !inserted {
                out.extend_from_slice(&segment);
            }
            out.extend_from_slice(&jpeg[pos..]);
            return Ok(out);
        }
        if pos + 4 > jpeg.len() {
            bail!("truncated JPEG segment at offset {}", pos);
        }
        let len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        let end = pos + 2 + len;
        if len < 2 || end > jpeg.len() {
            bail!("invalid JPEG segment length {} at offset {}", len, pos);
        }

        let is_exif = marker == MARKER_APP1 && jpeg[pos + 4..end].starts_with(EXIF_HEADER);
        if !is_exif {
            if marker != MARKER_APP0 && !inserted {
                out.extend_from_slice(&segment);
                inserted = true;
            }
            out.extend_from_slice(&jpeg[pos..end]);
        }
        pos = end;
    }
}

/// Re-encode a PNG stream with `tiff` attached as its eXIf chunk.
pub fn reencode_png(png: &[u8], tiff: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(png, ImageFormat::Png)
        .context("Failed to decode PNG")?;
    let encoded = encode_with_metadata(&img, ContainerFormat::Png, Some(tiff))?;
    if let Some(reason) = encoded.metadata_dropped {
        bail!("PNG encoder rejected Exif block: {}", reason);
    }
    Ok(encoded.bytes)
}

/// Encoder output plus the reason metadata could not be attached, if any.
#[derive(Debug)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub metadata_dropped: Option<String>,
}

/// Encode `img` in `format`, attaching `exif` when given.
///
/// A failure to attach the metadata is not an error: the image is encoded
/// without it and the reason is returned alongside the bytes.
pub fn encode_with_metadata(
    img: &DynamicImage,
    format: ContainerFormat,
    exif: Option<&[u8]>,
) -> Result<Encoded> {
    let mut bytes = Vec::new();
    let mut metadata_dropped = None;

    match format {
        ContainerFormat::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
                .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                .context("Failed to encode JPEG")?;
            if let Some(tiff) = exif {
                match splice_jpeg(&bytes, tiff) {
                    Ok(with_exif) => bytes = with_exif,
                    Err(e) => metadata_dropped = Some(format!("{:#}", e)),
                }
            }
        }
        ContainerFormat::Png => {
            let mut encoder = PngEncoder::new(&mut bytes);
            if let Some(tiff) = exif {
                if let Err(e) = encoder.set_exif_metadata(tiff.to_vec()) {
                    metadata_dropped = Some(e.to_string());
                }
            }
            encoder
                .write_image(img.as_bytes(), img.width(), img.height(), img.color().into())
                .context("Failed to encode PNG")?;
        }
    }

    Ok(Encoded { bytes, metadata_dropped })
}

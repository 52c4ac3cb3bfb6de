#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

use photo_sorter::{CaptureTimestamp, ExifCodec, MetadataCodec};

/// Save a small JPEG or PNG (by extension) with no metadata.
pub fn plain_image(path: &Path, width: u32, height: u32) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 128]))
        .save(path)
        .unwrap();
    path.to_path_buf()
}

/// Save an image carrying `timestamp` as its DateTimeOriginal.
pub fn dated_image(path: &Path, timestamp: &str) -> PathBuf {
    sized_dated_image(path, 6, 4, timestamp)
}

pub fn sized_dated_image(path: &Path, width: u32, height: u32, timestamp: &str) -> PathBuf {
    plain_image(path, width, height);
    ExifCodec::new()
        .write(path, CaptureTimestamp::parse(timestamp).unwrap(), true)
        .unwrap();
    path.to_path_buf()
}

/// A decodable JPEG carrying an Exif APP1 segment whose IFD offset is out of range.
pub fn damaged_exif_image(path: &Path, width: u32, height: u32) -> PathBuf {
    plain_image(path, width, height);
    let jpeg = fs::read(path).unwrap();
    let payload: &[u8] = b"Exif\0\0II*\0\xff\xff\xff\x7f";
    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&jpeg[2..]);
    fs::write(path, out).unwrap();
    path.to_path_buf()
}

/// A file with an image extension that no decoder accepts.
pub fn corrupt_image(path: &Path) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"this is not an image, just text pretending to be one").unwrap();
    path.to_path_buf()
}

/// Every regular file below `root`, relative and with `/` separators, sorted.
pub fn tree(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

// src/repository/parsers/mod.rs

//! Repository metadata parsers for rpm-md repositories
//!
//! This module provides streaming parsers for the three repodata documents:
//! - `repomd.xml`: revision stamp plus locations/checksums of the data files
//! - `primary.xml`: package identity, sizes, provides and requires
//! - `filelists.xml`: file paths of every package
//!
//! Primary and filelists documents are read one `<package>` element at a
//! time, straight from the decompressor.

pub mod filelists;
pub mod primary;
pub mod repomd;

pub use filelists::{FileListMerger, FileListReader, PackageFiles, attach_files};
pub use primary::{PrimaryReader, parse_primary};
pub use repomd::{DataFile, Repomd, parse_repomd};

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use quick_xml::events::BytesStart;
use std::fmt::Display;
use std::io::{BufRead, BufReader};
use tracing::debug;
use xz2::read::XzDecoder;

/// Open a repodata document, decompressing according to its location suffix
///
/// `.gz`, `.zst` and `.xz` are decompressed on the fly; anything else is
/// read as plain XML.
pub fn open_document<'a>(data: &'a [u8], location: &str) -> Result<Box<dyn BufRead + 'a>> {
    let location = location.to_ascii_lowercase();

    let reader: Box<dyn BufRead + 'a> = if location.ends_with(".gz") {
        debug!("Opening gzip-compressed document {}", location);
        Box::new(BufReader::new(GzDecoder::new(data)))
    } else if location.ends_with(".zst") {
        debug!("Opening zstd-compressed document {}", location);
        let decoder = zstd::stream::read::Decoder::new(data).map_err(|e| {
            Error::ParseError(format!("Failed to open zstd stream {}: {}", location, e))
        })?;
        Box::new(BufReader::new(decoder))
    } else if location.ends_with(".xz") {
        debug!("Opening xz-compressed document {}", location);
        Box::new(BufReader::new(XzDecoder::new(data)))
    } else {
        Box::new(data)
    };

    Ok(reader)
}

/// Look up an attribute by name, unescaping its value
pub(crate) fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| Error::ParseError(format!("Malformed attribute: {}", e)))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::ParseError(format!("Malformed attribute value: {}", e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Wrap a reader error with the document kind and byte offset
pub(crate) fn xml_error(document: &str, position: usize, err: impl Display) -> Error {
    Error::ParseError(format!(
        "Failed to parse {} at byte {}: {}",
        document, position, err
    ))
}

/// Parse a numeric attribute, treating absence as `None`
pub(crate) fn parse_number<T: std::str::FromStr>(value: Option<String>, what: &str) -> Result<Option<T>>
where
    T::Err: Display,
{
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| Error::ParseError(format!("Invalid {} '{}': {}", what, v, e)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::{Read, Write};

    #[test]
    fn test_open_plain_document() {
        let data = b"<repomd/>";
        let mut reader = open_document(data, "repodata/repomd.xml").unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "<repomd/>");
    }

    #[test]
    fn test_open_gzip_document() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"<metadata/>").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut reader = open_document(&compressed, "repodata/abc-primary.xml.GZ").unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "<metadata/>");
    }

    #[test]
    fn test_open_zstd_document() {
        let compressed = zstd::encode_all(&b"<filelists/>"[..], 3).unwrap();
        let mut reader = open_document(&compressed, "x-filelists.xml.zst").unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "<filelists/>");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number::<u64>(Some(" 42 ".to_string()), "size").unwrap(), Some(42));
        assert_eq!(parse_number::<u64>(None, "size").unwrap(), None);
        assert!(parse_number::<u64>(Some("x".to_string()), "size").is_err());
    }
}

// src/repository/parsers/repomd.rs

//! repomd.xml parser
//!
//! The manifest names the revision of a repository and where its data files
//! live. Only the `primary` and `filelists` entries are used.

use super::{attribute, parse_number, xml_error};
use crate::error::{Error, Result};
use crate::packages::{Checksum, ChecksumType};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::BufRead;

/// One `<data>` entry of repomd.xml
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    /// Path relative to the repository root, e.g. `repodata/<hash>-primary.xml.gz`
    pub location: String,
    /// Checksum of the file as stored (compressed)
    pub checksum: Option<Checksum>,
    pub size: Option<u64>,
    pub timestamp: Option<i64>,
}

/// Parsed repository revision manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repomd {
    pub revision: String,
    pub primary: DataFile,
    pub filelists: Option<DataFile>,
}

#[derive(Default)]
struct DataBuilder {
    kind: String,
    location: Option<String>,
    checksum_type: Option<String>,
    checksum: String,
    size: String,
    timestamp: String,
}

impl DataBuilder {
    fn build(self) -> Result<DataFile> {
        let location = self.location.ok_or_else(|| {
            Error::ParseError(format!("repomd.xml: <data type=\"{}\"> has no location", self.kind))
        })?;

        let checksum = match self.checksum_type {
            Some(kind) if !self.checksum.trim().is_empty() => {
                let kind = kind.parse::<ChecksumType>().map_err(Error::ParseError)?;
                Some(Checksum::new(kind, self.checksum))
            }
            _ => None,
        };

        let size = parse_number(Some(self.size).filter(|s| !s.is_empty()), "size")?;
        let timestamp = parse_number(Some(self.timestamp).filter(|s| !s.is_empty()), "timestamp")?;

        Ok(DataFile {
            location,
            checksum,
            size,
            timestamp,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Revision,
    Checksum,
    Size,
    Timestamp,
}

/// Parse a repomd.xml document
///
/// A manifest without `<revision>` falls back to the primary checksum (or
/// timestamp) as its revision marker; a manifest without a primary entry is
/// rejected.
pub fn parse_repomd(source: impl BufRead) -> Result<Repomd> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut root_seen = false;
    let mut revision: Option<String> = None;
    let mut current: Option<DataBuilder> = None;
    let mut field: Option<Field> = None;
    let mut primary = None;
    let mut filelists = None;

    loop {
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error("repomd.xml", reader.buffer_position(), e))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.local_name();

                if !root_seen {
                    if name.as_ref() != b"repomd" {
                        return Err(Error::ParseError(format!(
                            "repomd.xml: unexpected root element <{}>",
                            String::from_utf8_lossy(name.as_ref())
                        )));
                    }
                    root_seen = true;
                    continue;
                }

                match (name.as_ref(), current.as_mut()) {
                    (b"revision", None) if !is_empty => field = Some(Field::Revision),
                    (b"data", None) if !is_empty => {
                        current = Some(DataBuilder {
                            kind: attribute(e, b"type")?.unwrap_or_default(),
                            ..DataBuilder::default()
                        });
                    }
                    (b"location", Some(data)) => data.location = attribute(e, b"href")?,
                    (b"checksum", Some(data)) if !is_empty => {
                        data.checksum_type = attribute(e, b"type")?;
                        field = Some(Field::Checksum);
                    }
                    (b"size", Some(_)) if !is_empty => field = Some(Field::Size),
                    (b"timestamp", Some(_)) if !is_empty => field = Some(Field::Timestamp),
                    _ => {}
                }
            }
            Event::Text(ref e) => {
                let text = e
                    .unescape()
                    .map_err(|err| xml_error("repomd.xml", reader.buffer_position(), err))?;
                match (field, current.as_mut()) {
                    (Some(Field::Revision), _) => revision.get_or_insert_with(String::new).push_str(&text),
                    (Some(Field::Checksum), Some(data)) => data.checksum.push_str(&text),
                    (Some(Field::Size), Some(data)) => data.size.push_str(&text),
                    (Some(Field::Timestamp), Some(data)) => data.timestamp.push_str(&text),
                    _ => {}
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"data" => {
                    if let Some(data) = current.take() {
                        match data.kind.as_str() {
                            "primary" => primary = Some(data.build()?),
                            "filelists" => filelists = Some(data.build()?),
                            _ => {}
                        }
                    }
                }
                _ => field = None,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !root_seen {
        return Err(Error::ParseError("repomd.xml: missing <repomd> root".to_string()));
    }

    let primary: DataFile = primary.ok_or_else(|| {
        Error::ParseError("Could not find primary data location in repomd.xml".to_string())
    })?;

    let revision = revision
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .or_else(|| primary.checksum.as_ref().map(|c| c.value.clone()))
        .or_else(|| primary.timestamp.map(|t| t.to_string()))
        .ok_or_else(|| Error::ParseError("repomd.xml has no revision marker".to_string()))?;

    Ok(Repomd {
        revision,
        primary,
        filelists,
    })
}

// src/repository/parsers/filelists.rs

//! filelists.xml parser and the file-list merge step
//!
//! File lists are parsed separately from primary.xml and attached to the
//! already-built packages afterwards, keyed by package identity.

use super::{attribute, xml_error};
use crate::error::{Error, Result};
use crate::packages::{Package, PackageKey};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::BufRead;

/// File paths of one package, with the identity used to find its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFiles {
    /// Package checksum (`pkgid` attribute)
    pub pkgid: Option<String>,
    pub key: PackageKey,
    pub files: Vec<String>,
}

/// Incremental reader yielding one [`PackageFiles`] per `<package>` element
pub struct FileListReader<R: BufRead> {
    reader: Reader<R>,
    root_seen: bool,
    finished: bool,
}

impl<R: BufRead> FileListReader<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);

        Self {
            reader,
            root_seen: false,
            finished: false,
        }
    }

    pub fn next_package(&mut self) -> Result<Option<PackageFiles>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = Vec::new();
        let mut current: Option<PackageFiles> = None;
        let mut path: Option<String> = None;

        loop {
            buf.clear();
            let event = self
                .reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error("filelists.xml", self.reader.buffer_position(), e))?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let name = e.local_name();

                    if !self.root_seen {
                        if name.as_ref() != b"filelists" {
                            return Err(Error::ParseError(format!(
                                "filelists.xml: unexpected root element <{}>",
                                String::from_utf8_lossy(name.as_ref())
                            )));
                        }
                        self.root_seen = true;
                        if is_empty {
                            self.finished = true;
                            return Ok(None);
                        }
                        continue;
                    }

                    match (name.as_ref(), current.as_mut()) {
                        (b"package", None) => {
                            let files = PackageFiles {
                                pkgid: attribute(e, b"pkgid")?.map(|id| id.trim().to_ascii_lowercase()),
                                key: PackageKey {
                                    name: attribute(e, b"name")?.ok_or_else(|| {
                                        Error::ParseError("filelists.xml: package without name".to_string())
                                    })?,
                                    version: String::new(),
                                    release: String::new(),
                                    arch: attribute(e, b"arch")?.unwrap_or_default(),
                                },
                                files: Vec::new(),
                            };
                            if is_empty {
                                return Ok(Some(files));
                            }
                            current = Some(files);
                        }
                        (b"package", Some(_)) => {
                            return Err(Error::ParseError(
                                "filelists.xml: nested <package>".to_string(),
                            ));
                        }
                        (b"version", Some(files)) => {
                            files.key.version = attribute(e, b"ver")?.unwrap_or_default();
                            files.key.release = attribute(e, b"rel")?.unwrap_or_default();
                        }
                        (b"file", Some(_)) if !is_empty => path = Some(String::new()),
                        _ => {}
                    }
                }
                Event::Text(ref e) => {
                    if let Some(path) = path.as_mut() {
                        let text = e
                            .unescape()
                            .map_err(|err| xml_error("filelists.xml", self.reader.buffer_position(), err))?;
                        path.push_str(&text);
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"file" => {
                        if let (Some(path), Some(files)) = (path.take(), current.as_mut()) {
                            files.files.push(path);
                        }
                    }
                    b"package" => return Ok(current.take()),
                    b"filelists" => {
                        self.finished = true;
                        return Ok(None);
                    }
                    _ => {}
                },
                Event::Eof => {
                    self.finished = true;
                    if !self.root_seen {
                        return Err(Error::ParseError(
                            "filelists.xml: missing <filelists> root".to_string(),
                        ));
                    }
                    if current.is_some() {
                        return Err(Error::ParseError(
                            "filelists.xml: document truncated inside a package".to_string(),
                        ));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for FileListReader<R> {
    type Item = Result<PackageFiles>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_package() {
            Ok(files) => files.map(Ok),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Lookup tables from package identity to position in a package slice
pub struct FileListMerger {
    by_checksum: HashMap<String, usize>,
    by_key: HashMap<PackageKey, usize>,
}

impl FileListMerger {
    pub fn new(packages: &[Package]) -> Self {
        let mut by_checksum = HashMap::with_capacity(packages.len());
        let mut by_key = HashMap::with_capacity(packages.len());

        for (index, package) in packages.iter().enumerate() {
            if !package.checksum.value.is_empty() {
                by_checksum.entry(package.checksum.value.clone()).or_insert(index);
            }
            by_key.entry(package.key()).or_insert(index);
        }

        Self { by_checksum, by_key }
    }

    /// Attach one file list; checksum match first, then name/version/release/arch
    ///
    /// Returns false when no package matches or the match already has files.
    pub fn attach(&self, packages: &mut [Package], files: PackageFiles) -> bool {
        let index = files
            .pkgid
            .as_ref()
            .and_then(|id| self.by_checksum.get(id))
            .or_else(|| self.by_key.get(&files.key))
            .copied();

        match index.and_then(|i| packages.get_mut(i)) {
            Some(package) => package.attach_files(files.files),
            None => false,
        }
    }
}

/// Attach file lists to packages; returns how many packages received files
pub fn attach_files(packages: &mut [Package], lists: impl IntoIterator<Item = PackageFiles>) -> usize {
    let merger = FileListMerger::new(packages);
    let mut attached = 0;
    for files in lists {
        if merger.attach(packages, files) {
            attached += 1;
        }
    }
    attached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::{Checksum, ChecksumType};

    const FILELISTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<filelists xmlns="http://linux.duke.edu/metadata/filelists" packages="3">
<package pkgid="AAAA" name="timed" arch="armv7hl">
  <version epoch="0" ver="3.6" rel="1"/>
  <file>/usr/bin/timed</file>
  <file type="dir">/etc/timed</file>
</package>
<package pkgid="ffff" name="connman" arch="armv7hl">
  <version epoch="0" ver="1.32" rel="2"/>
  <file>/usr/sbin/connmand</file>
</package>
<package pkgid="9999" name="ghost" arch="noarch"><version ver="1" rel="1"/></package>
</filelists>"#;

    fn packages() -> Vec<Package> {
        let mut timed = Package::new("timed", "3.6", "1", "armv7hl");
        timed.checksum = Checksum::new(ChecksumType::Sha256, "aaaa");
        let mut connman = Package::new("connman", "1.32", "2", "armv7hl");
        connman.checksum = Checksum::new(ChecksumType::Sha256, "different");
        vec![timed, connman]
    }

    #[test]
    fn test_parse_filelists() {
        let lists = FileListReader::new(FILELISTS.as_bytes())
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(lists.len(), 3);
        assert_eq!(lists[0].pkgid.as_deref(), Some("aaaa"));
        assert_eq!(lists[0].key.version, "3.6");
        assert_eq!(lists[0].files, vec!["/usr/bin/timed", "/etc/timed"]);
        assert!(lists[2].files.is_empty());
    }

    #[test]
    fn test_attach_by_checksum_and_by_key() {
        let mut packages = packages();
        let lists = FileListReader::new(FILELISTS.as_bytes())
            .collect::<Result<Vec<_>>>()
            .unwrap();

        // ghost has no owner
        assert_eq!(attach_files(&mut packages, lists), 2);
        assert_eq!(packages[0].files().len(), 2);
        assert_eq!(packages[1].files(), ["/usr/sbin/connmand".to_string()]);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let mut forward = packages();
        let mut backward = packages();
        let lists = FileListReader::new(FILELISTS.as_bytes())
            .collect::<Result<Vec<_>>>()
            .unwrap();

        attach_files(&mut forward, lists.clone());
        attach_files(&mut backward, lists.into_iter().rev());
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_files_attach_once() {
        let mut packages = packages();
        let list = PackageFiles {
            pkgid: Some("aaaa".to_string()),
            key: packages[0].key(),
            files: vec!["/a".to_string()],
        };
        assert_eq!(attach_files(&mut packages, vec![list.clone()]), 1);
        assert_eq!(attach_files(&mut packages, vec![list]), 0);
    }

    #[test]
    fn test_wrong_root_is_error() {
        let result = FileListReader::new("<metadata/>".as_bytes()).next_package();
        assert!(matches!(result, Err(Error::ParseError(_))));
    }
}

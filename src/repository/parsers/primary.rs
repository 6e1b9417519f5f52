// src/repository/parsers/primary.rs

//! primary.xml parser
//!
//! Streams `<package>` elements out of a primary document. Only relation
//! entries of the `provides` and `requires` sections are kept; the file
//! subset that primary.xml carries is ignored in favour of filelists.xml.

use super::{attribute, parse_number, xml_error};
use crate::error::{Error, Result};
use crate::packages::{Capability, CapabilityOp, Checksum, ChecksumType, Package, format_evr};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::BufRead;
use tracing::debug;

/// Incremental reader yielding one [`Package`] per `<package>` element
pub struct PrimaryReader<R: BufRead> {
    reader: Reader<R>,
    repo: String,
    root_seen: bool,
    finished: bool,
    count: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Arch,
    Summary,
    Description,
    Checksum,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Provides,
    Requires,
    /// conflicts, obsoletes, recommends, license, ...
    Other,
}

impl<R: BufRead> PrimaryReader<R> {
    /// Read packages from `source`, tagging each with the owning repository
    pub fn new(source: R, repo: impl Into<String>) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);

        Self {
            reader,
            repo: repo.into(),
            root_seen: false,
            finished: false,
            count: 0,
        }
    }

    /// Number of packages produced so far
    pub fn parsed(&self) -> usize {
        self.count
    }

    /// Read the next package, or `None` at the end of the document
    pub fn next_package(&mut self) -> Result<Option<Package>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = Vec::new();
        let mut builder: Option<PackageBuilder> = None;
        let mut field: Option<Field> = None;
        let mut section = Section::None;
        let mut in_format = false;

        loop {
            buf.clear();
            let event = self
                .reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error("primary.xml", self.reader.buffer_position(), e))?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let name = e.local_name();

                    if !self.root_seen {
                        if name.as_ref() != b"metadata" {
                            return Err(Error::ParseError(format!(
                                "primary.xml: unexpected root element <{}>",
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

                    if name.as_ref() == b"package" {
                        if builder.is_some() {
                            return Err(Error::ParseError(format!(
                                "primary.xml: nested <package> after package #{}",
                                self.count
                            )));
                        }
                        if let Some(kind) = attribute(e, b"type")? {
                            if kind != "rpm" {
                                return Err(Error::ParseError(format!(
                                    "primary.xml: unsupported package type '{}'",
                                    kind
                                )));
                            }
                        }
                        builder = Some(PackageBuilder::default());
                        if is_empty {
                            return self.finish_package(builder.take()).map(Some);
                        }
                        continue;
                    }

                    let Some(pkg) = builder.as_mut() else {
                        continue;
                    };

                    if in_format {
                        match name.as_ref() {
                            b"entry" => {
                                let capability = match section {
                                    Section::Provides | Section::Requires => parse_entry(e)?,
                                    Section::None | Section::Other => continue,
                                };
                                if section == Section::Provides {
                                    pkg.provides.push(capability);
                                } else {
                                    pkg.requires.push(capability);
                                }
                            }
                            b"provides" if !is_empty => section = Section::Provides,
                            b"requires" if !is_empty => section = Section::Requires,
                            _ if !is_empty => section = Section::Other,
                            _ => {}
                        }
                        continue;
                    }

                    match name.as_ref() {
                        b"name" if !is_empty => field = Some(Field::Name),
                        b"arch" if !is_empty => field = Some(Field::Arch),
                        b"summary" if !is_empty => field = Some(Field::Summary),
                        b"description" if !is_empty => field = Some(Field::Description),
                        b"checksum" => {
                            pkg.checksum_type = attribute(e, b"type")?;
                            if !is_empty {
                                field = Some(Field::Checksum);
                            }
                        }
                        b"version" => {
                            pkg.epoch = attribute(e, b"epoch")?;
                            pkg.ver = attribute(e, b"ver")?;
                            pkg.rel = attribute(e, b"rel")?;
                        }
                        b"size" => {
                            pkg.size = attribute(e, b"package")?;
                            pkg.installed_size = attribute(e, b"installed")?;
                        }
                        b"location" => pkg.location = attribute(e, b"href")?,
                        b"format" if !is_empty => in_format = true,
                        _ => {}
                    }
                }
                Event::Text(ref e) => {
                    if let (Some(field), Some(pkg)) = (field, builder.as_mut()) {
                        let text = e
                            .unescape()
                            .map_err(|err| xml_error("primary.xml", self.reader.buffer_position(), err))?;
                        pkg.push_text(field, &text);
                    }
                }
                Event::CData(ref e) => {
                    if let (Some(field), Some(pkg)) = (field, builder.as_mut()) {
                        pkg.push_text(field, &String::from_utf8_lossy(e));
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"package" => return self.finish_package(builder.take()).map(Some),
                    b"format" => {
                        in_format = false;
                        section = Section::None;
                    }
                    b"entry" => {}
                    b"metadata" if builder.is_none() => {
                        self.finished = true;
                        return Ok(None);
                    }
                    _ => {
                        field = None;
                        if in_format {
                            section = Section::None;
                        }
                    }
                },
                Event::Eof => {
                    self.finished = true;
                    if !self.root_seen {
                        return Err(Error::ParseError(
                            "primary.xml: missing <metadata> root".to_string(),
                        ));
                    }
                    if builder.is_some() {
                        return Err(Error::ParseError(format!(
                            "primary.xml: document truncated inside package #{}",
                            self.count + 1
                        )));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    fn finish_package(&mut self, builder: Option<PackageBuilder>) -> Result<Package> {
        self.count += 1;
        let builder = builder.unwrap_or_default();
        builder.build(&self.repo).map_err(|e| match e {
            Error::ParseError(msg) => Error::ParseError(format!("primary.xml package #{}: {}", self.count, msg)),
            other => other,
        })
    }
}

impl<R: BufRead> Iterator for PrimaryReader<R> {
    type Item = Result<Package>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_package() {
            Ok(package) => package.map(Ok),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Parse a whole primary document into packages of `repo`
pub fn parse_primary(source: impl BufRead, repo: &str) -> Result<Vec<Package>> {
    let packages = PrimaryReader::new(source, repo).collect::<Result<Vec<_>>>()?;
    debug!("Parsed {} packages from primary.xml of {}", packages.len(), repo);
    Ok(packages)
}

/// Parse an `<rpm:entry>` element into a capability
fn parse_entry(e: &quick_xml::events::BytesStart<'_>) -> Result<Capability> {
    let name = attribute(e, b"name")?
        .ok_or_else(|| Error::ParseError("relation entry without name".to_string()))?;

    let op = attribute(e, b"flags")?.and_then(|flags| CapabilityOp::from_flags(&flags));
    let ver = attribute(e, b"ver")?;

    match (op, ver) {
        (Some(op), Some(ver)) => {
            let epoch = parse_number::<u32>(attribute(e, b"epoch")?, "epoch")?.unwrap_or(0);
            let rel = attribute(e, b"rel")?;
            Ok(Capability::versioned(name, op, format_evr(epoch, &ver, rel.as_deref())))
        }
        _ => Ok(Capability::new(name)),
    }
}

/// Builder for constructing a Package from XML parsing
#[derive(Default)]
struct PackageBuilder {
    name: String,
    arch: String,
    epoch: Option<String>,
    ver: Option<String>,
    rel: Option<String>,
    summary: String,
    description: String,
    checksum: String,
    checksum_type: Option<String>,
    size: Option<String>,
    installed_size: Option<String>,
    location: Option<String>,
    provides: Vec<Capability>,
    requires: Vec<Capability>,
}

impl PackageBuilder {
    fn push_text(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Name => &mut self.name,
            Field::Arch => &mut self.arch,
            Field::Summary => &mut self.summary,
            Field::Description => &mut self.description,
            Field::Checksum => &mut self.checksum,
        };
        target.push_str(text);
    }

    fn build(self, repo: &str) -> Result<Package> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::ParseError("Missing package name".to_string()));
        }

        let arch = self.arch.trim().to_string();
        if arch.is_empty() {
            return Err(Error::ParseError(format!("Missing architecture of {}", name)));
        }

        let version = self
            .ver
            .ok_or_else(|| Error::ParseError(format!("Missing version of {}", name)))?;
        let epoch = parse_number::<u32>(self.epoch, "epoch")?.unwrap_or(0);

        let checksum_type = match self.checksum_type {
            Some(kind) => kind.parse::<ChecksumType>().map_err(Error::ParseError)?,
            None => ChecksumType::Sha256,
        };

        let size = parse_number::<u64>(self.size, "package size")?.unwrap_or(0);
        let installed_size = parse_number::<u64>(self.installed_size, "installed size")?.unwrap_or(0);

        let summary = Some(self.summary.trim().to_string()).filter(|s| !s.is_empty());
        let description = Some(self.description.trim().to_string())
            .filter(|d| !d.is_empty())
            .filter(|d| summary.as_deref().map(|s| s.trim_end_matches('.')) != Some(d.trim_end_matches('.')));

        Ok(Package {
            name,
            epoch,
            version,
            release: self.rel.unwrap_or_default(),
            arch,
            repo: repo.to_string(),
            summary,
            description,
            size,
            installed_size,
            checksum: Checksum::new(checksum_type, self.checksum),
            location: self.location.unwrap_or_default(),
            provides: self.provides,
            requires: self.requires,
            files: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="2">
<package type="rpm">
  <name>libfoo</name>
  <arch>x86_64</arch>
  <version epoch="1" ver="2.0" rel="3.1"/>
  <checksum type="sha256" pkgid="YES">ABCDEF</checksum>
  <summary>Foo library</summary>
  <description>Foo library.</description>
  <packager>someone</packager>
  <url>https://example.org</url>
  <time file="1" build="2"/>
  <size package="1024" installed="4096" archive="5000"/>
  <location href="x86_64/libfoo-2.0-3.1.x86_64.rpm"/>
  <format>
    <rpm:license>MIT</rpm:license>
    <rpm:provides>
      <rpm:entry name="libfoo" flags="EQ" epoch="1" ver="2.0" rel="3.1"/>
      <rpm:entry name="libfoo.so.2()(64bit)"/>
    </rpm:provides>
    <rpm:requires>
      <rpm:entry name="libbar" flags="GE" epoch="0" ver="1.5"/>
      <rpm:entry name="rpmlib(PayloadIsZstd)" flags="LE" epoch="0" ver="5.4.18-1" pre="1"/>
      <rpm:entry name="/bin/sh"/>
    </rpm:requires>
    <rpm:conflicts>
      <rpm:entry name="oldfoo"/>
    </rpm:conflicts>
    <file>/usr/lib64/libfoo.so.2</file>
  </format>
</package>
<package type="rpm">
  <name>libbar</name>
  <arch>noarch</arch>
  <version ver="1.6" rel="1"/>
  <checksum type="sha">0011</checksum>
  <summary>Bar &amp; friends</summary>
  <description>Longer text about bar.</description>
  <size package="10" installed="20"/>
  <location href="noarch/libbar-1.6-1.noarch.rpm"/>
  <format>
    <rpm:provides><rpm:entry name="libbar" flags="EQ" ver="1.6" rel="1"/></rpm:provides>
    <rpm:requires/>
  </format>
</package>
</metadata>"#;

    #[test]
    fn test_parse_primary() {
        let packages = parse_primary(PRIMARY.as_bytes(), "oss").unwrap();
        assert_eq!(packages.len(), 2);

        let foo = &packages[0];
        assert_eq!(foo.name, "libfoo");
        assert_eq!(foo.arch, "x86_64");
        assert_eq!(foo.repo, "oss");
        assert_eq!(foo.epoch, 1);
        assert_eq!(foo.evr(), "1:2.0-3.1");
        assert_eq!(foo.size, 1024);
        assert_eq!(foo.installed_size, 4096);
        assert_eq!(foo.checksum, Checksum::new(ChecksumType::Sha256, "abcdef"));
        assert_eq!(foo.location, "x86_64/libfoo-2.0-3.1.x86_64.rpm");
        assert_eq!(foo.summary.as_deref(), Some("Foo library"));
        assert_eq!(foo.description, None);
        assert!(foo.files.is_none());

        assert_eq!(foo.provides.len(), 2);
        assert_eq!(foo.provides[0].to_string(), "libfoo = 1:2.0-3.1");
        let requires: Vec<String> = foo.requires.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            requires,
            vec!["libbar >= 1.5", "rpmlib(PayloadIsZstd) <= 5.4.18-1", "/bin/sh"]
        );

        let bar = &packages[1];
        assert_eq!(bar.summary.as_deref(), Some("Bar & friends"));
        assert_eq!(bar.description.as_deref(), Some("Longer text about bar."));
        assert_eq!(bar.checksum.kind, ChecksumType::Sha1);
        assert!(bar.requires.is_empty());
    }

    #[test]
    fn test_reader_is_incremental() {
        let mut reader = PrimaryReader::new(PRIMARY.as_bytes(), "oss");
        let first = reader.next_package().unwrap().unwrap();
        assert_eq!(first.name, "libfoo");
        assert_eq!(reader.parsed(), 1);
        let second = reader.next_package().unwrap().unwrap();
        assert_eq!(second.name, "libbar");
        assert!(reader.next_package().unwrap().is_none());
        assert!(reader.next_package().unwrap().is_none());
    }

    #[test]
    fn test_tolerates_missing_optional_elements() {
        let xml = r#"<metadata><package type="rpm"><name>bare</name><arch>src</arch><version ver="1"/><unknown><deep/></unknown></package></metadata>"#;
        let packages = parse_primary(xml.as_bytes(), "r").unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].evr(), "1");
        assert!(packages[0].provides.is_empty());
        assert!(packages[0].summary.is_none());
    }

    #[test]
    fn test_description_repeating_summary_dropped() {
        let package = |summary: &str, description: &str| {
            let xml = format!(
                r#"<metadata><package type="rpm"><name>foo</name><arch>noarch</arch><version ver="1"/><summary>{}</summary><description>{}</description></package></metadata>"#,
                summary, description
            );
            parse_primary(xml.as_bytes(), "r").unwrap().remove(0)
        };

        assert!(package("Foo.", "Foo.").description.is_none());
        assert!(package("Foo", "Foo.").description.is_none());
        assert!(package("Foo.", "Foo").description.is_none());
        assert_eq!(package("Foo", "Foo tools.").description.as_deref(), Some("Foo tools."));
    }

    #[test]
    fn test_empty_metadata() {
        assert!(parse_primary("<metadata packages=\"0\"/>".as_bytes(), "r").unwrap().is_empty());
    }

    #[test]
    fn test_structural_errors() {
        let missing_name = r#"<metadata><package type="rpm"><arch>noarch</arch><version ver="1"/></package></metadata>"#;
        assert!(matches!(parse_primary(missing_name.as_bytes(), "r"), Err(Error::ParseError(_))));

        let truncated = r#"<metadata><package type="rpm"><name>x</name>"#;
        assert!(parse_primary(truncated.as_bytes(), "r").is_err());

        let wrong_root = r#"<filelists></filelists>"#;
        assert!(parse_primary(wrong_root.as_bytes(), "r").is_err());

        let mismatched = r#"<metadata><package type="rpm"><name>x</arch></package></metadata>"#;
        assert!(parse_primary(mismatched.as_bytes(), "r").is_err());
    }
}

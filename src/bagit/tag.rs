use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::slice::Iter;
use std::vec::IntoIter;

use snafu::ResultExt;

use crate::bagit::bag::BagItVersion;
use crate::bagit::consts::*;
use crate::bagit::error::*;
use crate::bagit::io::TagLineReader;
use crate::bagit::Error::{InvalidTagLine, MissingTag, UnsupportedEncoding, UnsupportedVersion};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BagDeclaration {
    version: BagItVersion,
    // Encoding will always be UTF-8 when creating, and other encodings are rejected when reading
    encoding: String,
}

#[derive(Debug, Clone, Default)]
pub struct BagInfo {
    tags: TagList,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Tag {
    label: String,
    value: String,
}

#[derive(Debug, Clone, Default)]
pub struct TagList {
    tags: Vec<Tag>,
}

/// Writes bagit.txt to the bag's base directory
pub fn write_bag_declaration<P: AsRef<Path>>(
    bag_declaration: &BagDeclaration,
    base_dir: P,
) -> Result<()> {
    write_tag_file(
        &bag_declaration.to_tags(),
        base_dir.as_ref().join(BAGIT_TXT),
    )
}

/// Writes bag-info.txt to the bag's base directory
pub fn write_bag_info<P: AsRef<Path>>(bag_info: &BagInfo, base_dir: P) -> Result<()> {
    write_tag_file(bag_info.as_ref(), base_dir.as_ref().join(BAG_INFO_TXT))
}

/// Reads a bag declaration out of the specified `base_dir`
pub fn read_bag_declaration<P: AsRef<Path>>(base_dir: P) -> Result<BagDeclaration> {
    read_bag_declaration_file(base_dir.as_ref().join(BAGIT_TXT))
}

/// Reads a bag declaration from a file that may not be named `bagit.txt`, such as a template
pub fn read_bag_declaration_file<P: AsRef<Path>>(path: P) -> Result<BagDeclaration> {
    let tags = read_tag_file(path)?;
    tags.try_into()
}

/// Reads bag info out of the specified `base_dir`. A missing bag-info.txt results in empty
/// bag info because the file is optional.
pub fn read_bag_info<P: AsRef<Path>>(base_dir: P) -> Result<BagInfo> {
    let info_file = base_dir.as_ref().join(BAG_INFO_TXT);
    if !info_file.exists() {
        return Ok(BagInfo::new());
    }
    let tags = read_tag_file(&info_file)?;
    Ok(tags.into())
}

impl BagDeclaration {
    pub fn new() -> Self {
        Self {
            version: BAGIT_DEFAULT_VERSION,
            encoding: UTF_8.into(),
        }
    }

    pub fn with_values<S: AsRef<str>>(version: BagItVersion, encoding: S) -> Result<Self> {
        let encoding = encoding.as_ref();

        if BAGIT_1_0 != version {
            return Err(UnsupportedVersion { version });
        }

        if !UTF_8.eq_ignore_ascii_case(encoding) {
            return Err(UnsupportedEncoding {
                encoding: encoding.into(),
            });
        }

        Ok(Self {
            version,
            encoding: encoding.into(),
        })
    }

    pub fn version(&self) -> BagItVersion {
        self.version
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn to_tags(&self) -> TagList {
        let mut tags = TagList::with_capacity(2);
        tags.add_tag(LABEL_BAGIT_VERSION, self.version.to_string());
        tags.add_tag(LABEL_FILE_ENCODING, &self.encoding);
        tags
    }
}

impl Default for BagDeclaration {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<TagList> for BagDeclaration {
    type Error = Error;

    fn try_from(tags: TagList) -> std::result::Result<Self, Self::Error> {
        let version_tag = tags
            .get_tag(LABEL_BAGIT_VERSION)
            .ok_or_else(|| MissingTag {
                tag: LABEL_BAGIT_VERSION.to_string(),
            })?;
        let version = BagItVersion::try_from(&version_tag.value)?;

        let encoding_tag = tags
            .get_tag(LABEL_FILE_ENCODING)
            .ok_or_else(|| MissingTag {
                tag: LABEL_FILE_ENCODING.to_string(),
            })?;

        BagDeclaration::with_values(version, &encoding_tag.value)
    }
}

impl BagInfo {
    pub fn new() -> Self {
        Self {
            tags: TagList::new(),
        }
    }

    pub fn with_tags(tags: TagList) -> Self {
        Self { tags }
    }

    pub fn bagging_date(&self) -> Option<&str> {
        self.tags.get_tag(LABEL_BAGGING_DATE).map(Tag::value)
    }

    pub fn software_agent(&self) -> Option<&str> {
        self.tags.get_tag(LABEL_SOFTWARE_AGENT).map(Tag::value)
    }

    pub fn payload_oxum(&self) -> Option<&str> {
        self.tags.get_tag(LABEL_PAYLOAD_OXUM).map(Tag::value)
    }

    pub fn add_bagging_date<S: AsRef<str>>(&mut self, value: S) {
        self.tags.remove_tags(LABEL_BAGGING_DATE);
        self.tags.add_tag(LABEL_BAGGING_DATE, value);
    }

    pub fn add_software_agent<S: AsRef<str>>(&mut self, value: S) {
        self.tags.remove_tags(LABEL_SOFTWARE_AGENT);
        self.tags.add_tag(LABEL_SOFTWARE_AGENT, value);
    }

    pub fn add_payload_oxum<S: AsRef<str>>(&mut self, value: S) {
        self.tags.remove_tags(LABEL_PAYLOAD_OXUM);
        self.tags.add_tag(LABEL_PAYLOAD_OXUM, value);
    }
}

impl From<TagList> for BagInfo {
    fn from(tags: TagList) -> Self {
        BagInfo::with_tags(tags)
    }
}

impl AsRef<TagList> for BagInfo {
    fn as_ref(&self) -> &TagList {
        &self.tags
    }
}

impl Tag {
    pub fn new<L: AsRef<str>, V: AsRef<str>>(label: L, value: V) -> Self {
        Self {
            label: label.as_ref().into(),
            value: value.as_ref().into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl TagList {
    pub fn new() -> Self {
        Self { tags: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tags: Vec::with_capacity(capacity),
        }
    }

    /// Returns the first tag with the provided label. It uses a case insensitive match.
    pub fn get_tag<S: AsRef<str>>(&self, label: S) -> Option<&Tag> {
        let label = label.as_ref();
        self.tags
            .iter()
            .find(|tag| tag.label.eq_ignore_ascii_case(label))
    }

    pub fn add(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    pub fn add_tag<L: AsRef<str>, V: AsRef<str>>(&mut self, label: L, value: V) {
        self.tags.push(Tag::new(label, value));
    }

    /// Removes all of the tags with the provided label. It uses a case insensitive match.
    pub fn remove_tags<S: AsRef<str>>(&mut self, label: S) {
        let label = label.as_ref();
        self.tags.retain(|e| !e.label.eq_ignore_ascii_case(label));
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl IntoIterator for TagList {
    type Item = Tag;
    type IntoIter = IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagList {
    type Item = &'a Tag;
    type IntoIter = Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

/// Writes a tag file to the specified destination
fn write_tag_file<P: AsRef<Path>>(tags: &TagList, destination: P) -> Result<()> {
    let destination = destination.as_ref();
    info!("Writing tag file {}", destination.display());

    let mut writer =
        BufWriter::new(File::create(destination).context(IoCreateSnafu { path: destination })?);

    for tag in tags {
        writeln!(writer, "{}: {}", tag.label, tag.value)
            .context(IoWriteSnafu { path: destination })?;
    }

    writer
        .flush()
        .context(IoWriteSnafu { path: destination })
}

fn read_tag_file<P: AsRef<Path>>(path: P) -> Result<TagList> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path).context(IoReadSnafu { path })?);

    let mut tags = TagList::new();

    for line in TagLineReader::new(reader) {
        let (num, line) = line?;
        tags.add(parse_tag_line(path, num, &line)?);
    }

    Ok(tags)
}

fn parse_tag_line(path: &Path, num: usize, line: &str) -> Result<Tag> {
    let invalid = |details: &str| InvalidTagLine {
        path: path.to_path_buf(),
        num,
        details: details.to_string(),
    };

    if let Some((label, value)) = line.split_once(':') {
        if label.trim().is_empty() {
            return Err(invalid("label must not be blank"));
        }

        match value.chars().next() {
            Some(' ') | Some('\t') => {
                debug!("Tag [`{label}`:`{}`]", &value[1..]);
                Ok(Tag::new(label, &value[1..]))
            }
            _ => Err(invalid(
                "value part must start with one whitespace character",
            )),
        }
    } else {
        Err(invalid("missing colon"))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::bagit::bag::BagItVersion;
    use crate::bagit::error::Error;
    use crate::bagit::tag::{
        parse_tag_line, read_bag_declaration, read_bag_info, write_bag_declaration,
        write_bag_info, BagDeclaration, BagInfo,
    };

    #[test]
    fn parse_valid_tag_lines() {
        let tag = parse_tag_line(Path::new("bag-info.txt"), 1, "Source-Organization: Acme")
            .unwrap();
        assert_eq!("Source-Organization", tag.label());
        assert_eq!("Acme", tag.value());

        let tag = parse_tag_line(Path::new("bag-info.txt"), 2, "Label:\tvalue: with colon").unwrap();
        assert_eq!("value: with colon", tag.value());
    }

    #[test]
    fn reject_invalid_tag_lines() {
        let result = parse_tag_line(Path::new("bagit.txt"), 3, "no colon here");
        assert!(matches!(result, Err(Error::InvalidTagLine { num: 3, .. })));

        let result = parse_tag_line(Path::new("bagit.txt"), 4, "Label:value");
        assert!(matches!(result, Err(Error::InvalidTagLine { num: 4, .. })));
    }

    #[test]
    fn write_then_read_declaration_and_info() {
        let dir = tempfile::tempdir().unwrap();

        write_bag_declaration(&BagDeclaration::new(), dir.path()).unwrap();
        assert_eq!(
            "BagIt-Version: 1.0\nTag-File-Character-Encoding: UTF-8\n",
            fs::read_to_string(dir.path().join("bagit.txt")).unwrap()
        );
        let declaration = read_bag_declaration(dir.path()).unwrap();
        assert_eq!(BagItVersion::new(1, 0), declaration.version());

        let mut info = BagInfo::new();
        info.add_bagging_date("2020-01-01");
        info.add_bagging_date("2021-02-03");
        info.add_payload_oxum("10.2");
        write_bag_info(&info, dir.path()).unwrap();

        let read = read_bag_info(dir.path()).unwrap();
        assert_eq!(Some("2021-02-03"), read.bagging_date());
        assert_eq!(Some("10.2"), read.payload_oxum());
        assert_eq!(None, read.software_agent());
    }

    #[test]
    fn missing_bag_info_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_bag_info(dir.path()).unwrap().as_ref().is_empty());
    }

    #[test]
    fn reject_unsupported_declarations() {
        let dir = tempfile::tempdir().unwrap();

        fs::write(
            dir.path().join("bagit.txt"),
            "BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n",
        )
        .unwrap();
        assert!(matches!(
            read_bag_declaration(dir.path()),
            Err(Error::UnsupportedVersion { .. })
        ));

        fs::write(dir.path().join("bagit.txt"), "BagIt-Version: 1.0\n").unwrap();
        assert!(matches!(
            read_bag_declaration(dir.path()),
            Err(Error::MissingTag { .. })
        ));
    }
}

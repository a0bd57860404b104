use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::debug;
use roxmltree::{Document, Node};
use snafu::{ensure, OptionExt, ResultExt};

use crate::bagit::{DigestAlgorithm, HexDigest};
use crate::sip::error::*;

/// Namespace of the arelda v4 metadata schema used in SIP headers
pub const ARELDA_NS: &str = "http://bar.admin.ch/arelda/v4";

const INVENTORY: &str = "inhaltsverzeichnis";
const FOLDER: &str = "ordner";
const FILE: &str = "datei";
const NAME: &str = "name";
const CHECKSUM: &str = "pruefsumme";
const CHECKSUM_ALGORITHM: &str = "pruefalgorithmus";

/// A file declared in the metadata, with its path relative to the package root
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InventoryEntry {
    path: String,
    checksum: HexDigest,
}

/// The declared files of a package in document order. Always built from scratch for each
/// metadata document that is read.
#[derive(Debug, Default)]
pub struct Inventory {
    entries: Vec<InventoryEntry>,
    paths: HashSet<String>,
}

impl InventoryEntry {
    /// The `/` separated path of the file relative to the package root, eg `content/d1/f.txt`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn checksum(&self) -> &HexDigest {
        &self.checksum
    }
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, path: String, checksum: HexDigest) -> Result<(), MetadataError> {
        ensure!(
            self.paths.insert(path.clone()),
            DuplicatePathSnafu { path }
        );
        debug!("Declared checksum {checksum} for {path}");
        self.entries.push(InventoryEntry { path, checksum });
        Ok(())
    }
}

/// Reads the declared file checksums out of the metadata file at `path`
pub fn read_inventory<P: AsRef<Path>>(path: P) -> Result<Inventory, MetadataError> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path).context(ReadMetadataSnafu { path })?;
    parse_inventory(&xml)
}

/// Parses the declared file checksums out of a metadata document. The inventory's folders are
/// walked depth first, and each file's path is assembled from the names of its enclosing folders.
pub fn parse_inventory(xml: &str) -> Result<Inventory, MetadataError> {
    let doc = Document::parse(xml).context(ParseMetadataSnafu)?;

    let inventory_node = doc
        .descendants()
        .find(|n| n.has_tag_name((ARELDA_NS, INVENTORY)))
        .context(MissingInventorySnafu)?;

    let mut inventory = Inventory::new();

    for child in inventory_node.children().filter(is_folder_or_file) {
        collect_entries(&doc, child, "", &mut inventory)?;
    }

    ensure!(!inventory.is_empty(), EmptyInventorySnafu);

    Ok(inventory)
}

fn collect_entries(
    doc: &Document,
    node: Node,
    prefix: &str,
    inventory: &mut Inventory,
) -> Result<(), MetadataError> {
    let line = doc.text_pos_at(node.range().start).row;

    let name = child_text(node, NAME).context(MissingElementSnafu {
        line,
        element: NAME,
    })?;
    ensure!(
        !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\']),
        InvalidNameSnafu { line, name }
    );

    let path = if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    };

    if node.has_tag_name((ARELDA_NS, FILE)) {
        let checksum = child_text(node, CHECKSUM).context(MissingElementSnafu {
            line,
            element: CHECKSUM,
        })?;

        if let Some(algorithm) = child_text(node, CHECKSUM_ALGORITHM) {
            ensure!(
                DigestAlgorithm::parse_lenient(algorithm) == Some(DigestAlgorithm::Md5),
                UnsupportedAlgorithmSnafu {
                    path: &path,
                    algorithm
                }
            );
        }

        ensure!(
            HexDigest::is_valid_for(checksum, DigestAlgorithm::Md5),
            InvalidChecksumSnafu {
                path: &path,
                checksum
            }
        );

        inventory.insert(path, checksum.into())
    } else {
        for child in node.children().filter(is_folder_or_file) {
            collect_entries(doc, child, &path, inventory)?;
        }
        Ok(())
    }
}

fn is_folder_or_file(node: &Node) -> bool {
    node.has_tag_name((ARELDA_NS, FOLDER)) || node.has_tag_name((ARELDA_NS, FILE))
}

/// The trimmed text of the first child element named `name`
fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name((ARELDA_NS, name)))
        .map(|n| n.text().unwrap_or("").trim())
}

#[cfg(test)]
mod tests {
    use crate::sip::error::MetadataError;
    use crate::sip::metadata::parse_inventory;

    fn wrap(inventory: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<paket xmlns="http://bar.admin.ch/arelda/v4" schemaVersion="4.0">
  <paketTyp>SIP</paketTyp>
  <inhaltsverzeichnis>{inventory}</inhaltsverzeichnis>
</paket>"#
        )
    }

    #[test]
    fn collect_nested_file_paths_in_document_order() {
        let xml = wrap(
            r#"
    <ordner>
      <name>header</name>
      <ordner>
        <name>xsd</name>
        <datei id="f1">
          <name>arelda.xsd</name>
          <pruefalgorithmus>MD5</pruefalgorithmus>
          <pruefsumme>AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA</pruefsumme>
        </datei>
      </ordner>
    </ordner>
    <ordner>
      <name>content</name>
      <ordner>
        <name>DOS_01</name>
        <datei id="f2">
          <name>a.txt</name>
          <pruefsumme>5eb63bbbe01eeed093cb22bb8f5acdc3</pruefsumme>
        </datei>
        <datei id="f3">
          <name>b.txt</name>
          <pruefsumme> 900150983cd24fb0d6963f7d28e17f72 </pruefsumme>
        </datei>
      </ordner>
      <ordner>
        <name>empty</name>
      </ordner>
    </ordner>"#,
        );

        let inventory = parse_inventory(&xml).unwrap();

        let entries: Vec<(&str, &str)> = inventory
            .entries()
            .iter()
            .map(|e| (e.path(), e.checksum().as_str()))
            .collect();
        assert_eq!(
            vec![
                ("header/xsd/arelda.xsd", "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
                ("content/DOS_01/a.txt", "5eb63bbbe01eeed093cb22bb8f5acdc3"),
                ("content/DOS_01/b.txt", "900150983cd24fb0d6963f7d28e17f72"),
            ],
            entries
        );
    }

    #[test]
    fn each_parse_starts_from_an_empty_inventory() {
        let first = wrap(
            r#"<ordner><name>content</name>
                 <datei><name>one.txt</name><pruefsumme>5eb63bbbe01eeed093cb22bb8f5acdc3</pruefsumme></datei>
               </ordner>"#,
        );
        let second = wrap(
            r#"<ordner><name>content</name>
                 <datei><name>two.txt</name><pruefsumme>5eb63bbbe01eeed093cb22bb8f5acdc3</pruefsumme></datei>
               </ordner>"#,
        );

        assert_eq!(1, parse_inventory(&first).unwrap().len());
        let inventory = parse_inventory(&second).unwrap();
        assert_eq!(1, inventory.len());
        assert_eq!("content/two.txt", inventory.entries()[0].path());
    }

    #[test]
    fn reject_documents_without_checksums() {
        assert!(matches!(
            parse_inventory(""),
            Err(MetadataError::ParseMetadata { .. })
        ));
        assert!(matches!(
            parse_inventory(r#"<paket xmlns="http://bar.admin.ch/arelda/v4"/>"#),
            Err(MetadataError::MissingInventory)
        ));
        assert!(matches!(
            parse_inventory(&wrap("<ordner><name>content</name></ordner>")),
            Err(MetadataError::EmptyInventory)
        ));
    }

    #[test]
    fn reject_invalid_entries() {
        let bad_checksum = wrap(
            "<ordner><name>content</name><datei><name>a</name><pruefsumme>xyz</pruefsumme></datei></ordner>",
        );
        assert!(matches!(
            parse_inventory(&bad_checksum),
            Err(MetadataError::InvalidChecksum { .. })
        ));

        let sha = wrap(
            "<ordner><name>content</name><datei><name>a</name>\
             <pruefalgorithmus>SHA-256</pruefalgorithmus>\
             <pruefsumme>5eb63bbbe01eeed093cb22bb8f5acdc3</pruefsumme></datei></ordner>",
        );
        assert!(matches!(
            parse_inventory(&sha),
            Err(MetadataError::UnsupportedAlgorithm { .. })
        ));

        let escaping = wrap(
            "<ordner><name>..</name><datei><name>a</name>\
             <pruefsumme>5eb63bbbe01eeed093cb22bb8f5acdc3</pruefsumme></datei></ordner>",
        );
        assert!(matches!(
            parse_inventory(&escaping),
            Err(MetadataError::InvalidName { line: 4, .. })
        ));

        let duplicate = wrap(
            "<ordner><name>content</name>\
             <datei><name>a</name><pruefsumme>5eb63bbbe01eeed093cb22bb8f5acdc3</pruefsumme></datei>\
             <datei><name>a</name><pruefsumme>5eb63bbbe01eeed093cb22bb8f5acdc3</pruefsumme></datei>\
             </ordner>",
        );
        assert!(matches!(
            parse_inventory(&duplicate),
            Err(MetadataError::DuplicatePath { .. })
        ));

        let nameless = wrap("<ordner><datei><pruefsumme>x</pruefsumme></datei></ordner>");
        assert!(matches!(
            parse_inventory(&nameless),
            Err(MetadataError::MissingElement { .. })
        ));
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use regex::Regex;
use sipbag::bagit::open_bag;
use sipbag::sip::{
    repackage_sip, repackage_sip_with, FinalizeError, ManifestError, MetadataError,
    RepackageError, RepackageOptions, StructureError,
};
use tempfile::TempDir;

const HELLO_MD5: &str = "6f5902ac237024bdd0c176cb93063dc4";
const ABC_MD5: &str = "900150983cd24fb0d6963f7d28e17f72";

#[test]
fn manifest_lists_every_declared_file_and_the_metadata() {
    let temp = TempDir::new().unwrap();
    let sip = create_sip(temp.path(), "SIP_1", ABC_MD5);

    let bag_dir = repackage_sip(&sip).unwrap();

    assert_eq!(temp.path().join("SIP_1_bag"), bag_dir);

    let manifest = fs::read_to_string(bag_dir.join("manifest-md5.txt")).unwrap();
    let line_regex = Regex::new(r"^[0-9a-f]{32}  \S.*$").unwrap();
    let lines: Vec<&str> = manifest.lines().collect();

    assert_eq!(3, lines.len());
    for line in &lines {
        assert!(line_regex.is_match(line), "unexpected line: {}", line);
    }
    assert!(manifest.contains(&format!("{}  data/content/DOS_01/a.txt\n", HELLO_MD5)));
    assert!(manifest.contains(&format!("{}  data/content/DOS_01/b.txt\n", ABC_MD5)));
    assert!(manifest.contains("  data/header/metadata.xml\n"));
}

#[test]
fn finalized_bag_is_valid() {
    let temp = TempDir::new().unwrap();
    let sip = create_sip(temp.path(), "SIP_1", ABC_MD5);

    let options = RepackageOptions::new()
        .with_bagging_date(NaiveDate::from_ymd_opt(2024, 1, 15))
        .with_software_agent(Some("sipbag test".to_string()));
    let bag_dir = repackage_sip_with(&sip, &options).unwrap();

    let bag = open_bag(&bag_dir).unwrap();
    assert!(bag.validate(true).unwrap().is_valid());

    let metadata_size = fs::metadata(sip.join("header/metadata.xml")).unwrap().len();
    let bag_info = fs::read_to_string(bag_dir.join("bag-info.txt")).unwrap();
    assert_eq!(
        format!(
            "Bagging-Date: 2024-01-15\nBag-Software-Agent: sipbag test\nPayload-Oxum: {}.3\n",
            metadata_size + 15
        ),
        bag_info
    );

    let tag_manifest = fs::read_to_string(bag_dir.join("tagmanifest-md5.txt")).unwrap();
    let tag_files: Vec<&str> = tag_manifest
        .lines()
        .filter_map(|line| line.split_once("  ").map(|(_, path)| path))
        .collect();
    assert_eq!(
        vec!["bag-info.txt", "bagit.txt", "manifest-md5.txt"],
        tag_files
    );
}

#[test]
fn repackaging_twice_creates_independent_bags_and_leaves_sip_untouched() {
    let temp = TempDir::new().unwrap();
    let sip = create_sip(temp.path(), "SIP_1", ABC_MD5);
    let before = snapshot(&sip);

    let first = repackage_sip_with(
        &sip,
        &RepackageOptions::new().with_destination(temp.path().join("one")),
    )
    .unwrap();
    let second = repackage_sip_with(
        &sip,
        &RepackageOptions::new().with_destination(temp.path().join("two")),
    )
    .unwrap();

    assert_ne!(first, second);
    assert!(first.join("data/content/DOS_01/a.txt").is_file());
    assert!(second.join("data/content/DOS_01/a.txt").is_file());
    assert_eq!(before, snapshot(&sip));
    assert!(!sip.join("manifest-md5.txt").exists());
}

#[test]
fn fail_when_declared_checksum_does_not_match() {
    let temp = TempDir::new().unwrap();
    let sip = create_sip(temp.path(), "SIP_1", "e2fc714c4727ee9395f324cd2e7f331f");

    let error = repackage_sip(&sip).unwrap_err();

    match error {
        RepackageError::Finalize {
            source: FinalizeError::InvalidBag { issues, .. },
        } => {
            assert!(issues
                .iter()
                .any(|issue| issue.contains("data/content/DOS_01/b.txt")));
        }
        e => panic!("unexpected error: {}", e),
    }

    assert!(!temp.path().join("SIP_1_bag/bag-info.txt").exists());
}

#[test]
fn fail_when_metadata_is_missing() {
    let temp = TempDir::new().unwrap();
    let sip = create_sip(temp.path(), "SIP_1", ABC_MD5);
    fs::remove_file(sip.join("header/metadata.xml")).unwrap();

    let error = repackage_sip(&sip).unwrap_err();

    assert!(matches!(
        error,
        RepackageError::Manifest {
            source: ManifestError::Metadata {
                source: MetadataError::ReadMetadata { .. }
            }
        }
    ));
}

#[test]
fn fail_when_metadata_declares_nothing() {
    let temp = TempDir::new().unwrap();
    let sip = create_sip(temp.path(), "SIP_1", ABC_MD5);
    fs::write(
        sip.join("header/metadata.xml"),
        r#"<paket xmlns="http://bar.admin.ch/arelda/v4"><inhaltsverzeichnis/></paket>"#,
    )
    .unwrap();

    let error = repackage_sip(&sip).unwrap_err();

    assert!(matches!(
        error,
        RepackageError::Manifest {
            source: ManifestError::Metadata {
                source: MetadataError::EmptyInventory
            }
        }
    ));
}

#[test]
fn fail_when_destination_exists() {
    let temp = TempDir::new().unwrap();
    let sip = create_sip(temp.path(), "SIP_1", ABC_MD5);
    fs::create_dir(temp.path().join("SIP_1_bag")).unwrap();

    let error = repackage_sip(&sip).unwrap_err();

    assert!(matches!(
        error,
        RepackageError::Structure {
            source: StructureError::DestinationExists { .. }
        }
    ));
    assert!(!temp.path().join("SIP_1_bag/data").exists());
}

#[test]
fn fail_when_content_dir_is_missing() {
    let temp = TempDir::new().unwrap();
    let sip = create_sip(temp.path(), "SIP_1", ABC_MD5);
    fs::remove_dir_all(sip.join("content")).unwrap();

    let error = repackage_sip(&sip).unwrap_err();

    assert_eq!(
        format!(
            "Could not make bag structure: Source package {} does not contain a content directory",
            sip.display()
        ),
        error.to_string()
    );
}

fn create_sip(base: &Path, name: &str, b_checksum: &str) -> PathBuf {
    let sip = base.join(name);
    write_file(&sip.join("content/DOS_01/a.txt"), "hello world\n");
    write_file(&sip.join("content/DOS_01/b.txt"), "abc");
    write_file(
        &sip.join("header/metadata.xml"),
        &format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<paket xmlns="http://bar.admin.ch/arelda/v4" schemaVersion="4.0">
  <paketTyp>SIP</paketTyp>
  <inhaltsverzeichnis>
    <ordner>
      <name>content</name>
      <ordner>
        <name>DOS_01</name>
        <datei id="DAT_1">
          <name>a.txt</name>
          <pruefalgorithmus>MD5</pruefalgorithmus>
          <pruefsumme>{}</pruefsumme>
        </datei>
        <datei id="DAT_2">
          <name>b.txt</name>
          <pruefalgorithmus>MD5</pruefalgorithmus>
          <pruefsumme>{}</pruefsumme>
        </datei>
      </ordner>
    </ordner>
  </inhaltsverzeichnis>
</paket>
"#,
            HELLO_MD5, b_checksum
        ),
    );
    sip
}

fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            files.push((
                entry.path().display().to_string(),
                fs::read(entry.path()).unwrap(),
            ));
        }
    }
    files
}

fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

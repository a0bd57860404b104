use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{info, warn};
use snafu::{ensure, ResultExt};
use walkdir::WalkDir;

use crate::bagit::consts::{BAGIT_TXT, DATA};
use crate::bagit::{
    open_bag, read_bag_declaration_file, write_bag_declaration, write_payload_manifest,
    BagDeclaration, DigestAlgorithm, HexDigest, ManifestEntry,
};
use crate::sip::error::*;
use crate::sip::metadata::{read_inventory, Inventory};

pub const CONTENT_DIR: &str = "content";
pub const HEADER_DIR: &str = "header";
pub const METADATA_XML: &str = "metadata.xml";
pub const BAG_SUFFIX: &str = "_bag";

const MANIFEST_ALGORITHM: DigestAlgorithm = DigestAlgorithm::Md5;

/// Options for `repackage_sip_with`. The defaults create `<sip>_bag` next to the SIP, write a
/// default `bagit.txt`, and use the current date and this tool as the bagging date and agent.
#[derive(Debug, Clone, Default)]
pub struct RepackageOptions {
    destination: Option<PathBuf>,
    bagit_template: Option<PathBuf>,
    bagging_date: Option<NaiveDate>,
    software_agent: Option<String>,
}

impl RepackageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the bag in `destination` instead of `<sip>_bag`
    pub fn with_destination<P: Into<PathBuf>>(mut self, destination: P) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Copies `bagit.txt` from the template instead of generating it. The template must be a
    /// valid BagIt 1.0 declaration.
    pub fn with_bagit_template<P: Into<PathBuf>>(mut self, template: P) -> Self {
        self.bagit_template = Some(template.into());
        self
    }

    pub fn with_bagging_date(mut self, bagging_date: Option<NaiveDate>) -> Self {
        self.bagging_date = bagging_date;
        self
    }

    pub fn with_software_agent(mut self, software_agent: Option<String>) -> Self {
        self.software_agent = software_agent;
        self
    }

    /// The directory the bag is created in for the given SIP
    pub fn destination_for<P: AsRef<Path>>(&self, sip_dir: P) -> PathBuf {
        self.destination
            .clone()
            .unwrap_or_else(|| default_bag_dir(sip_dir))
    }
}

/// The default bag location for a SIP: a sibling directory named `<sip>_bag`
pub fn default_bag_dir<P: AsRef<Path>>(sip_dir: P) -> PathBuf {
    let sip_dir = sip_dir.as_ref();
    match sip_dir.file_name() {
        Some(name) => sip_dir.with_file_name(format!("{}{BAG_SUFFIX}", name.to_string_lossy())),
        None => PathBuf::from(format!("{}{BAG_SUFFIX}", sip_dir.display())),
    }
}

/// Repackages the SIP in `sip_dir` as a bag in `<sip_dir>_bag` and returns the bag's path
pub fn repackage_sip<P: AsRef<Path>>(sip_dir: P) -> Result<PathBuf> {
    repackage_sip_with(sip_dir, &RepackageOptions::default())
}

/// Repackages the SIP in `sip_dir` as a bag and returns the bag's path.
///
/// The SIP's `content` and `header` directories are copied into the bag's payload, and the
/// payload manifest is written from the checksums declared in `header/metadata.xml` plus the
/// actual checksum of the metadata file. The bag is then validated, and only a valid bag is
/// finalized with its bag-info.txt and tag manifest. The SIP itself is never modified.
pub fn repackage_sip_with<P: AsRef<Path>>(
    sip_dir: P,
    options: &RepackageOptions,
) -> Result<PathBuf> {
    let sip_dir = sip_dir.as_ref();
    let bag_dir = options.destination_for(sip_dir);

    info!(
        "Repackaging SIP {} as bag {}",
        sip_dir.display(),
        bag_dir.display()
    );

    create_structure(sip_dir, &bag_dir, options.bagit_template.as_deref())
        .context(StructureSnafu)?;
    create_manifest(&bag_dir).context(ManifestSnafu)?;
    finalize_bag(&bag_dir, options).context(FinalizeSnafu)?;

    Ok(bag_dir)
}

fn create_structure(
    sip_dir: &Path,
    bag_dir: &Path,
    bagit_template: Option<&Path>,
) -> Result<(), StructureError> {
    for name in [CONTENT_DIR, HEADER_DIR] {
        ensure!(
            sip_dir.join(name).is_dir(),
            MissingSourceDirSnafu {
                path: sip_dir,
                name
            }
        );
    }

    ensure!(!bag_dir.exists(), DestinationExistsSnafu { path: bag_dir });

    let data_dir = bag_dir.join(DATA);
    info!("Creating {}", data_dir.display());
    fs::create_dir_all(&data_dir).context(CreateDirSnafu { path: &data_dir })?;

    for name in [CONTENT_DIR, HEADER_DIR] {
        copy_tree(&sip_dir.join(name), &data_dir.join(name))?;
    }

    let bagit_txt = bag_dir.join(BAGIT_TXT);
    match bagit_template {
        Some(template) => {
            read_bag_declaration_file(template).context(InvalidTemplateSnafu { path: template })?;
            copy_file(template, &bagit_txt)
        }
        None => write_bag_declaration(&BagDeclaration::new(), bag_dir)
            .context(WriteDeclarationSnafu),
    }
}

/// Recursively copies the directory `from` to `to`, which must not exist yet
fn copy_tree(from: &Path, to: &Path) -> Result<(), StructureError> {
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.context(WalkSourceSnafu { path: from })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).context(CreateDirSnafu { path: &target })?;
        } else if entry.file_type().is_file() {
            copy_file(entry.path(), &target)?;
        } else {
            return UnsupportedSourceFileSnafu { path: entry.path() }.fail();
        }
    }

    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> Result<(), StructureError> {
    info!("Copying {} to {}", from.display(), to.display());
    fs::copy(from, to)
        .map(|_| ())
        .context(CopyFileSnafu { from, to })
}

fn create_manifest(bag_dir: &Path) -> Result<(), ManifestError> {
    let metadata_rel = format!("{DATA}/{HEADER_DIR}/{METADATA_XML}");
    let metadata_path = bag_dir.join(DATA).join(HEADER_DIR).join(METADATA_XML);

    let inventory = read_inventory(&metadata_path).context(MetadataSnafu)?;
    let metadata_digest = MANIFEST_ALGORITHM
        .hash_file(&metadata_path)
        .context(DigestMetadataSnafu {
            path: &metadata_path,
        })?;

    let entries = manifest_entries(&metadata_rel, metadata_digest, &inventory);

    info!(
        "Writing {} declared checksums and the digest of {METADATA_XML} to the payload manifest",
        entries.len() - 1
    );

    write_payload_manifest(bag_dir, MANIFEST_ALGORITHM, &entries).context(WriteManifestSnafu)
}

/// The metadata file's own entry followed by the declared entries, in document order
fn manifest_entries(
    metadata_rel: &str,
    metadata_digest: HexDigest,
    inventory: &Inventory,
) -> Vec<ManifestEntry> {
    let mut entries = Vec::with_capacity(inventory.len() + 1);
    entries.push(ManifestEntry::new(metadata_rel, metadata_digest));

    for entry in inventory.entries() {
        let path = format!("{DATA}/{}", entry.path());
        if path == metadata_rel {
            warn!("Ignoring checksum that {METADATA_XML} declares for itself");
            continue;
        }
        entries.push(ManifestEntry::new(path, entry.checksum().clone()));
    }

    entries
}

fn finalize_bag(bag_dir: &Path, options: &RepackageOptions) -> Result<(), FinalizeError> {
    let bag = open_bag(bag_dir).context(OpenBagSnafu { path: bag_dir })?;
    let result = bag
        .validate(true)
        .context(ValidateBagSnafu { path: bag_dir })?;

    if !result.is_valid() {
        return InvalidBagSnafu {
            path: bag_dir,
            issues: result
                .errors()
                .map(|issue| issue.message().to_string())
                .collect::<Vec<String>>(),
        }
        .fail();
    }

    bag.update()
        .with_algorithms(&[MANIFEST_ALGORITHM])
        .with_bagging_date(
            options
                .bagging_date
                .map(|date| date.format("%Y-%m-%d").to_string()),
        )
        .with_software_agent(options.software_agent.clone())
        .finalize()
        .context(SaveBagSnafu { path: bag_dir })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::bagit::HexDigest;
    use crate::sip::metadata::parse_inventory;
    use crate::sip::repackage::{default_bag_dir, manifest_entries};

    #[test]
    fn metadata_entry_comes_first_and_is_not_declared_twice() {
        let inventory = parse_inventory(
            r#"<paket xmlns="http://bar.admin.ch/arelda/v4"><inhaltsverzeichnis>
  <ordner><name>header</name>
    <datei id="m"><name>metadata.xml</name><pruefsumme>11111111111111111111111111111111</pruefsumme></datei>
  </ordner>
  <ordner><name>content</name>
    <datei id="a"><name>a.txt</name><pruefsumme>22222222222222222222222222222222</pruefsumme></datei>
    <datei id="b"><name>b.txt</name><pruefsumme>33333333333333333333333333333333</pruefsumme></datei>
  </ordner>
</inhaltsverzeichnis></paket>"#,
        )
        .unwrap();

        let entries = manifest_entries(
            "data/header/metadata.xml",
            HexDigest::from("44444444444444444444444444444444"),
            &inventory,
        );

        let lines: Vec<String> = entries
            .iter()
            .map(|e| format!("{}  {}", e.digest(), e.path()))
            .collect();
        assert_eq!(
            vec![
                "44444444444444444444444444444444  data/header/metadata.xml",
                "22222222222222222222222222222222  data/content/a.txt",
                "33333333333333333333333333333333  data/content/b.txt",
            ],
            lines
        );
    }

    #[test]
    fn bag_dir_is_a_sibling_of_the_sip() {
        assert_eq!(PathBuf::from("sip_bag"), default_bag_dir("sip"));
        assert_eq!(PathBuf::from("fixtures/sip_bag"), default_bag_dir("fixtures/sip"));
        assert_eq!(PathBuf::from("fixtures/sip_bag"), default_bag_dir("fixtures/sip/"));
        assert_eq!(PathBuf::from("/tmp/a/SIP_1_bag"), default_bag_dir("/tmp/a/SIP_1"));
    }
}

use chrono::Local;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use regex::{Captures, Regex};
use snafu::ResultExt;
use walkdir::{DirEntry, WalkDir};

use crate::bagit::consts::*;
use crate::bagit::digest::{digest_file, DigestAlgorithm, HexDigest};
use crate::bagit::error::Error::*;
use crate::bagit::error::*;
use crate::bagit::manifest::{write_manifest, ManifestEntry};
use crate::bagit::tag::{read_bag_declaration, read_bag_info, write_bag_info, BagInfo};
use crate::bagit::validate;
use crate::bagit::validate::ValidationResult;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BagItVersion {
    major: u8,
    minor: u8,
}

#[derive(Debug)]
pub struct Bag {
    base_dir: PathBuf,
    bag_info: BagInfo,
    algorithms: Vec<DigestAlgorithm>,
}

#[derive(Debug)]
pub struct BagUpdater {
    bag: Bag,
    algorithms: Vec<DigestAlgorithm>,
    bagging_date: Option<String>,
    software_agent: Option<String>,
}

/// A file within a bag, identified by its `/` separated path relative to the bag's base directory
#[derive(Debug)]
pub(crate) struct FileMeta {
    pub path: String,
    pub size_bytes: u64,
    pub digests: HashMap<DigestAlgorithm, HexDigest>,
}

/// Opens a BagIt bag that already exists in the specified directory
pub fn open_bag<P: AsRef<Path>>(base_dir: P) -> Result<Bag> {
    let base_dir = base_dir.as_ref();
    info!("Opening bag at {}", base_dir.display());

    read_bag_declaration(base_dir)?;
    let algorithms = detect_digest_algorithms(base_dir)?;

    let bag_info = read_bag_info(base_dir)?;

    Ok(Bag::new(base_dir, bag_info, algorithms))
}

/// Validates the bag at the specified path. If `integrity_check` is `true` then the checksums of
/// all of the files in the bag will be verified. Otherwise, the bag is only evaluated based on
/// whether it is complete.
pub fn validate_bag<P: AsRef<Path>>(
    base_dir: P,
    integrity_check: bool,
) -> Result<ValidationResult> {
    info!("Validating bag at {}", base_dir.as_ref().display());
    validate::validate_bag(base_dir, integrity_check)
}

/// Writes a payload manifest containing exactly the given entries, in order. Used when the
/// digests are already known, for example when they are declared in package metadata.
pub fn write_payload_manifest<P: AsRef<Path>>(
    base_dir: P,
    algorithm: DigestAlgorithm,
    entries: &[ManifestEntry],
) -> Result<()> {
    write_manifest(base_dir, PAYLOAD_MANIFEST_PREFIX, algorithm, entries)
}

impl BagItVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl Display for BagItVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl TryFrom<&String> for BagItVersion {
    type Error = Error;

    fn try_from(value: &String) -> std::result::Result<Self, Self::Error> {
        let invalid = || InvalidBagItVersion {
            value: value.into(),
        };

        if let Some((major, minor)) = value.trim().split_once('.') {
            let major = major.parse::<u8>().map_err(|_| invalid())?;
            let minor = minor.parse::<u8>().map_err(|_| invalid())?;
            Ok(BagItVersion::new(major, minor))
        } else {
            Err(invalid())
        }
    }
}

impl Bag {
    pub fn new<P: AsRef<Path>>(
        base_dir: P,
        bag_info: BagInfo,
        algorithms: Vec<DigestAlgorithm>,
    ) -> Self {
        Self {
            base_dir: base_dir.as_ref().into(),
            bag_info,
            algorithms,
        }
    }

    /// The algorithms of the payload manifests that were present when the bag was opened
    pub fn algorithms(&self) -> &[DigestAlgorithm] {
        &self.algorithms
    }

    /// Validates the bag as it currently exists on disk
    pub fn validate(&self, integrity_check: bool) -> Result<ValidationResult> {
        validate_bag(&self.base_dir, integrity_check)
    }

    /// Creates a `BagUpdater` that's used to update an existing bag
    pub fn update(self) -> BagUpdater {
        BagUpdater::new(self)
    }
}

impl BagUpdater {
    pub fn new(bag: Bag) -> Self {
        Self {
            bag,
            algorithms: Vec::new(),
            bagging_date: None,
            software_agent: None,
        }
    }

    /// Sets the algorithms to use when calculating manifests. An empty slice will result in
    /// the algorithms that were used to calculate the existing manifests to be used.
    pub fn with_algorithms(mut self, algorithms: &[DigestAlgorithm]) -> Self {
        self.algorithms.clear();
        self.algorithms.extend_from_slice(algorithms);
        self
    }

    /// Sets the Bagging-Date to add to bag-info.txt. None for the default value.
    pub fn with_bagging_date(mut self, bagging_date: Option<String>) -> Self {
        self.bagging_date = bagging_date;
        self
    }

    /// Sets the Bag-Software-Agent to add to bag-info.txt. None for the default value.
    pub fn with_software_agent(mut self, software_agent: Option<String>) -> Self {
        self.software_agent = software_agent;
        self
    }

    /// Writes bag-info.txt, regenerates the payload manifests from the payload files, and
    /// writes the tag manifests.
    pub fn finalize(mut self) -> Result<Bag> {
        let base_dir = self.bag.base_dir.clone();

        let algorithms = if self.algorithms.is_empty() {
            defaulted_algorithms(&self.bag.algorithms)
        } else {
            defaulted_algorithms(&self.algorithms)
        };

        self.bag
            .bag_info
            .add_bagging_date(self.bagging_date.unwrap_or_else(current_date_str));
        self.bag
            .bag_info
            .add_software_agent(self.software_agent.unwrap_or_else(software_agent));

        delete_payload_manifests(&base_dir)?;
        let payload_meta = update_payload_manifests(&base_dir, &algorithms)?;

        self.bag
            .bag_info
            .add_payload_oxum(build_payload_oxum(&payload_meta));

        write_bag_info(&self.bag.bag_info, &base_dir)?;

        delete_tag_manifests(&base_dir)?;
        update_tag_manifests(&base_dir, &algorithms)?;

        self.bag.algorithms = algorithms;

        Ok(self.bag)
    }
}

/// Calculates the digests for all of the payload files in the bag and writes the manifests
fn update_payload_manifests<P: AsRef<Path>>(
    base_dir: P,
    algorithms: &[DigestAlgorithm],
) -> Result<Vec<FileMeta>> {
    let base_dir = base_dir.as_ref();
    let mut meta = calculate_digests(base_dir, DATA, algorithms, |_| true)?;

    write_manifests(algorithms, &mut meta, PAYLOAD_MANIFEST_PREFIX, base_dir)?;

    Ok(meta)
}

/// Calculates the digests for all of the tag files in the bag and writes the tag manifests
fn update_tag_manifests<P: AsRef<Path>>(base_dir: P, algorithms: &[DigestAlgorithm]) -> Result<()> {
    let base_dir = base_dir.as_ref();
    let mut meta = calculate_digests(base_dir, "", algorithms, |f| {
        // Skip the data directory and all tag manifests
        !(f.depth() == 1 && f.file_name() == DATA)
            && f.file_name()
                .to_str()
                .map(|n| !TAG_MANIFEST_MATCHER.is_match(n))
                .unwrap_or(true)
    })?;
    write_manifests(algorithms, &mut meta, TAG_MANIFEST_PREFIX, base_dir)
}

/// Calculates the digests for all of the files under `base_dir/sub_dir`. The paths of the
/// returned files are relative to `base_dir`.
pub(crate) fn calculate_digests<D, P>(
    base_dir: D,
    sub_dir: &str,
    algorithms: &[DigestAlgorithm],
    predicate: P,
) -> Result<Vec<FileMeta>>
where
    D: AsRef<Path>,
    P: FnMut(&DirEntry) -> bool,
{
    let base_dir = base_dir.as_ref();
    let mut file_meta = Vec::new();

    for file in WalkDir::new(base_dir.join(sub_dir))
        .into_iter()
        .filter_entry(predicate)
    {
        let file = file.context(WalkFileSnafu {})?;

        if file.file_type().is_file() {
            let metadata = file.metadata().context(WalkFileSnafu {})?;

            let digests = if algorithms.is_empty() {
                HashMap::new()
            } else {
                info!("Calculating digests for {}", file.path().display());
                digest_file(file.path(), algorithms)?
            };

            file_meta.push(FileMeta {
                path: relative_path(base_dir, file.path())?,
                size_bytes: metadata.len(),
                digests,
            });
        } else if !file.file_type().is_dir() {
            return Err(UnsupportedFile {
                path: file.path().to_path_buf(),
            });
        }
    }

    Ok(file_meta)
}

fn write_manifests<P: AsRef<Path>>(
    algorithms: &[DigestAlgorithm],
    file_meta: &mut [FileMeta],
    prefix: &str,
    base_dir: P,
) -> Result<()> {
    let base_dir = base_dir.as_ref();

    // Sort files so that they're written to the manifest deterministically
    file_meta.sort_by(|a, b| a.path.cmp(&b.path));

    for algorithm in algorithms {
        let entries: Vec<ManifestEntry> = file_meta
            .iter()
            .filter_map(|meta| {
                meta.digests
                    .get(algorithm)
                    .map(|digest| ManifestEntry::new(meta.path.as_str(), digest.clone()))
            })
            .collect();
        write_manifest(base_dir, prefix, *algorithm, &entries)?;
    }

    Ok(())
}

/// Returns the `/` separated path of `path` relative to `base_dir`
pub(crate) fn relative_path(base_dir: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(base_dir).unwrap_or(path);
    let relative = relative.to_str().ok_or_else(|| InvalidUtf8Path {
        path: path.to_path_buf(),
    })?;
    Ok(convert_path_separator(relative).into_owned())
}

/// Deletes all payload manifests in the base directory
fn delete_payload_manifests<P: AsRef<Path>>(base_dir: P) -> Result<()> {
    delete_matching_files(base_dir, &PAYLOAD_MANIFEST_MATCHER)
}

/// Deletes all tag manifests in the base directory
fn delete_tag_manifests<P: AsRef<Path>>(base_dir: P) -> Result<()> {
    delete_matching_files(base_dir, &TAG_MANIFEST_MATCHER)
}

fn delete_matching_files<P: AsRef<Path>>(base_dir: P, file_regex: &Regex) -> Result<()> {
    for_matching_files(base_dir, file_regex, |path, _| {
        info!("Deleting file {}", path.display());
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                error!("Failed to delete file {}", path.display())
            }
        }
    })
}

pub(crate) fn detect_digest_algorithms<P: AsRef<Path>>(
    base_dir: P,
) -> Result<Vec<DigestAlgorithm>> {
    let mut algorithms = Vec::new();

    for_matching_files(base_dir, &PAYLOAD_MANIFEST_MATCHER, |_, captures| {
        let algorithm_str = &captures[1];
        match algorithm_str.parse() {
            Ok(algorithm) => algorithms.push(algorithm),
            Err(_) => warn!("Detected unsupported digest algorithm: {algorithm_str}"),
        }
    })?;

    algorithms.sort();
    Ok(algorithms)
}

/// Iterates the files in a directory and applies `on_match` to the ones with file names that match
/// `file_regex`. `on_match` receives the path to the matched file as well as the captures from the
/// match.
pub(crate) fn for_matching_files<P, M>(
    base_dir: P,
    file_regex: &Regex,
    mut on_match: M,
) -> Result<()>
where
    P: AsRef<Path>,
    M: FnMut(&Path, &Captures),
{
    let base_dir = base_dir.as_ref();

    for file in fs::read_dir(base_dir).context(IoReadDirSnafu { path: base_dir })? {
        let file = file.context(IoReadDirSnafu { path: base_dir })?;
        if file
            .file_type()
            .context(IoStatSnafu { path: file.path() })?
            .is_file()
        {
            if let Some(file_name) = file.file_name().to_str() {
                if let Some(captures) = file_regex.captures(file_name) {
                    on_match(&file.path(), &captures);
                }
            }
        }
    }

    Ok(())
}

/// If the input is empty a new vec with the default algorithm is returned. Otherwise, the input
/// is deduped and a new vec is returned.
fn defaulted_algorithms(algorithms: &[DigestAlgorithm]) -> Vec<DigestAlgorithm> {
    if algorithms.is_empty() {
        vec![DEFAULT_ALGORITHM]
    } else {
        let mut new = Vec::from(algorithms);
        new.sort();
        new.dedup();
        new
    }
}

pub(crate) fn build_payload_oxum(file_meta: &[FileMeta]) -> String {
    let count = file_meta.len();
    let sum: u64 = file_meta.iter().map(|meta| meta.size_bytes).sum();
    format!("{sum}.{count}")
}

fn software_agent() -> String {
    format!("{SOFTWARE_NAME} v{SOFTWARE_VERSION}")
}

fn current_date_str() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(target_os = "windows")]
fn convert_path_separator(path: &str) -> Cow<str> {
    if path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        path.into()
    }
}

#[cfg(not(target_os = "windows"))]
fn convert_path_separator(path: &str) -> Cow<str> {
    path.into()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::bagit::bag::{open_bag, BagItVersion};
    use crate::bagit::digest::DigestAlgorithm;
    use crate::bagit::tag::{write_bag_declaration, BagDeclaration};

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn parse_bagit_versions() {
        assert_eq!(
            BagItVersion::new(1, 0),
            BagItVersion::try_from(&"1.0".to_string()).unwrap()
        );
        assert_eq!("0.97", BagItVersion::new(0, 97).to_string());
        assert!(BagItVersion::try_from(&"1".to_string()).is_err());
        assert!(BagItVersion::try_from(&"a.b".to_string()).is_err());
    }

    #[test]
    fn finalize_writes_manifests_and_bag_info() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        write_bag_declaration(&BagDeclaration::new(), base).unwrap();
        write(&base.join("data/b.txt"), "hello world");
        write(&base.join("data/sub/a.txt"), "abc");

        let bag = open_bag(base)
            .unwrap()
            .update()
            .with_algorithms(&[DigestAlgorithm::Md5])
            .with_bagging_date(Some("2022-02-22".to_string()))
            .with_software_agent(Some("tester".to_string()))
            .finalize()
            .unwrap();

        assert_eq!(&[DigestAlgorithm::Md5], bag.algorithms());
        assert_eq!(
            "5eb63bbbe01eeed093cb22bb8f5acdc3  data/b.txt\n\
             900150983cd24fb0d6963f7d28e17f72  data/sub/a.txt\n",
            fs::read_to_string(base.join("manifest-md5.txt")).unwrap()
        );
        assert_eq!(
            "Bagging-Date: 2022-02-22\nBag-Software-Agent: tester\nPayload-Oxum: 14.2\n",
            fs::read_to_string(base.join("bag-info.txt")).unwrap()
        );

        let tag_manifest = fs::read_to_string(base.join("tagmanifest-md5.txt")).unwrap();
        let tag_files: Vec<&str> = tag_manifest
            .lines()
            .map(|line| line.split_once("  ").unwrap().1)
            .collect();
        assert_eq!(vec!["bag-info.txt", "bagit.txt", "manifest-md5.txt"], tag_files);

        assert!(bag.validate(true).unwrap().is_valid());
    }

    #[test]
    fn finalize_replaces_existing_payload_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        write_bag_declaration(&BagDeclaration::new(), base).unwrap();
        write(&base.join("data/a.txt"), "abc");
        write(
            &base.join("manifest-md5.txt"),
            "00000000000000000000000000000000  data/a.txt\n\
             00000000000000000000000000000000  data/gone.txt\n",
        );
        write(
            &base.join("manifest-sha256.txt"),
            "0000000000000000000000000000000000000000000000000000000000000000  data/a.txt\n",
        );

        let bag = open_bag(base)
            .unwrap()
            .update()
            .with_algorithms(&[DigestAlgorithm::Md5])
            .finalize()
            .unwrap();

        assert_eq!(
            "900150983cd24fb0d6963f7d28e17f72  data/a.txt\n",
            fs::read_to_string(base.join("manifest-md5.txt")).unwrap()
        );
        assert!(!base.join("manifest-sha256.txt").exists());
        assert!(bag.validate(true).unwrap().is_valid());
    }
}

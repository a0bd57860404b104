use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::Path;

use log::{info, warn};

use crate::bagit::bag::{
    build_payload_oxum, calculate_digests, detect_digest_algorithms, for_matching_files, FileMeta,
};
use crate::bagit::consts::*;
use crate::bagit::digest::{digest_file, DigestAlgorithm, HexDigest};
use crate::bagit::error::*;
use crate::bagit::manifest::{manifest_name, read_manifest, ManifestEntry};
use crate::bagit::tag::{read_bag_declaration, read_bag_info, BagDeclaration};
use crate::bagit::Error::*;

#[derive(Debug)]
pub struct ValidationResult {
    verdict: ValidationVerdict,
    issues: Vec<ValidationIssue>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ValidationVerdict {
    Valid,
    Complete,
    Invalid,
}

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    level: IssueLevel,
    message: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IssueLevel {
    Error,
    Warn,
}

/// A manifest that was read successfully, along with the files it lists
struct ReadManifest {
    name: String,
    algorithm: DigestAlgorithm,
    entries: Vec<ManifestEntry>,
}

/// Validates the bag at the specified path. If `integrity_check` is `true` then the checksums of
/// all of the files in the bag will be verified. Otherwise, the bag is only evaluated based on
/// whether it is complete.
///
/// A bag is complete when:
///
/// - bagit.txt is present and declares BagIt 1.0 with UTF-8 tag files
/// - the data directory is present
/// - there is at least one payload manifest with a supported algorithm
/// - every payload file is listed in every payload manifest
/// - every file listed in a manifest exists, and payload manifests only list payload files
/// - tag manifests only list tag files
/// - the Payload-Oxum in bag-info.txt, if present, matches the payload
///
/// A bag is valid when it is complete and every checksum in every manifest matches.
pub fn validate_bag<P: AsRef<Path>>(
    base_dir: P,
    integrity_check: bool,
) -> Result<ValidationResult> {
    let base_dir = base_dir.as_ref();
    let mut result = if integrity_check {
        ValidationResult::new_valid()
    } else {
        ValidationResult::new_complete()
    };

    // cannot continue without a valid declaration because we wouldn't know
    // what version to validate against
    if read_and_validate_declaration(base_dir, &mut result)?.is_none() {
        return Ok(result);
    }

    let data_dir = base_dir.join(DATA);
    if !data_dir.is_dir() {
        result.add_error(format!("{DATA} directory does not exist"));
        return Ok(result);
    }

    let payload = match calculate_digests(base_dir, DATA, &[], |_| true) {
        Ok(payload) => payload,
        Err(UnsupportedFile { path }) => {
            result.add_error(format!(
                "Payload contains unsupported file type at {}",
                path.display()
            ));
            return Ok(result);
        }
        Err(e) => return Err(e),
    };

    let payload_manifests = read_payload_manifests(base_dir, &mut result)?;
    check_payload_completeness(base_dir, &payload, &payload_manifests, &mut result);

    let tag_manifests = read_tag_manifests(base_dir, &mut result)?;
    check_tag_manifests(base_dir, &tag_manifests, &mut result);

    check_bag_info(base_dir, &payload, &mut result)?;

    if integrity_check {
        let manifests: Vec<&ReadManifest> =
            payload_manifests.iter().chain(tag_manifests.iter()).collect();
        check_integrity(base_dir, &manifests, &mut result)?;
    }

    Ok(result)
}

impl ValidationResult {
    pub fn new_valid() -> Self {
        Self {
            verdict: ValidationVerdict::Valid,
            issues: Vec::new(),
        }
    }

    pub fn new_complete() -> Self {
        Self {
            verdict: ValidationVerdict::Complete,
            issues: Vec::new(),
        }
    }

    pub fn verdict(&self) -> ValidationVerdict {
        self.verdict
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// True when the bag is complete and, if an integrity check was requested, all of its
    /// checksums match
    pub fn is_valid(&self) -> bool {
        self.verdict == ValidationVerdict::Valid
    }

    pub fn is_complete(&self) -> bool {
        self.verdict != ValidationVerdict::Invalid
    }

    pub fn invalid(&mut self) {
        self.verdict = ValidationVerdict::Invalid;
    }

    /// Records an error and marks the bag invalid
    pub fn add_error<S: AsRef<str>>(&mut self, message: S) {
        self.invalid();
        self.error(message);
    }

    pub fn error<S: AsRef<str>>(&mut self, message: S) {
        info!("Validation error: {}", message.as_ref());
        self.issues.push(ValidationIssue::error(message));
    }

    pub fn warn<S: AsRef<str>>(&mut self, message: S) {
        warn!("{}", message.as_ref());
        self.issues.push(ValidationIssue::warn(message));
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.level == IssueLevel::Error)
    }
}

impl ValidationIssue {
    pub fn error<S: AsRef<str>>(message: S) -> Self {
        Self {
            level: IssueLevel::Error,
            message: message.as_ref().into(),
        }
    }

    pub fn warn<S: AsRef<str>>(message: S) -> Self {
        Self {
            level: IssueLevel::Warn,
            message: message.as_ref().into(),
        }
    }

    pub fn level(&self) -> IssueLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.level {
            IssueLevel::Error => write!(f, "[ERROR] {}", self.message),
            IssueLevel::Warn => write!(f, "[WARN] {}", self.message),
        }
    }
}

fn read_and_validate_declaration<P: AsRef<Path>>(
    base_dir: P,
    result: &mut ValidationResult,
) -> Result<Option<BagDeclaration>> {
    fn add_error(result: &mut ValidationResult, message: String) -> Result<Option<BagDeclaration>> {
        result.add_error(message);
        Ok(None)
    }

    match read_bag_declaration(base_dir) {
        Ok(declaration) => Ok(Some(declaration)),
        Err(IoRead { source, path }) => match source.kind() {
            ErrorKind::NotFound => add_error(result, format!("{} does not exist", BAGIT_TXT)),
            ErrorKind::PermissionDenied => {
                add_error(result, format!("{} cannot be read", BAGIT_TXT))
            }
            _ => Err(IoRead { source, path }),
        },
        Err(InvalidTagLine { details, num, .. }) => add_error(
            result,
            format!("Tag {} in {} is invalid: {}", num, BAGIT_TXT, details),
        ),
        Err(MissingTag { tag }) => add_error(
            result,
            format!("{} is missing required tag '{}'", BAGIT_TXT, tag),
        ),
        Err(InvalidBagItVersion { value }) => add_error(
            result,
            format!(
                "{} contains an invalid {}: {}",
                BAGIT_TXT, LABEL_BAGIT_VERSION, value
            ),
        ),
        Err(UnsupportedVersion { version }) => add_error(
            result,
            format!(
                "{} declares unsupported {}: {}",
                BAGIT_TXT, LABEL_BAGIT_VERSION, version
            ),
        ),
        Err(UnsupportedEncoding { encoding }) => add_error(
            result,
            format!(
                "{} contains an invalid {}: {}",
                BAGIT_TXT, LABEL_FILE_ENCODING, encoding
            ),
        ),
        Err(InvalidString { .. }) => {
            add_error(result, format!("{} is not valid UTF-8", BAGIT_TXT))
        }
        Err(e) => Err(e),
    }
}

fn read_payload_manifests(
    base_dir: &Path,
    result: &mut ValidationResult,
) -> Result<Vec<ReadManifest>> {
    let algorithms = detect_digest_algorithms(base_dir)?;

    if algorithms.is_empty() {
        result.add_error("Bag does not contain a payload manifest with a supported algorithm");
        return Ok(Vec::new());
    }

    read_manifests(base_dir, PAYLOAD_MANIFEST_PREFIX, &algorithms, result)
}

fn read_tag_manifests(base_dir: &Path, result: &mut ValidationResult) -> Result<Vec<ReadManifest>> {
    let mut algorithms = Vec::new();
    let mut unsupported = Vec::new();

    for_matching_files(base_dir, &TAG_MANIFEST_MATCHER, |_, captures| {
        match captures[1].parse::<DigestAlgorithm>() {
            Ok(algorithm) => algorithms.push(algorithm),
            Err(_) => unsupported.push(captures[0].to_string()),
        }
    })?;

    for name in unsupported {
        result.warn(format!("Ignoring tag manifest {name} with an unsupported algorithm"));
    }

    algorithms.sort();
    read_manifests(base_dir, TAG_MANIFEST_PREFIX, &algorithms, result)
}

fn read_manifests(
    base_dir: &Path,
    prefix: &str,
    algorithms: &[DigestAlgorithm],
    result: &mut ValidationResult,
) -> Result<Vec<ReadManifest>> {
    let mut manifests = Vec::with_capacity(algorithms.len());

    for algorithm in algorithms {
        let name = manifest_name(prefix, *algorithm);

        match read_manifest(base_dir.join(&name), *algorithm) {
            Ok(entries) => {
                let mut seen = HashSet::with_capacity(entries.len());
                for entry in &entries {
                    if !seen.insert(entry.path()) {
                        result.add_error(format!(
                            "{} is listed more than once in {name}",
                            entry.path()
                        ));
                    }
                }
                manifests.push(ReadManifest {
                    name,
                    algorithm: *algorithm,
                    entries,
                });
            }
            Err(InvalidManifestLine { num, details, .. }) => {
                result.add_error(format!("Line {num} in {name} is invalid: {details}"));
            }
            Err(InvalidString { .. }) => {
                result.add_error(format!("{name} is not valid UTF-8"));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(manifests)
}

fn check_payload_completeness(
    base_dir: &Path,
    payload: &[FileMeta],
    manifests: &[ReadManifest],
    result: &mut ValidationResult,
) {
    let payload_paths: HashSet<&str> = payload.iter().map(|meta| meta.path.as_str()).collect();
    let data_prefix = format!("{DATA}/");

    for manifest in manifests {
        let listed: HashSet<&str> = manifest.entries.iter().map(|e| e.path()).collect();

        for entry in &manifest.entries {
            if !entry.path().starts_with(&data_prefix) {
                result.add_error(format!(
                    "{} lists {}, which is outside of the payload directory",
                    manifest.name,
                    entry.path()
                ));
            } else if !payload_paths.contains(entry.path()) {
                let kind = if base_dir.join(entry.path()).is_dir() {
                    "is a directory"
                } else {
                    "does not exist"
                };
                result.add_error(format!(
                    "{} lists {}, which {kind}",
                    manifest.name,
                    entry.path()
                ));
            }
        }

        let mut missing: Vec<&&str> = payload_paths
            .iter()
            .filter(|path| !listed.contains(**path))
            .collect();
        missing.sort();

        for path in missing {
            result.add_error(format!("{path} is not listed in {}", manifest.name));
        }
    }
}

fn check_tag_manifests(base_dir: &Path, manifests: &[ReadManifest], result: &mut ValidationResult) {
    let data_prefix = format!("{DATA}/");

    for manifest in manifests {
        for entry in &manifest.entries {
            let path = entry.path();
            let file_name = path.rsplit('/').next().unwrap_or(path);

            if path.starts_with(&data_prefix) {
                result.add_error(format!(
                    "{} lists payload file {path}",
                    manifest.name
                ));
            } else if TAG_MANIFEST_MATCHER.is_match(file_name) && !path.contains('/') {
                result.add_error(format!(
                    "{} lists tag manifest {path}",
                    manifest.name
                ));
            } else if !base_dir.join(path).is_file() {
                result.add_error(format!(
                    "{} lists {path}, which does not exist",
                    manifest.name
                ));
            }
        }
    }
}

fn check_bag_info(
    base_dir: &Path,
    payload: &[FileMeta],
    result: &mut ValidationResult,
) -> Result<()> {
    let bag_info = match read_bag_info(base_dir) {
        Ok(bag_info) => bag_info,
        Err(InvalidTagLine { num, details, .. }) => {
            result.add_error(format!("Tag {num} in {BAG_INFO_TXT} is invalid: {details}"));
            return Ok(());
        }
        Err(InvalidString { .. }) => {
            result.add_error(format!("{BAG_INFO_TXT} is not valid UTF-8"));
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if let Some(oxum) = bag_info.payload_oxum() {
        let actual = build_payload_oxum(payload);
        if !is_valid_oxum(oxum) {
            result.add_error(format!(
                "{BAG_INFO_TXT} contains an invalid {LABEL_PAYLOAD_OXUM}: {oxum}"
            ));
        } else if oxum.trim() != actual {
            result.add_error(format!(
                "{LABEL_PAYLOAD_OXUM} {oxum} does not match the payload, which is {actual}"
            ));
        }
    }

    Ok(())
}

fn is_valid_oxum(oxum: &str) -> bool {
    oxum.trim()
        .split_once('.')
        .map(|(bytes, count)| bytes.parse::<u64>().is_ok() && count.parse::<u64>().is_ok())
        .unwrap_or(false)
}

fn check_integrity(
    base_dir: &Path,
    manifests: &[&ReadManifest],
    result: &mut ValidationResult,
) -> Result<()> {
    // path -> expected digests, so that every file is only read once
    let mut expected: BTreeMap<&str, Vec<(&str, DigestAlgorithm, &HexDigest)>> = BTreeMap::new();

    for manifest in manifests {
        for entry in &manifest.entries {
            expected.entry(entry.path()).or_default().push((
                manifest.name.as_str(),
                manifest.algorithm,
                entry.digest(),
            ));
        }
    }

    for (path, expectations) in expected {
        let file = base_dir.join(path);
        if !file.is_file() {
            // already reported as missing
            continue;
        }

        let mut algorithms: Vec<DigestAlgorithm> =
            expectations.iter().map(|(_, algorithm, _)| *algorithm).collect();
        algorithms.sort();
        algorithms.dedup();

        let actual: HashMap<DigestAlgorithm, HexDigest> = digest_file(&file, &algorithms)?;

        for (manifest_name, algorithm, digest) in expectations {
            if actual.get(&algorithm) != Some(digest) {
                result.add_error(format!(
                    "{path} failed {algorithm} checksum verification in {manifest_name}: expected {digest}",
                ));
            }
        }
    }

    Ok(())
}

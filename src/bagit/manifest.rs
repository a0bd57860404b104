use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use snafu::ResultExt;

use crate::bagit::digest::{DigestAlgorithm, HexDigest};
use crate::bagit::encoding::{percent_decode, percent_encode};
use crate::bagit::error::Error::InvalidManifestLine;
use crate::bagit::error::*;
use crate::bagit::io::{is_space_or_tab, LineReader};

/// A single `<digest>  <path>` line of a payload or tag manifest. The path is relative to the
/// bag's base directory, uses `/` as its separator, and is not percent encoded.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ManifestEntry {
    path: String,
    digest: HexDigest,
}

impl ManifestEntry {
    pub fn new<S: Into<String>, D: Into<HexDigest>>(path: S, digest: D) -> Self {
        Self {
            path: path.into(),
            digest: digest.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn digest(&self) -> &HexDigest {
        &self.digest
    }
}

/// The name of the manifest file for the given prefix and algorithm, eg `manifest-md5.txt`
pub fn manifest_name(prefix: &str, algorithm: DigestAlgorithm) -> String {
    format!("{prefix}-{algorithm}.txt")
}

/// Writes the entries to `<base_dir>/<prefix>-<algorithm>.txt` in the order they are given
pub fn write_manifest<P: AsRef<Path>>(
    base_dir: P,
    prefix: &str,
    algorithm: DigestAlgorithm,
    entries: &[ManifestEntry],
) -> Result<()> {
    let manifest = base_dir.as_ref().join(manifest_name(prefix, algorithm));
    info!("Writing manifest {}", manifest.display());

    let file = File::create(&manifest).context(IoCreateSnafu { path: &manifest })?;
    let mut writer = BufWriter::new(file);

    for entry in entries {
        writeln!(writer, "{}  {}", entry.digest, percent_encode(&entry.path))
            .context(IoWriteSnafu { path: &manifest })?;
    }

    writer.flush().context(IoWriteSnafu { path: &manifest })
}

/// Reads all of the entries out of the manifest at `path`. Blank lines are skipped. Paths may
/// be prefixed with `./`, which is stripped.
pub fn read_manifest<P: AsRef<Path>>(
    path: P,
    algorithm: DigestAlgorithm,
) -> Result<Vec<ManifestEntry>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path).context(IoReadSnafu { path })?);
    let mut entries = Vec::new();

    for line in LineReader::new(reader) {
        let (num, line) = line?;

        if line.trim().is_empty() {
            continue;
        }

        let invalid = |details: String| InvalidManifestLine {
            path: path.to_path_buf(),
            num,
            details,
        };

        let (digest, file) = line
            .split_once(is_space_or_tab)
            .ok_or_else(|| invalid("missing file path".to_string()))?;
        let file = file.trim_start_matches(is_space_or_tab);

        if !HexDigest::is_valid_for(digest, algorithm) {
            return Err(invalid(format!("invalid {algorithm} digest '{digest}'")));
        }
        if file.is_empty() {
            return Err(invalid("missing file path".to_string()));
        }

        let decoded = percent_decode(file.strip_prefix("./").unwrap_or(file)).into_owned();

        if decoded.starts_with('/')
            || decoded
                .split('/')
                .any(|part| part == ".." || part == "." || part.is_empty())
        {
            return Err(invalid(format!("path '{file}' is not a normalized relative path")));
        }

        entries.push(ManifestEntry::new(decoded, digest));
    }

    Ok(entries)
}

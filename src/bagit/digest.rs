use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use blake2::Blake2b512;
use digest::DynDigest;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use snafu::ResultExt;
use strum_macros::{Display as EnumDisplay, EnumString};

use crate::bagit::consts::BUF_SIZE;
use crate::bagit::error::*;

/// Digest algorithms that may appear in payload and tag manifest file names
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, EnumDisplay, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Blake2b512,
}

/// Lower case hex encoded digest
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct HexDigest(String);

/// Writer that calculates digests for all of the configured algorithms while passing the bytes
/// through to the wrapped writer
pub struct MultiDigestWriter<W: Write> {
    digests: Vec<(DigestAlgorithm, Box<dyn DynDigest>)>,
    inner: W,
}

impl DigestAlgorithm {
    /// Parses an algorithm name as it appears in a manifest file name, or in other metadata that
    /// uses upper case names such as `MD5` or `SHA-256`
    pub fn parse_lenient(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "");
        DigestAlgorithm::from_str(&normalized).ok()
    }

    /// The length of the hex encoded digest
    pub fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 32,
            DigestAlgorithm::Sha1 => 40,
            DigestAlgorithm::Sha256 => 64,
            DigestAlgorithm::Sha512 | DigestAlgorithm::Blake2b512 => 128,
        }
    }

    /// Calculates the digest of the file at `path` with this algorithm
    pub fn hash_file<P: AsRef<Path>>(&self, path: P) -> Result<HexDigest> {
        let path = path.as_ref();
        let mut digest = self.new_digest();
        let mut reader = File::open(path).context(IoReadSnafu { path })?;
        let mut buf = [0; BUF_SIZE];

        loop {
            let read = reader.read(&mut buf).context(IoReadSnafu { path })?;
            if read == 0 {
                break;
            }
            digest.update(&buf[..read]);
        }

        Ok(HexDigest(hex::encode(digest.finalize())))
    }

    fn new_digest(&self) -> Box<dyn DynDigest> {
        match self {
            DigestAlgorithm::Md5 => Box::new(Md5::default()),
            DigestAlgorithm::Sha1 => Box::new(Sha1::default()),
            DigestAlgorithm::Sha256 => Box::new(Sha256::default()),
            DigestAlgorithm::Sha512 => Box::new(Sha512::default()),
            DigestAlgorithm::Blake2b512 => Box::new(Blake2b512::default()),
        }
    }
}

impl HexDigest {
    /// Returns true if `value` is a plausible hex digest for `algorithm`
    pub fn is_valid_for(value: &str, algorithm: DigestAlgorithm) -> bool {
        value.len() == algorithm.hex_len() && value.chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for HexDigest {
    fn from(value: String) -> Self {
        HexDigest(value.to_ascii_lowercase())
    }
}

impl From<&str> for HexDigest {
    fn from(value: &str) -> Self {
        HexDigest(value.to_ascii_lowercase())
    }
}

impl Display for HexDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for HexDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<W: Write> MultiDigestWriter<W> {
    pub fn new(algorithms: &[DigestAlgorithm], inner: W) -> Self {
        Self {
            digests: algorithms.iter().map(|a| (*a, a.new_digest())).collect(),
            inner,
        }
    }

    /// Consumes the writer and returns the hex encoded digests for every algorithm
    pub fn finalize_hex(self) -> HashMap<DigestAlgorithm, HexDigest> {
        self.digests
            .into_iter()
            .map(|(algorithm, digest)| (algorithm, HexDigest(hex::encode(digest.finalize()))))
            .collect()
    }
}

impl<W: Write> Write for MultiDigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        for (_, digest) in &mut self.digests {
            digest.update(&buf[..written]);
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Calculates the digests of the file at `path` for all of the specified algorithms
pub fn digest_file<P: AsRef<Path>>(
    path: P,
    algorithms: &[DigestAlgorithm],
) -> Result<HashMap<DigestAlgorithm, HexDigest>> {
    let path = path.as_ref();
    let mut writer = MultiDigestWriter::new(algorithms, io::sink());
    let mut reader = File::open(path).context(IoReadSnafu { path })?;
    io::copy(&mut reader, &mut writer).context(IoReadSnafu { path })?;
    Ok(writer.finalize_hex())
}

#[cfg(test)]
mod tests {
    use crate::bagit::digest::{DigestAlgorithm, HexDigest, MultiDigestWriter};
    use std::io::{Read, Write};

    #[test]
    fn calculate_multiple_digests_in_one_pass() {
        let mut out = Vec::new();
        let mut writer =
            MultiDigestWriter::new(&[DigestAlgorithm::Md5, DigestAlgorithm::Sha256], &mut out);
        writer.write_all(b"hello world").unwrap();
        let digests = writer.finalize_hex();

        assert_eq!(
            "5eb63bbbe01eeed093cb22bb8f5acdc3",
            digests[&DigestAlgorithm::Md5].as_str()
        );
        assert_eq!(
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
            digests[&DigestAlgorithm::Sha256].as_str()
        );
        assert_eq!(b"hello world".to_vec(), out);
    }

    #[test]
    fn hash_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abc.txt");
        std::fs::write(&file, "abc").unwrap();

        assert_eq!(
            "900150983cd24fb0d6963f7d28e17f72",
            DigestAlgorithm::Md5.hash_file(&file).unwrap().as_str()
        );
        assert!(DigestAlgorithm::Md5
            .hash_file(dir.path().join("missing.txt"))
            .is_err());
    }

    #[test]
    fn parse_algorithm_names() {
        assert_eq!(Some(DigestAlgorithm::Md5), DigestAlgorithm::parse_lenient("MD5"));
        assert_eq!(Some(DigestAlgorithm::Sha256), DigestAlgorithm::parse_lenient("SHA-256"));
        assert_eq!(Some(DigestAlgorithm::Sha512), DigestAlgorithm::parse_lenient("sha512"));
        assert_eq!(None, DigestAlgorithm::parse_lenient("crc32"));
        assert_eq!("blake2b512", DigestAlgorithm::Blake2b512.to_string());
    }

    #[test]
    fn hex_digests_are_lower_case() {
        assert_eq!("abcdef", HexDigest::from("ABCdef").as_str());
        assert!(HexDigest::is_valid_for(
            "5EB63BBBE01EEED093CB22BB8F5ACDC3",
            DigestAlgorithm::Md5
        ));
        assert!(!HexDigest::is_valid_for("5eb63b", DigestAlgorithm::Md5));
        assert!(!HexDigest::is_valid_for(
            "zeb63bbbe01eeed093cb22bb8f5acdc3",
            DigestAlgorithm::Md5
        ));
    }
}

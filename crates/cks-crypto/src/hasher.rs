use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha512};

/// Derives a chunk name from chunk content.
///
/// Implementations must be deterministic: the same bytes always produce the
/// same name, whether they arrive as a slice or as a file on disk.
pub trait ChunkHasher: Send + Sync {
    /// Digest raw bytes.
    fn digest(&self, data: &[u8]) -> Vec<u8>;

    /// Digest the contents of a file.
    ///
    /// The default implementation reads the whole file into memory.
    /// Implementations backed by a streaming hasher should override it.
    fn digest_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let data = std::fs::read(path)?;
        Ok(self.digest(&data))
    }

    /// Verify that `data` produces `expected`.
    fn verify(&self, data: &[u8], expected: &[u8]) -> bool {
        self.digest(data) == expected
    }

    /// Hex-encoded digest, handy for logs and file names.
    fn digest_hex(&self, data: &[u8]) -> String {
        hex::encode(self.digest(data))
    }
}

/// BLAKE3 chunk hasher with optional domain separation.
///
/// With a domain tag set, the tag and a `:` separator are fed to the hasher
/// before the content, so two stores using different tags never agree on a
/// name for the same bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Blake3Hasher {
    domain: Option<&'static str>,
}

impl Blake3Hasher {
    /// Plain BLAKE3 without a domain tag.
    pub const PLAIN: Self = Self { domain: None };

    /// Create a plain hasher.
    pub const fn new() -> Self {
        Self::PLAIN
    }

    /// Create a hasher with a custom domain tag.
    pub const fn with_domain(domain: &'static str) -> Self {
        Self {
            domain: Some(domain),
        }
    }

    /// The domain tag used by this hasher, if any.
    pub fn domain(&self) -> Option<&str> {
        self.domain
    }

    fn start(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        if let Some(domain) = self.domain {
            hasher.update(domain.as_bytes());
            hasher.update(b":");
        }
        hasher
    }
}

impl ChunkHasher for Blake3Hasher {
    fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.start();
        hasher.update(data);
        hasher.finalize().as_bytes().to_vec()
    }

    fn digest_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let mut hasher = self.start();
        io::copy(&mut file, &mut hasher)?;
        Ok(hasher.finalize().as_bytes().to_vec())
    }
}

/// SHA-512 chunk hasher producing 64-byte names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sha512Hasher;

impl ChunkHasher for Sha512Hasher {
    fn digest(&self, data: &[u8]) -> Vec<u8> {
        Sha512::digest(data).to_vec()
    }

    fn digest_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let mut hasher = Sha512::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(hasher.finalize().to_vec())
    }
}

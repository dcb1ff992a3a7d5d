//! Chunk naming digests.
//!
//! A chunk store never picks its own digest algorithm. Callers inject a
//! [`ChunkHasher`] at construction time and the store only calls it back to
//! validate stored content. Two implementations ship with the crate:
//!
//! - [`Blake3Hasher`] -- 32-byte BLAKE3, optionally domain-separated
//! - [`Sha512Hasher`] -- 64-byte SHA-512
//!
//! All digest operations wrap established libraries -- no custom cryptography.

pub mod hasher;

pub use hasher::{Blake3Hasher, ChunkHasher, Sha512Hasher};

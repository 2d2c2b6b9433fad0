//! Fingerprint engine.
//!
//! Computes hex digests over byte sequences with one of the supported
//! [`HashAlgorithm`]s, and compares algorithms on the same input.

use crate::models::HashAlgorithm;
use crate::{Error, Result};
use blake2::Blake2b512;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use sha3::{Sha3_256, Sha3_512};
use std::io::Read;
use std::time::{Duration, Instant};

/// Read buffer for streamed hashing.
const CHUNK_SIZE: usize = 8192;

/// Incremental hasher over any supported algorithm.
enum StreamingHasher {
    Blake2b512(Blake2b512),
    Sha256(Sha256),
    Sha512(Sha512),
    Sha3_256(Sha3_256),
    Sha3_512(Sha3_512),
}

impl StreamingHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake2b512 => Self::Blake2b512(Blake2b512::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
            HashAlgorithm::Sha3_256 => Self::Sha3_256(Sha3_256::new()),
            HashAlgorithm::Sha3_512 => Self::Sha3_512(Sha3_512::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Blake2b512(h) => h.update(bytes),
            Self::Sha256(h) => h.update(bytes),
            Self::Sha512(h) => h.update(bytes),
            Self::Sha3_256(h) => h.update(bytes),
            Self::Sha3_512(h) => h.update(bytes),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Blake2b512(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
            Self::Sha3_256(h) => hex::encode(h.finalize()),
            Self::Sha3_512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Timing of one algorithm over one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Algorithm measured.
    pub algorithm: HashAlgorithm,
    /// Digest produced (identical on every iteration).
    pub digest: String,
    /// Mean wall-clock duration of one digest.
    pub duration: Duration,
    /// Input size in bytes.
    pub bytes: usize,
    /// Bytes hashed per second.
    pub throughput_bytes_per_sec: f64,
}

impl BenchmarkResult {
    /// Throughput in MiB/s.
    #[must_use]
    pub fn throughput_mib_per_sec(&self) -> f64 {
        self.throughput_bytes_per_sec / (1024.0 * 1024.0)
    }
}

/// Digest computation and algorithm comparison.
///
/// Stateless; every method is pure and safe to call from any thread.
///
/// # Example
///
/// ```rust
/// use docprint::{FingerprintEngine, HashAlgorithm};
///
/// let hex = FingerprintEngine::digest(b"Hello World", HashAlgorithm::Blake2b512);
/// assert_eq!(hex.len(), 128);
/// assert_eq!(hex, FingerprintEngine::digest(b"Hello World", HashAlgorithm::Blake2b512));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintEngine;

impl FingerprintEngine {
    /// Returns the lowercase hex digest of `bytes`.
    #[must_use]
    pub fn digest(bytes: &[u8], algorithm: HashAlgorithm) -> String {
        let mut hasher = StreamingHasher::new(algorithm);
        hasher.update(bytes);
        hasher.finalize_hex()
    }

    /// Resolves an algorithm by name and digests `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedAlgorithm`] for unknown names; nothing is hashed.
    pub fn digest_named(bytes: &[u8], algorithm: &str) -> Result<String> {
        let algorithm = HashAlgorithm::parse(algorithm)?;
        Ok(Self::digest(bytes, algorithm))
    }

    /// Hashes a stream in fixed-size chunks.
    ///
    /// Produces the same digest as [`FingerprintEngine::digest`] over the
    /// concatenated bytes. Returns the digest and the number of bytes read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if reading fails.
    pub fn digest_reader<R: Read>(
        mut reader: R,
        algorithm: HashAlgorithm,
    ) -> Result<(String, u64)> {
        let mut hasher = StreamingHasher::new(algorithm);
        let mut buf = [0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(Error::OperationFailed {
                        operation: "digest_reader".to_string(),
                        cause: e.to_string(),
                    });
                },
            };
            hasher.update(&buf[..n]);
            total += n as u64;
        }
        Ok((hasher.finalize_hex(), total))
    }

    /// Runs each algorithm once over `bytes`.
    ///
    /// Results are ordered by ascending duration; ties keep enumeration order.
    /// Repeated algorithms in `algorithms` are measured once.
    #[must_use]
    pub fn benchmark(bytes: &[u8], algorithms: &[HashAlgorithm]) -> Vec<BenchmarkResult> {
        Self::measure(bytes, algorithms, 1)
    }

    /// Like [`FingerprintEngine::benchmark`] but reports the mean over `iterations` runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `iterations` is zero.
    pub fn benchmark_iterations(
        bytes: &[u8],
        algorithms: &[HashAlgorithm],
        iterations: u32,
    ) -> Result<Vec<BenchmarkResult>> {
        if iterations == 0 {
            return Err(Error::InvalidInput(
                "benchmark iterations must be at least 1".to_string(),
            ));
        }
        Ok(Self::measure(bytes, algorithms, iterations))
    }

    fn measure(
        bytes: &[u8],
        algorithms: &[HashAlgorithm],
        iterations: u32,
    ) -> Vec<BenchmarkResult> {
        let mut seen = Vec::with_capacity(algorithms.len());
        for algorithm in algorithms {
            if !seen.contains(algorithm) {
                seen.push(*algorithm);
            }
        }

        let mut results: Vec<BenchmarkResult> = seen
            .into_iter()
            .map(|algorithm| {
                let mut digest = String::new();
                let start = Instant::now();
                for _ in 0..iterations {
                    digest = Self::digest(std::hint::black_box(bytes), algorithm);
                }
                let duration = start.elapsed() / iterations;
                tracing::debug!(
                    algorithm = %algorithm,
                    bytes = bytes.len(),
                    duration_us = duration.as_micros(),
                    "Benchmarked digest"
                );
                BenchmarkResult {
                    algorithm,
                    digest,
                    duration,
                    bytes: bytes.len(),
                    throughput_bytes_per_sec: throughput(bytes.len(), duration),
                }
            })
            .collect();

        results.sort_by(|a, b| {
            a.duration
                .cmp(&b.duration)
                .then_with(|| a.algorithm.ordinal().cmp(&b.algorithm.ordinal()))
        });
        results
    }
}

/// Bytes per second, with the duration floored at one nanosecond.
#[allow(clippy::cast_precision_loss)]
fn throughput(bytes: usize, duration: Duration) -> f64 {
    let secs = duration.max(Duration::from_nanos(1)).as_secs_f64();
    bytes as f64 / secs
}

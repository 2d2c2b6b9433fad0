//! Per-algorithm cases for digests, name parsing and store keys.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use docprint::extraction::PlainTextExtractor;
use docprint::services::Fingerprinter;
use docprint::{Error, FingerprintEngine, HashAlgorithm, NormalizationMode, PipelineOptions};
use test_case::test_case;

#[test_case(HashAlgorithm::Sha256, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad" ; "sha256")]
#[test_case(HashAlgorithm::Sha512, "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f" ; "sha512")]
#[test_case(HashAlgorithm::Sha3_256, "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532" ; "sha3_256")]
#[test_case(HashAlgorithm::Sha3_512, "b751850b1a57168a5693cd924b6b096e08f621827444f70d884f5d0240d2712e10e116e9192af3c91a7ec57647e3934057340b4cf408d5a56592f8274eec53f0" ; "sha3_512")]
#[test_case(HashAlgorithm::Blake2b512, "ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d17d87c5392aab792dc252d5de4533cc9518d38aa8dbf1925ab92386edd4009923" ; "blake2b_512")]
fn digest_of_abc(algorithm: HashAlgorithm, expected: &str) {
    let digest = FingerprintEngine::digest(b"abc", algorithm);
    assert_eq!(digest, expected);
    assert_eq!(digest.len(), algorithm.hex_len());
}

const HELLO_WORLD_BLAKE2B_512: &str = "4386a08a265111c9896f56456e2cb61a64239115c4784cf438e36cc851221972da3fb0115f73cd02486254001f878ab1fd126aac69844ef1c1ca152379d0a9bd";

#[test_case(HashAlgorithm::Sha256, "a591a6d40bf420404a011733cfb7b190d62c65bf0bcda32b57b277d9ad9f146e" ; "sha256")]
#[test_case(HashAlgorithm::Sha512, "2c74fd17edafd80e8447b0d46741ee243b7eb74dd2149a0ab1b9246fb30382f27e853d8585719e0e67cbda0daa8f51671064615d645ae27acb15bfb1447f459b" ; "sha512")]
#[test_case(HashAlgorithm::Sha3_256, "e167f68d6563d75bb25f3aa49c29ef612d41352dc00606de7cbd630bb2665f51" ; "sha3_256")]
#[test_case(HashAlgorithm::Sha3_512, "3d58a719c6866b0214f96b0a67b37e51a91e233ce0be126a08f35fdf4c043c6126f40139bfbc338d44eb2a03de9f7bb8eff0ac260b3629811e389a5fbee8a894" ; "sha3_512")]
#[test_case(HashAlgorithm::Blake2b512, HELLO_WORLD_BLAKE2B_512 ; "blake2b_512")]
fn digest_of_hello_world(algorithm: HashAlgorithm, expected: &str) {
    assert_eq!(FingerprintEngine::digest(b"Hello World", algorithm), expected);
}

#[test_case(b"Hello World" ; "canonical")]
#[test_case(b"  Hello\r\n\tWorld\n" ; "reflowed")]
fn content_fingerprint_of_hello_world_is_pinned(document: &[u8]) {
    let fingerprinter = Fingerprinter::new(PlainTextExtractor::new(), &PipelineOptions::default());
    let doc = fingerprinter.fingerprint("hello.txt", document).unwrap();
    assert!(doc.content_only);
    assert_eq!(doc.algorithm, HashAlgorithm::Blake2b512);
    assert_eq!(doc.fingerprint, HELLO_WORLD_BLAKE2B_512);
}

#[test_case("blake2b-512", HashAlgorithm::Blake2b512)]
#[test_case("BLAKE2B", HashAlgorithm::Blake2b512)]
#[test_case("sha256", HashAlgorithm::Sha256)]
#[test_case("SHA512", HashAlgorithm::Sha512)]
#[test_case("sha3_256", HashAlgorithm::Sha3_256)]
#[test_case("Sha3-512", HashAlgorithm::Sha3_512)]
fn parse_algorithm(name: &str, expected: HashAlgorithm) {
    assert_eq!(HashAlgorithm::parse(name).unwrap(), expected);
}

#[test_case("md5" ; "md5")]
#[test_case("crc32" ; "crc32")]
#[test_case("" ; "empty")]
fn parse_unknown_algorithm(name: &str) {
    assert!(matches!(
        HashAlgorithm::parse(name),
        Err(Error::UnsupportedAlgorithm(_))
    ));
    assert!(FingerprintEngine::digest_named(b"abc", name).is_err());
}

#[test_case("content", NormalizationMode::ContentOnly)]
#[test_case("raw", NormalizationMode::Raw)]
fn parse_mode(name: &str, expected: NormalizationMode) {
    assert_eq!(NormalizationMode::parse(name).unwrap(), expected);
    assert_eq!(expected.as_str(), name);
}

#[test_case(HashAlgorithm::Sha256 ; "sha256")]
#[test_case(HashAlgorithm::Sha512 ; "sha512")]
#[test_case(HashAlgorithm::Sha3_256 ; "sha3_256")]
#[test_case(HashAlgorithm::Sha3_512 ; "sha3_512")]
#[test_case(HashAlgorithm::Blake2b512 ; "blake2b_512")]
fn reader_matches_one_shot_across_chunk_boundaries(algorithm: HashAlgorithm) {
    // Spans two full 8 KiB chunks plus a tail.
    let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let (streamed, read) = FingerprintEngine::digest_reader(data.as_slice(), algorithm).unwrap();
    assert_eq!(read, data.len() as u64);
    assert_eq!(streamed, FingerprintEngine::digest(&data, algorithm));
}

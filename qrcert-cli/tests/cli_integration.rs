//! CLI integration tests for qrcert-cli.
//!
//! These tests verify the CLI behavior by running the actual binary
//! and checking outputs, exit codes, and file artifacts.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use predicates::prelude::*;
use qrcode::QrCode;
use tempfile::TempDir;

const MODEL: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../models/hospital-url-domain-v1.onnx"
);
const REAL_URL: &str = "https://real-hospital.com/certificate/12345";
const FAKE_URL: &str = "https://fake-hospital.net/cert/1";

/// Get a Command for the qrcert binary.
fn qrcert() -> Command {
    Command::cargo_bin("qrcert").unwrap()
}

fn write_qr(dir: &Path, name: &str, payload: &str) -> PathBuf {
    let code = QrCode::new(payload.as_bytes()).unwrap();
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(240, 240)
        .build();
    write_png(dir, name, DynamicImage::ImageLuma8(img))
}

fn write_png(dir: &Path, name: &str, img: DynamicImage) -> PathBuf {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    let path = dir.join(name);
    fs::write(&path, buf.into_inner()).unwrap();
    path
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Enroll `image` into `<dir>/reference.txt`.
fn enroll(dir: &Path, image: &Path) -> PathBuf {
    let reference = dir.join("reference.txt");
    qrcert()
        .args(["enroll", path_str(image), "--reference", path_str(&reference)])
        .assert()
        .success();
    reference
}

fn verify(image: &Path, reference: &Path) -> Command {
    let mut cmd = qrcert();
    cmd.args([
        "verify",
        path_str(image),
        "--reference",
        path_str(reference),
        "--model",
        MODEL,
    ]);
    cmd
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    qrcert()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Hospital certificate QR verification",
        ))
        .stdout(predicate::str::contains("enroll"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("features"));
}

#[test]
fn test_help_shows_exit_codes() {
    qrcert()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("78"));
}

#[test]
fn test_verify_help_shows_options() {
    qrcert()
        .args(["verify", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--reference"))
        .stdout(predicate::str::contains("--allow"))
        .stdout(predicate::str::contains("--json"));
}

// ============================================================================
// Hash and Enroll Tests
// ============================================================================

#[test]
fn test_hash_prints_sha256() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("abc.bin");
    fs::write(&file, b"abc").unwrap();

    qrcert()
        .args(["hash", path_str(&file)])
        .assert()
        .success()
        .stdout("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad\n");
}

#[test]
fn test_hash_missing_file_returns_input_error() {
    // Exit code 66 = EX_NOINPUT
    qrcert()
        .args(["hash", "nonexistent_file.png"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("nonexistent_file.png"));
}

#[test]
fn test_enroll_writes_reference_file() {
    let temp = TempDir::new().unwrap();
    let image = write_qr(temp.path(), "cert.png", REAL_URL);

    let reference = enroll(temp.path(), &image);

    let stored = fs::read_to_string(&reference).unwrap();
    let expected = qrcert()
        .args(["hash", path_str(&image)])
        .output()
        .unwrap()
        .stdout;
    assert_eq!(stored.trim(), String::from_utf8(expected).unwrap().trim());
}

#[test]
fn test_enroll_missing_file_returns_input_error() {
    let temp = TempDir::new().unwrap();
    let reference = temp.path().join("reference.txt");

    qrcert()
        .args(["enroll", "missing.png", "--reference", path_str(&reference)])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read file"));
    assert!(!reference.exists());
}

// ============================================================================
// Verify Tests
// ============================================================================

#[test]
fn test_verify_real_certificate() {
    let temp = TempDir::new().unwrap();
    let image = write_qr(temp.path(), "cert.png", REAL_URL);
    let reference = enroll(temp.path(), &image);

    verify(&image, &reference)
        .assert()
        .success()
        .stdout(predicate::str::contains("REAL"))
        .stdout(predicate::str::contains(REAL_URL));
}

#[test]
fn test_verify_fake_certificate() {
    let temp = TempDir::new().unwrap();
    let image = write_qr(temp.path(), "cert.png", FAKE_URL);
    let reference = enroll(temp.path(), &image);

    verify(&image, &reference)
        .assert()
        .code(65)
        .stdout(predicate::str::contains("FAKE"));
}

#[test]
fn test_verify_allow_listed_url() {
    let temp = TempDir::new().unwrap();
    let image = write_qr(temp.path(), "cert.png", FAKE_URL);
    let reference = enroll(temp.path(), &image);

    verify(&image, &reference)
        .args(["--allow", FAKE_URL])
        .assert()
        .success()
        .stdout(predicate::str::contains("REAL"));
}

#[test]
fn test_verify_modified_image_is_tampered() {
    let temp = TempDir::new().unwrap();
    let original = write_qr(temp.path(), "original.png", REAL_URL);
    let reference = enroll(temp.path(), &original);

    let mut bytes = fs::read(&original).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let modified = temp.path().join("modified.png");
    fs::write(&modified, bytes).unwrap();

    verify(&modified, &reference)
        .assert()
        .code(65)
        .stdout(predicate::str::contains("TAMPERED"));
}

#[test]
fn test_verify_unreadable_image_fails_closed() {
    let temp = TempDir::new().unwrap();
    let original = write_qr(temp.path(), "original.png", REAL_URL);
    let reference = enroll(temp.path(), &original);

    verify(&temp.path().join("missing.png"), &reference)
        .assert()
        .code(65)
        .stdout(predicate::str::contains("TAMPERED"));
}

#[test]
fn test_verify_without_reference_is_config_error() {
    let temp = TempDir::new().unwrap();
    let image = write_qr(temp.path(), "cert.png", REAL_URL);

    verify(&image, &temp.path().join("never-enrolled.txt"))
        .assert()
        .code(78)
        .stdout(predicate::str::contains("UNVERIFIABLE"));
}

#[test]
fn test_verify_image_without_qr() {
    let temp = TempDir::new().unwrap();
    let blank = GrayImage::from_pixel(200, 200, Luma([255]));
    let image = write_png(temp.path(), "blank.png", DynamicImage::ImageLuma8(blank));
    let reference = enroll(temp.path(), &image);

    verify(&image, &reference)
        .assert()
        .code(65)
        .stdout(predicate::str::contains("NO QR FOUND"));
}

#[test]
fn test_verify_json_output() {
    let temp = TempDir::new().unwrap();
    let image = write_qr(temp.path(), "cert.png", REAL_URL);
    let reference = enroll(temp.path(), &image);

    let output = verify(&image, &reference).arg("--json").output().unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["verdict"], "real");
    assert_eq!(json["url"], REAL_URL);
    assert_eq!(json["resolved_url"], REAL_URL);
}

#[test]
fn test_verify_missing_model_is_config_error() {
    let temp = TempDir::new().unwrap();
    let image = write_qr(temp.path(), "cert.png", REAL_URL);
    let reference = enroll(temp.path(), &image);

    qrcert()
        .args([
            "verify",
            path_str(&image),
            "--reference",
            path_str(&reference),
            "--model",
            path_str(&temp.path().join("no-model.json")),
        ])
        .assert()
        .code(78)
        .stderr(predicate::str::contains("Failed to load model"));
}

#[test]
fn test_verify_schema_mismatch_is_config_error() {
    let temp = TempDir::new().unwrap();
    let image = write_qr(temp.path(), "cert.png", REAL_URL);
    let reference = enroll(temp.path(), &image);

    verify(&image, &reference)
        .args(["--schema", "lexical-v1"])
        .assert()
        .code(78);
}

// ============================================================================
// Features Tests
// ============================================================================

#[test]
fn test_features_prints_vector() {
    qrcert()
        .args(["features", FAKE_URL])
        .assert()
        .success()
        .stdout(predicate::str::contains("# schema domain-v1"))
        .stdout(predicate::str::contains("domain_length\t17"))
        .stdout(predicate::str::contains("path_length\t7"));
}

#[test]
fn test_features_json() {
    let output = qrcert()
        .args(["features", FAKE_URL, "--json", "--schema", "domain-v1"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["contains_hospital"], 1.0);
    assert_eq!(json["contains_clinic"], 0.0);
}

#[test]
fn test_features_unknown_schema() {
    qrcert()
        .args(["features", FAKE_URL, "--schema", "no-such-schema"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid feature schema"));
}

//! Hash command implementation.

use std::path::PathBuf;

use anyhow::Result;
use qrcert_core::ImageDigest;

/// Print the image's SHA-256 digest in the reference file format.
pub fn execute(image: PathBuf) -> Result<()> {
    let digest = ImageDigest::of_file(&image)?;
    println!("{}", digest.to_hex());
    Ok(())
}

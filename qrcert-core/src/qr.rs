//! QR payload extraction.
//!
//! Images are decoded with the `image` crate, reduced to 8-bit luma and
//! scanned with `rqrr`. When several codes are present the first grid that
//! decodes, in detection order, wins; no attempt is made to reconcile
//! conflicting payloads.

use image::imageops::FilterType;
use image::GrayImage;
use rqrr::PreparedImage;
use tracing::{debug, instrument};

use crate::error::{Result, VerifyError};

/// Images with a shorter side than this are not retried at half scale.
const MIN_DOWNSCALE_SIDE: u32 = 400;

/// Extracts the first machine-readable payload from an image.
pub trait QrDecoder: Send + Sync {
    /// Returns `Ok(None)` when the image decodes but carries no readable code,
    /// and `VerifyError::Decode` when the bytes are not a supported image.
    fn decode(&self, image: &[u8]) -> Result<Option<String>>;
}

/// `rqrr`-backed decoder.
#[derive(Debug, Clone, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl QrDecoder for RqrrDecoder {
    #[instrument(level = "debug", skip_all, fields(bytes = image.len()))]
    fn decode(&self, image: &[u8]) -> Result<Option<String>> {
        let luma = image::load_from_memory(image)
            .map_err(|e| VerifyError::Decode(format!("Failed to decode image: {e}")))?
            .to_luma8();

        if let Some(payload) = scan(&luma) {
            return Ok(Some(payload));
        }

        // Phone photos of printed certificates often have modules too large
        // for the finder-pattern search; a half-scale pass recovers them.
        let (width, height) = luma.dimensions();
        if width.min(height) >= MIN_DOWNSCALE_SIDE {
            debug!(width, height, "Retrying QR scan at half scale");
            let half = image::imageops::resize(&luma, width / 2, height / 2, FilterType::Triangle);
            return Ok(scan(&half));
        }

        Ok(None)
    }
}

fn scan(luma: &GrayImage) -> Option<String> {
    let (width, height) = luma.dimensions();
    let mut prepared = PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| luma.get_pixel(x as u32, y as u32).0[0],
    );

    let grids = prepared.detect_grids();
    debug!(grids = grids.len(), "Detected QR grids");

    grids.iter().find_map(|grid| match grid.decode() {
        Ok((_, content)) => {
            debug!(payload = %content, "Decoded QR payload");
            Some(content)
        }
        Err(e) => {
            debug!(error = %e, "Skipping undecodable grid");
            None
        }
    })
}

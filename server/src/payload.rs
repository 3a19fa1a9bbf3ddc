//! Loading the installed payload at boot.
//!
//! The archive format is opaque here: a payload is present when its
//! signature bytes are neither erased nor cleared by an uninstall.

use ota::{Flash, FlashError, ERASED, SIGNATURE_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Missing,
    Installed { signature: [u8; SIGNATURE_LENGTH] },
}

pub fn probe<F: Flash + ?Sized>(flash: &mut F) -> Result<Payload, FlashError> {
    let mut signature = [0; SIGNATURE_LENGTH];
    flash.read(0, &mut signature)?;

    if signature.iter().all(|&b| b == 0) || signature.iter().all(|&b| b == ERASED) {
        return Ok(Payload::Missing);
    }
    Ok(Payload::Installed { signature })
}

/// Try to load the payload, logging the outcome.
///
/// Failures never propagate; the host keeps running without a payload.
pub fn load<F: Flash + ?Sized>(flash: &mut F) -> Option<Payload> {
    match probe(flash) {
        Ok(Payload::Missing) => {
            tracing::info!("no mod installed");
            Some(Payload::Missing)
        }
        Ok(payload) => {
            tracing::info!("mod loaded");
            Some(payload)
        }
        Err(e) => {
            tracing::warn!(error = %e, "exception loading mod");
            None
        }
    }
}

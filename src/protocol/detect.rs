//! Protocol variant detection from the handshake.

use std::sync::Arc;

use crate::protocol::handler::Handler;
use crate::protocol::sails::SailsHandler;
use crate::transport::{Connection, Handshake};

/// Query parameter Sails.io.js adds to its handshake.
pub const SAILS_VERSION_PARAM: &str = "__sails_io_sdk_version";

/// Event emitted to the client when its protocol could not be identified.
pub const WARN_EVENT: &str = "warn";

/// Wire dialects the bridge speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    Sails,
}

impl ProtocolVariant {
    /// Construct the handler for this variant.
    pub fn handler(self, connection: Arc<dyn Connection>) -> Box<dyn Handler> {
        match self {
            ProtocolVariant::Sails => Box::new(SailsHandler::new(connection)),
        }
    }
}

/// Outcome of inspecting a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub variant: ProtocolVariant,
    /// False when no marker was present and the default was chosen.
    pub recognized: bool,
}

/// Pick the protocol variant for a handshake, defaulting to Sails.
pub fn detect_variant(handshake: &Handshake) -> Detection {
    let recognized = handshake
        .query
        .get(SAILS_VERSION_PARAM)
        .is_some_and(|v| !v.is_empty());

    Detection {
        variant: ProtocolVariant::Sails,
        recognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_sails_marker() {
        let mut handshake = Handshake::default();
        handshake
            .query
            .insert(SAILS_VERSION_PARAM.to_string(), "0.11.0".to_string());

        let detection = detect_variant(&handshake);
        assert_eq!(detection.variant, ProtocolVariant::Sails);
        assert!(detection.recognized);
    }

    #[test]
    fn test_defaults_to_sails() {
        let detection = detect_variant(&Handshake::default());
        assert_eq!(detection.variant, ProtocolVariant::Sails);
        assert!(!detection.recognized);
    }
}

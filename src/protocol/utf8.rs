use crate::error::DecodeError;

/// Strictly decodes a completed text payload. Overlong forms, surrogates and
/// truncated trailing sequences are all rejected.
pub(crate) fn decode_text(bytes: Vec<u8>) -> Result<String, DecodeError> {
    String::from_utf8(bytes).map_err(|e| {
        let valid_up_to = e.utf8_error().valid_up_to();
        tracing::warn!(valid_up_to, "invalid UTF-8 in text message");
        DecodeError::InvalidUtf8 { valid_up_to }
    })
}

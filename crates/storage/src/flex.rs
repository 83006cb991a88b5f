//! Flex property encoding
//!
//! A flex property holds a dynamically typed [`FlexValue`] tree. It is
//! stored as a self-describing MessagePack blob inside a byte vector.

use ironbox_core::{Error, FlexValue, Result};

/// Encode a flex value to MessagePack
pub fn encode(property: &str, value: &FlexValue) -> Result<Vec<u8>> {
    rmp_serde::to_vec(value).map_err(|e| Error::ValueOutOfRange {
        property: property.to_string(),
        kind: "flex".to_string(),
        value: e.to_string(),
    })
}

/// Decode a MessagePack blob; an empty blob is `Null`
pub fn decode(property: &str, bytes: &[u8]) -> Result<FlexValue> {
    if bytes.is_empty() {
        return Ok(FlexValue::Null);
    }
    rmp_serde::from_slice(bytes)
        .map_err(|e| Error::decode(format!("property '{}': invalid flex value: {}", property, e)))
}

//! Order-preserving key encoding.
//!
//! sled orders keys bytewise. Encoded ids sort exactly like [`EntityId`]: every numeric
//! id before every textual id, numbers numerically (negatives included), text bytewise.

use mockrest_core::{
    entity::EntityId,
    error::{MockError, MockResult},
};

const NUMBER_TAG: u8 = 0x00;
const TEXT_TAG: u8 = 0x01;

/// Prefix shared by every numeric key.
pub(crate) const NUMBER_PREFIX: [u8; 1] = [NUMBER_TAG];

pub(crate) fn encode(id: &EntityId) -> Vec<u8> {
    match id {
        EntityId::Number(n) => {
            let mut key = Vec::with_capacity(9);
            key.push(NUMBER_TAG);
            // Flipping the sign bit makes two's complement sort as unsigned.
            key.extend_from_slice(&((*n as u64) ^ (1 << 63)).to_be_bytes());
            key
        }
        EntityId::Text(s) => {
            let mut key = Vec::with_capacity(s.len() + 1);
            key.push(TEXT_TAG);
            key.extend_from_slice(s.as_bytes());
            key
        }
    }
}

pub(crate) fn decode(key: &[u8]) -> MockResult<EntityId> {
    match key.split_first() {
        Some((&NUMBER_TAG, rest)) => {
            let bytes: [u8; 8] = rest
                .try_into()
                .map_err(|_| MockError::Backend(format!("malformed numeric key of {} bytes", key.len())))?;
            Ok(EntityId::Number((u64::from_be_bytes(bytes) ^ (1 << 63)) as i64))
        }
        Some((&TEXT_TAG, rest)) => String::from_utf8(rest.to_vec())
            .map(EntityId::Text)
            .map_err(|err| MockError::Backend(format!("malformed text key: {err}"))),
        _ => Err(MockError::Backend("unknown key tag".to_string())),
    }
}

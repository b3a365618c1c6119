//! Key encoding utilities for `RocksDB`.
//!
//! Record keys are the 16 ULID bytes of the local id. Per-customer indexes
//! concatenate the customer id with the child id, so a prefix scan over a
//! customer yields its records in creation order.

use billable_core::{CustomerId, OwnerId, Processor};

/// Length of a ULID/UUID key.
pub const ID_LEN: usize = 16;

/// Create an owner index key.
///
/// Format: `owner_id (16 bytes) || processor name`
#[must_use]
pub fn owner_key(owner_id: &OwnerId, processor: Processor) -> Vec<u8> {
    let name = processor.as_str().as_bytes();
    let mut key = Vec::with_capacity(ID_LEN + name.len());
    key.extend_from_slice(owner_id.as_bytes());
    key.extend_from_slice(name);
    key
}

/// Create a processor id index key.
#[must_use]
pub fn processor_key(processor_id: &str) -> Vec<u8> {
    processor_id.as_bytes().to_vec()
}

/// Create a customer-child index key.
///
/// Format: `customer_id (16 bytes) || child_id (16 bytes)`
#[must_use]
pub fn customer_child_key(customer_id: &CustomerId, child: [u8; ID_LEN]) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN * 2);
    key.extend_from_slice(&customer_id.to_bytes());
    key.extend_from_slice(&child);
    key
}

/// Create a prefix for iterating all children of a customer.
#[must_use]
pub fn customer_prefix(customer_id: &CustomerId) -> Vec<u8> {
    customer_id.to_bytes().to_vec()
}

/// Extract the child id from a customer-child index key.
///
/// Returns `None` if the key is not exactly 32 bytes.
#[must_use]
pub fn child_from_customer_key(key: &[u8]) -> Option<[u8; ID_LEN]> {
    if key.len() != ID_LEN * 2 {
        return None;
    }
    key[ID_LEN..].try_into().ok()
}

/// Decode a 16-byte id stored as an index value.
#[must_use]
pub fn id_from_value(value: &[u8]) -> Option<[u8; ID_LEN]> {
    value.try_into().ok()
}

/// Create a webhook event key from an event ID.
#[must_use]
pub fn webhook_event_key(event_id: &str) -> Vec<u8> {
    event_id.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use billable_core::ChargeId;

    #[test]
    fn owner_key_format() {
        let owner = OwnerId::generate();
        let key = owner_key(&owner, Processor::Stripe);
        assert_eq!(&key[..ID_LEN], owner.as_bytes());
        assert_eq!(&key[ID_LEN..], b"stripe");
    }

    #[test]
    fn customer_child_key_roundtrip() {
        let customer = CustomerId::generate();
        let charge = ChargeId::generate();
        let key = customer_child_key(&customer, charge.to_bytes());

        assert_eq!(key.len(), 32);
        assert!(key.starts_with(&customer_prefix(&customer)));
        let child = child_from_customer_key(&key).unwrap();
        assert_eq!(ChargeId::from_bytes(child), charge);
    }

    #[test]
    fn malformed_child_key_is_rejected() {
        assert!(child_from_customer_key(&[0u8; 20]).is_none());
        assert!(id_from_value(&[1, 2, 3]).is_none());
    }
}

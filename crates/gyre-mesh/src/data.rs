//! Content-addressed data descriptors.

use gyre_geom::V;
use gyre_locate::{address_of, position_of, Address};

/// A descriptor for one piece of content-addressed data.
///
/// Immutable after construction. The payload bytes are consumed only to
/// derive the address and are not retained: storing random filler would
/// be a waste of RAM, and the routing protocol never looks at it.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub address: Address,
    /// Position on the unit sphere, derived from the address.
    pub location: V,
    /// Payload size in bytes.
    pub size: usize,
}

impl Data {
    /// Build a descriptor from payload bytes.
    pub fn from_payload(payload: &[u8]) -> Self {
        let address = address_of(payload);
        let location = position_of(&address);
        Self { address, location, size: payload.len() }
    }
}

impl std::fmt::Display for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.address, self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_from_payload() {
        let d = Data::from_payload(b"some payload bytes");
        assert_eq!(d.size, 18);
        assert!((d.location.norm() - 1.0).abs() < 1e-9);
        assert_eq!(d, Data::from_payload(b"some payload bytes"));
    }

    #[test]
    fn display_pairs_address_and_location() {
        let d = Data::from_payload(b"x");
        let s = d.to_string();
        assert!(s.contains('@'));
        assert!(s.starts_with(&d.address.to_base64()));
    }
}

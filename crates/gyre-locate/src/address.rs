//! Content addressing: payload bytes to address, address to sphere point.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gyre_geom::{Q, V};
use sha2::{Digest, Sha256};

/// A content address: the 32-byte SHA-256 digest of a payload.
///
/// The routing layer treats addresses as opaque; only [`position_of`]
/// interprets their bytes. A real deployment would need to convey the
/// hashing and positioning algorithms to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Base64 rendering for logs and CSV sinks.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// Hash payload bytes into their content address.
pub fn address_of(payload: &[u8]) -> Address {
    let digest = Sha256::digest(payload);
    Address(digest.into())
}

/// Map an address deterministically onto the unit sphere.
///
/// Starts from unit X and consumes the address bytes four at a time as
/// quaternion components `(i, j, k, r)`. Each completed quaternion is
/// unit-normalized and applied as a rotation. A trailing partial
/// quaternion (possible for non-digest byte strings) is applied as-is,
/// un-normalized, with its missing components zero.
pub fn position_of(address: &Address) -> V {
    rotate_by_bytes(&address.0)
}

fn rotate_by_bytes(bytes: &[u8]) -> V {
    let mut v = V::UNIT_X;
    let mut q = Q::default();
    let mut idx = 0;
    for &byte in bytes {
        match idx {
            0 => {
                q.i = byte as f64;
                idx += 1;
            }
            1 => {
                q.j = byte as f64;
                idx += 1;
            }
            2 => {
                q.k = byte as f64;
                idx += 1;
            }
            _ => {
                q.r = byte as f64;
                v = v.rotate(q.unit());
                q = Q::default();
                idx = 0;
            }
        }
    }
    if idx != 0 {
        v = v.rotate(q);
    }
    v
}

//! Packet filter chain naming
//!
//! iptables limits chain names to 28 characters, so names are derived from a
//! SHA-512 digest of the network name and container id.

use sha2::{Digest, Sha512};

/// Maximum chain name length accepted by the kernel
pub const MAX_CHAIN_LENGTH: usize = 28;

/// Prefix marking chains owned by this library
pub const CHAIN_PREFIX: &str = "CNI-";

/// Generate a chain name for a network + container pair
///
/// The result is always exactly `MAX_CHAIN_LENGTH` characters.
pub fn format_chain_name(name: &str, id: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(name.as_bytes());
    hasher.update(id.as_bytes());
    let digest = hex::encode(hasher.finalize());

    let mut chain = String::with_capacity(MAX_CHAIN_LENGTH);
    chain.push_str(CHAIN_PREFIX);
    chain.push_str(&digest[..MAX_CHAIN_LENGTH - CHAIN_PREFIX.len()]);
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_name_length_and_prefix() {
        let long_id = "x".repeat(500);
        for (name, id) in [
            ("", ""),
            ("test", "1234"),
            ("a-very-long-network-name-that-exceeds-everything", long_id.as_str()),
        ] {
            let chain = format_chain_name(name, id);
            assert_eq!(chain.len(), MAX_CHAIN_LENGTH);
            assert!(chain.starts_with(CHAIN_PREFIX));
            assert!(chain[CHAIN_PREFIX.len()..].chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_chain_name_is_deterministic() {
        assert_eq!(
            format_chain_name("test", "1234"),
            format_chain_name("test", "1234")
        );
    }

    #[test]
    fn test_chain_name_known_digest() {
        // sha512("") starts with cf83e1357eefb8bdf1542850d66d8007
        assert_eq!(format_chain_name("", ""), "CNI-cf83e1357eefb8bdf1542850");
    }

    #[test]
    fn test_chain_name_differs_per_container() {
        assert_ne!(
            format_chain_name("test", "container-1"),
            format_chain_name("test", "container-2")
        );
    }

    #[test]
    fn test_chain_name_hashes_concatenation() {
        // name + id is hashed as one string
        assert_eq!(format_chain_name("ab", "c"), format_chain_name("a", "bc"));
    }
}

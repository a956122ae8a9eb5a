use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable identity of a deployable spec
///
/// Derived from the fields that define a spec's logical identity, so two
/// descriptions of the same service always map to the same key, within a
/// process and across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PodKey(i64);

impl PodKey {
    /// Digest an ordered list of identity fields into a key
    ///
    /// Every field is length-prefixed so `("ab", "c")` and `("a", "bc")`
    /// produce different keys.
    pub fn digest<I, B>(fields: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut hasher = Sha256::new();
        for field in fields {
            let bytes = field.as_ref();
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        }
        let digest = hasher.finalize();

        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Self(i64::from_be_bytes(head))
    }

    /// Key used to allocate the host port of one replica
    pub fn for_replica(&self, index: u32) -> Self {
        Self::digest([
            self.0.to_be_bytes().as_slice(),
            b"replica".as_slice(),
            index.to_be_bytes().as_slice(),
        ])
    }

    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<i64> for PodKey {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Opaque identifier the container runtime assigned to a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, the way `docker ps` shows ids
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContainerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ContainerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        let a = PodKey::digest(["/llama", "/api", "ollama/ollama"]);
        let b = PodKey::digest(["/llama", "/api", "ollama/ollama"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_separates_fields() {
        let joined = PodKey::digest(["ab", "c"]);
        let split = PodKey::digest(["a", "bc"]);
        assert_ne!(joined, split);
    }

    #[test]
    fn test_replica_keys_are_distinct() {
        let key = PodKey::digest(["/svc"]);
        assert_ne!(key.for_replica(0), key.for_replica(1));
        assert_ne!(key.for_replica(0), key);
        assert_eq!(key.for_replica(2), key.for_replica(2));
    }

    #[test]
    fn test_short_container_id() {
        let id = ContainerId::new("4f2a9c1b7e3d8a6f5c0b9e2d");
        assert_eq!(id.short(), "4f2a9c1b7e3d");
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }
}

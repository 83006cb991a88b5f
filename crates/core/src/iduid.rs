//! Identity pairs for schema elements
//!
//! Every entity, property and index carries an [`IdUid`]:
//! - `id`: small sequential number, local to the parent scope, used as the
//!   binary slot / engine identifier
//! - `uid`: random 63-bit number, unique across the whole metadata file,
//!   used to recognize an element after it was renamed
//!
//! The textual form `"<id>:<uid>"` is what the metadata file stores.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Local ID + global UID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IdUid {
    /// Sequential ID within the parent scope (0 = unassigned)
    pub id: u32,
    /// Globally unique ID (0 = unassigned)
    pub uid: u64,
}

impl IdUid {
    /// Both parts unassigned
    pub const UNASSIGNED: IdUid = IdUid { id: 0, uid: 0 };

    /// Create a new pair
    pub const fn new(id: u32, uid: u64) -> Self {
        IdUid { id, uid }
    }

    /// Pair with only the UID set, as declared by a user pinning an element
    pub const fn with_uid(uid: u64) -> Self {
        IdUid { id: 0, uid }
    }

    /// Both ID and UID are assigned; holds for every element after a sync
    pub const fn is_assigned(&self) -> bool {
        self.id != 0 && self.uid != 0
    }

    /// The UID part is set (user supplied or assigned)
    pub const fn has_uid(&self) -> bool {
        self.uid != 0
    }
}

impl fmt::Display for IdUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.uid)
    }
}

impl FromStr for IdUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (id, uid) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidIdUid(s.to_string()))?;
        let id = id
            .parse::<u32>()
            .map_err(|_| Error::InvalidIdUid(s.to_string()))?;
        let uid = uid
            .parse::<u64>()
            .map_err(|_| Error::InvalidIdUid(s.to_string()))?;
        Ok(IdUid { id, uid })
    }
}

impl Serialize for IdUid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IdUid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let iduid = IdUid::new(3, 8_734_129_487_123);
        assert_eq!(iduid.to_string(), "3:8734129487123");
        assert_eq!("3:8734129487123".parse::<IdUid>().unwrap(), iduid);
    }

    #[test]
    fn test_unassigned() {
        assert_eq!(IdUid::UNASSIGNED.to_string(), "0:0");
        assert!(!IdUid::UNASSIGNED.is_assigned());
        assert!(!IdUid::with_uid(5).is_assigned());
        assert!(IdUid::with_uid(5).has_uid());
        assert!(IdUid::new(1, 5).is_assigned());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "1", "1:", ":2", "a:b", "1:2:3", "-1:2"] {
            assert!(
                matches!(bad.parse::<IdUid>(), Err(Error::InvalidIdUid(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_serde_as_string() {
        let iduid = IdUid::new(1, 42);
        let json = serde_json::to_string(&iduid).unwrap();
        assert_eq!(json, "\"1:42\"");
        let back: IdUid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, iduid);
    }

    proptest::proptest! {
        #[test]
        fn prop_string_form_roundtrips(id in proptest::prelude::any::<u32>(), uid in proptest::prelude::any::<u64>()) {
            let iduid = IdUid::new(id, uid);
            proptest::prop_assert_eq!(iduid.to_string().parse::<IdUid>().unwrap(), iduid);
        }
    }
}

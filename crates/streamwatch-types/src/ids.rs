//! Snowflake-style identifiers
//!
//! All identifiers are plain `u64` newtypes. The value `0` is reserved by
//! the upstream platform and never names a real entity; configuration uses
//! it to mean "unset" (see [`Id::is_unset`]).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Common behaviour of every identifier newtype
pub trait Id: Copy + Eq + std::hash::Hash + fmt::Display {
    /// Raw snowflake value
    fn get(self) -> u64;

    /// `true` for the reserved zero value
    #[inline]
    fn is_unset(self) -> bool {
        self.get() == 0
    }
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw snowflake
            #[inline]
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl Id for $name {
            #[inline]
            fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            #[inline]
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Tenant (guild) identifier
    GuildId
);
define_id!(
    /// Member (user) identifier, unique per platform
    MemberId
);
define_id!(
    /// Guild-scoped role identifier
    RoleId
);
define_id!(
    /// Channel identifier
    ChannelId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_display_is_raw_number() {
        assert_eq!(GuildId::new(42).to_string(), "42");
        assert_eq!(RoleId::from(7).to_string(), "7");
    }

    #[test]
    fn zero_is_unset() {
        assert!(RoleId::default().is_unset());
        assert!(!ChannelId::new(5).is_unset());
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&MemberId::new(1234)).unwrap();
        assert_eq!(json, "1234");

        let id: GuildId = serde_json::from_str("99").unwrap();
        assert_eq!(id, GuildId::new(99));
    }
}

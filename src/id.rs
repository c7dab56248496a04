use super::*;
use std::fmt;
use std::str::FromStr;

/// Ids are plain u64 internally, but the persisted schema wants string-form
/// ids. Human-readable formats (json saves) get the decimal string, binary
/// formats (postcard packets) get the raw u64.
macro_rules! impl_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);
        impl $name {
            /// A new random id. Collision within one server is not a concern
            /// at these population sizes.
            pub fn random() -> Self {
                Self(rand::random())
            }
        }
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.collect_str(&self.0)
                } else {
                    serializer.serialize_u64(self.0)
                }
            }
        }
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = <std::borrow::Cow<str>>::deserialize(deserializer)?;
                    s.parse().map_err(serde::de::Error::custom)
                } else {
                    Ok(Self(u64::deserialize(deserializer)?))
                }
            }
        }
    };
}

impl_id!(ColonyId);
impl_id!(CitizenId);
impl_id!(ObserverId);

#[test]
fn test_id_string_form() {
    let id = ColonyId(42);

    assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");
    assert_eq!(
        serde_json::from_str::<ColonyId>("\"42\"").unwrap(),
        ColonyId(42)
    );
    assert_eq!("42".parse::<ColonyId>().unwrap(), id);
}

#[test]
fn test_id_binary_form() {
    let id = CitizenId(u64::MAX);
    let buf = postcard::to_stdvec(&id).unwrap();
    assert_eq!(postcard::from_bytes::<CitizenId>(&buf).unwrap(), id);
}

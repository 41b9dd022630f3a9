//! Macro for string-discriminated unions.
//!
//! UTCP wire documents select their concrete type through a tag field such
//! as `call_template_type`. Known kinds decode into typed variants; unknown
//! kinds are preserved verbatim in an `Other` variant so that plugin
//! registries can claim them later instead of failing at parse time.

macro_rules! tagged_union {
    (
        $(#[$meta:meta])*
        pub enum $name:ident, tag = $tag:literal {
            $( $kind:literal => $variant:ident($inner:ty), )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub enum $name {
            $( $variant($inner), )+
            /// A kind this crate does not know about, kept verbatim for
            /// plugin factories registered under the same discriminator.
            Other {
                kind: String,
                document: serde_json::Value,
            },
        }

        impl $name {
            /// The wire discriminator of this value.
            pub fn kind(&self) -> &str {
                match self {
                    $( Self::$variant(_) => $kind, )+
                    Self::Other { kind, .. } => kind.as_str(),
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                use serde::ser::Error as _;
                let mut value = match self {
                    $( Self::$variant(inner) => {
                        serde_json::to_value(inner).map_err(S::Error::custom)?
                    } )+
                    Self::Other { document, .. } => document.clone(),
                };
                if let serde_json::Value::Object(ref mut map) = value {
                    map.insert(
                        $tag.to_string(),
                        serde_json::Value::String(self.kind().to_string()),
                    );
                }
                value.serialize(serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                use serde::de::Error as _;
                let value = serde_json::Value::deserialize(deserializer)?;
                let kind = value
                    .get($tag)
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| {
                        D::Error::custom(concat!("missing or non-string `", $tag, "` field"))
                    })?
                    .to_string();
                match kind.as_str() {
                    $( $kind => serde_json::from_value(value)
                        .map(Self::$variant)
                        .map_err(D::Error::custom), )+
                    _ => Ok(Self::Other {
                        kind,
                        document: value,
                    }),
                }
            }
        }
    };
}

pub(crate) use tagged_union;

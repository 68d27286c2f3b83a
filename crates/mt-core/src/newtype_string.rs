//! Macro for defining strongly-typed identifier newtypes.
//!
//! Project, model, job and view names share one invariant (non-empty, no
//! `.` separator since dotted paths address namespaces and versions) and one
//! set of trait impls, generated here from a single invocation.

/// Define a strongly-typed, non-empty identifier newtype.
///
/// Generates `new()` (panics on invalid input), `try_new()` (returns a
/// `CoreError`), `as_str()`, `into_inner()`, plus `Display`, `AsRef<str>`,
/// `Deref<Target=str>`, `Borrow<str>`, `PartialEq<&str>` and a validating
/// `Deserialize`.
macro_rules! define_identifier {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident => $kind:literal;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        #[serde(transparent)]
        $vis struct $Name(String);

        impl<'de> serde::Deserialize<'de> for $Name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $Name::try_new(s).map_err(serde::de::Error::custom)
            }
        }

        impl $Name {
            /// Create a new identifier, panicking if it is invalid.
            ///
            /// Prefer [`try_new`](Self::try_new) for untrusted input.
            pub fn new(name: impl Into<String>) -> Self {
                match Self::try_new(name) {
                    Ok(v) => v,
                    Err(e) => panic!("{e}"),
                }
            }

            /// Validate and wrap a name.
            pub fn try_new(name: impl Into<String>) -> $crate::error::CoreResult<Self> {
                let s = name.into();
                if s.is_empty() || s.contains('.') {
                    return Err($crate::error::CoreError::InvalidName { kind: $kind, name: s });
                }
                Ok(Self(s))
            }

            /// Return the underlying name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str { &self.0 }
        }

        impl std::ops::Deref for $Name {
            type Target = str;
            fn deref(&self) -> &str { &self.0 }
        }

        impl std::borrow::Borrow<str> for $Name {
            fn borrow(&self) -> &str { &self.0 }
        }

        impl PartialEq<&str> for $Name {
            fn eq(&self, other: &&str) -> bool { self.0 == *other }
        }
    };
}

pub(crate) use define_identifier;

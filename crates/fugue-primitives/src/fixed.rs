//! Fixed-width byte identifiers

/// Declares a `Copy` newtype over `[u8; N]` with hex parsing and formatting.
macro_rules! fixed_bytes {
    ($(#[$doc:meta])* $name:ident, $len:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Size in bytes
            pub const LEN: usize = $len;

            /// All-zero value
            pub const ZERO: $name = $name([0u8; $len]);

            /// Create from bytes
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }

            /// Create with every byte set to `byte`
            pub const fn repeat_byte(byte: u8) -> Self {
                $name([byte; $len])
            }

            /// Create with `value` big-endian in the trailing 8 bytes
            pub fn from_low_u64_be(value: u64) -> Self {
                let mut bytes = [0u8; $len];
                bytes[$len - 8..].copy_from_slice(&value.to_be_bytes());
                $name(bytes)
            }

            /// Create from slice
            pub fn from_slice(slice: &[u8]) -> Result<Self, $crate::PrimitiveError> {
                if slice.len() != $len {
                    return Err($crate::PrimitiveError::InvalidLength {
                        expected: $len,
                        got: slice.len(),
                    });
                }
                let mut bytes = [0u8; $len];
                bytes.copy_from_slice(slice);
                Ok($name(bytes))
            }

            /// Parse from hex string (with or without 0x prefix)
            pub fn from_hex(s: &str) -> Result<Self, $crate::PrimitiveError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s)
                    .map_err(|e| $crate::PrimitiveError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }

            /// Get as bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Check if zero
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; $len]
            }

            /// Convert to hex string with 0x prefix
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::PrimitiveError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        #[cfg(feature = "serde")]
        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        #[cfg(feature = "serde")]
        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

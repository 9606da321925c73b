/// Base64 helpers shared by the credential plumbing. The wire form of binary
/// credentials is the url-safe alphabet (`-` and `_` in place of `+` and `/`),
/// translated here so the rest of the stack only ever sees the standard one.
pub mod base64 {
    use serde::{Serialize, Serializer};

    pub use base64::DecodeError;

    #[inline]
    pub fn encode(input: &[u8]) -> String {
        base64::encode(input)
    }

    #[inline]
    pub fn decode(input: &str) -> Result<Vec<u8>, DecodeError> {
        base64::decode(input)
    }

    /// Encode to the url-safe alphabet.
    #[inline]
    pub fn encode_url_safe(input: &[u8]) -> String {
        encode(input).replace('/', "_").replace('+', "-")
    }

    /// Decode from the url-safe alphabet. Standard-alphabet input decodes
    /// unchanged since the translation only touches `_` and `-`.
    #[inline]
    pub fn decode_url_safe(input: &str) -> Result<Vec<u8>, DecodeError> {
        decode(&input.replace('_', "/").replace('-', "+"))
    }

    /// Serde helper serializing a byte field as base64 text.
    #[inline]
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        encode(bytes).serialize(serializer)
    }
}

//! Internal implementation of file tokens and stored filenames.

use crate::{TokenError, TokenResult};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Longest extension accepted by [`normalise_extension`].
pub const MAX_EXTENSION_LEN: usize = 16;

/// Canonical file token (32 lowercase hex characters, no hyphens).
///
/// Once you hold a `FileToken` you can assume the contained value is in canonical form.
///
/// # Construction
/// - [`FileToken::new`] generates a fresh random token.
/// - [`FileToken::parse`] validates an externally supplied token.
///
/// # Display format
/// Always the canonical 32-character lowercase hex form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileToken(Uuid);

impl Default for FileToken {
    fn default() -> Self {
        Self::new()
    }
}

impl FileToken {
    /// Generates a new random token.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a token that must already be canonical.
    ///
    /// Hyphenated or uppercase forms are rejected rather than normalised, so the same token can
    /// never appear on disk under two spellings.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidInput`] if `input` is not canonical.
    pub fn parse(input: &str) -> TokenResult<Self> {
        if !Self::is_canonical(input) {
            return Err(TokenError::InvalidInput(format!(
                "token must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| TokenError::InvalidInput(format!("invalid token '{}': {}", input, e)))
    }

    /// Returns true if `input` is exactly 32 lowercase hex characters.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Builds the stored filename `<token>.<extension>`.
    ///
    /// `extension` is expected to be normalised already (see [`normalise_extension`]).
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self, extension)
    }
}

impl fmt::Display for FileToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for FileToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileToken::parse(s)
    }
}

/// Normalises an extension hint into the suffix used for stored filenames.
///
/// Leading dots and surrounding whitespace are stripped and the result is lowercased. Returns
/// `None` when nothing usable remains: an empty value, anything other than ASCII letters and
/// digits, or a suffix longer than [`MAX_EXTENSION_LEN`].
pub fn normalise_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() || trimmed.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}

/// A parsed stored filename: `<token>.<extension>`.
///
/// Carriers keep stored filenames as plain strings; this type is for callers that want to check
/// one or pull it apart.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoredFileName {
    token: FileToken,
    extension: String,
}

impl StoredFileName {
    /// Generates a new stored filename with a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidInput`] if `extension` does not normalise.
    pub fn generate(extension: &str) -> TokenResult<Self> {
        let extension = normalise_extension(extension).ok_or_else(|| {
            TokenError::InvalidInput(format!("unusable file extension: '{}'", extension))
        })?;
        Ok(Self {
            token: FileToken::new(),
            extension,
        })
    }

    /// Parses a complete stored filename, requiring canonical token and extension.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidInput`] if the name has no extension, the token is not
    /// canonical, or the extension is not already in normalised form.
    pub fn parse(input: &str) -> TokenResult<Self> {
        let (token, extension) = input.split_once('.').ok_or_else(|| {
            TokenError::InvalidInput(format!("stored filename has no extension: '{}'", input))
        })?;
        let token = FileToken::parse(token)?;

        match normalise_extension(extension) {
            Some(normalised) if normalised == extension => Ok(Self {
                token,
                extension: normalised,
            }),
            _ => Err(TokenError::InvalidInput(format!(
                "stored filename has a non-canonical extension: '{}'",
                input
            ))),
        }
    }

    pub fn token(&self) -> &FileToken {
        &self.token
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl fmt::Display for StoredFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.token, self.extension)
    }
}

impl FromStr for StoredFileName {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StoredFileName::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_generates_canonical_token() {
        let token = FileToken::new();
        let canonical = token.to_string();

        assert_eq!(canonical.len(), 32);
        assert!(FileToken::is_canonical(&canonical));
    }

    #[test]
    fn test_new_tokens_differ() {
        let tokens: HashSet<String> = (0..256).map(|_| FileToken::new().to_string()).collect();
        assert_eq!(tokens.len(), 256);
    }

    #[test]
    fn test_parse_valid_canonical_token() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let token = FileToken::parse(canonical).unwrap();

        assert_eq!(token.to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated_token() {
        let result = FileToken::parse("550e8400-e29b-41d4-a716-446655440000");

        match result {
            Err(TokenError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_uppercase_and_bad_lengths() {
        assert!(FileToken::parse("550E8400E29B41D4A716446655440000").is_err());
        assert!(FileToken::parse("550e8400e29b41d4a71644665544000").is_err());
        assert!(FileToken::parse("550e8400e29b41d4a7164466554400000").is_err());
        assert!(FileToken::parse("550e8400e29b41d4a716446655440zzz").is_err());
        assert!(FileToken::parse("").is_err());
    }

    #[test]
    fn test_file_name_appends_extension() {
        let token = FileToken::parse("550e8400e29b41d4a716446655440000").unwrap();
        assert_eq!(
            token.file_name("pdf"),
            "550e8400e29b41d4a716446655440000.pdf"
        );
    }

    #[test]
    fn test_normalise_extension() {
        assert_eq!(normalise_extension("pdf"), Some("pdf".to_string()));
        assert_eq!(normalise_extension(".PNG"), Some("png".to_string()));
        assert_eq!(normalise_extension("  Jpeg "), Some("jpeg".to_string()));
        assert_eq!(normalise_extension("mp4"), Some("mp4".to_string()));
    }

    #[test]
    fn test_normalise_extension_rejects_unusable_values() {
        assert_eq!(normalise_extension(""), None);
        assert_eq!(normalise_extension("..."), None);
        assert_eq!(normalise_extension("tar.gz"), None);
        assert_eq!(normalise_extension("../etc"), None);
        assert_eq!(normalise_extension("a/b"), None);
        assert_eq!(normalise_extension("abcdefghijklmnopq"), None);
    }

    #[test]
    fn test_stored_file_name_generate_and_parse() {
        let generated = StoredFileName::generate(".PDF").unwrap();
        assert_eq!(generated.extension(), "pdf");

        let parsed = StoredFileName::parse(&generated.to_string()).unwrap();
        assert_eq!(parsed, generated);
    }

    #[test]
    fn test_stored_file_name_generate_rejects_bad_extension() {
        assert!(StoredFileName::generate("a/b").is_err());
    }

    #[test]
    fn test_stored_file_name_parse_rejects_malformed() {
        assert!(StoredFileName::parse("550e8400e29b41d4a716446655440000").is_err());
        assert!(StoredFileName::parse("abc123.pdf").is_err());
        assert!(StoredFileName::parse("550e8400e29b41d4a716446655440000.PDF").is_err());
        assert!(StoredFileName::parse("550e8400e29b41d4a716446655440000.tar.gz").is_err());
    }
}

//! File signature table.
//!
//! A [`Signature`] pairs a header magic with the way its file end is found:
//! either a footer magic ([`EndMarker::Footer`]) or, for formats without a
//! reliable trailer, the next occurrence of the same header
//! ([`EndMarker::NextHeader`]). Signatures are validated when they are built,
//! so a bad table is rejected before any byte of the device is read.

use crate::error::{CoreError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Images,
    Videos,
    Other,
}

impl Category {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Videos => "videos",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "images" | "image" => Ok(Self::Images),
            "videos" | "video" => Ok(Self::Videos),
            "other" => Ok(Self::Other),
            _ => Err(CoreError::InvalidConfig(format!("unknown category '{s}'"))),
        }
    }
}

/// How the end of a carved file is detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndMarker {
    /// Stop at `bytes`, keeping `inclusive_len` bytes counted from the start
    /// of the footer match.
    Footer { bytes: Vec<u8>, inclusive_len: usize },
    /// No footer: the file runs until the next occurrence of its own header.
    NextHeader,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    name: String,
    extension: String,
    category: Category,
    header: Vec<u8>,
    end: EndMarker,
}

impl Signature {
    /// Builds a footer-terminated signature.
    ///
    /// Fails if the header or footer is empty, or if `inclusive_len` would
    /// cut the footer itself short.
    pub fn with_footer(
        name: impl Into<String>,
        extension: impl Into<String>,
        category: Category,
        header: impl Into<Vec<u8>>,
        footer: impl Into<Vec<u8>>,
        inclusive_len: usize,
    ) -> Result<Self> {
        let signature = Self {
            name: name.into(),
            extension: extension.into(),
            category,
            header: header.into(),
            end: EndMarker::Footer {
                bytes: footer.into(),
                inclusive_len,
            },
        };
        signature.validate()?;
        Ok(signature)
    }

    /// Builds a footer-less signature bounded by its next header.
    pub fn heuristic(
        name: impl Into<String>,
        extension: impl Into<String>,
        category: Category,
        header: impl Into<Vec<u8>>,
    ) -> Result<Self> {
        let signature = Self {
            name: name.into(),
            extension: extension.into(),
            category,
            header: header.into(),
            end: EndMarker::NextHeader,
        };
        signature.validate()?;
        Ok(signature)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::invalid_signature(&self.name, "empty name"));
        }
        if self.extension.is_empty()
            || !self.extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(CoreError::invalid_signature(
                &self.name,
                format!("extension '{}' must be non-empty ASCII alphanumerics", self.extension),
            ));
        }
        if self.header.is_empty() {
            return Err(CoreError::invalid_signature(&self.name, "empty header"));
        }
        if let EndMarker::Footer {
            bytes,
            inclusive_len,
        } = &self.end
        {
            if bytes.is_empty() {
                return Err(CoreError::invalid_signature(&self.name, "empty footer"));
            }
            if *inclusive_len < bytes.len() {
                return Err(CoreError::invalid_signature(
                    &self.name,
                    format!(
                        "footer length {} is shorter than the {}-byte footer",
                        inclusive_len,
                        bytes.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    #[inline]
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[inline]
    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    #[inline]
    #[must_use]
    pub fn end(&self) -> &EndMarker {
        &self.end
    }

    #[must_use]
    pub fn footer(&self) -> Option<&[u8]> {
        match &self.end {
            EndMarker::Footer { bytes, .. } => Some(bytes),
            EndMarker::NextHeader => None,
        }
    }

    #[must_use]
    pub fn is_heuristic(&self) -> bool {
        matches!(self.end, EndMarker::NextHeader)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name.to_ascii_uppercase())
    }
}

/// Which signatures a run should carve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Format(String),
    Category(Category),
    All,
}

impl FromStr for Selection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().to_ascii_lowercase();
        if value.is_empty() {
            return Err(CoreError::InvalidConfig("empty format selection".into()));
        }
        if value == "all" {
            return Ok(Self::All);
        }
        match value.parse::<Category>() {
            Ok(category) => Ok(Self::Category(category)),
            Err(_) => Ok(Self::Format(value)),
        }
    }
}

/// Ordered table of known signatures.
///
/// Order matters: passes run in registry order, and the file counter is
/// shared across passes, so the table order fixes the output numbering.
#[derive(Debug, Clone)]
pub struct SignatureRegistry {
    signatures: Vec<Signature>,
}

impl SignatureRegistry {
    /// Creates a registry from the given signatures, validating each one.
    pub fn new(signatures: Vec<Signature>) -> Result<Self> {
        let mut registry = Self {
            signatures: Vec::with_capacity(signatures.len()),
        };
        registry.extend(signatures)?;
        Ok(registry)
    }

    /// PNG, JPG, MP4 and MKV, in that order.
    #[must_use]
    pub fn builtin() -> Self {
        let signatures = vec![
            // IEND plus the 4 bytes of its CRC
            known(
                "png",
                Category::Images,
                &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
                EndMarker::Footer {
                    bytes: b"IEND".to_vec(),
                    inclusive_len: 8,
                },
            ),
            known(
                "jpg",
                Category::Images,
                &[0xFF, 0xD8, 0xFF],
                EndMarker::Footer {
                    bytes: vec![0xFF, 0xD9],
                    inclusive_len: 2,
                },
            ),
            // 24-byte ftyp box, major brand mp42
            known(
                "mp4",
                Category::Videos,
                b"\x00\x00\x00\x18ftypmp42",
                EndMarker::NextHeader,
            ),
            // EBML magic
            known(
                "mkv",
                Category::Videos,
                &[0x1A, 0x45, 0xDF, 0xA3],
                EndMarker::NextHeader,
            ),
        ];
        Self { signatures }
    }

    /// Adds a signature after the existing ones.
    ///
    /// Names that a [`Selection`] reads as a category or as `all` are
    /// rejected, since such a signature could never be selected by name.
    pub fn register(&mut self, signature: Signature) -> Result<()> {
        signature.validate()?;
        if !matches!(signature.name().parse::<Selection>(), Ok(Selection::Format(_))) {
            return Err(CoreError::invalid_signature(
                signature.name(),
                "name is reserved for a selection",
            ));
        }
        if self.get(signature.name()).is_some() {
            return Err(CoreError::DuplicateSignature(signature.name().to_string()));
        }
        self.signatures.push(signature);
        Ok(())
    }

    pub fn extend(&mut self, signatures: impl IntoIterator<Item = Signature>) -> Result<()> {
        for signature in signatures {
            self.register(signature)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Signature> {
        self.signatures
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Resolves a selection to the ordered list of signatures to carve.
    pub fn signatures_for(&self, selection: &Selection) -> Result<Vec<&Signature>> {
        match selection {
            Selection::All => Ok(self.signatures.iter().collect()),
            Selection::Category(category) => Ok(self
                .signatures
                .iter()
                .filter(|s| s.category == *category)
                .collect()),
            Selection::Format(name) => self
                .get(name)
                .map(|s| vec![s])
                .ok_or_else(|| CoreError::UnknownFormat(name.clone())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn known(name: &str, category: Category, header: &[u8], end: EndMarker) -> Signature {
    let signature = Signature {
        name: name.to_string(),
        extension: name.to_string(),
        category,
        header: header.to_vec(),
        end,
    };
    debug_assert!(signature.validate().is_ok(), "bad built-in signature {name}");
    signature
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_is_valid_and_ordered() {
        let registry = SignatureRegistry::builtin();
        for signature in registry.iter() {
            signature.validate().unwrap();
        }

        let names: Vec<_> = registry.iter().map(Signature::name).collect();
        assert_eq!(names, ["png", "jpg", "mp4", "mkv"]);
    }

    #[test]
    fn test_builtin_jpeg_descriptor() {
        let registry = SignatureRegistry::builtin();
        let jpg = registry.get("JPG").unwrap();

        assert_eq!(jpg.header(), &[0xFF, 0xD8, 0xFF]);
        assert_eq!(
            jpg.end(),
            &EndMarker::Footer {
                bytes: vec![0xFF, 0xD9],
                inclusive_len: 2
            }
        );
        assert_eq!(jpg.extension(), "jpg");
        assert!(!jpg.is_heuristic());
    }

    #[test]
    fn test_video_category_selects_heuristic_formats() {
        let registry = SignatureRegistry::builtin();
        let videos = registry
            .signatures_for(&Selection::Category(Category::Videos))
            .unwrap();

        let names: Vec<_> = videos.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["mp4", "mkv"]);
        assert!(videos.iter().all(|s| s.is_heuristic()));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let registry = SignatureRegistry::builtin();
        let err = registry
            .signatures_for(&Selection::Format("gif".into()))
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownFormat(name) if name == "gif"));
    }

    #[test]
    fn test_empty_header_is_rejected() {
        let err = Signature::heuristic("raw", "raw", Category::Other, Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignature { .. }));
    }

    #[test]
    fn test_footer_length_shorter_than_footer_is_rejected() {
        let err =
            Signature::with_footer("gif", "gif", Category::Images, *b"GIF89a", [0x00u8, 0x3B], 1)
                .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignature { .. }));

        let empty_footer =
            Signature::with_footer("gif", "gif", Category::Images, *b"GIF89a", Vec::<u8>::new(), 0);
        assert!(empty_footer.is_err());
    }

    #[test]
    fn test_extension_must_be_path_safe() {
        let err = Signature::heuristic("evil", "../x", Category::Other, *b"EV").unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignature { .. }));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut registry = SignatureRegistry::builtin();
        let dup = Signature::heuristic("PNG", "png", Category::Images, *b"PN").unwrap();
        assert!(matches!(
            registry.register(dup),
            Err(CoreError::DuplicateSignature(_))
        ));
    }

    #[test]
    fn test_selection_names_cannot_be_registered() {
        let mut registry = SignatureRegistry::builtin();
        for name in ["all", "Images", "video", "other"] {
            let signature = Signature::heuristic(name, "bin", Category::Other, *b"XY").unwrap();
            assert!(matches!(
                registry.register(signature),
                Err(CoreError::InvalidSignature { .. })
            ));
        }
        assert_eq!(registry.len(), 4);

        let gif = Signature::heuristic("gif", "gif", Category::Images, *b"GIF8").unwrap();
        registry.register(gif).unwrap();
        assert_eq!(
            registry
                .signatures_for(&"gif".parse().unwrap())
                .unwrap()[0]
                .name(),
            "gif"
        );
    }

    #[test]
    fn test_selection_parsing() {
        assert_eq!("all".parse::<Selection>().unwrap(), Selection::All);
        assert_eq!(
            "Videos".parse::<Selection>().unwrap(),
            Selection::Category(Category::Videos)
        );
        assert_eq!(
            "JPG".parse::<Selection>().unwrap(),
            Selection::Format("jpg".into())
        );
        assert!("  ".parse::<Selection>().is_err());
    }
}

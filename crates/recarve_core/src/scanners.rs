use crate::signatures::{EndMarker, Signature};
use memchr::memmem::Finder;

/// Precompiled literal searchers for one signature.
///
/// Searches are confined to the buffer they are given; a marker that
/// straddles two buffers is never reported.
#[derive(Debug, Clone)]
pub struct SignatureScanner<'a> {
    header_finder: Finder<'a>,
    footer_finder: Option<Finder<'a>>,
}

impl<'a> SignatureScanner<'a> {
    #[must_use]
    pub fn new(signature: &'a Signature) -> Self {
        let footer_finder = match signature.end() {
            EndMarker::Footer { bytes, .. } => Some(Finder::new(bytes)),
            EndMarker::NextHeader => None,
        };
        Self {
            header_finder: Finder::new(signature.header()),
            footer_finder,
        }
    }

    #[inline]
    #[must_use]
    pub fn find_header(&self, buffer: &[u8]) -> Option<usize> {
        self.header_finder.find(buffer)
    }

    /// Always `None` for footer-less signatures.
    #[inline]
    #[must_use]
    pub fn find_footer(&self, buffer: &[u8]) -> Option<usize> {
        self.footer_finder.as_ref()?.find(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::SignatureRegistry;

    fn jpeg() -> Signature {
        SignatureRegistry::builtin().get("jpg").unwrap().clone()
    }

    #[test]
    fn test_jpeg_header_single_match() {
        let signature = jpeg();
        let scanner = SignatureScanner::new(&signature);

        let buffer: Vec<u8> = [
            &[0x00, 0x11, 0x22, 0x33, 0x44][..],
            &[0xFF, 0xD8, 0xFF][..],
            &[0xE0, 0x00, 0x10][..],
        ]
        .concat();

        assert_eq!(scanner.find_header(&buffer), Some(5));
        assert_eq!(scanner.find_header(&buffer[6..]), None);
    }

    #[test]
    fn test_jpeg_footer_first_match_wins() {
        let signature = jpeg();
        let scanner = SignatureScanner::new(&signature);

        let buffer: Vec<u8> = [
            &[0x00, 0x11][..],
            &[0xFF, 0xD9][..],
            &[0xAA][..],
            &[0xFF, 0xD9][..],
        ]
        .concat();

        assert_eq!(scanner.find_footer(&buffer), Some(2));
    }

    #[test]
    fn test_partial_header_not_matched() {
        let signature = jpeg();
        let scanner = SignatureScanner::new(&signature);

        assert_eq!(scanner.find_header(&[0xFF, 0xD8, 0x00, 0x00]), None);
        assert_eq!(scanner.find_header(&[]), None);
    }

    #[test]
    fn test_heuristic_signature_has_no_footer() {
        let registry = SignatureRegistry::builtin();
        let mkv = registry.get("mkv").unwrap();
        let scanner = SignatureScanner::new(mkv);

        let buffer = [0x00, 0x1A, 0x45, 0xDF, 0xA3, 0x00, 0x1A, 0x45, 0xDF, 0xA3];
        assert_eq!(scanner.find_footer(&buffer), None);
        assert_eq!(scanner.find_header(&buffer), Some(1));
        assert_eq!(scanner.find_header(&buffer[2..]), Some(4));
    }
}

use std::fmt;
use std::str::FromStr;

use encoding_rs::Encoding;
use serde::Deserialize;

use crate::error::ReaderError;

/// Character set used to decode input files into text.
///
/// Any WHATWG label is accepted as long as the encoding keeps `\n` as a single
/// ASCII byte, since files are split into lines before decoding.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct CharacterEncoding(&'static Encoding);

impl CharacterEncoding {
    pub fn utf8() -> Self {
        Self(encoding_rs::UTF_8)
    }

    pub fn for_label(label: &str) -> Result<Self, ReaderError> {
        match Encoding::for_label(label.trim().as_bytes()) {
            Some(encoding) if encoding.is_ascii_compatible() => Ok(Self(encoding)),
            _ => Err(ReaderError::UnsupportedEncoding(label.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        self.0.name()
    }

    /// Decodes one physical line. Returns `None` when `bytes` is not valid in
    /// this encoding.
    pub fn decode(self, bytes: Vec<u8>) -> Option<String> {
        if self.0 == encoding_rs::UTF_8 {
            return String::from_utf8(bytes).ok();
        }
        self.0
            .decode_without_bom_handling_and_without_replacement(&bytes)
            .map(|text| text.into_owned())
    }
}

impl Default for CharacterEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}

impl fmt::Display for CharacterEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CharacterEncoding {
    type Err = ReaderError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::for_label(raw)
    }
}

impl TryFrom<String> for CharacterEncoding {
    type Error = ReaderError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::for_label(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_case_insensitive() {
        assert_eq!("utf-8".parse::<CharacterEncoding>().unwrap(), CharacterEncoding::utf8());
        assert_eq!("UTF8".parse::<CharacterEncoding>().unwrap(), CharacterEncoding::utf8());
        assert_eq!("ISO-8859-1".parse::<CharacterEncoding>().unwrap().name(), "windows-1252");
        assert_eq!("Shift_JIS".parse::<CharacterEncoding>().unwrap().name(), "Shift_JIS");
        assert_eq!("koi8-r".parse::<CharacterEncoding>().unwrap().name(), "KOI8-R");
        assert!(matches!(
            "EBCDIC".parse::<CharacterEncoding>(),
            Err(ReaderError::UnsupportedEncoding(name)) if name == "EBCDIC"
        ));
    }

    #[test]
    fn encodings_without_ascii_newlines_are_rejected() {
        assert!(matches!(
            "UTF-16LE".parse::<CharacterEncoding>(),
            Err(ReaderError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn single_byte_charsets_decode_non_ascii() {
        let latin1: CharacterEncoding = "latin1".parse().unwrap();
        assert_eq!(latin1.decode(vec![b'c', 0xE9]).unwrap(), "c\u{e9}");
        let cyrillic: CharacterEncoding = "windows-1251".parse().unwrap();
        assert_eq!(cyrillic.decode(vec![0xC4, 0xE0]).unwrap(), "\u{414}\u{430}");
        assert!(CharacterEncoding::utf8().decode(vec![b'c', 0xE9]).is_none());
    }

    #[test]
    fn invalid_multi_byte_sequences_fail() {
        let sjis: CharacterEncoding = "shift_jis".parse().unwrap();
        assert_eq!(sjis.decode(vec![0x82, 0xA0]).unwrap(), "\u{3042}");
        assert!(sjis.decode(vec![0x82]).is_none());
    }
}

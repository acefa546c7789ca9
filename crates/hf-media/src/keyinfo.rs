//! Key-info descriptor for ffmpeg's `-hls_key_info_file`.
//!
//! The file is line-oriented:
//!
//! ```text
//! <key URI written into the playlist>
//! <path of the key file ffmpeg reads>
//! <optional IV, 32 hex digits>
//! ```
//!
//! ffmpeg re-reads this file at every key rotation boundary, so a static
//! descriptor plus `-hls_key_rotation_period` is enough to rotate.

use std::fmt::Write;
use std::path::PathBuf;

use hf_core::{Error, Result};

/// Parsed or to-be-written key-info descriptor. Holds no key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    /// URI the player fetches the key from.
    pub uri: String,
    /// Path the encoder reads the 16-byte key from.
    pub key_path: PathBuf,
    /// Initialization vector; `None` lets the encoder derive it from the
    /// segment sequence number.
    pub iv: Option<[u8; 16]>,
}

impl KeyInfo {
    /// Render the descriptor text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.uri);
        let _ = writeln!(out, "{}", self.key_path.display());
        if let Some(iv) = self.iv {
            let _ = writeln!(out, "{}", hex::encode(iv));
        }
        out
    }

    /// Parse descriptor text.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] if the URI or key path line is missing, or the
    /// IV line is not 32 hex digits.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let uri = lines
            .next()
            .ok_or_else(|| Error::Validation("key info is missing the key URI".into()))?;
        let key_path = lines
            .next()
            .ok_or_else(|| Error::Validation("key info is missing the key file path".into()))?;
        let iv = lines.next().map(parse_iv).transpose()?;

        Ok(Self {
            uri: uri.to_string(),
            key_path: PathBuf::from(key_path),
            iv,
        })
    }
}

fn parse_iv(s: &str) -> Result<[u8; 16]> {
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let mut iv = [0u8; 16];
    hex::decode_to_slice(s, &mut iv)
        .map_err(|e| Error::Validation(format!("invalid key info IV '{s}': {e}")))?;
    Ok(iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_with_iv() {
        let info = KeyInfo {
            uri: "enc.key".into(),
            key_path: PathBuf::from("/out/run/720p/enc.key"),
            iv: Some([0xab; 16]),
        };
        assert_eq!(
            info.render(),
            "enc.key\n/out/run/720p/enc.key\nabababababababababababababababab\n"
        );
    }

    #[test]
    fn render_without_iv_has_two_lines() {
        let info = KeyInfo {
            uri: "https://cdn.example.com/keys/720p/enc.key".into(),
            key_path: PathBuf::from("720p/enc.key"),
            iv: None,
        };
        assert_eq!(info.render().lines().count(), 2);
    }

    #[test]
    fn parse_rendered() {
        let info = KeyInfo {
            uri: "enc.key".into(),
            key_path: PathBuf::from("/tmp/enc.key"),
            iv: Some([7; 16]),
        };
        assert_eq!(KeyInfo::parse(&info.render()).unwrap(), info);
    }

    #[test]
    fn parse_accepts_0x_prefix() {
        let text = "k\n/p\n0x000102030405060708090a0b0c0d0e0f\n";
        let info = KeyInfo::parse(text).unwrap();
        assert_eq!(info.iv.unwrap()[15], 0x0f);
    }

    #[test]
    fn parse_rejects_short_iv_and_missing_path() {
        assert!(KeyInfo::parse("k\n/p\nabcd\n").is_err());
        assert!(KeyInfo::parse("only-uri\n").is_err());
    }
}

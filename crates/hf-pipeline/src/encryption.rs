//! Encryption manager: AES-128 key material and key-info descriptors.
//!
//! Each rendition gets its own random key and descriptor in its own
//! directory. When a rotation period is set the encoder switches keys every
//! N segments by re-reading the descriptor; this module only supplies the
//! initial key and the descriptor.
//!
//! Key bytes never reach a log line or the master manifest.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use hf_core::{EncryptionConfig, Error, RenditionSpec};
use hf_media::KeyInfo;
use rand::rngs::OsRng;
use rand::RngCore;

/// Key file name inside a rendition directory.
pub const KEY_FILE: &str = "enc.key";
/// Key-info descriptor file name inside a rendition directory.
pub const KEY_INFO_FILE: &str = "enc.keyinfo";

/// A 128-bit AES key. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct AesKey([u8; 16]);

impl AesKey {
    /// Draw a key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey(<redacted>)")
    }
}

/// Files written for one rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyArtifacts {
    pub key_path: PathBuf,
    pub key_info_path: PathBuf,
    /// URI the player will fetch the key from.
    pub uri: String,
}

/// Creates per-rendition key material for one conversion.
#[derive(Debug, Clone)]
pub struct EncryptionManager {
    config: EncryptionConfig,
}

impl EncryptionManager {
    /// `None` when encryption is disabled.
    pub fn new(config: &EncryptionConfig) -> Option<Self> {
        config.enabled.then(|| Self {
            config: config.clone(),
        })
    }

    pub fn rotation_period(&self) -> Option<u32> {
        self.config.rotation_period()
    }

    /// Key URI written into the descriptor for a rendition.
    pub fn key_uri(&self, rendition: &RenditionSpec) -> String {
        match self.config.key_uri_prefix.as_deref() {
            Some(prefix) => format!(
                "{}/{}/{}",
                prefix.trim_end_matches('/'),
                rendition.dir_name,
                KEY_FILE
            ),
            None => KEY_FILE.to_string(),
        }
    }

    /// Write `enc.key` and `enc.keyinfo` into `output_dir`.
    ///
    /// # Errors
    ///
    /// [`Error::EncryptionSetup`] if either file cannot be written.
    pub fn prepare(
        &self,
        rendition: &RenditionSpec,
        output_dir: &Path,
    ) -> hf_core::Result<KeyArtifacts> {
        let key_path = output_dir.join(KEY_FILE);
        let key_info_path = output_dir.join(KEY_INFO_FILE);

        let key = AesKey::generate();
        write_secret(&key_path, key.as_bytes()).map_err(|e| {
            Error::EncryptionSetup(format!("cannot write {}: {e}", key_path.display()))
        })?;

        let iv = self.config.with_iv.then(|| {
            let mut iv = [0u8; 16];
            OsRng.fill_bytes(&mut iv);
            iv
        });
        let uri = self.key_uri(rendition);
        let info = KeyInfo {
            uri: uri.clone(),
            key_path: key_path.clone(),
            iv,
        };
        std::fs::write(&key_info_path, info.render()).map_err(|e| {
            Error::EncryptionSetup(format!("cannot write {}: {e}", key_info_path.display()))
        })?;

        tracing::debug!(
            rendition = %rendition.label,
            key_info = %key_info_path.display(),
            rotation = ?self.rotation_period(),
            "key material prepared"
        );

        Ok(KeyArtifacts {
            key_path,
            key_info_path,
            uri,
        })
    }
}

/// Write key bytes, readable by the owner only where the platform allows.
fn write_secret(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_core::Kbps;

    fn rendition() -> RenditionSpec {
        RenditionSpec::for_label("1280x720", Some(Kbps(2500)))
    }

    #[test]
    fn disabled_config_has_no_manager() {
        assert!(EncryptionManager::new(&EncryptionConfig::default()).is_none());
        assert!(EncryptionManager::new(&EncryptionConfig::enabled()).is_some());
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = AesKey::generate();
        assert_eq!(format!("{key:?}"), "AesKey(<redacted>)");
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(AesKey::generate(), AesKey::generate());
    }

    #[test]
    fn prepare_writes_key_and_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = EncryptionManager::new(&EncryptionConfig::rotating(5)).unwrap();
        let artifacts = mgr.prepare(&rendition(), dir.path()).unwrap();

        let key = std::fs::read(&artifacts.key_path).unwrap();
        assert_eq!(key.len(), 16);

        let text = std::fs::read_to_string(&artifacts.key_info_path).unwrap();
        let info = KeyInfo::parse(&text).unwrap();
        assert_eq!(info.uri, "enc.key");
        assert_eq!(info.key_path, artifacts.key_path);
        assert!(info.iv.is_none());
        assert_eq!(text.lines().count(), 2);
        assert_eq!(mgr.rotation_period(), Some(5));
    }

    #[test]
    fn descriptor_with_explicit_iv() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EncryptionConfig {
            with_iv: true,
            ..EncryptionConfig::enabled()
        };
        let mgr = EncryptionManager::new(&cfg).unwrap();
        let artifacts = mgr.prepare(&rendition(), dir.path()).unwrap();
        let text = std::fs::read_to_string(&artifacts.key_info_path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(KeyInfo::parse(&text).unwrap().iv.is_some());
    }

    #[test]
    fn uri_prefix_includes_rendition_dir() {
        let cfg = EncryptionConfig {
            key_uri_prefix: Some("https://keys.example.com/run1/".into()),
            ..EncryptionConfig::enabled()
        };
        let mgr = EncryptionManager::new(&cfg).unwrap();
        assert_eq!(
            mgr.key_uri(&rendition()),
            "https://keys.example.com/run1/720p/enc.key"
        );
    }

    #[test]
    fn unwritable_directory_is_setup_error() {
        let mgr = EncryptionManager::new(&EncryptionConfig::enabled()).unwrap();
        let err = mgr
            .prepare(&rendition(), Path::new("/nonexistent/dir/for/keys"))
            .unwrap_err();
        assert!(matches!(err, Error::EncryptionSetup(_)));
    }

    #[test]
    fn each_rendition_gets_its_own_key() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        let mgr = EncryptionManager::new(&EncryptionConfig::enabled()).unwrap();
        let ka = mgr.prepare(&rendition(), &a).unwrap();
        let kb = mgr.prepare(&rendition(), &b).unwrap();
        assert_ne!(
            std::fs::read(ka.key_path).unwrap(),
            std::fs::read(kb.key_path).unwrap()
        );
    }
}

//! On-disk certificate persistence.
//!
//! Each certificate lives in its configured save path as two files:
//!
//! ```text
//! <savePath>/
//! ├── <name>.pem    # full chain
//! └── <name>.key    # private key (0600 on Unix)
//! ```
//!
//! Writes go to a sibling temporary file first and are renamed into place, so
//! a reader never observes a half-written chain or key.

use std::fs;
use std::io::Write;
use std::path::Path;

use certdx_config::CertificationConfig;
use tracing::{debug, info, trace};

use crate::errors::StorageError;

/// Previously saved `(fullchain, key)` for a certificate, if both files exist.
pub fn load_saved_cert(
    config: &CertificationConfig,
) -> Result<Option<(Vec<u8>, Vec<u8>)>, StorageError> {
    let chain_path = config.fullchain_path();
    let key_path = config.key_path();

    if !chain_path.exists() || !key_path.exists() {
        trace!(cert = %config.name, "No saved certificate found");
        return Ok(None);
    }

    let chain = fs::read(&chain_path).map_err(|e| StorageError::io(&chain_path, e))?;
    let key = fs::read(&key_path).map_err(|e| StorageError::io(&key_path, e))?;

    debug!(
        cert = %config.name,
        path = %chain_path.display(),
        "Loaded saved certificate"
    );
    Ok(Some((chain, key)))
}

/// Persist chain and key for a certificate, creating the save path if needed.
///
/// Each file is replaced atomically but the pair is not. The key is written
/// first, so a saved chain is never newer than the key next to it.
pub fn save_cert(
    config: &CertificationConfig,
    fullchain: &[u8],
    key: &[u8],
) -> Result<(), StorageError> {
    fs::create_dir_all(&config.save_path).map_err(|e| StorageError::io(&config.save_path, e))?;

    write_atomic(&config.key_path(), key, true)?;
    write_atomic(&config.fullchain_path(), fullchain, false)?;

    info!(
        cert = %config.name,
        path = %config.save_path.display(),
        "Saved certificate"
    );
    Ok(())
}

fn write_atomic(path: &Path, content: &[u8], private: bool) -> Result<(), StorageError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    let mut file = fs::File::create(tmp_path).map_err(|e| StorageError::io(tmp_path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if private {
            fs::set_permissions(tmp_path, fs::Permissions::from_mode(0o600))
                .map_err(|e| StorageError::io(tmp_path, e))?;
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    file.write_all(content)
        .and_then(|_| file.sync_all())
        .map_err(|e| StorageError::io(tmp_path, e))?;
    drop(file);

    fs::rename(tmp_path, path).map_err(|e| StorageError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cert_config(dir: &Path) -> CertificationConfig {
        CertificationConfig {
            name: "example".to_string(),
            save_path: dir.to_path_buf(),
            domains: vec!["example.com".to_string()],
            reload_command: None,
        }
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_saved_cert(&cert_config(dir.path())).unwrap().is_none());
    }

    #[test]
    fn test_load_requires_both_files() {
        let dir = TempDir::new().unwrap();
        let config = cert_config(dir.path());
        fs::write(config.fullchain_path(), b"chain").unwrap();
        assert!(load_saved_cert(&config).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let config = cert_config(&dir.path().join("nested"));

        save_cert(&config, b"chain", b"key").unwrap();

        let (chain, key) = load_saved_cert(&config).unwrap().unwrap();
        assert_eq!(chain, b"chain");
        assert_eq!(key, b"key");
        assert!(!dir.path().join("nested/example.pem.tmp").exists());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let config = cert_config(dir.path());

        save_cert(&config, b"old-chain", b"old-key").unwrap();
        save_cert(&config, b"new-chain", b"new-key").unwrap();

        assert_eq!(fs::read(config.fullchain_path()).unwrap(), b"new-chain");
        assert_eq!(fs::read(config.key_path()).unwrap(), b"new-key");
    }

    #[test]
    fn test_key_is_written_before_chain() {
        let dir = TempDir::new().unwrap();
        let config = cert_config(dir.path());
        save_cert(&config, b"old-chain", b"old-key").unwrap();

        // A directory in the way of the chain's temp file fails the second write.
        let mut blocker = config.fullchain_path().into_os_string();
        blocker.push(".tmp");
        fs::create_dir(&blocker).unwrap();

        let err = save_cert(&config, b"new-chain", b"new-key").unwrap_err();
        assert!(matches!(
            err,
            StorageError::Io { ref path, .. } if path.as_os_str() == blocker.as_os_str()
        ));
        assert_eq!(fs::read(config.key_path()).unwrap(), b"new-key");
        assert_eq!(fs::read(config.fullchain_path()).unwrap(), b"old-chain");
    }

    #[cfg(unix)]
    #[test]
    fn test_key_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let config = cert_config(dir.path());
        save_cert(&config, b"chain", b"key").unwrap();

        let mode = fs::metadata(config.key_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

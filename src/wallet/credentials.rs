//! Wallet seed loading
//!
//! Seeds live in a file next to the config, either as a JSON byte array or as
//! a hex string. Files readable by group or others are refused.

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

use super::signer::LocalSigner;

/// Load a local signer from a seed file
pub fn load_signer(path: &Path) -> Result<LocalSigner> {
    debug!("Loading wallet seed from: {:?}", path);

    // Validate permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(Error::InsecureKeypair(format!(
                    "Seed file {} has insecure permissions {:o}. Run 'chmod 600 {}'",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }
        }
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidKeypair(format!("Failed to read seed file {}: {}", path.display(), e))
    })?;

    let secret = parse_secret(&content)?;
    LocalSigner::from_seed(&secret)
}

/// Accepts `[1,2,...]` or a hex string, surrounding whitespace ignored
pub fn parse_secret(content: &str) -> Result<Vec<u8>> {
    let content = content.trim();
    if content.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(content)
            .map_err(|e| Error::InvalidKeypair(format!("Failed to parse seed JSON: {}", e)))
    } else {
        hex::decode(content)
            .map_err(|e| Error::InvalidKeypair(format!("Failed to parse seed hex: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::signer::TransferSigner;
    use std::io::Write;

    #[test]
    fn test_parse_secret_formats() {
        let from_hex = parse_secret(&hex::encode([5u8; 32])).unwrap();
        let from_json = parse_secret(&serde_json::to_string(&vec![5u8; 32]).unwrap()).unwrap();
        assert_eq!(from_hex, from_json);
        assert!(parse_secret("not a seed").is_err());
    }

    #[test]
    fn test_load_signer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", hex::encode([5u8; 32])).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();
        }

        let signer = load_signer(file.path()).unwrap();
        let expected = LocalSigner::from_seed(&[5u8; 32]).unwrap();
        assert_eq!(signer.public_key(), expected.public_key());
    }

    #[cfg(unix)]
    #[test]
    fn test_insecure_permissions_refused() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", hex::encode([5u8; 32])).unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        assert!(matches!(
            load_signer(file.path()),
            Err(Error::InsecureKeypair(_))
        ));
    }
}

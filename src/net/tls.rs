//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

/// Load TLS configuration from PEM certificate and key files.
///
/// `password` is accepted for compatibility with configurations written for
/// encrypted key stores; PEM keys must be unencrypted, so it is only reported.
pub async fn load_tls_config(
    cert_path: &Path,
    key_path: &Path,
    password: Option<&str>,
) -> Result<RustlsConfig, std::io::Error> {
    for (what, path) in [("certificate", cert_path), ("private key", key_path)] {
        if !path.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("TLS {what} file not found: {}", path.display()),
            ));
        }
    }

    if password.is_some_and(|p| !p.is_empty()) {
        tracing::warn!(
            key = %key_path.display(),
            "certificate_password is ignored; the private key must be unencrypted PEM"
        );
    }

    let config = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    tracing::info!(certificate = %cert_path.display(), "TLS configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_files_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");

        let err = load_tls_config(&cert, &key, None).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);

        std::fs::write(&cert, b"").unwrap();
        let err = load_tls_config(&cert, &key, Some("secret")).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}

//! HTTP package index client.
//!
//! The index is addressed by URL templates from `[registry]`: an existence
//! probe (`HEAD`) and an upload endpoint (`PUT` with basic auth). Both take
//! `{name}`, `{project}` and `{version}` placeholders.

use async_trait::async_trait;
use reqwest::StatusCode;
use shipline_core::{ArtifactRef, PackageIndex, RegistryConfig, Result, ShiplineError};

use crate::stage::substitute;

pub struct HttpPackageIndex {
    registry: RegistryConfig,
    http_client: reqwest::Client,
}

impl HttpPackageIndex {
    pub fn new(registry: RegistryConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("shipline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ShiplineError::Index(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            registry,
            http_client,
        })
    }

    /// Expand a URL template for `artifact`.
    pub fn url(&self, template: &str, artifact: &ArtifactRef) -> Result<String> {
        if template.trim().is_empty() {
            return Err(ShiplineError::Config(
                "registry URL is not configured".to_string(),
            ));
        }
        let version = artifact.version.to_string();
        let project = artifact
            .name
            .strip_suffix(&format!("-{version}"))
            .unwrap_or(artifact.name.as_str());
        Ok(substitute(
            template,
            &[
                ("name", artifact.name.as_str()),
                ("project", project),
                ("version", version.as_str()),
            ],
        ))
    }
}

#[async_trait]
impl PackageIndex for HttpPackageIndex {
    async fn contains(&self, artifact: &ArtifactRef) -> Result<bool> {
        let url = self.url(&self.registry.exists_url, artifact)?;
        let response = self
            .http_client
            .head(&url)
            .send()
            .await
            .map_err(|e| ShiplineError::Index(format!("HEAD {url}: {e}")))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ShiplineError::Index(format!("HEAD {url} returned {status}"))),
        }
    }

    async fn upload(&self, artifact: &ArtifactRef) -> Result<bool> {
        let url = self.url(&self.registry.upload_url, artifact)?;
        let credentials = self.registry.credentials()?;
        let body = tokio::fs::read(&artifact.path).await.map_err(|e| {
            ShiplineError::Index(format!("cannot read {}: {e}", artifact.path.display()))
        })?;

        tracing::info!(artifact = %artifact.name, url = %url, bytes = body.len(), "uploading");
        let response = self
            .http_client
            .put(&url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| ShiplineError::Index(format!("PUT {url}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        // Another run published the same name+version first.
        if status == StatusCode::CONFLICT {
            tracing::info!(artifact = %artifact.name, "index reports artifact already exists");
            return Ok(false);
        }
        let text = response.text().await.unwrap_or_default();
        Err(ShiplineError::Index(format!(
            "PUT {url} returned {status}: {}",
            text.trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn artifact() -> ArtifactRef {
        let version = "1.4.0".parse().unwrap();
        ArtifactRef::new("proj", &version, PathBuf::from("dist/proj-1.4.0.tar.gz"))
    }

    fn index(exists_url: &str, upload_url: &str) -> HttpPackageIndex {
        HttpPackageIndex::new(RegistryConfig {
            exists_url: exists_url.to_string(),
            upload_url: upload_url.to_string(),
            username_env: "SHIPLINE_TEST_UNSET_USERNAME".to_string(),
            password_env: "SHIPLINE_TEST_UNSET_PASSWORD".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_url_placeholders() {
        let index = index("https://index.example/{project}/{version}", "");
        let url = index.url(&index.registry.exists_url, &artifact()).unwrap();
        assert_eq!(url, "https://index.example/proj/1.4.0");

        let url = index
            .url("https://index.example/upload/{name}.tar.gz", &artifact())
            .unwrap();
        assert_eq!(url, "https://index.example/upload/proj-1.4.0.tar.gz");
    }

    #[tokio::test]
    async fn test_unconfigured_index_is_a_config_error() {
        let index = index("", "");
        let err = index.contains(&artifact()).await.unwrap_err();
        assert!(matches!(err, ShiplineError::Config(_)));
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= header_end + 4 + length
    }

    /// Answer a single request on a local port with `status`; returns the
    /// base URL.
    async fn serve_once(status: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&request) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response =
                format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    fn upload_index(base: &str, user_env: &str, pass_env: &str) -> HttpPackageIndex {
        std::env::set_var(user_env, "ci");
        std::env::set_var(pass_env, "secret");
        HttpPackageIndex::new(RegistryConfig {
            exists_url: format!("{base}/{{name}}"),
            upload_url: format!("{base}/upload/{{name}}.tar.gz"),
            username_env: user_env.to_string(),
            password_env: pass_env.to_string(),
        })
        .unwrap()
    }

    fn archive(dir: &std::path::Path) -> ArtifactRef {
        let path = dir.join("proj-1.4.0.tar.gz");
        std::fs::write(&path, b"archive").unwrap();
        ArtifactRef::new("proj", &"1.4.0".parse().unwrap(), path)
    }

    #[tokio::test]
    async fn test_upload_created_is_published() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_once("201 Created").await;
        let index = upload_index(
            &base,
            "SHIPLINE_TEST_CREATED_USERNAME",
            "SHIPLINE_TEST_CREATED_PASSWORD",
        );

        assert!(index.upload(&archive(dir.path())).await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_conflict_reports_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_once("409 Conflict").await;
        let index = upload_index(
            &base,
            "SHIPLINE_TEST_CONFLICT_USERNAME",
            "SHIPLINE_TEST_CONFLICT_PASSWORD",
        );

        assert!(!index.upload(&archive(dir.path())).await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_server_error_fails() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_once("500 Internal Server Error").await;
        let index = upload_index(
            &base,
            "SHIPLINE_TEST_FAILING_USERNAME",
            "SHIPLINE_TEST_FAILING_PASSWORD",
        );

        let err = index.upload(&archive(dir.path())).await.unwrap_err();
        assert!(matches!(err, ShiplineError::Index(_)), "{err}");
    }

    #[tokio::test]
    async fn test_upload_requires_credentials() {
        let index = index("", "https://index.example/upload/{name}");
        let err = index.upload(&artifact()).await.unwrap_err();
        assert!(err.to_string().contains("SHIPLINE_TEST_UNSET_USERNAME"));
    }
}

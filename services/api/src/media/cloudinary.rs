//! Cloudinary-compatible signed upload API.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{poster_public_id, ImageHost, MediaError, PosterUpload, POSTER_FOLDER};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

pub struct CloudinaryHost {
    config: CloudinaryConfig,
    http: reqwest::Client,
}

impl CloudinaryHost {
    pub fn new(config: CloudinaryConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{API_BASE}/{}/image/{action}", self.config.cloud_name)
    }

    /// Signature over the sorted `key=value` pairs followed by the API secret.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        hex::encode(Sha256::digest(format!("{joined}{}", self.config.api_secret)))
    }
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, poster: PosterUpload) -> Result<String, MediaError> {
        poster.validate()?;

        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("folder", POSTER_FOLDER), ("timestamp", &timestamp)]);

        let mut file = Part::bytes(poster.bytes.to_vec())
            .file_name(poster.file_name.unwrap_or_else(|| "poster".to_string()));
        if let Some(content_type) = poster.content_type.as_deref() {
            file = file.mime_str(content_type)?;
        }

        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", POSTER_FOLDER)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self.http.post(self.endpoint("upload")).multipart(form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Rejected(format!("upload returned {status}: {body}")));
        }

        let uploaded: UploadResponse = response.json().await?;
        Ok(uploaded.secure_url)
    }

    async fn destroy(&self, poster_url: &str) -> Result<(), MediaError> {
        let Some(public_id) = poster_public_id(poster_url) else {
            return Err(MediaError::Rejected(format!(
                "cannot derive a public id from '{poster_url}'"
            )));
        };

        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", &public_id), ("timestamp", &timestamp)]);

        let response = self
            .http
            .post(self.endpoint("destroy"))
            .form(&[
                ("public_id", public_id.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("signature_algorithm", "sha256"),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let destroyed: DestroyResponse = response.json().await?;
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::Rejected(format!("destroy returned '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> CloudinaryHost {
        CloudinaryHost::new(
            CloudinaryConfig {
                cloud_name: "demo".to_string(),
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_signature_ignores_param_order() {
        let host = host();
        let a = host.sign(&[("timestamp", "1"), ("folder", "f")]);
        let b = host.sign(&[("folder", "f"), ("timestamp", "1")]);
        assert_eq!(a, b);
        assert_eq!(a, hex::encode(Sha256::digest("folder=f&timestamp=1secret")));
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            host().endpoint("destroy"),
            "https://api.cloudinary.com/v1_1/demo/image/destroy"
        );
    }
}

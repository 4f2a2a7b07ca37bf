use crate::config::ServerConfig;
use crate::error::{ChatError, ChatResult};
use crate::types::{Attachment, ChatReply, ChatRequest, UploadReply};
use anyhow::Context;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::debug;

/// The two server endpoints the panel talks to.
pub trait ChatBackend: Send + Sync + 'static {
    fn chat(&self, message: &str) -> impl Future<Output = ChatResult<ChatReply>> + Send;

    fn upload(
        &self,
        attachment: Attachment,
    ) -> impl Future<Output = ChatResult<UploadReply>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    chat_url: Url,
    upload_url: Url,
    upload_field: String,
}

impl HttpBackend {
    pub fn new(cfg: &ServerConfig) -> anyhow::Result<Self> {
        let base = cfg.base_url()?;
        let chat_url = endpoint(&base, &cfg.chat_path);
        let upload_url = endpoint(&base, &cfg.upload_path);
        let client = Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            chat_url,
            upload_url,
            upload_field: cfg.upload_field.clone(),
        })
    }

    pub fn chat_url(&self) -> &Url {
        &self.chat_url
    }

    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }
}

impl ChatBackend for HttpBackend {
    async fn chat(&self, message: &str) -> ChatResult<ChatReply> {
        debug!(url = %self.chat_url, len = message.len(), "posting chat message");
        let response = self
            .client
            .post(self.chat_url.clone())
            .json(&ChatRequest { message })
            .send()
            .await?;
        decode(response).await
    }

    async fn upload(&self, attachment: Attachment) -> ChatResult<UploadReply> {
        debug!(
            url = %self.upload_url,
            name = %attachment.name,
            bytes = attachment.bytes.len(),
            "uploading attachment"
        );
        let part = Part::bytes(attachment.bytes)
            .file_name(attachment.name)
            .mime_str(&attachment.content_type)?;
        let form = Form::new().part(self.upload_field.clone(), part);
        let response = self
            .client
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }
}

/// Appends `path` to the path of `base`, keeping any prefix the base carries.
fn endpoint(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}{path}"));
    url.set_query(None);
    url.set_fragment(None);
    url
}

async fn decode<T: DeserializeOwned>(response: Response) -> ChatResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(ChatError::Status(status));
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|err| ChatError::Decode(err.to_string()))
}

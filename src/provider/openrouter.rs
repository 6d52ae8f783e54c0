use super::{Artifact, FailureKind, GenerationRequest, ImageGenerator};
use crate::config::ServiceConfig;
use crate::error::GenerationError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// OpenRouter chat-completions client with image output modality
pub struct OpenRouterClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenRouterClient {
    pub fn new(service: &ServiceConfig, api_key: &str) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(service.timeout_sec);
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(proxy) = service.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy.trim())?);
        }

        Ok(Self {
            http: builder.build()?,
            endpoint: completions_endpoint(&service.base_url),
            api_key: api_key.to_string(),
            model: service.model.clone(),
            timeout,
        })
    }

    fn build_body(&self, request: &GenerationRequest) -> Value {
        json!({
            "model": self.model,
            "messages": build_messages(request),
            "modalities": ["image", "text"],
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::new(
                FailureKind::Timeout,
                format!("no response within {:?}", self.timeout),
            )
        } else if err.is_builder() {
            GenerationError::new(FailureKind::InvalidRequest, err.to_string())
        } else {
            GenerationError::new(FailureKind::Connection, err.to_string())
        }
    }
}

pub fn completions_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/chat/completions")
}

fn build_messages(request: &GenerationRequest) -> Vec<Value> {
    let mut messages = vec![json!({ "role": "system", "content": request.system_prompt })];

    if let Some(context) = &request.context {
        messages.push(json!({ "role": "assistant", "content": &**context }));
    }

    match &request.reference_image {
        None => messages.push(json!({ "role": "user", "content": request.user_prompt })),
        Some(image) => {
            let mime = image::guess_format(image)
                .map(|f| f.to_mime_type())
                .unwrap_or("image/png");
            let data_url = format!("data:{mime};base64,{}", BASE64.encode(image));
            messages.push(json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": request.user_prompt },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ],
            }));
        }
    }

    messages
}

#[async_trait]
impl ImageGenerator for OpenRouterClient {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        variant: u32,
    ) -> Result<Artifact, GenerationError> {
        let body = self.build_body(request);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        debug!(
            "Slide {} variant {} response: HTTP {} ({} bytes)",
            request.slide_index,
            variant,
            status,
            raw.len()
        );

        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| truncate(&raw, 300));
            return Err(GenerationError::new(
                FailureKind::from_status(status.as_u16()),
                format!("HTTP {status}: {message}"),
            ));
        }

        let value: Value = serde_json::from_str(&raw).map_err(|e| {
            GenerationError::new(
                FailureKind::MalformedResponse,
                format!("invalid JSON body: {e}"),
            )
        })?;
        extract_image(&value)
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn malformed(message: impl Into<String>) -> GenerationError {
    GenerationError::new(FailureKind::MalformedResponse, message)
}

/// Pull the first image out of a chat-completions response
fn extract_image(value: &Value) -> Result<Artifact, GenerationError> {
    // Upstream provider errors can arrive inside a 200 body
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown provider error");
        let kind = error
            .get("code")
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok())
            .map(FailureKind::from_status)
            .unwrap_or(FailureKind::MalformedResponse);
        return Err(GenerationError::new(kind, message));
    }

    let message = value
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| malformed("no choices in response"))?
        .get("message")
        .ok_or_else(|| malformed("no message in first choice"))?;

    let first_image = message
        .get("images")
        .and_then(|i| i.as_array())
        .and_then(|i| i.first())
        .ok_or_else(|| malformed("no images in response"))?;

    let url = first_image
        .pointer("/image_url/url")
        .or_else(|| first_image.pointer("/imageUrl/url"))
        .and_then(|u| u.as_str())
        .ok_or_else(|| malformed("no image URL in first image"))?;

    decode_data_url(url)
}

/// `data:image/png;base64,<payload>` → bytes
fn decode_data_url(url: &str) -> Result<Artifact, GenerationError> {
    let (mime, payload) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .filter(|(mime, _)| mime.starts_with("image/"))
        .ok_or_else(|| {
            malformed(format!(
                "image URL is not a base64 data URL: {}",
                truncate(url, 50)
            ))
        })?;

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| malformed(format!("invalid base64 image payload: {e}")))?;
    if bytes.is_empty() {
        return Err(malformed("empty image payload"));
    }

    Ok(Artifact {
        bytes,
        mime: Some(mime.to_string()),
    })
}

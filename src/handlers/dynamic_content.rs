//! Sample dynamic content handler.
//!
//! # Responsibilities
//! - Render a small page naming the request path and the current time
//! - Answer as HTML or JSON, chosen by `DefaultResponseType`
//!
//! # Design Decisions
//! - The request path is HTML-escaped before it is embedded in markup

use async_trait::async_trait;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::http::{Request, RequestError, Response};
use crate::plugin::{settings, Configurable, ConfigurationError, Handler, Settings};

/// Response format of [`SampleDynamicContentHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Html,
    Json,
}

impl ContentFormat {
    fn content_type(&self) -> &'static str {
        match self {
            ContentFormat::Html => "text/html",
            ContentFormat::Json => "application/json",
        }
    }
}

#[derive(Serialize)]
struct DynamicPayload<'a> {
    message: String,
    path: &'a str,
    timestamp: String,
}

/// Demonstration handler rendering a small page that names the request path.
///
/// Settings: `DefaultResponseType`, `text/html` (default) or `application/json`.
#[derive(Debug)]
pub struct SampleDynamicContentHandler {
    format: ContentFormat,
}

impl Default for SampleDynamicContentHandler {
    fn default() -> Self {
        Self {
            format: ContentFormat::Html,
        }
    }
}

impl SampleDynamicContentHandler {
    pub const CLASS_NAME: &'static str = "SampleDynamicContentHandler";

    pub fn format(&self) -> ContentFormat {
        self.format
    }
}

impl Configurable for SampleDynamicContentHandler {
    fn configure(&mut self, settings: &Settings) -> Result<(), ConfigurationError> {
        if let Some(kind) = settings::optional_str(settings, "DefaultResponseType")? {
            self.format = match kind.trim().to_ascii_lowercase().as_str() {
                "text/html" => ContentFormat::Html,
                "application/json" => ContentFormat::Json,
                other => {
                    return Err(ConfigurationError::invalid(
                        "DefaultResponseType",
                        format!("unsupported response type `{other}`"),
                    ))
                }
            };
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for SampleDynamicContentHandler {
    async fn handle_request(&self, request: &Request, response: &mut Response) -> Result<(), RequestError> {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| RequestError::handler(e.to_string()))?;

        let body = match self.format {
            ContentFormat::Json => serde_json::to_vec(&DynamicPayload {
                message: format!("Dynamic Content from {}", request.path()),
                path: request.path(),
                timestamp,
            })
            .map_err(|e| RequestError::handler(e.to_string()))?,
            ContentFormat::Html => format!(
                "<html><body><h1>Dynamic Content</h1><p>Hello from {}</p><p>{}</p></body></html>",
                escape_html(request.path()),
                timestamp
            )
            .into_bytes(),
        };

        response.set_content_type(self.format.content_type());
        response.set_body(body);
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

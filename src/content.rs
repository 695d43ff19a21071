//! Content normalization
//!
//! Maps a raw user value and its content type to the exact payload string
//! handed to the QR encoder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Kind of content the user typed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContentType {
    #[serde(rename = "URL")]
    #[default]
    Url,
    #[serde(rename = "Text")]
    Text,
    #[serde(rename = "Email")]
    Email,
    #[serde(rename = "Phone")]
    Phone,
    #[serde(rename = "SMS")]
    Sms,
    #[serde(rename = "WiFi")]
    Wifi,
    #[serde(rename = "vCard")]
    VCard,
}

impl ContentType {
    /// Display label, as shown in document metadata
    pub fn label(&self) -> &'static str {
        match self {
            ContentType::Url => "URL",
            ContentType::Text => "Text",
            ContentType::Email => "Email",
            ContentType::Phone => "Phone",
            ContentType::Sms => "SMS",
            ContentType::Wifi => "WiFi",
            ContentType::VCard => "vCard",
        }
    }

    /// Lowercase hint used in generated filenames
    pub fn slug(&self) -> &'static str {
        match self {
            ContentType::Url => "url",
            ContentType::Text => "text",
            ContentType::Email => "email",
            ContentType::Phone => "phone",
            ContentType::Sms => "sms",
            ContentType::Wifi => "wifi",
            ContentType::VCard => "vcard",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "url" => Ok(ContentType::Url),
            "text" => Ok(ContentType::Text),
            "email" => Ok(ContentType::Email),
            "phone" | "tel" => Ok(ContentType::Phone),
            "sms" => Ok(ContentType::Sms),
            "wifi" => Ok(ContentType::Wifi),
            "vcard" => Ok(ContentType::VCard),
            other => Err(Error::validation(
                "content_type",
                format!("unknown content type '{}'", other),
            )),
        }
    }
}

/// The exact string encoded into the QR symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Payload(String);

impl Payload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty payload means there is nothing to render
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const WIFI_ENCRYPTIONS: [&str; 4] = ["WPA", "WEP", "nopass", ""];

/// Normalize a raw value into the payload for its content type
pub fn normalize(raw: &str, content_type: ContentType) -> Payload {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Payload(String::new());
    }

    let value = match content_type {
        ContentType::Url => normalize_url(trimmed),
        ContentType::Email => format!("mailto:{}", trimmed),
        ContentType::Phone => normalize_phone(trimmed, "tel"),
        ContentType::Sms => normalize_phone(trimmed, "sms"),
        ContentType::Wifi => normalize_wifi(raw, trimmed),
        ContentType::VCard => normalize_vcard(trimmed),
        ContentType::Text => trimmed.to_string(),
    };

    Payload(value)
}

fn normalize_url(value: &str) -> String {
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        value.to_string()
    } else {
        format!("https://{}", value)
    }
}

fn normalize_phone(value: &str, scheme: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return String::new();
    }

    if cleaned.starts_with('+') {
        format!("{}:{}", scheme, cleaned)
    } else {
        format!("{}:+{}", scheme, cleaned)
    }
}

/// `ssid,password[,encryption]`; anything shorter is returned untouched.
/// Fields after the third are ignored.
fn normalize_wifi(raw: &str, value: &str) -> String {
    let fields: Vec<&str> = value.split(',').map(str::trim).collect();
    if fields.len() < 2 {
        return raw.to_string();
    }

    let ssid = fields[0];
    let password = fields[1];
    let encryption = match fields.get(2) {
        Some(enc) if WIFI_ENCRYPTIONS.contains(enc) => *enc,
        _ => "WPA",
    };

    format!("WIFI:T:{};S:{};P:{};;", encryption, ssid, password)
}

/// `name,phone,email,company`; empty fields are left out of the card
fn normalize_vcard(value: &str) -> String {
    let fields: Vec<&str> = value.splitn(4, ',').map(str::trim).collect();
    let properties = ["FN", "TEL", "EMAIL", "ORG"];

    let mut lines = vec!["BEGIN:VCARD".to_string(), "VERSION:3.0".to_string()];
    for (property, field) in properties.iter().zip(fields.iter()) {
        if !field.is_empty() {
            lines.push(format!("{}:{}", property, field));
        }
    }
    lines.push("END:VCARD".to_string());

    lines.join("\n")
}

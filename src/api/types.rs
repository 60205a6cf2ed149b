//! Daily news payloads.
//!
//! These endpoints answer with bare JSON, not an envelope. Every field is
//! defaulted so that older or trimmed responses still decode.

use serde::{Deserialize, Serialize};

/// One story in a list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Story {
    pub id: u64,
    pub title: String,
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "type")]
    pub kind: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ga_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_date: Option<String>,
}

impl Story {
    /// The picture to show in a list row.
    pub fn thumbnail(&self) -> Option<&str> {
        self.images
            .first()
            .map(String::as_str)
            .or(self.image.as_deref())
    }
}

/// `GET news/latest`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyList {
    pub date: String,
    pub stories: Vec<Story>,
    pub top_stories: Vec<Story>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    pub id: u64,
    pub name: String,
    pub thumbnail: String,
    pub description: String,
}

/// `GET sections`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionList {
    pub data: Vec<Section>,
}

/// `GET section/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionStories {
    pub name: String,
    pub timestamp: u64,
    pub stories: Vec<Story>,
}

/// `GET news/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsDetail {
    pub id: u64,
    pub title: String,
    /// HTML fragment.
    pub body: String,
    pub image: String,
    pub image_source: String,
    pub share_url: String,
    pub css: Vec<String>,
    pub js: Vec<String>,
    pub images: Vec<String>,
    #[serde(rename = "type")]
    pub kind: i32,
}

//! Descriptive metadata for topic managers and lookup services.

use serde::{Deserialize, Serialize};

/// Static descriptor a topic manager or lookup service reports about itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetaData {
    pub name: String,
    pub short_description: String,
    #[serde(rename = "iconURL", default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "informationURL", default, skip_serializing_if = "Option::is_none")]
    pub information_url: Option<String>,
}

impl ServiceMetaData {
    pub fn new(name: impl Into<String>, short_description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_description: short_description.into(),
            icon_url: None,
            version: None,
            information_url: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_fields_use_upper_case_suffix() {
        let mut meta = ServiceMetaData::new("KVStore", "key-value tokens");
        meta.icon_url = Some("https://example.com/icon.png".into());
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["shortDescription"], "key-value tokens");
        assert_eq!(json["iconURL"], "https://example.com/icon.png");
        assert!(json.get("version").is_none());
    }
}

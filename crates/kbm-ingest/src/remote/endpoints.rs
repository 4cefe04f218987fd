//! Knowledge-base endpoint URL builders

use super::types::ResourceKey;

/// Knowledge box root
pub fn kb_url(base_url: &str, knowledge_box: &str) -> String {
    format!("{}/kb/{}", base_url, knowledge_box)
}

/// Resource collection, used for creates
pub fn resources_url(base_url: &str, knowledge_box: &str) -> String {
    format!("{}/resources", kb_url(base_url, knowledge_box))
}

/// A single resource, by slug or by resource id
pub fn resource_url(base_url: &str, knowledge_box: &str, key: &ResourceKey) -> String {
    match key {
        ResourceKey::Slug(slug) => format!("{}/slug/{}", kb_url(base_url, knowledge_box), slug),
        ResourceKey::Id(rid) => format!("{}/resource/{}", kb_url(base_url, knowledge_box), rid),
    }
}

/// Search endpoint
pub fn search_url(base_url: &str, knowledge_box: &str) -> String {
    format!("{}/search", kb_url(base_url, knowledge_box))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://europe-1.nuclia.cloud/api/v1";

    #[test]
    fn test_resource_urls() {
        assert_eq!(
            resources_url(BASE, "kb1"),
            "https://europe-1.nuclia.cloud/api/v1/kb/kb1/resources"
        );
        assert_eq!(
            resource_url(BASE, "kb1", &ResourceKey::slug("abc")),
            "https://europe-1.nuclia.cloud/api/v1/kb/kb1/slug/abc"
        );
        assert_eq!(
            resource_url(BASE, "kb1", &ResourceKey::id("r9")),
            "https://europe-1.nuclia.cloud/api/v1/kb/kb1/resource/r9"
        );
        assert_eq!(
            search_url(BASE, "kb1"),
            "https://europe-1.nuclia.cloud/api/v1/kb/kb1/search"
        );
    }
}

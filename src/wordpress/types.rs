//! WordPress REST API v2 レスポンスモデル

use serde::{Deserialize, Serialize};

/// Rendered text wrapper used by title/content/excerpt fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressContent {
    pub rendered: String,
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressGuid {
    pub rendered: String,
}

/// 投稿 (`wp/v2/posts`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressPost {
    pub id: Option<u64>,
    pub date: Option<String>,
    pub date_gmt: Option<String>,
    pub guid: Option<WordPressGuid>,
    pub modified: Option<String>,
    pub modified_gmt: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    pub link: Option<String>,
    pub title: Option<WordPressContent>,
    pub content: Option<WordPressContent>,
    pub excerpt: Option<WordPressContent>,
    pub author: Option<u64>,
    pub featured_media: Option<u64>,
    #[serde(default)]
    pub categories: Vec<u64>,
    #[serde(default)]
    pub tags: Vec<u64>,
}

/// 固定ページ (`wp/v2/pages`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressPage {
    pub id: Option<u64>,
    pub date: Option<String>,
    pub modified: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
    pub link: Option<String>,
    pub title: Option<WordPressContent>,
    pub content: Option<WordPressContent>,
    pub excerpt: Option<WordPressContent>,
    pub author: Option<u64>,
    /// Parent page ID, 0 for top level
    pub parent: Option<u64>,
    pub menu_order: Option<i64>,
    pub template: Option<String>,
}

/// メディア (`wp/v2/media`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressMedia {
    pub id: Option<u64>,
    pub date: Option<String>,
    pub guid: Option<WordPressGuid>,
    pub modified: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub link: Option<String>,
    pub title: Option<WordPressContent>,
    pub author: Option<u64>,
    pub description: Option<WordPressContent>,
    pub caption: Option<WordPressContent>,
    pub alt_text: Option<String>,
    pub mime_type: Option<String>,
    pub media_details: Option<serde_json::Value>,
    /// Attached post ID, when the media belongs to one
    pub post: Option<u64>,
    pub source_url: Option<String>,
}

/// カテゴリー (`wp/v2/categories`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressCategory {
    pub id: Option<u64>,
    pub count: Option<u64>,
    #[serde(default)]
    pub description: String,
    pub link: Option<String>,
    pub name: String,
    pub slug: Option<String>,
    pub taxonomy: Option<String>,
    pub parent: Option<u64>,
}

/// タグ (`wp/v2/tags`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressTag {
    pub id: Option<u64>,
    pub count: Option<u64>,
    #[serde(default)]
    pub description: String,
    pub link: Option<String>,
    pub name: String,
    pub slug: Option<String>,
    pub taxonomy: Option<String>,
}

/// コメント (`wp/v2/comments`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressComment {
    pub id: Option<u64>,
    pub post: Option<u64>,
    pub parent: Option<u64>,
    pub author: Option<u64>,
    #[serde(default)]
    pub author_name: String,
    pub author_email: Option<String>,
    pub author_url: Option<String>,
    pub date: Option<String>,
    pub content: Option<WordPressContent>,
    pub link: Option<String>,
    pub status: Option<String>,
}

/// ユーザー (`wp/v2/users`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressUser {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub avatar_urls: Option<serde_json::Value>,
}

/// インストール済みプラグイン (`wp/v2/plugins`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressPluginInfo {
    pub plugin: Option<String>,
    pub status: Option<String>,
    pub name: Option<String>,
    pub plugin_uri: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
}

/// サイト全体のヘルスチェック結果
#[derive(Debug, Serialize, Deserialize)]
pub struct WordPressHealthCheck {
    pub site_accessible: bool,
    pub rest_api_available: bool,
    pub authentication_valid: bool,
    pub permissions_adequate: bool,
    pub media_accessible: bool,
    pub error_details: Vec<String>,
    pub site_info: Option<WordPressSiteInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WordPressSiteInfo {
    pub name: String,
    pub description: String,
    pub url: String,
    pub timezone_string: Option<String>,
    pub date_format: Option<String>,
    pub time_format: Option<String>,
    pub start_of_week: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_deserializes_from_rest_shape() {
        let raw = serde_json::json!({
            "id": 42,
            "status": "publish",
            "type": "post",
            "title": { "rendered": "Hello" },
            "content": { "rendered": "<p>World</p>", "protected": false },
            "categories": [1, 3],
            "tags": []
        });
        let post: WordPressPost = serde_json::from_value(raw).unwrap();
        assert_eq!(post.id, Some(42));
        assert_eq!(post.post_type.as_deref(), Some("post"));
        assert_eq!(post.title.unwrap().rendered, "Hello");
        assert_eq!(post.categories, vec![1, 3]);
    }

    #[test]
    fn test_comment_tolerates_missing_optional_fields() {
        let raw = serde_json::json!({
            "id": 7,
            "post": 42,
            "author_name": "reader",
            "content": { "rendered": "nice post" }
        });
        let comment: WordPressComment = serde_json::from_value(raw).unwrap();
        assert_eq!(comment.id, Some(7));
        assert_eq!(comment.author_name, "reader");
        assert!(comment.author_email.is_none());
    }
}

//! ツール入力パラメータの検証
//!
//! ネットワークに出る前に弾けるものはここで弾く。

use serde_json::Value;
use std::collections::HashMap;

use crate::mcp::McpError;

/// WordPress投稿タイトルの最大長 (WordPressのデフォルト制限)
pub const MAX_TITLE_LENGTH: usize = 255;

/// 検索クエリの最大長
pub const MAX_SEARCH_LENGTH: usize = 200;

/// 有効な投稿ステータス
pub const VALID_POST_STATUSES: [&str; 6] =
    ["publish", "draft", "pending", "private", "future", "trash"];

pub type Args = HashMap<String, Value>;

/// `per_page` (1..=100, デフォルト10)
pub fn per_page(args: &Args) -> Result<u64, McpError> {
    match args.get("per_page") {
        None | Some(Value::Null) => Ok(10),
        Some(value) => {
            let n = value.as_u64().ok_or_else(|| {
                McpError::InvalidParams(format!("per_page must be a positive integer: {}", value))
            })?;
            if n == 0 || n > 100 {
                return Err(McpError::InvalidParams(format!(
                    "per_page must be between 1 and 100: {}",
                    n
                )));
            }
            Ok(n)
        }
    }
}

/// `page` (1以上、デフォルト1)
pub fn page(args: &Args) -> Result<u64, McpError> {
    match args.get("page") {
        None | Some(Value::Null) => Ok(1),
        Some(value) => {
            let n = value.as_u64().ok_or_else(|| {
                McpError::InvalidParams(format!("page must be a positive integer: {}", value))
            })?;
            if n == 0 {
                return Err(McpError::InvalidParams("page must be 1 or greater".into()));
            }
            Ok(n)
        }
    }
}

/// 検索クエリ。空白のみなら None。
pub fn search(args: &Args) -> Result<Option<String>, McpError> {
    match args.get("search").and_then(Value::as_str) {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if trimmed.chars().count() > MAX_SEARCH_LENGTH {
                return Err(McpError::InvalidParams(format!(
                    "search query is too long (max {} chars)",
                    MAX_SEARCH_LENGTH
                )));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

/// 投稿ステータス。指定があれば既知の値のみ許可。
pub fn post_status(args: &Args) -> Result<Option<String>, McpError> {
    match args.get("status").and_then(Value::as_str) {
        None => Ok(None),
        Some(raw) => {
            let status = raw.trim().to_ascii_lowercase();
            if status.is_empty() {
                return Ok(None);
            }
            if !VALID_POST_STATUSES.contains(&status.as_str()) {
                return Err(McpError::InvalidParams(format!(
                    "invalid post status '{}'. valid values: {}",
                    status,
                    VALID_POST_STATUSES.join(", ")
                )));
            }
            Ok(Some(status))
        }
    }
}

/// 必須の正整数ID
pub fn required_id(args: &Args, key: &str) -> Result<u64, McpError> {
    let value = args
        .get(key)
        .ok_or_else(|| McpError::InvalidParams(format!("missing {}", key)))?;
    let id = value
        .as_u64()
        .ok_or_else(|| McpError::InvalidParams(format!("{} must be a positive integer", key)))?;
    if id == 0 {
        return Err(McpError::InvalidParams(format!(
            "{} must be a positive integer",
            key
        )));
    }
    Ok(id)
}

/// 必須の文字列パラメータ
pub fn required_str<'a>(args: &'a Args, key: &str) -> Result<&'a str, McpError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| McpError::InvalidParams(format!("missing {}", key)))
}

/// 任意の文字列パラメータ
pub fn optional_str<'a>(args: &'a Args, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// 任意の真偽値パラメータ
pub fn optional_bool(args: &Args, key: &str) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// 投稿タイトル (必須、255文字以内)
pub fn title(args: &Args) -> Result<String, McpError> {
    let raw = required_str(args, "title")?;
    let trimmed = raw.trim();
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(McpError::InvalidParams(format!(
            "title is too long (max {} chars)",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

/// ID列の正規化。整数、"1,2,3" 形式の文字列、配列のいずれも受ける。
pub fn id_list(args: &Args, key: &str) -> Result<Vec<u64>, McpError> {
    let value = match args.get(key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(value) => value,
    };

    let invalid =
        || McpError::InvalidParams(format!("{} must be an ID or a list of IDs", key));

    match value {
        Value::Number(_) => Ok(vec![value.as_u64().ok_or_else(invalid)?]),
        Value::String(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u64>().map_err(|_| invalid()))
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

/// WordPressのクエリ形式 (カンマ区切り) へ変換
pub fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, Value)]) -> Args {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_per_page_defaults_and_bounds() {
        assert_eq!(per_page(&args(&[])).unwrap(), 10);
        assert_eq!(per_page(&args(&[("per_page", json!(25))])).unwrap(), 25);
        assert!(per_page(&args(&[("per_page", json!(0))])).is_err());
        assert!(per_page(&args(&[("per_page", json!(101))])).is_err());
        assert!(per_page(&args(&[("per_page", json!("ten"))])).is_err());
    }

    #[test]
    fn test_page_defaults() {
        assert_eq!(page(&args(&[])).unwrap(), 1);
        assert!(page(&args(&[("page", json!(0))])).is_err());
    }

    #[test]
    fn test_search_trims_and_limits() {
        assert_eq!(search(&args(&[])).unwrap(), None);
        assert_eq!(
            search(&args(&[("search", json!("  rust  "))])).unwrap(),
            Some("rust".to_string())
        );
        let long = "x".repeat(MAX_SEARCH_LENGTH + 1);
        assert!(search(&args(&[("search", json!(long))])).is_err());
    }

    #[test]
    fn test_post_status_whitelist() {
        assert_eq!(
            post_status(&args(&[("status", json!("Draft"))])).unwrap(),
            Some("draft".to_string())
        );
        assert!(post_status(&args(&[("status", json!("published"))])).is_err());
    }

    #[test]
    fn test_required_id() {
        assert_eq!(required_id(&args(&[("post_id", json!(5))]), "post_id").unwrap(), 5);
        assert!(required_id(&args(&[]), "post_id").is_err());
        assert!(required_id(&args(&[("post_id", json!(0))]), "post_id").is_err());
        assert!(required_id(&args(&[("post_id", json!(-3))]), "post_id").is_err());
    }

    #[test]
    fn test_title_length() {
        assert_eq!(
            title(&args(&[("title", json!("Hello"))])).unwrap(),
            "Hello"
        );
        let long = "t".repeat(MAX_TITLE_LENGTH + 1);
        assert!(title(&args(&[("title", json!(long))])).is_err());
    }

    #[test]
    fn test_id_list_accepts_all_shapes() {
        assert_eq!(id_list(&args(&[]), "categories").unwrap(), Vec::<u64>::new());
        assert_eq!(
            id_list(&args(&[("categories", json!(3))]), "categories").unwrap(),
            vec![3]
        );
        assert_eq!(
            id_list(&args(&[("categories", json!("1, 2,3"))]), "categories").unwrap(),
            vec![1, 2, 3]
        );
        assert_eq!(
            id_list(&args(&[("categories", json!([4, 5]))]), "categories").unwrap(),
            vec![4, 5]
        );
        assert!(id_list(&args(&[("categories", json!("a,b"))]), "categories").is_err());
    }

    #[test]
    fn test_join_ids() {
        assert_eq!(join_ids(&[1, 2, 3]), "1,2,3");
        assert_eq!(join_ids(&[]), "");
    }
}

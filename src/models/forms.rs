use serde::{Deserialize, Deserializer};

use super::{Identity, PostStatus, Role, SettingType, UserStatus};

/// Accepts either a comma separated string ("rust,actix") or a list.
fn deserialize_optional_tags<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    Ok(match Option::<StringOrVec>::deserialize(deserializer)? {
        None => None,
        Some(StringOrVec::String(s)) => Some(
            s.split(',')
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect(),
        ),
        Some(StringOrVec::Vec(v)) => Some(v),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInput {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: String,
    pub content: String,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub category_id: i64,
    #[serde(default)]
    pub is_featured: bool,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_tags")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub is_featured: bool,
    pub parent_id: Option<i64>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestAuthor {
    pub name: String,
    pub email: String,
    pub website: Option<String>,
}

/// Who is submitting a comment.
#[derive(Debug, Clone)]
pub enum CommentAuthor {
    Guest(GuestAuthor),
    Member(Identity),
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author: CommentAuthor,
    pub author_ip: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkCommentAction {
    Approve,
    Trash,
    Spam,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCommentRequest {
    pub action: BulkCommentAction,
    pub comment_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkUserAction {
    Activate,
    Deactivate,
    Promote,
    Demote,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUserRequest {
    pub action: BulkUserAction,
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingUpdate {
    pub value: String,
    #[serde(rename = "type")]
    pub setting_type: Option<SettingType>,
    pub description: Option<String>,
}

/// Request metadata captured for a page view.
#[derive(Debug, Clone, Default)]
pub struct ViewInfo {
    pub user_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_accept_comma_string_or_list() {
        let from_string: PostInput = serde_json::from_str(
            r#"{"title":"t","excerpt":"e","content":"c","status":"DRAFT","categoryId":1,"tags":"rust, actix,,"}"#,
        )
        .unwrap();
        assert_eq!(from_string.tags, Some(vec!["rust".to_string(), "actix".to_string()]));

        let from_list: PostInput = serde_json::from_str(
            r#"{"title":"t","excerpt":"e","content":"c","status":"DRAFT","categoryId":1,"tags":["a"]}"#,
        )
        .unwrap();
        assert_eq!(from_list.tags, Some(vec!["a".to_string()]));

        let absent: PostInput = serde_json::from_str(
            r#"{"title":"t","excerpt":"e","content":"c","status":"DRAFT","categoryId":1}"#,
        )
        .unwrap();
        assert_eq!(absent.tags, None);
    }

    #[test]
    fn unknown_bulk_action_is_rejected() {
        let parsed = serde_json::from_str::<BulkCommentRequest>(r#"{"action":"nuke","commentIds":[1]}"#);
        assert!(parsed.is_err());
    }
}

//! Typed filter bags, one per listable resource. Each field is optional and
//! the set of fields is closed, so an unknown filter key cannot compile.

use serde::Deserialize;

use super::{CommentStatus, PostStatus, Role, UserStatus};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    #[default]
    Newest,
    Views,
    Likes,
    Title,
    Published,
}

impl PostSort {
    pub fn order_by(&self) -> &'static str {
        match self {
            PostSort::Newest => "p.created_at DESC, p.id DESC",
            PostSort::Views => "p.views_count DESC, p.id DESC",
            PostSort::Likes => "p.likes_count DESC, p.id DESC",
            PostSort::Title => "p.title ASC, p.id ASC",
            PostSort::Published => "p.published_at DESC, p.id DESC",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub is_featured: Option<bool>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: PostSort,
}

impl PostFilter {
    pub fn published() -> Self {
        PostFilter {
            status: Some(PostStatus::Published),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentFilter {
    pub status: Option<CommentStatus>,
    pub post_id: Option<i64>,
    #[serde(default)]
    pub top_level_only: bool,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFilter {
    pub is_featured: Option<bool>,
    pub search: Option<String>,
}

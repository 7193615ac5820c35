use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Gives a closed enum its canonical text form and lets rusqlite read and
/// write it as a TEXT column, so no unknown string ever reaches the store.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(other.to_string()),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
                value.as_str()?.parse().map_err(|unknown: String| {
                    rusqlite::types::FromSqlError::Other(
                        format!("unknown {} value '{}'", stringify!($name), unknown).into(),
                    )
                })
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Editor,
    Admin,
    SuperAdmin,
}

text_enum!(Role {
    User => "USER",
    Editor => "EDITOR",
    Admin => "ADMIN",
    SuperAdmin => "SUPER_ADMIN",
});

/// What an identity may do. The role-to-capability table lives only in
/// [`Role::capabilities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    AccessAdmin,
    ManageContent,
    ModerateComments,
    ManageUsers,
    ManageSettings,
    AssignSuperAdmin,
}

const STAFF_CAPABILITIES: &[Capability] = &[
    Capability::AccessAdmin,
    Capability::ManageContent,
    Capability::ModerateComments,
    Capability::ManageUsers,
    Capability::ManageSettings,
];

const SUPER_ADMIN_CAPABILITIES: &[Capability] = &[
    Capability::AccessAdmin,
    Capability::ManageContent,
    Capability::ModerateComments,
    Capability::ManageUsers,
    Capability::ManageSettings,
    Capability::AssignSuperAdmin,
];

impl Role {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::User => &[],
            Role::Editor | Role::Admin => STAFF_CAPABILITIES,
            Role::SuperAdmin => SUPER_ADMIN_CAPABILITIES,
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Identities with this role can never be the target of destructive
    /// user management.
    pub fn is_protected(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
}

text_enum!(UserStatus {
    Active => "ACTIVE",
    Inactive => "INACTIVE",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Draft,
    Published,
    Scheduled,
    Archived,
}

text_enum!(PostStatus {
    Draft => "DRAFT",
    Published => "PUBLISHED",
    Scheduled => "SCHEDULED",
    Archived => "ARCHIVED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentStatus {
    Pending,
    Approved,
    Trash,
    Spam,
}

text_enum!(CommentStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Trash => "TRASH",
    Spam => "SPAM",
});

impl CommentStatus {
    /// Moderation state machine. Re-applying the current status is allowed
    /// and only re-stamps the moderation time.
    pub fn can_transition_to(&self, next: CommentStatus) -> bool {
        use CommentStatus::*;
        if *self == next {
            return true;
        }
        match self {
            Pending => matches!(next, Approved | Trash | Spam),
            Approved => matches!(next, Trash | Spam),
            Trash | Spam => next == Approved,
        }
    }

    /// Every status a comment may currently hold for a move into `next`.
    pub fn sources_for(next: CommentStatus) -> Vec<CommentStatus> {
        CommentStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Text,
    Number,
    Boolean,
    Email,
}

text_enum!(SettingType {
    String => "string",
    Text => "text",
    Number => "number",
    Boolean => "boolean",
    Email => "email",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingCategory {
    General,
    Content,
    Users,
    System,
    Analytics,
}

text_enum!(SettingCategory {
    General => "general",
    Content => "content",
    Users => "users",
    System => "system",
    Analytics => "analytics",
});

// --- Entities ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub status: UserStatus,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub avatar: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// The validated identity the core trusts for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.role.has_capability(capability)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub sort_order: i64,
    pub is_featured: bool,
    pub parent_id: Option<i64>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    /// Computed from the posts table on every read.
    pub post_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub post_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub category_id: i64,
    pub author_id: i64,
    pub is_featured: bool,
    pub views_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub reading_time: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
}

/// A post row as shown in listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListItem {
    #[serde(flatten)]
    pub post: Post,
    pub author: AuthorSummary,
    pub category: CategorySummary,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    #[serde(flatten)]
    pub item: PostListItem,
    pub comments: Vec<CommentThread>,
    pub related_posts: Vec<Post>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub author_email: String,
    pub author_website: Option<String>,
    #[serde(skip_serializing)]
    pub author_ip: Option<String>,
    pub user_id: Option<i64>,
    pub status: CommentStatus,
    pub moderated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// A top-level comment with its direct replies.
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListItem {
    #[serde(flatten)]
    pub comment: Comment,
    pub post_title: String,
    pub post_slug: String,
    pub parent_author_name: Option<String>,
    pub reply_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDetail {
    #[serde(flatten)]
    pub comment: Comment,
    pub post_title: String,
    pub post_slug: String,
    pub replies: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub setting_key: String,
    pub setting_value: String,
    pub setting_type: SettingType,
    pub category: SettingCategory,
    pub description: String,
    pub is_public: bool,
}

impl Setting {
    pub fn as_bool(&self) -> Option<bool> {
        match self.setting_type {
            SettingType::Boolean => self.setting_value.parse().ok(),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.setting_type {
            SettingType::Number => self.setting_value.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Append-only page view record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i64,
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- Statistics ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommentStatistics {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub trash: i64,
    pub spam: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostStatistics {
    pub total: i64,
    pub published: i64,
    pub draft: i64,
    pub scheduled: i64,
    pub archived: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatistics {
    pub total: i64,
    pub active: i64,
    pub admin: i64,
    pub new_this_month: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStatistics {
    pub total: i64,
    pub featured: i64,
}

pub mod db_operations;
pub mod filters;
pub mod forms;

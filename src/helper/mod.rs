pub mod auth_helpers;
pub mod category_helpers;
pub mod comment_helpers;
pub mod content_helpers;
pub mod form_helpers;
pub mod listing_helpers;
pub mod media_helpers;
pub mod sanitization_helpers;
pub mod settings_helpers;
pub mod user_helpers;

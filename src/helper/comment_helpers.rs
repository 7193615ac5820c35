use rusqlite::Connection;

use crate::error::{CmsError, CmsResult};
use crate::helper::auth_helpers::require_capability;
use crate::helper::form_helpers::{non_blank, normalize_email, require_email, require_length, require_url};
use crate::helper::listing_helpers::{PageRequest, Paginated};
use crate::helper::sanitization_helpers::strip_all_html;
use crate::helper::settings_helpers;
use crate::models::db_operations::comments_db_operations::{self, CommentRecord};
use crate::models::db_operations::{posts_db_operations, users_db_operations};
use crate::models::filters::CommentFilter;
use crate::models::forms::{BulkCommentAction, BulkCommentRequest, CommentAuthor, NewComment};
use crate::models::{
    Capability, Comment, CommentDetail, CommentListItem, CommentStatistics, CommentStatus, CommentThread, Identity,
    PostStatus,
};
use crate::DbPool;

/// Parses a client supplied status.
pub fn parse_status(raw: &str) -> CmsResult<CommentStatus> {
    raw.trim()
        .to_uppercase()
        .parse()
        .map_err(|unknown: String| CmsError::InvalidStatus(unknown))
}

/// Length limits on the stored comment body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentRule {
    Comment,
    ModeratorReply,
}

impl ContentRule {
    fn check(self, content: &str) -> CmsResult<()> {
        match self {
            ContentRule::Comment => require_length("Comment", content, 10, 1000),
            ContentRule::ModeratorReply => require_length("Reply", content, 5, 500),
        }
    }
}

/// Limits apply to the text as it will be stored, after tags are stripped.
fn validate_new_comment(input: &NewComment, rule: ContentRule) -> CmsResult<()> {
    rule.check(&strip_all_html(&input.content))?;
    if let CommentAuthor::Guest(guest) = &input.author {
        require_length("Name", &strip_all_html(&guest.name), 2, 100)?;
        require_email(&guest.email)?;
        if let Some(site) = non_blank(guest.website.as_deref()) {
            require_url("Website", site)?;
        }
    }
    Ok(())
}

/// Moderators replying to an existing comment are published immediately.
fn initial_status(input: &NewComment) -> CommentStatus {
    match &input.author {
        CommentAuthor::Member(identity)
            if input.parent_id.is_some() && identity.has_capability(Capability::ModerateComments) =>
        {
            CommentStatus::Approved
        }
        _ => CommentStatus::Pending,
    }
}

fn insert_in(conn: &Connection, input: &NewComment) -> CmsResult<i64> {
    if !posts_db_operations::post_exists(conn, input.post_id)? {
        return Err(CmsError::Validation("Post does not exist".to_string()));
    }
    if let Some(parent_id) = input.parent_id {
        let parent = comments_db_operations::find_comment(conn, parent_id)?
            .ok_or_else(|| CmsError::Validation("Parent comment does not exist".to_string()))?;
        if parent.post_id != input.post_id {
            return Err(CmsError::Validation("Parent comment belongs to a different post".to_string()));
        }
    }

    let (author_name, author_email, author_website, user_id) = match &input.author {
        CommentAuthor::Guest(guest) => (
            strip_all_html(&guest.name),
            normalize_email(&guest.email),
            non_blank(guest.website.as_deref()).map(str::to_string),
            None,
        ),
        CommentAuthor::Member(identity) => {
            let name = users_db_operations::find_user_by_id(conn, identity.user_id)?
                .map(|u| u.full_name())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| identity.email.clone());
            (name, identity.email.clone(), None, Some(identity.user_id))
        }
    };
    let content = strip_all_html(&input.content);

    let comment_id = comments_db_operations::insert_comment(
        conn,
        &CommentRecord {
            content: &content,
            post_id: input.post_id,
            parent_id: input.parent_id,
            author_name: &author_name,
            author_email: &author_email,
            author_website: author_website.as_deref(),
            author_ip: input.author_ip.as_deref(),
            user_id,
            status: initial_status(input),
        },
    )?;
    comments_db_operations::recompute_comments_count(conn, input.post_id)?;
    Ok(comment_id)
}

fn load(conn: &Connection, comment_id: i64) -> CmsResult<Comment> {
    comments_db_operations::find_comment(conn, comment_id)?.ok_or_else(|| CmsError::NotFound("Comment".to_string()))
}

/// Stores a new comment. Guests and plain members start PENDING.
pub fn submit(pool: &DbPool, input: &NewComment) -> CmsResult<Comment> {
    submit_with(pool, input, ContentRule::Comment)
}

fn submit_with(pool: &DbPool, input: &NewComment, rule: ContentRule) -> CmsResult<Comment> {
    validate_new_comment(input, rule)?;
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let comment_id = insert_in(&tx, input)?;
    let comment = load(&tx, comment_id)?;
    tx.commit()?;
    log::info!(
        "Comment {} submitted on post {} with status {}",
        comment.id,
        comment.post_id,
        comment.status
    );
    Ok(comment)
}

/// Submission from the public site: requires comments to be enabled and the
/// post to be published.
pub fn submit_public(pool: &DbPool, input: &NewComment) -> CmsResult<Comment> {
    if !settings_helpers::flag(pool, "enable_comments", true)? {
        return Err(CmsError::Unauthorized("Comments are currently disabled".to_string()));
    }
    let published = {
        let conn = pool.get()?;
        posts_db_operations::find_post_by_id(&conn, input.post_id)?
            .map(|p| p.status == PostStatus::Published)
    };
    match published {
        None => Err(CmsError::Validation("Post does not exist".to_string())),
        Some(false) => Err(CmsError::Validation("Comments are only accepted on published posts".to_string())),
        Some(true) => submit(pool, input),
    }
}

/// A moderator's answer to an existing comment, approved on creation.
pub fn reply(pool: &DbPool, moderator: &Identity, parent_id: i64, content: &str) -> CmsResult<Comment> {
    require_capability(moderator, Capability::ModerateComments)?;
    let parent = {
        let conn = pool.get()?;
        load(&conn, parent_id)?
    };
    submit_with(
        pool,
        &NewComment {
            content: content.to_string(),
            post_id: parent.post_id,
            parent_id: Some(parent.id),
            author: CommentAuthor::Member(moderator.clone()),
            author_ip: None,
        },
        ContentRule::ModeratorReply,
    )
}

pub fn set_status(pool: &DbPool, actor: &Identity, comment_id: i64, status: CommentStatus) -> CmsResult<Comment> {
    require_capability(actor, Capability::ModerateComments)?;
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let current = load(&tx, comment_id)?;
    if !current.status.can_transition_to(status) {
        return Err(CmsError::InvalidStatus(format!(
            "cannot move a {} comment to {}",
            current.status, status
        )));
    }
    comments_db_operations::set_status(&tx, comment_id, status)?;
    comments_db_operations::recompute_comments_count(&tx, current.post_id)?;
    let updated = load(&tx, comment_id)?;
    tx.commit()?;
    log::info!("{} moved comment {} from {} to {}", actor.email, comment_id, current.status, status);
    Ok(updated)
}

/// Returns the number of comments actually moved. Unknown ids and rows
/// whose status cannot reach `status` are skipped.
pub fn bulk_set_status(pool: &DbPool, actor: &Identity, ids: &[i64], status: CommentStatus) -> CmsResult<usize> {
    require_capability(actor, Capability::ModerateComments)?;
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let posts = comments_db_operations::post_ids_for(&tx, ids)?;
    let affected = comments_db_operations::set_status_many(&tx, ids, status)?;
    for post_id in posts {
        comments_db_operations::recompute_comments_count(&tx, post_id)?;
    }
    tx.commit()?;
    log::info!(
        "{} bulk-moved {} of {} comment(s) to {}",
        actor.email,
        affected,
        ids.len(),
        status
    );
    Ok(affected)
}

pub fn delete(pool: &DbPool, actor: &Identity, comment_id: i64) -> CmsResult<()> {
    require_capability(actor, Capability::ModerateComments)?;
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let comment = load(&tx, comment_id)?;
    comments_db_operations::delete_comment(&tx, comment_id)?;
    comments_db_operations::recompute_comments_count(&tx, comment.post_id)?;
    tx.commit()?;
    log::info!("{} deleted comment {}", actor.email, comment_id);
    Ok(())
}

pub fn bulk_delete(pool: &DbPool, actor: &Identity, ids: &[i64]) -> CmsResult<usize> {
    require_capability(actor, Capability::ModerateComments)?;
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let posts = comments_db_operations::post_ids_for(&tx, ids)?;
    let affected = comments_db_operations::delete_many(&tx, ids)?;
    for post_id in posts {
        comments_db_operations::recompute_comments_count(&tx, post_id)?;
    }
    tx.commit()?;
    log::info!("{} bulk-deleted {} of {} comment(s)", actor.email, affected, ids.len());
    Ok(affected)
}

pub fn bulk_action(pool: &DbPool, actor: &Identity, request: &BulkCommentRequest) -> CmsResult<usize> {
    match request.action {
        BulkCommentAction::Approve => bulk_set_status(pool, actor, &request.comment_ids, CommentStatus::Approved),
        BulkCommentAction::Trash => bulk_set_status(pool, actor, &request.comment_ids, CommentStatus::Trash),
        BulkCommentAction::Spam => bulk_set_status(pool, actor, &request.comment_ids, CommentStatus::Spam),
        BulkCommentAction::Delete => bulk_delete(pool, actor, &request.comment_ids),
    }
}

pub fn recompute_comments_count(pool: &DbPool, post_id: i64) -> CmsResult<i64> {
    let conn = pool.get()?;
    if !posts_db_operations::post_exists(&conn, post_id)? {
        return Err(CmsError::NotFound("Post".to_string()));
    }
    Ok(comments_db_operations::recompute_comments_count(&conn, post_id)?)
}

pub fn fetch_thread(pool: &DbPool, post_id: i64, status: CommentStatus) -> CmsResult<Vec<CommentThread>> {
    let conn = pool.get()?;
    if !posts_db_operations::post_exists(&conn, post_id)? {
        return Err(CmsError::NotFound("Post".to_string()));
    }
    Ok(comments_db_operations::thread_for_post(&conn, post_id, status)?)
}

pub fn list(pool: &DbPool, filter: &CommentFilter, page: &PageRequest) -> CmsResult<Paginated<CommentListItem>> {
    let conn = pool.get()?;
    let total = comments_db_operations::count_comments(&conn, filter)?;
    let items = comments_db_operations::list_comments(&conn, filter, page.limit(), page.offset())?;
    Ok(Paginated::new(items, page, total))
}

pub fn get(pool: &DbPool, comment_id: i64) -> CmsResult<CommentDetail> {
    let conn = pool.get()?;
    let item = comments_db_operations::find_list_item(&conn, comment_id)?
        .ok_or_else(|| CmsError::NotFound("Comment".to_string()))?;
    let replies = comments_db_operations::replies_of(&conn, comment_id)?;
    Ok(CommentDetail {
        comment: item.comment,
        post_title: item.post_title,
        post_slug: item.post_slug,
        replies,
    })
}

pub fn statistics(pool: &DbPool) -> CmsResult<CommentStatistics> {
    let conn = pool.get()?;
    Ok(comments_db_operations::comment_statistics(&conn)?)
}

pub fn recent(pool: &DbPool, limit: i64) -> CmsResult<Vec<CommentListItem>> {
    let conn = pool.get()?;
    Ok(comments_db_operations::list_comments(&conn, &CommentFilter::default(), limit, 0)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forms::GuestAuthor;
    use crate::test_support::{self, insert_post, Fixture};
    use pretty_assertions::assert_eq;

    fn guest_comment(post_id: i64, parent_id: Option<i64>, content: &str) -> NewComment {
        NewComment {
            content: content.to_string(),
            post_id,
            parent_id,
            author: CommentAuthor::Guest(GuestAuthor {
                name: "Guest Reader".into(),
                email: "Guest@Example.com".into(),
                website: None,
            }),
            author_ip: Some("203.0.113.9".into()),
        }
    }

    fn comments_count(fx: &Fixture, post_id: i64) -> i64 {
        crate::helper::content_helpers::get_post(&fx.pool, post_id).unwrap().post.comments_count
    }

    #[test]
    fn guest_comment_starts_pending_and_approval_counts() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "commented", PostStatus::Published);
        let comment = submit(&fx.pool, &guest_comment(post_id, None, "A thoughtful remark")).unwrap();
        assert_eq!(comment.status, CommentStatus::Pending);
        assert_eq!(comment.author_email, "guest@example.com");
        assert_eq!(comments_count(&fx, post_id), 0);

        let approved = set_status(&fx.pool, &fx.editor, comment.id, CommentStatus::Approved).unwrap();
        assert_eq!(approved.status, CommentStatus::Approved);
        assert!(approved.moderated_at.is_some());
        assert_eq!(comments_count(&fx, post_id), 1);
    }

    #[test]
    fn set_status_always_restamps() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "restamp", PostStatus::Published);
        let comment = submit(&fx.pool, &guest_comment(post_id, None, "Stamp me please")).unwrap();
        let first = set_status(&fx.pool, &fx.admin, comment.id, CommentStatus::Approved).unwrap();
        let second = set_status(&fx.pool, &fx.admin, comment.id, CommentStatus::Approved).unwrap();
        assert!(second.moderated_at >= first.moderated_at);
        assert!(second.moderated_at.is_some());
    }

    #[test]
    fn illegal_transition_is_invalid_status() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "illegal", PostStatus::Published);
        let comment = submit(&fx.pool, &guest_comment(post_id, None, "Heading to trash")).unwrap();
        set_status(&fx.pool, &fx.admin, comment.id, CommentStatus::Trash).unwrap();
        let err = set_status(&fx.pool, &fx.admin, comment.id, CommentStatus::Spam).unwrap_err();
        assert!(matches!(err, CmsError::InvalidStatus(_)));
        assert!(matches!(
            set_status(&fx.pool, &fx.admin, 999, CommentStatus::Approved),
            Err(CmsError::NotFound(_))
        ));
        assert!(matches!(parse_status("bogus"), Err(CmsError::InvalidStatus(_))));
        assert_eq!(parse_status("approved").unwrap(), CommentStatus::Approved);
    }

    #[test]
    fn readers_cannot_moderate() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "nomod", PostStatus::Published);
        let comment = submit(&fx.pool, &guest_comment(post_id, None, "Please approve me")).unwrap();
        assert!(matches!(
            set_status(&fx.pool, &fx.reader, comment.id, CommentStatus::Approved),
            Err(CmsError::Unauthorized(_))
        ));
    }

    #[test]
    fn bulk_spam_skips_unknown_ids() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "bulk", PostStatus::Published);
        let a = submit(&fx.pool, &guest_comment(post_id, None, "First bulk comment")).unwrap();
        let b = submit(&fx.pool, &guest_comment(post_id, None, "Second bulk comment")).unwrap();
        let affected = bulk_set_status(&fx.pool, &fx.admin, &[a.id, b.id, 999], CommentStatus::Spam).unwrap();
        assert_eq!(affected, 2);
        let stats = statistics(&fx.pool).unwrap();
        assert_eq!(stats.spam, 2);
        assert_eq!(stats.total, 2);
    }

    #[test]
    fn bulk_skips_rows_that_cannot_transition() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "bulkskip", PostStatus::Published);
        let a = submit(&fx.pool, &guest_comment(post_id, None, "Will be trashed")).unwrap();
        let b = submit(&fx.pool, &guest_comment(post_id, None, "Will be approved")).unwrap();
        set_status(&fx.pool, &fx.admin, a.id, CommentStatus::Trash).unwrap();
        let affected = bulk_set_status(&fx.pool, &fx.admin, &[a.id, b.id], CommentStatus::Spam).unwrap();
        assert_eq!(affected, 1);

        let approved = bulk_action(
            &fx.pool,
            &fx.admin,
            &BulkCommentRequest {
                action: BulkCommentAction::Approve,
                comment_ids: vec![a.id, b.id],
            },
        )
        .unwrap();
        assert_eq!(approved, 2);
        assert_eq!(comments_count(&fx, post_id), 2);
    }

    #[test]
    fn thread_shows_only_approved_with_nested_replies() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "thread", PostStatus::Published);
        let top = submit(&fx.pool, &guest_comment(post_id, None, "Top level comment")).unwrap();
        let hidden = submit(&fx.pool, &guest_comment(post_id, None, "Still pending here")).unwrap();
        set_status(&fx.pool, &fx.admin, top.id, CommentStatus::Approved).unwrap();
        let answer = reply(&fx.pool, &fx.editor, top.id, "Thanks!").unwrap();
        assert_eq!(answer.status, CommentStatus::Approved);
        let pending_reply = submit(&fx.pool, &guest_comment(post_id, Some(top.id), "Me too, nice post")).unwrap();
        assert_eq!(pending_reply.status, CommentStatus::Pending);

        let thread = fetch_thread(&fx.pool, post_id, CommentStatus::Approved).unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].comment.id, top.id);
        let replies: Vec<i64> = thread[0].replies.iter().map(|c| c.id).collect();
        assert_eq!(replies, vec![answer.id]);
        assert!(thread.iter().all(|t| t.comment.id != hidden.id));
        assert_eq!(comments_count(&fx, post_id), 2);
    }

    #[test]
    fn reply_with_approved_parent_hidden_is_not_surfaced() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "orphan", PostStatus::Published);
        let top = submit(&fx.pool, &guest_comment(post_id, None, "Parent stays pending")).unwrap();
        reply(&fx.pool, &fx.admin, top.id, "Approved answer").unwrap();
        let thread = fetch_thread(&fx.pool, post_id, CommentStatus::Approved).unwrap();
        assert!(thread.is_empty());
    }

    #[test]
    fn reply_must_match_parent_post() {
        let fx = test_support::fixture();
        let first = insert_post(&fx, "first", PostStatus::Published);
        let second = insert_post(&fx, "second", PostStatus::Published);
        let parent = submit(&fx.pool, &guest_comment(first, None, "On the first post")).unwrap();
        let err = submit(&fx.pool, &guest_comment(second, Some(parent.id), "Cross post")).unwrap_err();
        assert!(matches!(err, CmsError::Validation(_)));
        let err = submit(&fx.pool, &guest_comment(999, None, "Nowhere to go")).unwrap_err();
        assert!(matches!(err, CmsError::Validation(_)));
    }

    #[test]
    fn public_submission_rules() {
        let fx = test_support::fixture();
        let draft = insert_post(&fx, "draft", PostStatus::Draft);
        assert!(matches!(
            submit_public(&fx.pool, &guest_comment(draft, None, "Too early to comment")),
            Err(CmsError::Validation(_))
        ));
        let live = insert_post(&fx, "live", PostStatus::Published);
        assert!(matches!(
            submit_public(&fx.pool, &guest_comment(live, None, "short")),
            Err(CmsError::Validation(_))
        ));
        settings_helpers::set(&fx.pool, &fx.admin, "enable_comments", "false").unwrap();
        assert!(matches!(
            submit_public(&fx.pool, &guest_comment(live, None, "Comments are off now")),
            Err(CmsError::Unauthorized(_))
        ));
    }

    #[test]
    fn html_is_stripped_from_comments() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "html", PostStatus::Published);
        let comment = submit(&fx.pool, &guest_comment(post_id, None, "<b>Bold</b> claim <script>x()</script>")).unwrap();
        assert_eq!(comment.content, "Bold claim");
    }

    #[test]
    fn encoded_markup_is_stored_escaped() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "encoded", PostStatus::Published);
        let comment = submit_public(
            &fx.pool,
            &guest_comment(post_id, None, "&lt;script&gt;alert(1)&lt;/script&gt; hello"),
        )
        .unwrap();
        assert!(!comment.content.contains("<script>"), "{}", comment.content);
        assert!(!comment.content.contains('<'));
    }

    #[test]
    fn public_replies_use_comment_limits() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "replies", PostStatus::Published);
        let top = submit_public(&fx.pool, &guest_comment(post_id, None, "Opening comment here")).unwrap();

        assert!(matches!(
            submit_public(&fx.pool, &guest_comment(post_id, Some(top.id), "short")),
            Err(CmsError::Validation(_))
        ));
        let long = "a".repeat(800);
        let accepted = submit_public(&fx.pool, &guest_comment(post_id, Some(top.id), &long)).unwrap();
        assert_eq!(accepted.content.len(), 800);
        assert_eq!(accepted.status, CommentStatus::Pending);

        assert!(matches!(
            reply(&fx.pool, &fx.admin, top.id, &long),
            Err(CmsError::Validation(_))
        ));
        assert!(reply(&fx.pool, &fx.admin, top.id, "Noted").is_ok());
    }

    #[test]
    fn markup_padding_does_not_count_toward_length() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "padding", PostStatus::Published);
        assert!(matches!(
            submit(&fx.pool, &guest_comment(post_id, None, "<p></p><p></p>ok")),
            Err(CmsError::Validation(_))
        ));
        let mut padded_name = guest_comment(post_id, None, "A perfectly fine remark");
        if let CommentAuthor::Guest(guest) = &mut padded_name.author {
            guest.name = "<b></b>J".into();
        }
        assert!(matches!(submit(&fx.pool, &padded_name), Err(CmsError::Validation(_))));
    }

    #[test]
    fn delete_cascades_and_recounts() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "deleting", PostStatus::Published);
        let top = submit(&fx.pool, &guest_comment(post_id, None, "Soon to be gone")).unwrap();
        set_status(&fx.pool, &fx.admin, top.id, CommentStatus::Approved).unwrap();
        reply(&fx.pool, &fx.admin, top.id, "Reply goes too").unwrap();
        assert_eq!(comments_count(&fx, post_id), 2);

        delete(&fx.pool, &fx.admin, top.id).unwrap();
        assert_eq!(statistics(&fx.pool).unwrap().total, 0);
        assert_eq!(comments_count(&fx, post_id), 0);
        assert!(matches!(delete(&fx.pool, &fx.admin, top.id), Err(CmsError::NotFound(_))));
    }

    #[test]
    fn bulk_delete_reports_rows_removed() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "bulkdel", PostStatus::Published);
        let a = submit(&fx.pool, &guest_comment(post_id, None, "Delete me first")).unwrap();
        let b = submit(&fx.pool, &guest_comment(post_id, None, "Delete me second")).unwrap();
        assert_eq!(bulk_delete(&fx.pool, &fx.admin, &[a.id, b.id, 42]).unwrap(), 2);
    }

    #[test]
    fn admin_list_and_detail() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "listing", PostStatus::Published);
        let top = submit(&fx.pool, &guest_comment(post_id, None, "Listed comment body")).unwrap();
        reply(&fx.pool, &fx.admin, top.id, "Listed reply").unwrap();

        let pending = CommentFilter {
            status: Some(CommentStatus::Pending),
            ..Default::default()
        };
        let page = list(&fx.pool, &pending, &PageRequest::new(None, None, 10)).unwrap();
        assert_eq!(page.pagination.total_items, 1);
        assert_eq!(page.items[0].reply_count, 1);
        assert_eq!(page.items[0].post_slug, "listing");

        let replies = CommentFilter {
            search: Some("LISTED REPLY".into()),
            ..Default::default()
        };
        let found = list(&fx.pool, &replies, &PageRequest::new(None, None, 10)).unwrap();
        assert_eq!(found.items[0].parent_author_name.as_deref(), Some("Guest Reader"));

        let detail = get(&fx.pool, top.id).unwrap();
        assert_eq!(detail.replies.len(), 1);
        assert_eq!(recent(&fx.pool, 5).unwrap().len(), 2);
    }
}

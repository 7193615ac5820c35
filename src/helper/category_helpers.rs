use std::collections::HashSet;

use rusqlite::Connection;

use crate::error::{CmsError, CmsResult};
use crate::helper::auth_helpers::require_capability;
use crate::helper::content_helpers::require_slug;
use crate::helper::form_helpers::{non_blank, require_hex_color, require_length, require_max_length};
use crate::helper::listing_helpers::{PageRequest, Paginated};
use crate::helper::sanitization_helpers::{strip_all_html, strip_optional};
use crate::models::db_operations::categories_db_operations::{self, CategoryRecord};
use crate::models::db_operations::posts_db_operations;
use crate::models::filters::{CategoryFilter, PostFilter, PostSort};
use crate::models::forms::CategoryInput;
use crate::models::{Capability, Category, CategoryStatistics, Identity, PostListItem};
use crate::DbPool;

const FEATURED_LIMIT: i64 = 6;

fn validate_category_input(input: &CategoryInput) -> CmsResult<()> {
    require_length("Category name", &strip_all_html(&input.name), 2, 100)?;
    if let Some(description) = strip_optional(input.description.as_deref()) {
        require_max_length("Description", &description, 500)?;
    }
    if let Some(color) = non_blank(input.color.as_deref()) {
        require_hex_color(color)?;
    }
    Ok(())
}

fn ensure_parent(conn: &Connection, parent_id: Option<i64>, self_id: Option<i64>) -> CmsResult<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    if Some(parent_id) == self_id {
        return Err(CmsError::Validation("A category cannot be its own parent".to_string()));
    }
    if !categories_db_operations::category_exists(conn, parent_id)? {
        return Err(CmsError::Validation("Parent category does not exist".to_string()));
    }
    let Some(self_id) = self_id else {
        return Ok(());
    };
    // Walk up from the new parent; meeting `self_id` would close a loop.
    let mut seen = HashSet::new();
    let mut ancestor = Some(parent_id);
    while let Some(id) = ancestor {
        if id == self_id {
            return Err(CmsError::Validation(
                "A category cannot be nested under one of its own descendants".to_string(),
            ));
        }
        if !seen.insert(id) {
            break;
        }
        ancestor = categories_db_operations::parent_of(conn, id)?;
    }
    Ok(())
}

fn save(conn: &Connection, input: &CategoryInput, category_id: Option<i64>) -> CmsResult<i64> {
    let name = strip_all_html(&input.name);
    let slug = match non_blank(input.slug.as_deref()) {
        Some(supplied) => require_slug(supplied)?,
        None => require_slug(&name)?,
    };
    if categories_db_operations::slug_taken(conn, &slug, category_id)? {
        return Err(CmsError::Conflict(format!("A category with slug '{}' already exists", slug)));
    }
    ensure_parent(conn, input.parent_id, category_id)?;

    let description = strip_optional(input.description.as_deref());
    let meta_title = strip_optional(input.meta_title.as_deref());
    let meta_description = strip_optional(input.meta_description.as_deref());
    let record = CategoryRecord {
        name: &name,
        slug: &slug,
        description: description.as_deref(),
        color: non_blank(input.color.as_deref()),
        icon: non_blank(input.icon.as_deref()),
        sort_order: input.sort_order,
        is_featured: input.is_featured,
        parent_id: input.parent_id,
        meta_title: meta_title.as_deref(),
        meta_description: meta_description.as_deref(),
    };
    match category_id {
        Some(id) => {
            if categories_db_operations::update_category(conn, id, &record)? == 0 {
                return Err(CmsError::NotFound("Category".to_string()));
            }
            Ok(id)
        }
        None => Ok(categories_db_operations::insert_category(conn, &record)?),
    }
}

fn load(conn: &Connection, category_id: i64) -> CmsResult<Category> {
    categories_db_operations::find_category_by_id(conn, category_id)?
        .ok_or_else(|| CmsError::NotFound("Category".to_string()))
}

pub fn create_category(pool: &DbPool, actor: &Identity, input: &CategoryInput) -> CmsResult<Category> {
    require_capability(actor, Capability::ManageContent)?;
    validate_category_input(input)?;
    let conn = pool.get()?;
    let id = save(&conn, input, None)?;
    log::info!("Category {} created by {}", id, actor.email);
    load(&conn, id)
}

pub fn update_category(pool: &DbPool, actor: &Identity, category_id: i64, input: &CategoryInput) -> CmsResult<Category> {
    require_capability(actor, Capability::ManageContent)?;
    validate_category_input(input)?;
    let conn = pool.get()?;
    save(&conn, input, Some(category_id))?;
    log::info!("Category {} updated by {}", category_id, actor.email);
    load(&conn, category_id)
}

/// Refused with `Conflict` while any post still references the category.
pub fn delete_category(pool: &DbPool, actor: &Identity, category_id: i64) -> CmsResult<()> {
    require_capability(actor, Capability::ManageContent)?;
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    load(&tx, category_id)?;
    let post_count = posts_db_operations::count_posts_in_category(&tx, category_id)?;
    if post_count > 0 {
        log::warn!("Refused to delete category {} with {} posts", category_id, post_count);
        return Err(CmsError::Conflict(format!("category has {} posts", post_count)));
    }
    categories_db_operations::delete_category(&tx, category_id)?;
    tx.commit()?;
    log::info!("Category {} deleted by {}", category_id, actor.email);
    Ok(())
}

pub fn get_category(pool: &DbPool, category_id: i64) -> CmsResult<Category> {
    let conn = pool.get()?;
    load(&conn, category_id)
}

pub fn get_category_by_slug(pool: &DbPool, slug: &str) -> CmsResult<Category> {
    let conn = pool.get()?;
    categories_db_operations::find_category_by_slug(&conn, slug)?
        .ok_or_else(|| CmsError::NotFound("Category".to_string()))
}

pub fn list_categories(
    pool: &DbPool,
    filter: &CategoryFilter,
    page: &PageRequest,
) -> CmsResult<Paginated<Category>> {
    let conn = pool.get()?;
    let total = categories_db_operations::count_categories(&conn, filter)?;
    let items = categories_db_operations::list_categories(&conn, filter, page.limit(), page.offset())?;
    Ok(Paginated::new(items, page, total))
}

pub fn featured_categories(pool: &DbPool) -> CmsResult<Vec<Category>> {
    let conn = pool.get()?;
    let filter = CategoryFilter {
        is_featured: Some(true),
        search: None,
    };
    Ok(categories_db_operations::list_categories(&conn, &filter, FEATURED_LIMIT, 0)?)
}

/// Published posts of a category, newest publication first.
pub fn category_posts(
    pool: &DbPool,
    slug: &str,
    page: &PageRequest,
) -> CmsResult<(Category, Paginated<PostListItem>)> {
    let conn = pool.get()?;
    let category = categories_db_operations::find_category_by_slug(&conn, slug)?
        .ok_or_else(|| CmsError::NotFound("Category".to_string()))?;
    let filter = PostFilter {
        category_id: Some(category.id),
        sort: PostSort::Published,
        ..PostFilter::published()
    };
    let total = posts_db_operations::count_posts(&conn, &filter)?;
    let items = posts_db_operations::list_posts(&conn, &filter, page.limit(), page.offset())?;
    Ok((category, Paginated::new(items, page, total)))
}

pub fn category_statistics(pool: &DbPool) -> CmsResult<CategoryStatistics> {
    let conn = pool.get()?;
    Ok(categories_db_operations::category_statistics(&conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::content_helpers;
    use crate::models::PostStatus;
    use crate::test_support::{self, insert_post};

    fn input(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            slug: None,
            description: None,
            color: Some("#3B82F6".into()),
            icon: None,
            sort_order: 0,
            is_featured: false,
            parent_id: None,
            meta_title: None,
            meta_description: None,
        }
    }

    #[test]
    fn delete_is_blocked_while_posts_reference_category() {
        let fx = test_support::fixture();
        let category = create_category(&fx.pool, &fx.admin, &input("Science News")).unwrap();
        assert_eq!(category.slug, "science-news");

        let mut post = test_support::fixture_post_input(category.id);
        post.title = "Only post here".into();
        let created = content_helpers::create_post(&fx.pool, &fx.admin, &post).unwrap();

        let err = delete_category(&fx.pool, &fx.admin, category.id).unwrap_err();
        match err {
            CmsError::Conflict(msg) => assert_eq!(msg, "category has 1 posts"),
            other => panic!("expected conflict, got {:?}", other),
        }
        content_helpers::delete_post(&fx.pool, &fx.admin, created.post.id).unwrap();
        delete_category(&fx.pool, &fx.admin, category.id).unwrap();
        assert!(matches!(get_category(&fx.pool, category.id), Err(CmsError::NotFound(_))));
    }

    #[test]
    fn technology_fixture_blocks_then_allows_delete() {
        let fx = test_support::fixture();
        let post_id = insert_post(&fx, "tech-post", PostStatus::Published);
        assert!(matches!(
            delete_category(&fx.pool, &fx.admin, fx.category_id),
            Err(CmsError::Conflict(_))
        ));
        assert_eq!(get_category_by_slug(&fx.pool, "technology").unwrap().post_count, 1);
        content_helpers::delete_post(&fx.pool, &fx.admin, post_id).unwrap();
        delete_category(&fx.pool, &fx.admin, fx.category_id).unwrap();
    }

    #[test]
    fn validation_rules() {
        let fx = test_support::fixture();
        let mut bad_color = input("Colors");
        bad_color.color = Some("red".into());
        assert!(matches!(create_category(&fx.pool, &fx.admin, &bad_color), Err(CmsError::Validation(_))));

        let mut missing_parent = input("Orphaned");
        missing_parent.parent_id = Some(999);
        assert!(matches!(create_category(&fx.pool, &fx.admin, &missing_parent), Err(CmsError::Validation(_))));

        let mut own_parent = input("Technology");
        own_parent.parent_id = Some(fx.category_id);
        assert!(matches!(
            update_category(&fx.pool, &fx.admin, fx.category_id, &own_parent),
            Err(CmsError::Validation(_))
        ));

        assert!(matches!(create_category(&fx.pool, &fx.admin, &input("Technology")), Err(CmsError::Conflict(_))));
    }

    #[test]
    fn parent_chain_cannot_loop() {
        let fx = test_support::fixture();
        let a = create_category(&fx.pool, &fx.admin, &input("Languages")).unwrap();
        let mut child = input("Systems");
        child.parent_id = Some(a.id);
        let b = create_category(&fx.pool, &fx.admin, &child).unwrap();
        let mut grandchild = input("Embedded");
        grandchild.parent_id = Some(b.id);
        let c = create_category(&fx.pool, &fx.admin, &grandchild).unwrap();

        let mut looped = input("Languages");
        looped.parent_id = Some(c.id);
        assert!(matches!(
            update_category(&fx.pool, &fx.admin, a.id, &looped),
            Err(CmsError::Validation(_))
        ));
        looped.parent_id = Some(b.id);
        assert!(matches!(
            update_category(&fx.pool, &fx.admin, a.id, &looped),
            Err(CmsError::Validation(_))
        ));

        let mut moved = input("Embedded");
        moved.parent_id = Some(a.id);
        assert_eq!(update_category(&fx.pool, &fx.admin, c.id, &moved).unwrap().parent_id, Some(a.id));
    }

    #[test]
    fn name_padding_is_not_counted() {
        let fx = test_support::fixture();
        assert!(matches!(
            create_category(&fx.pool, &fx.admin, &input("<b></b><i></i>X")),
            Err(CmsError::Validation(_))
        ));
    }

    #[test]
    fn category_posts_only_lists_published() {
        let fx = test_support::fixture();
        insert_post(&fx, "visible", PostStatus::Published);
        insert_post(&fx, "hidden", PostStatus::Draft);
        let (category, page) = category_posts(&fx.pool, "technology", &PageRequest::new(None, None, 10)).unwrap();
        assert_eq!(category.post_count, 2);
        assert_eq!(page.pagination.total_items, 1);
        assert_eq!(page.items[0].post.slug, "visible");
        assert!(matches!(
            category_posts(&fx.pool, "missing", &PageRequest::new(None, None, 10)),
            Err(CmsError::NotFound(_))
        ));
    }

    #[test]
    fn featured_and_statistics() {
        let fx = test_support::fixture();
        let mut featured = input("Featured Topic");
        featured.is_featured = true;
        create_category(&fx.pool, &fx.admin, &featured).unwrap();
        assert_eq!(featured_categories(&fx.pool).unwrap().len(), 1);
        let stats = category_statistics(&fx.pool).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.featured, 1);
    }
}

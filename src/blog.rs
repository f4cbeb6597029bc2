use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::model::BlogPost;
use crate::store::{EntityKind, EntityStore, Record, SortSpec, decode_all, record};

fn published_filter() -> Record {
    record([("status", Value::String("published".to_string()))])
}

/// Published posts, newest first.
pub async fn list_published<S: EntityStore>(store: &S) -> StoreResult<Vec<BlogPost>> {
    let records = store
        .filter(
            EntityKind::BlogPost,
            &published_filter(),
            Some(&SortSpec::desc("published_date")),
        )
        .await?;
    Ok(decode_all(EntityKind::BlogPost, records))
}

/// The article page lookup. Drafts are never returned.
pub async fn find_published<S: EntityStore>(store: &S, slug: &str) -> StoreResult<Option<BlogPost>> {
    let mut matches = published_filter();
    matches.insert("slug".to_string(), Value::String(slug.to_string()));
    let records = store.filter(EntityKind::BlogPost, &matches, None).await?;
    Ok(decode_all(EntityKind::BlogPost, records).into_iter().next())
}

/// Every post for the admin list, most recently created first.
pub async fn list_all<S: EntityStore>(store: &S) -> StoreResult<Vec<BlogPost>> {
    let records = store
        .list(EntityKind::BlogPost, Some(&SortSpec::desc("created_date")), None)
        .await?;
    Ok(decode_all(EntityKind::BlogPost, records))
}

pub async fn get_post<S: EntityStore>(store: &S, id: &str) -> StoreResult<BlogPost> {
    let record = store.get(EntityKind::BlogPost, id).await?;
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Updates when the post has an id, creates otherwise. Returns the stored post.
pub async fn save_post<S: EntityStore>(store: &S, post: &BlogPost) -> StoreResult<BlogPost> {
    let fields = post.to_record();
    let saved = match post.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => store.update(EntityKind::BlogPost, id, fields).await?,
        None => store.create(EntityKind::BlogPost, fields).await?,
    };
    tracing::info!("saved blog post {:?}", post.slug);
    serde_json::from_value(Value::Object(saved)).map_err(StoreError::from)
}

pub async fn delete_post<S: EntityStore>(store: &S, id: &str) -> StoreResult<()> {
    store.delete(EntityKind::BlogPost, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PostStatus;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::new().with_records(
            EntityKind::BlogPost,
            vec![
                rec(json!({"id": "1", "title": "Old", "slug": "old", "status": "published", "published_date": "2025-01-05"})),
                rec(json!({"id": "2", "title": "Draft", "slug": "draft", "status": "draft", "published_date": "2025-03-01"})),
                rec(json!({"id": "3", "title": "New", "slug": "new", "status": "published", "published_date": "2025-02-10T08:00:00.000Z"})),
            ],
        )
    }

    #[tokio::test]
    async fn published_posts_newest_first() {
        let posts = list_published(&store()).await.unwrap();
        let slugs: Vec<&str> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn drafts_are_not_found_by_slug() {
        let store = store();
        assert!(find_published(&store, "draft").await.unwrap().is_none());
        let post = find_published(&store, "new").await.unwrap().unwrap();
        assert_eq!(post.title, "New");
        assert_eq!(post.published_date, NaiveDate::from_ymd_opt(2025, 2, 10));
    }

    #[tokio::test]
    async fn save_creates_then_updates() {
        let store = MemoryStore::new();
        let mut post = BlogPost::draft(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        post.set_title("Wegovy vs Mounjaro: Costs!");
        post.set_tags_input("pricing, glp-1,");
        let created = save_post(&store, &post).await.unwrap();
        let id = created.id.clone().unwrap();
        assert_eq!(created.slug, "wegovy-vs-mounjaro-costs");
        assert_eq!(created.author_name.as_deref(), Some("Admin"));

        let mut edit = created;
        edit.status = PostStatus::Published;
        save_post(&store, &edit).await.unwrap();
        assert_eq!(store.snapshot(EntityKind::BlogPost).await.len(), 1);
        let stored = get_post(&store, &id).await.unwrap();
        assert!(stored.is_published());
        assert_eq!(stored.tags, vec!["pricing", "glp-1"]);

        delete_post(&store, &id).await.unwrap();
        assert!(list_all(&store).await.unwrap().is_empty());
    }
}

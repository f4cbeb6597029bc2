use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::lenient;
use crate::store::Record;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::id_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::id_string")]
    pub slug: String,
    #[serde(default, deserialize_with = "lenient::id_string")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient::id_string")]
    pub excerpt: String,
    #[serde(default, deserialize_with = "status_or_draft")]
    pub status: PostStatus,
    #[serde(default, deserialize_with = "date_prefix", skip_serializing_if = "Option::is_none")]
    pub published_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub featured_image_url: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn status_or_draft<'de, D: Deserializer<'de>>(d: D) -> Result<PostStatus, D::Error> {
    Ok(match lenient::opt_string(d)?.as_deref() {
        Some("published") => PostStatus::Published,
        _ => PostStatus::Draft,
    })
}

/// Accepts `2025-03-01` as well as full timestamps such as
/// `2025-03-01T09:30:00.000Z`.
fn date_prefix<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    Ok(lenient::opt_string(d)?.and_then(|s| {
        let day = s.get(..10).unwrap_or(&s);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }))
}

impl BlogPost {
    /// A fresh editor state: draft by "Admin", dated `today`.
    pub fn draft(today: NaiveDate) -> Self {
        Self {
            author_name: Some("Admin".to_string()),
            published_date: Some(today),
            ..Default::default()
        }
    }

    /// Editing the title re-derives the slug. The slug can still be edited
    /// afterwards; nothing checks it for uniqueness.
    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.slug = slugify(title);
    }

    pub fn set_tags_input(&mut self, input: &str) {
        self.tags = parse_tags(input);
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Payload for create/update: id stripped, blank tags dropped.
    pub fn to_record(&self) -> Record {
        let mut post = self.clone();
        post.id = None;
        post.tags.retain(|t| !t.is_empty());
        match serde_json::to_value(post) {
            Ok(Value::Object(map)) => map,
            _ => Record::new(),
        }
    }
}

/// Lowercase, whitespace runs to `-`, drop everything except word
/// characters and `-`, collapse repeated `-`, trim `-` from both ends.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        }
    }

    let mut collapsed = String::with_capacity(out.len());
    for c in out.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed.trim_matches('-').to_string()
}

/// `"weight loss, wegovy,, "` → `["weight loss", "wegovy"]`.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slugify_normalizes() {
        assert_eq!(slugify("Sample Pharmacy!!"), "sample-pharmacy");
        assert_eq!(slugify("  Wegovy vs. Mounjaro: 2025 Guide  "), "wegovy-vs-mounjaro-2025-guide");
        assert_eq!(slugify("a -- b"), "a-b");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
        assert_eq!(slugify("Café Crème"), "caf-crme");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn title_edit_rederives_slug_but_slug_stays_editable() {
        let mut post = BlogPost::draft(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        post.set_title("Is Saxenda Right For You?");
        assert_eq!(post.slug, "is-saxenda-right-for-you");
        post.slug = "saxenda".to_string();
        assert_eq!(post.slug, "saxenda");
        assert_eq!(post.author_name.as_deref(), Some("Admin"));
        assert_eq!(post.status, PostStatus::Draft);
    }

    #[test]
    fn record_payload_drops_id_and_blank_tags() {
        let mut post = BlogPost::draft(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        post.id = Some("p1".to_string());
        post.tags = vec!["glp-1".to_string(), String::new()];
        let rec = post.to_record();
        assert!(!rec.contains_key("id"));
        assert_eq!(rec["tags"], json!(["glp-1"]));
        assert_eq!(rec["published_date"], json!("2025-01-02"));
        assert_eq!(rec["status"], json!("draft"));
    }

    #[test]
    fn timestamps_and_unknown_status_are_tolerated() {
        let post: BlogPost = serde_json::from_value(json!({
            "id": "p1",
            "title": "Hello",
            "status": "archived",
            "published_date": "2025-03-01T09:30:00.000Z"
        }))
        .unwrap();
        assert_eq!(post.status, PostStatus::Draft);
        assert_eq!(post.published_date, NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[test]
    fn tags_input_is_split_and_trimmed() {
        assert_eq!(parse_tags("weight loss, wegovy,, "), vec!["weight loss", "wegovy"]);
    }
}

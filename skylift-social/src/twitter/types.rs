use serde::{Deserialize, Serialize};

/// One element of the export array: `{ "tweet": { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub tweet: Tweet,
}

/// A tweet as written by the export.
///
/// The export carries both `id` and `id_str` (and the same pair for reply
/// targets); either may be missing depending on the export vintage, so both
/// are kept and [`Tweet::id`] / [`Tweet::reply_to_id`] pick whichever is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    #[serde(default, rename = "id")]
    pub id_num: Option<String>,
    #[serde(default)]
    pub id_str: Option<String>,
    pub created_at: String,
    pub full_text: String,

    #[serde(default)]
    pub in_reply_to_status_id: Option<String>,
    #[serde(default)]
    pub in_reply_to_status_id_str: Option<String>,
    #[serde(default)]
    pub in_reply_to_screen_name: Option<String>,
    #[serde(default)]
    pub possibly_sensitive: Option<bool>,
    #[serde(default)]
    pub retweeted: bool,

    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub extended_entities: Option<ExtendedEntities>,
}

impl Tweet {
    pub fn id(&self) -> Option<&str> {
        first_non_blank(self.id_str.as_deref(), self.id_num.as_deref())
    }

    pub fn reply_to_id(&self) -> Option<&str> {
        first_non_blank(
            self.in_reply_to_status_id_str.as_deref(),
            self.in_reply_to_status_id.as_deref(),
        )
    }
}

fn first_non_blank<'a>(a: Option<&'a str>, b: Option<&'a str>) -> Option<&'a str> {
    a.filter(|s| !s.trim().is_empty())
        .or_else(|| b.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Entities {
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
    #[serde(default)]
    pub hashtags: Vec<HashTag>,
    #[serde(default)]
    pub user_mentions: Vec<MentionEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtendedEntities {
    #[serde(default)]
    pub media: Vec<Media>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlEntity {
    pub url: String,
    #[serde(default)]
    pub expanded_url: Option<String>,
    #[serde(default)]
    pub display_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashTag {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionEntity {
    pub screen_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    /// The `t.co` link appended to the tweet text for this attachment.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_url_https: Option<String>,
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skylift_common::{Facet, FacetKind};

pub const POST_COLLECTION: &str = "app.bsky.feed.post";
/// The images embed accepts at most this many attachments.
pub const MAX_IMAGES: usize = 4;

/// An authenticated account session.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub handle: String,
    pub access_jwt: String,
    pub refresh_jwt: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .field("access_jwt", &"<redacted>")
            .field("refresh_jwt", &"<redacted>")
            .finish()
    }
}

/// Strong reference (`uri` + `cid`) to a created record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

/// Opaque blob object returned by `uploadBlob`; echoed back verbatim in embeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub Value);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: PostRef,
    pub parent: PostRef,
}

/// Everything needed to create one post.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub text: String,
    pub facets: Vec<Facet>,
    /// Original authoring time; the destination shows this instead of the import time.
    pub created_at: DateTime<Utc>,
    pub reply: Option<ReplyRef>,
    pub images: Vec<BlobRef>,
}

// ==============================
// XRPC wire shapes
// ==============================

#[derive(Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct UploadBlobResponse {
    pub blob: BlobRef,
}

#[derive(Serialize)]
pub(crate) struct CreateRecordRequest<'a> {
    pub repo: &'a str,
    pub collection: &'static str,
    pub record: PostRecord<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostRecord<'a> {
    #[serde(rename = "$type")]
    pub kind: &'static str,
    pub text: &'a str,
    pub created_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<FacetRecord<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<&'a ReplyRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<ImagesEmbed<'a>>,
}

impl<'a> PostRecord<'a> {
    pub fn from_draft(draft: &'a PostDraft) -> Self {
        let embed = (!draft.images.is_empty()).then(|| ImagesEmbed {
            kind: "app.bsky.embed.images",
            images: draft
                .images
                .iter()
                .take(MAX_IMAGES)
                .map(|image| EmbeddedImage { image, alt: "" })
                .collect(),
        });
        Self {
            kind: POST_COLLECTION,
            text: &draft.text,
            created_at: draft
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            facets: draft.facets.iter().map(FacetRecord::from).collect(),
            reply: draft.reply.as_ref(),
            embed,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct FacetRecord<'a> {
    pub index: ByteSlice,
    pub features: [FacetFeature<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Serialize)]
#[serde(tag = "$type")]
pub(crate) enum FacetFeature<'a> {
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: &'a str },
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag { tag: &'a str },
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention { did: &'a str },
}

impl<'a> From<&'a Facet> for FacetRecord<'a> {
    fn from(facet: &'a Facet) -> Self {
        let feature = match &facet.kind {
            FacetKind::Link { uri } => FacetFeature::Link { uri },
            FacetKind::Hashtag { tag } => FacetFeature::Tag { tag },
            FacetKind::Mention { did } => FacetFeature::Mention { did },
        };
        Self {
            index: ByteSlice {
                byte_start: facet.start,
                byte_end: facet.end,
            },
            features: [feature],
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ImagesEmbed<'a> {
    #[serde(rename = "$type")]
    pub kind: &'static str,
    pub images: Vec<EmbeddedImage<'a>>,
}

#[derive(Serialize)]
pub(crate) struct EmbeddedImage<'a> {
    pub image: &'a BlobRef,
    pub alt: &'a str,
}

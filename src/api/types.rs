//! Serde mirrors of the remote catalog payloads.
//!
//! Only the fields the engine depends on are modeled; everything else the
//! remote returns is ignored during deserialization. The full series
//! descriptor is additionally kept as a raw JSON snapshot on the persisted
//! series row, so unmapped fields are not lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level series metadata response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesInfo {
    /// The series descriptor itself.
    pub comic: SeriesDescriptor,
    /// Credited authors, if the remote returns them.
    #[serde(default)]
    pub authors: Vec<Credit>,
    /// Credited artists, if the remote returns them.
    #[serde(default)]
    pub artists: Vec<Credit>,
}

/// Core series descriptor fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesDescriptor {
    /// Stable remote series id.
    pub hid: String,
    /// Display title.
    pub title: String,
    /// URL slug.
    pub slug: String,
    /// Remote-reported chapter count.
    #[serde(default)]
    pub chapter_count: u32,
    /// Cover image URL.
    #[serde(default)]
    pub cover_url: String,
    /// Publication status code, as reported by the remote.
    #[serde(default)]
    pub status: Option<i64>,
}

/// An author/artist credit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credit {
    /// Display name.
    pub name: String,
    /// URL slug.
    #[serde(default)]
    pub slug: String,
}

/// One chapter release in the remote listing.
///
/// A single chapter number may appear many times, once per competing
/// translator release. Attribution is resolved through
/// [`crate::select::translator_name`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterRecord {
    /// Unique chapter release id.
    pub hid: String,
    /// Chapter number as a decimal string (display form).
    pub chap: String,
    /// Release title, if any.
    #[serde(default)]
    pub title: Option<String>,
    /// Volume label, if any.
    #[serde(default)]
    pub vol: Option<String>,
    /// Language code (the engine filters to one language).
    pub lang: String,
    /// When the release was created on the remote.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// When the release becomes publicly available. Future values gate
    /// the chapter out of the downloadable set.
    #[serde(default)]
    pub publish_at: Option<DateTime<Utc>>,
    /// Raw group-name attribution list (second link in the fallback chain).
    #[serde(default)]
    pub group_name: Option<Vec<String>>,
    /// Linked contributor-group entries (first link in the fallback chain).
    #[serde(default)]
    pub md_chapters_groups: Vec<GroupLink>,
    /// Uploader identity (third link in the fallback chain).
    #[serde(default)]
    pub identities: Option<Identity>,
}

/// A linked contributor-group entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupLink {
    /// The group record, when populated.
    #[serde(default)]
    pub md_groups: Option<GroupRef>,
}

/// A contributor group reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRef {
    /// Group display title.
    pub title: String,
    /// Group slug.
    #[serde(default)]
    pub slug: String,
}

/// An uploader identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Identity traits.
    #[serde(default)]
    pub traits: Option<IdentityTraits>,
}

/// Identity traits carrying the display username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityTraits {
    /// Display username.
    pub username: String,
}

/// One page of the remote chapter listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterListing {
    /// Chapter releases on this page.
    #[serde(default)]
    pub chapters: Vec<ChapterRecord>,
}

/// One entry of a chapter's image manifest, in page order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageManifestEntry {
    /// Remote asset key on the binary asset host.
    pub b2key: String,
    /// Image width in pixels.
    #[serde(default)]
    pub w: u32,
    /// Image height in pixels.
    #[serde(default)]
    pub h: u32,
    /// Payload size in bytes.
    #[serde(default)]
    pub s: u64,
}

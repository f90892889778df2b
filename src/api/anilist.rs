//! AniList GraphQL client. One query covers both media search pages and the
//! caller's own list entry; reviews take a second, authenticated lookup.

use std::{borrow::Cow, fmt, num::NonZeroUsize, sync::Arc};

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::debug;

use crate::select::{EntryLabel, Page, PAGE_SIZE};

const GRAPHQL_URL: &str = "https://graphql.anilist.co";

const MEDIA_QUERY: &str = r"
query ($search: String, $type: MediaType, $page: Int, $perPage: Int) {
    Page(page: $page, perPage: $perPage) {
        pageInfo {
            total
            hasNextPage
        }
        media(search: $search, type: $type) {
            id
            title {
                english
                romaji
            }
            format
            status
            description(asHtml: false)
            startDate { year month day }
            endDate { year month day }
            episodes
            chapters
            volumes
            meanScore
            siteUrl
            coverImage { large }
            mediaListEntry {
                userId
                status
                score(format: POINT_100)
                progress
                notes
                completedAt { year month day }
            }
        }
    }
}";

const REVIEW_QUERY: &str = r"
query ($mediaId: Int, $userId: Int) {
    Review(mediaId: $mediaId, userId: $userId, mediaType: ANIME) {
        body(asHtml: false)
    }
}";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("anilist returned errors: {0}")]
    GraphQl(String),

    #[error("anilist response had no data")]
    MissingData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Anime,
    Manga,
}

impl MediaType {
    pub const fn as_graphql(self) -> &'static str {
        match self {
            Self::Anime => "ANIME",
            Self::Manga => "MANGA",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AniList {
    client: reqwest::Client,
    token: Option<Arc<str>>,
}

impl AniList {
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.map(Into::into),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    async fn post<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, Error> {
        let mut request = self.client.post(GRAPHQL_URL).json(&json!({
            "query": query,
            "variables": variables,
        }));

        if let Some(token) = self.token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response: GraphQlResponse<T> =
            request.send().await?.error_for_status()?.json().await?;

        response.into_result()
    }

    pub async fn search(
        &self,
        kind: MediaType,
        title: &str,
        page: NonZeroUsize,
    ) -> Result<Page<Media>, Error> {
        debug!(title, page = page.get(), "searching anilist");

        let data: MediaPageData = self
            .post(
                MEDIA_QUERY,
                json!({
                    "search": title,
                    "type": kind.as_graphql(),
                    "page": page.get(),
                    "perPage": PAGE_SIZE,
                }),
            )
            .await?;

        Ok(data.into_page())
    }

    /// The body of the list owner's review of a media entry, if one exists.
    pub async fn review_body(&self, media_id: u64, user_id: u64) -> Result<Option<String>, Error> {
        let data: ReviewData = self
            .post(
                REVIEW_QUERY,
                json!({ "mediaId": media_id, "userId": user_id }),
            )
            .await?;

        Ok(data.review.and_then(|review| review.body))
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl<T> GraphQlResponse<T> {
    fn into_result(self) -> Result<T, Error> {
        if let Some(errors) = self.errors.filter(|errors| !errors.is_empty()) {
            let joined = errors
                .into_iter()
                .map(|err| err.message)
                .collect::<Vec<_>>()
                .join(", ");

            return Err(Error::GraphQl(joined));
        }

        self.data.ok_or(Error::MissingData)
    }
}

#[derive(Debug, Deserialize)]
struct MediaPageData {
    #[serde(rename = "Page")]
    page: MediaPage,
}

impl MediaPageData {
    fn into_page(self) -> Page<Media> {
        let MediaPage { page_info, media } = self.page;
        Page::new(media, page_info.total, page_info.has_next_page)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaPage {
    page_info: PageInfo,
    media: Vec<Media>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    total: usize,
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct ReviewData {
    #[serde(rename = "Review")]
    review: Option<Review>,
}

#[derive(Debug, Deserialize)]
struct Review {
    body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: u64,
    pub title: Title,
    pub format: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub episodes: Option<u32>,
    pub chapters: Option<u32>,
    pub volumes: Option<u32>,
    pub mean_score: Option<u8>,
    pub site_url: Option<String>,
    pub start_date: Option<FuzzyDate>,
    pub end_date: Option<FuzzyDate>,
    pub cover_image: Option<CoverImage>,
    pub media_list_entry: Option<ListEntry>,
}

impl EntryLabel for Media {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.title.display())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Title {
    pub english: Option<String>,
    pub romaji: Option<String>,
}

impl Title {
    /// English title when AniList has one, romaji otherwise.
    pub fn display(&self) -> &str {
        self.english
            .as_deref()
            .or(self.romaji.as_deref())
            .unwrap_or("(untitled)")
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct FuzzyDate {
    pub year: Option<i32>,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

impl FuzzyDate {
    pub const fn is_known(&self) -> bool {
        self.year.is_some()
    }
}

impl fmt::Display for FuzzyDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.year, self.month, self.day) {
            (Some(year), Some(month), Some(day)) => write!(f, "{year}-{month}-{day}"),
            (Some(year), Some(month), None) => write!(f, "{year}-{month}"),
            (Some(year), _, _) => write!(f, "{year}"),
            _ => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoverImage {
    pub large: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    pub user_id: u64,
    pub status: Option<String>,
    pub score: Option<u8>,
    pub progress: Option<u32>,
    pub notes: Option<String>,
    pub completed_at: Option<FuzzyDate>,
}

const VERDICTS: [&str; 11] = [
    "(Garbage)",
    "(Appalling)",
    "(Horrible)",
    "(Very Bad)",
    "(Bad)",
    "(Average)",
    "(Fine)",
    "(Good)",
    "(Very Good)",
    "(Great)",
    "(Masterpiece)",
];

/// One-word verdict for a 0-100 score.
pub fn verdict(score: u8) -> &'static str {
    let index = ((usize::from(score) + 5) / 10).min(VERDICTS.len() - 1);
    VERDICTS[index]
}

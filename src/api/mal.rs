//! MyAnimeList client. Search goes through the public typeahead endpoint,
//! which returns every match in one response; the interesting fields
//! (synopsis, episode counts and so on) only exist on the entry's HTML page,
//! so details are scraped from there.

use std::{borrow::Cow, collections::HashMap};

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::select::EntryLabel;

const SEARCH_URL: &str = "https://myanimelist.net/search/prefix.json";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not build search url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    Anime,
    Manga,
}

impl Medium {
    pub const fn as_query(self) -> &'static str {
        match self {
            Self::Anime => "anime",
            Self::Manga => "manga",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Mal {
    client: reqwest::Client,
}

impl Default for Mal {
    fn default() -> Self {
        Self::new()
    }
}

impl Mal {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Every match for `title`, in MAL's own relevance order.
    pub async fn search(&self, medium: Medium, title: &str) -> Result<Vec<SearchEntry>, Error> {
        let url = Url::parse_with_params(
            SEARCH_URL,
            &[("type", medium.as_query()), ("keyword", title), ("v", "1")],
        )?;

        debug!(title, medium = medium.as_query(), "searching myanimelist");

        let response: SearchResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.entries(medium))
    }

    pub async fn details(&self, entry: &SearchEntry) -> Result<Details, Error> {
        let html = self
            .client
            .get(&entry.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(scrape_details(&html))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    categories: Vec<SearchCategory>,
}

impl SearchResponse {
    fn entries(self, medium: Medium) -> Vec<SearchEntry> {
        self.categories
            .into_iter()
            .filter(|category| category.kind == medium.as_query())
            .flat_map(|category| category.items)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct SearchCategory {
    #[serde(rename = "type")]
    kind: String,
    items: Vec<SearchEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SearchEntry {
    pub id: u64,
    pub name: String,
    pub url: String,

    #[serde(default)]
    pub payload: Payload,
}

impl EntryLabel for SearchEntry {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct Payload {
    pub media_type: Option<String>,
    pub score: Option<String>,
    pub status: Option<String>,
    pub aired: Option<String>,
    pub published: Option<String>,
}

impl Payload {
    /// Airing range for anime, publishing range for manga.
    pub fn dates(&self) -> Option<&str> {
        self.aired.as_deref().or(self.published.as_deref())
    }
}

/// What the entry page itself yields: the OpenGraph synopsis and cover, plus
/// the labelled rows from the info sidebar ("Episodes", "Volumes", ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Details {
    pub synopsis: Option<String>,
    pub image: Option<String>,
    info: HashMap<String, String>,
}

impl Details {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.info
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty() && *value != "Unknown" && *value != "N/A")
    }
}

// scraper's Html is not Send, so parsing stays in a sync fn
fn scrape_details(html: &str) -> Details {
    let document = Html::parse_document(html);

    let og = |property: &str| {
        let selector = Selector::parse(&format!(r#"meta[property="og:{property}"]"#)).ok()?;

        document
            .select(&selector)
            .next()?
            .value()
            .attr("content")
            .map(ToOwned::to_owned)
    };

    let mut info = HashMap::new();

    if let Ok(selector) = Selector::parse("span.dark_text") {
        for span in document.select(&selector) {
            let label = span.text().collect::<String>();
            let label = label.trim().trim_end_matches(':');

            let Some(row) = span.parent().and_then(ElementRef::wrap) else {
                continue;
            };

            let row_text = row.text().collect::<String>();
            let value = row_text
                .split_once(':')
                .map_or("", |(_, rest)| rest)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");

            info.insert(label.to_owned(), value);
        }
    }

    Details {
        synopsis: og("description"),
        image: og("image"),
        info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn search_response_keeps_only_the_requested_medium() {
        let response: SearchResponse = serde_json::from_value(json!({
            "categories": [
                {
                    "type": "anime",
                    "items": [
                        {
                            "id": 1,
                            "name": "Cowboy Bebop",
                            "url": "https://myanimelist.net/anime/1/Cowboy_Bebop",
                            "payload": {
                                "media_type": "TV",
                                "score": "8.75",
                                "status": "Finished Airing",
                                "aired": "Apr 3, 1998 to Apr 24, 1999"
                            }
                        }
                    ]
                },
                {
                    "type": "manga",
                    "items": [
                        {
                            "id": 173,
                            "name": "Cowboy Bebop",
                            "url": "https://myanimelist.net/manga/173/Cowboy_Bebop"
                        }
                    ]
                }
            ]
        }))
        .expect("fixture should deserialize");

        let entries = response.entries(Medium::Anime);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Cowboy Bebop");
        assert_eq!(entries[0].payload.dates(), Some("Apr 3, 1998 to Apr 24, 1999"));
    }

    #[test]
    fn details_scrape_reads_opengraph_and_info_rows() {
        let html = r#"
            <html>
            <head>
                <meta property="og:description" content="In the year 2071, bounty hunters roam the solar system.">
                <meta property="og:image" content="https://cdn.myanimelist.net/images/anime/4/19644.jpg">
            </head>
            <body>
                <div><span class="dark_text">Episodes:</span> 26</div>
                <div><span class="dark_text">Status:</span> Finished Airing</div>
                <div><span class="dark_text">Premiered:</span> Unknown</div>
            </body>
            </html>
        "#;

        let details = scrape_details(html);

        assert_eq!(
            details.synopsis.as_deref(),
            Some("In the year 2071, bounty hunters roam the solar system.")
        );
        assert_eq!(
            details.image.as_deref(),
            Some("https://cdn.myanimelist.net/images/anime/4/19644.jpg")
        );
        assert_eq!(details.field("Episodes"), Some("26"));
        assert_eq!(details.field("Status"), Some("Finished Airing"));
        // placeholder values read as absent
        assert_eq!(details.field("Premiered"), None);
        assert_eq!(details.field("Score"), None);
    }
}

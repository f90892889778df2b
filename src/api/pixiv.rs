//! Pixiv app-API client. Auth is the refresh-token flow: the access token
//! lives in memory and gets replaced whenever the API rejects it, and a
//! rotated refresh token is written back to the config store so the next
//! run can pick it up.

use std::{collections::VecDeque, sync::Arc};

use arc_swap::ArcSwapOption;
use rand::{seq::SliceRandom, Rng};
use reqwest::{
    header::{REFERER, USER_AGENT},
    StatusCode, Url,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::store::{ConfigStore, Scope, Store};

const AUTH_URL: &str = "https://oauth.secure.pixiv.net/auth/token";
const APP_API: &str = "https://app-api.pixiv.net";

// the public credentials of the official android app
const CLIENT_ID: &str = "MOBrBDS8blbauoSck0ZfDbtuzpyT";
const CLIENT_SECRET: &str = "lsACyCD94FhDUtGTXi3QzcFE2uU1hqtDaKeqrdwj";

const APP_USER_AGENT: &str = "PixivAndroidApp/5.0.234 (Android 11; Pixel 5)";

/// Ids of recently posted illustrations, kept to avoid reposts.
const DUPE_WINDOW: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("pixiv is not configured")]
    NotConfigured,

    #[error("pixiv login could not be refreshed: {0}")]
    Auth(reqwest::Error),

    #[error("pixiv had no fresh illustrations to offer")]
    NoneAvailable,
}

#[derive(Debug, Clone)]
pub struct Pixiv {
    client: reqwest::Client,
    access: Arc<ArcSwapOption<String>>,
    refresh: Arc<ArcSwapOption<String>>,
    dupes: Arc<Mutex<VecDeque<u64>>>,
    store: Store,
}

impl Pixiv {
    /// Config-store key the rotated refresh token is persisted under.
    pub const TOKEN_KEY: &'static str = "pixiv_refresh_token";

    pub fn new(refresh_token: Option<String>, store: Store) -> Self {
        Self {
            client: reqwest::Client::new(),
            access: Arc::new(ArcSwapOption::empty()),
            refresh: Arc::new(ArcSwapOption::new(refresh_token.map(Arc::new))),
            dupes: Arc::new(Mutex::new(VecDeque::with_capacity(DUPE_WINDOW))),
            store,
        }
    }

    pub fn configured(&self) -> bool {
        self.refresh.load().is_some()
    }

    /// Trades the refresh token for a new access token. Pixiv rotates the
    /// refresh token on every exchange, so the new one is persisted.
    async fn refresh_session(&self) -> Result<String, Error> {
        let Some(refresh) = self.refresh.load_full() else {
            return Err(Error::NotConfigured);
        };

        let form = [
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh.as_str()),
            ("get_secure_url", "1"),
        ];

        let response: AuthResponse = self
            .client
            .post(AUTH_URL)
            .header(USER_AGENT, APP_USER_AGENT)
            .form(&form)
            .send()
            .await?
            .error_for_status()
            .map_err(Error::Auth)?
            .json()
            .await?;

        let AuthTokens {
            access_token,
            refresh_token,
        } = response.response;

        self.access.store(Some(Arc::new(access_token.clone())));
        self.refresh.store(Some(Arc::new(refresh_token.clone())));

        if let Err(err) = self
            .store
            .set(Scope::Global, Self::TOKEN_KEY, &refresh_token)
            .await
        {
            warn!("could not persist rotated pixiv refresh token: {err}");
        }

        info!("pixiv session refreshed");

        Ok(access_token)
    }

    async fn access_token(&self) -> Result<String, Error> {
        match self.access.load_full() {
            Some(token) => Ok(token.as_ref().clone()),
            None => self.refresh_session().await,
        }
    }

    /// GET against the app API, refreshing the session once if the cached
    /// access token has gone stale.
    async fn app_get(&self, url: Url) -> Result<IllustsResponse, Error> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, APP_USER_AGENT)
            .bearer_auth(&token)
            .send()
            .await?;

        let response = if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            warn!(status = %response.status(), "pixiv rejected the session, refreshing");
            let token = self.refresh_session().await?;

            self.client
                .get(url)
                .header(USER_AGENT, APP_USER_AGENT)
                .bearer_auth(&token)
                .send()
                .await?
        } else {
            response
        };

        Ok(response.error_for_status()?.json().await?)
    }

    async fn poll_illusts(&self, nsfw: bool) -> Result<Vec<Illust>, Error> {
        let (path, params) = feed_request(nsfw, &mut rand::thread_rng());

        let url = Url::parse_with_params(&format!("{APP_API}{path}"), params)
            .expect("hard-coded url should be valid");

        debug!(%url, "polling pixiv");

        Ok(self.app_get(url).await?.illusts)
    }

    /// A random recent illustration that has not been posted lately. Manga
    /// pages are skipped.
    pub async fn random_post(&self, nsfw: bool) -> Result<Post, Error> {
        let illusts = self.poll_illusts(nsfw).await?;

        let mut dupes = self.dupes.lock().await;

        let mut rng = rand::thread_rng();

        let post = choose_fresh(&illusts, &dupes, &mut rng)
            .and_then(|illust| {
                illust.image_url(&mut rng).map(|url| Post {
                    id: illust.id,
                    image_url: url.to_owned(),
                })
            })
            .ok_or(Error::NoneAvailable)?;

        remember(&mut dupes, post.id);

        Ok(post)
    }

    /// Fetches the raw image. Pixiv's CDN requires the app referer.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, Error> {
        let bytes = self
            .client
            .get(url)
            .header(USER_AGENT, APP_USER_AGENT)
            .header(REFERER, format!("{APP_API}/"))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(bytes.to_vec())
    }
}

fn feed_request(nsfw: bool, rng: &mut impl Rng) -> (&'static str, Vec<(&'static str, &'static str)>) {
    if nsfw {
        let mode = if rng.gen::<bool>() { "day_r18" } else { "week_r18" };
        ("/v1/illust/ranking", vec![("mode", mode)])
    } else if rng.gen::<bool>() {
        ("/v1/illust/recommended", vec![("content_type", "illust")])
    } else {
        let mode = if rng.gen::<bool>() { "day" } else { "week" };
        ("/v1/illust/ranking", vec![("mode", mode)])
    }
}

fn choose_fresh<'a>(
    illusts: &'a [Illust],
    dupes: &VecDeque<u64>,
    rng: &mut impl Rng,
) -> Option<&'a Illust> {
    let fresh: Vec<&Illust> = illusts
        .iter()
        .filter(|illust| !illust.is_manga() && !dupes.contains(&illust.id))
        .collect();

    fresh.choose(rng).copied()
}

fn remember(dupes: &mut VecDeque<u64>, id: u64) {
    if dupes.len() == DUPE_WINDOW {
        dupes.pop_front();
    }

    dupes.push_back(id);
}

/// An illustration picked for posting: its public page id and the direct
/// image to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: u64,
    pub image_url: String,
}

impl Post {
    pub fn page_url(&self) -> String {
        format!("https://pixiv.net/i/{}", self.id)
    }

    pub fn filename(&self) -> &str {
        self.image_url
            .rsplit('/')
            .next()
            .unwrap_or("illustration.png")
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    response: AuthTokens,
}

#[derive(Debug, Deserialize)]
struct AuthTokens {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct IllustsResponse {
    #[serde(default)]
    illusts: Vec<Illust>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Illust {
    pub id: u64,

    #[serde(default)]
    tags: Vec<Tag>,

    #[serde(default)]
    meta_single_page: MetaSinglePage,

    #[serde(default)]
    meta_pages: Vec<MetaPage>,
}

impl Illust {
    fn is_manga(&self) -> bool {
        self.tags.iter().any(|tag| tag.name == "漫画")
    }

    /// The original image url: a random page for albums, the single page
    /// otherwise.
    fn image_url(&self, rng: &mut impl Rng) -> Option<&str> {
        if self.meta_pages.is_empty() {
            self.meta_single_page.original_image_url.as_deref()
        } else {
            self.meta_pages
                .choose(rng)
                .and_then(|page| page.image_urls.original.as_deref())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Tag {
    name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct MetaSinglePage {
    original_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MetaPage {
    image_urls: ImageUrls,
}

#[derive(Debug, Clone, Deserialize)]
struct ImageUrls {
    original: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn illust(id: u64, tags: &[&str]) -> Illust {
        serde_json::from_value(json!({
            "id": id,
            "tags": tags.iter().map(|name| json!({ "name": name })).collect::<Vec<_>>(),
            "meta_single_page": { "original_image_url": format!("https://i.pximg.net/{id}_p0.png") },
            "meta_pages": []
        }))
        .expect("fixture should deserialize")
    }

    #[test]
    fn auth_response_parses_the_nested_tokens() {
        let response: AuthResponse = serde_json::from_value(json!({
            "access_token": "outer-access",
            "expires_in": 3600,
            "response": {
                "access_token": "access",
                "refresh_token": "refresh",
                "expires_in": 3600
            }
        }))
        .expect("fixture should deserialize");

        assert_eq!(response.response.access_token, "access");
        assert_eq!(response.response.refresh_token, "refresh");
    }

    #[test]
    fn albums_pick_a_page_and_singles_use_their_url() {
        let single = illust(1, &[]);
        assert_eq!(
            single.image_url(&mut rand::thread_rng()),
            Some("https://i.pximg.net/1_p0.png")
        );

        let album: Illust = serde_json::from_value(json!({
            "id": 2,
            "meta_single_page": {},
            "meta_pages": [
                { "image_urls": { "original": "https://i.pximg.net/2_p0.png" } }
            ]
        }))
        .expect("fixture should deserialize");

        assert_eq!(
            album.image_url(&mut rand::thread_rng()),
            Some("https://i.pximg.net/2_p0.png")
        );
    }

    #[test]
    fn manga_and_recent_reposts_are_skipped() {
        let illusts = vec![
            illust(1, &["漫画"]),
            illust(2, &[]),
            illust(3, &["イラスト"]),
        ];

        let mut dupes = VecDeque::new();
        remember(&mut dupes, 3);

        let chosen = choose_fresh(&illusts, &dupes, &mut rand::thread_rng())
            .expect("one candidate is fresh");

        assert_eq!(chosen.id, 2);
    }

    #[test]
    fn nothing_fresh_yields_none() {
        let illusts = vec![illust(1, &["漫画"])];

        assert!(choose_fresh(&illusts, &VecDeque::new(), &mut rand::thread_rng()).is_none());
    }

    #[test]
    fn dupe_window_is_bounded() {
        let mut dupes = VecDeque::new();

        for id in 0..(DUPE_WINDOW as u64 + 10) {
            remember(&mut dupes, id);
        }

        assert_eq!(dupes.len(), DUPE_WINDOW);
        assert!(!dupes.contains(&0));
        assert!(dupes.contains(&(DUPE_WINDOW as u64 + 9)));
    }

    #[test]
    fn post_filename_comes_from_the_url() {
        let post = Post {
            id: 99,
            image_url: "https://i.pximg.net/img-original/img/99_p0.jpg".to_owned(),
        };

        assert_eq!(post.filename(), "99_p0.jpg");
        assert_eq!(post.page_url(), "https://pixiv.net/i/99");
    }
}

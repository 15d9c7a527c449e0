use std::time::Duration;

use color_eyre::eyre;
use color_eyre::eyre::eyre;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::canonical::CardRecord;

pub const API_BASE: &str = "https://api.pokemontcg.io/v2";
pub const MIRROR_BASE: &str = "https://raw.githubusercontent.com/PokemonTCG/pokemon-tcg-data/master/cards/en";
pub const API_KEY_VARIABLE: &str = "POKEMON_TCG_API_KEY";
pub const PAGE_SIZE: usize = 250;
pub const DOWNLOAD_ATTEMPTS: usize = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiSet {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiImages {
    pub small: Option<String>,
    pub large: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSetRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCard {
    pub id: String,
    pub name: String,
    pub number: String,
    pub rarity: Option<String>,
    #[serde(default)]
    pub images: ApiImages,
    #[serde(default)]
    pub set: ApiSetRef,
}

impl ApiCard {
    /// Large scan first, then the small one, then the raw data mirror.
    pub fn image_urls(&self) -> Vec<String> {
        let mut urls = vec![];
        urls.extend(self.images.large.clone());
        urls.extend(self.images.small.clone());

        if !self.set.id.is_empty() {
            urls.push(format!("{MIRROR_BASE}/{}/{}.png", self.set.id, canonical::canonical_number(&self.number)));
        }

        urls
    }

    pub fn to_record(&self) -> CardRecord {
        CardRecord {
            id: self.id.clone(),
            name: self.name.trim().to_string(),
            number: self.number.trim().to_string(),
            rarity: self.rarity.as_deref()
                .map(str::trim)
                .filter(|rarity| !rarity.is_empty())
                .unwrap_or(canonical::metadata::DEFAULT_RARITY)
                .to_string(),
        }
    }
}

#[derive(Deserialize)]
struct Single<T> {
    data: T,
}

#[derive(Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(rename = "totalCount", default)]
    total_count: usize,
}

/// Blocking client for the public card API.
pub struct TcgClient {
    client: Client,
    api_base: String,
}

impl TcgClient {
    /// Uses the API key from the environment when one is set; the API also answers without one, just slower.
    pub fn from_env() -> eyre::Result<Self> {
        let api_key = std::env::var(API_KEY_VARIABLE).ok().filter(|key| !key.is_empty());

        if api_key.is_none() {
            tracing::warn!("{} is not set, requests will be rate limited.", API_KEY_VARIABLE);
        }

        Self::new(API_BASE, api_key.as_deref())
    }

    pub fn new(api_base: &str, api_key: Option<&str>) -> eyre::Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(api_key) = api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// `Ok(None)` when the API does not know the id.
    pub fn find_set(&self, set_id: &str) -> eyre::Result<Option<ApiSet>> {
        let response = self.client.get(format!("{}/sets/{}", self.api_base, set_id)).send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let set = response.error_for_status()?.json::<Single<ApiSet>>()?;

        Ok(Some(set.data))
    }

    pub fn cards_for_set(&self, set_id: &str) -> eyre::Result<Vec<ApiCard>> {
        let mut cards = vec![];

        for page in 1.. {
            let response = self.client.get(format!("{}/cards", self.api_base))
                .query(&[
                    ("q", format!("set.id:{set_id}")),
                    ("page", page.to_string()),
                    ("pageSize", PAGE_SIZE.to_string()),
                ])
                .send()?
                .error_for_status()?
                .json::<Page<ApiCard>>()?;

            let received = response.data.len();
            cards.extend(response.data);

            tracing::debug!("{}: page {} brought {} card(s), {}/{} so far.", set_id, page, received, cards.len(), response.total_count);

            if received < PAGE_SIZE || cards.len() >= response.total_count {
                break;
            }
        }

        Ok(cards)
    }

    /// Tries every image URL of the card, each up to [`DOWNLOAD_ATTEMPTS`] times.
    pub fn download_image(&self, card: &ApiCard) -> eyre::Result<Vec<u8>> {
        let mut last_error = eyre!("Card '{}' has no image URL", card.id);

        for url in card.image_urls() {
            for attempt in 1..=DOWNLOAD_ATTEMPTS {
                let result = self.client.get(&url)
                    .send()
                    .and_then(|response| response.error_for_status())
                    .and_then(|response| response.bytes());

                match result {
                    Ok(bytes) => return Ok(bytes.to_vec()),
                    Err(e) => {
                        tracing::debug!("Attempt {}/{} for '{}' failed: {e}", attempt, DOWNLOAD_ATTEMPTS, url);

                        // Missing files stay missing, move on to the next source.
                        let not_found = e.status() == Some(StatusCode::NOT_FOUND);
                        last_error = e.into();

                        if not_found {
                            break;
                        }
                    }
                }
            }
        }

        Err(last_error)
    }
}

//! Pulls a furnishing blueprint's material list from the companion web API
//! and merges it into the requirement list.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use super::matcher::chinese_only;
use super::{Inventory, InventoryError};

const BLUEPRINT_URL: &str =
    "https://api-takumi.mihoyo.com/event/e20200928calculate/v1/furniture/blueprint";
const REGION: &str = "cn_gf01";
const REFERER: &str = "https://webstatic.mihoyo.com/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// API return code for an expired or rejected login cookie.
const RETCODE_COOKIE_EXPIRED: i64 = -100;

/// Minimum plausible length of a login cookie.
const MIN_COOKIE_LEN: usize = 50;

/// Login cookie kept in `cache/mys_cookie.txt`.
#[derive(Debug, Clone)]
pub struct CookieStore {
    path: PathBuf,
    value: Option<String>,
}

impl CookieStore {
    /// Reads the stored cookie, if any.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let value = fs::read_to_string(&path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self { path, value }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.value.as_deref().is_some_and(is_valid_cookie)
    }

    /// Replaces the cookie. Only a plausible cookie is written to disk.
    pub fn set(&mut self, value: &str) -> Result<bool, InventoryError> {
        let value = value.trim();
        self.value = Some(value.to_string()).filter(|s| !s.is_empty());
        if !is_valid_cookie(value) {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, value)?;
        Ok(true)
    }

    /// Forgets the cookie in memory and on disk.
    pub fn clear(&mut self) -> Result<(), InventoryError> {
        self.value = None;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_valid_cookie(value: &str) -> bool {
    value.len() > MIN_COOKIE_LEN && value.is_ascii()
}

/// One material line of a blueprint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BlueprintItem {
    pub name: String,
    pub num: u32,
    #[serde(default)]
    pub level: u32,
}

#[derive(Debug, Deserialize)]
struct BlueprintResponse {
    retcode: i64,
    #[serde(default)]
    message: String,
    data: Option<BlueprintData>,
}

#[derive(Debug, Deserialize)]
struct BlueprintData {
    #[serde(default)]
    list: Vec<BlueprintItem>,
    #[serde(default)]
    not_calc_list: Vec<BlueprintItem>,
}

/// Blocking client for the blueprint endpoint.
pub struct BlueprintClient {
    http: reqwest::blocking::Client,
}

impl BlueprintClient {
    pub fn new(timeout: Duration) -> Result<Self, InventoryError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http })
    }

    /// Fetches the material list for `share_code`.
    ///
    /// An expired cookie is cleared from `cookies` before the error returns,
    /// so the next attempt asks for a new one.
    pub fn fetch(
        &self,
        cookies: &mut CookieStore,
        share_code: &str,
    ) -> Result<Vec<BlueprintItem>, InventoryError> {
        let cookie = match cookies.value() {
            Some(c) if cookies.is_valid() => c.to_string(),
            _ => return Err(InventoryError::InvalidCookie),
        };

        tracing::debug!("==> GET {} share_code={}", BLUEPRINT_URL, share_code);
        let response = self
            .http
            .get(BLUEPRINT_URL)
            .query(&[("share_code", share_code), ("region", REGION)])
            .header(reqwest::header::COOKIE, cookie)
            .header(reqwest::header::REFERER, REFERER)
            .send()?;
        let status = response.status();
        let body = response.text()?;
        tracing::debug!(
            "<== {} {}",
            status,
            body.chars().take(100).collect::<String>()
        );

        match interpret_response(&body) {
            Err(InventoryError::CookieExpired(message)) => {
                cookies.clear()?;
                Err(InventoryError::CookieExpired(message))
            }
            other => other,
        }
    }
}

/// Decodes the endpoint's JSON body into a list sorted by quantity, largest
/// first.
fn interpret_response(body: &str) -> Result<Vec<BlueprintItem>, InventoryError> {
    let response: BlueprintResponse = serde_json::from_str(body)?;
    match response.data {
        Some(data) => {
            let mut items = data.list;
            items.extend(data.not_calc_list);
            items.sort_by(|a, b| b.num.cmp(&a.num));
            Ok(items)
        }
        None if response.retcode == RETCODE_COOKIE_EXPIRED => {
            Err(InventoryError::CookieExpired(response.message))
        }
        None => Err(InventoryError::Api(response.message)),
    }
}

/// Adds each fetched item to the needs of `inventory`. Returns how many items
/// were merged.
pub fn merge_items(inventory: &mut Inventory, items: &[BlueprintItem]) -> usize {
    let mut merged = 0;
    for item in items {
        let name = chinese_only(&item.name);
        if name.is_empty() || item.num == 0 {
            continue;
        }
        inventory.add_needed(&name, item.num);
        merged += 1;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Requirement;
    use tempfile::tempdir;

    const LONG_COOKIE: &str =
        "account_id=123456789; cookie_token=abcdefghijklmnopqrstuvwxyz0123456789ABCDEF";

    #[test]
    fn test_interpret_success_merges_both_lists() {
        let body = r#"{"retcode":0,"message":"OK","data":{
            "list":[{"name":"「桔梗执别愁云去」","num":2,"level":3}],
            "not_calc_list":[{"name":"寂寞石","num":9}]}}"#;
        let items = interpret_response(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "寂寞石");
        assert_eq!(items[1].level, 3);
    }

    #[test]
    fn test_interpret_expired_cookie() {
        let body = r#"{"retcode":-100,"message":"登录失效","data":null}"#;
        assert!(matches!(
            interpret_response(body),
            Err(InventoryError::CookieExpired(m)) if m == "登录失效"
        ));
    }

    #[test]
    fn test_interpret_api_error_and_garbage() {
        let body = r#"{"retcode":-1,"message":"分享码不存在","data":null}"#;
        assert!(matches!(interpret_response(body), Err(InventoryError::Api(_))));
        assert!(matches!(
            interpret_response("<html>"),
            Err(InventoryError::ResponseParse(_))
        ));
    }

    #[test]
    fn test_merge_items_strips_brackets_and_accumulates() {
        let mut inventory = Inventory::parse("寂寞石: 3\\1\n").unwrap();
        let items = vec![
            BlueprintItem { name: "寂寞石".into(), num: 9, level: 0 },
            BlueprintItem { name: "「桔梗执别愁云去」".into(), num: 1, level: 0 },
            BlueprintItem { name: "???".into(), num: 4, level: 0 },
        ];
        assert_eq!(merge_items(&mut inventory, &items), 2);
        assert_eq!(inventory.get("寂寞石"), Some(&Requirement::new(12, 1)));
        assert_eq!(inventory.get("桔梗执别愁云去"), Some(&Requirement::new(1, 0)));
    }

    #[test]
    fn test_cookie_store_validation_and_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache").join("mys_cookie.txt");

        let mut cookies = CookieStore::load(&path);
        assert!(!cookies.is_valid());

        assert!(!cookies.set("short").unwrap());
        assert!(!path.exists());

        assert!(cookies.set(LONG_COOKIE).unwrap());
        assert!(CookieStore::load(&path).is_valid());

        cookies.clear().unwrap();
        assert!(cookies.value().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_fetch_without_cookie_is_rejected() {
        let dir = tempdir().unwrap();
        let mut cookies = CookieStore::load(dir.path().join("none.txt"));
        let client = BlueprintClient::new(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            client.fetch(&mut cookies, "4516178075"),
            Err(InventoryError::InvalidCookie)
        ));
    }
}

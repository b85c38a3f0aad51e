//! Synchronous outbound HTTP for scripts.

use std::sync::Arc;

use reqwest::{
    blocking::Client,
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Method,
};
use rhai::Dynamic;
use tracing::debug;

use crate::error::{Error, Result};

/// The `helper` capability object handed to scripts.
///
/// `fetch` blocks the execution thread for the whole round-trip, so a slow
/// remote counts against the execution's wall-clock guard. Responses are
/// fully buffered; there is no streaming.
#[derive(Clone)]
pub struct HttpHelper {
    client: Arc<Client>,
}

impl Default for HttpHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpHelper {
    /// Create a helper with its own connection pool.
    pub fn new() -> Self {
        Self {
            client: Arc::new(Client::new()),
        }
    }

    /// Perform one HTTP request on behalf of the script.
    ///
    /// `url` must be a non-empty string. `options`, when present, is read
    /// case-insensitively for `method`, `headers`, and `body`; when options
    /// are supplied and carry no `Content-Type`, `application/json` is added
    /// before the body is attached.
    pub fn fetch(&self, url: &Dynamic, options: Option<&rhai::Map>) -> Result<rhai::Map> {
        let url = url
            .read_lock::<rhai::ImmutableString>()
            .ok_or_else(|| Error::InvalidArgument("fetch() requires a string url".into()))?
            .to_string();
        if url.is_empty() {
            return Err(Error::InvalidArgument("fetch() url must not be empty".into()));
        }

        let mut method = Method::GET;
        let mut headers = HeaderMap::new();
        let mut body = None;

        if let Some(options) = options {
            if let Some(value) = get_ci(options, "method") {
                if !value.is_unit() {
                    let name = value.to_string();
                    method = Method::from_bytes(name.to_ascii_uppercase().as_bytes())
                        .map_err(|_| {
                            Error::InvalidArgument(format!("invalid HTTP method `{name}`"))
                        })?;
                }
            }
            if let Some(value) = get_ci(options, "headers") {
                if !value.is_unit() {
                    let map = value.read_lock::<rhai::Map>().ok_or_else(|| {
                        Error::InvalidArgument("fetch() headers must be a map".into())
                    })?;
                    collect_headers(&map, &mut headers)?;
                }
            }
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            if let Some(value) = get_ci(options, "body") {
                if !value.is_unit() {
                    body = Some(value.to_string());
                }
            }
        }

        debug!(%method, %url, "fetch request");
        let mut request = self.client.request(method, url.as_str()).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request.send().map_err(|e| Error::Network(e.to_string()))?;
        debug!(status = %response.status(), %url, "fetch response");

        translate_response(response)
    }
}

/// Case-insensitive option lookup; scripts write `method` or `Method` alike.
fn get_ci<'m>(map: &'m rhai::Map, key: &str) -> Option<&'m Dynamic> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

fn collect_headers(map: &rhai::Map, headers: &mut HeaderMap) -> Result<()> {
    for (name, value) in map {
        if value.is_unit() {
            continue;
        }
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidArgument(format!("invalid header name `{name}`")))?;
        if let Some(list) = value.read_lock::<rhai::Array>() {
            for item in list.iter().filter(|item| !item.is_unit()) {
                headers.append(header_name.clone(), header_value(item)?);
            }
        } else {
            headers.append(header_name, header_value(value)?);
        }
    }
    Ok(())
}

fn header_value(value: &Dynamic) -> Result<HeaderValue> {
    let text = value.to_string();
    HeaderValue::from_str(&text)
        .map_err(|_| Error::InvalidArgument(format!("invalid header value `{text}`")))
}

fn translate_response(response: reqwest::blocking::Response) -> Result<rhai::Map> {
    let status = response.status();
    let mut header_map = rhai::Map::new();
    for (name, value) in response.headers() {
        let text = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match header_map.get_mut(name.as_str()) {
            Some(existing) => {
                let joined = format!("{existing}, {text}");
                *existing = joined.into();
            }
            None => {
                header_map.insert(name.as_str().into(), text.into());
            }
        }
    }
    let body = response.text().map_err(|e| Error::Network(e.to_string()))?;

    let mut result = rhai::Map::new();
    result.insert("status".into(), Dynamic::from(i64::from(status.as_u16())));
    result.insert(
        "statusText".into(),
        status.canonical_reason().unwrap_or_default().into(),
    );
    result.insert("headers".into(), Dynamic::from_map(header_map));
    result.insert("body".into(), body.into());
    Ok(result)
}

use std::time::Duration;

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "doodle_party";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the CouchDB room store lives and how long a single request may take.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    /// Basic-auth `(username, password)`, only set when both are provided.
    pub credentials: Option<(String, String)>,
    pub request_timeout: Duration,
}

impl CouchConfig {
    /// Read `COUCH_BASE_URL` (required), `COUCH_DB`, `COUCH_TIMEOUT_SECS` and the optional
    /// `COUCH_USERNAME`/`COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let base_url = non_empty("COUCH_BASE_URL").ok_or(CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;
        let database = non_empty("COUCH_DB").unwrap_or_else(|| DEFAULT_DATABASE.to_owned());
        let credentials = non_empty("COUCH_USERNAME").zip(non_empty("COUCH_PASSWORD"));
        let request_timeout = non_empty("COUCH_TIMEOUT_SECS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            database,
            credentials,
            request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn base_url_is_required() {
        assert!(matches!(
            CouchConfig::from_lookup(lookup(&[])),
            Err(CouchDaoError::MissingEnvVar { var: "COUCH_BASE_URL" })
        ));
    }

    #[test]
    fn defaults_and_partial_credentials() {
        let config = CouchConfig::from_lookup(lookup(&[
            ("COUCH_BASE_URL", "http://couch:5984/"),
            ("COUCH_USERNAME", "admin"),
            ("COUCH_TIMEOUT_SECS", "zero"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://couch:5984");
        assert_eq!(config.database, DEFAULT_DATABASE);
        assert!(config.credentials.is_none());
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36";

/// Header and cookie tables sent with every request of one download.
///
/// Constructed once by the caller and threaded through; never global state.
/// Site-specific values (referer, session cookies) come in via the JSON
/// override files.
#[derive(Debug, Clone, Default)]
pub struct AuthProfile {
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
}

impl AuthProfile {
    /// Browser-mimicking defaults. `accept-encoding: identity` keeps servers
    /// from compressing ranged responses.
    pub fn browser() -> Self {
        let headers = [
            ("accept", "*/*"),
            ("accept-encoding", "identity;q=1, *;q=0"),
            ("accept-language", "en-GB,en;q=0.9"),
            (
                "sec-ch-ua",
                "\"Not;A=Brand\";v=\"99\", \"Google Chrome\";v=\"139\", \"Chromium\";v=\"139\"",
            ),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", "\"Windows\""),
            ("sec-fetch-dest", "video"),
            ("sec-fetch-mode", "no-cors"),
            ("sec-fetch-site", "same-site"),
            ("user-agent", BROWSER_USER_AGENT),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            headers,
            cookies: HashMap::new(),
        }
    }

    /// A single plain User-Agent and no cookies, for public resources that
    /// reject browser-mimicking headers as suspicious.
    pub fn minimal() -> Self {
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), "Mozilla/5.0".to_string());
        Self {
            headers,
            cookies: HashMap::new(),
        }
    }

    /// Merge a flat string→string JSON object over the current headers.
    pub fn merge_headers_file(&mut self, path: &Path) -> Result<()> {
        let overrides = load_string_map(path)?;
        self.headers.extend(overrides);
        Ok(())
    }

    /// Merge a flat string→string JSON object over the current cookies.
    pub fn merge_cookies_file(&mut self, path: &Path) -> Result<()> {
        let overrides = load_string_map(path)?;
        self.cookies.extend(overrides);
        Ok(())
    }

    /// Cookies rendered as a single `Cookie` header value, `None` when empty.
    pub fn cookie_header(cookies: &HashMap<String, String>) -> Option<String> {
        if cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<String> = cookies.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        pairs.sort();
        Some(pairs.join("; "))
    }
}

fn load_string_map(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read override file {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("override file {:?} is not a flat JSON string map", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn browser_profile_carries_a_user_agent_and_no_cookies() {
        let profile = AuthProfile::browser();
        assert!(profile.headers.contains_key("user-agent"));
        assert!(profile.cookies.is_empty());
    }

    #[test]
    fn minimal_profile_is_a_single_user_agent() {
        let profile = AuthProfile::minimal();
        assert_eq!(profile.headers.len(), 1);
        assert_eq!(profile.headers.get("User-Agent").unwrap(), "Mozilla/5.0");
        assert!(profile.cookies.is_empty());
    }

    #[test]
    fn override_files_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"referer": "https://example.com/", "accept": "video/mp4"}}"#).unwrap();

        let mut profile = AuthProfile::browser();
        profile.merge_headers_file(file.path()).unwrap();

        assert_eq!(profile.headers.get("referer").unwrap(), "https://example.com/");
        // overridden, not duplicated
        assert_eq!(profile.headers.get("accept").unwrap(), "video/mp4");
        assert!(profile.headers.contains_key("user-agent"));
    }

    #[test]
    fn malformed_override_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["not", "a", "map"]"#).unwrap();

        let mut profile = AuthProfile::browser();
        assert!(profile.merge_cookies_file(file.path()).is_err());
    }

    #[test]
    fn cookie_header_joins_pairs() {
        let mut cookies = HashMap::new();
        assert_eq!(AuthProfile::cookie_header(&cookies), None);

        cookies.insert("a".to_string(), "1".to_string());
        cookies.insert("b".to_string(), "2".to_string());
        assert_eq!(AuthProfile::cookie_header(&cookies).unwrap(), "a=1; b=2");
    }
}

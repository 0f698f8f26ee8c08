use eyre::{Context, Result};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use url::Url;

/// Base URL and API key identifying one Supabase project
///
/// The key is sent both as the `apikey` header and as a bearer token.
/// It never appears in `Display` or `Debug` output.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    url: Url,
    apikey: String,
}

impl Credentials {
    pub fn new(url: Url, apikey: impl Into<String>) -> Self {
        Self {
            url,
            apikey: apikey.into(),
        }
    }

    /// Parse a base URL string and pair it with an API key
    pub fn parse(url: &str, apikey: impl Into<String>) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid project URL: {}", url))?;
        Ok(Self::new(url, apikey))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Headers every request against the project must carry
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let mut apikey = HeaderValue::from_str(&self.apikey)
            .with_context(|| "API key contains characters not allowed in a header")?;
        apikey.set_sensitive(true);
        headers.insert("apikey", apikey);

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.apikey))
            .with_context(|| "API key contains characters not allowed in a header")?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

impl std::fmt::Display for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url.as_str())
            .field("apikey", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_carry_key_twice() {
        let creds = Credentials::parse("https://example.supabase.co", "secret-key").unwrap();
        let headers = creds.headers().unwrap();
        assert_eq!(headers.get("apikey").unwrap(), "secret-key");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret-key");
        assert!(headers.get("apikey").unwrap().is_sensitive());
    }

    #[test]
    fn test_key_is_redacted() {
        let creds = Credentials::parse("https://example.supabase.co", "secret-key").unwrap();
        assert!(!format!("{}", creds).contains("secret-key"));
        assert!(!format!("{:?}", creds).contains("secret-key"));
        assert!(format!("{:?}", creds).contains("example.supabase.co"));
    }

    #[test]
    fn test_invalid_url() {
        let result = Credentials::parse("not a url", "key");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid project URL")
        );
    }

    #[test]
    fn test_key_with_newline_rejected() {
        let creds = Credentials::parse("https://example.supabase.co", "bad\nkey").unwrap();
        assert!(creds.headers().is_err());
    }
}

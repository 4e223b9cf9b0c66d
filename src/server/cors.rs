//! Origin allow-list handling

/// Methods advertised on every response
pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
/// Request headers browsers may send
pub const ALLOWED_HEADERS: &str = "Content-Type";
/// Preflight cache lifetime in seconds
pub const PREFLIGHT_MAX_AGE: u32 = 86_400;

/// Origins allowed when none are configured
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 4] = [
    "https://www.editorn.com",
    "https://editorn.com",
    "http://localhost:3000",
    "http://localhost:5000",
];

/// CORS policy based on an exact-match origin allow-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_ORIGINS.iter().map(ToString::to_string).collect())
    }
}

impl CorsPolicy {
    #[must_use]
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    #[must_use]
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }

    /// Headers attached to every non-preflight response
    ///
    /// `Access-Control-Allow-Origin` and credentials are only present for
    /// allow-listed origins; the method and header lists are always sent.
    #[must_use]
    pub fn response_headers(&self, origin: Option<&str>) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(5);
        if let Some(origin) = origin.filter(|o| self.is_allowed(o)) {
            headers.push(("Access-Control-Allow-Origin".to_string(), origin.to_string()));
            headers.push(("Access-Control-Allow-Credentials".to_string(), "true".to_string()));
            headers.push(("Vary".to_string(), "Origin".to_string()));
        }
        headers.push(("Access-Control-Allow-Methods".to_string(), ALLOWED_METHODS.to_string()));
        headers.push(("Access-Control-Allow-Headers".to_string(), ALLOWED_HEADERS.to_string()));
        headers
    }

    /// Headers for an `OPTIONS` preflight response
    #[must_use]
    pub fn preflight_headers(&self, origin: Option<&str>) -> Vec<(String, String)> {
        let mut headers = self.response_headers(origin);
        if !headers.iter().any(|(name, _)| name == "Access-Control-Allow-Credentials") {
            headers.push(("Access-Control-Allow-Credentials".to_string(), "true".to_string()));
        }
        headers.push(("Access-Control-Max-Age".to_string(), PREFLIGHT_MAX_AGE.to_string()));
        headers
    }
}

use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::Duration;

/// Dashboard configuration with `Cow` for flexible string handling
#[derive(Debug, Clone)]
pub struct DashboardConfig<'a> {
    /// Root of the clinical REST backend, e.g. `http://localhost:8000`
    pub api_base_url: Cow<'a, str>,
    /// Bearer token attached to every backend request
    pub api_token: Option<Cow<'a, str>>,
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
    /// Entry cap for the dataset cache; unbounded when `None`
    pub cache_capacity: Option<usize>,
}

impl<'a> DashboardConfig<'a> {
    /// Create new configuration pointing at `api_base_url`
    pub fn new(api_base_url: impl Into<Cow<'a, str>>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Set the backend bearer token
    pub fn with_token(mut self, token: impl Into<Cow<'a, str>>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Read configuration from environment variables with fallback
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Self::default();

        let api_base_url = lookup("CLINIC_API_URL")
            .map(Cow::Owned)
            .unwrap_or(defaults.api_base_url);
        let api_token = lookup("CLINIC_API_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .map(Cow::Owned);
        let bind_addr = match lookup("DASHBOARD_BIND") {
            Some(addr) => addr
                .parse()
                .map_err(|_| format!("Invalid DASHBOARD_BIND: {}", addr))?,
            None => defaults.bind_addr,
        };
        let request_timeout = match lookup("DASHBOARD_REQUEST_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .map_err(|_| format!("Invalid DASHBOARD_REQUEST_TIMEOUT_SECS: {}", secs))?,
            ),
            None => defaults.request_timeout,
        };
        let cache_capacity = match lookup("DASHBOARD_CACHE_CAPACITY") {
            Some(cap) => Some(
                cap.parse()
                    .map_err(|_| format!("Invalid DASHBOARD_CACHE_CAPACITY: {}", cap))?,
            ),
            None => None,
        };

        Ok(Self {
            api_base_url,
            api_token,
            bind_addr,
            request_timeout,
            cache_capacity,
        })
    }
}

impl<'a> Default for DashboardConfig<'a> {
    fn default() -> Self {
        Self {
            api_base_url: Cow::Borrowed("http://localhost:8000"),
            api_token: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            request_timeout: Duration::from_secs(30),
            cache_capacity: None,
        }
    }
}

//! `veriroute-geocode` — address resolution through a provider waterfall.
//!
//! Providers are attempted in priority order: the free, rate-gated tier
//! first, then paid tiers as API keys are configured. Each attempt is
//! independently fallible; the first non-empty result wins and is cached by
//! normalized query. The whole resolution path is serialized (one in-flight
//! resolution per orchestrator), so the shared rate-limit clock and the
//! "no concurrent duplicate query" invariant hold by construction.

pub mod cache;
pub mod error;
pub mod gate;
pub mod provider;

use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use cache::{query_key, CachedHit, GeocodeCache, MemoryCache};
pub use error::{GeocodeError, ProviderError};
pub use gate::RateGate;
pub use provider::{GeocodeHit, Provider};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("veriroute/", env!("CARGO_PKG_VERSION"));

/// A successful resolution with provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
    pub provider: String,
    pub from_cache: bool,
}

/// Drives the waterfall. Construct once and share (`Arc`) across runs so
/// every caller in the process respects the same gate and cache.
pub struct Orchestrator {
    http: reqwest::blocking::Client,
    providers: Vec<Provider>,
    gate: Arc<RateGate>,
    cache: Arc<dyn GeocodeCache>,
    region_hint: Option<String>,
    resolve_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        providers: Vec<Provider>,
        gate: Arc<RateGate>,
        cache: Arc<dyn GeocodeCache>,
        region_hint: Option<String>,
    ) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            providers,
            gate,
            cache,
            region_hint,
            resolve_lock: Mutex::new(()),
        }
    }

    /// Resolve a free-text address.
    ///
    /// Returns `Ok(None)` for degenerate (empty/whitespace) input without
    /// consuming a rate-limit slot, `Ok(Some(_))` on the first provider or
    /// cache hit, and `Err` when the whole waterfall is exhausted.
    pub fn resolve(&self, address: &str) -> Result<Option<Resolution>, GeocodeError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let query = match &self.region_hint {
            Some(hint) => format!("{trimmed}, {hint}"),
            None => trimmed.to_string(),
        };

        // One resolution at a time: bounded concurrency of one against the
        // shared clock, and no duplicate query can be in flight twice.
        let _serial = self.resolve_lock.lock().unwrap_or_else(|e| e.into_inner());

        let key = query_key(&query);
        if let Some(hit) = self.cache.get(&key) {
            log::debug!("geocode cache hit for '{query}'");
            return Ok(Some(Resolution {
                lat: hit.lat,
                lng: hit.lng,
                display_name: hit.display_name,
                provider: hit.provider,
                from_cache: true,
            }));
        }

        let mut last_err = None;
        for provider in &self.providers {
            if provider.is_rate_gated() {
                self.gate.wait();
            }

            match provider.resolve(&self.http, &query) {
                Ok(hit) => {
                    let cached = CachedHit {
                        lat: hit.lat,
                        lng: hit.lng,
                        display_name: hit.display_name.clone(),
                        provider: provider.name().to_string(),
                    };
                    self.cache.put(&key, &query, &cached);
                    return Ok(Some(Resolution {
                        lat: hit.lat,
                        lng: hit.lng,
                        display_name: hit.display_name,
                        provider: provider.name().to_string(),
                        from_cache: false,
                    }));
                }
                Err(err) => {
                    log::warn!(
                        "geocode: {} failed for '{query}': {err}, falling back",
                        provider.name()
                    );
                    last_err = Some(err);
                }
            }
        }

        Err(GeocodeError::Exhausted {
            query,
            last: last_err,
        })
    }

    /// Build the waterfall from resolved API keys: the free tier first, then
    /// each paid tier that has a key.
    pub fn waterfall(
        geoapify_key: Option<String>,
        positionstack_key: Option<String>,
        google_maps_key: Option<String>,
    ) -> Vec<Provider> {
        let mut providers = vec![Provider::nominatim()];
        if let Some(key) = geoapify_key {
            providers.push(Provider::geoapify(key));
        }
        if let Some(key) = positionstack_key {
            providers.push(Provider::positionstack(key));
        }
        if let Some(key) = google_maps_key {
            providers.push(Provider::google_maps(key));
        }
        providers
    }
}

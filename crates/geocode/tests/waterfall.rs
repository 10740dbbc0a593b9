//! Orchestrator behavior against mock provider servers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use httpmock::prelude::*;
use serde_json::json;

use veriroute_geocode::{MemoryCache, Orchestrator, Provider, RateGate};

fn nominatim_at(server: &MockServer) -> Provider {
    Provider::Nominatim {
        base_url: server.base_url(),
    }
}

fn geoapify_at(server: &MockServer, key: &str) -> Provider {
    Provider::Geoapify {
        base_url: server.base_url(),
        api_key: key.into(),
    }
}

fn orchestrator(providers: Vec<Provider>, interval: Duration) -> Orchestrator {
    Orchestrator::new(
        providers,
        Arc::new(RateGate::new(interval)),
        Arc::new(MemoryCache::new()),
        None,
    )
}

#[test]
fn nominatim_resolution() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/search")
            .query_param("q", "Jl. Sudirman No.1, Jakarta")
            .query_param("format", "json");
        then.status(200).json_body(json!([{
            "lat": "-6.2090",
            "lon": "106.8455",
            "display_name": "Jalan Jenderal Sudirman, Jakarta"
        }]));
    });

    let o = orchestrator(vec![nominatim_at(&server)], Duration::ZERO);
    let res = o.resolve("Jl. Sudirman No.1, Jakarta").unwrap().unwrap();

    mock.assert();
    assert_eq!(res.lat, -6.2090);
    assert_eq!(res.lng, 106.8455);
    assert_eq!(res.provider, "Nominatim");
    assert!(!res.from_cache);
}

#[test]
fn empty_first_tier_falls_through_to_second() {
    let nominatim = MockServer::start();
    let empty = nominatim.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(200).json_body(json!([]));
    });

    let geoapify = MockServer::start();
    let hit = geoapify.mock(|when, then| {
        when.method(GET)
            .path("/v1/geocode/search")
            .query_param("apiKey", "test-key");
        then.status(200).json_body(json!({
            "features": [{
                "properties": {
                    "lat": -6.2100,
                    "lon": 106.8460,
                    "formatted": "Jl. Sudirman, Jakarta Pusat"
                }
            }]
        }));
    });

    let o = orchestrator(
        vec![nominatim_at(&nominatim), geoapify_at(&geoapify, "test-key")],
        Duration::ZERO,
    );
    let res = o.resolve("Jl. Sudirman No.1").unwrap().unwrap();

    empty.assert();
    hit.assert();
    assert_eq!(res.provider, "Geoapify");
    assert_eq!(res.lat, -6.2100);
}

#[test]
fn provider_failure_falls_through() {
    let nominatim = MockServer::start();
    nominatim.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(500);
    });

    let geoapify = MockServer::start();
    geoapify.mock(|when, then| {
        when.method(GET).path("/v1/geocode/search");
        then.status(200).json_body(json!({
            "features": [{"properties": {"lat": 1.0, "lon": 2.0, "formatted": "X"}}]
        }));
    });

    let o = orchestrator(
        vec![nominatim_at(&nominatim), geoapify_at(&geoapify, "k")],
        Duration::ZERO,
    );
    let res = o.resolve("somewhere").unwrap().unwrap();
    assert_eq!(res.provider, "Geoapify");
}

#[test]
fn exhausted_waterfall_is_an_error() {
    let nominatim = MockServer::start();
    nominatim.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(200).json_body(json!([]));
    });

    let o = orchestrator(vec![nominatim_at(&nominatim)], Duration::ZERO);
    let err = o.resolve("nowhere at all").unwrap_err();
    assert!(err.to_string().contains("nowhere at all"));
}

#[test]
fn identical_queries_hit_the_cache() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(200).json_body(json!([{
            "lat": "-6.2090",
            "lon": "106.8455",
            "display_name": "Jalan Jenderal Sudirman"
        }]));
    });

    let o = orchestrator(vec![nominatim_at(&server)], Duration::from_millis(150));

    let first = o.resolve("Jl. Sudirman No.1").unwrap().unwrap();
    assert!(!first.from_cache);

    // Case/whitespace variations share a cache key, and the hit skips the
    // rate gate entirely.
    let start = Instant::now();
    let second = o.resolve("  jl. sudirman no.1  ").unwrap().unwrap();
    assert!(second.from_cache);
    assert_eq!(second.lat, first.lat);
    assert!(start.elapsed() < Duration::from_millis(100));

    mock.assert_hits(1);
}

#[test]
fn back_to_back_resolutions_respect_the_gate() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(200).json_body(json!([{
            "lat": "-6.0", "lon": "106.0", "display_name": "Jakarta"
        }]));
    });

    let interval = Duration::from_millis(150);
    let o = orchestrator(vec![nominatim_at(&server)], interval);

    o.resolve("Jl. A").unwrap();
    let start = Instant::now();
    o.resolve("Jl. B").unwrap();
    assert!(
        start.elapsed() >= interval,
        "second request fired after {:?}, expected at least {:?}",
        start.elapsed(),
        interval
    );
}

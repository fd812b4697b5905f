use std::sync::Arc;
use std::time::{Duration, Instant};

use remote_loader::ResolveError;

use crate::fixture::{storefront, CART_V1, CART_V2, MANIFEST_URL, REVIEWS_V2};

#[tokio::test]
async fn test_override_switches_version_and_reinitializes() {
    let fx = storefront();
    let resolver = &fx.resolver;

    let v2 = resolver.resolve_component("cart", "CartWidget").await.unwrap();
    assert_eq!(v2.entry.url, CART_V2);
    resolver.resolve_component("reviews", "ReviewList").await.unwrap();

    resolver.set_version_override("cart", "1.0.0");
    assert!(!resolver.state().artifacts.is_loaded(CART_V2));
    assert!(!resolver.state().containers.is_initialized("cart"));
    assert!(resolver.state().artifacts.is_loaded(REVIEWS_V2));
    assert!(resolver.state().containers.is_initialized("reviews"));

    let v1 = resolver.resolve_component("cart", "CartWidget").await.unwrap();
    assert_eq!(v1.entry.url, CART_V1);
    assert_eq!(v1.entry.version, "1.0.0");
    assert!(!Arc::ptr_eq(&v1.component, &v2.component));
    assert_eq!(fx.host.inits("cart"), 2);
    assert_eq!(fx.network.requests(MANIFEST_URL), 2);

    resolver.set_version_override("cart", "2.0.0");
    let back = resolver.resolve_component("cart", "CartWidget").await.unwrap();
    assert_eq!(back.entry.url, CART_V2);
    assert_eq!(fx.network.requests(CART_V2), 2);
    assert_eq!(fx.host.inits("cart"), 3);

    // reviews was never touched by the cart overrides
    resolver.resolve_component("reviews", "ReviewList").await.unwrap();
    assert_eq!(fx.network.requests(REVIEWS_V2), 1);
    assert_eq!(fx.host.inits("reviews"), 1);
}

#[tokio::test]
async fn test_clear_override_restores_manifest_default() {
    let fx = storefront();
    let resolver = &fx.resolver;

    resolver.set_version_override("cart", "1.0.0");
    let pinned = resolver.resolve_entry("cart", "CartPage").await.unwrap();
    assert_eq!(pinned.version, "1.0.0");

    resolver.clear_version_override("cart");
    assert!(resolver.version_overrides().is_empty());
    let restored = resolver.resolve_component("cart", "CartPage").await.unwrap();
    assert_eq!(restored.entry.version, "2.0.0");

    // clearing a remote with no override leaves the caches alone
    resolver.clear_version_override("cart");
    assert!(resolver.state().artifacts.is_loaded(CART_V2));
}

#[tokio::test]
async fn test_version_overrides_returns_a_copy() {
    let fx = storefront();
    fx.resolver.set_version_override("reviews", "1.0.0");

    let mut copy = fx.resolver.version_overrides();
    assert_eq!(copy.get("reviews").map(String::as_str), Some("1.0.0"));

    copy.insert("cart".into(), "9.9.9".into());
    copy.remove("reviews");
    let fresh = fx.resolver.version_overrides();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh["reviews"], "1.0.0");
}

#[tokio::test]
async fn test_override_to_missing_version_only_affects_that_remote() {
    let fx = storefront();
    fx.resolver.set_version_override("cart", "3.0.0");

    let err = fx
        .resolver
        .resolve_component("cart", "CartWidget")
        .await
        .err()
        .unwrap();
    assert_eq!(
        err,
        ResolveError::VersionNotFound {
            remote: "cart".into(),
            version: "3.0.0".into(),
        }
    );

    let reviews = fx
        .resolver
        .resolve_component("reviews", "ReviewForm")
        .await
        .unwrap();
    assert_eq!(reviews.entry.version, "2.0.0");
}

#[tokio::test]
async fn test_remote_statuses_reflect_overrides() {
    let fx = storefront();
    fx.resolver.set_version_override("cart", "1.0.0");

    let statuses = fx.resolver.remote_statuses().await.unwrap();
    assert_eq!(statuses.len(), 2);

    let cart = &statuses[0];
    assert_eq!(cart.name, "cart");
    assert_eq!(cart.active_version, "1.0.0");
    assert_eq!(cart.default_version, "2.0.0");
    assert!(cart.overridden);
    assert_eq!(cart.versions, vec!["1.0.0", "2.0.0"]);

    let reviews = &statuses[1];
    assert_eq!(reviews.name, "reviews");
    assert_eq!(reviews.active_version, "2.0.0");
    assert!(!reviews.overridden);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_override_during_resolution_initializes_new_container() {
    let fx = storefront();
    fx.network.set_delay(Duration::from_millis(50));

    let in_flight = {
        let resolver = Arc::clone(&fx.resolver);
        tokio::spawn(async move { resolver.resolve_component("cart", "CartWidget").await })
    };
    // manifest is in hand, the 2.0.0 entry is still downloading
    tokio::time::sleep(Duration::from_millis(70)).await;
    fx.resolver.set_version_override("cart", "1.0.0");

    let fresh = fx
        .resolver
        .resolve_component("cart", "CartWidget")
        .await
        .unwrap();
    let overtaken = in_flight.await.unwrap().unwrap();

    assert_eq!(fresh.entry.url, CART_V1);
    assert_eq!(overtaken.entry.url, CART_V1);
    assert!(Arc::ptr_eq(&fresh.component, &overtaken.component));
    assert_eq!(fx.host.inits_at("cart", "1.0.0"), 1);
    assert_eq!(fx.host.inits_at("cart", "2.0.0"), 0);
    assert_eq!(fx.host.executions(CART_V2), 0);
    assert!(fx.resolver.state().containers.is_initialized("cart"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_override_does_not_wait_for_hung_manifest_fetch() {
    let fx = storefront();
    fx.network.set_delay(Duration::from_secs(2));

    let _hung = {
        let resolver = Arc::clone(&fx.resolver);
        tokio::spawn(async move { resolver.resolve_component("reviews", "ReviewList").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    fx.resolver.set_version_override("cart", "1.0.0");
    fx.resolver.clear_version_override("cart");
    assert!(started.elapsed() < Duration::from_millis(100));
    assert!(fx.resolver.version_overrides().is_empty());
}

//! Token-caching arbiter client.

use std::sync::Arc;

use dbx_domain::config::ArbiterConfig;
use dbx_domain::error::{Error, Result};
use dbx_domain::hypercat::HypercatRoot;
use dbx_domain::trace::TraceEvent;

use crate::cache::{Token, TokenCache};
use crate::http::HttpArbiterTransport;
use crate::route::{parse_href, Method, ParsedRoute, RouteKey};
use crate::transport::{ArbiterRequest, ArbiterTransport};
use crate::types::{ComponentType, ContainerInfo, ContainerPermissions, TokenRequest};

/// Client for the arbiter's token, catalogue and container-management
/// endpoints.
///
/// Cloning is cheap; clones share the transport and the token cache. The
/// cache is private to this type so callers can only reach it through
/// [`request_token`](Self::request_token) and
/// [`invalidate_cache`](Self::invalidate_cache).
#[derive(Clone)]
pub struct ArbiterClient {
    transport: Arc<dyn ArbiterTransport>,
    cache: Arc<TokenCache>,
}

impl ArbiterClient {
    pub fn new(transport: Arc<dyn ArbiterTransport>) -> Self {
        Self {
            transport,
            cache: Arc::new(TokenCache::new()),
        }
    }

    /// Build an HTTP-backed client from config.
    pub fn from_config(cfg: &ArbiterConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpArbiterTransport::new(cfg)?)))
    }

    // ── tokens ───────────────────────────────────────────────────────

    /// Token for `method` on the route at `href`.
    ///
    /// Served from the cache when present. On a miss one request goes to
    /// `POST /token`; only a 200 answer is cached. Concurrent misses for the
    /// same route may each fetch, and the last answer wins.
    pub async fn request_token(
        &self,
        href: &str,
        method: Method,
        caveat: Option<&str>,
    ) -> Result<Token> {
        let route = parse_href(href)?;
        let key = RouteKey::new(&route, method, caveat);

        if let Some(token) = self.cache.get(&key) {
            tracing::trace!(route = %key, "token cache hit");
            return Ok(token);
        }

        let token = self.fetch_token(&route, method, caveat, None).await?;
        TraceEvent::TokenFetched {
            route: href.to_owned(),
            method: method.to_string(),
            delegated: false,
        }
        .emit();
        self.cache.set(key, token.clone());
        Ok(token)
    }

    /// Token usable by `source_host` acting on our behalf.
    ///
    /// Always goes to the arbiter; delegated tokens are never cached.
    pub async fn request_delegated_token(
        &self,
        source_host: &str,
        href: &str,
        method: Method,
        caveat: Option<&str>,
    ) -> Result<Token> {
        let route = parse_href(href)?;
        let token = self
            .fetch_token(&route, method, caveat, Some(source_host))
            .await?;
        TraceEvent::TokenFetched {
            route: href.to_owned(),
            method: method.to_string(),
            delegated: true,
        }
        .emit();
        Ok(token)
    }

    /// Drop the cached token for a route so the next request refetches.
    ///
    /// Safe to call when nothing is cached, or with an unparsable href.
    pub fn invalidate_cache(&self, href: &str, method: Method, caveat: Option<&str>) {
        let key = match RouteKey::from_href(href, method, caveat) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(href = %href, error = %e, "invalidate: unparsable route");
                return;
            }
        };
        if self.cache.delete(&key) {
            TraceEvent::TokenInvalidated {
                route: href.to_owned(),
                method: method.to_string(),
            }
            .emit();
        }
    }

    /// Number of routes with a cached token.
    pub fn cached_routes(&self) -> usize {
        self.cache.len()
    }

    async fn fetch_token(
        &self,
        route: &ParsedRoute,
        method: Method,
        caveat: Option<&str>,
        source: Option<&str>,
    ) -> Result<Token> {
        let body = TokenRequest {
            target: route.host.clone(),
            path: route.path.clone(),
            method,
            caveats: caveat
                .filter(|c| !c.is_empty())
                .map(|c| vec![c.to_owned()])
                .unwrap_or_default(),
            source: source.map(str::to_owned),
        };

        let resp = self
            .transport
            .send(ArbiterRequest::post_json("/token", &body)?)
            .await?;

        if resp.status != 200 {
            return Err(Error::TokenRejected {
                status: resp.status,
                body: resp.body_text(),
            });
        }
        Ok(Token::from(resp.body))
    }

    // ── catalogue ────────────────────────────────────────────────────

    /// Fetch the root data-source catalogue (`GET /cat`).
    ///
    /// A non-200 status, an empty body and malformed JSON are all errors.
    pub async fn root_catalogue(&self) -> Result<HypercatRoot> {
        let resp = self.transport.send(ArbiterRequest::get("/cat")).await?;
        if resp.status != 200 {
            return Err(Error::Arbiter(format!(
                "GET /cat returned {}: {}",
                resp.status,
                resp.body_text()
            )));
        }
        if resp.body.is_empty() {
            return Err(Error::Arbiter("GET /cat returned an empty catalogue".into()));
        }
        Ok(serde_json::from_slice(&resp.body)?)
    }

    // ── container management ─────────────────────────────────────────

    /// Register or update a component's credential with the arbiter.
    pub async fn update_arbiter(
        &self,
        name: &str,
        key: &str,
        component_type: ComponentType,
    ) -> Result<()> {
        let body = ContainerInfo {
            name: name.to_owned(),
            key: key.to_owned(),
            component_type,
        };
        self.post("/cm/upsert-container-info", &body).await
    }

    /// Remove a component's registration.
    pub async fn delete_container_info(&self, name: &str) -> Result<()> {
        self.post(
            "/cm/delete-container-info",
            &serde_json::json!({ "name": name }),
        )
        .await
    }

    pub async fn grant_container_permissions(&self, permissions: &ContainerPermissions) -> Result<()> {
        self.post("/cm/grant-container-permissions", permissions).await
    }

    pub async fn revoke_container_permissions(
        &self,
        permissions: &ContainerPermissions,
    ) -> Result<()> {
        self.post("/cm/revoke-container-permissions", permissions)
            .await
    }

    /// Single-shot management POST; no retry.
    async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let resp = self
            .transport
            .send(ArbiterRequest::post_json(path, body)?)
            .await?;
        if !resp.is_success() {
            return Err(Error::Arbiter(format!(
                "POST {path} returned {}: {}",
                resp.status,
                resp.body_text()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::transport::ArbiterResponse;
    use crate::types::Route;

    const HREF: &str = "tcp://store:5555/kv/sensor/temp";

    /// Fake arbiter: numbered tokens, scripted statuses, recorded requests.
    #[derive(Default)]
    struct FakeArbiter {
        token_calls: AtomicUsize,
        /// Statuses to answer `/token` with, front first; 200 once empty.
        statuses: Mutex<Vec<u16>>,
        requests: Mutex<Vec<ArbiterRequest>>,
        catalogue: Mutex<Option<ArbiterResponse>>,
    }

    impl FakeArbiter {
        fn calls(&self) -> usize {
            self.token_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArbiterTransport for FakeArbiter {
        async fn send(&self, request: ArbiterRequest) -> Result<ArbiterResponse> {
            self.requests.lock().push(request.clone());
            match request.path.as_str() {
                "/token" => {
                    let n = self.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
                    let status = {
                        let mut statuses = self.statuses.lock();
                        if statuses.is_empty() {
                            200
                        } else {
                            statuses.remove(0)
                        }
                    };
                    if status == 200 {
                        Ok(ArbiterResponse::ok(format!("token-{n}").into_bytes()))
                    } else {
                        Ok(ArbiterResponse {
                            status,
                            body: b"denied".to_vec(),
                        })
                    }
                }
                "/cat" => Ok(self
                    .catalogue
                    .lock()
                    .clone()
                    .unwrap_or_else(|| ArbiterResponse::ok(b"{\"items\": []}".to_vec()))),
                _ => Ok(ArbiterResponse::ok(Vec::new())),
            }
        }
    }

    fn client() -> (Arc<FakeArbiter>, ArbiterClient) {
        let fake = Arc::new(FakeArbiter::default());
        (fake.clone(), ArbiterClient::new(fake))
    }

    #[tokio::test]
    async fn cache_hit_avoids_network() {
        let (fake, arb) = client();
        let first = arb.request_token(HREF, Method::Get, None).await.unwrap();
        let second = arb.request_token(HREF, Method::Get, None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fake.calls(), 1);
        assert_eq!(arb.cached_routes(), 1);
    }

    #[tokio::test]
    async fn token_request_carries_route_fields() {
        let (fake, arb) = client();
        arb.request_token(HREF, Method::Post, Some("dest=logger"))
            .await
            .unwrap();

        let requests = fake.requests.lock();
        let body: TokenRequest =
            serde_json::from_slice(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(body.target, "store");
        assert_eq!(body.path, "/kv/sensor/temp");
        assert_eq!(body.method, Method::Post);
        assert_eq!(body.caveats, vec!["dest=logger".to_string()]);
        assert!(body.source.is_none());
    }

    #[tokio::test]
    async fn token_path_keeps_spaces_unencoded() {
        let (fake, arb) = client();
        arb.request_token("tcp://store:5555/kv/my sensor/k", Method::Get, None)
            .await
            .unwrap();

        let requests = fake.requests.lock();
        let body: TokenRequest =
            serde_json::from_slice(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body.path, "/kv/my sensor/k");
    }

    #[tokio::test]
    async fn invalidate_then_refetch_gets_new_token() {
        let (fake, arb) = client();
        let old = arb.request_token(HREF, Method::Post, None).await.unwrap();
        arb.invalidate_cache(HREF, Method::Post, None);
        assert_eq!(arb.cached_routes(), 0);

        let new = arb.request_token(HREF, Method::Post, None).await.unwrap();
        assert_eq!(fake.calls(), 2);
        assert_ne!(old, new);
        assert_eq!(new.as_bytes(), b"token-2");
    }

    #[tokio::test]
    async fn invalidation_is_idempotent() {
        let (fake, arb) = client();
        arb.request_token(HREF, Method::Get, None).await.unwrap();

        arb.invalidate_cache("tcp://store:5555/kv/other", Method::Get, None);
        arb.invalidate_cache("tcp://store:5555/kv/other", Method::Get, None);
        arb.invalidate_cache("not a url", Method::Get, None);
        assert_eq!(arb.cached_routes(), 1);

        arb.request_token(HREF, Method::Get, None).await.unwrap();
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn methods_are_cached_independently() {
        let (fake, arb) = client();
        let get = arb.request_token(HREF, Method::Get, None).await.unwrap();
        let post = arb.request_token(HREF, Method::Post, None).await.unwrap();
        assert_ne!(get, post);
        assert_eq!(fake.calls(), 2);

        arb.invalidate_cache(HREF, Method::Get, None);
        arb.request_token(HREF, Method::Post, None).await.unwrap();
        assert_eq!(fake.calls(), 2, "POST entry must survive GET invalidation");
    }

    #[tokio::test]
    async fn caveats_are_part_of_the_key() {
        let (fake, arb) = client();
        arb.request_token(HREF, Method::Get, None).await.unwrap();
        arb.request_token(HREF, Method::Get, Some("c1")).await.unwrap();
        arb.request_token(HREF, Method::Get, Some("c1")).await.unwrap();
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn rejection_is_reported_and_not_cached() {
        let (fake, arb) = client();
        fake.statuses.lock().push(403);

        let err = arb.request_token(HREF, Method::Get, None).await.unwrap_err();
        match &err {
            Error::TokenRejected { status, body } => {
                assert_eq!(*status, 403);
                assert_eq!(body, "denied");
            }
            other => panic!("expected TokenRejected, got {other:?}"),
        }
        assert!(err.is_token_rejected());
        assert_eq!(arb.cached_routes(), 0);

        let token = arb.request_token(HREF, Method::Get, None).await.unwrap();
        assert_eq!(token.as_bytes(), b"token-2");
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn delegated_tokens_are_never_cached() {
        let (fake, arb) = client();
        arb.request_delegated_token("core-logger", HREF, Method::Post, None)
            .await
            .unwrap();
        arb.request_delegated_token("core-logger", HREF, Method::Post, None)
            .await
            .unwrap();
        assert_eq!(fake.calls(), 2);
        assert_eq!(arb.cached_routes(), 0);

        let requests = fake.requests.lock();
        let body: TokenRequest =
            serde_json::from_slice(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body.source.as_deref(), Some("core-logger"));
    }

    #[tokio::test]
    async fn invalid_href_is_rejected_before_network() {
        let (fake, arb) = client();
        let err = arb.request_token("kv/sensor", Method::Get, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRoute(_)));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn root_catalogue_decodes() {
        let (fake, arb) = client();
        *fake.catalogue.lock() = Some(ArbiterResponse::ok(
            br#"{"catalogue-metadata": [], "items": [{"item-metadata": [], "href": "tcp://s:5555/kv/a"}]}"#.to_vec(),
        ));
        let cat = arb.root_catalogue().await.unwrap();
        assert_eq!(cat.items.len(), 1);
        assert_eq!(cat.items[0].href, "tcp://s:5555/kv/a");
    }

    #[tokio::test]
    async fn root_catalogue_propagates_decode_errors() {
        let (fake, arb) = client();
        *fake.catalogue.lock() = Some(ArbiterResponse::ok(b"{not json".to_vec()));
        assert!(matches!(arb.root_catalogue().await, Err(Error::Json(_))));

        *fake.catalogue.lock() = Some(ArbiterResponse::ok(Vec::new()));
        assert!(matches!(arb.root_catalogue().await, Err(Error::Arbiter(_))));

        *fake.catalogue.lock() = Some(ArbiterResponse {
            status: 500,
            body: b"boom".to_vec(),
        });
        let err = arb.root_catalogue().await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn management_posts_hit_their_endpoints() {
        let (fake, arb) = client();
        let perms = ContainerPermissions {
            name: "app".into(),
            route: Route {
                target: "store".into(),
                path: "/kv/a".into(),
                method: Method::Get,
            },
            caveats: vec![],
        };
        arb.update_arbiter("app", "key", ComponentType::App)
            .await
            .unwrap();
        arb.grant_container_permissions(&perms).await.unwrap();
        arb.revoke_container_permissions(&perms).await.unwrap();
        arb.delete_container_info("app").await.unwrap();

        let paths: Vec<String> = fake.requests.lock().iter().map(|r| r.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                "/cm/upsert-container-info",
                "/cm/grant-container-permissions",
                "/cm/revoke-container-permissions",
                "/cm/delete-container-info",
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_keep_cache_consistent() {
        let (_fake, arb) = client();
        let mut handles = Vec::new();
        for i in 0..32 {
            let arb = arb.clone();
            handles.push(tokio::spawn(async move {
                let href = format!("tcp://store:5555/kv/ds/{}", i % 4);
                let method = if i % 2 == 0 { Method::Get } else { Method::Post };
                for _ in 0..10 {
                    arb.request_token(&href, method, None).await.unwrap();
                    if i % 3 == 0 {
                        arb.invalidate_cache(&href, method, None);
                    }
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // Every route is still queryable afterwards.
        for i in 0..4 {
            let href = format!("tcp://store:5555/kv/ds/{i}");
            arb.request_token(&href, Method::Get, None).await.unwrap();
            arb.request_token(&href, Method::Post, None).await.unwrap();
        }
        assert_eq!(arb.cached_routes(), 8);
    }
}

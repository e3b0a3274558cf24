//! The offline cache gateway: cache-first, network-fallback, offline-degraded.
//!
//! Lifecycle mirrors a service worker:
//! `Uninstalled -> Installing -> Installed -> Activated`.
//! Requests are only intercepted once the gateway is `Activated`.

use std::sync::Arc;

use futures::future::try_join_all;
use reqwest::Url;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::cache::{cache_name, validate_version, CacheGeneration, CacheStorage, CachedResponse};
use super::{FetchedResponse, Fetcher, GatewayError};

/// Status of the synthetic response served when nothing else is available.
pub const OFFLINE_STATUS: u16 = 503;
pub const OFFLINE_BODY: &str = "offline";

/// Assets fetched eagerly on install, as absolute paths on the app origin.
pub fn asset_manifest(version: &str) -> Vec<String> {
    vec![
        "/".to_string(),
        "/manifest.json".to_string(),
        format!("/styles.{}.css", version),
        "/icon/icon.svg".to_string(),
        "/ios/180.png".to_string(),
        "/ios/1024.png".to_string(),
        "/android/android-launchericon-192-192.png".to_string(),
        "/android/android-launchericon-512-512.png".to_string(),
        "/logo/logo.png".to_string(),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninstalled,
    Installing,
    Installed,
    Activated,
}

/// Where a gateway response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    /// Network failed; the cached root document was served instead.
    RootFallback,
    /// Network failed and the root document was never cached.
    Offline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl GatewayResponse {
    fn from_cache(cached: CachedResponse, source: ResponseSource) -> Self {
        Self {
            url: cached.url,
            status: cached.status,
            content_type: cached.content_type,
            body: cached.body,
            source,
        }
    }

    fn from_network(url: &str, fetched: FetchedResponse) -> Self {
        Self {
            url: url.to_string(),
            status: fetched.status,
            content_type: fetched.content_type,
            body: fetched.body,
            source: ResponseSource::Network,
        }
    }

    fn offline(url: &str) -> Self {
        Self {
            url: url.to_string(),
            status: OFFLINE_STATUS,
            content_type: Some("text/plain".to_string()),
            body: OFFLINE_BODY.as_bytes().to_vec(),
            source: ResponseSource::Offline,
        }
    }
}

/// Outcome of offering a request to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum Intercept {
    /// Not ours to handle; the caller goes to the network directly.
    PassThrough,
    Respond(GatewayResponse),
}

pub struct OfflineGateway<F> {
    origin: Url,
    version: String,
    fetcher: Arc<F>,
    storage: Arc<CacheStorage>,
    state: Mutex<WorkerState>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl<F: Fetcher> OfflineGateway<F> {
    pub fn new(origin: Url, version: &str, fetcher: F, storage: CacheStorage) -> Self {
        Self {
            origin,
            version: version.to_string(),
            fetcher: Arc::new(fetcher),
            storage: Arc::new(storage),
            state: Mutex::new(WorkerState::Uninstalled),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn cache_name(&self) -> String {
        cache_name(&self.version)
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    /// Bring the gateway to `Activated`, installing only when the current
    /// generation is not already complete on disk.
    pub async fn register(&self) -> Result<(), GatewayError> {
        let name = self.cache_name();
        let already_installed =
            self.storage.has(&name).await && self.storage.open(&name).await?.is_sealed().await;

        if already_installed {
            debug!(cache = %name, "Cache generation already installed");
            *self.state.lock().await = WorkerState::Installed;
        } else {
            self.install().await?;
        }
        self.activate().await
    }

    /// Fetch and store the whole asset manifest.
    ///
    /// Nothing on disk changes until every asset has been fetched, and the
    /// new generation replaces the old one only once it is complete and
    /// sealed. A failed install leaves any existing generation as it was.
    pub async fn install(&self) -> Result<(), GatewayError> {
        validate_version(&self.version)?;
        {
            let mut state = self.state.lock().await;
            if *state != WorkerState::Uninstalled {
                return Err(GatewayError::InvalidState {
                    action: "install",
                    state: *state,
                });
            }
            *state = WorkerState::Installing;
        }

        let name = self.cache_name();
        info!(cache = %name, "Installing offline cache");

        match self.populate(&name).await {
            Ok(count) => {
                *self.state.lock().await = WorkerState::Installed;
                info!(cache = %name, assets = count, "Offline cache installed");
                Ok(())
            }
            Err(e) => {
                error!(cache = %name, error = %e, "Offline cache install failed");
                *self.state.lock().await = WorkerState::Uninstalled;
                Err(e)
            }
        }
    }

    async fn populate(&self, name: &str) -> Result<usize, GatewayError> {
        let manifest = asset_manifest(&self.version);
        let fetches = manifest.iter().map(|path| async move {
            let url = self
                .resolve(path)
                .map_err(|e| e.into_install_failure(path))?;
            let response = self
                .fetcher
                .fetch(&url)
                .await
                .map_err(|e| e.into_install_failure(url.as_str()))?;
            if !response.is_ok() {
                return Err(GatewayError::InstallFailed {
                    url: url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            Ok::<_, GatewayError>((url, response))
        });
        let fetched = try_join_all(fetches).await?;

        // Built aside so a reinstall never mixes old entries in.
        let staged = self.storage.stage(name).await?;
        let result = match write_generation(&staged, &fetched).await {
            Ok(()) => self.storage.promote(&staged).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            if let Err(cleanup) = self.storage.discard(&staged).await {
                warn!(cache = %name, error = %cleanup, "Failed to remove partial cache");
            }
            return Err(e);
        }
        Ok(fetched.len())
    }

    /// Take over request handling and drop every superseded generation.
    /// A generation that cannot be removed is logged and left behind; it
    /// never blocks activation.
    pub async fn activate(&self) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        if *state != WorkerState::Installed {
            return Err(GatewayError::InvalidState {
                action: "activate",
                state: *state,
            });
        }

        let current = self.cache_name();
        match self.storage.keys().await {
            Ok(names) => {
                for name in names.iter().filter(|name| **name != current) {
                    if let Err(e) = self.storage.delete(name).await {
                        warn!(cache = %name, error = %e, "Failed to delete superseded cache generation");
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to list cache generations, nothing purged"),
        }

        *state = WorkerState::Activated;
        info!(cache = %current, "Offline cache activated");
        Ok(())
    }

    /// Offer one request to the gateway. `target` may be a path on the app
    /// origin or an absolute URL.
    pub async fn handle(&self, target: &str) -> Result<Intercept, GatewayError> {
        let url = self.resolve(target)?;

        if url.origin() != self.origin.origin() {
            return Ok(Intercept::PassThrough);
        }
        if self.state().await != WorkerState::Activated {
            return Ok(Intercept::PassThrough);
        }

        let generation = self.storage.open(&self.cache_name()).await?;
        let key = url.as_str();

        match generation.match_url(key).await {
            Ok(Some(cached)) => {
                debug!(url = key, "Serving from cache");
                return Ok(Intercept::Respond(GatewayResponse::from_cache(
                    cached,
                    ResponseSource::Cache,
                )));
            }
            Ok(None) => {}
            Err(e) => warn!(url = key, error = %e, "Cache read failed, going to network"),
        }

        match self.fetcher.fetch(&url).await {
            Ok(fetched) => {
                debug!(url = key, status = fetched.status, "Serving from network");
                if fetched.is_ok() {
                    self.write_through(&generation, key, &fetched).await;
                }
                Ok(Intercept::Respond(GatewayResponse::from_network(key, fetched)))
            }
            Err(e) => {
                warn!(url = key, error = %e, "Network failed, trying offline fallback");
                Ok(Intercept::Respond(self.offline_fallback(&generation, key).await))
            }
        }
    }

    /// Wait for every background cache write started by `handle`.
    pub async fn settle(&self) {
        let handles: Vec<_> = self.pending.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Cache write task failed");
            }
        }
    }

    async fn write_through(&self, generation: &Arc<CacheGeneration>, url: &str, fetched: &FetchedResponse) {
        let generation = Arc::clone(generation);
        let url = url.to_string();
        let copy = fetched.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = generation.put(&url, &copy).await {
                warn!(url = %url, error = %e, "Failed to cache network response");
            }
        });

        let mut pending = self.pending.lock().await;
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    async fn offline_fallback(&self, generation: &CacheGeneration, url: &str) -> GatewayResponse {
        let root = match self.resolve("/") {
            Ok(root) => root,
            Err(_) => return GatewayResponse::offline(url),
        };

        match generation.require(root.as_str()).await {
            Ok(cached) => GatewayResponse::from_cache(cached, ResponseSource::RootFallback),
            Err(GatewayError::CacheMiss(_)) => {
                warn!(url = url, "Root document not cached, serving offline placeholder");
                GatewayResponse::offline(url)
            }
            Err(e) => {
                warn!(url = url, error = %e, "Root fallback unreadable, serving offline placeholder");
                GatewayResponse::offline(url)
            }
        }
    }

    fn resolve(&self, target: &str) -> Result<Url, GatewayError> {
        let mut url = self
            .origin
            .join(target)
            .map_err(|e| GatewayError::InvalidUrl {
                url: target.to_string(),
                reason: e.to_string(),
            })?;
        url.set_fragment(None);
        Ok(url)
    }
}

async fn write_generation(
    generation: &CacheGeneration,
    fetched: &[(Url, FetchedResponse)],
) -> Result<(), GatewayError> {
    for (url, response) in fetched {
        generation
            .put(url.as_str(), response)
            .await
            .map_err(|e| e.into_install_failure(url.as_str()))?;
    }
    generation.seal().await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    const ORIGIN: &str = "http://burpee.test";

    /// In-memory network that can be taken offline and counts every call.
    #[derive(Default)]
    struct ScriptedFetcher {
        routes: std::sync::Mutex<HashMap<String, FetchedResponse>>,
        offline: AtomicBool,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedFetcher {
        fn with_manifest(version: &str) -> Self {
            let fetcher = Self::default();
            for path in asset_manifest(version) {
                fetcher.route(&path, 200, &format!("asset {}", path));
            }
            fetcher
        }

        fn route(&self, path: &str, status: u16, body: &str) {
            self.routes.lock().unwrap().insert(
                format!("{}{}", ORIGIN, path),
                FetchedResponse::new(status, Some("text/plain"), body),
            );
        }
    }

    /// Handles the test keeps after the fetcher moves into the gateway.
    struct Network {
        calls: Arc<AtomicUsize>,
    }

    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(GatewayError::network(url, "offline"));
            }
            Ok(self
                .routes
                .lock()
                .unwrap()
                .get(url.as_str())
                .cloned()
                .unwrap_or_else(|| FetchedResponse::new(404, None, "not found")))
        }
    }

    fn gateway(dir: &TempDir, version: &str, fetcher: ScriptedFetcher) -> (OfflineGateway<ScriptedFetcher>, Network) {
        let network = Network {
            calls: Arc::clone(&fetcher.calls),
        };
        let gateway = OfflineGateway::new(
            Url::parse(ORIGIN).unwrap(),
            version,
            fetcher,
            CacheStorage::new(dir.path()),
        );
        (gateway, network)
    }

    fn set_offline(gateway: &OfflineGateway<ScriptedFetcher>, offline: bool) {
        gateway.fetcher.offline.store(offline, Ordering::SeqCst);
    }

    fn respond(intercept: Intercept) -> GatewayResponse {
        match intercept {
            Intercept::Respond(response) => response,
            Intercept::PassThrough => panic!("expected a response, got pass-through"),
        }
    }

    #[test]
    fn test_manifest_uses_versioned_stylesheet() {
        let manifest = asset_manifest("v18");
        assert_eq!(manifest.len(), 9);
        assert_eq!(manifest[0], "/");
        assert!(manifest.contains(&"/styles.v18.css".to_string()));
    }

    #[tokio::test]
    async fn test_register_installs_and_activates() {
        let dir = TempDir::new().unwrap();
        let (gateway, network) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));

        assert_eq!(gateway.state().await, WorkerState::Uninstalled);
        gateway.register().await.unwrap();
        assert_eq!(gateway.state().await, WorkerState::Activated);
        assert_eq!(network.calls.load(Ordering::SeqCst), 9);

        let cache = gateway.storage().open("cache-v18").await.unwrap();
        assert!(cache.is_sealed().await);
        assert_eq!(cache.len().await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_register_reuses_sealed_generation() {
        let dir = TempDir::new().unwrap();
        {
            let (first, _) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));
            first.register().await.unwrap();
        }

        let (second, network) = gateway(&dir, "v18", ScriptedFetcher::default());
        second.register().await.unwrap();
        assert_eq!(second.state().await, WorkerState::Activated);
        assert_eq!(network.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_install_failure_leaves_no_generation() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::with_manifest("v18");
        fetcher.route("/logo/logo.png", 404, "gone");
        let (gateway, _) = gateway(&dir, "v18", fetcher);

        match gateway.install().await {
            Err(GatewayError::InstallFailed { url, reason }) => {
                assert_eq!(url, "http://burpee.test/logo/logo.png");
                assert_eq!(reason, "status 404");
            }
            other => panic!("expected install failure, got {:?}", other),
        }
        assert_eq!(gateway.state().await, WorkerState::Uninstalled);
        assert!(gateway.storage().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_fails_loudly_when_offline() {
        let dir = TempDir::new().unwrap();
        let (gateway, _) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));
        set_offline(&gateway, true);

        assert!(matches!(
            gateway.register().await,
            Err(GatewayError::InstallFailed { .. })
        ));
        assert_eq!(gateway.state().await, WorkerState::Uninstalled);
    }

    #[tokio::test]
    async fn test_failed_reinstall_keeps_sealed_generation() {
        let dir = TempDir::new().unwrap();
        {
            let (first, _) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));
            first.register().await.unwrap();
        }

        let (second, _) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));
        set_offline(&second, true);
        assert!(matches!(
            second.install().await,
            Err(GatewayError::InstallFailed { .. })
        ));

        assert_eq!(second.storage().keys().await.unwrap(), vec!["cache-v18"]);
        let cache = second.storage().open("cache-v18").await.unwrap();
        assert!(cache.is_sealed().await);
        assert_eq!(cache.len().await.unwrap(), 9);
        assert_eq!(cache.require("http://burpee.test/").await.unwrap().body, b"asset /");
        // No half-built generation left next to it.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_reinstall_replaces_generation_contents() {
        let dir = TempDir::new().unwrap();
        {
            let fetcher = ScriptedFetcher::with_manifest("v18");
            fetcher.route("/extra.json", 200, "extra");
            let (first, _) = gateway(&dir, "v18", fetcher);
            first.register().await.unwrap();
            first.handle("/extra.json").await.unwrap();
            first.settle().await;
        }

        let fetcher = ScriptedFetcher::with_manifest("v18");
        fetcher.route("/", 200, "new root");
        let (second, _) = gateway(&dir, "v18", fetcher);
        second.install().await.unwrap();

        let cache = second.storage().open("cache-v18").await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 9);
        assert_eq!(cache.match_url("http://burpee.test/extra.json").await.unwrap(), None);
        assert_eq!(cache.require("http://burpee.test/").await.unwrap().body, b"new root");
    }

    #[tokio::test]
    async fn test_path_like_version_is_refused_before_fetching() {
        let dir = TempDir::new().unwrap();
        let (gateway, network) = gateway(&dir, "../v18", ScriptedFetcher::with_manifest("../v18"));

        assert!(matches!(
            gateway.register().await,
            Err(GatewayError::InvalidName(version)) if version == "../v18"
        ));
        assert_eq!(network.calls.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.state().await, WorkerState::Uninstalled);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let dir = TempDir::new().unwrap();
        let (gateway, _) = gateway(&dir, "v18", ScriptedFetcher::default());

        assert!(matches!(
            gateway.activate().await,
            Err(GatewayError::InvalidState {
                action: "activate",
                state: WorkerState::Uninstalled
            })
        ));
    }

    #[tokio::test]
    async fn test_activation_purges_superseded_generations() {
        let dir = TempDir::new().unwrap();
        {
            let (old, _) = gateway(&dir, "v17", ScriptedFetcher::with_manifest("v17"));
            old.register().await.unwrap();
        }

        let (new, _) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));
        new.register().await.unwrap();
        assert_eq!(new.storage().keys().await.unwrap(), vec!["cache-v18"]);
    }

    #[tokio::test]
    async fn test_undeletable_generation_does_not_block_activation() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("cache-v16")).unwrap();
        // Listed as a generation, but not a name the storage will remove.
        std::fs::create_dir_all(dir.path().join("cache-v1..7")).unwrap();

        let (gateway, _) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));
        gateway.register().await.unwrap();

        assert_eq!(gateway.state().await, WorkerState::Activated);
        assert_eq!(
            gateway.storage().keys().await.unwrap(),
            vec!["cache-v1..7", "cache-v18"]
        );
    }

    #[tokio::test]
    async fn test_unreadable_cache_root_does_not_block_activation() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, "file").unwrap();

        let gateway = OfflineGateway::new(
            Url::parse(ORIGIN).unwrap(),
            "v18",
            ScriptedFetcher::default(),
            CacheStorage::new(&blocker),
        );
        *gateway.state.lock().await = WorkerState::Installed;

        gateway.activate().await.unwrap();
        assert_eq!(gateway.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_cross_origin_passes_through() {
        let dir = TempDir::new().unwrap();
        let (gateway, network) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));
        gateway.register().await.unwrap();
        let before = network.calls.load(Ordering::SeqCst);

        let intercept = gateway.handle("https://fonts.example.com/font.woff").await.unwrap();
        assert_eq!(intercept, Intercept::PassThrough);
        assert_eq!(network.calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_requests_pass_through_before_activation() {
        let dir = TempDir::new().unwrap();
        let (gateway, _) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));

        assert_eq!(gateway.handle("/").await.unwrap(), Intercept::PassThrough);
    }

    #[tokio::test]
    async fn test_cached_asset_served_without_network() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::with_manifest("v5");
        fetcher.route("/styles.v5.css", 200, "body { color: red }");
        let (gateway, network) = gateway(&dir, "v5", fetcher);
        gateway.register().await.unwrap();
        let before = network.calls.load(Ordering::SeqCst);

        let response = respond(gateway.handle("/styles.v5.css").await.unwrap());
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.body, b"body { color: red }");
        assert_eq!(network.calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_network_response_written_through() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::with_manifest("v18");
        fetcher.route("/sounds/beep.mp3", 200, "beep");
        let (gateway, _) = gateway(&dir, "v18", fetcher);
        gateway.register().await.unwrap();

        let first = respond(gateway.handle("/sounds/beep.mp3").await.unwrap());
        assert_eq!(first.source, ResponseSource::Network);
        gateway.settle().await;

        set_offline(&gateway, true);
        let second = respond(gateway.handle("/sounds/beep.mp3").await.unwrap());
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.body, b"beep");
    }

    #[tokio::test]
    async fn test_error_status_returned_but_not_cached() {
        let dir = TempDir::new().unwrap();
        let (gateway, _) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));
        gateway.register().await.unwrap();

        let response = respond(gateway.handle("/missing").await.unwrap());
        assert_eq!(response.status, 404);
        assert_eq!(response.source, ResponseSource::Network);
        gateway.settle().await;

        let cache = gateway.storage().open("cache-v18").await.unwrap();
        assert_eq!(cache.match_url("http://burpee.test/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_offline_falls_back_to_cached_root() {
        let dir = TempDir::new().unwrap();
        let (gateway, _) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));
        gateway.register().await.unwrap();
        set_offline(&gateway, true);

        let response = respond(gateway.handle("/workouts/history").await.unwrap());
        assert_eq!(response.source, ResponseSource::RootFallback);
        assert_eq!(response.body, b"asset /");
    }

    #[tokio::test]
    async fn test_offline_without_root_serves_placeholder() {
        let dir = TempDir::new().unwrap();
        let (gateway, _) = gateway(&dir, "v18", ScriptedFetcher::with_manifest("v18"));
        gateway.register().await.unwrap();
        gateway.storage().delete("cache-v18").await.unwrap();
        set_offline(&gateway, true);

        let response = respond(gateway.handle("/anything").await.unwrap());
        assert_eq!(response.source, ResponseSource::Offline);
        assert_eq!(response.status, OFFLINE_STATUS);
        assert_eq!(response.body, OFFLINE_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_version_bump_isolates_content() {
        let dir = TempDir::new().unwrap();
        {
            let fetcher = ScriptedFetcher::with_manifest("v1");
            fetcher.route("/data.json", 200, "old");
            let (old, _) = gateway(&dir, "v1", fetcher);
            old.register().await.unwrap();
            old.handle("/data.json").await.unwrap();
            old.settle().await;
        }

        let fetcher = ScriptedFetcher::with_manifest("v2");
        fetcher.route("/data.json", 200, "new");
        let (new, _) = gateway(&dir, "v2", fetcher);
        assert_eq!(new.cache_name(), "cache-v2");
        new.register().await.unwrap();

        let response = respond(new.handle("/data.json").await.unwrap());
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(response.body, b"new");
    }

    #[tokio::test]
    async fn test_invalid_target_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (gateway, _) = gateway(&dir, "v18", ScriptedFetcher::default());

        assert!(matches!(
            gateway.handle("http://[::1").await,
            Err(GatewayError::InvalidUrl { .. })
        ));
    }
}

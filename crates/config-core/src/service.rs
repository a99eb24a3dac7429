//! The configuration service: resolution, decryption, caching and invalidation

use std::sync::Arc;
use std::time::Duration;

use config_crypto::{CipherRequest, EncryptionGateway, KeyChain};
use config_env::render::{to_json, to_properties, to_yaml};
use config_env::{ConfigRequest, Environment, PropertySourceAssembler, resolve_placeholders};
use config_git::RepositoryRegistry;
use serde_json::Value;

use crate::backend::{Backend, GitBackend, GitRoute, NativeBackend};
use crate::cache::ScopedCache;
use crate::composite::CompositeResolver;
use crate::notification::{Headers, NotificationPathSet, NotificationRouter};
use crate::retry::with_backoff;
use crate::routing::RoutePatterns;
use crate::settings::{
    BackendKind, EncryptSettings, GitSettings, NativeSettings, RetrySettings, ServerSettings,
};
use crate::Result;

/// Output shape for a merged environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Yaml,
    Json,
    Properties,
}

impl RenderFormat {
    /// Format for a file extension such as `yml` or `properties`.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "yml" | "yaml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "properties" => Some(Self::Properties),
            _ => None,
        }
    }
}

/// Serves decrypted environments through a cache that change notifications
/// invalidate.
#[derive(Debug)]
pub struct ConfigService {
    resolver: CompositeResolver,
    gateway: EncryptionGateway,
    router: NotificationRouter,
    cache: ScopedCache<Environment>,
    retry: RetrySettings,
}

impl ConfigService {
    pub fn new(resolver: CompositeResolver, gateway: EncryptionGateway) -> Self {
        Self {
            resolver,
            gateway,
            router: NotificationRouter::default(),
            cache: ScopedCache::new(),
            retry: RetrySettings::default(),
        }
    }

    pub fn with_router(mut self, router: NotificationRouter) -> Self {
        self.router = router;
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Build the service described by `settings`.
    ///
    /// Git backends pointing at the same URI share one repository from
    /// `registry`. Nothing is cloned here; see [`ConfigService::start`].
    pub fn from_settings(settings: &ServerSettings, registry: &RepositoryRegistry) -> Result<Self> {
        settings.validate()?;

        let mut resolver = CompositeResolver::new().with_overrides(settings.overrides.clone());
        for backend in &settings.backends {
            let built = match &backend.kind {
                BackendKind::Git(git) => Backend::Git(Arc::new(git_backend(git, registry)?)),
                BackendKind::Native(native) => Backend::Native(Arc::new(native_backend(native))),
            };
            resolver = resolver.with_backend(backend.descriptor(), built)?;
        }

        Ok(Self::new(resolver, build_gateway(&settings.encrypt)).with_retry(settings.retry.clone()))
    }

    /// Build the service and warm up its backends.
    ///
    /// With `fail_fast` a warm-up failure aborts startup and names the
    /// failing backend; otherwise it is logged and the repository is cloned
    /// on first use instead.
    pub fn start(settings: &ServerSettings, registry: &RepositoryRegistry) -> Result<Self> {
        let service = Self::from_settings(settings, registry)?;
        match service.resolver.warm_up() {
            Ok(()) => {}
            Err(e) if settings.fail_fast => {
                tracing::error!(error = %e, "Backend initialization failed; refusing to start");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Backend initialization failed; continuing");
            }
        }
        Ok(service)
    }

    pub fn resolver(&self) -> &CompositeResolver {
        &self.resolver
    }

    pub fn gateway(&self) -> &EncryptionGateway {
        &self.gateway
    }

    /// The decrypted environment for `request`, from cache when possible.
    pub fn environment(&self, request: &ConfigRequest) -> Result<Arc<Environment>> {
        self.cache.get_or_build(&request.cache_key(), || -> Result<Environment> {
            let initial = Duration::from_millis(self.retry.initial_interval_millis);
            let budget = Duration::from_millis(self.retry.max_elapsed_millis);
            let env = with_backoff(initial, budget, || self.resolver.resolve(request))?;
            Ok(self.gateway.decrypt(env)?)
        })
    }

    /// The merged environment rendered as YAML, JSON or `.properties`.
    ///
    /// With `resolve` set, `${...}` placeholders are resolved against the
    /// merged values first.
    pub fn render(
        &self,
        request: &ConfigRequest,
        format: RenderFormat,
        resolve: bool,
    ) -> Result<String> {
        let env = self.environment(request)?;
        let mut merged = env.merged();
        if resolve {
            merged = resolve_placeholders(&merged);
        }
        Ok(match format {
            RenderFormat::Yaml => to_yaml(&merged)?,
            RenderFormat::Json => to_json(&merged)?,
            RenderFormat::Properties => to_properties(&merged),
        })
    }

    /// One plain-text file as served for `request`.
    pub fn resource(&self, request: &ConfigRequest, path: &str) -> Result<String> {
        self.resolver.find_resource(request, path)
    }

    /// Route a change notification and invalidate the cached environments it
    /// affects. Returns the routed identities.
    pub fn notify(&self, headers: &Headers, payload: &Value) -> NotificationPathSet {
        let paths = self.router.route(headers, payload);
        let invalidated = self.cache.invalidate(&paths);
        tracing::info!(
            tokens = paths.len(),
            invalidated = invalidated.len(),
            "Processed change notification"
        );
        paths
    }

    /// Drop every cached environment; returns the keys dropped.
    pub fn refresh_all(&self) -> Vec<String> {
        self.cache.clear()
    }

    /// Keys of the environments currently cached.
    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.keys()
    }

    pub fn encrypt(&self, request: &CipherRequest<'_>) -> Result<String> {
        Ok(self.gateway.encrypt_text(request)?)
    }

    pub fn decrypt(&self, request: &CipherRequest<'_>) -> Result<String> {
        Ok(self.gateway.decrypt_text(request)?)
    }

    /// Whether encryption is usable.
    pub fn encryption_status(&self) -> Result<()> {
        Ok(self.gateway.status()?)
    }
}

fn git_backend(settings: &GitSettings, registry: &RepositoryRegistry) -> Result<GitBackend> {
    let repository = registry.get_or_create(settings.repository.clone())?;
    let mut backend = GitBackend::new(GitRoute::new(
        repository,
        PropertySourceAssembler::new(settings.search_paths.clone()),
    ));
    for repo in &settings.repos {
        let repository = registry.get_or_create(repo.repository.clone())?;
        backend = backend.with_route(
            RoutePatterns::new(&repo.patterns)?,
            GitRoute::new(repository, PropertySourceAssembler::new(repo.search_paths.clone())),
        );
    }
    Ok(backend)
}

fn native_backend(settings: &NativeSettings) -> NativeBackend {
    let backend = NativeBackend::new(
        settings.search_locations.clone(),
        PropertySourceAssembler::new(settings.search_paths.clone()),
    );
    match &settings.default_label {
        Some(label) => backend.with_default_label(label.clone()),
        None => backend,
    }
}

fn build_gateway(settings: &EncryptSettings) -> EncryptionGateway {
    if !settings.is_configured() {
        return EncryptionGateway::disabled();
    }
    let mut chain = KeyChain::new(settings.salt.clone());
    if let Some(key) = settings.key.as_deref().filter(|k| !k.is_empty()) {
        chain = chain.with_default_secret(key);
    }
    for (name, secret) in &settings.keys {
        chain = chain.with_named_secret(name.clone(), secret);
    }
    EncryptionGateway::new(Arc::new(chain)).with_fail_on_error(settings.fail_on_error)
}

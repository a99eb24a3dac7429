use std::sync::Arc;

use config_env::{ConfigRequest, Environment, PropertySourceAssembler};
use config_git::{RepositoryHandle, VersionedSourceRepository};

use super::EnvironmentRepository;
use crate::Result;
use crate::routing::RoutePatterns;

/// A repository plus the assembler that reads its tree.
#[derive(Debug, Clone)]
pub struct GitRoute {
    repository: Arc<VersionedSourceRepository>,
    assembler: PropertySourceAssembler,
}

impl GitRoute {
    pub fn new(
        repository: Arc<VersionedSourceRepository>,
        assembler: PropertySourceAssembler,
    ) -> Self {
        Self {
            repository,
            assembler,
        }
    }

    pub fn repository(&self) -> &Arc<VersionedSourceRepository> {
        &self.repository
    }

    fn environment(&self, request: &ConfigRequest) -> Result<Environment> {
        let label = self.repository.effective_label(request.label()).to_string();
        let (version, sources) = self
            .repository
            .with_materialized(Some(&label), |handle: &RepositoryHandle| {
                let prefix = format!("{}/", handle.uri);
                self.assembler
                    .assemble(&handle.root(), &prefix, request)
                    .map(|sources| (handle.version.clone(), sources))
            })??;

        let mut env = Environment::new(&request.application, &request.profiles, Some(&label));
        env.version = Some(version);
        for source in sources {
            env.add(source);
        }
        Ok(env)
    }

    fn resource(&self, request: &ConfigRequest, path: &str) -> Result<String> {
        let label = self.repository.effective_label(request.label()).to_string();
        let text = self
            .repository
            .with_materialized(Some(&label), |handle: &RepositoryHandle| {
                let file = self.assembler.find_resource(&handle.root(), request, path)?;
                config_fs::io::read_text(&file).map_err(crate::Error::from)
            })??;
        Ok(text)
    }
}

/// Git-backed configuration with optional pattern-routed sub-repositories.
///
/// A request goes to the first sub-repository whose patterns match it and
/// to the parent repository otherwise.
#[derive(Debug, Clone)]
pub struct GitBackend {
    default: GitRoute,
    routes: Vec<(RoutePatterns, GitRoute)>,
}

impl GitBackend {
    pub fn new(default: GitRoute) -> Self {
        Self {
            default,
            routes: Vec::new(),
        }
    }

    /// Send requests matching `patterns` to `route`; earlier routes win.
    pub fn with_route(mut self, patterns: RoutePatterns, route: GitRoute) -> Self {
        self.routes.push((patterns, route));
        self
    }

    /// The route serving `request`.
    pub fn route(&self, request: &ConfigRequest) -> &GitRoute {
        self.routes
            .iter()
            .find(|(patterns, _)| patterns.matches(request))
            .map(|(_, route)| route)
            .unwrap_or(&self.default)
    }

    fn repositories(&self) -> impl Iterator<Item = &Arc<VersionedSourceRepository>> {
        std::iter::once(&self.default)
            .chain(self.routes.iter().map(|(_, route)| route))
            .map(GitRoute::repository)
    }
}

impl EnvironmentRepository for GitBackend {
    fn find_one(&self, request: &ConfigRequest) -> Result<Environment> {
        let route = self.route(request);
        tracing::debug!(
            request = %request,
            uri = %route.repository.uri(),
            "Resolving from git repository"
        );
        route.environment(request)
    }

    fn find_resource(&self, request: &ConfigRequest, path: &str) -> Result<String> {
        self.route(request).resource(request, path)
    }

    fn warm_up(&self) -> Result<()> {
        for repository in self.repositories() {
            repository.warm_up()?;
        }
        Ok(())
    }
}

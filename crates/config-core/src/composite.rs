//! Combining several backends into one environment

use std::cmp::Reverse;
use std::thread;

use config_env::{ConfigRequest, Environment, OVERRIDES_SOURCE, PropertyMap, PropertySource};
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, EnvironmentRepository};
use crate::routing::RoutePatterns;
use crate::{Error, Result};

/// How one backend takes part in composite resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendDescriptor {
    pub identifier: String,

    /// Higher priorities come first in the combined result
    pub priority: i32,

    /// Application patterns routing requests to this backend; empty means
    /// the backend serves every application
    pub search_patterns: Vec<String>,

    /// Contribute nothing instead of failing the whole resolution
    pub fail_isolated: bool,
}

impl BackendDescriptor {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_search_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.search_patterns = patterns.iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    pub fn fail_isolated(mut self, isolated: bool) -> Self {
        self.fail_isolated = isolated;
        self
    }
}

#[derive(Debug, Clone)]
struct Member {
    descriptor: BackendDescriptor,
    patterns: RoutePatterns,
    backend: Backend,
}

/// Resolves a request against every configured backend.
///
/// Backends run in descending priority; equal priorities keep the order they
/// were added in. Backends without search patterns always take part. Among
/// backends with search patterns only the first whose patterns match the
/// request does, so an application is routed to one specific backend and
/// otherwise falls back to the unpatterned defaults.
///
/// Backends are queried in parallel but the result is always assembled in
/// priority order, never in completion order.
#[derive(Debug, Clone, Default)]
pub struct CompositeResolver {
    members: Vec<Member>,
    overrides: PropertyMap,
}

impl CompositeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend; fails when its search patterns do not compile.
    pub fn with_backend(mut self, descriptor: BackendDescriptor, backend: Backend) -> Result<Self> {
        let patterns = RoutePatterns::new(&descriptor.search_patterns)?;
        self.members.push(Member {
            descriptor,
            patterns,
            backend,
        });
        // stable, so equal priorities keep insertion order
        self.members.sort_by_key(|m| Reverse(m.descriptor.priority));
        Ok(self)
    }

    /// Values placed ahead of every backend's sources.
    pub fn with_overrides(mut self, overrides: PropertyMap) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.members.iter().map(|m| &m.descriptor)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn selected(&self, request: &ConfigRequest) -> Vec<&Member> {
        let mut routed = false;
        self.members
            .iter()
            .filter(|member| {
                if member.patterns.is_empty() {
                    return true;
                }
                if routed || !member.patterns.matches(request) {
                    return false;
                }
                routed = true;
                true
            })
            .collect()
    }

    /// Resolve `request` against the selected backends.
    ///
    /// Property sources are concatenated in backend priority order, each
    /// backend's own order preserved. A failing fail-isolated backend
    /// contributes nothing; any other failure fails the resolution with
    /// [`Error::CompositeFailure`].
    pub fn resolve(&self, request: &ConfigRequest) -> Result<Environment> {
        let members = self.selected(request);
        let results: Vec<Result<Environment>> = thread::scope(|scope| {
            let workers: Vec<_> = members
                .iter()
                .map(|member| scope.spawn(move || member.backend.find_one(request)))
                .collect();
            workers
                .into_iter()
                .zip(&members)
                .map(|(worker, member)| {
                    worker.join().unwrap_or_else(|_| {
                        Err(Error::BackendPanicked {
                            backend: member.descriptor.identifier.clone(),
                        })
                    })
                })
                .collect()
        });

        let mut env = Environment::new(&request.application, &request.profiles, request.label());

        for (member, result) in members.iter().zip(results) {
            let backend = &member.descriptor.identifier;
            match result {
                Ok(resolved) => {
                    if env.version.is_none() {
                        env.version = resolved.version.clone();
                    }
                    if env.state.is_none() {
                        env.state = resolved.state.clone();
                    }
                    if env.label.is_none() {
                        env.label = resolved.label.clone();
                    }
                    env.append(resolved);
                }
                Err(e) if member.descriptor.fail_isolated => {
                    tracing::warn!(
                        backend = %backend,
                        request = %request,
                        error = %e,
                        "Isolated backend failed; contributing no property sources"
                    );
                }
                Err(e) => {
                    return Err(Error::CompositeFailure {
                        backend: backend.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }
        if !self.overrides.is_empty() {
            env.add_first(PropertySource::new(OVERRIDES_SOURCE, self.overrides.clone()));
        }
        Ok(env)
    }

    /// Serve a plain-text resource from the first backend that has it.
    pub fn find_resource(&self, request: &ConfigRequest, path: &str) -> Result<String> {
        for member in self.selected(request) {
            match member.backend.find_resource(request, path) {
                Ok(text) => return Ok(text),
                Err(e) if e.is_not_found() => continue,
                Err(e) if member.descriptor.fail_isolated => {
                    tracing::warn!(
                        backend = %member.descriptor.identifier,
                        error = %e,
                        "Isolated backend failed to serve resource"
                    );
                }
                Err(e) => {
                    return Err(Error::CompositeFailure {
                        backend: member.descriptor.identifier.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }
        Err(config_env::Error::NoSuchResource {
            path: path.to_string(),
        }
        .into())
    }

    /// Warm up every backend; the first failure is returned.
    pub fn warm_up(&self) -> Result<()> {
        for member in &self.members {
            member.backend.warm_up().map_err(|e| Error::CompositeFailure {
                backend: member.descriptor.identifier.clone(),
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}

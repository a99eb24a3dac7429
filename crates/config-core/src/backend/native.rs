use config_env::search::LABEL_PLACEHOLDER;
use config_env::{ConfigRequest, Environment, PropertySourceAssembler};
use config_fs::NormalizedPath;

use super::EnvironmentRepository;
use crate::{Error, Result};

/// Plain directories on the local filesystem, without version control.
///
/// Each location may contain `{label}`; locations that need a label are
/// skipped when the request has none. Locations are read in declared order
/// and earlier ones take precedence.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    locations: Vec<String>,
    assembler: PropertySourceAssembler,
    default_label: Option<String>,
}

impl NativeBackend {
    pub fn new(locations: Vec<String>, assembler: PropertySourceAssembler) -> Self {
        Self {
            locations,
            assembler,
            default_label: None,
        }
    }

    /// Label substituted when a request carries none.
    pub fn with_default_label(mut self, label: impl Into<String>) -> Self {
        self.default_label = Some(label.into());
        self
    }

    fn roots(&self, request: &ConfigRequest) -> Vec<NormalizedPath> {
        let label = request.label().or(self.default_label.as_deref());
        self.locations
            .iter()
            .filter_map(|location| {
                if !location.contains(LABEL_PLACEHOLDER) {
                    return Some(NormalizedPath::new(location));
                }
                let label = label?;
                if label.split(['/', '\\']).any(|s| s == "..") {
                    tracing::warn!(
                        label = %label,
                        "Ignoring label that escapes the search location"
                    );
                    return None;
                }
                Some(NormalizedPath::new(location.replace(LABEL_PLACEHOLDER, label)))
            })
            .filter(NormalizedPath::is_dir)
            .collect()
    }
}

impl EnvironmentRepository for NativeBackend {
    fn find_one(&self, request: &ConfigRequest) -> Result<Environment> {
        let mut env = Environment::new(&request.application, &request.profiles, request.label());
        for root in self.roots(request) {
            let prefix = format!("file:{}/", root.as_str().trim_end_matches('/'));
            for source in self.assembler.assemble(&root, &prefix, request)? {
                env.add(source);
            }
        }
        Ok(env)
    }

    fn find_resource(&self, request: &ConfigRequest, path: &str) -> Result<String> {
        for root in self.roots(request) {
            match self.assembler.find_resource(&root, request, path) {
                Ok(file) => return Ok(config_fs::io::read_text(&file)?),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::Env(config_env::Error::NoSuchResource {
            path: path.to_string(),
        }))
    }
}

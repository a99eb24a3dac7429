//! Source file formats and loading them into flat property maps

use config_fs::{NormalizedPath, io};

use crate::environment::PropertyMap;
use crate::{Error, Result, flatten, properties};

/// Formats a property source file can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Properties,
    Yaml,
    Json,
}

/// Extensions recognised as property sources, in lookup order.
pub const KNOWN_EXTENSIONS: [&str; 4] = ["properties", "yml", "yaml", "json"];

impl Format {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "properties" => Some(Self::Properties),
            "yml" | "yaml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Properties => "properties",
            Self::Yaml => "YAML",
            Self::Json => "JSON",
        }
    }
}

/// Parse `content` into a flat property map.
///
/// `profiles` selects which profile-activated YAML documents apply; other
/// formats ignore it.
pub fn parse_source(
    content: &str,
    format: Format,
    origin: &NormalizedPath,
    profiles: &[String],
) -> Result<PropertyMap> {
    let parsed = match format {
        Format::Properties => Ok(properties::parse(content)),
        Format::Yaml => flatten::flatten_yaml_documents(content, profiles),
        Format::Json => flatten::flatten_json(content),
    };
    parsed.map_err(|message| Error::Parse {
        path: origin.to_native(),
        format: format.name(),
        message,
    })
}

/// Read and parse the file at `path`, detecting its format from the extension.
pub fn load_source(path: &NormalizedPath, profiles: &[String]) -> Result<PropertyMap> {
    let format = path
        .extension()
        .and_then(Format::from_extension)
        .ok_or_else(|| Error::Fs(config_fs::Error::UnsupportedFormat {
            extension: path.extension().unwrap_or_default().to_string(),
        }))?;
    let content = io::read_text(path)?;
    parse_source(&content, format, path, profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("properties", Some(Format::Properties))]
    #[case("yml", Some(Format::Yaml))]
    #[case("YAML", Some(Format::Yaml))]
    #[case("json", Some(Format::Json))]
    #[case("toml", None)]
    fn detects_format(#[case] ext: &str, #[case] expected: Option<Format>) {
        assert_eq!(Format::from_extension(ext), expected);
    }

    #[test]
    fn parse_error_names_origin() {
        let origin = NormalizedPath::new("/repo/foo.json");
        let err = parse_source("{not json", Format::Json, &origin, &[]).unwrap_err();
        match err {
            Error::Parse { path, format, .. } => {
                assert_eq!(path, origin.to_native());
                assert_eq!(format, "JSON");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}

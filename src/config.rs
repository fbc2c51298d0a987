//! Site configuration ([`SiteConfig`], loaded from a YAML file) and the
//! resolved build configuration ([`Config`]).

use gtmpl_derive::Gtmpl;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// The default name of the site configuration file.
pub const SITE_CONFIG_FILE: &str = "config.yaml";

/// Where documents are read from, relative to the project root.
pub const CONTENT_DIRECTORY: &str = "content/posts";

/// Where the layout and fragment templates live, relative to the project root.
pub const TEMPLATES_DIRECTORY: &str = "templates";

/// Where static assets are copied from, relative to the project root.
pub const STATIC_DIRECTORY: &str = "static";

/// Site-wide metadata made available to every page as `site`. Every field is
/// optional and defaults to empty.
#[derive(Clone, Debug, Default, Deserialize, Gtmpl, PartialEq)]
pub struct SiteConfig {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, rename = "baseUrl")]
    pub base_url: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub keywords: String,
}

impl SiteConfig {
    /// Loads the site configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<SiteConfig> {
        let contents = fs::read_to_string(path).map_err(|err| Error::Open {
            path: path.to_owned(),
            source: err,
        })?;
        SiteConfig::from_yaml(&contents).map_err(|err| Error::Parse {
            path: path.to_owned(),
            source: err,
        })
    }

    /// Parses the site configuration from YAML. An empty document yields the
    /// default configuration.
    pub fn from_yaml(yaml: &str) -> std::result::Result<SiteConfig, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(SiteConfig::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Parses `base_url`, forcing a trailing slash so that joining a relative
    /// path appends to it rather than replacing its last segment. Returns
    /// `None` if the base URL is empty or isn't an absolute URL.
    pub fn base_url(&self) -> Option<Url> {
        let trimmed = self.base_url.trim();
        if trimmed.is_empty() {
            return None;
        }
        let with_slash = match trimmed.ends_with('/') {
            true => trimmed.to_owned(),
            false => format!("{}/", trimmed),
        };
        Url::parse(&with_slash).ok()
    }
}

/// The resolved configuration for one build: where everything is read from
/// and written to.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// The site configuration file.
    pub site_config_path: PathBuf,

    /// The directory of document sources.
    pub content_directory: PathBuf,

    /// The directory holding the layout and fragment templates.
    pub templates_directory: PathBuf,

    /// The directory of static assets copied verbatim into the output.
    pub static_directory: PathBuf,

    /// The directory the site is written to. It is deleted and recreated on
    /// every build.
    pub output_directory: PathBuf,

    /// The number of threads used to parse documents; fewer than 2 parses on
    /// the calling thread.
    pub threads: usize,
}

impl Config {
    /// Resolves a build configuration for the project rooted at
    /// `project_root`. Relative `site_config_path` and `output_directory`
    /// are taken relative to the root.
    pub fn new(project_root: &Path, site_config_path: &Path, output_directory: &Path) -> Config {
        Config {
            site_config_path: project_root.join(site_config_path),
            content_directory: project_root.join(CONTENT_DIRECTORY),
            templates_directory: project_root.join(TEMPLATES_DIRECTORY),
            static_directory: project_root.join(STATIC_DIRECTORY),
            output_directory: project_root.join(output_directory),
            threads: 1,
        }
    }

    /// Sets the number of parser threads.
    pub fn with_threads(mut self, threads: usize) -> Config {
        self.threads = threads;
        self
    }
}

/// Represents the result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading the site configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the configuration file can't be read.
    #[error("opening site configuration `{}`", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Returned when the configuration file isn't valid YAML.
    #[error("parsing site configuration `{}`", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_file() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SITE_CONFIG_FILE);
        fs::write(
            &path,
            "title: My Blog\ndescription: Thoughts\nbaseUrl: https://example.com\nauthor: Sam\nkeywords: rust, blogging\n",
        )
        .unwrap();

        let config = SiteConfig::from_file(&path)?;
        assert_eq!(
            SiteConfig {
                title: String::from("My Blog"),
                description: String::from("Thoughts"),
                base_url: String::from("https://example.com"),
                author: String::from("Sam"),
                keywords: String::from("rust, blogging"),
            },
            config
        );
        Ok(())
    }

    #[test]
    fn test_from_file_missing() {
        match SiteConfig::from_file(Path::new("does/not/exist.yaml")) {
            Err(Error::Open { path, .. }) => assert_eq!(Path::new("does/not/exist.yaml"), path),
            other => panic!("wanted Open error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SITE_CONFIG_FILE);
        fs::write(&path, "title: [unclosed\n").unwrap();

        match SiteConfig::from_file(&path) {
            Err(Error::Parse { .. }) => {}
            other => panic!("wanted Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_yaml_partial_and_empty() {
        let partial = SiteConfig::from_yaml("title: Only a title\n").unwrap();
        assert_eq!("Only a title", partial.title);
        assert_eq!("", partial.keywords);

        assert_eq!(SiteConfig::default(), SiteConfig::from_yaml("").unwrap());
    }

    #[test]
    fn test_base_url() {
        let mut config = SiteConfig::default();
        assert_eq!(None, config.base_url());

        config.base_url = String::from("https://example.com/blog");
        assert_eq!(
            "https://example.com/blog/posts/a.html",
            config.base_url().unwrap().join("posts/a.html").unwrap().as_str()
        );

        config.base_url = String::from("not a url");
        assert_eq!(None, config.base_url());
    }

    #[test]
    fn test_config_paths() {
        let config = Config::new(Path::new("site"), Path::new("config.yaml"), Path::new("public"))
            .with_threads(4);
        assert_eq!(PathBuf::from("site/config.yaml"), config.site_config_path);
        assert_eq!(PathBuf::from("site/content/posts"), config.content_directory);
        assert_eq!(PathBuf::from("site/templates"), config.templates_directory);
        assert_eq!(PathBuf::from("site/static"), config.static_directory);
        assert_eq!(PathBuf::from("site/public"), config.output_directory);
        assert_eq!(4, config.threads);
    }
}

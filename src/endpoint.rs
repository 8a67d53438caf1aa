//! Resource URL construction.

use crate::error::{Error, Result};
use crate::settings::Settings;
use std::fmt;
use url::Url;

/// A resolved request target.
///
/// Built fresh for every call: `scheme://host:port/{api_version}/projects/{project_id}/{prefix}/{segment}...`
/// plus any query parameters added before dispatch. Construction never
/// touches the network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Endpoint for `prefix` and the given path segments under the project.
    ///
    /// Each segment is percent-encoded on its own, so a queue name can never
    /// escape its path position.
    pub fn action(settings: &Settings, prefix: &str, segments: &[&str]) -> Result<Self> {
        let mut url = base(settings)?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("cannot use {} as a base url", settings.base_url())))?
            .clear()
            .push(&settings.api_version)
            .push("projects")
            .push(&settings.project_id)
            .push(prefix)
            .extend(segments);
        Ok(Self { url })
    }

    /// The service version endpoint, which lives outside the project path.
    pub fn version(settings: &Settings) -> Result<Self> {
        let mut url = base(settings)?;
        url.set_path("/version");
        Ok(Self { url })
    }

    /// Append a query parameter.
    ///
    /// Repeated keys are all kept, in insertion order.
    pub fn query(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.url
            .query_pairs_mut()
            .append_pair(key, &value.to_string());
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

fn base(settings: &Settings) -> Result<Url> {
    Url::parse(&settings.base_url())
        .map_err(|e| Error::Config(format!("invalid base url {}: {e}", settings.base_url())))
}

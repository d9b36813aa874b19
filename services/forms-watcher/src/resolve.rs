//! Share URL to form descriptor
//!
//! A share link (`https://forms.office.com/r/<short>`) redirects to the
//! response page, whose `id` query parameter is the full form ID the runtime
//! API needs. Resolution happens once, when the form is added.

use forms_poll::ResourceDescriptor;
use reqwest::Url;
use tracing::debug;

use crate::error::{Error, Result};

/// Last non-empty path segment, e.g. `aB3dE` for `/r/aB3dE/`.
pub fn short_code(url: &Url) -> Option<String> {
    url.path_segments()?
        .rfind(|segment| !segment.is_empty())
        .map(str::to_owned)
}

/// The `id` query parameter, if present and non-empty.
pub fn form_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Follow a share URL and build the descriptor for it.
pub async fn resolve_form(
    client: &reqwest::Client,
    url: &str,
    name: Option<String>,
    tenant: &str,
    group: &str,
) -> Result<ResourceDescriptor> {
    let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;
    let short = short_code(&parsed).ok_or_else(|| Error::InvalidUrl {
        url: url.to_owned(),
        reason: "no short code in path".into(),
    })?;

    let response = client
        .get(parsed)
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let final_url = response.url();
    debug!(url, resolved = %final_url, "followed share link");
    let form_id = form_id(final_url).ok_or_else(|| Error::Resolve(url.to_owned()))?;

    Ok(ResourceDescriptor {
        name,
        short,
        form_id,
        url: url.to_owned(),
        tenant: tenant.to_owned(),
        group: group.to_owned(),
    })
}

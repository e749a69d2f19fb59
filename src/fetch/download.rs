use reqwest::Client;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

use crate::error::{PipelineError, Result};

/// Download `url` and save the body verbatim at `dest`, creating its parent
/// directory. The body lands in `<dest>.part` first and is renamed into place
/// only once fully written. Returns the number of bytes saved.
#[instrument(level = "info", skip_all, fields(url = %url, dest = %dest.display()))]
pub async fn download_permits(client: &Client, url: &Url, dest: &Path) -> Result<u64> {
    let network = |source| PipelineError::Network {
        url: url.to_string(),
        source,
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(PipelineError::io(parent))?;
    }

    let resp = client
        .get(url.as_str())
        .send()
        .await
        .map_err(network)?
        .error_for_status()
        .map_err(network)?;
    let bytes = resp.bytes().await.map_err(network)?;

    let mut part_name = dest.as_os_str().to_owned();
    part_name.push(".part");
    let part = Path::new(&part_name);
    fs::write(part, &bytes).await.map_err(PipelineError::io(part))?;
    fs::rename(part, dest).await.map_err(PipelineError::io(dest))?;

    info!(bytes = bytes.len(), "saved raw permits");
    Ok(bytes.len() as u64)
}

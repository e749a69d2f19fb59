// src/fetch/mod.rs

pub mod download;

pub use download::download_permits;

/// City of Chicago building permits, full CSV export.
pub const DEFAULT_PERMITS_URL: &str =
    "https://data.cityofchicago.org/api/views/ydr8-5enu/rows.csv?accessType=DOWNLOAD";

/// HTTP client shared by every fetch in a run.
pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .gzip(true)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

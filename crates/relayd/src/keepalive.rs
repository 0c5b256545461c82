//! Self keep-alive: periodically pings this deployment's own `/ping` so an
//! idle-suspending host keeps the process up. Failures are only logged.

use crate::config::RelayConfig;
use crate::upstream;
use relay_shared::UpstreamError;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{info, warn};

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Start the keep-alive task when enabled and a base URL is known.
pub fn spawn(config: &RelayConfig) -> Option<JoinHandle<()>> {
    if !config.keep_alive_enabled {
        info!("[K]   Keep-alive disabled");
        return None;
    }
    let Some(base_url) = config.base_url.as_deref() else {
        warn!("[K]   Keep-alive enabled but BASE_URL is not set");
        return None;
    };
    let client = match upstream::http_client(PING_TIMEOUT) {
        Ok(client) => client,
        Err(e) => {
            warn!("[K]   Keep-alive disabled: {:#}", e);
            return None;
        }
    };

    let url = ping_url(base_url);
    let period = Duration::from_secs(config.keep_alive_interval_secs.max(1));
    info!("[K]   Pinging {} every {}s", url, period.as_secs());

    Some(tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            match ping_once(&client, &url).await {
                Ok(()) => info!("[K]   Keep-alive ok"),
                Err(e) => warn!("[K]   Keep-alive failed: {}", e),
            }
        }
    }))
}

pub fn ping_url(base_url: &str) -> String {
    format!("{}/ping", base_url.trim_end_matches('/'))
}

pub async fn ping_once(client: &reqwest::Client, url: &str) -> Result<(), UpstreamError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(upstream::map_reqwest_error)?;
    if !response.status().is_success() {
        return Err(upstream::status_error(response).await);
    }
    Ok(())
}

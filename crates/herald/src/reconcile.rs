// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `herald reconcile` command implementation.
//!
//! Posts to the gateway's control surface to force a reconciliation pass:
//! cron rules are reloaded and one scheduled-processor tick runs now.

use std::time::Duration;

use herald_config::model::HeraldConfig;
use herald_core::HeraldError;

/// Run the `herald reconcile` command.
pub async fn run_reconcile(config: &HeraldConfig) -> Result<(), HeraldError> {
    let host = &config.gateway.host;
    let port = config.gateway.port;
    let url = format!("http://{host}:{port}/control/reconcile");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| HeraldError::Internal(format!("failed to create HTTP client: {e}")))?;

    let resp = client.post(&url).send().await.map_err(|e| {
        HeraldError::Internal(format!(
            "could not reach the gateway at {url}: {e} (is `herald serve` running?)"
        ))
    })?;

    if resp.status().is_success() {
        println!("reconciliation complete");
        Ok(())
    } else {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(HeraldError::Internal(format!(
            "reconciliation failed ({status}): {body}"
        )))
    }
}

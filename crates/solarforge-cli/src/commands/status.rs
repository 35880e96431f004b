//! `solarforge status` — Query the status of a running SolarForge node.

use clap::Args;
use serde::Deserialize;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    version: String,
    gateway_id: String,
    uptime_secs: u64,
    forges_settled: u64,
    forges_failed: u64,
    versions_forged: u64,
}

pub async fn run(args: &StatusArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/status", args.endpoint);
    let resp = reqwest::get(&url).await;

    match resp {
        Ok(r) if r.status().is_success() => {
            let status: StatusResponse = r.json().await?;
            println!("Node Status:");
            println!("  Version:    {}", status.version);
            println!("  Gateway:    {}", status.gateway_id);
            println!("  Uptime:     {}s", status.uptime_secs);
            println!("  Forged:     {}", status.forges_settled);
            println!("  Failed:     {}", status.forges_failed);
            println!("  Versions:   {}", status.versions_forged);
        }
        Ok(r) => {
            anyhow::bail!("node returned HTTP {}", r.status());
        }
        Err(e) => super::report_unreachable(&args.endpoint, &e),
    }

    Ok(())
}

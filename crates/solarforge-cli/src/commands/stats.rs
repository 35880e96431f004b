//! `solarforge stats` — Platform-wide galaxy, user, star and sunshine totals.

use clap::Args;
use solarforge_core::ForgeStats;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Print the raw JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

pub async fn run(args: &StatsArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/stats", args.endpoint);

    match reqwest::get(&url).await {
        Ok(r) if r.status().is_success() => {
            let stats: ForgeStats = r.json().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("All stars:");
                println!("  Galaxies:   {}", stats.total_galaxies);
                println!("  Users:      {}", stats.total_users);
                println!("  Stars:      {}", stats.total_stars);
                println!("  Sunshines:  {}", stats.total_sunshines);
            }
        }
        Ok(r) => super::fail(r, "stats").await?,
        Err(e) => super::report_unreachable(&args.endpoint, &e),
    }

    Ok(())
}

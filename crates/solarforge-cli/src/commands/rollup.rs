//! `solarforge rollup` — Forge every issue of a version.

use clap::Args;
use solarforge_core::VersionRollup;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct RollupArgs {
    /// Version whose issues are forged.
    pub version_id: String,

    /// Print the rollup as JSON.
    #[arg(long)]
    pub json: bool,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

pub async fn run(args: &RollupArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/forge/versions/{}", args.endpoint, args.version_id);
    let resp = reqwest::Client::new().post(&url).send().await;

    match resp {
        Ok(r) if r.status().is_success() => {
            let rollup: VersionRollup = r.json().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&rollup)?);
                return Ok(());
            }
            println!("Version {} forged:", args.version_id);
            println!("  Issues:     {}", rollup.issues_processed);
            println!("  Sunshines:  {}", rollup.credits_total);
            println!("  Stars:      {}", rollup.reward_total);
            if rollup.participants.is_empty() {
                println!("  Participants: (none)");
            }
            for p in &rollup.participants {
                println!(
                    "  {:<20} {:>6}  ({})",
                    p.user_id,
                    p.reward_share,
                    super::roles_label(&p.roles)
                );
            }
        }
        Ok(r) => super::fail(r, "rollup").await?,
        Err(e) => super::report_unreachable(&args.endpoint, &e),
    }

    Ok(())
}

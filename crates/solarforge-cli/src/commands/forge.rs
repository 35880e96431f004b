//! `solarforge forge` — Forge one issue's sunshines into stars.

use clap::Args;
use solarforge_core::ForgeReceipt;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct ForgeArgs {
    /// Issue to forge.
    pub issue_id: String,

    /// Print the receipt as JSON.
    #[arg(long)]
    pub json: bool,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

pub async fn run(args: &ForgeArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/forge/issues/{}", args.endpoint, args.issue_id);
    let resp = reqwest::Client::new().post(&url).send().await;

    match resp {
        Ok(r) if r.status().is_success() => {
            let receipt: ForgeReceipt = r.json().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
                return Ok(());
            }
            println!("Issue forged!");
            println!("  Issue:     {}", receipt.issue_id);
            println!("  Stars:     {}", receipt.reward_total);
            println!("  Tx hash:   {}", receipt.transaction_hash);
            println!("  Settled:   {}", receipt.settled_at.to_rfc3339());
            for p in &receipt.participants {
                println!(
                    "  {:<20} {:>6}  ({})",
                    p.user_id,
                    p.reward_share,
                    super::roles_label(&p.roles)
                );
            }
        }
        Ok(r) => super::fail(r, "forge").await?,
        Err(e) => super::report_unreachable(&args.endpoint, &e),
    }

    Ok(())
}

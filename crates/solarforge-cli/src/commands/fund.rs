//! `solarforge fund` — Attach sunshines to an issue.

use clap::Args;
use serde::Serialize;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct FundArgs {
    /// Issue to fund.
    pub issue_id: String,

    /// Number of sunshines to attach.
    #[arg(short, long)]
    pub amount: u64,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Serialize)]
struct SunshinesRequest {
    amount: u64,
}

pub async fn run(args: &FundArgs) -> anyhow::Result<()> {
    if args.amount == 0 {
        anyhow::bail!("amount must be positive");
    }

    let url = format!("{}/api/v1/issues/{}/sunshines", args.endpoint, args.issue_id);
    let body = SunshinesRequest {
        amount: args.amount,
    };
    let resp = reqwest::Client::new().post(&url).json(&body).send().await;

    match resp {
        Ok(r) if r.status().is_success() => {
            println!("Attached {} sunshines to {}", args.amount, args.issue_id);
        }
        Ok(r) => super::fail(r, "funding").await?,
        Err(e) => super::report_unreachable(&args.endpoint, &e),
    }

    Ok(())
}

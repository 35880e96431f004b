//! `solarforge space` — List a galaxy's user stars.

use clap::Args;
use solarforge_core::UserStarSnapshot;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct SpaceArgs {
    /// Galaxy to list.
    pub galaxy_id: String,

    /// Show one user only.
    #[arg(short, long)]
    pub user: Option<String>,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

fn print_star(star: &UserStarSnapshot) {
    println!(
        "  {:<20} {:<16} stars {:>6}  sunshines {:>8}",
        star.user_id,
        star.nickname,
        star.reward_balance,
        star.credit_balance
    );
}

pub async fn run(args: &SpaceArgs) -> anyhow::Result<()> {
    let url = match &args.user {
        Some(user) => format!(
            "{}/api/v1/galaxies/{}/users/{}",
            args.endpoint, args.galaxy_id, user
        ),
        None => format!("{}/api/v1/galaxies/{}/space", args.endpoint, args.galaxy_id),
    };
    let resp = reqwest::get(&url).await;

    match resp {
        Ok(r) if r.status().is_success() => {
            println!("Galaxy {}:", args.galaxy_id);
            if args.user.is_some() {
                let star: UserStarSnapshot = r.json().await?;
                print_star(&star);
            } else {
                let stars: Vec<UserStarSnapshot> = r.json().await?;
                if stars.is_empty() {
                    println!("  (no stars yet)");
                }
                stars.iter().for_each(print_star);
            }
        }
        Ok(r) => super::fail(r, "galaxy lookup").await?,
        Err(e) => super::report_unreachable(&args.endpoint, &e),
    }

    Ok(())
}

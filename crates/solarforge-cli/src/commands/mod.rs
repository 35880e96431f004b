pub mod forge;
pub mod fund;
pub mod rollup;
pub mod space;
pub mod stats;
pub mod status;

use serde::Deserialize;

/// Default API endpoint of a local node.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9001";

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    kind: String,
}

/// Turn a non-2xx node response into an error carrying the node's message.
pub async fn fail(resp: reqwest::Response, action: &str) -> anyhow::Result<()> {
    let status = resp.status();
    match resp.json::<ErrorResponse>().await {
        Ok(err) if err.kind.is_empty() => {
            anyhow::bail!("{} failed (HTTP {}): {}", action, status, err.error)
        }
        Ok(err) => anyhow::bail!(
            "{} failed (HTTP {}, {}): {}",
            action,
            status,
            err.kind,
            err.error
        ),
        Err(_) => anyhow::bail!("{} failed (HTTP {})", action, status),
    }
}

pub fn report_unreachable(endpoint: &str, err: &reqwest::Error) {
    println!("Could not reach node at {}", endpoint);
    println!("  Error: {}", err);
    println!();
    println!("Is the node running? Start it with: solarforge-node");
}

/// Render a role list as `author+maintainer`.
pub fn roles_label(roles: &[solarforge_core::Role]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use solarforge_core::Role;

    #[test]
    fn test_roles_label() {
        assert_eq!(roles_label(&[Role::Author, Role::Maintainer]), "author+maintainer");
        assert_eq!(roles_label(&[]), "");
    }
}

//! Integration test: issue and version forging across crates.
//!
//! Runs the forge and rollup engines from solarforge-settlement over the
//! in-memory stores, with real EVM address derivation from solarforge-crypto
//! and both the in-process and the HTTP settlement gateway.

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use solarforge_core::{
    Galaxy, Issue, LinearConversion, Patch, Role, SigningCredential, User, UserId, Version,
};
use solarforge_crypto::{AddressDeriver, EvmAddressDeriver};
use solarforge_settlement::adapters::{HttpGateway, LocalGateway, MemoryStore};
use solarforge_settlement::{
    ForgeEngine, ForgeError, ForgeStores, GalaxySpaceStore, RollupEngine, SettlementGateway,
};

const ALICE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const ALICE_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const BOB_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Helper: a store with one galaxy and three users holding keys.
fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_galaxy(Galaxy {
        id: "milky-way".into(),
        name: "Milky Way".into(),
        chain_namespace_id: Some("0x00000000000000000000000000000000000000aa".into()),
    });
    for (id, key) in [
        ("alice", ALICE_KEY.to_string()),
        ("bob", BOB_KEY.to_string()),
        ("carol", "0x".to_string() + &"0c".repeat(32)),
    ] {
        let mut user = User::new(id.into(), id);
        user.signing_credential = Some(SigningCredential::new(key));
        store.insert_user(user);
    }
    store
}

fn issue(id: &str, credits: u64, author: &str, contributor: Option<&str>) -> Issue {
    let mut issue = Issue::new(id.into());
    issue.credits = credits;
    issue.author = Some(author.into());
    issue.contributor = contributor.map(UserId::from);
    issue.galaxy = Some("milky-way".into());
    issue
}

fn version(id: &str, issues: &[&str]) -> Version {
    Version {
        id: id.into(),
        tag: Some("1.0.0".into()),
        patches: issues
            .iter()
            .map(|i| Patch {
                issue_id: (*i).into(),
            })
            .collect(),
    }
}

fn engines(
    store: Arc<MemoryStore>,
    gateway: Arc<dyn SettlementGateway>,
) -> (Arc<ForgeEngine>, RollupEngine) {
    let forge = Arc::new(ForgeEngine::new(
        ForgeStores::shared(store.clone()),
        gateway,
        Arc::new(EvmAddressDeriver::new()),
    ));
    let rollup = RollupEngine::new(forge.clone(), store);
    (forge, rollup)
}

// =========================================================================
// Version rollup
// =========================================================================

#[tokio::test]
async fn test_version_rollup_720_credits() {
    let store = seeded_store();
    store.insert_issue(issue("A", 720, "alice", Some("bob")));
    store.insert_issue(issue("B", 0, "carol", None));
    store.insert_version(version("V", &["A", "B"]));
    let gateway = Arc::new(LocalGateway::new());
    let (_forge, rollup) = engines(store.clone(), gateway.clone());

    let result = rollup.forge_version(&"V".into()).await;

    assert_eq!(result.issues_processed, 1);
    assert_eq!(result.credits_total, 720);
    assert_eq!(result.reward_total, 2);
    assert_eq!(result.participants.len(), 2);
    assert!(result.participants.iter().all(|p| p.reward_share == 0));

    let sent = gateway.submitted();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].issue_id.as_str(), "A");
    assert_eq!(sent[0].reward_total, 2);

    let a = store.issue(&"A".into()).unwrap();
    assert_eq!(a.credits, 0);
    assert_eq!(a.rewards, 2);
    assert!(a.settlement_marker.is_some());
}

#[tokio::test]
async fn test_version_rollup_1080_credits() {
    let store = seeded_store();
    store.insert_issue(issue("A", 1080, "alice", Some("bob")));
    store.insert_issue(issue("B", 0, "carol", None));
    store.insert_version(version("V", &["A", "B"]));
    let (_forge, rollup) = engines(store.clone(), Arc::new(LocalGateway::new()));

    let result = rollup.forge_version(&"V".into()).await;

    assert_eq!(result.issues_processed, 1);
    assert_eq!(result.credits_total, 1080);
    assert_eq!(result.reward_total, 3);
    assert_eq!(result.participants.len(), 2);
    assert!(result.participants.iter().all(|p| p.reward_share == 1));
    assert_eq!(store.user(&"alice".into()).unwrap().reward_balance, 1);
    assert_eq!(store.user(&"bob".into()).unwrap().reward_balance, 1);

    // Galaxy space reflects the new balances.
    let space = store.galaxy_space(&"milky-way".into()).await.unwrap();
    assert_eq!(space.len(), 2);
    assert!(space.iter().all(|s| s.reward_balance == 1));
}

#[tokio::test]
async fn test_rollup_is_idempotent_on_settled_issues() {
    let store = seeded_store();
    store.insert_issue(issue("A", 1080, "alice", Some("bob")));
    store.insert_version(version("V", &["A"]));
    let gateway = Arc::new(LocalGateway::new());
    let (_forge, rollup) = engines(store.clone(), gateway.clone());

    rollup.forge_version(&"V".into()).await;
    let second = rollup.forge_version(&"V".into()).await;

    // The settled issue holds no credits, so it is skipped entirely.
    assert_eq!(second.issues_processed, 0);
    assert_eq!(gateway.submission_count(), 1);
    assert_eq!(store.user(&"alice".into()).unwrap().reward_balance, 1);
}

#[tokio::test]
async fn test_rollup_skips_failed_issue_and_continues() {
    let store = seeded_store();
    store.insert_issue(issue("A", 1080, "alice", None));
    store.insert_issue(issue("B", 1080, "bob", Some("carol")));
    let mut orphan = issue("C", 1080, "carol", None);
    orphan.galaxy = Some("andromeda".into());
    store.insert_issue(orphan);
    store.insert_version(version("V", &["A", "B", "C"]));
    let gateway = Arc::new(LocalGateway::new());
    gateway.reject_issue("A".into(), "nonce too low");
    let (_forge, rollup) = engines(store.clone(), gateway);

    let result = rollup.forge_version(&"V".into()).await;

    assert_eq!(result.issues_processed, 1);
    assert_eq!(result.credits_total, 1080);
    let users: Vec<_> = result
        .participants
        .iter()
        .map(|p| (p.user_id.as_str(), p.roles.clone()))
        .collect();
    assert_eq!(
        users,
        vec![("bob", vec![Role::Author]), ("carol", vec![Role::Contributor])]
    );
    assert_eq!(store.issue(&"A".into()).unwrap().credits, 1080);
    assert_eq!(store.issue(&"C".into()).unwrap().credits, 1080);
    assert_eq!(store.user(&"alice".into()).unwrap().reward_balance, 0);
}

// =========================================================================
// Address derivation and policy
// =========================================================================

#[tokio::test]
async fn test_gateway_receives_derived_addresses() {
    let store = seeded_store();
    store.insert_issue(issue("A", 360, "alice", Some("bob")));
    let gateway = Arc::new(LocalGateway::new());
    let (forge, _rollup) = engines(store, gateway.clone());

    forge.forge_issue(&"A".into()).await.unwrap();

    let deriver = EvmAddressDeriver::new();
    let sent = &gateway.submitted()[0];
    assert_eq!(
        sent.participant_addresses,
        vec![ALICE_ADDRESS.to_string(), deriver.derive(BOB_KEY).unwrap()]
    );
    assert_eq!(
        sent.namespace,
        "0x00000000000000000000000000000000000000aa"
    );
}

#[tokio::test]
async fn test_custom_conversion_policy() {
    let store = seeded_store();
    store.insert_issue(issue("A", 100, "alice", None));
    let forge = ForgeEngine::new(
        ForgeStores::shared(store.clone()),
        Arc::new(LocalGateway::new()),
        Arc::new(EvmAddressDeriver::new()),
    )
    .with_policy(Arc::new(LinearConversion::new(10).unwrap()));

    let receipt = forge.forge_issue(&"A".into()).await.unwrap();
    assert_eq!(receipt.reward_total, 10);
    assert_eq!(receipt.participants[0].reward_share, 3);
}

// =========================================================================
// HTTP gateway
// =========================================================================

/// Spawn a fake settlement gateway. Namespaces starting with "0xbad" are
/// rejected; everything else settles with a fixed hash.
async fn spawn_fake_gateway() -> String {
    async fn settle(Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(body["command"], "solarForge");
        assert_eq!(body["params"]["models"][0]["kind"], "issue");
        let namespace = body["params"]["namespace"].as_str().unwrap_or_default();
        if namespace.starts_with("0xbad") {
            Json(json!({ "error": "namespace frozen" }))
        } else {
            Json(json!({ "params": { "transactionHash": "0xfeedbeef" } }))
        }
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/settle", post(settle));
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}/settle", addr)
}

#[tokio::test]
async fn test_http_gateway_settles() {
    let url = spawn_fake_gateway().await;
    let store = seeded_store();
    store.insert_issue(issue("A", 1080, "alice", Some("bob")));
    let gateway = Arc::new(HttpGateway::new(url, Duration::from_secs(5)).unwrap());
    let (forge, _rollup) = engines(store.clone(), gateway);

    let receipt = forge.forge_issue(&"A".into()).await.unwrap();

    assert_eq!(receipt.transaction_hash, "0xfeedbeef");
    assert_eq!(
        store.issue(&"A".into()).unwrap().settlement_marker.as_deref(),
        Some("0xfeedbeef")
    );
}

#[tokio::test]
async fn test_http_gateway_error_reply_compensates() {
    let url = spawn_fake_gateway().await;
    let store = seeded_store();
    store.insert_galaxy(Galaxy {
        id: "milky-way".into(),
        name: "Milky Way".into(),
        chain_namespace_id: Some("0xbad0".into()),
    });
    store.insert_issue(issue("A", 1080, "alice", Some("bob")));
    let gateway = Arc::new(HttpGateway::new(url, Duration::from_secs(5)).unwrap());
    let (forge, _rollup) = engines(store.clone(), gateway);

    let result = forge.forge_issue(&"A".into()).await;

    assert_eq!(
        result,
        Err(ForgeError::GatewayError("namespace frozen".into()))
    );
    let a = store.issue(&"A".into()).unwrap();
    assert_eq!(a.credits, 1080);
    assert_eq!(a.rewards, 0);
    assert!(a.settlement_marker.is_none());
    assert_eq!(store.user(&"alice".into()).unwrap().reward_balance, 0);
}

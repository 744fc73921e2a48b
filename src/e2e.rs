//! End-to-end scenarios spanning a real leader and real followers, bound to
//! OS-assigned ports and talking HTTP: a written key reaches every peer,
//! quorum gates the client response, and role mismatches are rejected.

use std::time::Duration;

use crate::api::HttpServer;
use crate::config::{NodeConfig, Role};

async fn spawn_follower() -> String {
    let config = NodeConfig {
        role: Role::Follower,
        listen_address: "127.0.0.1:0".into(),
        peers: vec![],
        write_quorum: 0,
        min_delay_ms: 0,
        max_delay_ms: 0,
        replicate_timeout_ms: 2000,
    };
    let server = HttpServer::new(config);
    let addr = server.start_ephemeral().await.unwrap();
    format!("http://{addr}")
}

async fn spawn_leader(peers: Vec<String>, write_quorum: usize) -> String {
    let config = NodeConfig {
        role: Role::Leader,
        listen_address: "127.0.0.1:0".into(),
        peers,
        write_quorum,
        min_delay_ms: 0,
        max_delay_ms: 0,
        replicate_timeout_ms: 2000,
    };
    let server = HttpServer::new(config);
    let addr = server.start_ephemeral().await.unwrap();
    format!("http://{addr}")
}

async fn get(client: &reqwest::Client, base: &str, key: &str) -> serde_json::Value {
    client
        .get(format!("{base}/get?key={key}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn single_write_replicates_to_all_followers() {
    let mut followers = Vec::new();
    for _ in 0..5 {
        followers.push(spawn_follower().await);
    }
    let leader = spawn_leader(followers.clone(), 3).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{leader}/set"))
        .json(&serde_json::json!({"key": "a", "value": "1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["replicas"], 5);
    assert_eq!(body["required"], 3);

    let leader_read = get(&client, &leader, "a").await;
    assert_eq!(leader_read["value"], "1");

    for follower in &followers {
        let read = get(&client, follower, "a").await;
        assert_eq!(read["value"], "1");
    }
}

#[tokio::test]
async fn read_of_absent_key_is_not_found() {
    let leader = spawn_leader(vec![], 0).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{leader}/get?key=ghost"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn write_to_a_follower_is_rejected() {
    let follower = spawn_follower().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{follower}/set"))
        .json(&serde_json::json!({"key": "a", "value": "1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn concurrent_distinct_key_writes_all_succeed_and_converge() {
    let mut followers = Vec::new();
    for _ in 0..5 {
        followers.push(spawn_follower().await);
    }
    let leader = spawn_leader(followers.clone(), 3).await;
    let client = reqwest::Client::new();

    let writes = (0..100).map(|i| {
        let client = client.clone();
        let leader = leader.clone();
        tokio::spawn(async move {
            client
                .post(format!("{leader}/set"))
                .json(&serde_json::json!({"key": format!("k{i}"), "value": format!("v{i}")}))
                .send()
                .await
                .unwrap()
                .json::<serde_json::Value>()
                .await
                .unwrap()
        })
    });

    let mut results = Vec::new();
    for write in writes {
        results.push(write.await.unwrap());
    }
    assert!(results.iter().all(|r| r["success"] == true));

    let status: serde_json::Value = client
        .get(format!("{leader}/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(status["key_count"].as_u64().unwrap() >= 100);

    // Background replication may still be in flight for the slowest peers;
    // give detached worker tasks a moment to finish applying every write.
    tokio::time::sleep(Duration::from_millis(200)).await;

    for follower in &followers {
        let status: serde_json::Value = client
            .get(format!("{follower}/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["key_count"].as_u64().unwrap(), 100);
    }
}

#[tokio::test]
async fn write_quorum_one_does_not_wait_for_every_peer() {
    let mut followers = Vec::new();
    for _ in 0..5 {
        followers.push(spawn_follower().await);
    }
    let leader = spawn_leader(followers.clone(), 1).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{leader}/set"))
        .json(&serde_json::json!({"key": "a", "value": "1"}))
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["replicas"].as_u64().unwrap() >= 1);
    assert_eq!(body["required"], 1);
}

#[tokio::test]
async fn unreachable_followers_yield_quorum_not_reached() {
    // Nothing listens on these addresses: every peer fails, so quorum can
    // never be met and the leader answers with a server error while still
    // keeping its own local commit.
    let peers = vec![
        "http://127.0.0.1:1".to_string(),
        "http://127.0.0.1:2".to_string(),
    ];
    let leader = spawn_leader(peers, 1).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{leader}/set"))
        .json(&serde_json::json!({"key": "a", "value": "1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Quorum not reached");

    // Local commit is not rolled back even though quorum failed.
    let read = get(&client, &leader, "a").await;
    assert_eq!(read["value"], "1");
}

//! Integration tests against a real store.
//!
//! Tests use testcontainers for portability - no external docker-compose required.
//!
//! # Running Tests
//! ```bash
//! # Requires Docker
//! cargo test --test integration -- --ignored
//! ```

use keyspace_router::{KvClient, KvConfig, KvError, KvOperations, Topology};
use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage, RunnableImage};

// =============================================================================
// Container Helpers
// =============================================================================

fn redis_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

/// Six-node cluster (3 primaries, 3 replicas) on host ports 7000-7005.
/// Ports are mapped 1:1 so the addresses the nodes announce in the slot
/// map are reachable from the host.
fn redis_cluster_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("grokzen/redis-cluster", "7.0.10")
        .with_env_var("IP", "0.0.0.0")
        .with_wait_for(WaitFor::message_on_stdout("[OK] All 16384 slots covered"));
    let runnable = CLUSTER_PORTS
        .into_iter()
        .fold(RunnableImage::from(image), |img, port| img.with_mapped_port((port, port)));
    docker.run(runnable)
}

const CLUSTER_PORTS: [u16; 6] = [7000, 7001, 7002, 7003, 7004, 7005];

fn cluster_config(database: &str) -> KvConfig {
    KvConfig {
        cluster_nodes: Some("127.0.0.1:7000,127.0.0.1:7001,127.0.0.1:7002".into()),
        database: database.into(),
        default_ttl_secs: 120,
        ..Default::default()
    }
}

fn standalone_config(port: u16) -> KvConfig {
    KvConfig {
        host: "127.0.0.1".into(),
        port,
        default_ttl_secs: 120,
        pool_size: 4,
        ..Default::default()
    }
}

// =============================================================================
// Standalone
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn standalone_lifecycle() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let config = standalone_config(redis.get_host_port_ipv4(6379));

    let mut client = KvClient::connect(&config).await.expect("connect");
    assert_eq!(client.topology(), Some(Topology::Standalone));

    client.set("greeting", "hello", None).await.unwrap();
    assert_eq!(client.get("greeting").await.unwrap().as_deref(), Some("hello"));
    let ttl = client.time_to_live("greeting").await.unwrap();
    assert!(ttl > 0 && ttl <= 120);

    client.batch_set(&[("a", "1"), ("b", "2")], Some(30)).await.unwrap();
    assert_eq!(
        client.batch_get(&["a", "b", "c"]).await.unwrap(),
        vec![Some("1".to_string()), Some("2".to_string()), None]
    );
    assert_eq!(client.delete(&["a", "b"]).await.unwrap(), 2);
    assert_eq!(client.delete(&["a", "b"]).await.unwrap(), 0);

    client.shutdown().await;
    client.shutdown().await;
    assert_eq!(client.get("greeting").await, Err(KvError::UninitializedClient));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn standalone_generic_dispatch() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let config = standalone_config(redis.get_host_port_ipv4(6379));

    let mut client = KvClient::connect(&config).await.expect("connect");

    client.execute("SET", &["k", "v"], Some(60)).await.unwrap();
    let ttl = client.time_to_live("k").await.unwrap();
    assert!(ttl > 0 && ttl <= 60);

    client.execute("RPUSH", &["queue", "job-1"], Some(60)).await.unwrap();
    assert_eq!(client.time_to_live("queue").await.unwrap(), -1);

    let err = client.execute("INCR", &["k"], None).await.unwrap_err();
    assert!(matches!(err, KvError::InvalidArgument(_)));

    client.shutdown().await;
}

#[tokio::test]
#[ignore] // Requires Docker
async fn standalone_lock_and_hashes() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let config = standalone_config(redis.get_host_port_ipv4(6379));

    let mut client = KvClient::connect(&config).await.expect("connect");

    let guard = client.acquire_lock("migrate", 10).await.unwrap().expect("lock");
    assert!(client.acquire_lock("migrate", 10).await.unwrap().is_none());
    assert!(client.release_lock(&guard).await.unwrap());

    client
        .hash_multi_set("user.1", &[("name", "alice"), ("role", "admin")], None)
        .await
        .unwrap();
    let mut fields = client.list_hash_fields("user.1").await.unwrap();
    fields.sort();
    assert_eq!(fields, vec!["name", "role"]);
    assert!(client.time_to_live("user.1").await.unwrap() > 0);

    client.flush_namespace().await.unwrap();
    assert!(client.list_keys("*").await.unwrap().is_empty());

    client.shutdown().await;
}

// =============================================================================
// Cluster
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker and free host ports 7000-7005
async fn cluster_fan_out_and_namespaces() {
    let docker = Cli::default();
    let _cluster = redis_cluster_container(&docker);

    // spread tenants so their hash tags land on different primaries
    let tenants = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];
    let mut clients = Vec::new();
    for tenant in tenants {
        let client = KvClient::connect(&cluster_config(tenant)).await.expect("cluster connect");
        assert_eq!(client.topology(), Some(Topology::Cluster));
        assert_eq!(client.namespace().unwrap(), tenant);

        client.batch_set(&[("x", tenant), ("y", tenant)], Some(60)).await.unwrap();
        assert_eq!(
            client.batch_get(&["y", "missing", "x"]).await.unwrap(),
            vec![Some(tenant.to_string()), None, Some(tenant.to_string())]
        );
        let ttl = client.time_to_live("x").await.unwrap();
        assert!(ttl > 0 && ttl <= 60);
        assert_eq!(client.list_keys("*").await.unwrap(), vec!["x", "y"]);
        clients.push(client);
    }

    // an untagged client sees every node's keys merged
    let mut global = KvClient::connect(&cluster_config("")).await.expect("cluster connect");
    let all = global.list_keys("*").await.unwrap();
    assert_eq!(all.len(), tenants.len() * 2);
    for tenant in tenants {
        assert!(all.contains(&format!("{{{}}}:x", tenant)));
    }

    clients[0].flush_namespace().await.unwrap();
    assert!(clients[0].list_keys("*").await.unwrap().is_empty());
    assert_eq!(global.list_keys("*").await.unwrap().len(), (tenants.len() - 1) * 2);
    assert_eq!(clients[1].get("x").await.unwrap().as_deref(), Some("bravo"));

    for client in &mut clients {
        client.shutdown().await;
    }
    global.shutdown().await;
}

#[tokio::test]
#[ignore] // Requires Docker and free host ports 7000-7005
async fn cluster_password_is_sent_on_connect() {
    let docker = Cli::default();
    let _cluster = redis_cluster_container(&docker);

    // the image runs without requirepass, so any AUTH is refused
    let config = KvConfig {
        password: Some("not-configured".into()),
        ..cluster_config("t")
    };
    assert!(KvClient::connect(&config).await.is_err());
}

// =============================================================================
// Failure scenarios
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn failure_store_stops_mid_session() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let config = standalone_config(redis.get_host_port_ipv4(6379));

    let mut client = KvClient::connect(&config).await.expect("connect");
    client.set("k", "v", None).await.unwrap();

    redis.stop();

    let err = client.get("k").await.unwrap_err();
    assert!(err.is_connection(), "expected connection error, got {:?}", err);

    client.shutdown().await;
}

//! End-to-end relay server tests against mock network capabilities

use async_trait::async_trait;
use futures_util::StreamExt;
use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::VersionedTransaction,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{timeout, Duration, Instant};

use txrelay::builder::{SignedTransaction, TransactionBuilder};
use txrelay::config::RelayConfig;
use txrelay::errors::{PipelineError, PipelineResult};
use txrelay::gateway::{BlockhashSource, Broadcaster};
use txrelay::relay::{RelayEnvelope, RelayServer, TransactionSource};
use txrelay::wallet::WalletManager;

struct FixedBlockhash(Hash);

#[async_trait]
impl BlockhashSource for FixedBlockhash {
    async fn latest_blockhash(&self) -> PipelineResult<Hash> {
        Ok(self.0)
    }
}

/// Builds a real signed transaction per request and records signing times
struct MockSource {
    builder: TransactionBuilder,
    payer: Pubkey,
    signed_at: Mutex<Vec<Instant>>,
    fail_first: AtomicU32,
}

impl MockSource {
    fn new(fail_first: u32) -> Self {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let builder = TransactionBuilder::new(
            WalletManager::from_keypair(keypair),
            Arc::new(FixedBlockhash(Hash::new_unique())),
        );
        Self {
            builder,
            payer,
            signed_at: Mutex::new(Vec::new()),
            fail_first: AtomicU32::new(fail_first),
        }
    }
}

#[async_trait]
impl TransactionSource for MockSource {
    async fn next_transaction(&self) -> PipelineResult<SignedTransaction> {
        if self.fail_first.load(Ordering::SeqCst) > 0 {
            self.fail_first.fetch_sub(1, Ordering::SeqCst);
            return Err(PipelineError::Blockhash("mock outage".to_string()));
        }

        let ix = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[9, 1, 2, 3],
            vec![AccountMeta::new(self.payer, true)],
        );
        let signed = self.builder.build_signed(&[ix]).await?;
        self.signed_at.lock().unwrap().push(signed.signed_at);
        Ok(signed)
    }
}

/// Blocks each build-sign cycle on a gate until the test releases it,
/// counting how many cycles have started
struct GatedSource {
    builder: TransactionBuilder,
    payer: Pubkey,
    started: AtomicU32,
    gate: tokio::sync::Semaphore,
}

impl GatedSource {
    fn new() -> Self {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let builder = TransactionBuilder::new(
            WalletManager::from_keypair(keypair),
            Arc::new(FixedBlockhash(Hash::new_unique())),
        );
        Self {
            builder,
            payer,
            started: AtomicU32::new(0),
            gate: tokio::sync::Semaphore::new(0),
        }
    }

    fn release_one(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl TransactionSource for GatedSource {
    async fn next_transaction(&self) -> PipelineResult<SignedTransaction> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| PipelineError::Relay("gate closed".to_string()))?;
        // each release lets exactly one cycle through
        permit.forget();

        let ix = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[9, 1, 2, 3],
            vec![AccountMeta::new(self.payer, true)],
        );
        self.builder.build_signed(&[ix]).await
    }
}

/// Records broadcast times and payloads
struct MockBroadcaster {
    broadcasts: Mutex<Vec<(Instant, VersionedTransaction)>>,
    notify: tokio::sync::Notify,
}

impl MockBroadcaster {
    fn new() -> Self {
        Self {
            broadcasts: Mutex::new(Vec::new()),
            notify: tokio::sync::Notify::new(),
        }
    }
}

#[async_trait]
impl Broadcaster for MockBroadcaster {
    async fn broadcast(&self, tx: &VersionedTransaction) -> PipelineResult<Signature> {
        self.broadcasts
            .lock()
            .unwrap()
            .push((Instant::now(), tx.clone()));
        self.notify.notify_one();
        Ok(tx.signatures[0])
    }
}

async fn start_server(
    source: Arc<MockSource>,
    broadcaster: Arc<MockBroadcaster>,
    delay_ms: u64,
) -> std::net::SocketAddr {
    let config = RelayConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        broadcast_delay_ms: delay_ms,
        max_inflight: 1,
    };

    let listener = RelayServer::bind(&config.bind_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = Arc::new(RelayServer::new(source, broadcaster, &config));
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    addr
}

#[tokio::test]
async fn test_connection_receives_envelope_then_broadcast() {
    let source = Arc::new(MockSource::new(0));
    let broadcaster = Arc::new(MockBroadcaster::new());
    let delay = Duration::from_millis(200);
    let addr = start_server(Arc::clone(&source), Arc::clone(&broadcaster), 200).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
        .await
        .expect("connect");

    // exactly one JSON envelope is pushed before broadcast
    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for envelope")
        .expect("stream ended")
        .expect("ws error");
    let envelope: RelayEnvelope = serde_json::from_str(msg.to_text().unwrap()).unwrap();

    assert_eq!(envelope.transactions.len(), 1);
    let packet = &envelope.transactions[0];
    assert_eq!(packet.meta.size as usize, packet.data.len());

    // relayed bytes are the serialized signed transaction
    let relayed: VersionedTransaction = bincode::deserialize(&packet.data).unwrap();
    assert_eq!(relayed.signatures.len(), 1);

    // broadcast fires after the delay, with the same transaction
    timeout(Duration::from_secs(5), broadcaster.notify.notified())
        .await
        .expect("timed out waiting for broadcast");

    let broadcasts = broadcaster.broadcasts.lock().unwrap();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].1.signatures, relayed.signatures);

    let signed_at = source.signed_at.lock().unwrap()[0];
    assert!(
        broadcasts[0].0.duration_since(signed_at) >= delay,
        "broadcast fired before the configured delay"
    );
}

#[tokio::test]
async fn test_failed_cycle_does_not_kill_server() {
    // first connection's build-sign cycle fails; the second succeeds
    let source = Arc::new(MockSource::new(1));
    let broadcaster = Arc::new(MockBroadcaster::new());
    let addr = start_server(Arc::clone(&source), Arc::clone(&broadcaster), 10).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
        .await
        .expect("connect");
    // connection closes without an envelope
    let msg = timeout(Duration::from_secs(5), ws.next()).await.unwrap();
    assert!(msg.is_none() || msg.unwrap().map(|m| m.is_close()).unwrap_or(true));

    // server is still accepting
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
        .await
        .expect("reconnect");
    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("ws error");
    let envelope: RelayEnvelope = serde_json::from_str(msg.to_text().unwrap()).unwrap();
    assert_eq!(envelope.transactions.len(), 1);
}

#[tokio::test]
async fn test_broadcast_survives_client_disconnect() {
    let source = Arc::new(MockSource::new(0));
    let broadcaster = Arc::new(MockBroadcaster::new());
    let addr = start_server(Arc::clone(&source), Arc::clone(&broadcaster), 100).await;

    {
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .expect("connect");
        let _ = timeout(Duration::from_secs(5), ws.next()).await;
        // client drops the connection immediately after the envelope
    }

    // broadcast is unconditional once signed
    timeout(Duration::from_secs(5), broadcaster.notify.notified())
        .await
        .expect("broadcast did not fire after client disconnect");
    assert_eq!(broadcaster.broadcasts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_inflight_cap_serializes_build_sign_cycles() {
    let source = Arc::new(GatedSource::new());
    let broadcaster = Arc::new(MockBroadcaster::new());
    let config = RelayConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        broadcast_delay_ms: 10,
        max_inflight: 1,
    };

    let listener = RelayServer::bind(&config.bind_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RelayServer::new(
        Arc::clone(&source) as Arc<dyn TransactionSource>,
        broadcaster,
        &config,
    ));
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    // two simultaneous connections race for the single permit
    let (mut ws_a, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
        .await
        .expect("connect a");
    let (mut ws_b, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
        .await
        .expect("connect b");

    // let both handshakes complete; only one cycle may have started
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        source.started.load(Ordering::SeqCst),
        1,
        "second build-sign cycle started while the first held the permit"
    );

    // releasing the first cycle frees its permit and admits the second
    source.release_one();
    let deadline = Instant::now() + Duration::from_secs(5);
    while source.started.load(Ordering::SeqCst) < 2 {
        assert!(
            Instant::now() < deadline,
            "second cycle never started after the first finished"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    source.release_one();

    // both clients end up with an envelope each
    for ws in [&mut ws_a, &mut ws_b] {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("ws error");
        let envelope: RelayEnvelope = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        assert_eq!(envelope.transactions.len(), 1);
    }
}

#[tokio::test]
async fn test_each_connection_gets_its_own_transaction() {
    let source = Arc::new(MockSource::new(0));
    let broadcaster = Arc::new(MockBroadcaster::new());
    let addr = start_server(Arc::clone(&source), Arc::clone(&broadcaster), 10).await;

    for _ in 0..2 {
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .expect("connect");
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("ws error");
        let envelope: RelayEnvelope = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        assert_eq!(envelope.transactions.len(), 1);
    }

    // two independent build-sign cycles ran
    assert_eq!(source.signed_at.lock().unwrap().len(), 2);
}

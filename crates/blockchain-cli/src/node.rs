//! Wires every collaborator crate into a running node (§5): storage, the
//! contract registry (`bank` registered at genesis), `State`, the gossip
//! substrate, the consensus worker, and the JSON-RPC server, then runs them
//! until Ctrl-C.

use crate::config::NodeConfig;
use anyhow::Context;
use bank::Bank;
use blockchain_consensus::worker;
use blockchain_core::{BlockStore, Genesis};
use blockchain_network::{GossipBroadcaster, GossipHandle, P2pGossip};
use blockchain_rpc::{EventIndex, RpcApi};
use blockchain_state::{LocalConsensusHost, State};
use blockchain_storage::memory::MemoryStore;
use blockchain_storage::rocks::RocksStore;
use blockchain_storage::KvStore;
use blockchain_wallet::Keypair;
use runtime::ContractManager;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let genesis = crate::config::load_genesis(&config.genesis_path)
        .with_context(|| format!("loading genesis from {}", config.genesis_path.display()))?;

    match &config.data_dir {
        Some(dir) => {
            let db = Arc::new(RocksStore::open(dir).with_context(|| format!("opening rocksdb at {}", dir.display()))?);
            run_with_storage(Arc::new(BlockStore::new(db, genesis.chain_id)), genesis, config).await
        }
        None => {
            tracing::warn!("no data_dir configured; running against an in-memory, non-durable store");
            let db = Arc::new(MemoryStore::new());
            run_with_storage(Arc::new(BlockStore::new(db, genesis.chain_id)), genesis, config).await
        }
    }
}

async fn run_with_storage<S: KvStore + 'static>(
    storage: Arc<BlockStore<S>>,
    genesis: Genesis,
    config: NodeConfig,
) -> anyhow::Result<()> {
    let contracts = Arc::new(ContractManager::new());
    let bank_addr = contracts.deploy(genesis.chain_owner, Arc::new(Bank::new(genesis.chain_owner, 18, genesis.chain_owner)));
    contracts.register_constructor(bank::selector::CONSTRUCT, bank::construct);
    tracing::info!(%bank_addr, "registered the bank contract at genesis");

    let events = Arc::new(EventIndex::new());
    let gossip = Arc::new(P2pGossip::new());
    let broadcaster = Arc::new(GossipBroadcaster::new(gossip.clone()));

    let state = Arc::new(
        State::with_broadcaster_and_sink(&genesis, storage, contracts, broadcaster, events.clone())
            .context("constructing the transition function from genesis")?,
    );

    let validator_keypair = config
        .validator_key_path
        .as_ref()
        .map(|path| {
            blockchain_wallet::keystore::load(path).with_context(|| format!("loading validator key from {}", path.display()))
        })
        .transpose()?;

    let rpc_gossip: Arc<dyn GossipHandle> = gossip.clone();
    let coinbase = validator_keypair.as_ref().map(|kp| kp.address()).unwrap_or(genesis.chain_owner);
    let api = Arc::new(RpcApi::new(state.clone(), events, coinbase).with_gossip(rpc_gossip));

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("binding rpc listener on {}", config.http_addr))?;
    tracing::info!(addr = %config.http_addr, "json-rpc listening");
    let server = axum::serve(listener, blockchain_rpc::server::router(api));

    let stop = Arc::new(AtomicBool::new(false));
    let worker_handle = match validator_keypair {
        Some(keypair) => {
            let host = Arc::new(LocalConsensusHost::new(state.clone(), *keypair.secret_key(), keypair.address()));
            tracing::info!(address = %keypair.address(), "running as a validating node");
            let worker_stop = stop.clone();
            Some(tokio::spawn(async move {
                worker::run(&*host, worker_stop).await;
            }))
        }
        None => {
            tracing::info!("no validator key configured; running as an RPC-only node");
            None
        }
    };

    tokio::select! {
        result = server => result.context("rpc server exited")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    if let Some(handle) = worker_handle {
        let _ = handle.await;
    }
    Ok(())
}

/// Builds a validator/account keypair and writes it to `out` as a plaintext
/// keystore file (§6 `keygen`).
pub fn keygen(out: &std::path::Path) -> anyhow::Result<()> {
    let keypair = Keypair::generate();
    blockchain_wallet::keystore::save(&keypair, out).with_context(|| format!("writing keystore to {}", out.display()))?;
    println!("generated validator key {} at {}", keypair.address(), out.display());
    Ok(())
}

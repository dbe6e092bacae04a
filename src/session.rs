//! The fusion protocol session.
//!
//! A session owns its coordinator connection for its whole life. The
//! handshake and tier allocation run synchronously on the initiating call;
//! after `FusionBegin` a single background task drives the round state
//! machine. Progress is published through single-writer watch channels
//! ([`FusionStatus`] per phase, [`PoolStatus`] while waiting), never through
//! shared mutable fields.
//!
//! Round outcomes are explicit values: a round either fuses, aborts (retry
//! next round), or quits the session. Errors abort the current round,
//! except transport failures, which are fatal. Repeated crypto mismatches
//! escalate to a quit since they suggest a hostile coordinator.

use crate::allocate::{allocate_outputs, ServerParams};
use crate::component::generate_components;
use crate::covert::{CovertSubmitter, CovertTarget};
use crate::crypto::blind::BlindSignatureRequest;
use crate::error::FusionError;
use crate::message::{ClientMessage, CovertMessage, ServerMessage};
use crate::params::{
    component_fee, input_component_size, COVERT_COMPONENT_WINDOW_END,
    COVERT_COMPONENT_WINDOW_START, COVERT_REVEAL_DEADLINE, COVERT_SIGNATURE_WINDOW_END,
    COVERT_SIGNATURE_WINDOW_START, COVERT_SPARE_CONNECTIONS, FUSION_RESULT_TIMEOUT,
    MAX_CLOCK_DISCREPANCY, MAX_EXCESS_FEE, OUTPUT_COMPONENT_SIZE, POOL_WAIT_TIMEOUT,
    PROTOCOL_VERSION, STANDARD_TIMEOUT, WARMUP_SLOP, WARMUP_TIME,
};
use crate::transport::{Connector, FusionStream};
use crate::tx::{construct_transaction, Transaction, SIGHASH_ALL};
use crate::types::{push_prefixed, sha256, short_hex, Coin, FusionStatus, PoolStatus};
use crate::wallet::{p2pkh_script, WalletBackend};
use crate::wire::FramedConn;
use rand::RngCore;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};

/// Rounds that may abort before the session gives up.
const MAX_ROUND_RETRIES: u32 = 5;

/// Crypto-tagged aborts tolerated before treating the coordinator as hostile.
const CRYPTO_ABORT_LIMIT: u32 = 3;

/// What to do when the server ends a round without signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipPolicy {
    /// Treat it as a terminal failure for this attempt.
    Quit,
    /// Treat it as an uninformative round; wait for the next one without
    /// consuming the retry budget.
    Neutral,
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// SOCKS5 proxy for the main and covert connections.
    pub proxy: Option<SocketAddr>,
    pub tls: bool,
    pub skip_policy: SkipPolicy,
    pub round_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy: Some(SocketAddr::from(([127, 0, 0, 1], 9050))),
            tls: true,
            skip_policy: SkipPolicy::Quit,
            round_retries: MAX_ROUND_RETRIES,
        }
    }
}

/// Terminal result of a fusion attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum FusionOutcome {
    /// The settlement transaction everyone signed.
    Fused(Transaction),
    /// No tier produced a feasible plan; nothing was attempted.
    Infeasible,
    /// Terminal failure for this attempt.
    Quit(String),
}

/// How a single round ended.
#[derive(Debug)]
enum RoundEnd {
    Fused(Transaction),
    Abort(String),
    /// The server revealed components but declined the signature phase.
    Skipped,
    Quit(String),
}

/// Handle to a running background session.
pub struct SessionHandle {
    pub task: JoinHandle<Result<FusionOutcome, FusionError>>,
    pub status: watch::Receiver<FusionStatus>,
    pub pools: watch::Receiver<Vec<PoolStatus>>,
}

pub struct FusionClient<W: WalletBackend> {
    conn: FramedConn<FusionStream>,
    config: ClientConfig,
    wallet: W,
    coins: Vec<Coin>,
    server: ServerParams,
    tier_outputs: BTreeMap<u64, Vec<u64>>,
    tier: u64,
    /// Output scripts bound to the chosen tier's amounts.
    outputs: Vec<(Vec<u8>, u64)>,
    last_hash: [u8; 32],
    t_fusion_begin: Option<Instant>,
    status_tx: watch::Sender<FusionStatus>,
    status_rx: watch::Receiver<FusionStatus>,
    pools_tx: watch::Sender<Vec<PoolStatus>>,
    pools_rx: watch::Receiver<Vec<PoolStatus>>,
}

impl<W: WalletBackend + 'static> FusionClient<W> {
    /// Dial the coordinator and complete the handshake and allocation.
    pub async fn connect(
        host: &str,
        port: u16,
        coins: Vec<Coin>,
        wallet: W,
        config: ClientConfig,
    ) -> Result<Self, FusionError> {
        let connector = Connector::new(config.proxy, config.tls);
        let stream = connector.connect(host, port).await?;
        tracing::info!("connected to coordinator {}:{}", host, port);
        Self::handshake(stream, coins, wallet, config).await
    }

    /// Run the handshake and allocation over an established stream.
    pub async fn handshake(
        stream: FusionStream,
        coins: Vec<Coin>,
        wallet: W,
        config: ClientConfig,
    ) -> Result<Self, FusionError> {
        let mut conn = FramedConn::new(stream);
        conn.send(&ClientMessage::ClientHello {
            version: PROTOCOL_VERSION.to_vec(),
            genesis_hash: wallet.params().genesis_hash,
        })
        .await?;

        let server = match conn.recv::<ServerMessage>(Duration::from_secs(5)).await? {
            Some(ServerMessage::ServerHello {
                num_components,
                component_feerate,
                min_excess_fee,
                max_excess_fee,
                tiers,
            }) => ServerParams {
                num_components,
                component_feerate,
                min_excess_fee,
                max_excess_fee,
                tiers,
            },
            Some(_) => return Err(FusionError::protocol("expected ServerHello")),
            None => return Err(FusionError::protocol("no greeting from server")),
        };
        tracing::info!(
            "server offers {} tiers, {} components, feerate {}",
            server.tiers.len(),
            server.num_components,
            server.component_feerate
        );

        let (status_tx, status_rx) = watch::channel(FusionStatus::NotFusing);
        let (pools_tx, pools_rx) = watch::channel(Vec::new());
        let mut client = Self {
            conn,
            config,
            wallet,
            coins,
            server,
            tier_outputs: BTreeMap::new(),
            tier: 0,
            outputs: Vec::new(),
            last_hash: [0; 32],
            t_fusion_begin: None,
            status_tx,
            status_rx,
            pools_tx,
            pools_rx,
        };

        if client.coins.is_empty() {
            tracing::info!("no coins supplied; session will not fuse");
            return Ok(client);
        }
        client.tier_outputs =
            allocate_outputs(&client.coins, &client.server, &mut rand::thread_rng());
        tracing::info!(
            "feasible tiers: {:?}",
            client.tier_outputs.keys().collect::<Vec<_>>()
        );
        Ok(client)
    }

    pub fn feasible_tiers(&self) -> Vec<u64> {
        self.tier_outputs.keys().copied().collect()
    }

    pub fn server_params(&self) -> &ServerParams {
        &self.server
    }

    pub fn status(&self) -> watch::Receiver<FusionStatus> {
        self.status_rx.clone()
    }

    pub fn pool_statuses(&self) -> watch::Receiver<Vec<PoolStatus>> {
        self.pools_rx.clone()
    }

    /// Spawn the background task that joins pools and runs rounds.
    pub fn fuse(self) -> SessionHandle {
        let status = self.status_rx.clone();
        let pools = self.pools_rx.clone();
        let task = tokio::spawn(self.run());
        SessionHandle {
            task,
            status,
            pools,
        }
    }

    /// Join the feasible pools, wait for a fusion to begin, then drive
    /// rounds until one fuses or the session quits.
    pub async fn run(mut self) -> Result<FusionOutcome, FusionError> {
        if self.coins.is_empty() || self.tier_outputs.is_empty() {
            return Ok(FusionOutcome::Infeasible);
        }

        let tiers = self.feasible_tiers();
        self.conn
            .send(&ClientMessage::JoinPools {
                tiers: tiers.clone(),
            })
            .await?;
        tracing::info!("registered for {} tiers", tiers.len());

        // Park until the server starts a fusion, surfacing pool fill levels
        // as they arrive.
        let (tier, covert_domain, covert_port, covert_ssl, server_time) = loop {
            match self.conn.recv::<ServerMessage>(POOL_WAIT_TIMEOUT).await? {
                None => continue,
                Some(ServerMessage::TierStatusUpdate { statuses }) => {
                    let pools: Vec<PoolStatus> = tiers
                        .iter()
                        .filter_map(|tier| {
                            statuses.get(tier).map(|s| PoolStatus {
                                tier: *tier,
                                players: s.players,
                                min_players: s.min_players,
                            })
                        })
                        .collect();
                    self.pools_tx.send_replace(pools);
                }
                Some(ServerMessage::FusionBegin {
                    tier,
                    covert_domain,
                    covert_port,
                    covert_ssl,
                    server_time,
                }) => break (tier, covert_domain, covert_port, covert_ssl, server_time),
                Some(other) => {
                    tracing::debug!("ignoring message while waiting: {:?}", other);
                }
            }
        };

        let covert = self
            .start_covert(tier, &covert_domain, covert_port, covert_ssl, server_time)
            .await?;

        let mut aborts = 0u32;
        let mut crypto_aborts = 0u32;
        let outcome = loop {
            let end = match self.run_round(&covert).await {
                Ok(end) => end,
                Err(e @ FusionError::Transport(_)) => {
                    covert.shutdown().await;
                    return Err(e);
                }
                Err(FusionError::Crypto(reason)) => {
                    crypto_aborts += 1;
                    RoundEnd::Abort(format!("crypto: {}", reason))
                }
                Err(FusionError::Protocol(reason)) | Err(FusionError::Timing(reason)) => {
                    RoundEnd::Abort(reason)
                }
            };

            match end {
                RoundEnd::Fused(tx) => break FusionOutcome::Fused(tx),
                RoundEnd::Quit(reason) => break FusionOutcome::Quit(reason),
                RoundEnd::Skipped => match self.config.skip_policy {
                    SkipPolicy::Quit => {
                        break FusionOutcome::Quit("server skipped the signature phase".into())
                    }
                    SkipPolicy::Neutral => {
                        tracing::info!("signature phase skipped; treating round as neutral");
                        covert.cancel_pending();
                        self.set_status(FusionStatus::NotFusing);
                    }
                },
                RoundEnd::Abort(reason) => {
                    covert.cancel_pending();
                    self.set_status(FusionStatus::NotFusing);
                    tracing::warn!("round aborted: {}", reason);
                    if crypto_aborts >= CRYPTO_ABORT_LIMIT {
                        break FusionOutcome::Quit(format!(
                            "{} crypto mismatches; giving up on this coordinator",
                            crypto_aborts
                        ));
                    }
                    aborts += 1;
                    if aborts > self.config.round_retries {
                        break FusionOutcome::Quit(format!("round retries exhausted: {}", reason));
                    }
                }
            }
        };

        covert.shutdown().await;
        match &outcome {
            FusionOutcome::Fused(_) => self.set_status(FusionStatus::Fused),
            _ => self.set_status(FusionStatus::NotFusing),
        }
        Ok(outcome)
    }

    /// Bind the chosen tier's outputs to real scripts, seed the hash chain,
    /// pre-warm covert connections, and sleep out the warm-up window.
    async fn start_covert(
        &mut self,
        tier: u64,
        covert_domain: &[u8],
        covert_port: u16,
        covert_ssl: bool,
        server_time: u64,
    ) -> Result<CovertSubmitter, FusionError> {
        let t_begin = Instant::now();
        if !self.tier_outputs.contains_key(&tier) {
            return Err(FusionError::protocol(format!(
                "server chose tier {} we never registered for",
                tier
            )));
        }
        self.tier = tier;
        let amounts = self.tier_outputs[&tier].clone();
        self.outputs = amounts
            .into_iter()
            .map(|amount| (self.wallet.fresh_change_script(), amount))
            .collect();

        let host = String::from_utf8(covert_domain.to_vec())
            .map_err(|_| FusionError::protocol("covert domain is not valid UTF-8"))?;
        self.last_hash = calc_initial_hash(tier, covert_domain, covert_port, covert_ssl, server_time);
        tracing::info!(
            "fusing at tier {} via covert endpoint {}:{}",
            tier,
            host,
            covert_port
        );

        let covert = CovertSubmitter::new(
            CovertTarget {
                host,
                port: covert_port,
                ssl: covert_ssl,
            },
            self.config.proxy,
            self.server.num_components as usize,
            COVERT_SPARE_CONNECTIONS,
        );
        covert.schedule_connections();
        self.t_fusion_begin = Some(t_begin);

        // Wake just before the first round is due.
        sleep_until(t_begin + WARMUP_TIME - WARMUP_SLOP - Duration::from_secs(1)).await;
        Ok(covert)
    }

    async fn run_round(&mut self, covert: &CovertSubmitter) -> Result<RoundEnd, FusionError> {
        let (round_pubkey, blind_nonce_points, server_time) = match self
            .conn
            .recv::<ServerMessage>(WARMUP_SLOP * 2 + STANDARD_TIMEOUT)
            .await?
        {
            None => return Ok(RoundEnd::Abort("no round start before deadline".into())),
            Some(ServerMessage::StartRound {
                round_pubkey,
                blind_nonce_points,
                server_time,
            }) => (round_pubkey, blind_nonce_points, server_time),
            Some(_) => return Err(FusionError::protocol("expected StartRound")),
        };

        // All covert phases are measured from this instant.
        let covert_t0 = Instant::now();

        let skew = server_time as i64 - unix_now() as i64;
        if skew.unsigned_abs() > MAX_CLOCK_DISCREPANCY {
            return Err(FusionError::timing(format!(
                "clock discrepancy {}s exceeds {}s",
                skew, MAX_CLOCK_DISCREPANCY
            )));
        }

        // Only the first round after FusionBegin checks the warm-up window.
        if let Some(t_begin) = self.t_fusion_begin.take() {
            let lag =
                covert_t0.saturating_duration_since(t_begin).as_secs_f64() - WARMUP_TIME.as_secs_f64();
            if lag.abs() > WARMUP_SLOP.as_secs_f64() {
                return Err(FusionError::timing(format!(
                    "warm-up period off by {:.1}s",
                    lag
                )));
            }
        }

        // Recompute the fee picture from scratch; the plan is stale data.
        let input_fees: u64 = self
            .coins
            .iter()
            .map(|c| {
                component_fee(
                    input_component_size(c.pubkey.len()),
                    self.server.component_feerate,
                )
            })
            .sum();
        let output_fees: u64 = self.outputs.len() as u64
            * component_fee(OUTPUT_COMPONENT_SIZE, self.server.component_feerate);
        let sum_in: u64 = self.coins.iter().map(|c| c.value).sum();
        let sum_out: u64 = self.outputs.iter().map(|(_, value)| *value).sum();
        let excess_fee =
            sum_in as i128 - sum_out as i128 - input_fees as i128 - output_fees as i128;
        if excess_fee > MAX_EXCESS_FEE as i128 {
            return Ok(RoundEnd::Quit(format!(
                "excess fee {} exceeds the {} cap",
                excess_fee, MAX_EXCESS_FEE
            )));
        }
        if excess_fee < 0 {
            return Err(FusionError::protocol("outputs exceed inputs"));
        }

        if blind_nonce_points.len() as u64 != self.server.num_components {
            return Err(FusionError::protocol(format!(
                "{} blind nonce points for a budget of {} components",
                blind_nonce_points.len(),
                self.server.num_components
            )));
        }

        let num_blanks =
            self.server.num_components as i64 - self.coins.len() as i64 - self.outputs.len() as i64;
        if num_blanks < 0 {
            return Err(FusionError::protocol("component budget below inputs + outputs"));
        }

        self.set_status(FusionStatus::GeneratingComponents);
        let generated = generate_components(
            num_blanks as u64,
            &self.coins,
            &self.outputs,
            self.server.component_feerate,
        );
        if generated.sum_amounts != excess_fee {
            return Err(FusionError::crypto(format!(
                "component amounts sum to {}, expected excess fee {}",
                generated.sum_amounts, excess_fee
            )));
        }
        if generated.components.len() != blind_nonce_points.len() {
            return Err(FusionError::crypto(format!(
                "{} components for {} nonce points",
                generated.components.len(),
                blind_nonce_points.len()
            )));
        }

        self.set_status(FusionStatus::MakingCommitments);
        let mut requests = Vec::with_capacity(generated.components.len());
        let mut request_bytes = Vec::with_capacity(generated.components.len());
        let mut my_commitments = Vec::with_capacity(generated.components.len());
        let mut my_components = Vec::with_capacity(generated.components.len());
        for (component, nonce_point) in generated.components.iter().zip(&blind_nonce_points) {
            let request =
                BlindSignatureRequest::new(&round_pubkey, nonce_point, sha256(&component.comp_ser))?;
            request_bytes.push(request.request());
            requests.push(request);
            my_commitments.push(component.commit_ser.clone());
            my_components.push(component.comp_ser.clone());
        }

        let mut random_number = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut random_number);

        self.set_status(FusionStatus::SubmittingCommitments);
        self.conn
            .send(&ClientMessage::PlayerCommit {
                random_number_commitment: sha256(&random_number),
                pedersen_total_nonce: generated.pedersen_total_nonce.to_bytes(),
                excess_fee: excess_fee as u64,
                initial_commitments: my_commitments.clone(),
                blind_sig_requests: request_bytes,
            })
            .await?;

        // Blind signatures must be in hand before the covert window opens.
        let scalars = match self
            .conn
            .recv::<ServerMessage>(remaining(covert_t0, COVERT_COMPONENT_WINDOW_START))
            .await?
        {
            None => return Ok(RoundEnd::Abort("no blind signature response".into())),
            Some(ServerMessage::BlindSigResponses { scalars }) => scalars,
            Some(_) => return Err(FusionError::protocol("expected BlindSigResponses")),
        };
        if scalars.len() != requests.len() {
            return Err(FusionError::protocol(format!(
                "{} blind signature scalars for {} requests",
                scalars.len(),
                requests.len()
            )));
        }

        self.set_status(FusionStatus::ProducingBlindSignatures);
        let mut blind_sigs = Vec::with_capacity(scalars.len());
        for (request, scalar) in requests.iter().zip(&scalars) {
            blind_sigs.push(request.finalize(scalar)?);
        }

        if covert_t0.elapsed() > COVERT_COMPONENT_WINDOW_START {
            tracing::warn!("reached the covert component phase late");
        }
        sleep_until(covert_t0 + COVERT_COMPONENT_WINDOW_START).await;

        let covert_components: Vec<CovertMessage> = my_components
            .iter()
            .zip(&blind_sigs)
            .map(|(component, sig)| CovertMessage::Component {
                round_pubkey,
                component: component.clone(),
                signature: sig.to_vec(),
            })
            .collect();
        self.set_status(FusionStatus::CovertlySendingComponents);
        covert.schedule_submissions(
            covert_components,
            covert_t0 + COVERT_COMPONENT_WINDOW_START,
            covert_t0 + COVERT_COMPONENT_WINDOW_END,
        );

        self.set_status(FusionStatus::ReceivingAllCommitments);
        let all_commitments = match self
            .conn
            .recv::<ServerMessage>(COVERT_REVEAL_DEADLINE)
            .await?
        {
            None => return Ok(RoundEnd::Abort("commitment list never arrived".into())),
            Some(ServerMessage::AllCommitments {
                initial_commitments,
            }) => initial_commitments,
            Some(_) => return Err(FusionError::protocol("expected AllCommitments")),
        };
        for commitment in &my_commitments {
            if !all_commitments.contains(commitment) {
                return Err(FusionError::protocol(
                    "own commitment missing from the commitment list",
                ));
            }
        }

        self.set_status(FusionStatus::ReceivingAllComponents);
        let (all_components, session_hash, skip_signatures) = match self
            .conn
            .recv::<ServerMessage>(COVERT_REVEAL_DEADLINE)
            .await?
        {
            None => return Ok(RoundEnd::Abort("component list never arrived".into())),
            Some(ServerMessage::ShareCovertComponents {
                components,
                session_hash,
                skip_signatures,
            }) => (components, session_hash, skip_signatures),
            Some(_) => return Err(FusionError::protocol("expected ShareCovertComponents")),
        };
        if covert_t0.elapsed() > COVERT_REVEAL_DEADLINE {
            return Err(FusionError::timing("component reveal arrived too slowly"));
        }
        for component in &my_components {
            if !all_components.contains(component) {
                return Err(FusionError::protocol("own component missing from the reveal"));
            }
        }

        let round_hash = calc_round_hash(
            &self.last_hash,
            &round_pubkey,
            server_time,
            &all_commitments,
            &all_components,
        );
        if let Some(server_hash) = session_hash {
            if server_hash != round_hash {
                return Err(FusionError::crypto("session hash mismatch"));
            }
        }
        tracing::debug!("session hash {}", short_hex(&round_hash));
        self.last_hash = round_hash;

        if skip_signatures {
            return Ok(RoundEnd::Skipped);
        }

        self.set_status(FusionStatus::Signing);
        let tx = construct_transaction(&all_components, &round_hash)?;
        let mut signature_messages = Vec::new();
        for (index, input) in tx.inputs.iter().enumerate() {
            let Some(signature) = self.wallet.sign_input(
                &tx,
                index,
                &input.pubkey,
                &p2pkh_script(&input.pubkey),
                input.amount,
                SIGHASH_ALL,
            ) else {
                continue;
            };
            signature_messages.push(CovertMessage::Signature {
                round_pubkey,
                txsignature: signature.to_vec(),
                which_input: index as u32,
            });
        }
        tracing::info!("signed {} of {} inputs", signature_messages.len(), tx.inputs.len());

        self.set_status(FusionStatus::CovertlySendingSignatures);
        covert.schedule_submissions(
            signature_messages,
            covert_t0 + COVERT_SIGNATURE_WINDOW_START,
            covert_t0 + COVERT_SIGNATURE_WINDOW_END,
        );

        // The terminal wait: a missing result here is a definite failure,
        // not a retry.
        match self.conn.recv::<ServerMessage>(FUSION_RESULT_TIMEOUT).await? {
            None => Ok(RoundEnd::Quit("no fusion result".into())),
            Some(ServerMessage::FusionResult { ok: true }) => {
                self.set_status(FusionStatus::Fused);
                tracing::info!("fusion complete: tx {}", short_hex(&tx.txid()));
                Ok(RoundEnd::Fused(tx))
            }
            Some(ServerMessage::FusionResult { ok: false }) => {
                Ok(RoundEnd::Quit("coordinator rejected the round".into()))
            }
            Some(_) => Err(FusionError::protocol("expected FusionResult")),
        }
    }

    fn set_status(&self, status: FusionStatus) {
        self.status_tx.send_replace(status);
    }
}

/// Time left until `offset` past `t0`, floored at zero.
fn remaining(t0: Instant, offset: Duration) -> Duration {
    (t0 + offset).saturating_duration_since(Instant::now())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}

/// Hash binding the session parameters announced at `FusionBegin`. Seeds
/// the per-session hash chain.
pub fn calc_initial_hash(
    tier: u64,
    covert_domain: &[u8],
    covert_port: u16,
    covert_ssl: bool,
    server_time: u64,
) -> [u8; 32] {
    let mut buf = Vec::new();
    push_prefixed(&mut buf, b"Cash Fusion Session");
    push_prefixed(&mut buf, PROTOCOL_VERSION);
    push_prefixed(&mut buf, &tier.to_be_bytes());
    push_prefixed(&mut buf, covert_domain);
    push_prefixed(&mut buf, &(covert_port as u32).to_be_bytes());
    push_prefixed(&mut buf, &[covert_ssl as u8]);
    push_prefixed(&mut buf, &server_time.to_be_bytes());
    sha256(&buf)
}

/// Chain hash over one completed round's public data. Anyone can recompute
/// it from the round's revealed lists and detect tampering or replay.
pub fn calc_round_hash(
    last_hash: &[u8; 32],
    round_pubkey: &[u8; 32],
    server_time: u64,
    commitments: &[Vec<u8>],
    components: &[Vec<u8>],
) -> [u8; 32] {
    let mut buf = Vec::new();
    push_prefixed(&mut buf, b"Cash Fusion Round");
    push_prefixed(&mut buf, last_hash);
    push_prefixed(&mut buf, round_pubkey);
    push_prefixed(&mut buf, &server_time.to_be_bytes());
    push_prefixed(&mut buf, &list_hash(commitments));
    push_prefixed(&mut buf, &list_hash(components));
    sha256(&buf)
}

fn list_hash(items: &[Vec<u8>]) -> [u8; 32] {
    let mut buf = Vec::new();
    for item in items {
        push_prefixed(&mut buf, item);
    }
    sha256(&buf)
}

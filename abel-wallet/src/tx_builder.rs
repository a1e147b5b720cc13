//! Transaction Builder
//!
//! Accumulates inputs, outputs and a fee, then [`TxBuilder::build`] runs two
//! gates before asking the crypto engine for an unsigned transaction:
//!
//! 1. **Verification**: every input is re-fetched from the chain viewer by
//!    its [`CoinId`]. Owner and value must match what the caller supplied;
//!    the chain's coin then replaces the caller's.
//! 2. **Ring assembly**: the rings of all input heights are merged, sorted,
//!    and fetched as raw blocks. Every ring block must be safe.
//!
//! Any failure aborts the build and leaves the builder in
//! [`BuildState::Failed`] with the phase and reason.

use std::{collections::BTreeSet, fmt};
use tracing::{debug, error, info};

use crate::{
    address::Address,
    chain_viewer::ChainViewer,
    clock::{Clock, SystemClock},
    coin::Coin,
    crypto::{CryptoEngine, RingBlock, TxInDesc, TxOutDesc, UnsignedRawTx, UnsignedTxRequest},
    error::{Result, WalletError},
    ring::ring_heights,
    rpc::{BlockRef, ChainRpc},
};

/// Fee used when none is set explicitly.
pub const DEFAULT_TX_FEE: u64 = 1_000_000;

/// The step of [`TxBuilder::build`] that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildPhase {
    Verifying,
    RingAssembling,
    Assembling,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildPhase::Verifying => "input verification",
            BuildPhase::RingAssembling => "ring assembly",
            BuildPhase::Assembling => "transaction assembly",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildState {
    Accumulating,
    Verifying,
    RingAssembling,
    Ready,
    Failed { phase: BuildPhase, reason: String },
}

pub struct TxBuilder<'a, R, E, C = SystemClock> {
    viewer: &'a mut ChainViewer<R, E, C>,
    inputs: Vec<Coin>,
    outputs: Vec<TxOutDesc>,
    ring_blocks: Vec<RingBlock>,
    fee: u64,
    state: BuildState,
}

impl<'a, R: ChainRpc, E: CryptoEngine, C: Clock> TxBuilder<'a, R, E, C> {
    pub fn new(viewer: &'a mut ChainViewer<R, E, C>) -> Self {
        Self {
            viewer,
            inputs: Vec::new(),
            outputs: Vec::new(),
            ring_blocks: Vec::new(),
            fee: DEFAULT_TX_FEE,
            state: BuildState::Accumulating,
        }
    }

    /// Add a coin to spend. Only its id is trusted; owner and value are
    /// checked against the chain at build time.
    pub fn add_input(&mut self, coin: Coin) -> &mut Self {
        self.inputs.push(coin);
        self.state = BuildState::Accumulating;
        self
    }

    pub fn add_inputs(&mut self, coins: impl IntoIterator<Item = Coin>) -> &mut Self {
        for coin in coins {
            self.add_input(coin);
        }
        self
    }

    pub fn add_output(&mut self, address: Address, value: u64) -> &mut Self {
        self.outputs.push(TxOutDesc { address, value });
        self.state = BuildState::Accumulating;
        self
    }

    pub fn add_outputs(&mut self, outputs: impl IntoIterator<Item = TxOutDesc>) -> &mut Self {
        self.outputs.extend(outputs);
        self.state = BuildState::Accumulating;
        self
    }

    pub fn set_fee(&mut self, fee: u64) -> &mut Self {
        self.fee = fee;
        self
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn inputs(&self) -> &[Coin] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutDesc] {
        &self.outputs
    }

    /// Ring blocks fetched by the last successful ring assembly.
    pub fn ring_blocks(&self) -> &[RingBlock] {
        &self.ring_blocks
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn build(&mut self) -> Result<UnsignedRawTx> {
        self.state = BuildState::Verifying;
        let verified = self
            .verify_inputs()
            .map_err(|e| self.fail(BuildPhase::Verifying, e))?;
        self.inputs = verified;

        self.state = BuildState::RingAssembling;
        let ring_blocks = self
            .assemble_ring()
            .map_err(|e| self.fail(BuildPhase::RingAssembling, e))?;
        self.ring_blocks = ring_blocks;

        let request = self
            .request()
            .map_err(|e| self.fail(BuildPhase::Assembling, e))?;
        let unsigned = self
            .viewer
            .engine()
            .build_unsigned_tx(&request)
            .map_err(|e| self.fail(BuildPhase::Assembling, e.into()))?;

        info!(
            "Built unsigned tx: {} inputs, {} outputs, {} ring blocks, {} signers",
            request.inputs.len(),
            request.outputs.len(),
            request.ring_blocks.len(),
            unsigned.signers.len()
        );
        self.state = BuildState::Ready;
        Ok(unsigned)
    }

    fn fail(&mut self, phase: BuildPhase, err: WalletError) -> WalletError {
        error!("Tx build failed during {}: {}", phase, err);
        self.state = BuildState::Failed {
            phase,
            reason: err.to_string(),
        };
        err
    }

    /// Chain-authoritative replacements for every input, in order.
    fn verify_inputs(&self) -> Result<Vec<Coin>> {
        if self.inputs.is_empty() {
            return Err(WalletError::NoInputs);
        }

        let mut verified = Vec::with_capacity(self.inputs.len());
        for given in &self.inputs {
            let on_chain = self
                .viewer
                .get_coin(&given.id)?
                .ok_or(WalletError::CoinNotFound(given.id))?;

            if on_chain.owner_short_address != given.owner_short_address {
                return Err(WalletError::CoinOwnerMismatch {
                    coin_id: given.id,
                    given: given.owner_short_address,
                    on_chain: on_chain.owner_short_address,
                });
            }
            if on_chain.value != given.value {
                return Err(WalletError::CoinValueMismatch {
                    coin_id: given.id,
                    given: given.value,
                    on_chain: on_chain.value,
                });
            }
            if !on_chain.is_complete() {
                return Err(WalletError::IncompleteCoin(given.id));
            }
            verified.push(on_chain);
        }
        Ok(verified)
    }

    fn assemble_ring(&mut self) -> Result<Vec<RingBlock>> {
        let mut heights = BTreeSet::new();
        for coin in &self.inputs {
            let ring = ring_heights(coin.block_height)
                .ok_or(WalletError::RingBlockUnavailable(coin.block_height))?;
            heights.extend(ring);
        }
        debug!("Ring block heights: {:?}", heights);

        let mut blocks = Vec::with_capacity(heights.len());
        for height in heights {
            let block = self
                .viewer
                .get_safe_block_info(height)?
                .ok_or(WalletError::RingBlockUnavailable(height))?;
            let data = self
                .viewer
                .rpc()
                .get_block_bytes(BlockRef::Hash(block.hash))?
                .ok_or(WalletError::RingBlockUnavailable(height))?;
            blocks.push(RingBlock { height, data });
        }
        Ok(blocks)
    }

    fn request(&self) -> Result<UnsignedTxRequest> {
        let inputs = self
            .inputs
            .iter()
            .map(|coin| TxInDesc::from_coin(coin).ok_or(WalletError::IncompleteCoin(coin.id)))
            .collect::<Result<Vec<_>>>()?;
        Ok(UnsignedTxRequest {
            inputs,
            outputs: self.outputs.clone(),
            ring_blocks: self.ring_blocks.clone(),
            fee: self.fee,
        })
    }
}

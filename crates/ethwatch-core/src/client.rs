//! The eth client contract the poller depends on.

use async_trait::async_trait;

use crate::error::WatchError;
use crate::types::Block;

/// The two `eth_*` calls needed to follow the chain tip.
#[async_trait]
pub trait EthRpcClient: Send + Sync {
    /// `eth_blockNumber` - the node's current chain height.
    async fn block_number(&self) -> Result<u64, WatchError>;

    /// `eth_getBlockByNumber(number, true)` - `None` if the node has not produced it yet.
    async fn block_by_number(&self, number: u64) -> Result<Option<Block>, WatchError>;
}

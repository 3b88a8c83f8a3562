//! Wire format for direct peer links, and transport addressing.
//!
//! Everything that crosses a link is one [`WireMessage`]. The enum is closed:
//! adding a message kind is a compile-time change, and every dispatch site
//! matches exhaustively. Frames that do not decode (unknown kind, truncated
//! JSON) are ignored at the receive site — a bad frame never tears the link
//! down.

use serde::{Deserialize, Serialize};

use crate::types::{Message, Post};

/// Prefix for every transport address. The address of account `id` is
/// `linkup-p2p-<id>` — derivable with no directory lookup, because the
/// registry is eventually consistent and may be stale.
pub const ADDRESS_PREFIX: &str = "linkup-p2p-";

/// Account-id prefix for synthetic peers (assistant-simulated personas).
/// These never claim a transport address and must not be dialed.
pub const SYNTHETIC_PREFIX: &str = "persona-";

/// One frame on a direct peer link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WireMessage {
    /// A chat message for an existing or implied direct chat.
    Message { chat_id: String, message: Message },
    /// Ephemeral typing indicator. Never persisted.
    Typing {
        chat_id: String,
        user_id: String,
        is_typing: bool,
    },
    /// A newly published feed post, pushed to open links.
    Post { post: Post },
}

impl WireMessage {
    /// Serialize for the wire. Infallible for this enum's shapes.
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("wire message serialization cannot fail")
    }

    /// Decode a frame. `None` for anything unrecognized — callers drop it.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }
}

/// Derive the canonical transport address for an account id.
pub fn transport_address(account_id: &str) -> String {
    format!("{ADDRESS_PREFIX}{account_id}")
}

/// Fallback address for a duplicate local session of the same account.
/// A peer bound here is not reachable via the canonical address — a known
/// limitation, reported in status rather than hidden.
pub fn alt_address(account_id: &str, n: u32) -> String {
    format!("{ADDRESS_PREFIX}{account_id}-alt{n}")
}

/// Recover an account id from a transport address by stripping the prefix.
/// `None` if the address was not minted by [`transport_address`].
pub fn peer_id_from_address(address: &str) -> Option<&str> {
    address.strip_prefix(ADDRESS_PREFIX)
}

/// Synthetic peers have no running client instance behind them.
pub fn is_synthetic(account_id: &str) -> bool {
    account_id.starts_with(SYNTHETIC_PREFIX)
}

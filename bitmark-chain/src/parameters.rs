//! Chain-level parameters.

use serde::{Deserialize, Serialize};

/// The network a node participates in.
///
/// Addresses carry a network flag, and a node refuses records minted for the
/// other network.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// The production chain.
    Live,
    /// The test chain.
    Testing,
}

impl Network {
    pub fn is_test(self) -> bool {
        self == Network::Testing
    }
}

impl Default for Network {
    fn default() -> Network {
        Network::Live
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Live => f.write_str("live"),
            Network::Testing => f.write_str("testing"),
        }
    }
}

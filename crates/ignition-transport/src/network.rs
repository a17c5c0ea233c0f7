//! Chain identification helpers.

/// Chain ids of local development nodes.
pub const LOCAL_CHAIN_IDS: [u64; 2] = [31337, 1337];

/// Confirmation depth used on public chains unless configured otherwise.
pub const DEFAULT_REQUIRED_CONFIRMATIONS: u64 = 5;

pub fn is_local_chain(chain_id: u64) -> bool {
    LOCAL_CHAIN_IDS.contains(&chain_id)
}

/// Local nodes mine on demand, so a single confirmation is final there.
pub fn default_required_confirmations(chain_id: u64) -> u64 {
    if is_local_chain(chain_id) {
        1
    } else {
        DEFAULT_REQUIRED_CONFIRMATIONS
    }
}

pub fn chain_name(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "mainnet",
        10 => "optimism",
        137 => "polygon",
        8453 => "base",
        17000 => "holesky",
        42161 => "arbitrum",
        11155111 => "sepolia",
        31337 => "hardhat",
        1337 => "localhost",
        _ => "unknown",
    }
}

pub fn infer_network_from_url(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    if lower.contains("localhost") || lower.contains("127.0.0.1") {
        Some("localhost")
    } else if lower.contains("sepolia") {
        Some("sepolia")
    } else if lower.contains("holesky") {
        Some("holesky")
    } else if lower.contains("mainnet") {
        Some("mainnet")
    } else {
        None
    }
}

pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

// Path segment appended to the dapp's callback URL; callbacks without it are
// not ours.
pub const MWP_RESPONSE_PATH: &str = "mobile-wallet-protocol";

pub const IV_LENGTH: usize = 12;
pub const KEY_LENGTH: usize = 32;

// Longest iv + cipherText (base64 characters) sent in a single URL. Anything
// larger is split into segments of SEGMENT_SIZE characters.
pub const MAX_ENCRYPTED_PAYLOAD_LENGTH: usize = 1800;
pub const SEGMENT_SIZE: usize = 1800;
pub const SEGMENT_DELIMITER: char = ':';

pub const DEFAULT_APP_NAME: &str = "Dapp";
pub const DEFAULT_CHAIN_ID: u64 = 1;
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_SEGMENT_DISMISS_DELAY_MS: u64 = 750;

pub const KEY_MANAGER_NAMESPACE: &str = "KeyManager";
pub const CLIENT_NAMESPACE: &str = "MWPClient";

pub const OWN_PRIVATE_KEY: &str = "ownPrivateKey";
pub const OWN_PUBLIC_KEY: &str = "ownPublicKey";
pub const PEER_PUBLIC_KEY: &str = "peerPublicKey";

pub const ACCOUNTS_KEY: &str = "accounts";
pub const ACTIVE_CHAIN_KEY: &str = "activeChain";
pub const AVAILABLE_CHAINS_KEY: &str = "availableChains";
pub const WALLET_CAPABILITIES_KEY: &str = "walletCapabilities";

pub const SDK_VERSION_HEADER: &str = "X-Mwp-Sdk-Version";

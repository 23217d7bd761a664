//! L1 action signing.
//!
//! An action is msgpack-encoded, suffixed with the nonce and vault flag, and
//! hashed into a connection id. The connection id is then signed as the
//! EIP-712 struct `Agent(string source,bytes32 connectionId)`.

use crate::protocol::ExchangeAction;
use alloy::primitives::{keccak256, Address, Signature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol_types::{eip712_domain, Eip712Domain};
use hypergate_core::TradingError;
use serde::{ser::SerializeStruct, Serializer};

const AGENT_TYPE: &str = "Agent(string source,bytes32 connectionId)";
const L1_CHAIN_ID: u64 = 1337;

fn l1_domain() -> Eip712Domain {
    eip712_domain! {
        name: "Exchange",
        version: "1",
        chain_id: L1_CHAIN_ID,
        verifying_contract: Address::ZERO,
    }
}

/// Hash an action with its nonce into the connection id that gets signed.
pub fn action_hash(
    action: &ExchangeAction,
    nonce: u64,
    vault_address: Option<Address>,
) -> Result<B256, TradingError> {
    let mut bytes = rmp_serde::to_vec_named(action)
        .map_err(|e| TradingError::Signing(format!("msgpack encoding failed: {}", e)))?;
    bytes.extend(nonce.to_be_bytes());
    match vault_address {
        Some(vault) => {
            bytes.push(1);
            bytes.extend_from_slice(vault.as_slice());
        }
        None => bytes.push(0),
    }
    Ok(keccak256(bytes))
}

/// EIP-712 digest of the `Agent` struct for `connection_id`.
pub fn agent_signing_hash(connection_id: B256, is_mainnet: bool) -> B256 {
    let source = if is_mainnet { "a" } else { "b" };

    let mut encoded = Vec::with_capacity(96);
    encoded.extend_from_slice(keccak256(AGENT_TYPE.as_bytes()).as_slice());
    encoded.extend_from_slice(keccak256(source.as_bytes()).as_slice());
    encoded.extend_from_slice(connection_id.as_slice());
    let struct_hash = keccak256(&encoded);

    let mut digest = Vec::with_capacity(66);
    digest.extend_from_slice(&[0x19, 0x01]);
    digest.extend_from_slice(l1_domain().hash_struct().as_slice());
    digest.extend_from_slice(struct_hash.as_slice());
    keccak256(digest)
}

pub fn sign_l1_action(
    wallet: &PrivateKeySigner,
    connection_id: B256,
    is_mainnet: bool,
) -> Result<Signature, TradingError> {
    let digest = agent_signing_hash(connection_id, is_mainnet);
    wallet
        .sign_hash_sync(&digest)
        .map_err(|e| TradingError::Signing(e.to_string()))
}

/// Serialize a signature into the `{r, s, v}` object the exchange expects.
pub fn serialize_signature<S>(sig: &Signature, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut state = s.serialize_struct("Signature", 3)?;
    state.serialize_field("r", &sig.r())?;
    state.serialize_field("s", &sig.s())?;
    state.serialize_field("v", &(27 + sig.v() as u64))?;
    state.end()
}

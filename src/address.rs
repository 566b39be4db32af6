//! Base58Check addresses: P2PKH and P2SH on any registered network
//!
//! An address is a 20-byte hash plus the network and type that select its
//! version byte. Construction accepts several input shapes (see
//! [`AddressInput`]) and always normalizes them to that triple. Decoding a
//! versioned buffer checks the version byte against every registered network
//! and fails when the caller's network or type assertion disagrees with it.

use crate::base58check;
use crate::constants::{ADDRESS_BUFFER_SIZE, HASH160_SIZE};
use crate::error::{ConsensusError, Result};
use crate::hash::hash160;
use crate::key::PublicKey;
use crate::network::{Network, NetworkField, NetworkRegistry};
use crate::script::Script;
use crate::types::Hash160;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Kind of payment an address encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    #[serde(rename = "pubkeyhash")]
    PubKeyHash,
    #[serde(rename = "scripthash")]
    ScriptHash,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::PubKeyHash => "pubkeyhash",
            AddressType::ScriptHash => "scripthash",
        }
    }

    /// Version byte of this type on `network`
    pub fn version_byte(&self, network: &Network) -> u8 {
        match self {
            AddressType::PubKeyHash => network.pubkeyhash,
            AddressType::ScriptHash => network.scripthash,
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressType {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pubkeyhash" => Ok(AddressType::PubKeyHash),
            "scripthash" => Ok(AddressType::ScriptHash),
            other => Err(ConsensusError::MalformedInput(format!(
                "address type must be \"pubkeyhash\" or \"scripthash\", got {:?}",
                other
            ))),
        }
    }
}

/// Plain-object form of an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressObject {
    /// Hex-encoded 20-byte hash
    pub hash: String,
    #[serde(rename = "type")]
    pub address_type: AddressType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// Every shape an address can be built from
#[derive(Debug, Clone, Copy)]
pub enum AddressInput<'a> {
    /// 20 bytes: the hash itself. 21 bytes: version byte plus hash.
    /// Any other length: hashed with HASH160.
    Bytes(&'a [u8]),
    PublicKey(&'a PublicKey),
    /// Base58Check string; surrounding whitespace is ignored
    Str(&'a str),
    /// A script with a recognizable P2PKH or P2SH shape
    Script(&'a Script),
    Object(&'a AddressObject),
}

/// Result of classifying an [`AddressInput`]
#[derive(Debug, Clone)]
pub struct AddressInfo {
    pub hash: Hash160,
    pub network: Arc<Network>,
    pub address_type: AddressType,
}

/// Immutable address
#[derive(Clone, Serialize, Deserialize)]
#[serde(into = "AddressObject", try_from = "AddressObject")]
pub struct Address {
    hash: Hash160,
    network: Arc<Network>,
    address_type: AddressType,
}

/// Normalize `input` to a hash, network and type
///
/// `network` (a name or alias) and `address_type` are assertions when the input
/// carries its own network or type, and defaults otherwise.
pub fn classify(
    registry: &NetworkRegistry,
    input: AddressInput,
    network: Option<&str>,
    address_type: Option<AddressType>,
) -> Result<AddressInfo> {
    let requested = network.map(|name| registry.resolve(name)).transpose()?;

    match input {
        AddressInput::Bytes(bytes) if bytes.len() == HASH160_SIZE => {
            settle(registry, to_hash160(bytes)?, None, None, requested, address_type)
        }
        AddressInput::Bytes(bytes) if bytes.len() == ADDRESS_BUFFER_SIZE => {
            classify_buffer(registry, bytes, requested, address_type)
        }
        AddressInput::Bytes(bytes) => {
            settle(registry, hash160(bytes), None, None, requested, address_type)
        }
        AddressInput::PublicKey(key) => settle(
            registry,
            hash160(&key.to_bytes()),
            None,
            Some(AddressType::PubKeyHash),
            requested,
            address_type,
        ),
        AddressInput::Str(s) => {
            let buffer = base58check::check_decode(s.trim())?;
            if buffer.len() != ADDRESS_BUFFER_SIZE {
                return Err(ConsensusError::InvalidLength {
                    expected: ADDRESS_BUFFER_SIZE,
                    actual: buffer.len(),
                });
            }
            classify_buffer(registry, &buffer, requested, address_type)
        }
        AddressInput::Script(script) => {
            let (found_type, hash) = script.address_info().ok_or_else(|| {
                ConsensusError::CantDeriveAddress(format!("{:?}", script))
            })?;
            settle(registry, hash, None, Some(found_type), requested, address_type)
        }
        AddressInput::Object(obj) => {
            let hash = to_hash160(&hex::decode(&obj.hash)?)?;
            let found_network = obj
                .network
                .as_deref()
                .map(|name| registry.resolve(name))
                .transpose()?;
            settle(
                registry,
                hash,
                found_network,
                Some(obj.address_type),
                requested,
                address_type,
            )
        }
    }
}

/// Classify a 21-byte versioned buffer against every registered network
fn classify_buffer(
    registry: &NetworkRegistry,
    buffer: &[u8],
    requested: Option<Arc<Network>>,
    address_type: Option<AddressType>,
) -> Result<AddressInfo> {
    let version = buffer[0] as u32;
    let mut candidates: Vec<(Arc<Network>, AddressType)> = registry
        .find_all(version, NetworkField::PubKeyHash)
        .into_iter()
        .map(|n| (n, AddressType::PubKeyHash))
        .chain(
            registry
                .find_all(version, NetworkField::ScriptHash)
                .into_iter()
                .map(|n| (n, AddressType::ScriptHash)),
        )
        .collect();

    if candidates.is_empty() {
        return Err(ConsensusError::MalformedInput(format!(
            "unrecognized address version byte 0x{:02x}",
            version
        )));
    }

    if let Some(requested) = &requested {
        candidates.retain(|(n, _)| n.name == requested.name);
        if candidates.is_empty() {
            return Err(ConsensusError::ProtocolMismatch(format!(
                "address has mismatched network type: expected {}",
                requested.name
            )));
        }
    }

    if let Some(expected) = address_type {
        candidates.retain(|(_, t)| *t == expected);
        if candidates.is_empty() {
            return Err(ConsensusError::ProtocolMismatch(format!(
                "address has mismatched type: expected {}",
                expected
            )));
        }
    }

    if candidates.len() > 1 {
        let names: Vec<String> = candidates
            .iter()
            .map(|(n, t)| format!("{}/{}", n.name, t))
            .collect();
        return Err(ConsensusError::MalformedInput(format!(
            "ambiguous address version byte 0x{:02x}: {}",
            version,
            names.join(", ")
        )));
    }

    let (network, address_type) = candidates.remove(0);
    Ok(AddressInfo {
        hash: to_hash160(&buffer[1..])?,
        network,
        address_type,
    })
}

/// Reconcile what the input carries with what the caller asserted, then fill defaults
fn settle(
    registry: &NetworkRegistry,
    hash: Hash160,
    found_network: Option<Arc<Network>>,
    found_type: Option<AddressType>,
    requested_network: Option<Arc<Network>>,
    requested_type: Option<AddressType>,
) -> Result<AddressInfo> {
    if let (Some(found), Some(requested)) = (&found_network, &requested_network) {
        if found.name != requested.name {
            return Err(ConsensusError::ProtocolMismatch(format!(
                "address has mismatched network type: {} is not {}",
                found.name, requested.name
            )));
        }
    }
    if let (Some(found), Some(requested)) = (found_type, requested_type) {
        if found != requested {
            return Err(ConsensusError::ProtocolMismatch(format!(
                "address has mismatched type: {} is not {}",
                found, requested
            )));
        }
    }

    let network = match found_network.or(requested_network) {
        Some(network) => network,
        None => registry.default_network()?,
    };
    Ok(AddressInfo {
        hash,
        network,
        address_type: found_type
            .or(requested_type)
            .unwrap_or(AddressType::PubKeyHash),
    })
}

fn to_hash160(bytes: &[u8]) -> Result<Hash160> {
    if bytes.len() != HASH160_SIZE {
        return Err(ConsensusError::InvalidLength {
            expected: HASH160_SIZE,
            actual: bytes.len(),
        });
    }
    let mut hash = [0u8; HASH160_SIZE];
    hash.copy_from_slice(bytes);
    Ok(hash)
}

impl Address {
    /// Build an address from any supported input
    pub fn new(
        registry: &NetworkRegistry,
        input: AddressInput,
        network: Option<&str>,
        address_type: Option<AddressType>,
    ) -> Result<Self> {
        Ok(classify(registry, input, network, address_type)?.into())
    }

    /// Build directly from parts, without consulting a registry
    pub fn from_parts(hash: Hash160, network: Arc<Network>, address_type: AddressType) -> Self {
        Address {
            hash,
            network,
            address_type,
        }
    }

    pub fn from_string(
        registry: &NetworkRegistry,
        s: &str,
        network: Option<&str>,
        address_type: Option<AddressType>,
    ) -> Result<Self> {
        Self::new(registry, AddressInput::Str(s), network, address_type)
    }

    /// Decode a 21-byte versioned buffer
    pub fn from_bytes(
        registry: &NetworkRegistry,
        bytes: &[u8],
        network: Option<&str>,
        address_type: Option<AddressType>,
    ) -> Result<Self> {
        if bytes.len() != ADDRESS_BUFFER_SIZE {
            return Err(ConsensusError::InvalidLength {
                expected: ADDRESS_BUFFER_SIZE,
                actual: bytes.len(),
            });
        }
        Self::new(registry, AddressInput::Bytes(bytes), network, address_type)
    }

    pub fn from_public_key(
        registry: &NetworkRegistry,
        public_key: &PublicKey,
        network: Option<&str>,
    ) -> Result<Self> {
        Self::new(registry, AddressInput::PublicKey(public_key), network, None)
    }

    pub fn from_public_key_hash(
        registry: &NetworkRegistry,
        hash: &Hash160,
        network: Option<&str>,
    ) -> Result<Self> {
        Self::new(
            registry,
            AddressInput::Bytes(hash),
            network,
            Some(AddressType::PubKeyHash),
        )
    }

    pub fn from_script_hash(
        registry: &NetworkRegistry,
        hash: &Hash160,
        network: Option<&str>,
    ) -> Result<Self> {
        Self::new(
            registry,
            AddressInput::Bytes(hash),
            network,
            Some(AddressType::ScriptHash),
        )
    }

    /// Extract the address a P2PKH/P2SH input or output script refers to
    pub fn from_script(
        registry: &NetworkRegistry,
        script: &Script,
        network: Option<&str>,
    ) -> Result<Self> {
        Self::new(registry, AddressInput::Script(script), network, None)
    }

    /// P2SH address paying to the hash of `script`
    pub fn paying_to(
        registry: &NetworkRegistry,
        script: &Script,
        network: Option<&str>,
    ) -> Result<Self> {
        Self::from_script_hash(registry, &script.hash160(), network)
    }

    /// P2SH address of an m-of-n multisig over `public_keys` (sorted by hex)
    pub fn create_multisig(
        registry: &NetworkRegistry,
        public_keys: &[PublicKey],
        threshold: usize,
        network: Option<&str>,
    ) -> Result<Self> {
        let redeem = Script::build_multisig_out(public_keys, threshold)?;
        Self::paying_to(registry, &redeem, network)
    }

    pub fn from_object(registry: &NetworkRegistry, obj: &AddressObject) -> Result<Self> {
        Self::new(registry, AddressInput::Object(obj), None, None)
    }

    pub fn to_object(&self) -> AddressObject {
        AddressObject {
            hash: hex::encode(self.hash),
            address_type: self.address_type,
            network: Some(self.network.name.clone()),
        }
    }

    /// The error construction would fail with, if any
    pub fn validation_error(
        registry: &NetworkRegistry,
        input: AddressInput,
        network: Option<&str>,
        address_type: Option<AddressType>,
    ) -> Option<ConsensusError> {
        classify(registry, input, network, address_type).err()
    }

    pub fn is_valid(
        registry: &NetworkRegistry,
        input: AddressInput,
        network: Option<&str>,
        address_type: Option<AddressType>,
    ) -> bool {
        Self::validation_error(registry, input, network, address_type).is_none()
    }

    pub fn hash(&self) -> &Hash160 {
        &self.hash
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    pub fn is_pay_to_public_key_hash(&self) -> bool {
        self.address_type == AddressType::PubKeyHash
    }

    pub fn is_pay_to_script_hash(&self) -> bool {
        self.address_type == AddressType::ScriptHash
    }

    /// Version byte followed by the hash
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ADDRESS_BUFFER_SIZE);
        bytes.push(self.address_type.version_byte(&self.network));
        bytes.extend_from_slice(&self.hash);
        bytes
    }

    /// Output script that pays to this address
    pub fn to_script(&self) -> Script {
        match self.address_type {
            AddressType::PubKeyHash => Script::build_public_key_hash_out(&self.hash),
            AddressType::ScriptHash => Script::build_script_hash_out_from_hash(&self.hash),
        }
    }
}

impl From<AddressInfo> for Address {
    fn from(info: AddressInfo) -> Self {
        Address::from_parts(info.hash, info.network, info.address_type)
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.address_type == other.address_type
            && self.network.name == other.network.name
    }
}

impl Eq for Address {}

impl std::hash::Hash for Address {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
        self.address_type.hash(state);
        self.network.name.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&base58check::check_encode(&self.to_bytes()))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<Address: {}, type: {}, network: {}>",
            self, self.address_type, self.network
        )
    }
}

/// Parses against the process-wide registry
impl FromStr for Address {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self> {
        Address::from_string(NetworkRegistry::global(), s, None, None)
    }
}

impl From<Address> for AddressObject {
    fn from(address: Address) -> Self {
        address.to_object()
    }
}

impl TryFrom<AddressObject> for Address {
    type Error = ConsensusError;

    fn try_from(obj: AddressObject) -> Result<Self> {
        Address::from_object(NetworkRegistry::global(), &obj)
    }
}

//! Network profiles and the registry that resolves them
//!
//! A network profile fixes the version bytes used by addresses and keys, plus the
//! P2P identity (magic, port, seeds). The registry is shared, mutable configuration:
//! writers are serialized through an `RwLock` and readers receive `Arc` snapshots,
//! so a profile captured by an address never changes underneath it.

use crate::constants::*;
use crate::error::{ConsensusError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

pub const LIVENET: &str = "livenet";
pub const TESTNET: &str = "testnet";

/// Immutable network profile
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Network {
    pub name: String,
    pub alias: Option<String>,
    pub pubkeyhash: u8,
    pub privatekey: u8,
    pub scripthash: u8,
    pub xpubkey: u32,
    pub xprivkey: u32,
    pub network_magic: [u8; 4],
    pub port: u16,
    pub dns_seeds: Vec<String>,
    pub regtest_enabled: bool,
}

/// A numeric field of a [`Network`] that can be searched by value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkField {
    PubKeyHash,
    PrivateKey,
    ScriptHash,
    XPubKey,
    XPrivKey,
    NetworkMagic,
    Port,
}

impl Network {
    pub fn livenet() -> Self {
        Network {
            name: LIVENET.to_string(),
            alias: Some("mainnet".to_string()),
            pubkeyhash: 0x00,
            privatekey: 0x80,
            scripthash: 0x05,
            xpubkey: 0x0488b21e,
            xprivkey: 0x0488ade4,
            network_magic: [0xf9, 0xbe, 0xb4, 0xd9],
            port: 8333,
            dns_seeds: vec![
                "seed.bitcoin.sipa.be".to_string(),
                "dnsseed.bluematt.me".to_string(),
                "dnsseed.bitcoin.dashjr.org".to_string(),
                "seed.bitcoinstats.com".to_string(),
            ],
            regtest_enabled: false,
        }
    }

    pub fn testnet() -> Self {
        Network {
            name: TESTNET.to_string(),
            alias: Some("regtest".to_string()),
            pubkeyhash: 0x30,
            privatekey: 0xb0,
            scripthash: 0x19,
            xpubkey: 0x043587cf,
            xprivkey: 0x04358394,
            network_magic: TESTNET_MAGIC,
            port: TESTNET_PORT,
            dns_seeds: TESTNET_DNS_SEEDS.iter().map(|s| s.to_string()).collect(),
            regtest_enabled: false,
        }
    }

    /// True if `name` equals this network's name or alias
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.alias.as_deref() == Some(name)
    }

    pub fn field_value(&self, field: NetworkField) -> u32 {
        match field {
            NetworkField::PubKeyHash => self.pubkeyhash as u32,
            NetworkField::PrivateKey => self.privatekey as u32,
            NetworkField::ScriptHash => self.scripthash as u32,
            NetworkField::XPubKey => self.xpubkey,
            NetworkField::XPrivKey => self.xprivkey,
            NetworkField::NetworkMagic => u32::from_be_bytes(self.network_magic),
            NetworkField::Port => self.port as u32,
        }
    }

    fn with_regtest(&self, enabled: bool) -> Self {
        let mut network = self.clone();
        if enabled {
            network.network_magic = REGTEST_MAGIC;
            network.port = REGTEST_PORT;
            network.dns_seeds = Vec::new();
        } else {
            network.network_magic = TESTNET_MAGIC;
            network.port = TESTNET_PORT;
            network.dns_seeds = TESTNET_DNS_SEEDS.iter().map(|s| s.to_string()).collect();
        }
        network.regtest_enabled = enabled;
        network
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Definition of a custom network, as accepted by [`NetworkRegistry::add`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParams {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub pubkeyhash: u8,
    pub privatekey: u8,
    pub scripthash: u8,
    pub xpubkey: u32,
    pub xprivkey: u32,
    pub network_magic: u32,
    pub port: u16,
    #[serde(default)]
    pub dns_seeds: Vec<String>,
}

impl From<NetworkParams> for Network {
    fn from(params: NetworkParams) -> Self {
        Network {
            name: params.name,
            alias: params.alias,
            pubkeyhash: params.pubkeyhash,
            privatekey: params.privatekey,
            scripthash: params.scripthash,
            xpubkey: params.xpubkey,
            xprivkey: params.xprivkey,
            network_magic: params.network_magic.to_be_bytes(),
            port: params.port,
            dns_seeds: params.dns_seeds,
            regtest_enabled: false,
        }
    }
}

#[derive(Debug)]
struct RegistryState {
    networks: Vec<Arc<Network>>,
    default_name: String,
}

/// Table of known networks with exactly one default
#[derive(Debug)]
pub struct NetworkRegistry {
    state: RwLock<RegistryState>,
}

static GLOBAL_REGISTRY: OnceLock<NetworkRegistry> = OnceLock::new();

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkRegistry {
    /// A registry holding the two built-in networks, livenet as default
    pub fn new() -> Self {
        NetworkRegistry {
            state: RwLock::new(RegistryState {
                networks: vec![Arc::new(Network::livenet()), Arc::new(Network::testnet())],
                default_name: LIVENET.to_string(),
            }),
        }
    }

    /// The process-wide registry, initialized with the built-ins on first use
    pub fn global() -> &'static NetworkRegistry {
        GLOBAL_REGISTRY.get_or_init(NetworkRegistry::new)
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a network by name or alias
    pub fn get(&self, name: &str) -> Option<Arc<Network>> {
        self.read().networks.iter().find(|n| n.is_named(name)).cloned()
    }

    /// Like [`get`](Self::get) but reports an unknown name as an error
    pub fn resolve(&self, name: &str) -> Result<Arc<Network>> {
        self.get(name)
            .ok_or_else(|| ConsensusError::UnknownNetwork(name.to_string()))
    }

    /// First network whose value in any of `fields` equals `value`
    pub fn find(&self, value: u32, fields: &[NetworkField]) -> Option<Arc<Network>> {
        self.read()
            .networks
            .iter()
            .find(|n| fields.iter().any(|f| n.field_value(*f) == value))
            .cloned()
    }

    /// Every network whose `field` equals `value`
    pub fn find_all(&self, value: u32, field: NetworkField) -> Vec<Arc<Network>> {
        self.read()
            .networks
            .iter()
            .filter(|n| n.field_value(field) == value)
            .cloned()
            .collect()
    }

    pub fn livenet(&self) -> Result<Arc<Network>> {
        self.resolve(LIVENET)
    }

    pub fn testnet(&self) -> Result<Arc<Network>> {
        self.resolve(TESTNET)
    }

    pub fn default_network(&self) -> Result<Arc<Network>> {
        let state = self.read();
        state
            .networks
            .iter()
            .find(|n| n.name == state.default_name)
            .cloned()
            .ok_or_else(|| ConsensusError::UnknownNetwork(state.default_name.clone()))
    }

    pub fn set_default(&self, name: &str) -> Result<()> {
        let mut state = self.write();
        let network = state
            .networks
            .iter()
            .find(|n| n.is_named(name))
            .cloned()
            .ok_or_else(|| ConsensusError::UnknownNetwork(name.to_string()))?;
        debug!(network = %network.name, "default network changed");
        state.default_name = network.name.clone();
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.read().networks.iter().map(|n| n.name.clone()).collect()
    }

    /// Register a custom network
    pub fn add(&self, params: NetworkParams) -> Result<Arc<Network>> {
        let network: Network = params.into();
        let mut state = self.write();

        let taken = |name: &str| state.networks.iter().any(|n| n.is_named(name));
        if taken(&network.name) || network.alias.as_deref().map_or(false, taken) {
            return Err(ConsensusError::MalformedInput(format!(
                "network name already registered: {}",
                network.name
            )));
        }

        let network = Arc::new(network);
        state.networks.push(network.clone());
        debug!(network = %network.name, pubkeyhash = network.pubkeyhash, scripthash = network.scripthash, "network added");
        Ok(network)
    }

    /// Register a custom network from its JSON definition
    pub fn add_from_json(&self, json: &str) -> Result<Arc<Network>> {
        let params: NetworkParams = serde_json::from_str(json)?;
        self.add(params)
    }

    /// Remove a network by name or alias; the default network cannot be removed
    pub fn remove(&self, name: &str) -> Result<Option<Arc<Network>>> {
        let mut state = self.write();
        let Some(index) = state.networks.iter().position(|n| n.is_named(name)) else {
            return Ok(None);
        };
        if state.networks[index].name == state.default_name {
            return Err(ConsensusError::StatePrecondition(format!(
                "cannot remove the default network {}",
                state.default_name
            )));
        }
        let removed = state.networks.remove(index);
        debug!(network = %removed.name, "network removed");
        Ok(Some(removed))
    }

    /// Switch the test network to regtest parameters
    pub fn enable_regtest(&self) -> Result<()> {
        self.set_regtest(true)
    }

    /// Restore the test network's own parameters
    pub fn disable_regtest(&self) -> Result<()> {
        self.set_regtest(false)
    }

    pub fn is_regtest_enabled(&self) -> bool {
        self.read()
            .networks
            .iter()
            .any(|n| n.name == TESTNET && n.regtest_enabled)
    }

    fn set_regtest(&self, enabled: bool) -> Result<()> {
        let mut state = self.write();
        let slot = state
            .networks
            .iter_mut()
            .find(|n| n.name == TESTNET)
            .ok_or_else(|| ConsensusError::UnknownNetwork(TESTNET.to_string()))?;
        *slot = Arc::new(slot.with_regtest(enabled));
        debug!(enabled, "regtest toggled");
        Ok(())
    }
}

//! Proxy relationship tracking
//!
//! Proxy-family events are folded into one relationship per proxy address,
//! strictly in arrival order:
//! - `ProxyDeployed` creates a MINIMAL relationship with its implementation
//! - `Upgraded` sets the implementation, creating a UUPS relationship if none exists
//! - `AdminChanged` sets the admin and turns MINIMAL into TRANSPARENT
//! - `BeaconUpgraded` sets the beacon and always makes the type BEACON
//!
//! This is a lossy classifier driven by the event stream, not a decode of
//! the proxy bytecode; the final type depends on the order events arrive in.

use std::collections::HashMap;

use alloy::primitives::Address;
use tracing::debug;

use super::types::ProxyRelationship;
use crate::events::DomainEvent;
use crate::types::ProxyType;

/// Incremental builder of proxy relationships
#[derive(Debug, Default, Clone)]
pub struct ProxyTracker {
    relationships: HashMap<Address, ProxyRelationship>,
}

impl ProxyTracker {
    pub fn new() -> Self {
        Default::default()
    }

    /// Folds one event into the tracked relationships
    ///
    /// # Returns
    /// * `true` - The event was a proxy-family event
    /// * `false` - The event is unrelated to proxies
    pub fn apply(&mut self, event: &DomainEvent) -> bool {
        match *event {
            DomainEvent::ProxyDeployed { proxy, implementation } => {
                self.relationships.insert(
                    proxy,
                    ProxyRelationship {
                        proxy,
                        implementation,
                        proxy_type: ProxyType::Minimal,
                        admin: None,
                        beacon: None,
                    },
                );
            }
            DomainEvent::Upgraded { proxy, implementation } => {
                self.relationships
                    .entry(proxy)
                    .and_modify(|rel| rel.implementation = implementation)
                    .or_insert(ProxyRelationship {
                        proxy,
                        implementation,
                        proxy_type: ProxyType::Uups,
                        admin: None,
                        beacon: None,
                    });
            }
            DomainEvent::AdminChanged { proxy, new_admin, .. } => match self.relationships.get_mut(&proxy) {
                Some(rel) => {
                    rel.admin = Some(new_admin);
                    if rel.proxy_type == ProxyType::Minimal {
                        rel.proxy_type = ProxyType::Transparent;
                    }
                }
                None => debug!(%proxy, "admin change for unknown proxy"),
            },
            DomainEvent::BeaconUpgraded { proxy, beacon } => {
                let rel = self.relationships.entry(proxy).or_insert(ProxyRelationship {
                    proxy,
                    implementation: Address::ZERO,
                    proxy_type: ProxyType::Beacon,
                    admin: None,
                    beacon: None,
                });
                rel.proxy_type = ProxyType::Beacon;
                rel.beacon = Some(beacon);
            }
            _ => return false,
        }
        true
    }

    pub fn get(&self, proxy: &Address) -> Option<&ProxyRelationship> {
        self.relationships.get(proxy)
    }

    pub fn into_relationships(self) -> HashMap<Address, ProxyRelationship> {
        self.relationships
    }
}

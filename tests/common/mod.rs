//! Shared fixtures: a static schema and sample OpenConfig-shaped documents.

#![allow(dead_code)]

use serde_json::{Value, json};
use yangstore::{Path, StaticSchema};

/// Installs a test subscriber so `RUST_LOG=yangstore=trace` shows datastore
/// events during test runs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn schema() -> StaticSchema {
    StaticSchema::builder()
        .list("/openconfig-interfaces:interfaces/interface", ["name"])
        .list(
            "/openconfig-interfaces:interfaces/interface/subinterfaces/subinterface",
            ["index"],
        )
        .list(
            "/openconfig-network-instance:network-instances/network-instance",
            ["name"],
        )
        .list(
            "/openconfig-network-instance:network-instances/network-instance/vlans/vlan",
            ["vlan-id"],
        )
        .build()
        .expect("fixture schema is well-formed")
}

pub fn path(s: &str) -> Path {
    s.parse().expect("fixture path is well-formed")
}

pub const INTERFACE_02: &str = "/openconfig-interfaces:interfaces/interface[name='0/2']";
pub const INTERFACE_85: &str = "/openconfig-interfaces:interfaces/interface[name='0/85']";

fn interface(name: &str, broadcast_pkts: &str) -> Value {
    json!({
        "name": name,
        "config": {
            "name": name,
            "type": "ethernetCsmacd",
            "mtu": 1500,
            "enabled": true,
            "description": "interface configuration"
        },
        "state": {
            "name": name,
            "admin-status": "UP",
            "oper-status": "DOWN",
            "enabled": true,
            "mtu": 1518,
            "counters": {
                "in-broadcast-pkts": broadcast_pkts,
                "in-octets": "1023453",
                "out-discards": "0",
                "out-errors": "0"
            }
        }
    })
}

/// Three interfaces 0/1..0/3 with distinct broadcast counters.
pub fn three_interfaces() -> Value {
    json!({
        "openconfig-interfaces:interfaces": {
            "interface": [
                interface("0/1", "2767640"),
                interface("0/2", "2767641"),
                interface("0/3", "2767642")
            ]
        }
    })
}

/// Two small interfaces, each with config, state and counters.
pub fn simple_interfaces() -> Value {
    json!({
        "openconfig-interfaces:interfaces": {
            "interface": [
                {
                    "name": "0/1",
                    "config": { "name": "0/1", "mtu": 1500 },
                    "state": {
                        "oper-status": "UP",
                        "counters": { "in-errors": "0", "out-errors": "0" }
                    }
                },
                {
                    "name": "0/2",
                    "config": { "name": "0/2", "mtu": 1500 },
                    "state": {
                        "oper-status": "UP",
                        "counters": { "in-errors": "0", "out-errors": "0" }
                    }
                }
            ]
        }
    })
}

/// Replaces interface 0/1 with an 0/2 carrying changed counters and a fresh
/// subinterface block.
pub fn simple_replace_interface() -> Value {
    json!({
        "openconfig-interfaces:interfaces": {
            "interface": [
                {
                    "name": "0/2",
                    "config": { "name": "0/2", "mtu": 1500 },
                    "state": {
                        "oper-status": "UP",
                        "counters": { "in-errors": "7", "out-errors": "0" }
                    },
                    "subinterfaces": {
                        "subinterface": [
                            { "index": 0, "config": { "index": 0 } }
                        ]
                    }
                }
            ]
        }
    })
}

/// A new interface document as a wrapped single-entry list.
pub fn new_interface() -> Value {
    json!({
        "openconfig-interfaces:interface": [
            {
                "name": "0/85",
                "config": { "name": "0/85", "mtu": 1500, "enabled": true },
                "state": { "name": "0/85", "oper-status": "DOWN", "mtu": 1519 }
            }
        ]
    })
}

/// Three independent module trees.
pub fn three_trees() -> Value {
    json!({
        "openconfig-interfaces:interfaces": {
            "interface": [
                {
                    "name": "0/11",
                    "config": { "name": "0/11", "mtu": 1500, "description": "uplink" }
                }
            ]
        },
        "openconfig-network-instance:network-instances": {
            "network-instance": [
                {
                    "name": "default",
                    "config": { "name": "default", "enabled": true },
                    "vlans": {
                        "vlan": [
                            {
                                "vlan-id": 1,
                                "config": { "vlan-id": 1, "status": "ACTIVE" },
                                "state": { "vlan-id": 1, "status": "ACTIVE" }
                            }
                        ]
                    }
                }
            ]
        },
        "openconfig-lldp:lldp": {
            "config": { "enabled": true }
        }
    })
}

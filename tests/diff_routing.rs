//! Diff computation and subscription routing, end to end.

mod common;

use common::{
    INTERFACE_02, INTERFACE_85, new_interface, path, schema, simple_interfaces,
    simple_replace_interface, three_interfaces, three_trees,
};
use serde_json::json;
use yangstore::{Datastore, DiffPath, DiffType, Path};

fn operational() -> Datastore {
    Datastore::operational(schema())
}

fn unprefixed_sorted(paths: &[Path]) -> Vec<String> {
    let mut out: Vec<String> = paths.iter().map(|p| p.unprefixed().to_string()).collect();
    out.sort();
    out
}

#[test]
fn raw_diff_narrows_leaf_changes_to_leaf_paths() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), three_interfaces()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    let counters_path = path(&format!("{INTERFACE_02}/state/counters"));
    let mut counters = tx.read(&counters_path).unwrap();
    counters["openconfig-interfaces:counters"]["out-errors"] = json!("777");
    counters["openconfig-interfaces:counters"]["out-discards"] = json!("17");
    tx.merge(&counters_path, counters).unwrap();

    let diffs = tx.diff().unwrap();
    assert_eq!(diffs.len(), 2);
    let entries: Vec<_> = diffs.iter().collect();

    // Paths are fully module-prefixed and keyed; map order is structural.
    assert_eq!(
        entries[0].0.to_string(),
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface[name='0/2']\
         /openconfig-interfaces:state/openconfig-interfaces:counters/openconfig-interfaces:out-discards"
    );
    assert_eq!(entries[0].1.kind, DiffType::Update);
    assert_eq!(entries[0].1.before, json!("0"));
    assert_eq!(entries[0].1.after, json!("17"));

    assert_eq!(
        entries[1].0.to_string(),
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface[name='0/2']\
         /openconfig-interfaces:state/openconfig-interfaces:counters/openconfig-interfaces:out-errors"
    );
    assert_eq!(entries[1].1.before, json!("0"));
    assert_eq!(entries[1].1.after, json!("777"));
}

#[test]
fn raw_diff_on_pure_creation_and_deletion() {
    // Creation from empty: one entry at the module root.
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), simple_interfaces()).unwrap();
    let diffs = tx.diff().unwrap();
    assert_eq!(diffs.len(), 1);
    let d = diffs.values().next().unwrap();
    assert_eq!(d.kind, DiffType::Create);
    assert_eq!(d.path.to_string(), "/openconfig-interfaces:interfaces");
    assert_eq!(d.before, json!({}));
    assert_eq!(
        d.after["interface"].as_array().unwrap().len(),
        2
    );
    tx.commit().unwrap();

    // Deletion of a committed subtree: one entry with the prior content.
    let mut tx = store.new_tx().unwrap();
    let state_path = path("/openconfig-interfaces:interfaces/interface[name='0/1']/state");
    tx.delete(&state_path).unwrap();
    let diffs = tx.diff().unwrap();
    assert_eq!(diffs.len(), 1);
    let d = diffs.values().next().unwrap();
    assert_eq!(d.kind, DiffType::Delete);
    assert_eq!(
        d.path.to_string(),
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface[name='0/1']\
         /openconfig-interfaces:state"
    );
    assert_eq!(d.before["counters"]["in-errors"], json!("0"));
    assert_eq!(d.after, json!({}));
}

#[test]
fn changed_leaves_route_to_their_registered_container() {
    common::init_tracing();
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), three_interfaces()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    let counters_path = path(&format!("{INTERFACE_02}/state/counters"));
    let mut counters = tx.read(&counters_path).unwrap();
    counters["openconfig-interfaces:counters"]["out-errors"] = json!("777");
    counters["openconfig-interfaces:counters"]["out-discards"] = json!("17");
    tx.merge(&counters_path, counters).unwrap();

    let registered = path(
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface\
         /openconfig-interfaces:state/openconfig-interfaces:counters",
    );
    let result = tx
        .diff_routed(&[DiffPath::new(registered.clone(), false)])
        .unwrap();

    let entries = &result.diffs[&registered];
    assert_eq!(entries.len(), 2);

    // The first match re-reads the full container at the unified path.
    assert_eq!(entries[0].kind, DiffType::Update);
    assert_eq!(
        entries[0].path.to_string(),
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface[name='0/2']\
         /openconfig-interfaces:state/openconfig-interfaces:counters"
    );
    let before = &entries[0].before["openconfig-interfaces:counters"];
    let after = &entries[0].after["openconfig-interfaces:counters"];
    assert_eq!(before["out-errors"], json!("0"));
    assert_eq!(before["out-discards"], json!("0"));
    assert_eq!(after["out-errors"], json!("777"));
    assert_eq!(after["out-discards"], json!("17"));

    // The second leaf unifies to the same path and passes through raw.
    assert_eq!(
        entries[1].path.to_string(),
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface[name='0/2']\
         /openconfig-interfaces:state/openconfig-interfaces:counters/openconfig-interfaces:out-errors"
    );
    assert_eq!(entries[1].before, json!("0"));
    assert_eq!(entries[1].after, json!("777"));

    assert!(result.unhandled.is_empty());
}

#[test]
fn deleted_subtree_notifies_a_subtree_watch_at_its_granularity() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), three_interfaces()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    tx.delete(&path(&format!("{INTERFACE_02}/state"))).unwrap();

    let registered = path("/openconfig-interfaces:interfaces/openconfig-interfaces:interface");
    let result = tx
        .diff_routed(&[DiffPath::new(registered.clone(), true)])
        .unwrap();

    let entries = &result.diffs[&registered];
    assert_eq!(entries[0].kind, DiffType::Delete);
    assert_eq!(
        entries[0].path.to_string(),
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface[name='0/2']"
    );
    // Before: the whole committed entry. After: the entry without `state`.
    assert_eq!(
        entries[0].before["openconfig-interfaces:interface"][0]["state"]["name"],
        json!("0/2")
    );
    let after_entry = &entries[0].after["openconfig-interfaces:interface"][0];
    assert!(after_entry.get("state").is_none());
    assert!(after_entry.get("config").is_some());
}

#[test]
fn deleting_a_whole_module_notifies_watches_registered_on_children() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), simple_interfaces()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    tx.delete(&path("/openconfig-interfaces:interfaces")).unwrap();

    let registered =
        path("/openconfig-interfaces:interfaces/openconfig-interfaces:interface/config");
    let result = tx
        .diff_routed(&[DiffPath::new(registered.clone(), false)])
        .unwrap();

    let entries = &result.diffs[&registered];
    assert_eq!(entries.len(), 2);
    let keyed: Vec<String> = entries.iter().map(|d| d.path.unprefixed().to_string()).collect();
    assert_eq!(
        keyed,
        vec![
            "/interfaces/interface[name='0/1']/config",
            "/interfaces/interface[name='0/2']/config"
        ]
    );
    for entry in entries {
        assert_eq!(entry.kind, DiffType::Delete);
        assert_eq!(entry.after, json!({}));
        assert!(entry.before["openconfig-interfaces:config"].is_object());
    }

    assert_eq!(
        unprefixed_sorted(&result.unhandled),
        vec![
            "/interfaces",
            "/interfaces/interface[name='0/1']",
            "/interfaces/interface[name='0/1']/state",
            "/interfaces/interface[name='0/1']/state/counters",
            "/interfaces/interface[name='0/2']",
            "/interfaces/interface[name='0/2']/state",
            "/interfaces/interface[name='0/2']/state/counters",
        ]
    );
}

#[test]
fn a_parent_watch_without_subtree_coverage_is_not_notified_of_child_deletes() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), simple_interfaces()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    tx.delete(&path(
        "/openconfig-interfaces:interfaces/interface[name='0/1']/state/counters",
    ))
    .unwrap();

    let registered = path(
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface\
         /openconfig-interfaces:state",
    );
    let result = tx
        .diff_routed(&[DiffPath::new(registered, false)])
        .unwrap();

    assert!(result.diffs.is_empty());
    assert_eq!(
        unprefixed_sorted(&result.unhandled),
        vec!["/interfaces/interface[name='0/1']/state/counters"]
    );
}

#[test]
fn a_subtree_watch_on_the_parent_is_notified_of_child_deletes() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), simple_interfaces()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    tx.delete(&path(
        "/openconfig-interfaces:interfaces/interface[name='0/1']/state/counters",
    ))
    .unwrap();

    let registered = path("/openconfig-interfaces:interfaces/interface/state");
    let result = tx
        .diff_routed(&[DiffPath::new(registered.clone(), true)])
        .unwrap();

    let entries = &result.diffs[&registered];
    assert_eq!(entries[0].kind, DiffType::Delete);
    assert_eq!(
        entries[0].path.to_string(),
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface[name='0/1']\
         /openconfig-interfaces:state"
    );
    assert_eq!(
        entries[0].before["openconfig-interfaces:state"]["counters"]["in-errors"],
        json!("0")
    );
    assert_eq!(
        entries[0].after,
        json!({ "openconfig-interfaces:state": { "oper-status": "UP" } })
    );
    assert!(result.unhandled.is_empty());
}

#[test]
fn a_created_list_entry_routes_to_the_list_watch() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), three_interfaces()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path(INTERFACE_85), new_interface()).unwrap();

    let registered = path("/openconfig-interfaces:interfaces/openconfig-interfaces:interface");
    let result = tx
        .diff_routed(&[DiffPath::new(registered.clone(), false)])
        .unwrap();

    let entries = &result.diffs[&registered];
    assert_eq!(entries[0].kind, DiffType::Create);
    assert_eq!(
        entries[0].path.to_string(),
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface[name='0/85']"
    );
    assert_eq!(
        entries[0].after["openconfig-interfaces:interface"][0]["name"],
        json!("0/85")
    );
    assert_eq!(entries[0].before, json!({}));
}

#[test]
fn creating_a_parent_notifies_watches_registered_deeper_inside() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), simple_interfaces()).unwrap();

    let state_watch =
        path("/openconfig-interfaces:interfaces/interface/openconfig-interfaces:state");
    let counters_watch = path(
        "/openconfig-interfaces:interfaces/interface/openconfig-interfaces:state/counters",
    );
    let result = tx
        .diff_routed(&[
            DiffPath::new(state_watch.clone(), false),
            DiffPath::new(counters_watch.clone(), false),
        ])
        .unwrap();

    let state_entries = &result.diffs[&state_watch];
    assert_eq!(state_entries.len(), 2);
    let keyed: Vec<String> = state_entries
        .iter()
        .map(|d| d.path.unprefixed().to_string())
        .collect();
    assert_eq!(
        keyed,
        vec![
            "/interfaces/interface[name='0/1']/state",
            "/interfaces/interface[name='0/2']/state"
        ]
    );
    for entry in state_entries {
        assert_eq!(entry.kind, DiffType::Create);
        assert_eq!(entry.before, json!({}));
    }

    let counters_entries = &result.diffs[&counters_watch];
    assert_eq!(counters_entries.len(), 2);
    assert_eq!(
        counters_entries[0].after["openconfig-interfaces:counters"]["in-errors"],
        json!("0")
    );

    assert_eq!(
        unprefixed_sorted(&result.unhandled),
        vec![
            "/interfaces",
            "/interfaces/interface[name='0/1']",
            "/interfaces/interface[name='0/1']/config",
            "/interfaces/interface[name='0/2']",
            "/interfaces/interface[name='0/2']/config",
        ]
    );
}

#[test]
fn deletes_creates_and_updates_route_in_one_pass() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), simple_interfaces()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), simple_replace_interface()).unwrap();

    let config_watch =
        path("/openconfig-interfaces:interfaces/openconfig-interfaces:interface/config");
    let counters_watch = path(
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface/state/counters",
    );
    let result = tx
        .diff_routed(&[
            DiffPath::new(config_watch.clone(), false),
            DiffPath::new(counters_watch.clone(), false),
        ])
        .unwrap();

    // Interface 0/1 disappeared: its config and counters land on the
    // watches registered at those depths.
    let config_entries = &result.diffs[&config_watch];
    assert_eq!(config_entries.len(), 1);
    assert_eq!(config_entries[0].kind, DiffType::Delete);
    assert_eq!(
        config_entries[0].path.unprefixed().to_string(),
        "/interfaces/interface[name='0/1']/config"
    );

    let counters_entries = &result.diffs[&counters_watch];
    assert_eq!(counters_entries.len(), 2);
    assert_eq!(counters_entries[0].kind, DiffType::Delete);
    assert_eq!(
        counters_entries[0].path.unprefixed().to_string(),
        "/interfaces/interface[name='0/1']/state/counters"
    );
    // Interface 0/2's changed counter leaf arrives as an update unified to
    // the registered depth.
    assert_eq!(counters_entries[1].kind, DiffType::Update);
    assert_eq!(
        counters_entries[1].path.to_string(),
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface[name='0/2']\
         /openconfig-interfaces:state/openconfig-interfaces:counters"
    );
    assert_eq!(
        counters_entries[1].before["openconfig-interfaces:counters"]["in-errors"],
        json!("0")
    );
    assert_eq!(
        counters_entries[1].after["openconfig-interfaces:counters"]["in-errors"],
        json!("7")
    );

    assert_eq!(
        unprefixed_sorted(&result.unhandled),
        vec![
            "/interfaces/interface[name='0/1']",
            "/interfaces/interface[name='0/1']/state",
            "/interfaces/interface[name='0/2']/subinterfaces",
            "/interfaces/interface[name='0/2']/subinterfaces/subinterface[index='0']",
            "/interfaces/interface[name='0/2']/subinterfaces/subinterface[index='0']/config",
        ]
    );
}

#[test]
fn updates_route_across_independent_module_trees() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), three_trees()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    tx.merge(
        &path("/openconfig-interfaces:interfaces/interface[name='0/11']"),
        json!({
            "openconfig-interfaces:interface": [
                { "name": "0/11", "config": { "mtu": 9000, "description": "uplink" } }
            ]
        }),
    )
    .unwrap();

    let registered = path(
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface\
         /openconfig-interfaces:config",
    );
    let result = tx
        .diff_routed(&[DiffPath::new(registered.clone(), true)])
        .unwrap();

    let entries = &result.diffs[&registered];
    assert_eq!(entries[0].kind, DiffType::Update);
    assert_eq!(
        entries[0].path.to_string(),
        "/openconfig-interfaces:interfaces/openconfig-interfaces:interface[name='0/11']\
         /openconfig-interfaces:config"
    );
    assert_eq!(
        entries[0].before["openconfig-interfaces:config"]["mtu"],
        json!(1500)
    );
    assert_eq!(
        entries[0].after["openconfig-interfaces:config"]["mtu"],
        json!(9000)
    );
}

#[test]
fn value_only_predicates_resolve_against_the_schema() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), three_trees()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    // `['default']` names no key; the schema's first declared key applies.
    assert!(
        tx.delete(&path(
            "/openconfig-network-instance:network-instances/network-instance['default']/config"
        ))
        .unwrap()
    );

    let registered = path(
        "/openconfig-network-instance:network-instances\
         /openconfig-network-instance:network-instance",
    );
    let result = tx
        .diff_routed(&[DiffPath::new(registered.clone(), true)])
        .unwrap();

    let entries = &result.diffs[&registered];
    assert_eq!(entries[0].kind, DiffType::Delete);
    assert_eq!(
        entries[0].path.to_string(),
        "/openconfig-network-instance:network-instances\
         /openconfig-network-instance:network-instance[name='default']"
    );
}

#[test]
fn a_created_vlan_routes_to_the_vlan_list_watch() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), three_trees()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    let vlans_path = path(
        "/openconfig-network-instance:network-instances/network-instance[name='default']/vlans",
    );
    let mut vlans = tx.read(&vlans_path).unwrap();
    vlans["openconfig-network-instance:vlans"]["vlan"]
        .as_array_mut()
        .unwrap()
        .push(json!({
            "vlan-id": 666,
            "config": { "vlan-id": 666, "status": "SUSPENDED" },
            "state": { "vlan-id": 666, "status": "SUSPENDED" }
        }));
    tx.overwrite(&vlans_path, vlans).unwrap();

    let registered = path(
        "/openconfig-network-instance:network-instances\
         /openconfig-network-instance:network-instance\
         /openconfig-network-instance:vlans/openconfig-network-instance:vlan",
    );
    let result = tx
        .diff_routed(&[DiffPath::new(registered.clone(), false)])
        .unwrap();

    let entries = &result.diffs[&registered];
    assert_eq!(entries[0].kind, DiffType::Create);
    assert_eq!(
        entries[0].path.to_string(),
        "/openconfig-network-instance:network-instances\
         /openconfig-network-instance:network-instance[name='default']\
         /openconfig-network-instance:vlans/openconfig-network-instance:vlan[vlan-id='666']"
    );
    let after = &entries[0].after["openconfig-network-instance:vlan"][0];
    assert_eq!(after["config"]["vlan-id"], json!(666));
    assert_eq!(after["config"]["status"], json!("SUSPENDED"));
    assert_eq!(after["state"]["status"], json!("SUSPENDED"));
    assert_eq!(entries[0].before, json!({}));
}

#[test]
fn vlan_state_updates_unify_to_the_state_watch() {
    let store = operational();
    let mut tx = store.new_tx().unwrap();
    tx.overwrite(&path("/"), three_trees()).unwrap();
    tx.commit().unwrap();

    let mut tx = store.new_tx().unwrap();
    let vlans_path = path(
        "/openconfig-network-instance:network-instances/network-instance[name='default']/vlans",
    );
    let mut vlans = tx.read(&vlans_path).unwrap();
    vlans["openconfig-network-instance:vlans"]["vlan"][0]["state"]["status"] = json!("SUSPENDED");
    vlans["openconfig-network-instance:vlans"]["vlan"][0]["config"]["status"] = json!("SUSPENDED");
    tx.overwrite(&vlans_path, vlans).unwrap();

    let registered = path(
        "/openconfig-network-instance:network-instances\
         /openconfig-network-instance:network-instance\
         /openconfig-network-instance:vlans/openconfig-network-instance:vlan\
         /openconfig-network-instance:state",
    );
    let result = tx
        .diff_routed(&[DiffPath::new(registered.clone(), false)])
        .unwrap();

    let entries = &result.diffs[&registered];
    assert_eq!(entries[0].kind, DiffType::Update);
    assert_eq!(
        entries[0].path.to_string(),
        "/openconfig-network-instance:network-instances\
         /openconfig-network-instance:network-instance[name='default']\
         /openconfig-network-instance:vlans/openconfig-network-instance:vlan[vlan-id='1']\
         /openconfig-network-instance:state"
    );
    // The config-side change has no registered ancestor.
    assert_eq!(
        unprefixed_sorted(&result.unhandled),
        vec![
            "/network-instances/network-instance[name='default']/vlans/vlan[vlan-id='1']\
             /config/status"
        ]
    );
}

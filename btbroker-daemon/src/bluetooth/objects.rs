/*!
 * Adapter and device reconstruction
 * Typed records decoded from the managed-object snapshot
 */

use serde::{Deserialize, Serialize};

use super::bus::{ObjectTree, PropValue, PropertyBag, ADAPTER_INTERFACE, DEVICE_INTERFACE};
use super::error::{BluetoothError, Result};
use super::paths;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adapter {
    pub path: String,
    pub name: String,
    pub address: String,
    pub powered: bool,
    pub discoverable: bool,
    pub discovering: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub path: String,
    pub name: String,
    pub address: String,
    pub paired: bool,
    pub trusted: bool,
    pub connected: bool,
    pub adapter: String,
}

/// Field accessor over one interface's property bag.
///
/// Absent properties decode to the field's default; a property present
/// with an unexpected type is a decode error.
struct Props<'a> {
    path: &'a str,
    bag: &'a PropertyBag,
}

impl<'a> Props<'a> {
    fn string(&self, key: &str) -> Result<String> {
        match self.bag.get(key) {
            None => Ok(String::new()),
            Some(PropValue::Str(value)) => Ok(value.clone()),
            Some(other) => Err(self.mismatch(key, "string", other)),
        }
    }

    fn flag(&self, key: &str) -> Result<bool> {
        match self.bag.get(key) {
            None => Ok(false),
            Some(PropValue::Bool(value)) => Ok(*value),
            Some(other) => Err(self.mismatch(key, "boolean", other)),
        }
    }

    fn mismatch(&self, key: &str, expected: &str, found: &PropValue) -> BluetoothError {
        BluetoothError::Decode(format!(
            "property {} of {} should be a {}, found {:?}",
            key, self.path, expected, found
        ))
    }
}

pub fn extract_adapters(tree: &ObjectTree) -> Result<Vec<Adapter>> {
    let mut adapters = Vec::new();
    for (path, interfaces) in tree {
        let Some(bag) = interfaces.get(ADAPTER_INTERFACE) else {
            continue;
        };
        let props = Props { path, bag };
        adapters.push(Adapter {
            path: path.clone(),
            name: props.string("Name")?,
            address: props.string("Address")?,
            powered: props.flag("Powered")?,
            discoverable: props.flag("Discoverable")?,
            discovering: props.flag("Discovering")?,
        });
    }
    Ok(adapters)
}

/// Devices living under `adapter_path`. An unknown adapter yields an empty list.
pub fn extract_devices(tree: &ObjectTree, adapter_path: &str) -> Result<Vec<Device>> {
    let prefix = format!("{}/", adapter_path);
    let mut devices = Vec::new();
    for (path, interfaces) in tree {
        if !path.starts_with(&prefix) {
            continue;
        }
        let Some(bag) = interfaces.get(DEVICE_INTERFACE) else {
            continue;
        };
        let props = Props { path, bag };
        let mut address = props.string("Address")?;
        if address.is_empty() {
            address = paths::mac_from_device_path(path).unwrap_or_default();
        }
        devices.push(Device {
            path: path.clone(),
            name: props.string("Name")?,
            address,
            paired: props.flag("Paired")?,
            trusted: props.flag("Trusted")?,
            connected: props.flag("Connected")?,
            adapter: adapter_path.to_string(),
        });
    }
    Ok(devices)
}

pub fn filter_trusted(devices: Vec<Device>) -> Vec<Device> {
    devices.into_iter().filter(|d| d.trusted).collect()
}

pub fn filter_untrusted(devices: Vec<Device>) -> Vec<Device> {
    devices.into_iter().filter(|d| !d.trusted).collect()
}

pub fn filter_connected(devices: Vec<Device>) -> Vec<Device> {
    devices.into_iter().filter(|d| d.connected).collect()
}

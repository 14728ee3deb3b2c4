/*!
 * System bus seam
 * The three request/reply primitives the Bluetooth layer needs from D-Bus
 */

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub const BLUEZ_SERVICE: &str = "org.bluez";
pub const OBJECT_MANAGER_PATH: &str = "/";
pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";
pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";

/// A single property value, narrowed to the shapes the broker reads.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Str(String),
    /// Any other D-Bus type, kept as its signature for diagnostics.
    Other(String),
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

pub type PropertyBag = HashMap<String, PropValue>;

/// Snapshot of `GetManagedObjects`: object path → interface → properties.
///
/// Ordered by object path so that scans over it are reproducible.
pub type ObjectTree = BTreeMap<String, HashMap<String, PropertyBag>>;

/// Arguments of a method call.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodArgs {
    None,
    ObjectPath(String),
}

#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("system bus call failed: {0}")]
    Transport(String),
    #[error("unexpected reply shape: {0}")]
    Decode(String),
}

/// Request/reply access to the Bluetooth service on the system bus.
#[async_trait]
pub trait ObjectBus: Send + Sync {
    /// Fetches the whole managed-object tree in one round trip.
    async fn managed_objects(&self) -> Result<ObjectTree, BusError>;

    /// Invokes `interface.method` on `path`, discarding the (empty) reply.
    async fn call_method(
        &self,
        path: &str,
        interface: &str,
        method: &str,
        args: MethodArgs,
    ) -> Result<(), BusError>;

    /// `org.freedesktop.DBus.Properties.Set` on `path`.
    async fn set_property(
        &self,
        path: &str,
        interface: &str,
        property: &str,
        value: PropValue,
    ) -> Result<(), BusError>;
}

/*!
 * Bluetooth Device Management
 * Adapter and device control via the BlueZ D-Bus object tree
 */

pub mod bluez;
pub mod bus;
pub mod error;
pub mod objects;
pub mod paths;

use async_trait::async_trait;

pub use bluez::BluezBus;
pub use bus::{MethodArgs, ObjectBus, ObjectTree, PropValue};
pub use error::{BluetoothError, Command, Result};
pub use objects::{Adapter, Device};

use bus::{ADAPTER_INTERFACE, DEVICE_INTERFACE};

/// Everything the HTTP layer can ask of the Bluetooth stack.
///
/// Device commands take the adapter object path plus the device MAC; use
/// [`BluetoothService::adapter_path_by_mac`] to turn an adapter MAC into a path.
#[async_trait]
pub trait BluetoothService: Send + Sync {
    async fn adapters(&self) -> Result<Vec<Adapter>>;
    async fn adapter_path_by_mac(&self, mac: &str) -> Result<String>;
    async fn devices(&self, adapter_path: &str) -> Result<Vec<Device>>;
    async fn trusted_devices(&self, adapter_path: &str) -> Result<Vec<Device>>;
    async fn connected_devices(&self, adapter_path: &str) -> Result<Vec<Device>>;
    async fn connect_device(&self, adapter_path: &str, mac: &str) -> Result<()>;
    async fn pair_device(&self, adapter_path: &str, mac: &str) -> Result<()>;
    async fn trust_device(&self, adapter_path: &str, mac: &str) -> Result<()>;
    async fn remove_device(&self, adapter_path: &str, mac: &str) -> Result<()>;
    async fn set_discoverable(&self, adapter_path: &str, enabled: bool) -> Result<()>;
    async fn set_discovering(&self, adapter_path: &str, enabled: bool) -> Result<()>;
}

/// Stateless view over the bus: every call re-reads the live object tree.
pub struct BluetoothManager<B> {
    bus: B,
}

impl<B: ObjectBus> BluetoothManager<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    #[cfg(test)]
    fn bus(&self) -> &B {
        &self.bus
    }

    /// Hands the bus back, e.g. to close it at shutdown.
    pub fn into_bus(self) -> B {
        self.bus
    }

    async fn snapshot(&self) -> Result<ObjectTree> {
        Ok(self.bus.managed_objects().await?)
    }

    async fn device_method(
        &self,
        command: Command,
        method: &str,
        adapter_path: &str,
        mac: &str,
    ) -> Result<()> {
        let path = paths::device_path(adapter_path, mac);
        tracing::info!("{} {} ({})", command, mac, path);
        self.bus
            .call_method(&path, DEVICE_INTERFACE, method, MethodArgs::None)
            .await
            .map_err(|source| BluetoothError::Command {
                command,
                target: mac.to_string(),
                source,
            })
    }
}

#[async_trait]
impl<B: ObjectBus> BluetoothService for BluetoothManager<B> {
    async fn adapters(&self) -> Result<Vec<Adapter>> {
        objects::extract_adapters(&self.snapshot().await?)
    }

    async fn adapter_path_by_mac(&self, mac: &str) -> Result<String> {
        let adapters = self.adapters().await?;
        paths::find_adapter_path(&adapters, mac)
            .map(str::to_string)
            .ok_or_else(|| BluetoothError::NotFound(mac.to_string()))
    }

    async fn devices(&self, adapter_path: &str) -> Result<Vec<Device>> {
        objects::extract_devices(&self.snapshot().await?, adapter_path)
    }

    async fn trusted_devices(&self, adapter_path: &str) -> Result<Vec<Device>> {
        Ok(objects::filter_trusted(self.devices(adapter_path).await?))
    }

    async fn connected_devices(&self, adapter_path: &str) -> Result<Vec<Device>> {
        Ok(objects::filter_connected(self.devices(adapter_path).await?))
    }

    async fn connect_device(&self, adapter_path: &str, mac: &str) -> Result<()> {
        self.device_method(Command::Connect, "Connect", adapter_path, mac)
            .await
    }

    async fn pair_device(&self, adapter_path: &str, mac: &str) -> Result<()> {
        self.device_method(Command::Pair, "Pair", adapter_path, mac)
            .await
    }

    async fn trust_device(&self, adapter_path: &str, mac: &str) -> Result<()> {
        let path = paths::device_path(adapter_path, mac);
        tracing::info!("Trusting device {} ({})", mac, path);
        self.bus
            .set_property(&path, DEVICE_INTERFACE, "Trusted", PropValue::Bool(true))
            .await
            .map_err(|source| BluetoothError::Command {
                command: Command::Trust,
                target: mac.to_string(),
                source,
            })
    }

    async fn remove_device(&self, adapter_path: &str, mac: &str) -> Result<()> {
        let path = paths::device_path(adapter_path, mac);
        tracing::info!("Removing device {} from {}", mac, adapter_path);
        self.bus
            .call_method(
                adapter_path,
                ADAPTER_INTERFACE,
                "RemoveDevice",
                MethodArgs::ObjectPath(path),
            )
            .await
            .map_err(|source| BluetoothError::Command {
                command: Command::Remove,
                target: mac.to_string(),
                source,
            })
    }

    async fn set_discoverable(&self, adapter_path: &str, enabled: bool) -> Result<()> {
        tracing::info!("Setting {} discoverable={}", adapter_path, enabled);
        self.bus
            .set_property(
                adapter_path,
                ADAPTER_INTERFACE,
                "Discoverable",
                PropValue::Bool(enabled),
            )
            .await
            .map_err(|source| BluetoothError::Command {
                command: Command::SetDiscoverable,
                target: adapter_path.to_string(),
                source,
            })
    }

    async fn set_discovering(&self, adapter_path: &str, enabled: bool) -> Result<()> {
        // Discovering is read-only on Adapter1; it follows Start/StopDiscovery.
        let method = if enabled { "StartDiscovery" } else { "StopDiscovery" };
        tracing::info!("{} on {}", method, adapter_path);
        self.bus
            .call_method(adapter_path, ADAPTER_INTERFACE, method, MethodArgs::None)
            .await
            .map_err(|source| BluetoothError::Command {
                command: Command::SetDiscovering,
                target: adapter_path.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::bus::BusError;
    use super::objects::tests::{object, sample_tree};
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Fetch,
        Method {
            path: String,
            interface: String,
            method: String,
            args: MethodArgs,
        },
        Set {
            path: String,
            interface: String,
            property: String,
            value: PropValue,
        },
    }

    /// Records every call and answers from a fixed tree.
    struct FakeBus {
        tree: ObjectTree,
        fail_fetch: Option<BusError>,
        fail_commands: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeBus {
        fn new(tree: ObjectTree) -> Self {
            Self {
                tree,
                fail_fetch: None,
                fail_commands: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn unreachable(err: BusError) -> Self {
            Self {
                fail_fetch: Some(err),
                ..Self::new(ObjectTree::new())
            }
        }

        fn failing(tree: ObjectTree) -> Self {
            Self {
                fail_commands: true,
                ..Self::new(tree)
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn command_calls(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| *c != Call::Fetch)
                .collect()
        }

        fn reply(&self) -> std::result::Result<(), BusError> {
            if self.fail_commands {
                Err(BusError::Transport("org.bluez.Error.Failed: Page Timeout".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ObjectBus for FakeBus {
        async fn managed_objects(&self) -> std::result::Result<ObjectTree, BusError> {
            self.calls.lock().unwrap().push(Call::Fetch);
            match &self.fail_fetch {
                Some(err) => Err(err.clone()),
                None => Ok(self.tree.clone()),
            }
        }

        async fn call_method(
            &self,
            path: &str,
            interface: &str,
            method: &str,
            args: MethodArgs,
        ) -> std::result::Result<(), BusError> {
            self.calls.lock().unwrap().push(Call::Method {
                path: path.into(),
                interface: interface.into(),
                method: method.into(),
                args,
            });
            self.reply()
        }

        async fn set_property(
            &self,
            path: &str,
            interface: &str,
            property: &str,
            value: PropValue,
        ) -> std::result::Result<(), BusError> {
            self.calls.lock().unwrap().push(Call::Set {
                path: path.into(),
                interface: interface.into(),
                property: property.into(),
                value,
            });
            self.reply()
        }
    }

    fn scenario_tree() -> ObjectTree {
        let mut tree = ObjectTree::new();
        tree.insert(
            "/org/x/hci0".into(),
            object(ADAPTER_INTERFACE, &[("Address", "AA:BB:CC:DD:EE:00".into())]),
        );
        tree.insert(
            "/org/x/hci0/dev_11_22_33_44_55_66".into(),
            object(
                DEVICE_INTERFACE,
                &[
                    ("Address", "11:22:33:44:55:66".into()),
                    ("Trusted", false.into()),
                ],
            ),
        );
        tree
    }

    #[tokio::test]
    async fn every_query_refetches_the_tree() {
        let manager = BluetoothManager::new(FakeBus::new(sample_tree()));

        assert_eq!(manager.adapters().await.unwrap().len(), 2);
        assert_eq!(manager.devices("/org/bluez/hci0").await.unwrap().len(), 2);
        assert_eq!(manager.bus().calls(), vec![Call::Fetch, Call::Fetch]);
    }

    #[tokio::test]
    async fn derived_views_filter_devices() {
        let manager = BluetoothManager::new(FakeBus::new(sample_tree()));

        let trusted = manager.trusted_devices("/org/bluez/hci0").await.unwrap();
        assert_eq!(trusted.len(), 1);
        assert!(trusted[0].trusted);

        let connected = manager.connected_devices("/org/bluez/hci1").await.unwrap();
        assert!(connected.is_empty());
    }

    #[tokio::test]
    async fn resolves_adapter_path_or_reports_not_found() {
        let manager = BluetoothManager::new(FakeBus::new(sample_tree()));

        assert_eq!(
            manager.adapter_path_by_mac("AA:BB:CC:DD:EE:01").await.unwrap(),
            "/org/bluez/hci1"
        );
        match manager.adapter_path_by_mac("FF:FF:FF:FF:FF:FF").await {
            Err(BluetoothError::NotFound(mac)) => assert_eq!(mac, "FF:FF:FF:FF:FF:FF"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_failures_surface_as_transport_or_decode() {
        let manager = BluetoothManager::new(FakeBus::unreachable(BusError::Transport(
            "org.freedesktop.DBus.Error.ServiceUnknown: org.bluez".into(),
        )));
        match manager.adapter_path_by_mac("AA:BB:CC:DD:EE:00").await {
            Err(BluetoothError::Transport(msg)) => assert!(msg.contains("ServiceUnknown")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(manager.adapters().await.is_err());
        assert!(manager.bus().command_calls().is_empty());

        let manager = BluetoothManager::new(FakeBus::unreachable(BusError::Decode(
            "expected a{oa{sa{sv}}}".into(),
        )));
        assert!(matches!(
            manager.devices("/org/bluez/hci0").await,
            Err(BluetoothError::Decode(_))
        ));
        assert!(matches!(
            manager.trusted_devices("/org/bluez/hci0").await,
            Err(BluetoothError::Decode(_))
        ));
        assert_eq!(manager.bus().calls(), vec![Call::Fetch, Call::Fetch]);
    }

    #[tokio::test]
    async fn trust_sets_the_trusted_property_once() {
        let manager = BluetoothManager::new(FakeBus::new(scenario_tree()));

        let adapter = manager.adapter_path_by_mac("AA:BB:CC:DD:EE:00").await.unwrap();
        manager
            .trust_device(&adapter, "11:22:33:44:55:66")
            .await
            .unwrap();

        assert_eq!(
            manager.bus().command_calls(),
            vec![Call::Set {
                path: "/org/x/hci0/dev_11_22_33_44_55_66".into(),
                interface: DEVICE_INTERFACE.into(),
                property: "Trusted".into(),
                value: PropValue::Bool(true),
            }]
        );
    }

    #[tokio::test]
    async fn connect_and_pair_invoke_device_methods() {
        let manager = BluetoothManager::new(FakeBus::new(scenario_tree()));

        manager
            .connect_device("/org/x/hci0", "11:22:33:44:55:66")
            .await
            .unwrap();
        manager
            .pair_device("/org/x/hci0", "11:22:33:44:55:66")
            .await
            .unwrap();

        let methods: Vec<(String, String)> = manager
            .bus()
            .command_calls()
            .into_iter()
            .map(|call| match call {
                Call::Method { path, method, .. } => (path, method),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            methods,
            vec![
                ("/org/x/hci0/dev_11_22_33_44_55_66".into(), "Connect".into()),
                ("/org/x/hci0/dev_11_22_33_44_55_66".into(), "Pair".into()),
            ]
        );
    }

    #[tokio::test]
    async fn remove_targets_the_adapter() {
        let manager = BluetoothManager::new(FakeBus::new(scenario_tree()));

        manager
            .remove_device("/org/x/hci0", "11:22:33:44:55:66")
            .await
            .unwrap();

        assert_eq!(
            manager.bus().command_calls(),
            vec![Call::Method {
                path: "/org/x/hci0".into(),
                interface: ADAPTER_INTERFACE.into(),
                method: "RemoveDevice".into(),
                args: MethodArgs::ObjectPath("/org/x/hci0/dev_11_22_33_44_55_66".into()),
            }]
        );
    }

    #[tokio::test]
    async fn discovery_toggles_map_to_property_and_methods() {
        let manager = BluetoothManager::new(FakeBus::new(scenario_tree()));

        manager.set_discoverable("/org/x/hci0", true).await.unwrap();
        manager.set_discovering("/org/x/hci0", true).await.unwrap();
        manager.set_discovering("/org/x/hci0", false).await.unwrap();

        let calls = manager.bus().command_calls();
        assert_eq!(
            calls[0],
            Call::Set {
                path: "/org/x/hci0".into(),
                interface: ADAPTER_INTERFACE.into(),
                property: "Discoverable".into(),
                value: PropValue::Bool(true),
            }
        );
        assert!(matches!(&calls[1], Call::Method { method, .. } if method == "StartDiscovery"));
        assert!(matches!(&calls[2], Call::Method { method, .. } if method == "StopDiscovery"));
    }

    #[tokio::test]
    async fn command_failures_carry_the_mac() {
        let manager = BluetoothManager::new(FakeBus::failing(scenario_tree()));

        let err = manager
            .connect_device("/org/x/hci0", "11:22:33:44:55:66")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BluetoothError::Command {
                command: Command::Connect,
                ..
            }
        ));
        let message = err.to_string();
        assert!(message.contains("11:22:33:44:55:66"));
        assert!(message.contains("Page Timeout"));
    }
}

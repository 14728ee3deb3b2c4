/*!
 * BlueZ D-Bus transport
 * One shared system bus connection, driven by a background tokio task
 */

use async_trait::async_trait;
use dbus::arg::{ArgType, RefArg};
use dbus::nonblock::stdintf::org_freedesktop_dbus::{ObjectManager, Properties};
use dbus::nonblock::{Proxy, SyncConnection};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::bus::{
    BusError, MethodArgs, ObjectBus, ObjectTree, PropValue, BLUEZ_SERVICE, OBJECT_MANAGER_PATH,
};

pub struct BluezBus {
    conn: Arc<SyncConnection>,
    timeout: Duration,
    io_task: JoinHandle<()>,
}

impl BluezBus {
    /// Opens the system bus connection. Must be called inside a tokio runtime.
    pub fn connect(timeout: Duration) -> Result<Self, BusError> {
        let (resource, conn) = dbus_tokio::connection::new_system_sync()
            .map_err(|e| BusError::Transport(format!("failed to connect to D-Bus: {}", e)))?;

        let io_task = tokio::spawn(async move {
            let err = resource.await;
            tracing::error!("Lost connection to D-Bus: {}", err);
        });

        tracing::debug!("Connected to system bus as {}", conn.unique_name());
        Ok(Self {
            conn,
            timeout,
            io_task,
        })
    }

    /// Releases the connection. Consumes the bus, so no call can follow it.
    pub fn close(self) {
        self.io_task.abort();
        tracing::info!("D-Bus connection closed");
    }

    fn proxy(&self, path: &str) -> Result<Proxy<'static, Arc<SyncConnection>>, BusError> {
        Ok(Proxy::new(
            BLUEZ_SERVICE,
            object_path(path)?,
            self.timeout,
            self.conn.clone(),
        ))
    }
}

#[async_trait]
impl ObjectBus for BluezBus {
    async fn managed_objects(&self) -> Result<ObjectTree, BusError> {
        let proxy = self.proxy(OBJECT_MANAGER_PATH)?;
        let objects = proxy.get_managed_objects().await.map_err(classify)?;

        Ok(objects
            .into_iter()
            .map(|(path, interfaces)| {
                let interfaces = interfaces
                    .into_iter()
                    .map(|(name, props)| {
                        let props = props
                            .into_iter()
                            .map(|(key, value)| (key, prop_value(&*value.0)))
                            .collect();
                        (name, props)
                    })
                    .collect();
                (path.to_string(), interfaces)
            })
            .collect())
    }

    async fn call_method(
        &self,
        path: &str,
        interface: &str,
        method: &str,
        args: MethodArgs,
    ) -> Result<(), BusError> {
        let proxy = self.proxy(path)?;
        let reply: Result<(), dbus::Error> = match args {
            MethodArgs::None => proxy.method_call(interface, method, ()).await,
            MethodArgs::ObjectPath(target) => {
                let target = object_path(&target)?;
                proxy.method_call(interface, method, (target,)).await
            }
        };
        reply.map_err(classify)
    }

    async fn set_property(
        &self,
        path: &str,
        interface: &str,
        property: &str,
        value: PropValue,
    ) -> Result<(), BusError> {
        let proxy = self.proxy(path)?;
        let reply = match value {
            PropValue::Bool(flag) => proxy.set(interface, property, flag).await,
            PropValue::Str(text) => proxy.set(interface, property, text).await,
            PropValue::Other(signature) => {
                return Err(BusError::Decode(format!(
                    "cannot encode a value of signature {}",
                    signature
                )))
            }
        };
        reply.map_err(classify)
    }
}

fn object_path(path: &str) -> Result<dbus::Path<'static>, BusError> {
    dbus::Path::new(path.to_string())
        .map_err(|e| BusError::Transport(format!("invalid object path {}: {}", path, e)))
}

fn prop_value(arg: &(dyn RefArg + 'static)) -> PropValue {
    if let Some(flag) = dbus::arg::cast::<bool>(arg) {
        return PropValue::Bool(*flag);
    }
    if arg.arg_type() == ArgType::String {
        if let Some(text) = arg.as_str() {
            return PropValue::Str(text.to_string());
        }
    }
    PropValue::Other(arg.signature().to_string())
}

// The dbus crate reports reply deserialization failures as a generic
// `Failed` error carrying the type mismatch text.
fn classify(err: dbus::Error) -> BusError {
    let message = err.message().unwrap_or("no error message").to_string();
    if message.contains("type mismatch") {
        BusError::Decode(message)
    } else {
        BusError::Transport(format!(
            "{}: {}",
            err.name().unwrap_or("org.freedesktop.DBus.Error.Failed"),
            message
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_known_property_shapes() {
        let flag: Box<dyn RefArg> = Box::new(true);
        let name: Box<dyn RefArg> = Box::new("hci0".to_string());
        let class: Box<dyn RefArg> = Box::new(0x240404u32);

        assert_eq!(prop_value(&*flag), PropValue::Bool(true));
        assert_eq!(prop_value(&*name), PropValue::Str("hci0".into()));
        assert_eq!(prop_value(&*class), PropValue::Other("u".into()));
    }

    #[test]
    fn rejects_malformed_object_paths() {
        assert!(object_path("/org/bluez/hci0/dev_11_22_33_44_55_66").is_ok());
        assert!(matches!(
            object_path("/org/bluez/hci0/dev_zz-!!"),
            Err(BusError::Transport(_))
        ));
    }

    #[test]
    fn classifies_type_mismatch_as_decode_error() {
        let err = dbus::Error::new_failed(
            "D-Bus argument type mismatch at position 0: expected 'a{oa{sa{sv}}}', found 's'",
        );
        assert!(matches!(classify(err), BusError::Decode(_)));

        let err = dbus::Error::new_custom("org.bluez.Error.Failed", "Page Timeout");
        match classify(err) {
            BusError::Transport(msg) => assert!(msg.contains("Page Timeout")),
            other => panic!("unexpected {:?}", other),
        }
    }
}

use super::objects::Adapter;

const BLUEZ_ROOT: &str = "/org/bluez";
const DEVICE_SEGMENT: &str = "/dev_";

/// Object path of an adapter given by its short name, e.g. `hci0`.
pub fn adapter_path_from_name(name: &str) -> Option<String> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!("{}/{}", BLUEZ_ROOT, name))
}

/// Object path of the device `mac` under `adapter_path`.
///
/// Pure string construction: the MAC is not validated, so garbage input gives
/// a path that the bus later rejects.
pub fn device_path(adapter_path: &str, mac: &str) -> String {
    format!("{}{}{}", adapter_path, DEVICE_SEGMENT, mac.replace(':', "_"))
}

/// Inverse of [`device_path`]: recovers the MAC from a device object path.
pub fn mac_from_device_path(path: &str) -> Option<String> {
    let (_, encoded) = path.rsplit_once(DEVICE_SEGMENT)?;
    if encoded.contains('/') {
        return None;
    }
    Some(encoded.replace('_', ":"))
}

/// Finds the adapter whose hardware address is `mac`, ignoring ASCII case.
///
/// When several adapters report the same address the first one in object
/// path order wins.
pub fn find_adapter_path<'a>(adapters: &'a [Adapter], mac: &str) -> Option<&'a str> {
    let mut matches = adapters
        .iter()
        .filter(|adapter| adapter.address.eq_ignore_ascii_case(mac));
    let first = matches.next()?;
    if let Some(duplicate) = matches.next() {
        tracing::warn!(
            "Adapters {} and {} share address {}, using {}",
            first.path,
            duplicate.path,
            mac,
            first.path
        );
    }
    Some(first.path.as_str())
}

/// Checks for six colon-separated hex octets.
pub fn is_valid_mac(mac: &str) -> bool {
    let octets: Vec<&str> = mac.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|octet| octet.len() == 2 && octet.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(path: &str, address: &str) -> Adapter {
        Adapter {
            path: path.into(),
            address: address.into(),
            ..Default::default()
        }
    }

    #[test]
    fn short_adapter_names_live_under_bluez_root() {
        assert_eq!(
            adapter_path_from_name("hci0").as_deref(),
            Some("/org/bluez/hci0")
        );
        assert_eq!(adapter_path_from_name(""), None);
        assert_eq!(adapter_path_from_name("hci0/dev_11"), None);
        assert_eq!(adapter_path_from_name("AA:BB:CC:DD:EE:00"), None);
    }

    #[test]
    fn builds_device_path_under_adapter() {
        assert_eq!(
            device_path("/org/bluez/hci0", "11:22:33:44:55:66"),
            "/org/bluez/hci0/dev_11_22_33_44_55_66"
        );
    }

    #[test]
    fn device_path_is_injective_per_adapter() {
        let a = device_path("/org/bluez/hci0", "11:22:33:44:55:66");
        let b = device_path("/org/bluez/hci0", "11:22:33:44:55:67");
        let c = device_path("/org/bluez/hci1", "11:22:33:44:55:66");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, device_path("/org/bluez/hci0", "11:22:33:44:55:66"));
    }

    #[test]
    fn device_path_round_trips_the_mac() {
        for mac in ["11:22:33:44:55:66", "aa:bb:cc:dd:ee:ff", "A:B"] {
            let path = device_path("/org/bluez/hci0", mac);
            assert_eq!(mac_from_device_path(&path).as_deref(), Some(mac));
        }
        assert_eq!(mac_from_device_path("/org/bluez/hci0"), None);
        assert_eq!(
            mac_from_device_path("/org/bluez/hci0/dev_11_22_33_44_55_66/service0001"),
            None
        );
    }

    #[test]
    fn resolves_adapter_by_address() {
        let adapters = vec![
            adapter("/org/bluez/hci0", "AA:BB:CC:DD:EE:00"),
            adapter("/org/bluez/hci1", "AA:BB:CC:DD:EE:01"),
        ];
        assert_eq!(
            find_adapter_path(&adapters, "AA:BB:CC:DD:EE:01"),
            Some("/org/bluez/hci1")
        );
        assert_eq!(
            find_adapter_path(&adapters, "aa:bb:cc:dd:ee:00"),
            Some("/org/bluez/hci0")
        );
        assert_eq!(find_adapter_path(&adapters, "FF:FF:FF:FF:FF:FF"), None);
        assert_eq!(find_adapter_path(&[], "AA:BB:CC:DD:EE:00"), None);
    }

    #[test]
    fn duplicate_address_resolves_to_first_adapter() {
        let adapters = vec![
            adapter("/org/bluez/hci0", "AA:BB:CC:DD:EE:00"),
            adapter("/org/bluez/hci1", "AA:BB:CC:DD:EE:00"),
        ];
        assert_eq!(
            find_adapter_path(&adapters, "AA:BB:CC:DD:EE:00"),
            Some("/org/bluez/hci0")
        );
    }

    #[test]
    fn validates_mac_syntax() {
        assert!(is_valid_mac("11:22:33:44:55:66"));
        assert!(is_valid_mac("aa:BB:cc:DD:ee:FF"));
        assert!(!is_valid_mac(""));
        assert!(!is_valid_mac("11:22:33:44:55"));
        assert!(!is_valid_mac("11-22-33-44-55-66"));
        assert!(!is_valid_mac("GG:22:33:44:55:66"));
        assert!(!is_valid_mac("111:22:33:44:55:6"));
    }
}

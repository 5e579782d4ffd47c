//! `SET_NETWORK`/`GET_NETWORK` parameter table: every key wpa_supplicant's
//! network block accepts, and how its value is transformed before being put
//! on the wire. All but `ssid` and `psk` pass through unchanged; those two
//! are wrapped in double quotes (matching the configuration file format).

/// How a `SET_NETWORK` value is rendered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    Quoted,
}

impl Transform {
    pub fn apply(self, value: &str) -> String {
        match self {
            Transform::Identity => value.to_string(),
            Transform::Quoted => format!("\"{}\"", value),
        }
    }
}

const QUOTED_PARAMS: &[&str] = &["ssid", "psk"];

const PARAMS: &[&str] = &[
    "altsubject_match",
    "altsubject_match2",
    "anonymous_identity",
    "ap_max_inactivity",
    "auth_alg",
    "beacon_int",
    "bg_scan_period",
    "bgscan",
    "bssid",
    "bssid_blacklist",
    "bssid_whitelist",
    "ca_cert",
    "ca_cert2",
    "ca_cert2_id",
    "ca_cert_id",
    "ca_path",
    "ca_path2",
    "cert2_id",
    "cert_id",
    "client_cert",
    "client_cert2",
    "dh_file",
    "dh_file2",
    "disabled",
    "domain_match",
    "domain_match2",
    "domain_suffix_match",
    "domain_suffix_match2",
    "dot11MeshConfirmTimeout",
    "dot11MeshHoldingTimeout",
    "dot11MeshMaxRetries",
    "dot11MeshRetryTimeout",
    "dtim_period",
    "eap",
    "eap_workaround",
    "eapol_flags",
    "engine",
    "engine2",
    "engine2_id",
    "engine_id",
    "erp",
    "fixed_freq",
    "fragment_size",
    "freq_list",
    "frequency",
    "go_p2p_dev_addr",
    "group",
    "ht",
    "ht40",
    "id_str",
    "identity",
    "ignore_broadcast_ssid",
    "key2_id",
    "key_id",
    "key_mgmt",
    "mac_addr",
    "max_oper_chwidth",
    "mesh_basic_rates",
    "mixed_cell",
    "mode",
    "no_auto_peer",
    "ocsp",
    "openssl_ciphers",
    "p2p_client_list",
    "pac_file",
    "pairwise",
    "password",
    "pbss",
    "pcsc",
    "peerkey",
    "phase1",
    "phase2",
    "pin",
    "pin2",
    "priority",
    "private_key",
    "private_key2",
    "private_key2_passwd",
    "private_key_passwd",
    "proactive_key_caching",
    "proto",
    "psk",
    "psk_list",
    "scan_freq",
    "scan_ssid",
    "sim_num",
    "ssid",
    "subject_match",
    "subject_match2",
    "vht",
    "vht_center_freq1",
    "vht_center_freq2",
    "wep_key0",
    "wep_key1",
    "wep_key2",
    "wep_key3",
    "wep_tx_keyidx",
    "wpa_ptk_rekey",
    "wps_disabled",
];

/// Returns the transform for `key`, or `None` if `key` is not a recognized
/// `SET_NETWORK` parameter.
pub fn transform_for(key: &str) -> Option<Transform> {
    if !PARAMS.contains(&key) {
        return None;
    }
    if QUOTED_PARAMS.contains(&key) {
        Some(Transform::Quoted)
    } else {
        Some(Transform::Identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssid_and_psk_are_quoted() {
        assert_eq!(transform_for("ssid"), Some(Transform::Quoted));
        assert_eq!(transform_for("psk"), Some(Transform::Quoted));
    }

    #[test]
    fn other_known_keys_are_identity() {
        assert_eq!(transform_for("key_mgmt"), Some(Transform::Identity));
        assert_eq!(transform_for("priority"), Some(Transform::Identity));
    }

    #[test]
    fn unknown_key_is_none() {
        assert_eq!(transform_for("not_a_real_param"), None);
    }
}

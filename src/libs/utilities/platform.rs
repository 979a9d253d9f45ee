// Host facts the provisioner needs: who invoked it, whether it already runs as root,
// and which non-loopback addresses the machine answers on.

use std::env;
use std::net::IpAddr;
use std::os::unix::fs::MetadataExt;

use crate::log_debug;

/// Resolves the OS user who invoked the run.
///
/// `SUDO_USER` wins so that `sudo setup-devstack ...` still substitutes the real
/// user rather than `root`. Falls back to `USER`, then `LOGNAME`.
pub fn invoking_user() -> Option<String> {
    ["SUDO_USER", "USER", "LOGNAME"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|value| !value.trim().is_empty())
}

/// Returns `true` when the current process already has an effective uid of 0.
pub fn is_root() -> bool {
    // `/proc/self` is owned by the effective uid of the reading process.
    std::fs::metadata("/proc/self")
        .map(|meta| meta.uid() == 0)
        .unwrap_or(false)
}

/// Parses the whitespace separated output of `hostname -I` into non-loopback addresses.
pub fn non_loopback_addresses(hostname_output: &str) -> Vec<IpAddr> {
    let addresses: Vec<IpAddr> = hostname_output
        .split_whitespace()
        .filter_map(|token| token.parse::<IpAddr>().ok())
        .filter(|ip| !ip.is_loopback() && !ip.is_unspecified())
        .collect();
    log_debug!("[Platform] Non-loopback host addresses: {:?}", addresses);
    addresses
}

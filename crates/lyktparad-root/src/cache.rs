// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The discovered-server cache: the coordinator address/port a previous
//! discovery found, read at boot for the `TryCache` fast path and written
//! every time discovery succeeds.

use std::net::Ipv4Addr;

use lyktparad_kv::{keys, KvStore, Value};

/// A coordinator endpoint previously discovered and worth trying again
/// before paying for a fresh mDNS/broadcast round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedServer {
    /// Coordinator's last-known IPv4 address.
    pub addr: Ipv4Addr,
    /// Coordinator's datagram ingress port.
    pub port: u16,
}

/// Read the cached server, if one was saved by an earlier successful
/// discovery.
pub fn read_cached_server(kv: &dyn KvStore) -> Option<CachedServer> {
    let ip = kv.get(keys::SERVER_IP)?.as_str()?.parse::<Ipv4Addr>().ok()?;
    let port = kv.get(keys::SERVER_PORT)?.as_integer()?;
    let port = u16::try_from(port).ok()?;
    Some(CachedServer { addr: ip, port })
}

/// Persist a newly discovered server so the next boot can try it first.
pub fn write_cached_server(kv: &dyn KvStore, server: CachedServer) -> Result<(), lyktparad_kv::KvError> {
    kv.set(keys::SERVER_IP, Value::String(server.addr.to_string()))?;
    kv.set(keys::SERVER_PORT, Value::Integer(server.port as i64))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyktparad_kv::JsonFileKvStore;

    #[test]
    fn round_trips_through_a_real_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileKvStore::open(dir.path().join("cache.json")).unwrap();
        assert!(read_cached_server(&store).is_none());

        let server = CachedServer {
            addr: "10.0.0.5".parse().unwrap(),
            port: 8081,
        };
        write_cached_server(&store, server).unwrap();
        assert_eq!(read_cached_server(&store), Some(server));
    }

    #[test]
    fn missing_port_with_ip_present_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileKvStore::open(dir.path().join("cache.json")).unwrap();
        store.set(keys::SERVER_IP, Value::String("10.0.0.5".into())).unwrap();
        assert!(read_cached_server(&store).is_none());
    }
}

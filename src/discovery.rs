use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use mdns_sd::{ServiceDaemon, ServiceEvent};

use crate::error::{Error, Result};

pub const SMB_SERVICE_TYPE: &str = "_smb._tcp.local.";

pub type ServerMap = BTreeMap<String, Vec<Ipv4Addr>>;

/// `nas._smb._tcp.local.` -> `nas`
pub fn service_name(full_name: &str) -> &str {
    full_name.split('.').next().unwrap_or(full_name)
}

/// Finds `name` in `servers`, preferring an exact match over one that only
/// differs in case. mDNS instance names are case-insensitive.
pub fn lookup<'a>(servers: &'a ServerMap, name: &str) -> Option<(&'a String, &'a Vec<Ipv4Addr>)> {
    servers
        .get_key_value(name)
        .or_else(|| servers.iter().find(|(known, _)| known.eq_ignore_ascii_case(name)))
}

/// Tracks advertised servers and calls `update_callback` after every change.
pub struct ServerListener<F>
where
    F: FnMut(&ServerMap),
{
    servers: ServerMap,
    update_callback: F,
}

impl<F> ServerListener<F>
where
    F: FnMut(&ServerMap),
{
    pub fn new(update_callback: F) -> Self {
        Self {
            servers: ServerMap::new(),
            update_callback,
        }
    }

    pub fn servers(&self) -> &ServerMap {
        &self.servers
    }

    pub fn insert_static(&mut self, name: &str, addresses: &[Ipv4Addr]) {
        self.servers.insert(name.to_string(), addresses.to_vec());
    }

    pub fn add_service<I>(&mut self, full_name: &str, addresses: I)
    where
        I: IntoIterator<Item = IpAddr>,
    {
        let name = service_name(full_name).to_string();
        let mut addresses: Vec<Ipv4Addr> = addresses
            .into_iter()
            .filter_map(|addr| match addr {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .collect();
        addresses.sort();
        info!("Service {name} added, address(es): {addresses:?}");
        self.servers.insert(name, addresses);
        (self.update_callback)(&self.servers);
    }

    pub fn remove_service(&mut self, full_name: &str) {
        let name = service_name(full_name);
        if self.servers.remove(name).is_some() {
            info!("Service {name} removed");
            (self.update_callback)(&self.servers);
        }
    }

    /// Returns true if the server map changed.
    pub fn handle_event(&mut self, event: ServiceEvent) -> bool {
        match event {
            ServiceEvent::ServiceResolved(info) => {
                let addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
                self.add_service(info.get_fullname(), addresses);
                true
            }
            ServiceEvent::ServiceRemoved(_, full_name) => {
                let known = self.servers.contains_key(service_name(&full_name));
                self.remove_service(&full_name);
                known
            }
            other => {
                debug!("Ignoring {other:?}");
                false
            }
        }
    }
}

pub struct Discovery {
    daemon: ServiceDaemon,
    service_type: String,
}

impl Discovery {
    pub fn new(service_type: &str) -> Result<Self> {
        Ok(Self {
            daemon: ServiceDaemon::new()?,
            service_type: service_type.to_string(),
        })
    }

    /// Feeds discovery events into `listener` until `timeout` has passed.
    /// Without a timeout this only returns if the daemon goes away.
    pub fn scan<F>(&self, listener: &mut ServerListener<F>, timeout: Option<Duration>) -> Result<()>
    where
        F: FnMut(&ServerMap),
    {
        self.scan_until(listener, timeout, |_| false)
    }

    /// Scans until `name` shows up with an IPv4 address. Returns the name as
    /// advertised together with its addresses.
    pub fn resolve(&self, name: &str, timeout: Duration) -> Result<(String, Vec<Ipv4Addr>)> {
        let mut listener = ServerListener::new(|_: &ServerMap| ());
        self.scan_until(&mut listener, Some(timeout), |servers| {
            lookup(servers, name).is_some_and(|(_, addrs)| !addrs.is_empty())
        })?;
        match lookup(listener.servers(), name) {
            Some((known, addresses)) if !addresses.is_empty() => {
                Ok((known.clone(), addresses.clone()))
            }
            Some(_) => Err(Error::NoAddress(name.to_string())),
            None => Err(Error::UnknownServer(name.to_string())),
        }
    }

    fn scan_until<F, D>(
        &self,
        listener: &mut ServerListener<F>,
        timeout: Option<Duration>,
        mut done: D,
    ) -> Result<()>
    where
        F: FnMut(&ServerMap),
        D: FnMut(&ServerMap) -> bool,
    {
        info!("Browsing for {}", self.service_type);
        let receiver = self.daemon.browse(&self.service_type)?;
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let event = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    match receiver.recv_timeout(remaining) {
                        Ok(event) => event,
                        Err(_) => break,
                    }
                }
                None => match receiver.recv() {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };
            if listener.handle_event(event) && done(listener.servers()) {
                break;
            }
        }
        if let Err(e) = self.daemon.stop_browse(&self.service_type) {
            warn!("Failed to stop browsing: {e}");
        }
        Ok(())
    }
}

impl Drop for Discovery {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.shutdown() {
            warn!("Failed to shut down mDNS daemon: {e}");
        }
    }
}

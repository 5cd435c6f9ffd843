//! Mapping the controller address to the local interface that reaches it.

use std::net::Ipv4Addr;

use tracing::debug;

/// A local network interface and its hardware address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetInterface {
    pub name: String,
    pub hw_addr: [u8; 6],
}

/// Finds the interface bound to a given IPv4 address.
pub trait InterfaceResolver {
    fn resolve_interface_by_ip(&self, ip: Ipv4Addr) -> Option<NetInterface>;
}

/// A fixed address-to-interface table.
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    table: Vec<(Ipv4Addr, NetInterface)>,
}

impl StaticResolver {
    /// A resolver that knows no interfaces.
    pub fn new() -> StaticResolver {
        StaticResolver { table: Vec::new() }
    }

    /// Bind `ip` to interface `name` with hardware address `hw_addr`.
    pub fn with(mut self, ip: Ipv4Addr, name: &str, hw_addr: [u8; 6]) -> StaticResolver {
        self.table.push((ip,
                         NetInterface {
            name: name.to_owned(),
            hw_addr: hw_addr,
        }));
        self
    }
}

impl InterfaceResolver for StaticResolver {
    fn resolve_interface_by_ip(&self, ip: Ipv4Addr) -> Option<NetInterface> {
        self.table.iter().find(|(addr, _)| *addr == ip).map(|(_, iface)| iface.clone())
    }
}

/// One address record of a local interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IfAddr {
    V4 { addr: Ipv4Addr, netmask: Ipv4Addr },
    Link([u8; 6]),
}

/// Pick the interface whose IPv4 address is `ip`, or failing that the first one
/// whose subnet contains `ip`, and pair it with its link-layer address.
pub fn pick_interface(records: &[(String, IfAddr)], ip: Ipv4Addr) -> Option<NetInterface> {
    let v4 = || {
        records.iter().filter_map(|(name, rec)| match *rec {
            IfAddr::V4 { addr, netmask } => Some((name, addr, netmask)),
            IfAddr::Link(_) => None,
        })
    };
    let in_subnet = |addr: Ipv4Addr, mask: Ipv4Addr| {
        u32::from(addr) & u32::from(mask) == u32::from(ip) & u32::from(mask)
    };
    let name = v4()
        .find(|&(_, addr, _)| addr == ip)
        .or_else(|| v4().find(|&(_, addr, mask)| in_subnet(addr, mask)))
        .map(|(name, _, _)| name)?;
    let hw_addr = records.iter().find_map(|(n, rec)| match *rec {
        IfAddr::Link(hw) if n == name => Some(hw),
        _ => None,
    })?;
    debug!(%ip, iface = %name, "resolved controller interface");
    Some(NetInterface {
        name: name.clone(),
        hw_addr: hw_addr,
    })
}

/// Resolves against the host's interface list.
#[derive(Copy, Clone, Debug, Default)]
pub struct SysResolver;

impl InterfaceResolver for SysResolver {
    fn resolve_interface_by_ip(&self, ip: Ipv4Addr) -> Option<NetInterface> {
        match sys::interface_addrs() {
            Ok(records) => pick_interface(&records, ip),
            Err(e) => {
                debug!(error = %e, "failed to list interfaces");
                None
            }
        }
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::ffi::CStr;
    use std::io;
    use std::net::Ipv4Addr;
    use std::ptr;

    use super::IfAddr;

    struct IfAddrs(*mut libc::ifaddrs);

    impl Drop for IfAddrs {
        fn drop(&mut self) {
            // SAFETY: the list came from getifaddrs and is freed once.
            unsafe { libc::freeifaddrs(self.0) }
        }
    }

    unsafe fn ipv4_of(sa: *const libc::sockaddr) -> Ipv4Addr {
        let sin = &*(sa as *const libc::sockaddr_in);
        Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))
    }

    pub fn interface_addrs() -> io::Result<Vec<(String, IfAddr)>> {
        let mut head = ptr::null_mut();
        // SAFETY: on success `head` owns a list released by `IfAddrs::drop`.
        if unsafe { libc::getifaddrs(&mut head) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let list = IfAddrs(head);
        let mut records = Vec::new();
        let mut cur = list.0;
        while !cur.is_null() {
            // SAFETY: `cur` walks the list owned by `list`, which outlives the loop.
            let ifa = unsafe { &*cur };
            cur = ifa.ifa_next;
            if ifa.ifa_addr.is_null() {
                continue;
            }
            let name = unsafe { CStr::from_ptr(ifa.ifa_name) }.to_string_lossy().into_owned();
            let family = unsafe { (*ifa.ifa_addr).sa_family } as i32;
            let rec = match family {
                libc::AF_INET => {
                    let addr = unsafe { ipv4_of(ifa.ifa_addr) };
                    let netmask = if ifa.ifa_netmask.is_null() {
                        Ipv4Addr::BROADCAST
                    } else {
                        unsafe { ipv4_of(ifa.ifa_netmask) }
                    };
                    IfAddr::V4 {
                        addr: addr,
                        netmask: netmask,
                    }
                }
                libc::AF_PACKET => {
                    let sll = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_ll) };
                    if sll.sll_halen != 6 {
                        continue;
                    }
                    let mut hw = [0u8; 6];
                    hw.copy_from_slice(&sll.sll_addr[..6]);
                    IfAddr::Link(hw)
                }
                _ => continue,
            };
            records.push((name, rec));
        }
        Ok(records)
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::io;

    use super::IfAddr;

    pub fn interface_addrs() -> io::Result<Vec<(String, IfAddr)>> {
        Err(io::Error::new(io::ErrorKind::Other, "interface listing needs Linux"))
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Sockets and name resolution
//!
//! A thin layer: a [`Socket`] owns a [`Handle`], so byte transfer goes through
//! the handle's `read`/`write` or through `send`/`recv` with flags. Resolver
//! failures carry the `getaddrinfo` status, which is not an errno.

use std::ffi::{CStr, CString};
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::{FromRawFd, OwnedFd};
use std::ptr;

use nix::errno::Errno;
use nix::sys::socket::{AddressFamily, MsgFlags, SockType};
use tracing::debug;

use crate::error::{Error, Result};
use crate::handle::Handle;

/// One address returned by [`resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub address: SocketAddr,
}

impl ResolvedAddress {
    pub fn ip(&self) -> IpAddr {
        self.address.ip()
    }
}

impl std::fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address.ip())
    }
}

/// Resolve `host` to stream-socket addresses of the given family, or of any
/// family when `family` is `None`.
pub fn resolve(host: &str, family: Option<AddressFamily>) -> Result<Vec<ResolvedAddress>> {
    let c_host = CString::new(host).map_err(|_| Error::Resolve {
        host: host.to_string(),
        status: libc::EAI_NONAME,
        message: "host name contains NUL".to_string(),
    })?;

    let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
    hints.ai_family = family.map_or(libc::AF_UNSPEC, |f| f as libc::c_int);
    hints.ai_socktype = libc::SOCK_STREAM;
    hints.ai_flags = libc::AI_PASSIVE;

    let mut res: *mut libc::addrinfo = ptr::null_mut();
    let status = unsafe { libc::getaddrinfo(c_host.as_ptr(), ptr::null(), &hints, &mut res) };
    if status != 0 {
        let message = unsafe { CStr::from_ptr(libc::gai_strerror(status)) }
            .to_string_lossy()
            .into_owned();
        return Err(Error::Resolve {
            host: host.to_string(),
            status,
            message,
        });
    }

    let mut out = Vec::new();
    let mut cursor = res;
    while !cursor.is_null() {
        let info = unsafe { &*cursor };
        if let Some(address) = unsafe { socket_addr_from_raw(info.ai_addr) } {
            if !out.iter().any(|seen: &ResolvedAddress| seen.address == address) {
                out.push(ResolvedAddress { address });
            }
        }
        cursor = info.ai_next;
    }
    unsafe { libc::freeaddrinfo(res) };

    debug!(host, count = out.len(), "Resolved host");
    Ok(out)
}

unsafe fn socket_addr_from_raw(addr: *const libc::sockaddr) -> Option<SocketAddr> {
    if addr.is_null() {
        return None;
    }
    match (*addr).sa_family as libc::c_int {
        libc::AF_INET => {
            let v4 = &*(addr as *const libc::sockaddr_in);
            let ip = Ipv4Addr::from(u32::from_be(v4.sin_addr.s_addr));
            Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(v4.sin_port))))
        }
        libc::AF_INET6 => {
            let v6 = &*(addr as *const libc::sockaddr_in6);
            let ip = Ipv6Addr::from(v6.sin6_addr.s6_addr);
            Some(SocketAddr::V6(SocketAddrV6::new(
                ip,
                u16::from_be(v6.sin6_port),
                v6.sin6_flowinfo,
                v6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}

fn socket_addr_to_raw(address: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let len = match address {
        SocketAddr::V4(v4) => {
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in) };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = v4.port().to_be();
            sin.sin_addr.s_addr = u32::from(*v4.ip()).to_be();
            mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6) };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_addr.s6_addr = v6.ip().octets();
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.sin6_scope_id = v6.scope_id();
            mem::size_of::<libc::sockaddr_in6>()
        }
    };
    (storage, len as libc::socklen_t)
}

/// A socket descriptor owned through a [`Handle`] labelled `socket`.
#[derive(Debug)]
pub struct Socket {
    handle: Handle,
    family: AddressFamily,
    socket_type: SockType,
}

impl Socket {
    pub fn new(
        family: AddressFamily,
        socket_type: SockType,
        protocol: libc::c_int,
    ) -> Result<Self> {
        let raw = unsafe {
            libc::socket(family as libc::c_int, socket_type as libc::c_int, protocol)
        };
        let raw = Errno::result(raw).map_err(|errno| Error::Io {
            op: "socket",
            identity: "socket".to_string(),
            errno,
        })?;
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        Ok(Self {
            handle: Handle::adopt(fd, "socket"),
            family,
            socket_type,
        })
    }

    /// Resolve `host` and connect a stream socket to the first address that
    /// accepts the connection on `port`.
    pub fn connect_tcp(host: &str, port: u16) -> Result<Self> {
        let addresses = resolve(host, None)?.into_iter().map(|resolved| {
            let mut address = resolved.address;
            address.set_port(port);
            address
        });
        Self::connect_first(host, addresses, |family| {
            Self::new(family, SockType::Stream, 0)
        })
    }

    /// Try each address in turn. A failure to create the socket for one
    /// family moves on to the next address like a refused connection does.
    fn connect_first(
        host: &str,
        addresses: impl IntoIterator<Item = SocketAddr>,
        mut open: impl FnMut(AddressFamily) -> Result<Self>,
    ) -> Result<Self> {
        let mut last_err = None;
        for address in addresses {
            let family = match address {
                SocketAddr::V4(_) => AddressFamily::Inet,
                SocketAddr::V6(_) => AddressFamily::Inet6,
            };
            let socket = match open(family) {
                Ok(socket) => socket,
                Err(err) => {
                    debug!(%address, error = %err, "Skipping address");
                    last_err = Some(err);
                    continue;
                }
            };
            match socket.connect(&address) {
                Ok(()) => return Ok(socket),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Resolve {
            host: host.to_string(),
            status: libc::EAI_NONAME,
            message: "no usable address".to_string(),
        }))
    }

    pub fn connect(&self, address: &SocketAddr) -> Result<()> {
        let (storage, len) = socket_addr_to_raw(address);
        let r = unsafe {
            libc::connect(
                self.handle.raw(),
                &storage as *const _ as *const libc::sockaddr,
                len,
            )
        };
        Errno::result(r)
            .map(drop)
            .map_err(|errno| self.handle.io_error("connect", errno))?;
        debug!(fd = self.handle.raw(), %address, "Connected socket");
        Ok(())
    }

    /// Shut down one or both directions. Returns `false` when the socket was not
    /// connected (`ENOTCONN`); any other failure is an error.
    pub fn shutdown(&self, how: Shutdown) -> Result<bool> {
        let how = match how {
            Shutdown::Read => libc::SHUT_RD,
            Shutdown::Write => libc::SHUT_WR,
            Shutdown::Both => libc::SHUT_RDWR,
        };
        match Errno::result(unsafe { libc::shutdown(self.handle.raw(), how) }) {
            Ok(_) => Ok(true),
            Err(Errno::ENOTCONN) => Ok(false),
            Err(errno) => Err(self.handle.io_error("shutdown", errno)),
        }
    }

    pub fn send(&self, buf: &[u8], flags: MsgFlags) -> Result<usize> {
        let n = unsafe {
            libc::send(self.handle.raw(), buf.as_ptr().cast(), buf.len(), flags.bits())
        };
        Errno::result(n)
            .map(|n| n as usize)
            .map_err(|errno| self.handle.io_error("send", errno))
    }

    pub fn recv(&self, buf: &mut [u8], flags: MsgFlags) -> Result<usize> {
        let n = unsafe {
            libc::recv(self.handle.raw(), buf.as_mut_ptr().cast(), buf.len(), flags.bits())
        };
        Errno::result(n)
            .map(|n| n as usize)
            .map_err(|errno| self.handle.io_error("recv", errno))
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn socket_type(&self) -> SockType {
        self.socket_type
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut Handle {
        &mut self.handle
    }

    pub fn into_handle(self) -> Handle {
        self.handle
    }
}

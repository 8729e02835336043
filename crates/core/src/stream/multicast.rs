use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use crate::error::Result;
use crate::stream::MediaSink;

/// Destination of a media's multicast copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulticastGroup {
    pub address: Ipv4Addr,
    pub rtp_port: u16,
    pub rtcp_port: u16,
}

impl MulticastGroup {
    /// Group with the usual even/odd port pair starting at `rtp_port`.
    pub fn new(address: Ipv4Addr, rtp_port: u16) -> Self {
        Self {
            address,
            rtp_port,
            rtcp_port: rtp_port.wrapping_add(1),
        }
    }
}

/// One UDP socket sending every packet of a media once to a multicast group,
/// whatever the number of multicast readers.
#[derive(Debug)]
pub struct MulticastWriter {
    socket: UdpSocket,
    rtp_addr: SocketAddr,
    rtcp_addr: SocketAddr,
}

impl MulticastWriter {
    pub fn new(group: MulticastGroup, ttl: u32) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_multicast_ttl_v4(ttl)?;

        Ok(Self {
            socket,
            rtp_addr: SocketAddrV4::new(group.address, group.rtp_port).into(),
            rtcp_addr: SocketAddrV4::new(group.address, group.rtcp_port).into(),
        })
    }

    pub fn rtp_addr(&self) -> SocketAddr {
        self.rtp_addr
    }

    pub fn rtcp_addr(&self) -> SocketAddr {
        self.rtcp_addr
    }
}

impl MediaSink for MulticastWriter {
    fn write_rtp(&self, packet: &[u8]) -> Result<()> {
        self.socket.send_to(packet, self.rtp_addr)?;
        Ok(())
    }

    fn write_rtcp(&self, packet: &[u8]) -> Result<()> {
        self.socket.send_to(packet, self.rtcp_addr)?;
        Ok(())
    }
}

//! Wake-on-LAN trigger.
//!
//! Builds the 102-byte magic packet and fans it out over every known
//! broadcast domain. Sending is best-effort per address; only an invalid
//! hardware address fails the operation as a whole.

use crate::error::ProxyError;
use std::net::Ipv4Addr;
use tokio::net::UdpSocket;
use tracing::{info, warn};

/// Conventional Wake-on-LAN discard port.
pub const WOL_PORT: u16 = 9;

/// Magic packet size: 6 sync bytes plus the hardware address repeated 16
/// times.
pub const MAGIC_PACKET_LEN: usize = 102;

/// Parses a MAC address into its six octets.
///
/// Hyphens are accepted as separators and case is ignored; anything other
/// than 6 two-digit hex octets is rejected.
pub fn parse_mac(mac: &str) -> Result<[u8; 6], ProxyError> {
    let normalized = mac.replace('-', ":").to_ascii_lowercase();
    let mut hw = [0u8; 6];
    let mut count = 0;
    for part in normalized.split(':') {
        if count == 6 || part.len() != 2 {
            return Err(ProxyError::InvalidMac(mac.to_string()));
        }
        hw[count] = u8::from_str_radix(part, 16)
            .map_err(|_| ProxyError::InvalidMac(mac.to_string()))?;
        count += 1;
    }
    if count != 6 {
        return Err(ProxyError::InvalidMac(mac.to_string()));
    }
    Ok(hw)
}

/// Builds the magic packet for the given hardware address.
pub fn magic_packet(hw: [u8; 6]) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xffu8; MAGIC_PACKET_LEN];
    for repetition in 0..16 {
        let offset = 6 + repetition * 6;
        packet[offset..offset + 6].copy_from_slice(&hw);
    }
    packet
}

/// Sends the magic packet for `mac` to every address in `broadcasts`.
///
/// The list is deduplicated preserving order. A send failure on one
/// address is logged and the remaining addresses are still attempted; the
/// contract is best-effort across all known broadcast domains, not
/// all-or-nothing.
///
/// # Errors
///
/// Fails before any packet is sent if the MAC is invalid or the sending
/// socket cannot be created.
pub async fn wake(mac: &str, broadcasts: &[Ipv4Addr]) -> Result<(), ProxyError> {
    let hw = parse_mac(mac)?;
    let packet = magic_packet(hw);

    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;

    let mut seen: Vec<Ipv4Addr> = Vec::with_capacity(broadcasts.len());
    for &addr in broadcasts {
        if seen.contains(&addr) {
            continue;
        }
        seen.push(addr);
        match socket.send_to(&packet, (addr, WOL_PORT)).await {
            Ok(_) => info!("WOL magic packet for {} sent via {}:{}", mac, addr, WOL_PORT),
            Err(e) => warn!("WOL send via {} failed: {}", addr, e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mac_normalizes() {
        let hw = parse_mac("AA-BB-CC-DD-EE-FF").unwrap();
        assert_eq!(hw, [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(parse_mac("aa:bb:cc:dd:ee:ff").unwrap(), hw);
    }

    #[test]
    fn test_parse_mac_rejects_garbage() {
        assert!(parse_mac("aa:bb:cc:dd:ee").is_err());
        assert!(parse_mac("aa:bb:cc:dd:ee:ff:00").is_err());
        assert!(parse_mac("aa:bb:cc:dd:ee:fg").is_err());
        assert!(parse_mac("aabb:cc:dd:ee:ff").is_err());
        assert!(parse_mac("").is_err());
    }

    #[test]
    fn test_magic_packet_layout() {
        let hw = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        let packet = magic_packet(hw);

        assert_eq!(packet.len(), MAGIC_PACKET_LEN);
        assert_eq!(&packet[..6], &[0xff; 6]);
        for repetition in 0..16 {
            let offset = 6 + repetition * 6;
            assert_eq!(&packet[offset..offset + 6], &hw);
        }
    }

    #[tokio::test]
    async fn test_wake_rejects_invalid_mac_before_sending() {
        let result = wake("not-a-mac", &[Ipv4Addr::BROADCAST]).await;
        assert!(matches!(result, Err(ProxyError::InvalidMac(_))));
    }

    #[tokio::test]
    async fn test_magic_packet_transmits_intact() {
        // wake() always targets the privileged WOL port, so transmit the
        // same packet to a loopback receiver instead.
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let packet = magic_packet(parse_mac("aa:bb:cc:dd:ee:ff").unwrap());
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&packet, ("127.0.0.1", port)).await.unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, MAGIC_PACKET_LEN);
        assert_eq!(&buf[..6], &[0xff; 6]);
    }
}

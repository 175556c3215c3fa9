//! `nthIPInNetwork(prefix, offset)` — walk the network address `offset`
//! times (offset 0=network, 1=gateway, 2+=usable).

use std::net::Ipv4Addr;

use crate::error::TalosError;

/// Default cluster network CIDR (spec §4.10).
pub const DEFAULT_NETWORK_CIDR: &str = "10.5.0.0/24";

/// Reject an IPv6 network literal, per spec §4.10.
///
/// # Errors
///
/// Returns [`TalosError::Ipv6NotSupported`] if `cidr` contains a colon.
pub fn reject_ipv6(cidr: &str) -> Result<(), TalosError> {
    if cidr.contains(':') {
        return Err(TalosError::Ipv6NotSupported(cidr.to_string()));
    }
    Ok(())
}

/// Return the `offset`-th address in `cidr`, counting from the network
/// address at offset 0.
///
/// # Errors
///
/// - [`TalosError::NegativeOffset`] if `offset < 0`.
/// - [`TalosError::Ipv6NotSupported`] if `cidr` is an IPv6 network.
/// - [`TalosError::InvalidCidr`] if `cidr` does not parse as `a.b.c.d/nn`.
/// - [`TalosError::OffsetOutOfRange`] if `offset` walks past the end of the
///   network.
pub fn nth_ip_in_network(cidr: &str, offset: i64) -> Result<Ipv4Addr, TalosError> {
    if offset < 0 {
        return Err(TalosError::NegativeOffset(offset));
    }
    reject_ipv6(cidr)?;

    let (address_part, prefix_len_part) = cidr
        .split_once('/')
        .ok_or_else(|| TalosError::InvalidCidr(cidr.to_string()))?;
    let address: Ipv4Addr = address_part
        .parse()
        .map_err(|_| TalosError::InvalidCidr(cidr.to_string()))?;
    let prefix_len: u32 = prefix_len_part
        .parse()
        .map_err(|_| TalosError::InvalidCidr(cidr.to_string()))?;
    if prefix_len > 32 {
        return Err(TalosError::InvalidCidr(cidr.to_string()));
    }

    let mask: u32 = if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len)
    };
    let network = u32::from(address) & mask;
    let network_size: u64 = if prefix_len >= 32 {
        1
    } else {
        1u64 << (32 - prefix_len)
    };

    let offset = offset as u64;
    if offset >= network_size {
        return Err(TalosError::OffsetOutOfRange {
            offset: offset as i64,
            network_size,
        });
    }

    Ok(Ipv4Addr::from((u64::from(network) + offset) as u32))
}

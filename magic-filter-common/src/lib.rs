#![cfg_attr(not(test), no_std)]

// Classification pipeline shared between the XDP program and userspace.
// Keep this crate `no_std` and allocation free so the exact code the kernel
// runs can also be exercised on the host.

mod bounds;
mod header;
mod pipeline;

pub use bounds::{Cursor, FrameBounds};
pub use header::{AppHeader, FrameKind};
pub use pipeline::{
    Classification, Layer, Step, classify, classify_slice, decode_ethernet, decode_ipv4,
    decode_udp, has_magic, inspect_payload, locate_payload,
};

pub const ETH_HDR_SIZE: usize = 14;
pub const ETH_TYPE_OFFSET: usize = 12;
pub const ETH_P_IPV4: u16 = 0x0800;

pub const IPV4_MIN_HEADER_BYTES: usize = 20;
pub const IPV4_PROTO_OFFSET: usize = 9;
pub const PROTO_UDP: u8 = 17;

pub const UDP_HDR_SIZE: usize = 8;
pub const UDP_DEST_OFFSET: usize = 2;

/// Destination port the application protocol listens on.
pub const APP_PORT: u16 = 9999;
/// Leading payload bytes that tag the application protocol ("PC").
pub const APP_MAGIC: [u8; 2] = [0x50, 0x43];
/// Payload bytes that must be present before the magic is compared.
pub const APP_HEADER_BYTES: usize = 8;

/// Terminal action for a classified frame.
///
/// Only `Pass` exists today. Steering matched frames elsewhere (for example
/// a redirect to a dedicated core) would add a variant here.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    Pass,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
        }
    }
}

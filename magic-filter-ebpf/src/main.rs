#![no_std]
#![no_main]

use aya_ebpf::bindings::xdp_action;
use aya_ebpf::macros::xdp;
use aya_ebpf::programs::XdpContext;
use aya_log_ebpf::debug;
use magic_filter_common::{APP_PORT, Classification, FrameBounds, Verdict, classify};

#[xdp]
pub fn xdp_magic_filter(ctx: XdpContext) -> u32 {
    let frame = unsafe { FrameBounds::from_raw(ctx.data(), ctx.data_end()) };
    let classification = classify(&frame);
    if let Classification::Matched = classification {
        // Steering slot: matched frames still go up the stack.
        debug!(&ctx, "signature match on udp/{}", APP_PORT);
    }
    xdp_verdict(classification.verdict())
}

#[inline(always)]
fn xdp_verdict(verdict: Verdict) -> u32 {
    match verdict {
        Verdict::Pass => xdp_action::XDP_PASS,
        _ => xdp_action::XDP_PASS,
    }
}

#[unsafe(link_section = "license")]
#[unsafe(no_mangle)]
static LICENSE: [u8; 4] = *b"GPL\0";

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

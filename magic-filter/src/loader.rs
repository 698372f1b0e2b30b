use anyhow::{Context, Result, ensure};
use aya::programs::xdp::XdpLinkId;
use aya::programs::{Xdp, XdpFlags};
use aya::{Ebpf, include_bytes_aligned};
use aya_log::EbpfLogger;
use clap::ValueEnum;
use tokio::signal;
use tracing::{info, warn};

const EBPF_BYTES: &[u8] = include_bytes_aligned!(concat!(env!("OUT_DIR"), "/magic-filter"));
const XDP_PROGRAM: &str = "xdp_magic_filter";
// IFNAMSIZ includes the trailing NUL.
const MAX_IFACE_LEN: usize = 15;

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum XdpMode {
    Skb,
    Driver,
    Hw,
}

#[derive(Clone, Debug)]
pub struct AttachOptions {
    pub iface: String,
    pub xdp_mode: XdpMode,
}

/// Attach the classifier to `opts.iface` and keep it there until Ctrl+C.
pub async fn attach_program(opts: AttachOptions) -> Result<()> {
    validate_attach_options(&opts)?;

    let mut bpf = Ebpf::load(EBPF_BYTES).context("failed to load eBPF object")?;
    if let Err(err) = EbpfLogger::init(&mut bpf) {
        // Only fails when the object carries no log statements.
        warn!("failed to initialize eBPF logger: {err}");
    }

    let link = attach_xdp(&mut bpf, &opts.iface, opts.xdp_mode)?;
    info!(
        iface = %opts.iface,
        mode = ?opts.xdp_mode,
        "attached {XDP_PROGRAM}, press Ctrl+C to detach"
    );

    signal::ctrl_c()
        .await
        .context("failed to wait for shutdown signal")?;

    info!(iface = %opts.iface, "detaching {XDP_PROGRAM}");
    detach(&mut bpf, link)
}

fn validate_attach_options(opts: &AttachOptions) -> Result<()> {
    ensure!(!opts.iface.is_empty(), "interface name must not be empty");
    ensure!(
        opts.iface.len() <= MAX_IFACE_LEN,
        "interface name '{}' exceeds {MAX_IFACE_LEN} bytes",
        opts.iface
    );
    Ok(())
}

fn xdp_program(bpf: &mut Ebpf) -> Result<&mut Xdp> {
    bpf.program_mut(XDP_PROGRAM)
        .with_context(|| format!("program {XDP_PROGRAM} not found"))?
        .try_into()
        .context("xdp program has wrong type")
}

fn attach_xdp(bpf: &mut Ebpf, iface: &str, mode: XdpMode) -> Result<XdpLinkId> {
    let program = xdp_program(bpf)?;
    program.load().context("failed to load xdp program")?;
    program
        .attach(iface, xdp_flags(mode))
        .with_context(|| format!("failed to attach xdp on {iface}"))
}

fn detach(bpf: &mut Ebpf, link: XdpLinkId) -> Result<()> {
    xdp_program(bpf)?
        .detach(link)
        .context("failed to detach xdp program")
}

fn xdp_flags(mode: XdpMode) -> XdpFlags {
    match mode {
        XdpMode::Skb => XdpFlags::SKB_MODE,
        XdpMode::Driver => XdpFlags::DRV_MODE,
        XdpMode::Hw => XdpFlags::HW_MODE,
    }
}

use crate::{
    APP_HEADER_BYTES, APP_MAGIC, APP_PORT, Cursor, ETH_HDR_SIZE, ETH_P_IPV4, ETH_TYPE_OFFSET,
    FrameBounds, IPV4_MIN_HEADER_BYTES, IPV4_PROTO_OFFSET, PROTO_UDP, UDP_DEST_OFFSET,
    UDP_HDR_SIZE, Verdict,
};

/// Result of a single decoder stage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Header validated and matched; decoding continues at the cursor.
    Continue(Cursor),
    /// Header present but carries a protocol we don't filter on.
    NotApplicable,
    /// The frame ends before the stage's bytes.
    Insufficient,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Layer {
    Ethernet,
    Ipv4,
    Udp,
    Payload,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Ethernet => "ethernet",
            Layer::Ipv4 => "ipv4",
            Layer::Udp => "udp",
            Layer::Payload => "payload",
        }
    }
}

/// Where and why the pipeline stopped for one frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Classification {
    Insufficient(Layer),
    NotApplicable(Layer),
    Matched,
}

impl Classification {
    pub fn layer(self) -> Layer {
        match self {
            Classification::Insufficient(layer) | Classification::NotApplicable(layer) => layer,
            Classification::Matched => Layer::Payload,
        }
    }

    pub fn is_match(self) -> bool {
        matches!(self, Classification::Matched)
    }

    pub fn kind(self) -> &'static str {
        match self {
            Classification::Insufficient(_) => "insufficient",
            Classification::NotApplicable(_) => "not-applicable",
            Classification::Matched => "matched",
        }
    }

    /// Every classification passes to the stack; matches are only observed.
    #[inline(always)]
    pub fn verdict(self) -> Verdict {
        Verdict::Pass
    }
}

impl Step {
    #[inline(always)]
    fn or_stop(self, layer: Layer) -> Result<Cursor, Classification> {
        match self {
            Step::Continue(cursor) => Ok(cursor),
            Step::NotApplicable => Err(Classification::NotApplicable(layer)),
            Step::Insufficient => Err(Classification::Insufficient(layer)),
        }
    }
}

#[inline(always)]
pub fn decode_ethernet(frame: &FrameBounds<'_>) -> Step {
    let cursor = Cursor::START;
    let at = cursor.offset();
    if !frame.fits(at, ETH_HDR_SIZE) {
        return Step::Insufficient;
    }
    match frame.read_u16_be(at + ETH_TYPE_OFFSET) {
        Some(ETH_P_IPV4) => Step::Continue(cursor.advance(ETH_HDR_SIZE)),
        Some(_) => Step::NotApplicable,
        None => Step::Insufficient,
    }
}

#[inline(always)]
pub fn decode_ipv4(frame: &FrameBounds<'_>, cursor: Cursor) -> Step {
    let at = cursor.offset();
    if !frame.fits(at, IPV4_MIN_HEADER_BYTES) {
        return Step::Insufficient;
    }
    match frame.read_u8(at + IPV4_PROTO_OFFSET) {
        Some(PROTO_UDP) => {}
        Some(_) => return Step::NotApplicable,
        None => return Step::Insufficient,
    }
    match ipv4_header_len(frame, at) {
        Ok(header_len) => Step::Continue(cursor.advance(header_len)),
        Err(step) => step,
    }
}

// Options are not accounted for: the transport header is assumed to follow
// the fixed part of the IPv4 header.
#[cfg(not(feature = "ipv4-options"))]
#[inline(always)]
fn ipv4_header_len(_frame: &FrameBounds<'_>, _at: usize) -> Result<usize, Step> {
    Ok(IPV4_MIN_HEADER_BYTES)
}

#[cfg(feature = "ipv4-options")]
#[inline(always)]
fn ipv4_header_len(frame: &FrameBounds<'_>, at: usize) -> Result<usize, Step> {
    let version_ihl = frame.read_u8(at).ok_or(Step::Insufficient)?;
    if version_ihl >> 4 != 4 {
        return Err(Step::NotApplicable);
    }
    let ihl_words = (version_ihl & 0x0f) as usize;
    if ihl_words < 5 {
        return Err(Step::NotApplicable);
    }
    let header_len = ihl_words * 4;
    if !frame.fits(at, header_len) {
        return Err(Step::Insufficient);
    }
    Ok(header_len)
}

#[inline(always)]
pub fn decode_udp(frame: &FrameBounds<'_>, cursor: Cursor) -> Step {
    let at = cursor.offset();
    if !frame.fits(at, UDP_HDR_SIZE) {
        return Step::Insufficient;
    }
    match frame.read_u16_be(at + UDP_DEST_OFFSET) {
        Some(APP_PORT) => Step::Continue(cursor.advance(UDP_HDR_SIZE)),
        Some(_) => Step::NotApplicable,
        None => Step::Insufficient,
    }
}

/// Checks the application header at the start of the UDP payload.
///
/// Yields `Continue` with the cursor left at the payload start when the
/// signature matches.
#[inline(always)]
pub fn inspect_payload(frame: &FrameBounds<'_>, cursor: Cursor) -> Step {
    let at = cursor.offset();
    if !frame.fits(at, APP_HEADER_BYTES) {
        return Step::Insufficient;
    }
    match frame.read_bytes::<2>(at) {
        Some(head) if has_magic(head) => Step::Continue(cursor),
        Some(_) => Step::NotApplicable,
        None => Step::Insufficient,
    }
}

#[inline(always)]
pub fn has_magic(head: [u8; 2]) -> bool {
    head[0] == APP_MAGIC[0] && head[1] == APP_MAGIC[1]
}

/// Runs the Ethernet, IPv4 and UDP stages and returns the payload cursor.
#[inline(always)]
pub fn locate_payload(frame: &FrameBounds<'_>) -> Result<Cursor, Classification> {
    let cursor = decode_ethernet(frame).or_stop(Layer::Ethernet)?;
    let cursor = decode_ipv4(frame, cursor).or_stop(Layer::Ipv4)?;
    decode_udp(frame, cursor).or_stop(Layer::Udp)
}

#[inline(always)]
pub fn classify(frame: &FrameBounds<'_>) -> Classification {
    match try_classify(frame) {
        Ok(classification) | Err(classification) => classification,
    }
}

pub fn classify_slice(frame: &[u8]) -> Classification {
    classify(&FrameBounds::from_slice(frame))
}

#[inline(always)]
fn try_classify(frame: &FrameBounds<'_>) -> Result<Classification, Classification> {
    let cursor = locate_payload(frame)?;
    inspect_payload(frame, cursor).or_stop(Layer::Payload)?;
    Ok(Classification::Matched)
}

use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
};

use anyhow::{Context, Result, anyhow};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value};
use tracing::{debug, info};

use magic_filter_common::{AppHeader, Classification, FrameBounds, classify, locate_payload};

#[derive(Clone, Debug)]
pub struct ReplayOptions {
    pub input: PathBuf,
    pub json: bool,
}

struct Frame {
    line: usize,
    bytes: Vec<u8>,
}

struct Replayed {
    index: usize,
    line: usize,
    len: usize,
    classification: Classification,
    header: Option<AppHeader>,
}

/// Classify every frame of a hex dump with the same pipeline the XDP
/// program runs and print the outcome of each.
pub fn run_replay(opts: ReplayOptions) -> Result<()> {
    let frames = if opts.input.as_os_str() == "-" {
        read_frames(io::stdin().lock(), "stdin")?
    } else {
        let file = File::open(&opts.input)
            .with_context(|| format!("failed to open {}", opts.input.display()))?;
        read_frames(BufReader::new(file), &opts.input.display().to_string())?
    };
    debug!(frames = frames.len(), "loaded frames");

    let replayed = replay(&frames);
    let summary = tally(&replayed);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if opts.json {
        serde_json::to_writer_pretty(&mut out, &report_json(&replayed, &summary))
            .context("failed to write json report")?;
        writeln!(out)?;
    } else {
        for entry in &replayed {
            writeln!(out, "{}", describe(entry))?;
        }
        for (key, count) in &summary {
            writeln!(out, "{key}: {count}")?;
        }
    }

    let matched = replayed
        .iter()
        .filter(|r| r.classification.is_match())
        .count();
    info!(frames = replayed.len(), matched, "replay finished");
    Ok(())
}

fn read_frames<R: BufRead>(reader: R, label: &str) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line =
            line.with_context(|| format!("failed to read line {} of {label}", line_no + 1))?;
        let trimmed = line.split('#').next().unwrap_or("").trim();
        if trimmed.is_empty() {
            continue;
        }
        let cleaned: String = trimmed
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();
        let bytes = hex::decode(&cleaned)
            .map_err(|e| anyhow!("invalid hex on line {} of {label}: {e}", line_no + 1))?;
        frames.push(Frame {
            line: line_no + 1,
            bytes,
        });
    }
    Ok(frames)
}

fn replay(frames: &[Frame]) -> Vec<Replayed> {
    frames
        .iter()
        .enumerate()
        .map(|(idx, frame)| {
            let bounds = FrameBounds::from_slice(&frame.bytes);
            let classification = classify(&bounds);
            let header = if classification.is_match() {
                locate_payload(&bounds)
                    .ok()
                    .and_then(|cursor| AppHeader::decode(&bounds, cursor))
            } else {
                None
            };
            Replayed {
                index: idx + 1,
                line: frame.line,
                len: frame.bytes.len(),
                classification,
                header,
            }
        })
        .collect()
}

fn tally(replayed: &[Replayed]) -> BTreeMap<String, u64> {
    let mut summary = BTreeMap::new();
    for entry in replayed {
        let key = format!(
            "{}/{}",
            entry.classification.kind(),
            entry.classification.layer().as_str()
        );
        *summary.entry(key).or_insert(0) += 1;
    }
    summary
}

fn describe(entry: &Replayed) -> String {
    let c = entry.classification;
    let mut text = format!(
        "frame {} (line {}, {} bytes): {} at {} -> {}",
        entry.index,
        entry.line,
        entry.len,
        c.kind(),
        c.layer().as_str(),
        c.verdict().as_str()
    );
    if let Some(header) = entry.header {
        let kind = header.frame_kind().map_or("?", |k| k.as_str());
        text.push_str(&format!(
            " [type {kind}, flags {:#04x}, length {}]",
            header.flags, header.payload_length
        ));
    }
    text
}

fn report_json(replayed: &[Replayed], summary: &BTreeMap<String, u64>) -> Value {
    let frames = replayed
        .iter()
        .map(|entry| {
            let c = entry.classification;
            let mut obj = JsonMap::new();
            obj.insert("frame".to_string(), Value::Number(JsonNumber::from(entry.index)));
            obj.insert("line".to_string(), Value::Number(JsonNumber::from(entry.line)));
            obj.insert("len".to_string(), Value::Number(JsonNumber::from(entry.len)));
            obj.insert(
                "classification".to_string(),
                Value::String(c.kind().to_string()),
            );
            obj.insert(
                "layer".to_string(),
                Value::String(c.layer().as_str().to_string()),
            );
            obj.insert(
                "verdict".to_string(),
                Value::String(c.verdict().as_str().to_string()),
            );
            if let Some(header) = entry.header {
                obj.insert("header".to_string(), header_json(&header));
            }
            Value::Object(obj)
        })
        .collect();

    let summary = summary
        .iter()
        .map(|(key, count)| (key.clone(), Value::Number(JsonNumber::from(*count))))
        .collect::<JsonMap<_, _>>();

    let mut report = JsonMap::new();
    report.insert("frames".to_string(), Value::Array(frames));
    report.insert("summary".to_string(), Value::Object(summary));
    Value::Object(report)
}

fn header_json(header: &AppHeader) -> Value {
    let mut obj = JsonMap::new();
    obj.insert(
        "frame_type".to_string(),
        Value::Number(JsonNumber::from(header.frame_type)),
    );
    if let Some(kind) = header.frame_kind() {
        obj.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
    }
    obj.insert(
        "flags".to_string(),
        Value::Number(JsonNumber::from(header.flags)),
    );
    obj.insert(
        "payload_length".to_string(),
        Value::Number(JsonNumber::from(header.payload_length)),
    );
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use magic_filter_common::Layer;
    use std::io::Cursor;

    const ETH_IP: &str = "020000000001 020000000002 0800 \
                          4500 0024 0000 4000 4011 0000 0a000001 0a000002";
    const UDP_APP: &str = "9c40 270f 0010 0000";
    const UDP_DNS: &str = "9c40 0035 0010 0000";
    const PAYLOAD: &str = "5043 01 00 00001000";

    fn frames(input: &str) -> Vec<Frame> {
        read_frames(Cursor::new(input), "test").expect("valid input")
    }

    #[test]
    fn read_frames_skips_comments_and_blank_lines() {
        let input = "# captured on eth0\n\n  aa bb:cc  # trailing\n\t\ndd\n";
        let parsed = frames(input);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].line, 3);
        assert_eq!(parsed[0].bytes, vec![0xaa, 0xbb, 0xcc]);
        assert_eq!(parsed[1].line, 5);
        assert_eq!(parsed[1].bytes, vec![0xdd]);
    }

    #[test]
    fn read_frames_reports_bad_line() {
        let err = read_frames(Cursor::new("aabb\nzz\n"), "dump.hex")
            .err()
            .expect("invalid hex must fail");
        let msg = err.to_string();
        assert!(msg.contains("line 2"), "{msg}");
        assert!(msg.contains("dump.hex"), "{msg}");
    }

    #[test]
    fn odd_length_hex_is_rejected() {
        assert!(read_frames(Cursor::new("abc\n"), "test").is_err());
    }

    #[test]
    fn replay_classifies_each_frame() {
        let input = format!(
            "{ETH_IP} {UDP_APP} {PAYLOAD}\n\
             {ETH_IP} {UDP_DNS} {PAYLOAD}\n\
             {ETH_IP} {UDP_APP} 5043\n\
             0200000000010200\n"
        );
        let replayed = replay(&frames(&input));
        let classes: Vec<_> = replayed.iter().map(|r| r.classification).collect();
        assert_eq!(
            classes,
            vec![
                Classification::Matched,
                Classification::NotApplicable(Layer::Udp),
                Classification::Insufficient(Layer::Payload),
                Classification::Insufficient(Layer::Ethernet),
            ]
        );
        assert_eq!(replayed[0].len, 50);

        let header = replayed[0].header.expect("matched frame has a header");
        assert_eq!(header.frame_type, 1);
        assert_eq!(header.payload_length, 0x1000);
        assert!(replayed[1].header.is_none());
    }

    #[test]
    fn sample_capture_replays() {
        let replayed = replay(&frames(include_str!("../testdata/frames.hex")));
        let classes: Vec<_> = replayed.iter().map(|r| r.classification).collect();
        assert_eq!(
            classes,
            vec![
                Classification::Matched,
                Classification::Insufficient(Layer::Payload),
                Classification::NotApplicable(Layer::Udp),
                Classification::NotApplicable(Layer::Ethernet),
            ]
        );
        assert_eq!(replayed[3].line, 8);
    }

    #[test]
    fn describe_includes_header_for_matches() {
        let replayed = replay(&frames(&format!("{ETH_IP} {UDP_APP} {PAYLOAD}\n")));
        assert_eq!(
            describe(&replayed[0]),
            "frame 1 (line 1, 50 bytes): matched at payload -> PASS \
             [type I, flags 0x00, length 4096]"
        );
    }

    #[test]
    fn describe_plain_outcome() {
        let replayed = replay(&frames(&format!("{ETH_IP} {UDP_DNS}\n")));
        assert_eq!(
            describe(&replayed[0]),
            "frame 1 (line 1, 42 bytes): not-applicable at udp -> PASS"
        );
    }

    #[test]
    fn tally_groups_by_kind_and_layer() {
        let input = format!(
            "{ETH_IP} {UDP_APP} {PAYLOAD}\n\
             {ETH_IP} {UDP_APP} {PAYLOAD}\n\
             {ETH_IP} {UDP_DNS}\n"
        );
        let summary = tally(&replay(&frames(&input)));
        assert_eq!(summary.get("matched/payload"), Some(&2));
        assert_eq!(summary.get("not-applicable/udp"), Some(&1));
        assert_eq!(summary.len(), 2);
    }

    #[test]
    fn json_report_shape() {
        let replayed = replay(&frames(&format!(
            "{ETH_IP} {UDP_APP} {PAYLOAD}\n0800\n"
        )));
        let report = report_json(&replayed, &tally(&replayed));

        let frames = report["frames"].as_array().expect("frames array");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["classification"], "matched");
        assert_eq!(frames[0]["verdict"], "PASS");
        assert_eq!(frames[0]["header"]["kind"], "I");
        assert_eq!(frames[0]["header"]["payload_length"], 4096);
        assert_eq!(frames[1]["classification"], "insufficient");
        assert_eq!(frames[1]["layer"], "ethernet");
        assert!(frames[1].get("header").is_none());

        assert_eq!(report["summary"]["matched/payload"], 1);
        assert_eq!(report["summary"]["insufficient/ethernet"], 1);
    }
}

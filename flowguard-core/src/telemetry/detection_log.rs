//! Structured, write-only sink for classification events. JSON Lines was
//! chosen because it composes with standard log shippers and matches the
//! rest of the stack's preference for parseable structured output over ad
//! hoc text.

use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use serde::Serialize;

use crate::analyzer::{ReasonTag, Transport};

#[derive(Debug, Clone, Serialize)]
pub struct DetectionRecord {
    pub timestamp: u64,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub transport: TransportLabel,
    pub reason: ReasonLabel,
    pub payload_prefix_hex: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportLabel {
    Tcp,
    Udp,
}

impl From<Transport> for TransportLabel {
    fn from(t: Transport) -> Self {
        match t {
            Transport::Tcp => TransportLabel::Tcp,
            Transport::Udp => TransportLabel::Udp,
        }
    }
}

/// Newtype so `ReasonTag` (no `Serialize` impl of its own, to keep the
/// analyzer free of serde) can still be logged.
#[derive(Debug, Clone, Copy)]
pub struct ReasonLabel(pub ReasonTag);

impl Serialize for ReasonLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

const PAYLOAD_PREFIX_LEN: usize = 32;

impl DetectionRecord {
    pub fn new(
        timestamp: u64,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        transport: Transport,
        reason: ReasonTag,
        payload: &[u8],
    ) -> Self {
        let prefix = &payload[..payload.len().min(PAYLOAD_PREFIX_LEN)];
        Self {
            timestamp,
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            transport: transport.into(),
            reason: ReasonLabel(reason),
            payload_prefix_hex: hex_encode(prefix),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A write-only stream accepting [`DetectionRecord`]s. Optional: the
/// pipeline runs fine with no sink configured.
pub trait DetectionLogSink: Send + Sync {
    fn record(&self, record: &DetectionRecord);
}

/// Appends one JSON object per line to any `Write` implementation
/// (typically a file or stdout).
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }
}

impl<W: Write + Send> DetectionLogSink for JsonLinesSink<W> {
    fn record(&self, record: &DetectionRecord) {
        let Ok(line) = serde_json::to_string(record) else { return };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_sink_writes_one_line_per_record() {
        let buf: Vec<u8> = Vec::new();
        let sink = JsonLinesSink::new(buf);
        let record = DetectionRecord::new(
            1_000,
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            1234,
            6881,
            Transport::Tcp,
            ReasonTag::SignatureBT,
            b"\x13BitTorrent protocol",
        );
        sink.record(&record);

        let written = sink.writer.into_inner().unwrap();
        let text = String::from_utf8(written).unwrap();
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.contains("\"reason\":\"signature_bt\""));
    }

    #[test]
    fn payload_prefix_is_truncated_and_hex_encoded() {
        let payload = vec![0xABu8; 100];
        let record = DetectionRecord::new(
            0,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            0,
            0,
            Transport::Udp,
            ReasonTag::Utp,
            &payload,
        );
        assert_eq!(record.payload_prefix_hex.len(), PAYLOAD_PREFIX_LEN * 2);
    }
}

//! Typed view of the `srtsink` statistics structure.
//!
//! The sink's `stats` property is a dynamically typed `GstStructure`:
//!
//! ```text
//! application/x-srt-statistics, callers=(GValueArray)<
//!   "application/x-srt-statistics, packets-sent=(gint64)134,
//!    bytes-sent=(guint64)31088, send-rate-mbps=(double)0.27, ...,
//!    caller-address=(GSocketAddress)..." >,
//!   bytes-sent-total=(guint64)25192;
//! ```
//!
//! Decoding is all-or-nothing per poll: every field is extracted with an
//! explicit expected type and any missing or mistyped field aborts the whole
//! decode with a field-qualified error. The only tolerated absence is the
//! `callers` array itself, which simply means nobody is subscribed.

use gstreamer as gst;
use gstreamer::glib;
use std::net::IpAddr;
use thiserror::Error;

/// Structure name the sink tags its statistics record with.
pub const SRT_STATS_STRUCTURE_NAME: &str = "application/x-srt-statistics";

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("structure has wrong name, expected '{SRT_STATS_STRUCTURE_NAME}' but got '{0}'")]
    WrongStructure(String),

    #[error("missing or mistyped field '{name}' (expected {expected})")]
    Field {
        name: &'static str,
        expected: &'static str,
    },

    #[error("caller entry {index} is not a structure")]
    CallerEntry { index: usize },

    #[error("failed to resolve caller address: {0}")]
    CallerAddress(String),
}

/// Statistics snapshot of one SRT sink.
#[derive(Debug, Clone, Default)]
pub struct SrtStats {
    /// One entry per connected subscriber; empty when nobody listens.
    pub callers: Vec<SrtCallerStats>,
    pub bytes_sent_total: u64,
    /// Milliseconds since the Unix epoch at decode time.
    pub timestamp_ms: i64,
}

/// Per-subscriber transfer statistics.
#[derive(Debug, Clone)]
pub struct SrtCallerStats {
    pub send_duration_us: u64,
    pub send_rate_mbps: f64,
    pub receive_rate_mbps: f64,
    pub bandwidth_mbps: f64,
    pub rtt_ms: f64,

    pub bytes_sent: u64,
    pub bytes_retransmitted: u64,
    pub bytes_sent_dropped: u64,
    pub bytes_received: u64,
    pub bytes_received_lost: u64,

    /// Signed on purpose: the engine reports this as gint64 and has been
    /// observed to go negative. Carried through as-is, never clamped.
    pub packets_sent: i64,
    pub packets_received: i64,
    pub packets_sent_lost: i32,
    pub packets_sent_dropped: i32,
    pub packets_retransmitted: i32,
    pub packet_ack_received: i32,
    pub packet_nack_received: i32,

    pub packets_received_lost: i32,
    pub packets_received_retransmitted: i32,
    pub packets_received_dropped: i32,
    pub packet_ack_sent: i32,
    pub packet_nack_sent: i32,

    pub negotiated_latency_ms: i32,

    pub caller_address: IpAddr,
    pub caller_port: u16,
}

/// Extract a field with its expected type, mapping both absence and a type
/// mismatch to one field-qualified error.
fn field<'a, T>(s: &'a gst::StructureRef, name: &'static str) -> Result<T, StatsError>
where
    T: glib::value::FromValue<'a>,
{
    s.get::<T>(name).map_err(|_| StatsError::Field {
        name,
        expected: std::any::type_name::<T>(),
    })
}

impl SrtStats {
    /// Decode the sink's statistics structure. Single pass, no retries.
    pub fn from_structure(s: &gst::StructureRef) -> Result<Self, StatsError> {
        if s.name() != SRT_STATS_STRUCTURE_NAME {
            return Err(StatsError::WrongStructure(s.name().to_string()));
        }

        let mut stats = SrtStats {
            callers: Vec::new(),
            bytes_sent_total: field(s, "bytes-sent-total")?,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        };

        // Absent when no subscriber is connected, which is not an error.
        let Ok(callers) = s.get::<glib::ValueArray>("callers") else {
            return Ok(stats);
        };

        stats.callers.reserve(callers.len());
        for (index, entry) in callers.iter().enumerate() {
            let caller = entry
                .get::<gst::Structure>()
                .map_err(|_| StatsError::CallerEntry { index })?;
            stats.callers.push(SrtCallerStats::from_structure(&caller)?);
        }

        Ok(stats)
    }
}

impl SrtCallerStats {
    fn from_structure(s: &gst::StructureRef) -> Result<Self, StatsError> {
        if s.name() != SRT_STATS_STRUCTURE_NAME {
            return Err(StatsError::WrongStructure(s.name().to_string()));
        }

        let socket_address = field::<gio::InetSocketAddress>(s, "caller-address")?;
        let (caller_address, caller_port) = resolve_socket_address(&socket_address)?;

        Ok(Self {
            send_duration_us: field(s, "send-duration-us")?,
            send_rate_mbps: field(s, "send-rate-mbps")?,
            receive_rate_mbps: field(s, "receive-rate-mbps")?,
            bandwidth_mbps: field(s, "bandwidth-mbps")?,
            rtt_ms: field(s, "rtt-ms")?,

            bytes_sent: field(s, "bytes-sent")?,
            bytes_retransmitted: field(s, "bytes-retransmitted")?,
            bytes_sent_dropped: field(s, "bytes-sent-dropped")?,
            bytes_received: field(s, "bytes-received")?,
            bytes_received_lost: field(s, "bytes-received-lost")?,

            packets_sent: field(s, "packets-sent")?,
            packets_received: field(s, "packets-received")?,
            packets_sent_lost: field(s, "packets-sent-lost")?,
            packets_sent_dropped: field(s, "packets-sent-dropped")?,
            packets_retransmitted: field(s, "packets-retransmitted")?,
            packet_ack_received: field(s, "packet-ack-received")?,
            packet_nack_received: field(s, "packet-nack-received")?,

            packets_received_lost: field(s, "packets-received-lost")?,
            packets_received_retransmitted: field(s, "packets-received-retransmitted")?,
            packets_received_dropped: field(s, "packets-received-dropped")?,
            packet_ack_sent: field(s, "packet-ack-sent")?,
            packet_nack_sent: field(s, "packet-nack-sent")?,

            negotiated_latency_ms: field(s, "negotiated-latency-ms")?,

            caller_address,
            caller_port,
        })
    }
}

/// Unwrap a `GInetSocketAddress` into an address and port.
///
/// The platform abstraction has no direct accessor for a plain IP value, so
/// the address is stringified and re-parsed.
fn resolve_socket_address(addr: &gio::InetSocketAddress) -> Result<(IpAddr, u16), StatsError> {
    use gio::prelude::*;

    let port = addr.port();
    let ip_text = addr.address().to_str();
    let ip = ip_text
        .parse::<IpAddr>()
        .map_err(|e| StatsError::CallerAddress(format!("'{}': {}", ip_text, e)))?;

    Ok((ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstreamer::prelude::*;
    use std::net::Ipv4Addr;

    fn init() -> bool {
        gst::init().is_ok()
    }

    fn caller_structure() -> gst::Structure {
        let address =
            gio::InetSocketAddress::new(&gio::InetAddress::from(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7))), 4242);
        gst::Structure::builder(SRT_STATS_STRUCTURE_NAME)
            .field("caller-address", address)
            .field("send-duration-us", 17u64)
            .field("send-rate-mbps", 0.272)
            .field("receive-rate-mbps", 0.0f64)
            .field("bandwidth-mbps", 12.0f64)
            .field("rtt-ms", 100.0f64)
            .field("bytes-sent", 31088u64)
            .field("bytes-retransmitted", 0u64)
            .field("bytes-sent-dropped", 0u64)
            .field("bytes-received", 0u64)
            .field("bytes-received-lost", 0u64)
            .field("packets-sent", -1i64)
            .field("packets-received", 0i64)
            .field("packets-sent-lost", 0i32)
            .field("packets-sent-dropped", 0i32)
            .field("packets-retransmitted", 0i32)
            .field("packet-ack-received", 3i32)
            .field("packet-nack-received", 0i32)
            .field("packets-received-lost", 0i32)
            .field("packets-received-retransmitted", 0i32)
            .field("packets-received-dropped", 0i32)
            .field("packet-ack-sent", 0i32)
            .field("packet-nack-sent", 0i32)
            .field("negotiated-latency-ms", 125i32)
            .build()
    }

    #[test]
    fn decode_without_callers_succeeds() {
        if !init() {
            return;
        }
        let s = gst::Structure::builder(SRT_STATS_STRUCTURE_NAME)
            .field("bytes-sent-total", 25192u64)
            .build();

        let stats = SrtStats::from_structure(&s).unwrap();
        assert_eq!(stats.bytes_sent_total, 25192);
        assert!(stats.callers.is_empty());
        assert!(stats.timestamp_ms > 0);
    }

    #[test]
    fn decode_rejects_wrong_structure_name() {
        if !init() {
            return;
        }
        let s = gst::Structure::builder("application/x-rtp-statistics")
            .field("bytes-sent-total", 1u64)
            .build();

        let err = SrtStats::from_structure(&s).unwrap_err();
        assert!(matches!(err, StatsError::WrongStructure(_)));
    }

    #[test]
    fn decode_requires_bytes_sent_total() {
        if !init() {
            return;
        }
        let s = gst::Structure::builder(SRT_STATS_STRUCTURE_NAME).build();
        let err = SrtStats::from_structure(&s).unwrap_err();
        assert!(matches!(
            err,
            StatsError::Field {
                name: "bytes-sent-total",
                ..
            }
        ));
    }

    #[test]
    fn decode_caller_entry() {
        if !init() {
            return;
        }
        let mut callers = glib::ValueArray::with_capacity(1);
        callers.append(&caller_structure().to_value());

        let s = gst::Structure::builder(SRT_STATS_STRUCTURE_NAME)
            .field("bytes-sent-total", 25192u64)
            // SAFETY: the array is built and consumed on this thread only.
            .field("callers", unsafe { callers.to_value().into_send_value() })
            .build();

        let stats = SrtStats::from_structure(&s).unwrap();
        assert_eq!(stats.callers.len(), 1);

        let caller = &stats.callers[0];
        assert_eq!(caller.caller_address, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(caller.caller_port, 4242);
        assert_eq!(caller.bytes_sent, 31088);
        // The signed oddity must survive the decode untouched.
        assert_eq!(caller.packets_sent, -1);
        assert_eq!(caller.negotiated_latency_ms, 125);
        assert!((caller.rtt_ms - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decode_caller_with_missing_field_is_all_or_nothing() {
        if !init() {
            return;
        }
        let mut caller = caller_structure();
        caller.remove_field("rtt-ms");

        let mut callers = glib::ValueArray::with_capacity(1);
        callers.append(&caller.to_value());

        let s = gst::Structure::builder(SRT_STATS_STRUCTURE_NAME)
            .field("bytes-sent-total", 1u64)
            // SAFETY: the array is built and consumed on this thread only.
            .field("callers", unsafe { callers.to_value().into_send_value() })
            .build();

        let err = SrtStats::from_structure(&s).unwrap_err();
        assert!(matches!(err, StatsError::Field { name: "rtt-ms", .. }));
    }
}

//! Ardour OSC surface protocol.
//!
//! Only the handful of addresses the tally needs are understood; everything
//! else is routed to [`InboundMessage::Other`] and ignored by the
//! controller.
//!
//! | Address | Direction | Payload |
//! |---------|-----------|---------|
//! | `/rec_enable_toggle` | in | 1 boolean-ish |
//! | `/record_tally` | in | 1 boolean-ish |
//! | `/heartbeat` | in | anything |
//! | `/set_surface/feedback` | out | int32 feedback mask |
//!
//! Ardour sends its booleans as int32 or float32, so arguments are coerced
//! with [`truthy`].

use rosc::{OscMessage, OscPacket, OscType};

use crate::error::ParseError;

pub const REC_ENABLE_TOGGLE: &str = "/rec_enable_toggle";
pub const RECORD_TALLY: &str = "/record_tally";
pub const HEARTBEAT: &str = "/heartbeat";
pub const SET_SURFACE_FEEDBACK: &str = "/set_surface/feedback";

/// Feedback mask requested from Ardour: 8 (master section) + 16 (heartbeat)
pub const FEEDBACK_GROUP: i32 = 24;

/// Ardour's default OSC port
pub const DEFAULT_ARDOUR_PORT: u16 = 3819;

/// Largest datagram the endpoint reads in one go
pub const MAX_DATAGRAM_SIZE: usize = 8192;

/// Closed set of inbound routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    RecEnableToggle,
    RecordTally,
    Heartbeat,
    Other,
}

impl Route {
    pub fn from_address(address: &str) -> Self {
        match address {
            REC_ENABLE_TOGGLE => Route::RecEnableToggle,
            RECORD_TALLY => Route::RecordTally,
            HEARTBEAT => Route::Heartbeat,
            _ => Route::Other,
        }
    }
}

/// A decoded message, already mapped to its route.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Master record armed / disarmed
    RecEnableToggle(bool),
    /// Track record tally
    RecordTally(bool),
    /// Liveness signal, payload ignored
    Heartbeat,
    /// Unknown address, or a known one without a usable argument
    Other(OscMessage),
}

impl InboundMessage {
    pub fn route(&self) -> Route {
        match self {
            InboundMessage::RecEnableToggle(_) => Route::RecEnableToggle,
            InboundMessage::RecordTally(_) => Route::RecordTally,
            InboundMessage::Heartbeat => Route::Heartbeat,
            InboundMessage::Other(_) => Route::Other,
        }
    }
}

impl From<OscMessage> for InboundMessage {
    fn from(message: OscMessage) -> Self {
        let flag = message.args.first().map(truthy);
        match (Route::from_address(&message.addr), flag) {
            (Route::RecEnableToggle, Some(on)) => InboundMessage::RecEnableToggle(on),
            (Route::RecordTally, Some(on)) => InboundMessage::RecordTally(on),
            (Route::Heartbeat, _) => InboundMessage::Heartbeat,
            _ => InboundMessage::Other(message),
        }
    }
}

/// Boolean value of an OSC argument.
///
/// Numbers are true when non-zero, strings and blobs when non-empty, nil is
/// false.
pub fn truthy(arg: &OscType) -> bool {
    match arg {
        OscType::Bool(b) => *b,
        OscType::Int(i) => *i != 0,
        OscType::Long(l) => *l != 0,
        OscType::Float(f) => *f != 0.0,
        OscType::Double(d) => *d != 0.0,
        OscType::String(s) => !s.is_empty(),
        OscType::Blob(b) => !b.is_empty(),
        OscType::Char(c) => *c != '\0',
        OscType::Array(a) => !a.content.is_empty(),
        OscType::Nil => false,
        _ => true,
    }
}

/// Decode one datagram into messages; bundles are flattened in order.
pub fn decode(datagram: &[u8]) -> Result<Vec<InboundMessage>, ParseError> {
    let (_, packet) = rosc::decoder::decode_udp(datagram)?;
    let mut messages = Vec::new();
    flatten(packet, &mut messages);
    Ok(messages)
}

fn flatten(packet: OscPacket, out: &mut Vec<InboundMessage>) {
    match packet {
        OscPacket::Message(message) => out.push(message.into()),
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                flatten(packet, out);
            }
        }
    }
}

/// `/set_surface/feedback 24`, the "ping" sent to Ardour.
pub fn feedback_request() -> Result<Vec<u8>, ParseError> {
    let packet = OscPacket::Message(OscMessage {
        addr: SET_SURFACE_FEEDBACK.to_string(),
        args: vec![OscType::Int(FEEDBACK_GROUP)],
    });
    rosc::encoder::encode(&packet).map_err(|e| ParseError::Encode(format!("{:?}", e)))
}

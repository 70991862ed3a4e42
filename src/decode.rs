//! AIS / NMEA 0183 sentence decoding.
//!
//! The pipeline only depends on the [`Decoder`] trait: hand it one complete
//! line and get back either a [`ParsedMessage`] or a typed [`DecodeError`].
//! [`AisDecoder`] is the built-in implementation and covers the position and
//! static-data messages the registry tracks, plus GPS own-position
//! sentences.

use std::fmt;
use thiserror::Error;

/// Errors produced while decoding a single line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Line is not an NMEA sentence or is missing mandatory fields.
    #[error("malformed sentence: {0}")]
    Malformed(&'static str),

    /// Trailing `*hh` checksum does not match the sentence body.
    #[error("checksum mismatch: expected {expected:02X}, computed {computed:02X}")]
    Checksum { expected: u8, computed: u8 },

    /// Payload is shorter than the fixed layout of its message type.
    #[error("payload truncated: need {needed} bits, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Payload contains a character outside the 6-bit armouring alphabet.
    #[error("invalid payload character {0:?}")]
    InvalidCharacter(char),

    /// Well-formed AIS message of a type that is not decoded.
    #[error("unsupported AIS message type {0}")]
    UnsupportedType(u8),

    /// Well-formed NMEA sentence of a kind that is not decoded.
    #[error("unsupported sentence {0}")]
    UnsupportedSentence(String),

    /// A multi-fragment sentence was handed over without being joined.
    #[error("sentence is fragment {number} of {total}")]
    Fragment { number: u8, total: u8 },

    /// GPS sentence reports no valid fix.
    #[error("no position fix")]
    NoFix,
}

/// Identifies what kind of message a line carried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// AIS message with its numeric type (1..=27).
    Ais(u8),
    /// NMEA sentence formatter such as `RMC` or `GGA`.
    Nmea(String),
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Ais(t) => write!(f, "{}", t),
            MessageKind::Nmea(s) => f.write_str(s),
        }
    }
}

/// Fields a vessel report may carry. Absent means "not in this message".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VesselFields {
    pub imo: Option<u32>,
    pub name: Option<String>,
    pub callsign: Option<String>,
    pub ship_type: Option<u8>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    pub heading: Option<u16>,
    pub rot: Option<f64>,
    pub nav_status: Option<u8>,
    pub position_accuracy: Option<bool>,
    pub destination: Option<String>,
    pub eta: Option<String>,
    pub length: Option<u16>,
    pub width: Option<u16>,
    pub draught: Option<f64>,
}

/// A decoded AIS message keyed by MMSI.
#[derive(Debug, Clone, PartialEq)]
pub struct VesselReport {
    pub message_type: u8,
    pub mmsi: u32,
    /// `false` when only the header could be read; the report still counts
    /// as a sighting but carries no field data.
    pub decoded: bool,
    pub fields: VesselFields,
}

/// A position fix for the local station.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnPositionFix {
    pub sentence: String,
    pub latitude: f64,
    pub longitude: f64,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
}

/// Successful decode result.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedMessage {
    Vessel(VesselReport),
    OwnPosition(OwnPositionFix),
}

impl ParsedMessage {
    /// Message-type tag for display and classification.
    pub fn kind(&self) -> MessageKind {
        match self {
            ParsedMessage::Vessel(r) => MessageKind::Ais(r.message_type),
            ParsedMessage::OwnPosition(p) => MessageKind::Nmea(p.sentence.clone()),
        }
    }

    /// MMSI of the reporting station, if the message has one.
    pub fn mmsi(&self) -> Option<u32> {
        match self {
            ParsedMessage::Vessel(r) => Some(r.mmsi),
            ParsedMessage::OwnPosition(_) => None,
        }
    }
}

/// Narrow contract the hub uses to turn lines into structures.
pub trait Decoder: Send + Sync {
    /// Decodes one complete (single-fragment or already joined) line.
    fn decode(&self, line: &str) -> Result<ParsedMessage, DecodeError>;

    /// Joins the fragments of a multi-part sentence into one line.
    fn join_fragments(&self, lines: &[String]) -> Result<String, DecodeError> {
        join_fragments(lines)
    }
}

/// Built-in decoder for AIS types 1-5, 18, 19, 24 and GPS RMC/GGA.
#[derive(Debug, Clone, Copy, Default)]
pub struct AisDecoder;

impl Decoder for AisDecoder {
    fn decode(&self, line: &str) -> Result<ParsedMessage, DecodeError> {
        let sentence = Sentence::parse(line)?;
        if sentence.is_ais() {
            decode_ais(&sentence).map(ParsedMessage::Vessel)
        } else {
            decode_gps(&sentence).map(ParsedMessage::OwnPosition)
        }
    }
}

/// Header of an `!xxVDM` / `!xxVDO` fragment, as needed for reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentHeader {
    pub total: u8,
    pub number: u8,
    pub sequence_id: Option<u8>,
}

/// Reads the fragment header of an AIS sentence.
///
/// Returns `None` for anything that is not an AIS VDM/VDO sentence or whose
/// counters cannot be read.
pub fn fragment_header(line: &str) -> Option<FragmentHeader> {
    let body = line.trim_end();
    if !body.starts_with('!') {
        return None;
    }
    let body = body.split('*').next().unwrap_or(body);
    let mut fields = body[1..].split(',');
    let tag = fields.next()?;
    if !(tag.ends_with("VDM") || tag.ends_with("VDO")) {
        return None;
    }
    let total = fields.next()?.parse::<u8>().ok()?;
    let number = fields.next()?.parse::<u8>().ok()?;
    let sequence_id = fields.next().and_then(|s| s.parse::<u8>().ok());
    Some(FragmentHeader {
        total,
        number,
        sequence_id,
    })
}

/// Joins ordered AIS fragments into one single-fragment sentence.
///
/// Payloads are concatenated, the fill-bit count is taken from the last
/// fragment and a fresh checksum is appended.
pub fn join_fragments(lines: &[String]) -> Result<String, DecodeError> {
    let first = lines.first().ok_or(DecodeError::Malformed("no fragments"))?;
    let head = Sentence::parse(first)?;
    if !head.is_ais() {
        return Err(DecodeError::Malformed("not an AIS sentence"));
    }

    let mut payload = String::new();
    let mut fill = "0".to_string();
    for line in lines {
        let part = Sentence::parse(line)?;
        payload.push_str(part.field(5).ok_or(DecodeError::Malformed("missing payload"))?);
        fill = part.field(6).unwrap_or("0").to_string();
    }

    let channel = head.field(4).unwrap_or("");
    let body = format!("{},1,1,,{},{},{}", head.tag(), channel, payload, fill);
    Ok(format!("!{}*{:02X}", body, checksum(&body)))
}

/// XOR checksum over a sentence body (between the start mark and `*`).
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Split, checksum-verified NMEA sentence.
struct Sentence<'a> {
    fields: Vec<&'a str>,
}

impl<'a> Sentence<'a> {
    fn parse(line: &'a str) -> Result<Self, DecodeError> {
        let line = line.trim();
        let mut chars = line.chars();
        match chars.next() {
            Some('!') | Some('$') => {}
            _ => return Err(DecodeError::Malformed("missing start delimiter")),
        }
        let rest = &line[1..];

        let body = match rest.split_once('*') {
            Some((body, sum)) => {
                let expected = u8::from_str_radix(sum.get(..2).unwrap_or(sum), 16)
                    .map_err(|_| DecodeError::Malformed("unreadable checksum"))?;
                let computed = checksum(body);
                if expected != computed {
                    return Err(DecodeError::Checksum { expected, computed });
                }
                body
            }
            None => rest,
        };

        let fields: Vec<&str> = body.split(',').collect();
        if fields.len() < 2 || fields[0].len() < 3 {
            return Err(DecodeError::Malformed("too few fields"));
        }
        Ok(Self { fields })
    }

    fn tag(&self) -> &'a str {
        self.fields[0]
    }

    /// Sentence formatter without talker id (`VDM`, `RMC`, ...).
    fn formatter(&self) -> &'a str {
        let tag = self.tag();
        tag.get(tag.len().saturating_sub(3)..).unwrap_or(tag)
    }

    fn is_ais(&self) -> bool {
        matches!(self.formatter(), "VDM" | "VDO")
    }

    fn field(&self, index: usize) -> Option<&'a str> {
        self.fields.get(index).copied()
    }
}

fn decode_ais(sentence: &Sentence<'_>) -> Result<VesselReport, DecodeError> {
    let total: u8 = sentence
        .field(1)
        .and_then(|s| s.parse().ok())
        .ok_or(DecodeError::Malformed("missing fragment count"))?;
    let number: u8 = sentence
        .field(2)
        .and_then(|s| s.parse().ok())
        .ok_or(DecodeError::Malformed("missing fragment number"))?;
    if total != 1 {
        return Err(DecodeError::Fragment { number, total });
    }

    let fill: usize = sentence
        .field(6)
        .and_then(|s| s.chars().next())
        .and_then(|c| c.to_digit(10))
        .unwrap_or(0) as usize;
    let payload = Payload::new(
        sentence
            .field(5)
            .ok_or(DecodeError::Malformed("missing payload"))?,
        fill,
    )?;

    let message_type = payload.uint(0, 6)? as u8;
    let mmsi = payload.uint(8, 30)? as u32;

    let layout_bits = match message_type {
        1..=3 | 4 | 18 => 168,
        5 => 422,
        19 => 301,
        24 => 160,
        other => return Err(DecodeError::UnsupportedType(other)),
    };
    if payload.len() < layout_bits {
        return Ok(VesselReport {
            message_type,
            mmsi,
            decoded: false,
            fields: VesselFields::default(),
        });
    }

    let fields = match message_type {
        1..=3 => class_a_position(&payload)?,
        4 => base_station(&payload)?,
        5 => static_voyage(&payload)?,
        18 => class_b_position(&payload)?,
        19 => class_b_extended(&payload)?,
        _ => class_b_static(&payload)?,
    };

    Ok(VesselReport {
        message_type,
        mmsi,
        decoded: true,
        fields,
    })
}

fn class_a_position(p: &Payload) -> Result<VesselFields, DecodeError> {
    let rot_raw = p.int(42, 8)?;
    let rot = if rot_raw == -128 {
        None
    } else {
        let rate = (rot_raw as f64 / 4.733).powi(2);
        Some(if rot_raw < 0 { -rate } else { rate }.round())
    };
    Ok(VesselFields {
        nav_status: Some(p.uint(38, 4)? as u8),
        rot,
        sog: speed(p.uint(50, 10)?),
        position_accuracy: Some(p.uint(60, 1)? == 1),
        longitude: longitude(p.int(61, 28)?),
        latitude: latitude(p.int(89, 27)?),
        cog: course(p.uint(116, 12)?),
        heading: heading(p.uint(128, 9)?),
        ..Default::default()
    })
}

fn base_station(p: &Payload) -> Result<VesselFields, DecodeError> {
    Ok(VesselFields {
        position_accuracy: Some(p.uint(78, 1)? == 1),
        longitude: longitude(p.int(79, 28)?),
        latitude: latitude(p.int(107, 27)?),
        ..Default::default()
    })
}

fn static_voyage(p: &Payload) -> Result<VesselFields, DecodeError> {
    let imo = p.uint(40, 30)? as u32;
    let month = p.uint(274, 4)?;
    let day = p.uint(278, 5)?;
    let hour = p.uint(283, 5)?;
    let minute = p.uint(288, 6)?;
    let eta = (month != 0).then(|| format!("{:02}-{:02} {:02}:{:02}", month, day, hour, minute));
    let draught = p.uint(294, 8)?;
    let (length, width) = dimensions(p, 240)?;

    Ok(VesselFields {
        imo: (imo != 0).then_some(imo),
        callsign: p.text(70, 7)?,
        name: p.text(112, 20)?,
        ship_type: ship_type(p.uint(232, 8)?),
        length,
        width,
        eta,
        draught: (draught != 0).then(|| draught as f64 / 10.0),
        destination: p.text(302, 20)?,
        ..Default::default()
    })
}

fn class_b_position(p: &Payload) -> Result<VesselFields, DecodeError> {
    Ok(VesselFields {
        sog: speed(p.uint(46, 10)?),
        position_accuracy: Some(p.uint(56, 1)? == 1),
        longitude: longitude(p.int(57, 28)?),
        latitude: latitude(p.int(85, 27)?),
        cog: course(p.uint(112, 12)?),
        heading: heading(p.uint(124, 9)?),
        ..Default::default()
    })
}

fn class_b_extended(p: &Payload) -> Result<VesselFields, DecodeError> {
    let (length, width) = dimensions(p, 271)?;
    Ok(VesselFields {
        name: p.text(143, 20)?,
        ship_type: ship_type(p.uint(263, 8)?),
        length,
        width,
        ..class_b_position(p)?
    })
}

fn class_b_static(p: &Payload) -> Result<VesselFields, DecodeError> {
    match p.uint(38, 2)? {
        0 => Ok(VesselFields {
            name: p.text(40, 20)?,
            ..Default::default()
        }),
        1 if p.len() >= 162 => {
            let (length, width) = dimensions(p, 132)?;
            Ok(VesselFields {
                ship_type: ship_type(p.uint(40, 8)?),
                callsign: p.text(90, 7)?,
                length,
                width,
                ..Default::default()
            })
        }
        1 => Err(DecodeError::Truncated {
            needed: 162,
            available: p.len(),
        }),
        _ => Ok(VesselFields::default()),
    }
}

fn dimensions(p: &Payload, start: usize) -> Result<(Option<u16>, Option<u16>), DecodeError> {
    let bow = p.uint(start, 9)?;
    let stern = p.uint(start + 9, 9)?;
    let port = p.uint(start + 18, 6)?;
    let starboard = p.uint(start + 24, 6)?;
    let length = bow + stern;
    let width = port + starboard;
    Ok((
        (length != 0).then_some(length as u16),
        (width != 0).then_some(width as u16),
    ))
}

fn speed(raw: u64) -> Option<f64> {
    (raw != 1023).then(|| raw as f64 / 10.0)
}

fn course(raw: u64) -> Option<f64> {
    (raw < 3600).then(|| raw as f64 / 10.0)
}

fn heading(raw: u64) -> Option<u16> {
    (raw < 360).then_some(raw as u16)
}

fn ship_type(raw: u64) -> Option<u8> {
    (raw != 0).then_some(raw as u8)
}

fn longitude(raw: i64) -> Option<f64> {
    let deg = raw as f64 / 600_000.0;
    (deg.abs() <= 180.0).then_some(deg)
}

fn latitude(raw: i64) -> Option<f64> {
    let deg = raw as f64 / 600_000.0;
    (deg.abs() <= 90.0).then_some(deg)
}

/// De-armoured 6-bit AIS payload.
struct Payload {
    sixbits: Vec<u8>,
    bit_len: usize,
}

impl Payload {
    fn new(armoured: &str, fill_bits: usize) -> Result<Self, DecodeError> {
        let sixbits = armoured
            .chars()
            .map(|c| {
                let v = (c as u32).wrapping_sub(48);
                let v = if v > 40 { v - 8 } else { v };
                if v < 64 && c.is_ascii() {
                    Ok(v as u8)
                } else {
                    Err(DecodeError::InvalidCharacter(c))
                }
            })
            .collect::<Result<Vec<u8>, _>>()?;
        let bit_len = (sixbits.len() * 6).saturating_sub(fill_bits);
        Ok(Self { sixbits, bit_len })
    }

    fn len(&self) -> usize {
        self.bit_len
    }

    fn bit(&self, index: usize) -> u64 {
        u64::from((self.sixbits[index / 6] >> (5 - index % 6)) & 1)
    }

    fn uint(&self, start: usize, len: usize) -> Result<u64, DecodeError> {
        if start + len > self.bit_len {
            return Err(DecodeError::Truncated {
                needed: start + len,
                available: self.bit_len,
            });
        }
        Ok((start..start + len).fold(0u64, |acc, i| (acc << 1) | self.bit(i)))
    }

    fn int(&self, start: usize, len: usize) -> Result<i64, DecodeError> {
        let raw = self.uint(start, len)?;
        if raw & (1 << (len - 1)) != 0 {
            Ok(raw as i64 - (1i64 << len))
        } else {
            Ok(raw as i64)
        }
    }

    /// Reads `chars` 6-bit characters; `@` padding and spaces are trimmed.
    fn text(&self, start: usize, chars: usize) -> Result<Option<String>, DecodeError> {
        let mut out = String::with_capacity(chars);
        for i in 0..chars {
            let v = self.uint(start + i * 6, 6)? as u8;
            out.push(if v < 32 { (v + 64) as char } else { v as char });
        }
        let trimmed = out.trim_end_matches(['@', ' ']).trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }
}

fn decode_gps(sentence: &Sentence<'_>) -> Result<OwnPositionFix, DecodeError> {
    let formatter = sentence.formatter();
    match formatter {
        "RMC" => {
            if sentence.field(2) != Some("A") {
                return Err(DecodeError::NoFix);
            }
            let latitude = nmea_coordinate(sentence.field(3), sentence.field(4))?;
            let longitude = nmea_coordinate(sentence.field(5), sentence.field(6))?;
            Ok(OwnPositionFix {
                sentence: formatter.to_string(),
                latitude,
                longitude,
                sog: sentence.field(7).and_then(|s| s.parse().ok()),
                cog: sentence.field(8).and_then(|s| s.parse().ok()),
            })
        }
        "GGA" => {
            let quality = sentence.field(6).unwrap_or("0");
            if quality.is_empty() || quality == "0" {
                return Err(DecodeError::NoFix);
            }
            let latitude = nmea_coordinate(sentence.field(2), sentence.field(3))?;
            let longitude = nmea_coordinate(sentence.field(4), sentence.field(5))?;
            Ok(OwnPositionFix {
                sentence: formatter.to_string(),
                latitude,
                longitude,
                sog: None,
                cog: None,
            })
        }
        other => Err(DecodeError::UnsupportedSentence(other.to_string())),
    }
}

/// Converts `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere into signed degrees.
fn nmea_coordinate(value: Option<&str>, hemisphere: Option<&str>) -> Result<f64, DecodeError> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or(DecodeError::NoFix)?;
    let raw: f64 = value
        .parse()
        .map_err(|_| DecodeError::Malformed("unreadable coordinate"))?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let unsigned = degrees + minutes / 60.0;
    match hemisphere {
        Some("N") | Some("E") => Ok(unsigned),
        Some("S") | Some("W") => Ok(-unsigned),
        _ => Err(DecodeError::Malformed("missing hemisphere")),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn vessel(line: &str) -> VesselReport {
        match AisDecoder.decode(line).expect("line should decode") {
            ParsedMessage::Vessel(v) => v,
            other => panic!("expected vessel report, got {:?}", other),
        }
    }

    #[test]
    fn test_class_a_position() {
        let report = vessel("!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*5C");
        assert_eq!(report.message_type, 1);
        assert_eq!(report.mmsi, 477553000);
        assert!(report.decoded);
        let f = &report.fields;
        assert_eq!(f.nav_status, Some(5));
        assert_eq!(f.sog, Some(0.0));
        assert_eq!(f.cog, Some(51.0));
        assert_eq!(f.heading, Some(181));
        let lat = f.latitude.expect("latitude");
        let lon = f.longitude.expect("longitude");
        assert!((lat - 47.582833).abs() < 1e-4, "lat {}", lat);
        assert!((lon - -122.345833).abs() < 1e-4, "lon {}", lon);
    }

    #[test]
    fn test_checksum_mismatch_is_rejected() {
        let err = AisDecoder
            .decode("!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*00")
            .expect_err("bad checksum must fail");
        assert!(matches!(err, DecodeError::Checksum { .. }));
    }

    #[test]
    fn test_joined_static_voyage() {
        let parts = vec![
            "!AIVDM,2,1,3,B,55P5TL01VIaAL@7WKO@mBplU@<PDhh000000001S;AJ::4A80?4i@E53,0*3E"
                .to_string(),
            "!AIVDM,2,2,3,B,1@0000000000000,2*55".to_string(),
        ];
        let joined = AisDecoder.join_fragments(&parts).expect("join");
        assert!(joined.starts_with("!AIVDM,1,1,,B,55P5TL01"));

        let report = vessel(&joined);
        assert_eq!(report.message_type, 5);
        assert_eq!(report.mmsi, 369190000);
        let f = &report.fields;
        assert_eq!(f.imo, Some(6710932));
        assert_eq!(f.callsign.as_deref(), Some("WDA9674"));
        assert_eq!(f.name.as_deref(), Some("MT.MITCHELL"));
        assert_eq!(f.ship_type, Some(99));
        assert_eq!(f.destination.as_deref(), Some("SEATTLE"));
    }

    #[test]
    fn test_fragment_rejected_without_join() {
        let err = AisDecoder
            .decode("!AIVDM,2,2,3,B,1@0000000000000,2*55")
            .expect_err("fragment must not decode alone");
        assert_eq!(err, DecodeError::Fragment { number: 2, total: 2 });
    }

    #[test]
    fn test_unsupported_type() {
        // Type 9 (SAR aircraft) is well-formed but not tracked.
        let body = "AIVDM,1,1,,A,91b55wi;hbOS@OdQAC062Ch2089h,0";
        let line = format!("!{}*{:02X}", body, checksum(body));
        let err = AisDecoder.decode(&line).expect_err("type 9 unsupported");
        assert_eq!(err, DecodeError::UnsupportedType(9));
    }

    #[test]
    fn test_short_payload_reports_header_only() {
        let body = "AIVDM,1,1,,A,177KQJ5000G?tO,0";
        let line = format!("!{}*{:02X}", body, checksum(body));
        let report = vessel(&line);
        assert_eq!(report.mmsi, 477553000);
        assert!(!report.decoded);
        assert_eq!(report.fields, VesselFields::default());
    }

    #[test]
    fn test_rmc_own_position() {
        let body = "GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W";
        let line = format!("${}*{:02X}", body, checksum(body));
        match AisDecoder.decode(&line).expect("rmc") {
            ParsedMessage::OwnPosition(fix) => {
                assert!((fix.latitude - 48.1173).abs() < 1e-4);
                assert!((fix.longitude - 11.516666).abs() < 1e-4);
                assert_eq!(fix.sog, Some(22.4));
                assert_eq!(fix.cog, Some(84.4));
            }
            other => panic!("expected own position, got {:?}", other),
        }
    }

    #[test]
    fn test_non_ascii_tag_is_rejected() {
        // A stray 0xFF byte arrives as U+FFFD after lossy UTF-8 conversion.
        assert!(AisDecoder.decode("$\u{FFFD}AB,1").is_err());
        assert!(AisDecoder.decode("!\u{FFFD},1,1,,A,1,0").is_err());
        assert!(AisDecoder.decode("$\u{e9}AB,1").is_err());
    }

    #[test]
    fn test_rmc_without_fix() {
        let body = "GPRMC,123519,V,,,,,,,230394,,";
        let line = format!("${}*{:02X}", body, checksum(body));
        assert_eq!(AisDecoder.decode(&line), Err(DecodeError::NoFix));
    }

    #[test]
    fn test_fragment_header() {
        let header = fragment_header("!AIVDM,3,2,7,A,abc,0*00").expect("header");
        assert_eq!(
            header,
            FragmentHeader {
                total: 3,
                number: 2,
                sequence_id: Some(7)
            }
        );
        assert!(fragment_header("$GPRMC,1,2,3").is_none());
        assert_eq!(
            fragment_header("!AIVDM,1,1,,A,abc,0")
                .expect("header")
                .sequence_id,
            None
        );
    }
}

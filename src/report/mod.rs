//! Parser for the capture metadata report.
//!
//! The report is line oriented:
//!
//! ```text
//! File type:           Wireshark/... - pcapng
//! Average packet size: 1064.23 bytes
//! Interface #0 info:
//!                      Name = en0
//!                      Capture length = 524288
//! ```
//!
//! Top-level lines are `Key: Value` where only the first colon delimits.
//! A header without a value opens one of two indented blocks:
//!
//! - `Interface #N info:` opens a block of `Key = Value` lines. Every such
//!   block becomes one object of the `Interfaces` array, which sits where
//!   the first interface header appeared.
//! - `... (# of pkts):` opens a list of plain strings, stored under the
//!   header key without the suffix.
//!
//! Keys become PascalCase. A value whose first character is a digit and
//! whose first word is a number is stored as that number, dropping any unit.
//! Any other header shape is a [`ReportError`].
//!
//! # Example
//!
//! ```
//! use capcache_core::report::parse_report;
//!
//! let value = parse_report("Average packet size: 1064.23 bytes\n").unwrap();
//! assert_eq!(value.get("AveragePacketSize").unwrap().as_f64(), Some(1064.23));
//! ```

mod error;
mod value;

pub use error::ReportError;
pub use value::MetaValue;

use serde_json::Number;
use tracing::trace;

/// Key under which interface blocks are collected.
pub const INTERFACES_KEY: &str = "Interfaces";

/// Report key holding the inspected file's path.
pub const FILE_NAME_KEY: &str = "FileName";

const INTERFACE_PREFIX: &str = "Interface #";
const INTERFACE_SUFFIX: &str = " info";
const PACKET_COUNT_SUFFIX: &str = "(# of pkts)";
const INTERFACE_DELIMITER: &str = " = ";

/// Block the scanner is inside of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    TopLevel,
    Interface,
    /// Entry index of the list being filled.
    PacketCounts(usize),
}

/// Forward-only scanner holding the object being built.
struct Scanner {
    entries: Vec<(String, MetaValue)>,
    /// Entry index of the `Interfaces` array once created.
    interfaces: Option<usize>,
    block: Block,
}

impl Scanner {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            interfaces: None,
            block: Block::TopLevel,
        }
    }

    fn feed(&mut self, number: usize, line: &str) -> Result<(), ReportError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        if line.starts_with([' ', '\t']) {
            match self.block {
                Block::Interface => return self.interface_line(number, trimmed),
                Block::PacketCounts(slot) => {
                    if let Some(items) = self.array_at(slot) {
                        items.push(MetaValue::from(trimmed));
                    }
                    return Ok(());
                }
                Block::TopLevel => {}
            }
        }

        self.block = Block::TopLevel;
        self.top_level_line(number, trimmed)
    }

    fn top_level_line(&mut self, number: usize, line: &str) -> Result<(), ReportError> {
        let Some((key, value)) = line.split_once(':') else {
            return Err(ReportError::missing_delimiter(number, line));
        };
        let key = key.trim_end();
        let value = value.trim();

        if value.is_empty() {
            return self.open_block(number, key);
        }
        self.entries.push((pascal_case(key), typed_value(value)));
        Ok(())
    }

    fn open_block(&mut self, number: usize, key: &str) -> Result<(), ReportError> {
        if is_interface_header(key) {
            let slot = match self.interfaces {
                Some(slot) => slot,
                None => {
                    self.entries
                        .push((INTERFACES_KEY.to_string(), MetaValue::Array(Vec::new())));
                    let slot = self.entries.len() - 1;
                    self.interfaces = Some(slot);
                    slot
                }
            };
            if let Some(items) = self.array_at(slot) {
                items.push(MetaValue::object());
            }
            self.block = Block::Interface;
            trace!(line = number, header = key, "interface block");
            return Ok(());
        }

        if let Some(stem) = key.strip_suffix(PACKET_COUNT_SUFFIX) {
            self.entries
                .push((pascal_case(stem.trim_end()), MetaValue::Array(Vec::new())));
            self.block = Block::PacketCounts(self.entries.len() - 1);
            return Ok(());
        }

        Err(ReportError::unrecognized_header(number, key))
    }

    fn interface_line(&mut self, number: usize, line: &str) -> Result<(), ReportError> {
        let Some((key, value)) = line.split_once(INTERFACE_DELIMITER) else {
            return Err(ReportError::missing_delimiter(number, line));
        };
        let entry = (pascal_case(key.trim()), typed_value(value.trim()));

        let Some(slot) = self.interfaces else {
            return Ok(());
        };
        if let Some(MetaValue::Object(fields)) =
            self.array_at(slot).and_then(|items| items.last_mut())
        {
            fields.push(entry);
        }
        Ok(())
    }

    /// The array stored at entry `slot`. Slots are only recorded for arrays.
    fn array_at(&mut self, slot: usize) -> Option<&mut Vec<MetaValue>> {
        match self.entries.get_mut(slot) {
            Some((_, MetaValue::Array(items))) => Some(items),
            _ => None,
        }
    }

    fn finish(self) -> MetaValue {
        MetaValue::Object(self.entries)
    }
}

/// Parses a full report into an object.
///
/// # Errors
///
/// Returns [`ReportError`] for a header of unknown shape or a line without a
/// delimiter.
pub fn parse_report(text: &str) -> Result<MetaValue, ReportError> {
    let mut scanner = Scanner::new();
    for (index, line) in text.lines().enumerate() {
        scanner.feed(index + 1, line)?;
    }
    Ok(scanner.finish())
}

/// `Capture oper-sys` → `CaptureOper-sys`.
#[must_use]
pub fn pascal_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut after_space = false;
    for c in key.chars() {
        if c == ' ' {
            after_space = true;
            continue;
        }
        out.push(if after_space { c.to_ascii_uppercase() } else { c });
        after_space = false;
    }
    out
}

fn is_interface_header(key: &str) -> bool {
    key.strip_prefix(INTERFACE_PREFIX)
        .and_then(|rest| rest.strip_suffix(INTERFACE_SUFFIX))
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

fn typed_value(value: &str) -> MetaValue {
    if value.starts_with(|c: char| c.is_ascii_digit()) {
        let token = value.split_whitespace().next().unwrap_or_default();
        if let Some(number) = parse_number(token) {
            return MetaValue::Number(number);
        }
    }
    MetaValue::from(value)
}

fn parse_number(token: &str) -> Option<Number> {
    if let Ok(integer) = token.parse::<u64>() {
        return Some(integer.into());
    }
    token.parse::<f64>().ok().and_then(Number::from_f64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE_REPORT: &str = concat!(
        "File type:           Wireshark/... - pcapng\n",
        "File encapsulation:  Ethernet\n",
        "File timestamp precision:  microseconds (6)\n",
        "Packet size limit:   file hdr: (not set)\n",
        "Number of packets:   193073\n",
        "File size:           212040036 bytes\n",
        "Data size:           205473952 bytes\n",
        "Capture duration:    33.597593 seconds\n",
        "First packet time:   2019-03-26 17:18:03.284989\n",
        "Last packet time:    2019-03-26 17:18:36.882582\n",
        "Data byte rate:      6115734.33 bytes/sec\n",
        "Data bit rate:       48925874.67 bits/sec\n",
        "Average packet size: 1064.23 bytes\n",
        "Average packet rate: 5746.63 packets/sec\n",
        "SHA256:              ef36510ba24689e38609c5b85d977f9c88d7decb70c563547af8c0b34db28612\n",
        "RIPEMD160:           f479beebce2d0ccb537d76e8d4d343eb6218b5b7\n",
        "SHA1:                6e113443e9d47d4a73c645581296b8ef32072eed\n",
        "Strict time order:   True\n",
        "Capture hardware:    Intel(R) Core(TM) i7-4770HQ CPU @ 2.20GHz (with SSE4.2)\n",
        "Capture oper-sys:    Mac OS X 10.14.3, build 18D109 (Darwin 18.2.0)\n",
        "Capture application: Dumpcap (Wireshark) 3.0.0 (v3.0.0-0-g937e33de)\n",
        "Number of interfaces in file: 2\n",
        "Interface #0 info:\n",
        "                      Name = en0\n",
        "                      Description = Wi-Fi\n",
        "                      Encapsulation = Ethernet (1 - ether)\n",
        "                      Capture length = 524288\n",
        "                      Time precision = microseconds (6)\n",
        "                      Time ticks per second = 1000000\n",
        "                      Time resolution = 0x06\n",
        "                      Operating system = Mac OS X 10.14.3, build 18D109 (Darwin 18.2.0)\n",
        "                      Number of stat entries = 1\n",
        "                      Number of packets = 193073\n",
        "Interface #1 info:\n",
        "                      Encapsulation = Cisco HDLC (28 - chdlc)\n",
        "                      Capture length = 8192\n",
        "                      Time precision = microseconds (6)\n",
        "                      Time ticks per second = 1000000\n",
        "                      Number of stat entries = 0\n",
        "\t\t\t\t\t  Number of packets = 38\n",
    );

    const SAMPLE_JSON: &str = r#"{"FileType":"Wireshark/... - pcapng","FileEncapsulation":"Ethernet","FileTimestampPrecision":"microseconds (6)","PacketSizeLimit":"file hdr: (not set)","NumberOfPackets":193073,"FileSize":212040036,"DataSize":205473952,"CaptureDuration":33.597593,"FirstPacketTime":"2019-03-26 17:18:03.284989","LastPacketTime":"2019-03-26 17:18:36.882582","DataByteRate":6115734.33,"DataBitRate":48925874.67,"AveragePacketSize":1064.23,"AveragePacketRate":5746.63,"SHA256":"ef36510ba24689e38609c5b85d977f9c88d7decb70c563547af8c0b34db28612","RIPEMD160":"f479beebce2d0ccb537d76e8d4d343eb6218b5b7","SHA1":"6e113443e9d47d4a73c645581296b8ef32072eed","StrictTimeOrder":"True","CaptureHardware":"Intel(R) Core(TM) i7-4770HQ CPU @ 2.20GHz (with SSE4.2)","CaptureOper-sys":"Mac OS X 10.14.3, build 18D109 (Darwin 18.2.0)","CaptureApplication":"Dumpcap (Wireshark) 3.0.0 (v3.0.0-0-g937e33de)","NumberOfInterfacesInFile":2,"Interfaces":[{"Name":"en0","Description":"Wi-Fi","Encapsulation":"Ethernet (1 - ether)","CaptureLength":524288,"TimePrecision":"microseconds (6)","TimeTicksPerSecond":1000000,"TimeResolution":"0x06","OperatingSystem":"Mac OS X 10.14.3, build 18D109 (Darwin 18.2.0)","NumberOfStatEntries":1,"NumberOfPackets":193073},{"Encapsulation":"Cisco HDLC (28 - chdlc)","CaptureLength":8192,"TimePrecision":"microseconds (6)","TimeTicksPerSecond":1000000,"NumberOfStatEntries":0,"NumberOfPackets":38}]}"#;

    // ==== Golden Report Tests ====

    #[test]
    fn test_full_report_matches_expected_json() {
        let value = parse_report(SAMPLE_REPORT).unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), SAMPLE_JSON);
    }

    #[test]
    fn test_number_with_unit_and_two_interfaces() {
        let value = parse_report(SAMPLE_REPORT).unwrap();
        assert_eq!(value.get("AveragePacketSize").unwrap().as_f64(), Some(1064.23));
        assert_eq!(
            value.get(INTERFACES_KEY).unwrap().as_array().unwrap().len(),
            2
        );
    }

    // ==== Value Typing Tests ====

    #[test]
    fn test_timestamps_and_hex_stay_strings() {
        let value = parse_report(SAMPLE_REPORT).unwrap();
        assert_eq!(
            value.get("FirstPacketTime").unwrap().as_str(),
            Some("2019-03-26 17:18:03.284989")
        );
        let first = &value.get(INTERFACES_KEY).unwrap().as_array().unwrap()[0];
        assert_eq!(first.get("TimeResolution").unwrap().as_str(), Some("0x06"));
    }

    #[test]
    fn test_only_first_colon_delimits() {
        let value = parse_report("Packet size limit:   file hdr: 65535 bytes\n").unwrap();
        assert_eq!(
            value.get("PacketSizeLimit").unwrap().as_str(),
            Some("file hdr: 65535 bytes")
        );
    }

    #[test]
    fn test_backslash_is_escaped_by_encoder() {
        let value = parse_report("Capture comment: C:\\temp\\dump\n").unwrap();
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"CaptureComment":"C:\\temp\\dump"}"#
        );
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("Number of interfaces in file"), "NumberOfInterfacesInFile");
        assert_eq!(pascal_case("Capture oper-sys"), "CaptureOper-sys");
        assert_eq!(pascal_case("SHA256"), "SHA256");
        assert_eq!(pascal_case("Data byte rate"), "DataByteRate");
    }

    // ==== Block Tests ====

    #[test]
    fn test_packet_count_list() {
        let report = concat!(
            "File encapsulation:  Per packet\n",
            "Encapsulation in use by packets (# of pkts):\n",
            "                     Ethernet (120)\n",
            "                     Raw IP (7)\n",
            "Number of packets:   127\n",
        );
        let value = parse_report(report).unwrap();
        let list = value.get("EncapsulationInUseByPackets").unwrap().as_array().unwrap();
        assert_eq!(list, [MetaValue::from("Ethernet (120)"), MetaValue::from("Raw IP (7)")]);
        assert_eq!(value.get("NumberOfPackets").unwrap().as_f64(), Some(127.0));
    }

    #[test]
    fn test_interfaces_keep_first_header_position() {
        let report = concat!(
            "Number of interfaces in file: 1\n",
            "Interface #0 info:\n",
            "                     Name = eth0\n",
            "Strict time order:   False\n",
        );
        let value = parse_report(report).unwrap();
        let MetaValue::Object(entries) = &value else {
            panic!("expected object");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["NumberOfInterfacesInFile", "Interfaces", "StrictTimeOrder"]);
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let value = parse_report("\nFile type: pcap\n\n").unwrap();
        assert_eq!(value.get("FileType").unwrap().as_str(), Some("pcap"));
    }

    #[test]
    fn test_empty_report_is_empty_object() {
        assert_eq!(parse_report("").unwrap(), MetaValue::object());
    }

    // ==== Error Tests ====

    #[test]
    fn test_unknown_header_is_fatal() {
        let err = parse_report("File type: pcap\nSection #0 blocks:\n").unwrap_err();
        assert_eq!(err, ReportError::unrecognized_header(2, "Section #0 blocks"));
    }

    #[test]
    fn test_line_without_delimiter_is_fatal() {
        let err = parse_report("File type: pcap\nthis line has none\n").unwrap_err();
        assert!(matches!(err, ReportError::MissingDelimiter { line: 2, .. }));
    }

    #[test]
    fn test_interface_line_without_equals_is_fatal() {
        let report = "Interface #0 info:\n                     Name: eth0\n";
        let err = parse_report(report).unwrap_err();
        assert!(matches!(err, ReportError::MissingDelimiter { line: 2, .. }));
    }
}

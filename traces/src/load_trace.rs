use crate::{Direction, Packet, Trace};
use failure::{format_err, Error, ResultExt};
use log::debug;
use std::io::BufRead;

/// Parse a single line of a trace file
///
/// The format is `<timestamp>,<direction>,<size>`.
/// Returns `Ok(None)` for malformed records, i.e., lines with fewer than three fields or an unknown direction code.
/// Fields which are present but do not contain a number are an error.
pub fn parse_trace_line(line: &str) -> Result<Option<Packet>, Error> {
    let parts: Vec<_> = line.trim().split(',').collect();
    if parts.len() < 3 {
        return Ok(None);
    }

    let direction = match Direction::from_code(parts[1].trim()) {
        Some(direction) => direction,
        None => return Ok(None),
    };
    let time = parse_timestamp(parts[0].trim())?;
    let size = parts[2]
        .trim()
        .parse::<u32>()
        .with_context(|_| format!("Invalid packet size '{}'", parts[2]))?;

    Ok(Some(Packet {
        time,
        direction,
        size,
    }))
}

/// Timestamps are integers, but some tools write them as floats
fn parse_timestamp(s: &str) -> Result<i64, Error> {
    if let Ok(time) = s.parse::<i64>() {
        return Ok(time);
    }
    let time: f64 = s
        .parse()
        .map_err(|_| format_err!("Invalid timestamp '{}'", s))?;
    if !time.is_finite() {
        return Err(format_err!("Invalid timestamp '{}'", s));
    }
    Ok(time as i64)
}

/// Read a [`Trace`] from a reader in the trace file format
///
/// Malformed lines are skipped.
pub fn read_trace<R: BufRead>(reader: R, identifier: String) -> Result<Trace, Error> {
    let mut packets = Vec::new();
    let mut skipped = 0;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_trace_line(&line).with_context(|_| format!("Line {}", lineno + 1))? {
            Some(packet) => packets.push(packet),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("Skipped {} malformed lines in {}", skipped, identifier);
    }
    Ok(Trace::new(packets, identifier))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_trace_line() {
        assert_eq!(
            Some(Packet::new(1234, Direction::ServerToClient, 1500)),
            parse_trace_line("1234,r,1500").unwrap()
        );
        assert_eq!(
            Some(Packet::new(1234, Direction::ClientToServer, 150)),
            parse_trace_line("1234,s,150\n").unwrap()
        );
        assert_eq!(
            Some(Packet::new(1234, Direction::ClientToServer, 150)),
            parse_trace_line("1234.0,s,150").unwrap()
        );
    }

    #[test]
    fn test_parse_malformed_trace_line() {
        assert_eq!(None, parse_trace_line("").unwrap());
        assert_eq!(None, parse_trace_line("1234,r").unwrap());
        assert_eq!(None, parse_trace_line("1234,x,1500").unwrap());
        assert!(parse_trace_line("abc,r,1500").is_err());
        assert!(parse_trace_line("1234,r,big").is_err());
    }

    #[test]
    fn test_read_trace_skips_malformed() {
        let data = "0,s,150\n\n10,r,1500\nfoo\n20,r,600\n";
        let trace = read_trace(data.as_bytes(), "test".into()).unwrap();
        assert_eq!(
            &[
                Packet::new(0, Direction::ClientToServer, 150),
                Packet::new(10, Direction::ServerToClient, 1500),
                Packet::new(20, Direction::ServerToClient, 600),
            ],
            trace.packets()
        );
        assert_eq!("test", trace.id());
    }
}

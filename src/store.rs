//! Sensor-list line grammar for the persistence collaborator.
//!
//! One line per sensor: `<name> <type> <offsetTenths> <bus args>`.
//! The name may contain spaces, which would break whitespace splitting,
//! so they travel as `?` on disk and are restored on load. File I/O is
//! the host's business; this module only parses and formats lines.

use crate::error::{Error, Result};
use crate::sensors::{type_by_name, Sensor, SensorType};

/// One successfully parsed line.
#[derive(Debug)]
pub struct ParsedSensor {
    pub name: String,
    pub ty: &'static SensorType,
    pub offset_tenths: i16,
    /// Bus-specific tail, passed through to the interface allocator.
    pub args: String,
}

/// Format one sensor as a store line.
pub fn format_line(sensor: &Sensor) -> String {
    format!(
        "{} {} {} {}",
        sensor.name.replace(' ', "?"),
        sensor.ty.name,
        sensor.temp_offset_tenths,
        sensor.instance.args_string()
    )
}

/// Parse one store line.
pub fn parse_line(line: &str) -> Result<ParsedSensor> {
    let mut parts = line.split_whitespace();
    let name = parts
        .next()
        .ok_or(Error::Args("empty line"))?
        .replace('?', " ");
    let ty_name = parts.next().ok_or(Error::Args("missing type"))?;
    let ty = type_by_name(ty_name).ok_or(Error::UnknownType)?;
    let offset_tenths = parts
        .next()
        .ok_or(Error::Args("missing offset"))?
        .parse()
        .map_err(|_| Error::Args("bad offset"))?;
    let args = parts.collect::<Vec<_>>().join(" ");
    Ok(ParsedSensor {
        name,
        ty,
        offset_tenths,
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_line() {
        let p = parse_line("Outdoor DHT22 -5 2").unwrap();
        assert_eq!(p.name, "Outdoor");
        assert_eq!(p.ty.name, "DHT22");
        assert_eq!(p.offset_tenths, -5);
        assert_eq!(p.args, "2");
    }

    #[test]
    fn restores_spaces_in_names() {
        let p = parse_line("Living?room Dallas 0 17 28AA100433007F1E").unwrap();
        assert_eq!(p.name, "Living room");
        assert_eq!(p.args, "17 28AA100433007F1E");
    }

    #[test]
    fn rejects_unknown_type_and_garbage() {
        assert_eq!(parse_line("x NOPE 0 2").unwrap_err(), Error::UnknownType);
        assert_eq!(
            parse_line("x DHT22 notanumber 2").unwrap_err(),
            Error::Args("bad offset")
        );
        assert!(parse_line("").is_err());
    }
}

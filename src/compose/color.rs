use crate::error::{Result, SegmentError};
use image::Rgba;

/// Resolve a CSS-style color description into RGBA bytes
///
/// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`,
/// `rgba(r, g, b, a)` with alpha in [0, 1], and a handful of names.
pub fn parse_color(description: &str) -> Result<Rgba<u8>> {
    let text = description.trim().to_ascii_lowercase();
    let invalid = || SegmentError::InvalidColor(description.to_string());

    if let Some(hex) = text.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(invalid);
    }

    if let Some(args) = text
        .strip_prefix("rgba(")
        .or_else(|| text.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_functional(args).ok_or_else(invalid);
    }

    let named = match text.as_str() {
        "transparent" => [0, 0, 0, 0],
        "black" => [0, 0, 0, 255],
        "white" => [255, 255, 255, 255],
        "red" => [255, 0, 0, 255],
        "green" => [0, 128, 0, 255],
        "blue" => [0, 0, 255, 255],
        "gray" | "grey" => [128, 128, 128, 255],
        _ => return Err(invalid()),
    };
    Ok(Rgba(named))
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => {
            let mut channels = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                channels[i] = v * 17;
            }
            Some(Rgba(channels))
        }
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

fn parse_functional(args: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let channel = |s: &str| -> Option<u8> {
        let v: f32 = s.parse().ok()?;
        Some(v.round().clamp(0.0, 255.0) as u8)
    };

    let alpha = match parts.get(3) {
        Some(s) => {
            let a: f32 = s.parse().ok()?;
            (a.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };

    Some(Rgba([
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_colors() {
        assert_eq!(parse_color("#fff").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color("#1A2b3C").unwrap(), Rgba([26, 43, 60, 255]));
        assert_eq!(parse_color("#00ff0080").unwrap(), Rgba([0, 255, 0, 128]));
    }

    #[test]
    fn test_functional_colors() {
        assert_eq!(parse_color("rgba(0,0,0,0)").unwrap(), Rgba([0, 0, 0, 0]));
        assert_eq!(parse_color("rgb(10, 20, 30)").unwrap(), Rgba([10, 20, 30, 255]));
        assert_eq!(
            parse_color(" RGBA(255, 128, 0, 0.5) ").unwrap(),
            Rgba([255, 128, 0, 128])
        );
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(parse_color("transparent").unwrap(), Rgba([0, 0, 0, 0]));
        assert_eq!(parse_color("White").unwrap(), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_invalid_colors() {
        for bad in ["", "#12", "#ggg", "rgb(1,2)", "rgba(1,2,3,x)", "chartreuse-ish"] {
            match parse_color(bad) {
                Err(SegmentError::InvalidColor(text)) => assert_eq!(text, bad),
                other => panic!("expected InvalidColor for {:?}, got {:?}", bad, other),
            }
        }
    }
}

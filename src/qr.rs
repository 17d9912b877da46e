use qrcode::render::{svg, unicode};
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};

/// Smallest edge of the SVG image, in pixels.
const SVG_MIN_SIZE: u32 = 220;

/// Render `url` as an inline SVG QR code for the share panel.
///
/// # Returns
/// The `<svg>` document, or the encoder error when `url` is too long to fit
/// in any QR version.
pub fn to_svg(url: &str) -> Result<String, QrError> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::M)?;
    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(SVG_MIN_SIZE, SVG_MIN_SIZE)
        .quiet_zone(true)
        .build())
}

/// Render `url` with half-block characters for printing in a terminal.
pub fn to_terminal(url: &str) -> Result<String, QrError> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::L)?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_is_a_document() {
        let svg = to_svg("https://tasks.example.com/?token=abc").unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn terminal_rendering_has_rows() {
        let text = to_terminal("https://tasks.example.com/?token=abc").unwrap();
        assert!(text.lines().count() > 10);
    }

    #[test]
    fn oversized_input_is_an_error() {
        let huge = "x".repeat(8000);
        assert!(to_svg(&huge).is_err());
    }
}

//! Marker colour assignment for status labels

use crate::config::PaletteExhaustion;
use crate::error::{Error, Result};

/// Colours handed out to statuses, in assignment order
pub const PALETTE: &[&str] = &[
    "blue", "green", "red", "orange", "purple", "yellow", "pink", "brown", "gray",
];

/// Pick a colour for a new status named `status`
///
/// `used` holds the colour of every existing status, one entry per status.
/// The upstream colour wins when it is a palette colour nobody uses yet,
/// otherwise the first free palette colour is taken. Once every colour is in
/// use, `policy` decides between cycling through the palette and failing.
pub fn assign_color(
    status: &str,
    preferred: Option<&str>,
    used: &[String],
    policy: PaletteExhaustion,
) -> Result<String> {
    if let Some(preferred) = preferred
        && PALETTE.contains(&preferred)
        && !used.iter().any(|color| color == preferred)
    {
        return Ok(preferred.to_string());
    }

    if let Some(free) = PALETTE
        .iter()
        .find(|color| !used.iter().any(|taken| taken == *color))
    {
        return Ok((*free).to_string());
    }

    match policy {
        PaletteExhaustion::Cycle => {
            let color = PALETTE[used.len() % PALETTE.len()];
            tracing::warn!(
                "Palette exhausted, reusing colour {} for status {}",
                color,
                status
            );
            Ok(color.to_string())
        }
        PaletteExhaustion::Fail => Err(Error::PaletteExhausted {
            status: status.to_string(),
        }),
    }
}

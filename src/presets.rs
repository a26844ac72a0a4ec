//! Preset keys understood by the backend. The backend owns the translation
//! from key name to device command; the panel only ever sends names.

/// Every preset key the backend's command map knows about, in palette order.
pub const PRESET_KEYS: &[&str] = &[
    // Power
    "pow_on",
    "pow_off",
    "pow_status",
    // Sources
    "sour_rgb",
    "sour_hdmi",
    "sour_dvid",
    "sour_vid",
    "sour_hdbaset",
    "sour_dp",
    // Menu and navigation
    "menu_on",
    "menu_off",
    "menu_status",
    "enter",
    "up",
    "down",
    "left",
    "right",
];

/// Plain-text listing for `--list-presets`.
pub fn render_preset_list() -> String {
    let mut output = String::from("Known preset keys:\n");
    for key in PRESET_KEYS {
        output.push_str(&format!("  - {key}\n"));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_keys_are_present() {
        for key in ["up", "down", "left", "right", "enter"] {
            assert!(PRESET_KEYS.contains(&key), "missing preset key {key}");
        }
    }

    #[test]
    fn listing_mentions_every_key() {
        let listing = render_preset_list();
        assert!(listing.contains("Known preset keys:"));
        for key in PRESET_KEYS {
            assert!(listing.contains(key));
        }
    }
}

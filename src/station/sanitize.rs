/// Waveform tag: lower-cased, anything outside `[a-z0-9_]` becomes `_`.
pub fn sanitize_tag(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            let lower = ch.to_ascii_lowercase();
            if lower.is_ascii_lowercase() || lower.is_ascii_digit() || lower == '_' {
                lower
            } else {
                '_'
            }
        })
        .collect()
}

pub fn waveform_tag(embedded_station: &str, day_token: &str) -> String {
    sanitize_tag(&format!("{embedded_station}_{day_token}"))
}

/// Key fragment for auxiliary records. Not injective: `A.B` and `A_B` collide.
pub fn storage_key(station: &str) -> String {
    station.replace(['.', '/'], "_")
}

use crate::error::WarnCode;

#[derive(Debug, Clone, Copy)]
pub struct WarnEvent<'a> {
    pub code: WarnCode,
    pub stage: &'a str,
    pub station: &'a str,
    pub subject: &'a str,
    pub reason: &'a str,
    pub err: &'a str,
}

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if ch.is_ascii_graphic() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Single-line, grep-friendly warning. Ingestion failures are reported at
/// error level; everything else is a warning.
pub fn emit(event: WarnEvent<'_>) {
    let code = event.code.as_str();
    let stage = sanitize_value(event.stage);
    let station = sanitize_value(event.station);
    let subject = sanitize_value(event.subject);
    let reason = sanitize_value(event.reason);
    let err = sanitize_value(event.err);

    match event.code {
        WarnCode::FileIngestion => tracing::error!(
            code,
            stage = %stage,
            station = %station,
            subject = %subject,
            reason = %reason,
            err = %err,
            "STATIONPACK_WARN"
        ),
        _ => tracing::warn!(
            code,
            stage = %stage,
            station = %station,
            subject = %subject,
            reason = %reason,
            err = %err,
            "STATIONPACK_WARN"
        ),
    }
}

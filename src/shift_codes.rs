// src/shift_codes.rs

// --- Shift Code Registry ---

pub const SHIFT_OFF: &str = "DO";
pub const SHIFT_NOT_AVAILABLE: &str = "N/A";

const SHIFT_DESCRIPTIONS: [(&str, &str); 10] = [
    ("M2", "8 AM – 5 PM"),
    ("M3", "9 AM – 6 PM"),
    ("M4", "10 AM – 7 PM"),
    ("D1", "12 PM – 9 PM"),
    ("D2", "1 PM – 10 PM"),
    (SHIFT_OFF, "OFF"),
    ("SL", "Sick Leave"),
    ("CL", "Casual Leave"),
    ("EL", "Emergency Leave"),
    ("", SHIFT_NOT_AVAILABLE),
];

/// Human-readable text for a shift code. Unknown codes are returned unchanged.
pub fn shift_display(code: &str) -> &str {
    SHIFT_DESCRIPTIONS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, description)| *description)
        .unwrap_or(code)
}

pub fn is_known_shift(code: &str) -> bool {
    SHIFT_DESCRIPTIONS.iter().any(|(known, _)| *known == code)
}

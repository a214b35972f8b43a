//! The fixed flow feature set the classifier was trained on.

/// Feature names in the order the manual form presents them and the
/// single-flow request serializes them.
pub const FEATURES: [&str; 30] = [
    "Max Packet Length",
    "Avg Bwd Segment Size",
    "Packet Length Variance",
    "Destination Port",
    "Packet Length Std",
    "Average Packet Size",
    "Bwd Packet Length Max",
    "Bwd Packet Length Std",
    "Total Length of Bwd Packets",
    "Init_Win_bytes_forward",
    "Total Length of Fwd Packets",
    "Subflow Fwd Bytes",
    "Bwd Packet Length Mean",
    "Packet Length Mean",
    "Subflow Bwd Bytes",
    "Fwd Header Length.1",
    "Avg Fwd Segment Size",
    "Fwd Packet Length Max",
    "Bwd Header Length",
    "Subflow Fwd Packets",
    "Fwd Header Length",
    "Fwd IAT Max",
    "Init_Win_bytes_backward",
    "Fwd Packet Length Mean",
    "Flow Bytes/s",
    "Total Fwd Packets",
    "Flow IAT Mean",
    "Flow IAT Std",
    "Flow Packets/s",
    "Bwd Packets/s",
];

/// Whether `name` is one of the known flow features.
pub fn is_known_feature(name: &str) -> bool {
    FEATURES.contains(&name)
}

/// Coerce a user-entered form value to a float.
///
/// Blank, unparseable and non-finite entries all become `0.0`.
pub fn coerce_value(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_set_is_unique() {
        let mut seen = std::collections::HashSet::new();
        for f in FEATURES {
            assert!(seen.insert(f), "duplicate feature {}", f);
        }
        assert!(is_known_feature("Flow Bytes/s"));
        assert!(!is_known_feature("Label"));
    }

    #[test]
    fn test_coerce_value() {
        assert_eq!(coerce_value(""), 0.0);
        assert_eq!(coerce_value("   "), 0.0);
        assert_eq!(coerce_value("abc"), 0.0);
        assert_eq!(coerce_value("inf"), 0.0);
        assert_eq!(coerce_value("NaN"), 0.0);
        assert_eq!(coerce_value(" 443 "), 443.0);
        assert_eq!(coerce_value("-1.5e3"), -1500.0);
    }
}

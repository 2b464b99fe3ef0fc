//! Status code tables shared by both dialects.

use super::Dialect;

/// Standard receiver query.
pub const QUERY_TYPE_STANDARD: i64 = 5;
/// Custom receiver query.
pub const QUERY_TYPE_CUSTOM: i64 = 6;
/// Optimised receiver query.
pub const QUERY_TYPE_OPTIMIZED: i64 = 7;

const UNKNOWN: &str = "UNKNOWN";

/// Maps a transmitter system-state code to its label.
#[must_use]
pub fn system_state_label(dialect: Dialect, code: i64) -> &'static str {
    let label = match code {
        0 => Some("IDLE"),
        1 => Some("CALIBRATION"),
        2 => Some("WAITING FOR RX"),
        3 => Some("READY"),
        4 => Some("POWER CYCLE"),
        5 => Some("IDENTIFY TX"),
        _ => None,
    };
    label
        .or(match (dialect, code) {
            (Dialect::Venus, 6) => Some("RESERVED"),
            (Dialect::Orion, 6) => Some("DEBUG"),
            (Dialect::Orion, 127) => Some("HOLD"),
            (Dialect::Orion, 128) => Some("ERROR"),
            _ => None,
        })
        .unwrap_or(UNKNOWN)
}

/// Maps a receiver status code to its label.
#[must_use]
pub fn receiver_status_label(dialect: Dialect, code: i64) -> &'static str {
    let label = match dialect {
        Dialect::Venus => match code {
            0 => Some("UNKNOWN"),
            1 => Some("NOT_REGISTERED"),
            2 => Some("NOT_READY"),
            3 => Some("POWER_NOT_REQUESTED"),
            4 => Some("NOT_CHARGING"),
            5 => Some("CHARGING"),
            6 => Some("LIMITED_CHARGING"),
            7 => Some("PAUSED"),
            8 => Some("SYSTEM_ERROR"),
            9 => Some("COMM_ERROR"),
            10 => Some("NOT DETECTED"),
            _ => None,
        },
        Dialect::Orion => match code {
            0 => Some("UNKNOWN"),
            1 => Some("READY"),
            2 => Some("CHARGING"),
            3 => Some("DISCOVERY"),
            4 => Some("REGISTERED"),
            5 => Some("JOINED"),
            6 => Some("SILENT"),
            7 => Some("DISCONNECT"),
            _ => None,
        },
    };
    label.unwrap_or(UNKNOWN)
}

/// Maps a query type code to its label.
#[must_use]
pub fn query_type_label(code: i64) -> &'static str {
    match code {
        QUERY_TYPE_STANDARD => "STANDARD",
        QUERY_TYPE_CUSTOM => "CUSTOM",
        QUERY_TYPE_OPTIMIZED => "OPTIMIZED",
        _ => UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Dialect::Venus, 6, "RESERVED")]
    #[case(Dialect::Orion, 6, "DEBUG")]
    #[case(Dialect::Orion, 127, "HOLD")]
    #[case(Dialect::Orion, 128, "ERROR")]
    #[case(Dialect::Venus, 128, "UNKNOWN")]
    #[case(Dialect::Venus, 3, "READY")]
    fn system_states_follow_dialect(
        #[case] dialect: Dialect,
        #[case] code: i64,
        #[case] expected: &str,
    ) {
        assert_eq!(system_state_label(dialect, code), expected);
    }

    #[rstest]
    #[case(Dialect::Venus, 5, "CHARGING")]
    #[case(Dialect::Orion, 2, "CHARGING")]
    #[case(Dialect::Venus, 10, "NOT DETECTED")]
    #[case(Dialect::Orion, 10, "UNKNOWN")]
    fn receiver_statuses_follow_dialect(
        #[case] dialect: Dialect,
        #[case] code: i64,
        #[case] expected: &str,
    ) {
        assert_eq!(receiver_status_label(dialect, code), expected);
    }

    #[test]
    fn query_types_have_labels() {
        assert_eq!(query_type_label(QUERY_TYPE_OPTIMIZED), "OPTIMIZED");
        assert_eq!(query_type_label(1), "UNKNOWN");
    }
}

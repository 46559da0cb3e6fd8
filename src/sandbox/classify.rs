use super::RunStatus;
use once_cell::sync::Lazy;
use regex::Regex;

static ERROR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Traceback \(most recent call last\)|\w*Error:|\w*Exception\b")
        .expect("valid error pattern")
});

static SUCCESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)CONNECTION_TEST_PASSED|\bsuccessfully\b|\b(?:produced|consumed|sent|published|wrote|processed)\s+\d+\s+(?:messages?|records?|rows?)\b|\b\d+\s+(?:messages?|records?)\s+(?:produced|consumed|sent|published|written|processed)\b",
    )
    .expect("valid success pattern")
});

/// Classify a run's logs.
///
/// A timeout always counts as an error. Error markers beat success markers,
/// and logs with neither are uncertain.
pub fn classify_logs(logs: &str, is_timeout: bool) -> RunStatus {
    if is_timeout || ERROR_PATTERN.is_match(logs) {
        RunStatus::Error
    } else if SUCCESS_PATTERN.is_match(logs) {
        RunStatus::Success
    } else {
        RunStatus::Uncertain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_wins() {
        assert_eq!(classify_logs("CONNECTION_TEST_PASSED", true), RunStatus::Error);
    }

    #[test]
    fn test_errors() {
        let traceback = "Traceback (most recent call last):\n  File \"main.py\", line 3\nKeyError: 'x'";
        assert_eq!(classify_logs(traceback, false), RunStatus::Error);
        assert_eq!(
            classify_logs("psycopg2.OperationalError: connection refused", false),
            RunStatus::Error
        );
        assert_eq!(
            classify_logs("raised KafkaException while producing", false),
            RunStatus::Error
        );
        assert_eq!(
            classify_logs("Successfully connected\nValueError: bad row", false),
            RunStatus::Error
        );
    }

    #[test]
    fn test_success_markers() {
        assert_eq!(classify_logs("CONNECTION_TEST_PASSED", false), RunStatus::Success);
        assert_eq!(
            classify_logs("Successfully connected to database", false),
            RunStatus::Success
        );
        assert_eq!(classify_logs("Produced 10 messages", false), RunStatus::Success);
        assert_eq!(classify_logs("25 records written", false), RunStatus::Success);
    }

    #[test]
    fn test_anything_else_is_uncertain() {
        assert_eq!(classify_logs("starting up...\n", false), RunStatus::Uncertain);
        assert_eq!(classify_logs("", false), RunStatus::Uncertain);
    }
}

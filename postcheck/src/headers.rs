//! Header presence checks.
//!
//! Unlike [`crate::matcher`], which stops at the first difference, header
//! verification reports every missing line at once together with what was
//! actually observed.

use std::{collections::BTreeMap, fmt};

use postcheck_common::MessageRecord;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("{}", describe_missing(.failures, .actual))]
    Missing {
        /// One `<line>: was not found.` entry per missing line.
        failures: Vec<String>,
        /// Every header line the record carried.
        actual: Vec<String>,
    },
}

fn describe_missing(failures: &[String], actual: &[String]) -> String {
    let mut described = String::from("[");
    for failure in failures {
        described.push_str(failure);
        described.push_str(", ");
    }
    described.push_str("Actual: [");
    described.push_str(&actual.join(", "));
    described.push_str("]]");
    described
}

/// Require each of `expected` to occur literally among the record's header
/// lines.
///
/// # Errors
///
/// [`HeaderError::Missing`] listing every absent line.
pub fn verify_headers<S: AsRef<str>>(
    record: &MessageRecord,
    expected: &[S],
) -> Result<(), HeaderError> {
    let failures: Vec<String> = expected
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| !record.has_header(line))
        .map(|line| format!("{line}: was not found."))
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(HeaderError::Missing {
            failures,
            actual: record.headers().to_vec(),
        })
    }
}

/// `Name: Value` lines for each entry, in name order.
pub fn expected_header_lines<K, V>(headers: &BTreeMap<K, V>) -> Vec<String>
where
    K: fmt::Display,
    V: fmt::Display,
{
    headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect()
}

/// Headers a mail service is expected to pass through unchanged.
pub fn pass_through_headers() -> BTreeMap<&'static str, &'static str> {
    [
        "In-Reply-To",
        "List-Id",
        "List-Unsubscribe",
        "On-Behalf-Of",
        "References",
        "Resent-Date",
        "Resent-From",
        "Resent-To",
    ]
    .into_iter()
    .map(|name| (name, "123abc"))
    .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_all_present() {
        let record = MessageRecord::builder()
            .header("In-Reply-To", "123abc")
            .header("List-Id", "123abc")
            .header("X-Other", "1")
            .build();

        assert!(verify_headers(&record, &["In-Reply-To: 123abc", "List-Id: 123abc"]).is_ok());
        assert!(verify_headers::<&str>(&record, &[]).is_ok());
    }

    #[test]
    fn test_missing_headers_are_aggregated() {
        let record = MessageRecord::builder()
            .header("In-Reply-To", "123abc")
            .build();

        let err = verify_headers(
            &record,
            &["In-Reply-To: 123abc", "List-Id: 123abc", "References: 123abc"],
        )
        .unwrap_err();

        let HeaderError::Missing { failures, actual } = &err;
        assert_eq!(
            failures,
            &vec![
                "List-Id: 123abc: was not found.".to_string(),
                "References: 123abc: was not found.".to_string(),
            ]
        );
        assert_eq!(actual, &vec!["In-Reply-To: 123abc".to_string()]);

        let message = err.to_string();
        assert_eq!(
            message,
            "[List-Id: 123abc: was not found., References: 123abc: was not found., Actual: [In-Reply-To: 123abc]]"
        );
    }

    #[test]
    fn test_header_lines_from_map() {
        let lines = expected_header_lines(&pass_through_headers());
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "In-Reply-To: 123abc");
        assert!(lines.contains(&"Resent-To: 123abc".to_string()));
    }
}

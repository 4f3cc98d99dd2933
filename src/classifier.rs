//! Maps a failed `COPY` to a typed outcome.
//!
//! Only internal errors are inspected. Their messages are matched against an ordered
//! rule table and the first matching rule decides the outcome; anything else is handed
//! back untouched.

use crate::errors::{CopyError, DatabaseError, DatabaseErrorKind};

const LOAD_ERRORS: &str = "stl_load_errors system table for details";
const LOAD_ERRORS_QUOTED: &str = "'stl_load_errors' system table for details";
const S3_PREFIX: &str = "The specified S3 prefix";
const DOES_NOT_EXIST: &str = "does not exist";
const OTHER_ZONE_BUCKET: &str =
    "The bucket you are attempting to access must be addressed using the specified endpoint";
const SYNTAX_ERROR: &str = "syntax error";
const AT_OR_NEAR: &str = "at or near";

/// What to do about a failed `COPY`
#[derive(Debug)]
pub enum Classification {
    /// Some rows were rejected; their details live in `stl_load_errors`
    FetchLoadErrors,
    Failure(CopyError),
}

/// One entry of the rule table
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub classify: fn(DatabaseError) -> Classification,
}

/// Evaluated top to bottom, first match wins.
pub const RULES: &[Rule] = &[
    Rule {
        name: "load_errors",
        matches: |message| message.contains(LOAD_ERRORS) || message.contains(LOAD_ERRORS_QUOTED),
        classify: |_| Classification::FetchLoadErrors,
    },
    Rule {
        name: "data_source",
        matches: |message| message.contains(S3_PREFIX) && message.contains(DOES_NOT_EXIST),
        classify: |error| Classification::Failure(CopyError::DataSource(error.message().into())),
    },
    Rule {
        name: "other_zone_bucket",
        matches: |message| message.contains(OTHER_ZONE_BUCKET),
        classify: |error| {
            Classification::Failure(CopyError::OtherZoneBucket(error.message().into()))
        },
    },
    Rule {
        name: "syntax",
        matches: |message| message.contains(SYNTAX_ERROR),
        classify: classify_syntax,
    },
];

/// Classify a failed `COPY`.
pub fn classify(error: DatabaseError) -> Classification {
    match matching_rule(&error) {
        Some(rule) => (rule.classify)(error),
        None => Classification::Failure(CopyError::Database(error)),
    }
}

/// The rule that applies to `error`, if any. Non-internal errors never match.
pub fn matching_rule(error: &DatabaseError) -> Option<&'static Rule> {
    if error.kind() != DatabaseErrorKind::Internal {
        return None;
    }
    RULES.iter().find(|rule| (rule.matches)(error.message()))
}

fn classify_syntax(error: DatabaseError) -> Classification {
    let failure = match syntax_location(error.message()) {
        Some(location) => CopyError::Syntax {
            location,
            message: error.message().into(),
        },
        None => CopyError::SyntaxLocationMissing(error.message().into()),
    };
    Classification::Failure(failure)
}

/// `at or near "<token>"`, read from the first `at or near` followed by a quoted token.
fn syntax_location(message: &str) -> Option<String> {
    let (_, rest) = message.split_once(AT_OR_NEAR)?;
    let rest = rest.trim_start().strip_prefix('"')?;
    let (token, _) = rest.split_once('"')?;
    Some(format!("{AT_OR_NEAR} \"{token}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn internal(message: &str) -> DatabaseError {
        DatabaseError::new(DatabaseErrorKind::Internal, message)
    }

    #[test]
    fn load_errors() {
        let classification = classify(internal(
            "Check 'stl_load_errors' system table for details",
        ));
        assert!(matches!(classification, Classification::FetchLoadErrors));

        let classification = classify(internal(
            "Load into table 'x' failed.  Check stl_load_errors system table for details.",
        ));
        assert!(matches!(classification, Classification::FetchLoadErrors));
    }

    #[test]
    fn data_source() {
        let message = "The specified S3 prefix 'test_filename.csv' does not exist";
        match classify(internal(message)) {
            Classification::Failure(CopyError::DataSource(m)) => assert_eq!(m, message),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn s3_prefix_that_exists_is_not_a_data_source_error() {
        let message = "The specified S3 prefix 'a.csv' is empty";
        match classify(internal(message)) {
            Classification::Failure(CopyError::Database(e)) => assert_eq!(e.message(), message),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn other_zone_bucket() {
        let message = "The bucket you are attempting to access must be addressed using the specified endpoint";
        assert!(matches!(
            classify(internal(message)),
            Classification::Failure(CopyError::OtherZoneBucket(_))
        ));
    }

    #[test]
    fn syntax() {
        let error = internal("ERROR:  syntax error at or near \"lmlkmlk3\" (PG::SyntaxError)");
        match classify(error) {
            Classification::Failure(e @ CopyError::Syntax { .. }) => assert_eq!(
                e.to_string(),
                "Syntax error in the COPY command: [at or near \"lmlkmlk3\"]."
            ),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn syntax_without_location() {
        let message = "syntax error at end of input";
        match classify(internal(message)) {
            Classification::Failure(CopyError::SyntaxLocationMissing(m)) => assert_eq!(m, message),
            other => panic!("unexpected classification: {other:?}"),
        }
        assert!(matches!(
            classify(internal("syntax error at or near end")),
            Classification::Failure(CopyError::SyntaxLocationMissing(_))
        ));
    }

    #[test]
    fn unmatched_internal_error_passes_through() {
        match classify(internal("_")) {
            Classification::Failure(CopyError::Database(e)) => {
                assert_eq!(e, internal("_"));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn non_internal_errors_are_never_reinterpreted() {
        for kind in [DatabaseErrorKind::Connection, DatabaseErrorKind::Other] {
            let error = DatabaseError::new(kind, "Check 'stl_load_errors' system table for details");
            assert!(matching_rule(&error).is_none());
            match classify(error.clone()) {
                Classification::Failure(CopyError::Database(e)) => assert_eq!(e, error),
                other => panic!("unexpected classification: {other:?}"),
            }
        }
    }

    #[test]
    fn first_match_wins() {
        let error = internal(
            "syntax error near The specified S3 prefix 'x' does not exist, check 'stl_load_errors' system table for details",
        );
        assert_eq!(matching_rule(&error).map(|rule| rule.name), Some("load_errors"));

        let error = internal("The specified S3 prefix 'syntax error' does not exist");
        assert_eq!(matching_rule(&error).map(|rule| rule.name), Some("data_source"));
    }

    #[test]
    fn syntax_match_is_case_sensitive() {
        assert!(matching_rule(&internal("Syntax Error at or near \"x\"")).is_none());
    }
}

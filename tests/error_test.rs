use std::time::Duration;

use muninn::MuninnError;

#[test]
fn error_display() {
    let err = MuninnError::NotFound("proxy:/json".into());
    assert_eq!(err.to_string(), "record not found: proxy:/json");

    let err = MuninnError::MalformedRecord {
        key: "proxy:x".into(),
        reason: "missing field 'request_url'".into(),
    };
    assert_eq!(
        err.to_string(),
        "malformed record proxy:x: missing field 'request_url'"
    );

    let err = MuninnError::Api {
        status: 503,
        message: "overloaded".into(),
    };
    assert_eq!(err.to_string(), "API error (503): overloaded");
}

#[test]
fn transient_classification() {
    assert!(MuninnError::RateLimited { retry_after: None }.is_transient());
    assert!(MuninnError::Http("reset".into()).is_transient());
    assert!(MuninnError::Timeout(Duration::from_secs(30)).is_transient());
    assert!(
        MuninnError::Api {
            status: 408,
            message: String::new()
        }
        .is_transient()
    );
    assert!(
        !MuninnError::Api {
            status: 401,
            message: String::new()
        }
        .is_transient()
    );
    assert!(!MuninnError::EmptyResponse.is_transient());
    assert!(!MuninnError::UnparseableResponse("x".into()).is_transient());
}

#[test]
fn only_store_unavailability_is_systemic() {
    assert!(MuninnError::StoreUnavailable("down".into()).is_systemic());
    assert!(!MuninnError::NotFound("k".into()).is_systemic());
    assert!(
        !MuninnError::MalformedRecord {
            key: "k".into(),
            reason: "r".into()
        }
        .is_systemic()
    );
    assert!(!MuninnError::Http("reset".into()).is_systemic());
}

#[test]
fn retry_after_only_from_rate_limit() {
    let err = MuninnError::RateLimited {
        retry_after: Some(Duration::from_secs(3)),
    };
    assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    assert_eq!(MuninnError::Http("x".into()).retry_after(), None);
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: MuninnError = io.into();
    assert!(matches!(err, MuninnError::Io(_)));
}

#[test]
fn json_errors_convert() {
    let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: MuninnError = parse.into();
    assert!(err.to_string().starts_with("JSON error"));
}

use anyhow::anyhow;
use std::time::Duration;

/// An agent with a global per-request timeout.
pub fn http_agent(timeout_secs: u64) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(timeout_secs.max(1))))
        .build();
    ureq::Agent::new_with_config(config)
}

pub fn describe_http_error(err: ureq::Error, service: &str) -> anyhow::Error {
    match err {
        ureq::Error::StatusCode(code) => anyhow!("{service} returned HTTP {code}"),
        ureq::Error::Timeout(_) => anyhow!(err).context(format!("{service} request timed out")),
        e => anyhow!(e).context(format!("{service} request failed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_name_the_service() {
        let err = describe_http_error(ureq::Error::StatusCode(429), "openai");
        assert_eq!(err.to_string(), "openai returned HTTP 429");
    }

    #[test]
    fn transport_errors_keep_context() {
        let err = describe_http_error(ureq::Error::HostNotFound, "record store");
        assert_eq!(err.to_string(), "record store request failed");
    }
}

// HTTP round trips used by the web-server verification and the loopback-only check.
//
// Kept behind a trait so the state machine can be exercised without a listening server.

use std::time::Duration;

use crate::log_debug;

/// Any HTTP answer, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HttpClient {
    /// GETs `url`. `Err` means nothing answered at all (refused, timed out, reset);
    /// a 404 or 500 is still an `Ok` response.
    fn get(&self, url: &str) -> Result<HttpResponse, String>;
}

/// Blocking client backed by `ureq`.
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .redirects(0)
            .user_agent(concat!("setup-devstack/", env!("CARGO_PKG_VERSION")))
            .build();
        UreqClient { agent }
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        log_debug!("[HTTP] GET {}", url);
        // ureq reports non-2xx statuses as errors; they are answers all the same.
        let response = match self.agent.get(url).call() {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(err) => return Err(err.to_string()),
        };
        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| format!("could not read response body: {e}"))?;
        Ok(HttpResponse { status, body })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answers a single request with `reply` on an ephemeral loopback port.
    fn one_shot_server(reply: &'static str) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            stream.write_all(reply.as_bytes()).unwrap();
        });
        (url, handle)
    }

    #[test]
    fn error_statuses_are_responses_not_failures() {
        let (url, server) = one_shot_server(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found",
        );
        let response = UreqClient::new(Duration::from_secs(5)).get(&url).unwrap();
        server.join().unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body, "not found");
        assert!(!response.is_success());
    }

    #[test]
    fn closed_ports_are_failures() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        assert!(UreqClient::new(Duration::from_secs(2)).get(&url).is_err());
    }
}

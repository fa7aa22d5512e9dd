#[cfg(test)]
mod activation_tests {
    use std::thread;
    use std::time::Duration;
    use tiny_http::{Response, Server};

    use netcraft::deploy::{HttpPoetActivator, PoetActivator};
    use netcraft::error::BackendError;

    /// Serve a single request with `status` and `body`, returning what was received
    fn serve_once(status: u16, body: &'static str) -> (String, thread::JoinHandle<(String, String, String)>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let mut received = String::new();
            request.as_reader().read_to_string(&mut received).unwrap();
            let seen = (request.method().to_string(), request.url().to_string(), received);
            request
                .respond(Response::from_string(body).with_status_code(status))
                .unwrap();
            seen
        });
        (format!("127.0.0.1:{}", port), handle)
    }

    #[test]
    fn test_activation_posts_gateways() {
        let (endpoint, handle) = serve_once(200, "");
        let activator = HttpPoetActivator::new(Duration::from_secs(5));
        let gateways = vec!["10.0.0.2:9092".to_string(), "10.0.0.3:9092".to_string()];

        activator.activate(&endpoint, &gateways).unwrap();

        let (method, url, body) = handle.join().unwrap();
        assert_eq!(method, "POST");
        assert_eq!(url, "/v1/start");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["gatewayAddresses"], serde_json::json!(gateways));
    }

    #[test]
    fn test_activation_error_carries_status_and_body() {
        let (endpoint, handle) = serve_once(500, "poet not ready");
        let activator = HttpPoetActivator::new(Duration::from_secs(5));

        let err = activator.activate(&endpoint, &[]).unwrap_err();
        handle.join().unwrap();
        match err {
            BackendError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "poet not ready");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_activation_unreachable_endpoint() {
        // Bind and drop a listener to get a port nobody serves
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let activator = HttpPoetActivator::new(Duration::from_secs(2));
        let err = activator
            .activate(&format!("127.0.0.1:{}", port), &["10.0.0.2:9092".to_string()])
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}

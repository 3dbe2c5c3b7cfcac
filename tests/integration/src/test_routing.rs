//! Routing cascade integration tests.

#[cfg(test)]
mod tests {
    use crate::start_server;

    #[tokio::test]
    async fn test_should_route_by_forwarded_subdomain() {
        let server = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(&server.base_url)
            .header("x-forwarded-host", "iam.example.com")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("Action=ListRoles")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body = resp.text().await.unwrap();
        assert!(body.starts_with("<ListRolesResponse"));
    }

    #[tokio::test]
    async fn test_should_route_unsigned_form_post_by_action() {
        let server = start_server().await;
        let client = reqwest::Client::new();

        // No service-identifying host at all; only the form Action.
        let resp = client
            .post(&server.base_url)
            .header("content-type", "application/x-www-form-urlencoded")
            .body("Action=ListRoles")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body = resp.text().await.unwrap();
        assert!(body.contains("<IsTruncated>false</IsTruncated>"));
    }

    #[tokio::test]
    async fn test_should_route_by_credential_scope() {
        let server = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(&server.base_url)
            .header(
                "authorization",
                "AWS4-HMAC-SHA256 Credential=AKIATEST/20260827/us-east-1/iam/aws4_request, \
                 SignedHeaders=host, Signature=0000",
            )
            .header("content-type", "application/x-www-form-urlencoded")
            .body("Action=ListRoles")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body = resp.text().await.unwrap();
        assert!(body.starts_with("<ListRolesResponse"));
    }

    #[tokio::test]
    async fn test_should_return_error_envelope_for_unknown_target_prefix() {
        let server = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(&server.base_url)
            .header("x-amz-target", "NoSuchService_20990101.DoThing")
            .body("{}")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
        let body = resp.text().await.unwrap();
        assert!(body.contains("<Code>InvalidAction</Code>"));
        assert!(body.contains("nosuchservice_20990101"));
    }

    #[tokio::test]
    async fn test_should_fail_cleanly_when_no_signal_matches() {
        let server = start_server().await;
        let client = reqwest::Client::new();

        let resp = client.get(&server.base_url).send().await.unwrap();

        assert_eq!(resp.status(), 400);
        let body = resp.text().await.unwrap();
        assert!(body.contains("<Code>InvalidAction</Code>"));
        assert!(body.contains("unable to determine service"));
    }

    #[tokio::test]
    async fn test_should_generate_distinct_request_ids_per_error() {
        let server = start_server().await;
        let client = reqwest::Client::new();

        let mut bodies = Vec::new();
        for _ in 0..2 {
            let resp = client.get(&server.base_url).send().await.unwrap();
            bodies.push(resp.text().await.unwrap());
        }
        assert!(bodies[0].contains("<RequestId>"));
        assert_ne!(bodies[0], bodies[1]);
    }
}

//! IAM role lifecycle tests over the Query protocol.

#[cfg(test)]
mod tests {
    use crate::{TestServer, start_server, test_name};

    async fn post_form(server: &TestServer, body: String) -> reqwest::Response {
        reqwest::Client::new()
            .post(&server.base_url)
            .header("x-forwarded-host", "iam.example.com")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_should_create_and_get_role_with_tags() {
        let server = start_server().await;
        let role = test_name("role");

        let resp = post_form(
            &server,
            format!(
                "Action=CreateRole&RoleName={role}\
                 &Tags.member.1.Key=env&Tags.member.1.Value=prod\
                 &Tags.member.2.Key=team&Tags.member.2.Value=platform"
            ),
        )
        .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/xml"
        );
        let body = resp.text().await.unwrap();
        assert!(body.starts_with("<CreateRoleResponse"));
        assert!(body.contains("<Key>env</Key><Value>prod</Value>"));

        let resp = post_form(&server, format!("Action=GetRole&RoleName={role}")).await;
        assert_eq!(resp.status(), 200);
        let body = resp.text().await.unwrap();
        assert!(body.contains(&format!("<RoleName>{role}</RoleName>")));
        assert!(body.contains("<Key>team</Key><Value>platform</Value>"));
        assert!(body.contains("<ResponseMetadata><RequestId>"));
    }

    #[tokio::test]
    async fn test_should_reject_create_without_role_name() {
        let server = start_server().await;

        let resp = post_form(&server, "Action=CreateRole".to_owned()).await;
        assert_eq!(resp.status(), 400);
        let body = resp.text().await.unwrap();
        assert!(body.contains("<Code>ValidationException</Code>"));
        assert!(body.contains("<RequestId>"));
    }

    #[tokio::test]
    async fn test_should_reject_malformed_integer_before_handler() {
        let server = start_server().await;
        let role = test_name("role");

        let resp = post_form(
            &server,
            format!("Action=CreateRole&RoleName={role}&MaxSessionDuration=soon"),
        )
        .await;
        assert_eq!(resp.status(), 400);
        let body = resp.text().await.unwrap();
        assert!(body.contains("<Code>ValidationException</Code>"));
        assert!(body.contains("MaxSessionDuration"));
    }

    #[tokio::test]
    async fn test_should_conflict_on_duplicate_role() {
        let server = start_server().await;
        let role = test_name("dup");

        let body = format!("Action=CreateRole&RoleName={role}");
        assert_eq!(post_form(&server, body.clone()).await.status(), 200);

        let resp = post_form(&server, body).await;
        assert_eq!(resp.status(), 409);
        let text = resp.text().await.unwrap();
        assert!(text.contains("<Code>EntityAlreadyExists</Code>"));
    }

    #[tokio::test]
    async fn test_should_delete_role_and_then_miss_it() {
        let server = start_server().await;
        let role = test_name("gone");

        post_form(&server, format!("Action=CreateRole&RoleName={role}")).await;
        let resp = post_form(&server, format!("Action=DeleteRole&RoleName={role}")).await;
        assert_eq!(resp.status(), 200);

        let resp = post_form(&server, format!("Action=GetRole&RoleName={role}")).await;
        assert_eq!(resp.status(), 404);
        let body = resp.text().await.unwrap();
        assert!(body.contains("<Code>NoSuchEntity</Code>"));
    }

    #[tokio::test]
    async fn test_should_list_roles_after_reset() {
        let server = start_server().await;
        let role = test_name("reset");

        post_form(&server, format!("Action=CreateRole&RoleName={role}")).await;
        server.reset();

        let resp = post_form(&server, "Action=ListRoles".to_owned()).await;
        assert_eq!(resp.status(), 200);
        let body = resp.text().await.unwrap();
        assert!(!body.contains(&role));
    }
}

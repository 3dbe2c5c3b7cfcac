//! S3 bucket lifecycle tests over the RestXML protocol.

#[cfg(test)]
mod tests {
    use crate::{TestServer, start_server, test_name};

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    async fn put_bucket(server: &TestServer, bucket: &str) -> reqwest::Response {
        client()
            .put(format!("{}/{bucket}", server.base_url))
            .header("x-forwarded-host", "s3.example.com")
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_should_create_bucket_path_style() {
        let server = start_server().await;
        let bucket = test_name("bucket");

        let resp = put_bucket(&server, &bucket).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get("location").unwrap().to_str().unwrap(),
            format!("/{bucket}")
        );
    }

    #[tokio::test]
    async fn test_should_create_bucket_virtual_hosted() {
        let server = start_server().await;
        let bucket = test_name("vhost");

        let resp = client()
            .put(&server.base_url)
            .header("x-forwarded-host", format!("{bucket}.s3.example.com"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client()
            .head(format!("{}/{bucket}", server.base_url))
            .header("x-forwarded-host", "s3.example.com")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_should_treat_recreate_as_success() {
        let server = start_server().await;
        let bucket = test_name("idem");

        assert_eq!(put_bucket(&server, &bucket).await.status(), 200);
        assert_eq!(put_bucket(&server, &bucket).await.status(), 200);
    }

    #[tokio::test]
    async fn test_should_list_buckets_as_xml_document() {
        let server = start_server().await;
        let first = test_name("aaa");
        let second = test_name("bbb");
        put_bucket(&server, &first).await;
        put_bucket(&server, &second).await;

        let resp = client()
            .get(&server.base_url)
            .header("x-forwarded-host", "s3.example.com")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/xml"
        );
        let body = resp.text().await.unwrap();
        assert!(body.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(body.contains("<ListAllMyBucketsResult"));
        assert!(body.contains(&format!("<Name>{first}</Name>")));
        assert!(body.contains(&format!("<Name>{second}</Name>")));
    }

    #[tokio::test]
    async fn test_should_return_rest_xml_error_for_missing_bucket() {
        let server = start_server().await;
        let bucket = test_name("ghost");

        let resp = client()
            .delete(format!("{}/{bucket}", server.base_url))
            .header("x-forwarded-host", "s3.example.com")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        assert!(resp.headers().contains_key("x-amz-request-id"));
        assert!(resp.headers().contains_key("x-amz-id-2"));
        let body = resp.text().await.unwrap();
        assert!(body.contains("<Error><Code>NoSuchBucket</Code>"));
        assert!(body.contains("<HostId>"));
    }

    #[tokio::test]
    async fn test_should_delete_bucket() {
        let server = start_server().await;
        let bucket = test_name("del");
        put_bucket(&server, &bucket).await;

        let resp = client()
            .delete(format!("{}/{bucket}", server.base_url))
            .header("x-forwarded-host", "s3.example.com")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 204);

        let resp = client()
            .head(format!("{}/{bucket}", server.base_url))
            .header("x-forwarded-host", "s3.example.com")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }
}

mod common;

use std::time::Duration;

use common::{Canned, client, refused_url, serve};
use quickshield::core::models::{CheckKind, Grade};
use quickshield::core::policy::HeaderPolicy;
use quickshield::core::scanner::headers_scanner::run_headers_scan;

const TIMEOUT: Duration = Duration::from_secs(2);

fn hardened() -> Canned {
    Canned::ok("ok")
        .header("Strict-Transport-Security", "max-age=31536000; includeSubDomains")
        .header("Content-Security-Policy", "default-src 'self'")
        .header("X-Content-Type-Options", "nosniff")
        .header("X-Frame-Options", "SAMEORIGIN")
        .header("Referrer-Policy", "no-referrer")
        .header("Permissions-Policy", "camera=()")
}

#[tokio::test]
async fn hardened_site_grades_a_from_head() {
    let server = serve(hardened()).await;

    let result =
        run_headers_scan(&client(), &server.url("/"), &HeaderPolicy::default(), TIMEOUT).await;

    assert_eq!(result.kind, CheckKind::Headers);
    assert!(result.ok, "{:?}", result.error);
    let headers = result.headers().unwrap();
    assert_eq!(headers.grade, Grade::A);
    assert!(headers.issues.is_empty());
    assert_eq!(headers.sample["referrer-policy"], "no-referrer");
    assert_eq!(server.methods(), vec!["HEAD".to_string()]);
}

#[tokio::test]
async fn bare_site_grades_f_but_is_ok() {
    let server = serve(Canned::ok("plain")).await;

    let result =
        run_headers_scan(&client(), &server.url("/"), &HeaderPolicy::default(), TIMEOUT).await;

    assert!(result.ok);
    let headers = result.headers().unwrap();
    assert_eq!(headers.grade, Grade::F);
    assert_eq!(
        headers.issues,
        vec![
            "Missing Strict-Transport-Security",
            "Missing Content-Security-Policy",
            "X-Content-Type-Options not 'nosniff'",
            "X-Frame-Options not DENY/SAMEORIGIN",
            "Referrer-Policy missing or lax",
            "Missing Permissions-Policy",
        ]
    );
}

#[tokio::test]
async fn rejected_head_falls_back_to_get() {
    let server = serve(hardened().reject_head()).await;

    let result =
        run_headers_scan(&client(), &server.url("/"), &HeaderPolicy::default(), TIMEOUT).await;

    assert!(result.ok);
    assert_eq!(result.headers().unwrap().grade, Grade::A);
    assert_eq!(server.methods(), vec!["HEAD".to_string(), "GET".to_string()]);
}

#[tokio::test]
async fn unreachable_site_has_no_grade() {
    let result =
        run_headers_scan(&client(), &refused_url(), &HeaderPolicy::default(), TIMEOUT).await;

    assert!(!result.ok);
    assert!(result.headers().is_none());
    assert!(result.error.unwrap().starts_with("Connection failed"));
}

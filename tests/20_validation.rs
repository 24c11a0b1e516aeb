use serde_json::json;

use agency_crm::validation::{
    detect, sanitize, scan_value, validate, validate_and_sanitize, validate_patch, AttackKind, EntityKind,
    InputRejection,
};

#[test]
fn client_happy_path_is_sanitized() {
    let raw = json!({
        "name": "O'Brien & Sons",
        "email": "  Jane.Doe@Example.COM ",
        "phone": "+1 (555) 123-4567",
        "website": "https://obrien.example",
        "notes": "<p>Prefers <b>email</b></p><span>follow up</span>",
        "unexpected": "dropped",
    });

    let data = validate_and_sanitize(EntityKind::Client, &raw).expect("valid client");
    assert_eq!(data["name"], json!("O&#x27;Brien &amp; Sons"));
    assert_eq!(data["email"], json!("jane.doe@example.com"));
    assert_eq!(data["notes"], json!("<p>Prefers <b>email</b></p>follow up"));
    assert!(data.get("unexpected").is_none());
}

#[test]
fn every_failing_field_is_reported() {
    let errors = validate(EntityKind::Client, &json!({ "name": "A", "email": "not-an-email", "status": "vip" }))
        .expect_err("invalid client");
    assert!(errors.has_field("name"));
    assert!(errors.has_field("email"));
    assert!(errors.has_field("status"));
    assert!(!errors.has_field("phone"));
}

#[test]
fn non_object_payload_is_rejected() {
    let errors = validate(EntityKind::Task, &json!(["title"])).expect_err("array payload");
    assert!(errors.has_field("_root"));
}

#[test]
fn screening_runs_before_validation() {
    // Invalid email too, but the attack wins
    let raw = json!({ "name": "<script>alert(1)</script>", "email": "nope" });
    match validate_and_sanitize(EntityKind::Client, &raw) {
        Err(InputRejection::Attack(hit)) => {
            assert_eq!(hit.field, "name");
            assert_eq!(hit.kind, AttackKind::ScriptInjection);
        }
        other => panic!("expected attack rejection, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn patch_checks_only_submitted_fields() {
    let data = validate_patch(EntityKind::Task, &json!({ "status": "done" })).expect("status only");
    assert_eq!(data.len(), 1);

    assert!(matches!(
        validate_patch(EntityKind::Task, &json!({ "title": "" })),
        Err(InputRejection::Invalid(errors)) if errors.has_field("title")
    ));
}

#[test]
fn non_http_urls_are_refused() {
    let data = validate(EntityKind::Client, &json!({
        "name": "Acme Ltd",
        "email": "ops@acme.test",
        "website": "ftp://acme.test/files",
    }));
    assert!(data.is_err());
}

#[test]
fn rich_text_keeps_only_safe_anchor_attributes() {
    let data = validate(EntityKind::Task, &json!({
        "title": "Review proposal",
        "description": r#"<a href="https://acme.test" style="color:red" title="Acme">site</a> and <a href="ftp://x">ftp</a>"#,
    }))
    .expect("valid task");
    let cleaned = sanitize(EntityKind::Task, data).expect("sanitized");
    assert_eq!(
        cleaned["description"],
        json!(r#"<a href="https://acme.test" title="Acme">site</a> and <a>ftp</a>"#)
    );
}

#[test]
fn signature_classes() {
    assert_eq!(detect("javascript:alert(1)"), Some(AttackKind::ProtocolInjection));
    assert_eq!(detect(r#"<img src=x onerror="x">"#), Some(AttackKind::EventHandlerInjection));
    assert_eq!(detect(r#"{"$where": "1"}"#), Some(AttackKind::NoSqlInjection));
    assert_eq!(detect("../../etc/passwd"), Some(AttackKind::PathTraversal));
    assert_eq!(detect("report.pdf; rm -rf /"), Some(AttackKind::ShellInjection));
    assert_eq!(detect("Let's meet at 10:00 on the 3rd floor"), None);
}

#[test]
fn everyday_business_wording_is_accepted() {
    let raw = json!({
        "name": "Dog & Cat Vets",
        "email": "hello@dogandcat.test",
        "company": "Dog & Cat Vets",
        "service": "branding",
        "message": "Our brand expression (logo, colours) needs a refresh. Ask about the 'premium' -- or 'basic' -- plan.",
    });

    let data = validate_and_sanitize(EntityKind::Inquiry, &raw).expect("ordinary inquiry");
    assert_eq!(data["company"], json!("Dog &amp; Cat Vets"));
    assert_eq!(scan_value(&raw), None);
}

#[test]
fn nested_payloads_report_dotted_paths() {
    let hit = scan_value(&json!({ "contacts": [{ "name": "ok" }, { "name": "1 UNION SELECT * FROM users" }] }))
        .expect("hit");
    assert_eq!(hit.field, "contacts[1].name");
    assert_eq!(hit.kind, AttackKind::SqlInjection);

    let hit = scan_value(&json!({ "filter": { "$ne": null } })).expect("key hit");
    assert_eq!(hit.field, "filter.$ne");
}

mod common;

use api::auth::UserRole;
use chrono::{Datelike, Utc};
use common::{error_code, stranger, TestContext};
use serde_json::{json, Value};

const CREATE: &str = r#"
mutation Create($input: CreateDocumentInput!) {
  hr {
    createDocument(input: $input) {
      unresolved
      document { id number status content reviewers { key kind decision } }
    }
  }
}
"#;

const REVIEW: &str = r#"
mutation Review($id: ID!, $verdict: ReviewVerdict!, $comment: String) {
  hr {
    reviewDocument(id: $id, verdict: $verdict, comment: $comment) {
      status
      rejectionReason
      reviewers { name decision comment }
    }
  }
}
"#;

const SUBMIT: &str = r#"
mutation Submit($id: ID!) { hr { submitDocument(id: $id) { status reviewers { decision } } } }
"#;

fn contract_input(ctx: &TestContext) -> Value {
    let contract = ctx.seeded.document_type("employment_contract").unwrap();
    let template = &ctx.seeded.templates[0];
    let newcomer = ctx.employee("andrey.volkov@hr.test");
    let director = ctx.employee("olga.smirnova@hr.test");
    let recruiter = ctx.employee("ilya.sokolov@hr.test");
    json!({
        "documentTypeId": contract.id.to_string(),
        "templateId": template.id.to_string(),
        "employeeId": newcomer.id.to_string(),
        "reviewers": [
            {
                "key": director.position_id.unwrap().to_string(),
                "kind": "POSITION",
                "name": "Генеральный директор"
            },
            {
                "key": recruiter.user_id.unwrap().to_string(),
                "kind": "USER",
                "name": "Соколов Илья"
            }
        ],
        "custom": { "probationMonths": 3 }
    })
}

#[tokio::test]
async fn contract_is_numbered_and_rendered_from_template() {
    let ctx = TestContext::new_seeded().await;
    let hr = ctx.hr_user();
    let data = ctx
        .data(&hr, CREATE, json!({ "input": contract_input(&ctx) }))
        .await;
    let created = &data["hr"]["createDocument"];
    let document = &created["document"];

    let expected = format!("ГЭР-{}-0001", Utc::now().year());
    assert_eq!(document["number"], json!(expected));
    assert_eq!(document["status"], json!("DRAFT"));
    let content = document["content"].as_str().unwrap();
    assert!(content.contains(&expected));
    assert!(content.contains("ООО «Ромашка»"));
    assert!(content.contains("Волков Андрей Петрович"));
    assert!(content.contains("«Инженер-программист»"));
    assert!(!content.contains("{{"));
    assert_eq!(created["unresolved"], json!([]));
    assert_eq!(document["reviewers"].as_array().unwrap().len(), 2);

    let second = ctx
        .data(&hr, CREATE, json!({ "input": contract_input(&ctx) }))
        .await;
    assert_eq!(
        second["hr"]["createDocument"]["document"]["number"],
        json!(format!("ГЭР-{}-0002", Utc::now().year()))
    );
}

#[tokio::test]
async fn missing_custom_values_are_reported_as_unresolved() {
    let ctx = TestContext::new_seeded().await;
    let mut input = contract_input(&ctx);
    input["custom"] = Value::Null;
    let data = ctx.data(&ctx.hr_user(), CREATE, json!({ "input": input })).await;
    let created = &data["hr"]["createDocument"];
    assert_eq!(created["unresolved"], json!(["custom.probationMonths"]));
    assert!(created["document"]["content"]
        .as_str()
        .unwrap()
        .contains("Испытательный срок: ________ мес."));
}

#[tokio::test]
async fn memo_without_prefix_has_no_number() {
    let ctx = TestContext::new_seeded().await;
    let memo = ctx.seeded.document_type("memo").unwrap();
    let newcomer = ctx.employee("andrey.volkov@hr.test");
    let data = ctx
        .data(
            &ctx.hr_user(),
            CREATE,
            json!({ "input": {
                "documentTypeId": memo.id.to_string(),
                "employeeId": newcomer.id.to_string(),
                "title": "О выдаче ноутбука",
                "content": "Прошу выдать ноутбук сотруднику {{employee.fullName}}."
            }}),
        )
        .await;
    let document = &data["hr"]["createDocument"]["document"];
    assert_eq!(document["number"], Value::Null);
    assert_eq!(
        document["content"],
        json!("Прошу выдать ноутбук сотруднику Волков Андрей Петрович.")
    );
}

#[tokio::test]
async fn only_hr_can_create_documents() {
    let ctx = TestContext::new_seeded().await;
    let employee = ctx.user_for("andrey.volkov@hr.test", &[UserRole::Employee]);
    let response = ctx
        .exec(Some(&employee), CREATE, json!({ "input": contract_input(&ctx) }))
        .await;
    assert_eq!(error_code(&response).as_deref(), Some("FORBIDDEN"));

    let anonymous = ctx
        .exec(None, CREATE, json!({ "input": contract_input(&ctx) }))
        .await;
    assert_eq!(error_code(&anonymous).as_deref(), Some("UNAUTHENTICATED"));
}

#[tokio::test]
async fn submitting_without_reviewers_is_rejected() {
    let ctx = TestContext::new_seeded().await;
    let mut input = contract_input(&ctx);
    input["reviewers"] = json!([]);
    input["submit"] = json!(true);
    let response = ctx
        .exec(Some(&ctx.hr_user()), CREATE, json!({ "input": input }))
        .await;
    assert_eq!(error_code(&response).as_deref(), Some("VALIDATION"));

    // The failed request must not have used up a number.
    let data = ctx
        .data(&ctx.hr_user(), CREATE, json!({ "input": contract_input(&ctx) }))
        .await;
    assert_eq!(
        data["hr"]["createDocument"]["document"]["number"],
        json!(format!("ГЭР-{}-0001", Utc::now().year()))
    );
}

#[tokio::test]
async fn create_with_submit_parks_document_as_pending() {
    let ctx = TestContext::new_seeded().await;
    let mut input = contract_input(&ctx);
    input["submit"] = json!(true);
    let data = ctx.data(&ctx.hr_user(), CREATE, json!({ "input": input })).await;
    let document = &data["hr"]["createDocument"]["document"];
    assert_eq!(document["status"], json!("PENDING"));

    let recruiter = ctx.user_for("ilya.sokolov@hr.test", &[UserRole::Employee]);
    let reviewed = ctx
        .data(
            &recruiter,
            REVIEW,
            json!({ "id": document["id"], "verdict": "APPROVE" }),
        )
        .await;
    assert_eq!(reviewed["hr"]["reviewDocument"]["status"], json!("IN_REVIEW"));
}

#[tokio::test]
async fn review_flow_runs_from_draft_to_signed() {
    let ctx = TestContext::new_seeded().await;
    let hr = ctx.hr_user();
    let director = ctx.user_for("olga.smirnova@hr.test", &[UserRole::Manager]);
    let recruiter = ctx.user_for("ilya.sokolov@hr.test", &[UserRole::Employee]);

    let data = ctx
        .data(&hr, CREATE, json!({ "input": contract_input(&ctx) }))
        .await;
    let id = data["hr"]["createDocument"]["document"]["id"].clone();

    let submitted = ctx.data(&hr, SUBMIT, json!({ "id": id })).await;
    assert_eq!(submitted["hr"]["submitDocument"]["status"], json!("IN_REVIEW"));

    let outsider = ctx
        .exec(Some(&stranger()), REVIEW, json!({ "id": id, "verdict": "APPROVE" }))
        .await;
    assert_eq!(error_code(&outsider).as_deref(), Some("FORBIDDEN"));

    let approved = ctx
        .data(
            &recruiter,
            REVIEW,
            json!({ "id": id, "verdict": "APPROVE", "comment": "Согласовано" }),
        )
        .await;
    assert_eq!(approved["hr"]["reviewDocument"]["status"], json!("IN_REVIEW"));

    let twice = ctx
        .exec(Some(&recruiter), REVIEW, json!({ "id": id, "verdict": "APPROVE" }))
        .await;
    assert_eq!(error_code(&twice).as_deref(), Some("CONFLICT"));

    let no_reason = ctx
        .exec(Some(&director), REVIEW, json!({ "id": id, "verdict": "REJECT" }))
        .await;
    assert_eq!(error_code(&no_reason).as_deref(), Some("VALIDATION"));

    let rejected = ctx
        .data(
            &director,
            REVIEW,
            json!({ "id": id, "verdict": "REJECT", "comment": "Уточнить оклад" }),
        )
        .await;
    assert_eq!(rejected["hr"]["reviewDocument"]["status"], json!("DRAFT"));
    assert_eq!(
        rejected["hr"]["reviewDocument"]["rejectionReason"],
        json!("Уточнить оклад")
    );

    let resubmitted = ctx.data(&hr, SUBMIT, json!({ "id": id })).await;
    let decisions: Vec<&Value> = resubmitted["hr"]["submitDocument"]["reviewers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| &r["decision"])
        .collect();
    assert!(decisions.iter().all(|d| **d == json!("PENDING")));

    ctx.data(&recruiter, REVIEW, json!({ "id": id, "verdict": "APPROVE" }))
        .await;
    let reviewed = ctx
        .data(&director, REVIEW, json!({ "id": id, "verdict": "APPROVE" }))
        .await;
    assert_eq!(reviewed["hr"]["reviewDocument"]["status"], json!("REVIEWED"));

    let early_sign = ctx
        .exec(
            Some(&hr),
            "mutation($id: ID!) { hr { signDocument(id: $id) { status } } }",
            json!({ "id": id }),
        )
        .await;
    assert_eq!(error_code(&early_sign).as_deref(), Some("CONFLICT"));

    let approved = ctx
        .data(
            &hr,
            "mutation($id: ID!) { hr { approveDocument(id: $id) { status } } }",
            json!({ "id": id }),
        )
        .await;
    assert_eq!(approved["hr"]["approveDocument"]["status"], json!("APPROVED"));

    let signed = ctx
        .data(
            &hr,
            "mutation($id: ID!) { hr { signDocument(id: $id) { status } } }",
            json!({ "id": id }),
        )
        .await;
    assert_eq!(signed["hr"]["signDocument"]["status"], json!("SIGNED"));

    let history = ctx
        .data(
            &hr,
            "query($id: ID!) { hr { documentHistory(documentId: $id) { action } } }",
            json!({ "id": id }),
        )
        .await;
    let actions: Vec<&str> = history["hr"]["documentHistory"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["action"].as_str().unwrap())
        .collect();
    assert_eq!(
        actions,
        vec![
            "CREATED",
            "SUBMITTED",
            "REVIEWER_APPROVED",
            "REVIEWER_REJECTED",
            "SUBMITTED",
            "REVIEWER_APPROVED",
            "REVIEWER_APPROVED",
            "REVIEWED",
            "APPROVED",
            "SIGNED",
        ]
    );
}

#[tokio::test]
async fn parked_document_history_keeps_insert_order() {
    let ctx = TestContext::new_seeded().await;
    let hr = ctx.hr_user();
    let mut input = contract_input(&ctx);
    input["submit"] = json!(true);
    let data = ctx.data(&hr, CREATE, json!({ "input": input })).await;
    let id = data["hr"]["createDocument"]["document"]["id"].clone();

    let history = ctx
        .data(
            &hr,
            "query($id: ID!) { hr { documentHistory(documentId: $id) { action } } }",
            json!({ "id": id }),
        )
        .await;
    assert_eq!(
        history["hr"]["documentHistory"],
        json!([{ "action": "CREATED" }, { "action": "SUBMITTED" }])
    );
}

#[tokio::test]
async fn blank_comment_is_rejected_with_its_own_message() {
    let ctx = TestContext::new_seeded().await;
    let hr = ctx.hr_user();
    let data = ctx
        .data(&hr, CREATE, json!({ "input": contract_input(&ctx) }))
        .await;
    let id = data["hr"]["createDocument"]["document"]["id"].clone();

    let response = ctx
        .exec(
            Some(&hr),
            "mutation($id: ID!, $comment: String!) { hr { commentDocument(id: $id, comment: $comment) { action } } }",
            json!({ "id": id, "comment": "   " }),
        )
        .await;
    assert_eq!(error_code(&response).as_deref(), Some("VALIDATION"));
    assert_eq!(response.errors[0].message, "Comment must not be empty");
}

#[tokio::test]
async fn documents_under_review_cannot_be_edited() {
    let ctx = TestContext::new_seeded().await;
    let hr = ctx.hr_user();
    let data = ctx
        .data(&hr, CREATE, json!({ "input": contract_input(&ctx) }))
        .await;
    let id = data["hr"]["createDocument"]["document"]["id"].clone();

    let edit = r#"
    mutation Edit($input: EditDocumentInput!) { hr { editDocument(input: $input) { title } } }
    "#;
    let edited = ctx
        .data(&hr, edit, json!({ "input": { "id": id, "title": "Договор (ред. 2)" } }))
        .await;
    assert_eq!(edited["hr"]["editDocument"]["title"], json!("Договор (ред. 2)"));

    ctx.data(&hr, SUBMIT, json!({ "id": id })).await;
    let locked = ctx
        .exec(Some(&hr), edit, json!({ "input": { "id": id, "title": "Другое" } }))
        .await;
    assert_eq!(error_code(&locked).as_deref(), Some("CONFLICT"));
}

#[tokio::test]
async fn template_preview_lists_markers_and_blanks() {
    let ctx = TestContext::new_seeded().await;
    let director = ctx.employee("olga.smirnova@hr.test");
    let data = ctx
        .data(
            &ctx.hr_user(),
            r#"query($employeeId: ID!, $body: String!) {
                hr { previewTemplate(employeeId: $employeeId, body: $body) { text unresolved markers } }
            }"#,
            json!({
                "employeeId": director.id.to_string(),
                "body": "{{employee.lastName}}: {{employee.birthDate}}"
            }),
        )
        .await;
    let preview = &data["hr"]["previewTemplate"];
    assert_eq!(preview["text"], json!("Смирнова: ________"));
    assert_eq!(preview["unresolved"], json!(["employee.birthDate"]));
    assert_eq!(
        preview["markers"],
        json!(["employee.lastName", "employee.birthDate"])
    );
}

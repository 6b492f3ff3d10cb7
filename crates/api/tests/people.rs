mod common;

use api::auth::UserRole;
use common::{error_code, TestContext};
use entity::{employee, position};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;

const ASSIGN: &str = r#"
mutation($employeeId: ID!, $positionId: ID!) {
  hr { assignPosition(employeeId: $employeeId, positionId: $positionId, effectiveDate: "2026-04-01") { positionId departmentId } }
}
"#;

async fn occupied(ctx: &TestContext, id: uuid::Uuid) -> i32 {
    position::Entity::find_by_id(id)
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap()
        .occupied
}

#[tokio::test]
async fn seed_fills_seats() {
    let ctx = TestContext::new_seeded().await;
    let director = ctx.seeded.position_titled("Генеральный директор").unwrap();
    let engineer = ctx.seeded.position_titled("Инженер-программист").unwrap();
    assert_eq!((director.occupied, director.headcount), (1, 1));
    assert_eq!((engineer.occupied, engineer.headcount), (1, 3));
    assert!(!director.has_vacancy());
    assert!(engineer.has_vacancy());
}

#[tokio::test]
async fn assigning_to_a_full_position_is_a_conflict() {
    let ctx = TestContext::new_seeded().await;
    let newcomer = ctx.employee("andrey.volkov@hr.test");
    let director = ctx.seeded.position_titled("Генеральный директор").unwrap();
    let response = ctx
        .exec(
            Some(&ctx.hr_user()),
            ASSIGN,
            json!({ "employeeId": newcomer.id.to_string(), "positionId": director.id.to_string() }),
        )
        .await;
    assert_eq!(error_code(&response).as_deref(), Some("CONFLICT"));
    assert_eq!(occupied(&ctx, director.id).await, 1);
    assert_eq!(occupied(&ctx, newcomer.position_id.unwrap()).await, 1);
}

#[tokio::test]
async fn transfer_moves_the_seat_and_records_history() {
    let ctx = TestContext::new_seeded().await;
    let hr = ctx.hr_user();
    let recruiter = ctx.employee("ilya.sokolov@hr.test");
    let old_seat = recruiter.position_id.unwrap();
    let engineer = ctx.seeded.position_titled("Инженер-программист").unwrap();
    let dev = ctx.seeded.department_named("Разработка").unwrap();

    let data = ctx
        .data(
            &hr,
            ASSIGN,
            json!({ "employeeId": recruiter.id.to_string(), "positionId": engineer.id.to_string() }),
        )
        .await;
    assert_eq!(
        data["hr"]["assignPosition"]["departmentId"],
        json!(dev.id.to_string())
    );
    assert_eq!(occupied(&ctx, old_seat).await, 0);
    assert_eq!(occupied(&ctx, engineer.id).await, 2);

    let history = ctx
        .data(
            &hr,
            "query($id: ID!) { hr { employmentHistory(employeeId: $id) { kind note } } }",
            json!({ "id": recruiter.id.to_string() }),
        )
        .await;
    let kinds: Vec<&str> = history["hr"]["employmentHistory"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["HIRED", "POSITION_ASSIGNED"]);
}

#[tokio::test]
async fn release_frees_the_seat_and_starts_offboarding() {
    let ctx = TestContext::new_seeded().await;
    let hr = ctx.hr_user();
    let recruiter = ctx.employee("ilya.sokolov@hr.test");
    let seat = recruiter.position_id.unwrap();
    let release = r#"
    mutation($id: ID!) {
      hr {
        releaseEmployee(employeeId: $id, terminationDate: "2026-06-30", reason: "По собственному желанию") {
          employee { status lifecycleStage positionId terminationDate }
          offboarding { kind status progress stages { id } }
        }
      }
    }
    "#;
    let data = ctx
        .data(&hr, release, json!({ "id": recruiter.id.to_string() }))
        .await;
    let payload = &data["hr"]["releaseEmployee"];
    assert_eq!(payload["employee"]["status"], json!("TERMINATED"));
    assert_eq!(payload["employee"]["lifecycleStage"], json!("OFFBOARDING"));
    assert_eq!(payload["employee"]["positionId"], serde_json::Value::Null);
    assert_eq!(payload["employee"]["terminationDate"], json!("2026-06-30"));
    assert_eq!(payload["offboarding"]["kind"], json!("OFFBOARDING"));
    assert_eq!(payload["offboarding"]["progress"], json!(0));
    assert_eq!(
        payload["offboarding"]["stages"],
        json!([{ "id": "handover" }, { "id": "assets" }, { "id": "settlement" }])
    );
    assert_eq!(occupied(&ctx, seat).await, 0);

    let again = ctx
        .exec(Some(&hr), release, json!({ "id": recruiter.id.to_string() }))
        .await;
    assert_eq!(error_code(&again).as_deref(), Some("CONFLICT"));
}

#[tokio::test]
async fn hiring_into_a_full_position_leaves_no_record() {
    let ctx = TestContext::new_seeded().await;
    let director = ctx.seeded.position_titled("Генеральный директор").unwrap();
    let before = employee::Entity::find().count(ctx.db.as_ref()).await.unwrap();
    let response = ctx
        .exec(
            Some(&ctx.hr_user()),
            r#"mutation($input: NewEmployeeInput!) { hr { createEmployee(input: $input) { id } } }"#,
            json!({ "input": {
                "firstName": "Пётр",
                "lastName": "Лебедев",
                "positionId": director.id.to_string()
            }}),
        )
        .await;
    assert_eq!(error_code(&response).as_deref(), Some("CONFLICT"));
    let after = employee::Entity::find().count(ctx.db.as_ref()).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn new_hire_enters_onboarding_and_can_be_found() {
    let ctx = TestContext::new_seeded().await;
    let hr = ctx.hr_user();
    let engineer = ctx.seeded.position_titled("Инженер-программист").unwrap();
    let created = ctx
        .data(
            &hr,
            r#"mutation($input: NewEmployeeInput!) {
                hr { createEmployee(input: $input) { id fullName lifecycleStage salary profileCompletion } }
            }"#,
            json!({ "input": {
                "firstName": "Пётр",
                "lastName": "Лебедев",
                "email": "Petr.Lebedev@HR.test",
                "positionId": engineer.id.to_string()
            }}),
        )
        .await;
    let hired = &created["hr"]["createEmployee"];
    assert_eq!(hired["fullName"], json!("Лебедев Пётр"));
    assert_eq!(hired["lifecycleStage"], json!("ONBOARDING"));
    assert_eq!(hired["salary"], json!(210000));
    assert!(hired["profileCompletion"].as_i64().unwrap() > 0);

    let viewer = ctx.user_for("andrey.volkov@hr.test", &[UserRole::Employee]);
    let found = ctx
        .data(
            &viewer,
            r#"query { hr { employees(filter: { q: "Лебедев" }) { email } } }"#,
            json!({}),
        )
        .await;
    assert_eq!(
        found["hr"]["employees"],
        json!([{ "email": "petr.lebedev@hr.test" }])
    );
}

#[tokio::test]
async fn org_structure_nests_departments() {
    let ctx = TestContext::new_seeded().await;
    let viewer = ctx.user_for("andrey.volkov@hr.test", &[UserRole::Employee]);
    let data = ctx
        .data(
            &viewer,
            "query { hr { orgStructure { department { name } children { department { name } positions { title } } } } }",
            json!({}),
        )
        .await;
    let roots = data["hr"]["orgStructure"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["department"]["name"], json!("Головной офис"));
    let mut children: Vec<&str> = roots[0]["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["department"]["name"].as_str().unwrap())
        .collect();
    children.sort();
    assert_eq!(children, vec!["Отдел персонала", "Разработка"]);
}

#[tokio::test]
async fn page_size_is_capped() {
    let ctx = TestContext::new_seeded().await;
    let response = ctx
        .exec(
            Some(&ctx.hr_user()),
            "query { hr { employees(first: 500) { id } } }",
            json!({}),
        )
        .await;
    assert_eq!(error_code(&response).as_deref(), Some("LIMIT_EXCEEDED"));
}

const UPDATE_STATUS: &str = r#"
mutation($id: ID!, $status: EmployeeStatus!) {
  hr { updateEmployee(input: { id: $id, status: $status }) { status } }
}
"#;

#[tokio::test]
async fn status_edit_cannot_terminate_or_revive() {
    let ctx = TestContext::new_seeded().await;
    let hr = ctx.hr_user();
    let engineer = ctx.employee("andrey.volkov@hr.test");
    let seat = engineer.position_id.unwrap();
    let id = engineer.id.to_string();

    let terminate = ctx
        .exec(Some(&hr), UPDATE_STATUS, json!({ "id": id, "status": "TERMINATED" }))
        .await;
    assert_eq!(error_code(&terminate).as_deref(), Some("VALIDATION"));
    assert_eq!(occupied(&ctx, seat).await, 1);

    let on_leave = ctx
        .data(&hr, UPDATE_STATUS, json!({ "id": id, "status": "ON_LEAVE" }))
        .await;
    assert_eq!(on_leave["hr"]["updateEmployee"]["status"], json!("ON_LEAVE"));

    ctx.data(
        &hr,
        r#"mutation($id: ID!) { hr { releaseEmployee(employeeId: $id, terminationDate: "2026-06-30") { employee { status } } } }"#,
        json!({ "id": id }),
    )
    .await;
    assert_eq!(occupied(&ctx, seat).await, 0);

    let revive = ctx
        .exec(Some(&hr), UPDATE_STATUS, json!({ "id": id, "status": "ACTIVE" }))
        .await;
    assert_eq!(error_code(&revive).as_deref(), Some("CONFLICT"));
    let stored = employee::Entity::find_by_id(engineer.id)
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, employee::Status::Terminated);
}

#![allow(dead_code)]

use std::sync::Arc;

use api::auth::{CurrentUser, UserRole};
use api::schema::{build_schema, AppSchema, HrSchema};
use api::seed::{seed_hr_demo, SeededHrRecords};
use api::template::CompanyProfile;
use async_graphql::{Request, Response, Variables};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};
use serde_json::Value;
use uuid::Uuid;

pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub schema: HrSchema,
    pub seeded: SeededHrRecords,
}

pub fn company() -> CompanyProfile {
    CompanyProfile {
        name: "Ромашка".into(),
        legal_name: Some("ООО «Ромашка»".into()),
        inn: Some("7701234567".into()),
        address: Some("Москва, ул. Тверская, 1".into()),
        director: Some("Смирнова О. В.".into()),
    }
}

impl TestContext {
    pub async fn new_seeded() -> Self {
        let conn = Database::connect("sqlite::memory:").await.unwrap();
        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            "PRAGMA foreign_keys = ON;",
        ))
        .await
        .unwrap();
        Migrator::up(&conn, None).await.unwrap();
        let seeded = seed_hr_demo(&conn).await.unwrap();
        let db = Arc::new(conn);
        let AppSchema(schema) = build_schema(db.clone(), Arc::new(company()));
        Self { db, schema, seeded }
    }

    pub fn employee(&self, email: &str) -> &entity::employee::Model {
        self.seeded.employee_email(email).unwrap()
    }

    /// A login bound to the seeded employee with `email`.
    pub fn user_for(&self, email: &str, roles: &[UserRole]) -> CurrentUser {
        let employee = self.employee(email);
        CurrentUser {
            user_id: employee.user_id.unwrap(),
            roles: roles.to_vec(),
            employee_id: Some(employee.id),
            position_id: employee.position_id,
        }
    }

    pub fn hr_user(&self) -> CurrentUser {
        self.user_for("marina.kuznetsova@hr.test", &[UserRole::Hr])
    }

    pub async fn exec(&self, user: Option<&CurrentUser>, query: &str, variables: Value) -> Response {
        let mut request = Request::new(query).variables(Variables::from_json(variables));
        if let Some(user) = user {
            request = request.data(user.clone());
        }
        self.schema.execute(request).await
    }

    /// Runs `query` and returns its data, panicking on any GraphQL error.
    pub async fn data(&self, user: &CurrentUser, query: &str, variables: Value) -> Value {
        let response = self.exec(Some(user), query, variables).await;
        assert!(response.errors.is_empty(), "unexpected errors: {:?}", response.errors);
        response.data.into_json().unwrap()
    }
}

pub fn error_code(response: &Response) -> Option<String> {
    let error = response.errors.first()?;
    let extensions = error.extensions.as_ref()?;
    match extensions.get("code")? {
        async_graphql::Value::String(code) => Some(code.clone()),
        _ => None,
    }
}

pub fn stranger() -> CurrentUser {
    CurrentUser {
        user_id: Uuid::new_v4(),
        roles: vec![UserRole::Employee],
        employee_id: None,
        position_id: None,
    }
}

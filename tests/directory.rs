//! The school directory served over TCP, as the `wireline` binary runs it.

use std::sync::Arc;

use rstest::{fixture, rstest};
use serde_json::json;
use wireline::{
    client::{Client, ClientError},
    config::{ClientConfig, ServerConfig},
    context::Context,
    directory::{
        self,
        Directory,
        model::{
            AddStudentToClass,
            Class,
            CreateClass,
            CreatePerson,
            CreateSchool,
            Id,
            Person,
            Role,
            School,
            WhoAmI,
        },
        register_handlers,
    },
    router::Router,
};
use wireline_testing::{LineClient, TestResult, TestServer};

#[fixture]
fn directory_router() -> Arc<Router> {
    let router = Router::new();
    register_handlers(&router, &Arc::new(Directory::new()));
    Arc::new(router)
}

async fn connected(server: &TestServer) -> TestResult<Client> {
    let client = Client::new(ClientConfig::default().with_address(server.addr().to_string()));
    client.connect().await?;
    Ok(client)
}

#[rstest]
#[tokio::test]
async fn enrolment_flow_over_tcp(directory_router: Arc<Router>) -> TestResult {
    let server = TestServer::start(ServerConfig::default(), directory_router)?;
    let client = connected(&server).await?;
    let ctx = Context::background();

    let school: Id = client
        .send_typed(&ctx, directory::CREATE_SCHOOL, &CreateSchool {
            name: "Walkerville".into(),
        })
        .await?;
    let teacher: Id = client
        .send_typed(&ctx, directory::CREATE_PERSON, &CreatePerson {
            name: "Valerie Frizzle".into(),
            role: Role::Teacher,
            school_id: school,
        })
        .await?;
    let student: Id = client
        .send_typed(&ctx, directory::CREATE_PERSON, &CreatePerson {
            name: "Dorothy Ann".into(),
            role: Role::Student,
            school_id: school,
        })
        .await?;
    let class: Id = client
        .send_typed(&ctx, directory::CREATE_CLASS, &CreateClass {
            name: "Field Trips".into(),
            school_id: school,
            teacher_id: teacher,
        })
        .await?;

    let message: String = client
        .send_typed(&ctx, directory::ADD_STUDENT_TO_CLASS, &AddStudentToClass {
            class_id: class,
            student_id: student,
        })
        .await?;
    assert_eq!(message, directory::STUDENT_ADDED_MESSAGE);

    let me: Person = client
        .send_typed(&ctx, directory::WHO_AM_I, &WhoAmI { person_id: student })
        .await?;
    assert_eq!(me.name, "Dorothy Ann");
    assert_eq!(me.class_ids, vec![class]);

    let schools: Vec<School> = client.send_typed(&ctx, directory::LIST_SCHOOLS, &()).await?;
    assert_eq!(schools.len(), 1);
    let classes: Vec<Class> = client.send_typed(&ctx, directory::LIST_CLASSES, &()).await?;
    assert_eq!(classes.first().map(|c| c.student_ids.clone()), Some(vec![student]));
    let persons: Vec<Person> = client.send_typed(&ctx, directory::LIST_PERSONS, &()).await?;
    assert_eq!(persons.len(), 2);

    client.close().await?;
    server.shutdown().await;
    Ok(())
}

#[rstest]
#[tokio::test]
async fn directory_errors_reach_the_client(directory_router: Arc<Router>) -> TestResult {
    let server = TestServer::start(ServerConfig::default(), directory_router)?;
    let client = connected(&server).await?;

    let err = client
        .send_typed::<_, Person>(&Context::background(), directory::WHO_AM_I, &WhoAmI {
            person_id: 7,
        })
        .await
        .err()
        .ok_or("expected not found")?;
    assert!(
        matches!(&err, ClientError::Remote(message) if message == "entity not found"),
        "{err:?}"
    );

    client.close().await?;
    server.shutdown().await;
    Ok(())
}

#[rstest]
#[tokio::test]
async fn malformed_payload_is_reported_per_request(directory_router: Arc<Router>) -> TestResult {
    let server = TestServer::start(ServerConfig::default(), directory_router)?;
    let mut client = LineClient::connect(server.addr()).await?;

    let reply = client
        .call(directory::CREATE_SCHOOL, json!({"name": 42}))
        .await?;
    assert_eq!(reply["status"], false);
    assert!(reply.get("data").is_none());

    let reply = client
        .call(directory::CREATE_SCHOOL, json!({"name": "Walkerville"}))
        .await?;
    assert_eq!(reply, json!({"status": true, "data": 1}));

    drop(client);
    server.shutdown().await;
    Ok(())
}

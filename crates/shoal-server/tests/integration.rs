use bson::doc;
use shoal_db::{BucketConfig, Database, DatabaseConfig, FindOptions, PutOptions};
use shoal_query::FieldType;
use shoal_server::{Envelope, FindEvent, Request, Response, Server, ServerConfig, ServerHandle};
use tokio::sync::{mpsc, oneshot};

fn start() -> ServerHandle {
    Server::new(Database::open(DatabaseConfig::default()), ServerConfig::default()).spawn()
}

async fn call(sender: &mpsc::Sender<Envelope>, request: Request) -> Response {
    let (reply, rx) = oneshot::channel();
    sender.send(Envelope { request, reply }).await.unwrap();
    rx.await.unwrap()
}

fn config() -> BucketConfig {
    BucketConfig::new().with_index("name", FieldType::String)
}

async fn drain(mut rx: mpsc::Receiver<FindEvent>) -> (Vec<String>, bool) {
    let mut keys = Vec::new();
    let mut ended = false;
    while let Some(event) = rx.recv().await {
        match event {
            FindEvent::Record(record) => keys.push(record.key),
            FindEvent::End => ended = true,
        }
    }
    (keys, ended)
}

#[tokio::test]
async fn bucket_and_object_round_trip() {
    let server = start();
    let tx = server.sender();

    match call(&tx, Request::CreateBucket { bucket: "b".into(), config: config() }).await {
        Response::Bucket(bucket) => assert_eq!(bucket.version, 1),
        other => panic!("unexpected {other:?}"),
    }

    for key in ["k1", "k2"] {
        let response = call(
            &tx,
            Request::PutObject {
                bucket: "b".into(),
                key: key.into(),
                value: doc! { "name": "bar" },
                options: PutOptions::default(),
            },
        )
        .await;
        assert!(matches!(response, Response::Object(_)));
    }

    let response = call(
        &tx,
        Request::FindObjects {
            bucket: "b".into(),
            filter: "(name=bar)".into(),
            options: FindOptions::required_version(1),
        },
    )
    .await;
    let Response::Records(rx) = response else {
        panic!("expected records, got {response:?}");
    };
    let (keys, ended) = drain(rx).await;
    assert_eq!(keys, vec!["k1", "k2"]);
    assert!(ended);

    match call(&tx, Request::ListBuckets).await {
        Response::Buckets(names) => assert_eq!(names, vec!["b"]),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        call(&tx, Request::DeleteBucket { bucket: "b".into() }).await,
        Response::Ok
    ));

    server.shutdown().await;
}

#[tokio::test]
async fn errors_come_back_as_responses() {
    let server = start();
    let tx = server.sender();

    match call(&tx, Request::GetBucket { bucket: "missing".into() }).await {
        Response::Error(e) => assert_eq!(e.name(), "BucketNotFoundError"),
        other => panic!("unexpected {other:?}"),
    }

    call(&tx, Request::CreateBucket { bucket: "b".into(), config: config() }).await;
    let response = call(
        &tx,
        Request::FindObjects {
            bucket: "b".into(),
            filter: "(name=bar)".into(),
            options: FindOptions::required_version(9),
        },
    )
    .await;
    match response {
        Response::Error(e) => assert_eq!(e.name(), "SchemaVersionMismatchError"),
        other => panic!("unexpected {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn find_stream_respects_a_small_buffer() {
    let config = ServerConfig {
        find_buffer: 1,
        ..ServerConfig::default()
    };
    let server = Server::new(Database::open(DatabaseConfig::default()), config).spawn();
    let tx = server.sender();

    call(&tx, Request::CreateBucket { bucket: "b".into(), config: BucketConfig::new() }).await;
    for i in 0..50 {
        call(
            &tx,
            Request::PutObject {
                bucket: "b".into(),
                key: format!("k{i:02}"),
                value: doc! { "name": "bar" },
                options: PutOptions::default(),
            },
        )
        .await;
    }

    let response = call(
        &tx,
        Request::FindObjects {
            bucket: "b".into(),
            filter: "(name=bar)".into(),
            options: FindOptions::default(),
        },
    )
    .await;
    let Response::Records(rx) = response else {
        panic!("expected records");
    };
    let (keys, ended) = drain(rx).await;
    assert_eq!(keys.len(), 50);
    assert!(ended);

    server.shutdown().await;
}

#[tokio::test]
async fn requests_after_shutdown_fail() {
    let server = start();
    let tx = server.sender();
    server.shutdown().await;

    let (reply, _rx) = oneshot::channel();
    let sent = tx
        .send(Envelope {
            request: Request::ListBuckets,
            reply,
        })
        .await;
    assert!(sent.is_err());
}

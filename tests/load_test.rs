//! Load testing: many concurrent streams through one client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use inference_router::config::StreamingConfig;
use inference_router::streaming::{ChatMessage, ChatRequest, InferenceClient, StreamEvent};

mod common;
use common::{sse, sse_done, start_mock, Behavior};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_streams() {
    let chunks: Vec<String> = (0..20).map(|i| sse(&format!("t{i} "))).chain([sse_done()]).collect();
    let expected: String = (0..20).map(|i| format!("t{i} ")).collect();
    let mock = start_mock(Behavior::Stream {
        chunks,
        delay: Duration::from_millis(2),
        hold_open: false,
    })
    .await;

    let client = Arc::new(InferenceClient::new(&StreamingConfig::default()).unwrap());
    let target = mock.target("m");
    let concurrency = 50;

    let start = Instant::now();
    let tasks = (0..concurrency).map(|_| {
        let client = client.clone();
        let target = target.clone();
        tokio::spawn(async move {
            let request = ChatRequest::new(vec![ChatMessage::user("go")]);
            let stream = client.open_stream(&target, &request).await.unwrap();
            stream.into_final().await
        })
    });
    let results = join_all(tasks).await;
    let elapsed = start.elapsed();

    for result in results {
        match result.unwrap() {
            Some(StreamEvent::Final { text, .. }) => assert_eq!(text, expected),
            other => panic!("expected final event, got {other:?}"),
        }
    }

    println!("{concurrency} concurrent streams completed in {elapsed:?}");
    assert_eq!(mock.hits(), concurrency);
    assert!(common::eventually(Duration::from_secs(2), || client.active_stream_count() == 0).await);
    assert!(elapsed < Duration::from_secs(10));
}

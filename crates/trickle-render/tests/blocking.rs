//! Blocking render scenarios.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use trickle_render::{Frame, Fragments, MemorySink, RenderError, RenderSession, Resolvable};

type Slot = Resolvable<String, String>;

fn fragments() -> Fragments {
    Fragments::new()
        .with("page", |frame: &mut Frame<'_>, _: &Value| {
            frame.write_raw("<main>")?;
            frame.stream("a", "a")?;
            frame.write_raw("</main>")
        })
        .with("a", |frame: &mut Frame<'_>, data: &Value| {
            frame.write_raw("<p>")?;
            frame.write_text(data.as_str().unwrap_or_default())?;
            frame.write_raw("</p>")
        })
        .with_static("a:pending", "<i>loading</i>")
        .with_static("a:error", "<span>ERR</span>")
}

fn resolve_later(value: Slot, outcome: Result<&'static str, &'static str>) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        match outcome {
            Ok(data) => value.resolve_ok(data.to_string()).unwrap(),
            Err(error) => value.resolve_err(error.to_string()).unwrap(),
        }
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_waits_inline() {
    let sink = MemorySink::new();
    let mut session = RenderSession::blocking(Arc::new(fragments()), sink.clone());
    let a: Slot = session.resolvable();
    session.bind("a", a.clone());
    resolve_later(a, Ok("x"));

    session.render("page", &Value::Null).await.unwrap();

    let output = sink.contents();
    assert_eq!(output, "<main><p>x</p></main>");
    assert!(!output.contains("<script"));
    assert!(!output.contains("data-trickle-cid"));
    assert!(!output.contains("loading"));
    assert_eq!(session.deferred(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_flushes_before_waiting() {
    let sink = MemorySink::new();
    let mut session = RenderSession::blocking(Arc::new(fragments()), sink.clone());
    let a: Slot = session.resolvable();
    session.bind("a", a.clone());
    resolve_later(a, Ok("x"));

    session.render("page", &Value::Null).await.unwrap();

    let chunks = sink.chunks();
    assert_eq!(chunks[0], "<main>");
    assert_eq!(chunks[1], "<p>x</p></main>");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_renders_error_variant() {
    let sink = MemorySink::new();
    let mut session = RenderSession::blocking(Arc::new(fragments()), sink.clone());
    let a: Slot = session.resolvable();
    session.bind("a", a.clone());
    resolve_later(a, Err("boom"));

    session.render("page", &Value::Null).await.unwrap();

    assert_eq!(sink.contents(), "<main><span>ERR</span></main>");
}

#[tokio::test]
async fn test_blocking_with_thread_producer() {
    let sink = MemorySink::new();
    let mut session = RenderSession::blocking(Arc::new(fragments()), sink.clone());
    let a: Slot = session.resolvable();
    session.bind("a", a.clone());
    let producer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        a.resolve_ok("x".to_string()).unwrap();
    });

    session.render("page", &Value::Null).await.unwrap();
    producer.join().unwrap();

    assert_eq!(sink.contents(), "<main><p>x</p></main>");
}

#[test]
fn test_blocking_missing_fragment_fails() {
    let fragments = Fragments::new().with("page", |frame: &mut Frame<'_>, _: &Value| {
        frame.render("absent", &Value::Null)
    });
    let mut session = RenderSession::blocking(Arc::new(fragments), Vec::new());

    let result = futures::executor::block_on(session.render("page", &Value::Null));

    assert_eq!(result, Err(RenderError::FragmentNotFound("absent".to_string())));
}

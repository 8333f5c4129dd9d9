//! Built-in demo page.
//!
//! Renders a profile page whose sections resolve after staggered delays and
//! prints every chunk the sink flushes, with its offset from the start.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;
use trickle_core::{RenderMode, RenderObserver};
use trickle_observability::{FanoutObserver, MetricsObserver, TracingObserver};
use trickle_render::{
    combine, ChannelSink, ChunkStream, Classes, Frame, FragmentRef, Fragments, RenderError,
    RenderSession, Resolvable, CHILD_KEY, DATA_KEY,
};

use super::DemoArgs;
use crate::context::Context;
use crate::output::Output;

#[derive(Debug, Clone, Serialize)]
struct Profile {
    name: String,
    bio: String,
    verified: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Review {
    author: String,
    stars: u8,
    text: String,
}

/// Run the demo command.
pub async fn run(args: DemoArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.config.render.clone();
    if args.blocking {
        config.mode = RenderMode::Blocking;
    }
    let delay = Duration::from_millis(args.delay_ms.unwrap_or(ctx.config.demo.delay_ms));
    let fail_reviews = args.fail_reviews || ctx.config.demo.fail_reviews;

    ctx.output.header(if config.is_streaming() {
        "Streaming render"
    } else {
        "Blocking render"
    });
    ctx.output
        .debug(&format!("base delay {}ms, fail reviews: {}", delay.as_millis(), fail_reviews));

    let metrics = Arc::new(MetricsObserver::new());
    let observer: Arc<dyn RenderObserver> = Arc::new(
        FanoutObserver::new()
            .with(metrics.clone())
            .with(Arc::new(TracingObserver::labeled("demo"))),
    );

    let (sink, chunks) = ChannelSink::new();
    let mut session = RenderSession::new(Arc::new(fragments(!args.break_fragment)), sink, &config)
        .with_observer(observer);

    let profile: Resolvable<Profile, String> = session.resolvable();
    let feed: Resolvable<Vec<String>, String> = session.resolvable();
    let related: Resolvable<Vec<String>, String> = session.resolvable();
    let reviews: Resolvable<Vec<Review>, String> = session.resolvable();
    session
        .bind("profile", profile.clone())
        .bind("feed", feed.clone())
        .bind("related", related.clone())
        .bind("reviews", reviews.clone());

    let start = Instant::now();
    let printer = tokio::spawn(print_chunks(chunks, ctx.output.clone(), start));

    produce(profile, delay, Ok(sample_profile()));
    produce(feed, delay * 2, Ok(sample_feed()));
    produce(related, delay * 4, Ok(vec!["Ferris".to_string(), "Corro".to_string()]));
    let reviews_outcome = if fail_reviews {
        Err("review service unavailable".to_string())
    } else {
        Ok(sample_reviews())
    };
    produce(reviews, delay * 3, reviews_outcome);

    let root = combine(
        [("layout".to_string(), json!({ "title": "Profile" }))],
        FragmentRef::new("page", Value::Null),
    );
    let result = session.render_ref(&root).await;
    let deferred = session.deferred();
    // Dropping the session closes the chunk stream.
    drop(session);
    printer.await?;

    let snapshot = metrics.snapshot();
    if snapshot.discarded_deliveries > 0 {
        ctx.output.warn(&format!(
            "{} deliver{} discarded",
            snapshot.discarded_deliveries,
            if snapshot.discarded_deliveries == 1 { "y" } else { "ies" }
        ));
    }
    if ctx.output.is_json() {
        ctx.output.json(&snapshot);
    } else {
        ctx.output.header("Metrics");
        ctx.output.text(&snapshot.to_summary());
    }

    result?;
    ctx.output.success(&format!(
        "Rendered in {}ms with {} deferred slot(s)",
        start.elapsed().as_millis(),
        deferred
    ));
    Ok(())
}

async fn print_chunks(mut chunks: ChunkStream, output: Output, start: Instant) {
    let mut index = 0;
    while let Some(chunk) = chunks.next().await {
        index += 1;
        output.chunk(index, start.elapsed(), &String::from_utf8_lossy(&chunk));
    }
}

/// Resolve a value after a delay on a background task.
fn produce<T, E>(value: Resolvable<T, E>, after: Duration, outcome: Result<T, E>)
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let resolved = match outcome {
            Ok(data) => value.resolve_ok(data),
            Err(error) => value.resolve_err(error),
        };
        if let Err(err) = resolved {
            warn!(error = %err, "demo value resolved twice");
        }
    });
}

fn fragments(with_reviews: bool) -> Fragments {
    let fragments = Fragments::new()
        .with("layout", layout)
        .with("page", page)
        .with("profile", profile_card)
        .with_static("profile:pending", r#"<p class="skeleton">Loading profile…</p>"#)
        .with("feed", feed_list)
        .with_static("feed:pending", r#"<p class="skeleton">Loading feed…</p>"#)
        .with("related", related_list)
        .with_static("reviews:pending", r#"<p class="skeleton">Loading reviews…</p>"#)
        .with("reviews:error", |frame: &mut Frame<'_>, data: &Value| {
            frame.write_raw(r#"<p class="error">Reviews unavailable: "#)?;
            frame.write_text(data.as_str().unwrap_or("unknown error"))?;
            frame.write_raw("</p>")
        });

    if with_reviews {
        fragments.with("reviews", review_list)
    } else {
        fragments
    }
}

fn layout(frame: &mut Frame<'_>, data: &Value) -> Result<(), RenderError> {
    let title = data[DATA_KEY]["title"].as_str().unwrap_or_default();
    frame.write_raw("<!DOCTYPE html>\n<html><head><title>")?;
    frame.write_text(title)?;
    frame.write_raw("</title></head>\n<body>\n")?;
    frame.render_child(&data[CHILD_KEY])?;
    frame.write_raw("</body></html>\n")
}

fn page(frame: &mut Frame<'_>, _data: &Value) -> Result<(), RenderError> {
    frame.write_raw("<header><h1>Profile</h1></header>\n<main>\n")?;
    frame.stream("profile", "profile")?;
    frame.write_raw("\n")?;
    frame.stream("feed", "feed")?;
    frame.write_raw("\n")?;
    frame.stream("reviews", "reviews")?;
    frame.write_raw("\n</main>\n")
}

fn profile_card(frame: &mut Frame<'_>, data: &Value) -> Result<(), RenderError> {
    let classes = Classes::new()
        .add("profile")
        .add_if(data["verified"].as_bool().unwrap_or(false), "verified");
    frame.write_raw(&format!(r#"<section class="{}"><h2>"#, classes))?;
    frame.write_text(data["name"].as_str().unwrap_or_default())?;
    frame.write_raw("</h2><p>")?;
    frame.write_text(data["bio"].as_str().unwrap_or_default())?;
    frame.write_raw("</p></section>")
}

fn feed_list(frame: &mut Frame<'_>, data: &Value) -> Result<(), RenderError> {
    frame.write_raw(r#"<section class="feed"><ul>"#)?;
    for item in data.as_array().into_iter().flatten() {
        frame.write_raw("<li>")?;
        frame.write_text(item.as_str().unwrap_or_default())?;
        frame.write_raw("</li>")?;
    }
    frame.write_raw("</ul>")?;
    frame.stream("related", "related")?;
    frame.write_raw("</section>")
}

fn related_list(frame: &mut Frame<'_>, data: &Value) -> Result<(), RenderError> {
    frame.write_raw("<aside>Related: ")?;
    let names: Vec<&str> = data
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .collect();
    frame.write_text(&names.join(", "))?;
    frame.write_raw("</aside>")
}

fn review_list(frame: &mut Frame<'_>, data: &Value) -> Result<(), RenderError> {
    frame.write_raw(r#"<section class="reviews">"#)?;
    for review in data.as_array().into_iter().flatten() {
        let stars = review["stars"].as_u64().unwrap_or(0).min(5) as usize;
        frame.write_raw("<blockquote><p>")?;
        frame.write_text(review["text"].as_str().unwrap_or_default())?;
        frame.write_raw(&format!("</p><cite>{} ", "★".repeat(stars)))?;
        frame.write_text(review["author"].as_str().unwrap_or_default())?;
        frame.write_raw("</cite></blockquote>")?;
    }
    frame.write_raw("</section>")
}

fn sample_profile() -> Profile {
    Profile {
        name: "Ada Lovelace".to_string(),
        bio: "Writes programs for engines that don't exist yet.".to_string(),
        verified: true,
    }
}

fn sample_feed() -> Vec<String> {
    vec![
        "Published notes on the Analytical Engine".to_string(),
        "Computed Bernoulli numbers <by hand>".to_string(),
    ]
}

fn sample_reviews() -> Vec<Review> {
    vec![
        Review {
            author: "Charles".to_string(),
            stars: 5,
            text: "Understood the machine better than I did.".to_string(),
        },
        Review {
            author: "Mary".to_string(),
            stars: 4,
            text: "Brilliant & thorough.".to_string(),
        },
    ]
}

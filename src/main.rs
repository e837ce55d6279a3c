//! agentflow demo - a park-watching agent driven from stdin
//!
//! Each input line is one stimulus for a single session:
//!
//! ```text
//! /intent <name> [text]        message with a predicted intent
//! /image <name>:<score> ...    perception snapshot (objects and properties)
//! /file <mime> [file name]     received file
//! /event <name>                external event
//! /quit
//! anything else                message the classifier did not recognise
//! ```
//!
//! Replies are printed to stdout as JSON lines; logs go to stderr.

use agentflow::perception::{AttributeValue, ImageEntity, ImagePrediction, ImageProperty};
use agentflow::platform::ChannelPlatform;
use agentflow::scenario::{BooleanExpression, Scenario, ScenarioImageEntity, ScenarioImageProperty};
use agentflow::session::{flag, ExternalEvent, FileInfo, IntentPrediction};
use agentflow::{
    ConstructionError, EngineConfig, EventParams, Platform, Session, SessionEvent, SessionManager,
    StateMachine, StateMachineBuilder, Stimulus,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Recognisable things in the demo's perception vocabulary
struct Vocabulary {
    dog: ImageEntity,
    cat: ImageEntity,
    sunny: ImageProperty,
}

impl Vocabulary {
    fn new() -> Result<Self, ConstructionError> {
        Ok(Self {
            dog: ImageEntity::with_attributes("dog", [("description", "a domestic dog")])?,
            cat: ImageEntity::with_attributes("cat", [("description", "a domestic cat")])?,
            sunny: ImageProperty::with_attributes("sunny", [("description", "clear sky")])?,
        })
    }

    fn prediction(&self, tokens: &[&str]) -> Result<ImagePrediction, String> {
        let mut prediction = ImagePrediction::new();
        for token in tokens {
            let (name, score) = token
                .split_once(':')
                .ok_or_else(|| format!("expected <name>:<score>, got {token:?}"))?;
            let score: f64 = score
                .parse()
                .map_err(|_| format!("invalid score in {token:?}"))?;
            prediction = if name == self.sunny.name() {
                prediction.with_property(self.sunny.clone(), score)
            } else {
                prediction.with_object(ImageEntity::new(name), score)
            };
        }
        Ok(prediction)
    }
}

fn build_agent(
    vocabulary: &Vocabulary,
    platform: &Arc<ChannelPlatform>,
    config: &EngineConfig,
) -> Result<StateMachine, ConstructionError> {
    let dog_walk = Arc::new(Scenario::new(
        "dog_walk",
        BooleanExpression::and(vec![
            ScenarioImageEntity::from_attributes(
                "dogs",
                vocabulary.dog.clone(),
                [("score", AttributeValue::from(0.6)), ("min", AttributeValue::from(2))],
            )?
            .into(),
            BooleanExpression::not(ScenarioImageEntity::new("cats", vocabulary.cat.clone(), 0.5)).into(),
            ScenarioImageProperty::from_attributes("sunny", vocabulary.sunny.clone(), [("score", 0.7)])?
                .into(),
        ])?,
    ));
    tracing::info!(scenario = %dog_walk.name(), expression = %dog_walk, "Scenario loaded");

    // Only a photo that just arrived may start a walk. The snapshot outlives
    // the step that delivered it.
    let fresh_dog_walk = move |s: &Session, _: &EventParams| {
        s.flags().get(flag::IMAGE_PREDICTION) && dog_walk.evaluate(s)
    };

    let mut builder = StateMachineBuilder::new("park_watcher");
    builder.with_config(config);
    builder.intent("hello").intent("bye");

    let p = Arc::clone(platform);
    builder
        .new_state("idle")
        .initial()
        .body(move |s: &mut Session| {
            p.reply(s, "Send me a photo of the park, or say hello.");
            Ok(())
        })
        .when_intent_matched_go_to("hello", "greet")
        .when_intent_matched_go_to("bye", "farewell")
        .when_event_go_to(fresh_dog_walk, "dog_walk", EventParams::new())
        .when_image_object_detected_go_to(&vocabulary.cat, 0.8, "cat_alert")
        .when_file_received_go_to("photo_file", Some(&["image/png", "image/jpeg"][..]));

    let p = Arc::clone(platform);
    builder
        .new_state("greet")
        .body(move |s: &mut Session| {
            let visits = s.get("visits").and_then(serde_json::Value::as_u64).unwrap_or(0) + 1;
            s.set("visits", visits);
            p.reply_markdown(s, &format!("Hello! This is visit **#{visits}**."));
            Ok(())
        })
        .go_to("idle");

    let p = Arc::clone(platform);
    builder
        .new_state("dog_walk")
        .body(move |s: &mut Session| {
            p.reply_options(s, vec!["Join the walk".to_string(), "Stay home".to_string()]);
            Ok(())
        })
        .go_to("idle");

    let p = Arc::clone(platform);
    builder
        .new_state("cat_alert")
        .body(move |s: &mut Session| {
            p.reply(s, "A cat! Keep the dogs on a leash.");
            Ok(())
        })
        .go_to("idle");

    let p = Arc::clone(platform);
    builder
        .new_state("photo_file")
        .body(move |s: &mut Session| {
            let name = s.file().map(|f| f.name.clone()).unwrap_or_default();
            p.reply(s, &format!("Got {name}, run it through the detector and send /image."));
            Ok(())
        })
        .go_to("idle");

    let p = Arc::clone(platform);
    builder.new_state("farewell").body(move |s: &mut Session| {
        p.reply(s, "Bye!");
        Ok(())
    });

    let p = Arc::clone(platform);
    builder.global_fallback_body(move |s: &mut Session| {
        p.reply(s, "Sorry, I did not get that.");
        Ok(())
    });

    builder.build()
}

/// Turn an input line into a stimulus. `Ok(None)` means quit.
fn parse_line(line: &str, vocabulary: &Vocabulary) -> Result<Option<Stimulus>, String> {
    let mut words = line.split_whitespace();
    let stimulus = match words.next() {
        Some("/quit") => return Ok(None),
        Some("/intent") => {
            let intent = words.next().ok_or("usage: /intent <name> [text]")?;
            Stimulus::Message {
                text: words.collect::<Vec<_>>().join(" "),
                prediction: Some(IntentPrediction::new(intent, 1.0)),
            }
        }
        Some("/image") => Stimulus::Image(vocabulary.prediction(&words.collect::<Vec<_>>())?),
        Some("/file") => {
            let mime = words.next().ok_or("usage: /file <mime> [file name]")?;
            let name = words.next().unwrap_or("upload");
            Stimulus::File(FileInfo::new(name, mime))
        }
        Some("/event") => {
            let name = words.next().ok_or("usage: /event <name>")?;
            Stimulus::Event(ExternalEvent {
                name: name.to_string(),
                payload: serde_json::Value::Null,
            })
        }
        Some(command) if command.starts_with('/') => return Err(format!("unknown command {command}")),
        _ => Stimulus::Message {
            text: line.trim().to_string(),
            prediction: None,
        },
    };
    Ok(Some(stimulus))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = EngineConfig::from_env();
    tracing::info!(config = ?config, "Engine configuration");

    let (platform, mut outgoing) = ChannelPlatform::new();
    let platform = Arc::new(platform);
    let vocabulary = Vocabulary::new()?;
    let machine = Arc::new(build_agent(&vocabulary, &platform, &config)?);
    let manager = SessionManager::new(machine, config);

    // Transport: print every reply as a JSON line
    tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            match serde_json::to_string(&message) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!(error = %e, "Failed to encode reply"),
            }
        }
    });

    let session_id = uuid::Uuid::new_v4().to_string();
    let (handle, mut events) = manager.get_or_create(&session_id).await;
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::Stepped { outcome, .. } = &event {
                tracing::debug!(outcome = ?outcome, "Step finished");
            }
            if matches!(event, SessionEvent::Closed { .. }) {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line, &vocabulary) {
            Ok(Some(stimulus)) => handle.send(&session_id, stimulus).await?,
            Ok(None) => break,
            Err(message) => eprintln!("{message}"),
        }
    }

    manager.close(&session_id).await?;
    // Let the last replies drain
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    Ok(())
}

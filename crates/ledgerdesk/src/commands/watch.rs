//! `watch`: follow branch lifecycle topics and the cache invalidations
//! they cause, until Ctrl-C.

use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;

use ledgerdesk_core::{
    CacheEvent, ConnectionState, CoreError, QueryKey, Session, Subscription, Topic, TopicEvent,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output::should_color;

pub async fn handle(session: &Session, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Fail on a missing branch before opening the socket.
    let topics = args
        .entities
        .iter()
        .map(|entity| Ok((entity.as_str(), session.branch_topics(entity)?)))
        .collect::<Result<Vec<(&str, Vec<Topic>)>, CoreError>>()?;

    let bridge = session.connect_realtime().await?;
    let mut cache_events = session.query_client().subscribe();
    let mut state = session.connection_state();

    let format = global.output;
    let color = should_color(global.color);
    let mut subscriptions: Vec<Subscription> = Vec::new();
    for (entity, topics) in topics {
        for topic in &topics {
            subscriptions.push(bridge.subscribe(topic.clone(), move |event| {
                print_event(event, format, color);
            }));
        }
        // Same family the list commands cache pages under.
        let family = QueryKey::new(entity).with("paginated");
        subscriptions.extend(bridge.invalidate_on(topics, family));
    }
    tracing::info!(topics = subscriptions.len(), "watching");

    if !global.quiet {
        eprintln!(
            "Watching {} on branch {} (Ctrl-C to stop)",
            args.entities.join(", "),
            session.config().branch_id.as_deref().unwrap_or("-")
        );
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                if !global.quiet {
                    match current {
                        ConnectionState::Reconnecting { attempt } => {
                            eprintln!("connection lost, retry {attempt}");
                        }
                        other => eprintln!("connection {other}"),
                    }
                }
                if current == ConnectionState::Failed {
                    return Err(CliError::Realtime {
                        reason: "gave up reconnecting".into(),
                    });
                }
            }
            event = cache_events.recv() => match event {
                Ok(CacheEvent::Invalidated(key)) if !global.quiet => {
                    eprintln!("invalidated {key}");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "cache event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    drop(subscriptions);
    Ok(())
}

fn print_event(event: &TopicEvent, format: OutputFormat, color: bool) {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
        }
        OutputFormat::Plain => println!("{}", event.topic),
        OutputFormat::Table | OutputFormat::Yaml => {
            let now = chrono::Local::now().format("%H:%M:%S");
            if color {
                println!("{} {}", now.dimmed(), event.topic.bold());
            } else {
                println!("{now} {}", event.topic);
            }
        }
    }
}
